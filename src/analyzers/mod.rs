pub mod chunker;
pub mod classifier;

pub use chunker::ChunkExtractor;
pub use classifier::{Classification, Classifier};

use std::path::Path;

/// Languages recognized by extension. Order matters: it breaks count ties and
/// decides which language claims a shared extension such as `.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Rust,
    Cpp,
    C,
    Ruby,
    Php,
}

/// How definitions are located inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarFamily {
    /// Blocks delimited by indentation (`def`, `class`).
    Indentation,
    /// Blocks delimited by braces (`function`, `class`, arrow bindings).
    Brace,
    /// No definition grammar; the file is one chunk.
    WholeFile,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Java,
        Language::Go,
        Language::Rust,
        Language::Cpp,
        Language::C,
        Language::Ruby,
        Language::Php,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Ruby => "ruby",
            Language::Php => "php",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py"],
            Language::JavaScript => &["js", "jsx"],
            Language::TypeScript => &["ts", "tsx"],
            Language::Java => &["java"],
            Language::Go => &["go"],
            Language::Rust => &["rs"],
            Language::Cpp => &["cpp", "cc", "cxx", "h"],
            Language::C => &["c", "h"],
            Language::Ruby => &["rb"],
            Language::Php => &["php"],
        }
    }

    pub fn family(&self) -> GrammarFamily {
        match self {
            Language::Python => GrammarFamily::Indentation,
            Language::JavaScript | Language::TypeScript => GrammarFamily::Brace,
            _ => GrammarFamily::WholeFile,
        }
    }

    pub fn from_key(key: &str) -> Option<Language> {
        Self::ALL.iter().copied().find(|lang| lang.key() == key)
    }

    /// First registered language claiming the extension (case-insensitive).
    pub fn from_extension(extension: &str) -> Option<Language> {
        let extension = extension.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|lang| lang.extensions().contains(&extension.as_str()))
    }

    pub fn from_path(path: &str) -> Option<Language> {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Every language whose extension set contains `extension`.
    pub fn all_for_extension(extension: &str) -> impl Iterator<Item = Language> {
        let extension = extension.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .filter(move |lang| lang.extensions().contains(&extension.as_str()))
    }
}
