use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::{GrammarFamily, Language};
use crate::config::ScanningConfig;
use crate::types::{truncate_chars, ChunkType, CodeChunk};

static PY_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:async\s+)?def\s+(\w+)\s*\(").expect("Invalid regex"));
static PY_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*class\s+(\w+)\s*[:(]").expect("Invalid regex"));

static JS_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*[<(]")
        .expect("Invalid regex")
});
static JS_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
    )
    .expect("Invalid regex")
});
static JS_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)")
        .expect("Invalid regex")
});
static TS_INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:declare\s+)?interface\s+([A-Za-z_$][\w$]*)").expect("Invalid regex")
});

/// A definition line found by one of the grammars.
#[derive(Debug, Clone, PartialEq)]
struct Marker {
    chunk_type: ChunkType,
    name: String,
    start_line: usize,
    preamble: bool,
}

/// Splits a file into named, contiguous chunks.
///
/// Extraction is a pure function of `(path, content)`: the resulting spans
/// cover every line of the file exactly once, in order.
#[derive(Debug, Clone)]
pub struct ChunkExtractor {
    max_chunks_per_file: usize,
    max_chunk_chars: usize,
}

impl Default for ChunkExtractor {
    fn default() -> Self {
        Self::from_config(&ScanningConfig::default())
    }
}

impl ChunkExtractor {
    pub fn new(max_chunks_per_file: usize, max_chunk_chars: usize) -> Self {
        Self {
            max_chunks_per_file: max_chunks_per_file.max(1),
            max_chunk_chars,
        }
    }

    pub fn from_config(config: &ScanningConfig) -> Self {
        Self::new(config.max_chunks_per_file, config.max_chunk_chars)
    }

    /// Chunks for one file. Unrecognized extensions yield nothing.
    pub fn extract(&self, file_path: &str, content: &str) -> Vec<CodeChunk> {
        let language = match Language::from_path(file_path) {
            Some(language) => language,
            None => return Vec::new(),
        };

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len().max(1);
        let file_name = file_name(file_path);

        let mut markers = match language.family() {
            GrammarFamily::Indentation => python_markers(&lines),
            GrammarFamily::Brace => brace_markers(&lines, language == Language::TypeScript),
            GrammarFamily::WholeFile => Vec::new(),
        };

        if markers.is_empty() {
            let chunk = CodeChunk::new(file_path, ChunkType::File, file_name, 1, total_lines, language.key())
                .with_content(self.slice(&lines, 1, total_lines))
                .with_metadata("type", "whole_file");
            return vec![chunk];
        }

        // The cap counts definitions; the preamble comes on top
        markers.truncate(self.max_chunks_per_file);
        if markers[0].start_line > 1 {
            markers.insert(
                0,
                Marker {
                    chunk_type: ChunkType::File,
                    name: file_name.clone(),
                    start_line: 1,
                    preamble: true,
                },
            );
        }

        let mut chunks = Vec::with_capacity(markers.len());
        for (idx, marker) in markers.iter().enumerate() {
            // The last kept span runs to the end of the file, even after the cap
            let end_line = markers
                .get(idx + 1)
                .map(|next| next.start_line - 1)
                .unwrap_or(total_lines);

            let chunk = CodeChunk::new(
                file_path,
                marker.chunk_type,
                marker.name.clone(),
                marker.start_line,
                end_line,
                language.key(),
            )
            .with_content(self.slice(&lines, marker.start_line, end_line));

            let chunk = if marker.preamble {
                chunk.with_metadata("type", "preamble")
            } else {
                chunk.with_metadata("extracted", true)
            };
            chunks.push(chunk);
        }

        chunks
    }

    fn slice(&self, lines: &[&str], start_line: usize, end_line: usize) -> String {
        let from = (start_line - 1).min(lines.len());
        let to = end_line.min(lines.len());
        let text = lines[from..to].join("\n");
        truncate_chars(&text, self.max_chunk_chars).to_string()
    }
}

fn file_name(file_path: &str) -> String {
    Path::new(file_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string())
}

fn python_markers(lines: &[&str]) -> Vec<Marker> {
    let mut markers = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = PY_DEF.captures(line) {
            let chunk_type = if caps[1].is_empty() {
                ChunkType::Function
            } else {
                ChunkType::Method
            };
            markers.push(Marker {
                chunk_type,
                name: caps[2].to_string(),
                start_line: idx + 1,
                preamble: false,
            });
        } else if let Some(caps) = PY_CLASS.captures(line) {
            markers.push(Marker {
                chunk_type: ChunkType::Class,
                name: caps[1].to_string(),
                start_line: idx + 1,
                preamble: false,
            });
        }
    }
    markers
}

fn brace_markers(lines: &[&str], typescript: bool) -> Vec<Marker> {
    let mut markers = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let found = if let Some(caps) = JS_CLASS.captures(line) {
            Some((ChunkType::Class, caps[1].to_string()))
        } else if let Some(caps) = JS_FUNCTION.captures(line) {
            Some((ChunkType::Function, caps[1].to_string()))
        } else if let Some(caps) = JS_BINDING.captures(line) {
            Some((ChunkType::Function, caps[1].to_string()))
        } else if typescript {
            TS_INTERFACE
                .captures(line)
                .map(|caps| (ChunkType::Class, caps[1].to_string()))
        } else {
            None
        };

        if let Some((chunk_type, name)) = found {
            markers.push(Marker {
                chunk_type,
                name,
                start_line: idx + 1,
                preamble: false,
            });
        }
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn assert_partition(chunks: &[CodeChunk], total_lines: usize) {
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start_line, 1);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_line + 1, pair[1].start_line);
        }
        for chunk in chunks {
            assert!(chunk.end_line >= chunk.start_line);
        }
        assert_eq!(chunks[chunks.len() - 1].end_line, total_lines);
    }

    #[test]
    fn test_single_python_function_spans_file() {
        let content = "def run():\n    a = 1\n    b = 2\n    c = 3\n    d = 4\n    e = 5\n    f = 6\n    g = 7\n    h = 8\n    return a\n";
        let chunks = ChunkExtractor::default().extract("main.py", content);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Function);
        assert_eq!(chunks[0].name, "run");
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 10));
        assert_eq!(chunks[0].chunk_id, "main.py:1");
        assert_eq!(chunks[0].language, "python");
    }

    #[test]
    fn test_python_classes_methods_and_preamble() {
        let content = "import os\n\nclass Service:\n    def start(self):\n        pass\n\nasync def main():\n    pass\n";
        let chunks = ChunkExtractor::default().extract("app/service.py", content);

        let kinds: Vec<_> = chunks.iter().map(|c| (c.chunk_type, c.name.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (ChunkType::File, "service.py"),
                (ChunkType::Class, "Service"),
                (ChunkType::Method, "start"),
                (ChunkType::Function, "main"),
            ]
        );
        assert_eq!(chunks[0].metadata.get("type"), Some(&Value::from("preamble")));
        assert_eq!(chunks[1].metadata.get("extracted"), Some(&Value::Bool(true)));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (3, 3));
        assert_partition(&chunks, 8);
    }

    #[test]
    fn test_javascript_declarations() {
        let content = "const express = require('express');\nexport async function handler(req) {\n  return 1;\n}\nconst add = (a, b) => a + b;\nlet double = x => x * 2;\nexport default class Widget {\n}\n";
        let chunks = ChunkExtractor::default().extract("src/index.js", content);

        let names: Vec<_> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["index.js", "handler", "add", "double", "Widget"]);
        assert_eq!(chunks[4].chunk_type, ChunkType::Class);
        assert_partition(&chunks, 8);
    }

    #[test]
    fn test_typescript_interfaces_are_classes() {
        let content = "export interface User {\n  id: string;\n}\nexport const load = async (id: string): Promise<User> => {\n  return fetchUser(id);\n};\n";
        let chunks = ChunkExtractor::default().extract("src/user.ts", content);

        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].chunk_type, chunks[0].name.as_str()), (ChunkType::Class, "User"));
        assert_eq!((chunks[1].chunk_type, chunks[1].name.as_str()), (ChunkType::Function, "load"));
        assert_eq!(chunks[1].language, "typescript");
    }

    #[test]
    fn test_interface_is_not_recognized_in_javascript() {
        let chunks = ChunkExtractor::default().extract("a.js", "interface Foo {\n}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.get("type"), Some(&Value::from("whole_file")));
    }

    #[test]
    fn test_other_languages_get_whole_file_chunk() {
        let chunks = ChunkExtractor::default().extract("cmd/main.go", "package main\n\nfunc main() {}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::File);
        assert_eq!(chunks[0].name, "main.go");
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
    }

    #[test]
    fn test_unrecognized_extension_yields_nothing() {
        assert!(ChunkExtractor::default().extract("README.md", "# hi").is_empty());
        assert!(ChunkExtractor::default().extract("Makefile", "all:").is_empty());
    }

    #[test]
    fn test_empty_file_is_one_line() {
        let chunks = ChunkExtractor::default().extract("empty.py", "");
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 1));
        assert_eq!(chunks[0].content, "");
    }

    #[test]
    fn test_cap_extends_last_chunk_to_end() {
        let content: String = (0..10).map(|i| format!("def f{}():\n    pass\n", i)).collect();
        let chunks = ChunkExtractor::new(3, 2000).extract("many.py", &content);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].name, "f2");
        assert_partition(&chunks, 20);
    }

    #[test]
    fn test_cap_keeps_fifty_definitions_after_preamble() {
        let defs: String = (0..60).map(|i| format!("def f{}():\n    pass\n", i)).collect();
        let content = format!("import os\n{}", defs);
        let chunks = ChunkExtractor::default().extract("many.py", &content);

        assert_eq!(chunks.len(), 51);
        assert_eq!(chunks[0].metadata.get("type"), Some(&Value::from("preamble")));
        assert_eq!(chunks.iter().filter(|c| c.chunk_type == ChunkType::Function).count(), 50);
        assert_eq!(chunks[50].name, "f49");
        assert_partition(&chunks, 121);
    }

    #[test]
    fn test_content_is_truncated() {
        let body = "x = 1\n".repeat(100);
        let content = format!("def big():\n{}", body);
        let chunks = ChunkExtractor::new(50, 16).extract("big.py", &content);
        assert_eq!(chunks[0].content.chars().count(), 16);
    }

    fn source_line() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(|name| format!("def {}():", name)),
            "[A-Z][a-z]{0,6}".prop_map(|name| format!("class {}:", name)),
            "[a-z]{1,8}".prop_map(|name| format!("    def {}(self):", name)),
            Just("    return 1".to_string()),
            Just(String::new()),
            "[a-z =0-9]{0,20}",
        ]
    }

    proptest! {
        #[test]
        fn prop_chunks_partition_python_files(lines in prop::collection::vec(source_line(), 0..80)) {
            let content = lines.join("\n");
            let total = content.lines().count().max(1);
            let chunks = ChunkExtractor::default().extract("gen.py", &content);

            prop_assert!(!chunks.is_empty());
            prop_assert!(chunks.len() <= 51);
            prop_assert_eq!(chunks[0].start_line, 1);
            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[0].end_line + 1, pair[1].start_line);
            }
            prop_assert_eq!(chunks[chunks.len() - 1].end_line, total);
        }

        #[test]
        fn prop_extraction_is_deterministic(lines in prop::collection::vec(source_line(), 0..40)) {
            let content = lines.join("\n");
            let extractor = ChunkExtractor::default();
            let first = serde_json::to_string(&extractor.extract("gen.py", &content)).unwrap();
            let second = serde_json::to_string(&extractor.extract("gen.py", &content)).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
