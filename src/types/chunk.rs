use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Granularity of an extracted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    File,
    Function,
    Class,
    Method,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::File => "file",
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Method => "method",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(ChunkType::File),
            "function" | "func" => Ok(ChunkType::Function),
            "class" => Ok(ChunkType::Class),
            "method" => Ok(ChunkType::Method),
            other => Err(format!("unknown chunk type: {}", other)),
        }
    }
}

/// A named, contiguous span of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub chunk_id: String,
    pub file_path: String,
    pub chunk_type: ChunkType,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub language: String,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl CodeChunk {
    pub fn new(
        file_path: impl Into<String>,
        chunk_type: ChunkType,
        name: impl Into<String>,
        start_line: usize,
        end_line: usize,
        language: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            chunk_id: Self::make_id(&file_path, start_line),
            file_path,
            chunk_type,
            name: name.into(),
            start_line,
            end_line: end_line.max(start_line),
            language: language.into(),
            content: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn make_id(file_path: &str, start_line: usize) -> String {
        format!("{}:{}", file_path, start_line)
    }

    pub fn with_content(mut self, content: String) -> Self {
        self.content = content;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// Truncates `text` to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
