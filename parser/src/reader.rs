use std::fs;
use std::path::Path;

use crate::error::{ParseError, Result};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Forward-only line cursor over one .proto source.
///
/// The file is read in full when the reader is opened, so no handle outlives
/// `open`. The depth stack only records how many scopes are open; builders use
/// it to check that every `{` they consumed was matched by a `}`.
#[derive(Debug)]
pub struct SourceReader {
    name: String,
    lines: Vec<String>,
    position: usize,
    depth: Vec<usize>,
}

impl SourceReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_text(name, &content))
    }

    pub fn from_text(name: impl Into<String>, content: &str) -> Self {
        let content = content.strip_prefix(BYTE_ORDER_MARK).unwrap_or(content);
        Self {
            name: name.into(),
            lines: content.lines().map(str::to_string).collect(),
            position: 0,
            depth: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.lines.len()
    }

    /// Returns the next trimmed line, or `None` when skipping blank lines ran
    /// off the end of the file. Calling this at end of file is an error.
    pub fn next_line(&mut self, skip_blank: bool) -> Result<Option<String>> {
        if self.is_eof() {
            return Err(ParseError::UnexpectedEof {
                source_name: self.name.clone(),
            });
        }
        while let Some(line) = self.lines.get(self.position) {
            self.position += 1;
            if skip_blank && line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line.trim().to_string()));
        }
        Ok(None)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor back to a position previously returned by `position`.
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.lines.len());
    }

    pub fn push_depth(&mut self) {
        self.depth.push(self.depth.len());
    }

    pub fn pop_depth(&mut self) -> Result<usize> {
        self.depth.pop().ok_or_else(|| ParseError::Nesting {
            source_name: self.name.clone(),
            detail: "closing brace without an open scope".to_string(),
        })
    }

    pub fn depth(&self) -> usize {
        self.depth.len()
    }
}
