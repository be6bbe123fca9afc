use log::trace;

use crate::comment;
use crate::error::{ParseError, Result};
use crate::line::{self, LineKind};
use crate::reader::SourceReader;

const INDENT_CHAR: char = '\t';

/// What a raw block of .proto text declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    LineComment,
    BlockComment,
    Enum,
    EnumConstant,
    Message,
    Field,
    MapField,
    ReservedField,
    Oneof,
    OneofField,
    RpcMethod,
    Service,
    /// syntax, package, import and option statements.
    Header,
}

/// One construct's raw text plus, for constructs with a body, its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    kind: BlockKind,
    head: String,
    closing: Option<String>,
    children: Vec<Block>,
    text: String,
}

impl Block {
    fn leaf(kind: BlockKind, head: impl Into<String>) -> Self {
        let head = head.into();
        let text = indented_text(&head, 0);
        Self {
            kind,
            head,
            closing: None,
            children: Vec::new(),
            text,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The declaration line, or the whole text of a comment.
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn children(&self) -> &[Block] {
        &self.children
    }

    /// Raw text as read, children indented one tab per nesting level.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, BlockKind::LineComment | BlockKind::BlockComment)
    }

    pub fn is_license(&self) -> bool {
        self.kind == BlockKind::BlockComment && comment::is_license(&self.head)
    }

    /// Cleaned comment text, or `None` for non-comment blocks.
    pub fn comment(&self) -> Option<String> {
        match self.kind {
            BlockKind::LineComment => Some(comment::clean_line_comment(&self.head)),
            BlockKind::BlockComment => Some(comment::clean_block_comment(&self.head)),
            _ => None,
        }
    }

    /// Rebuilds the raw text from head, children and closing line.
    pub fn to_source(&self) -> String {
        let mut s = indented_text(&self.head, 0);
        for child in &self.children {
            s.push_str(&indented_text(&child.to_source(), 1));
        }
        if let Some(closing) = &self.closing {
            s.push_str(&indented_text(closing, 0));
        }
        s
    }
}

pub fn indented_text(text: &str, level: usize) -> String {
    let indent: String = std::iter::repeat_n(INDENT_CHAR, level).collect();
    let mut s = String::new();
    for line in text.lines() {
        s.push_str(&indent);
        s.push_str(line);
        s.push('\n');
    }
    s
}

/// Reads a whole source into a flat list of top-level blocks.
pub fn read_blocks(reader: &mut SourceReader) -> Result<Vec<Block>> {
    BlockBuilder { reader }.read_file()
}

struct BlockBuilder<'r> {
    reader: &'r mut SourceReader,
}

impl BlockBuilder<'_> {
    fn read_file(&mut self) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        while !self.reader.is_eof() {
            let Some(raw) = self.reader.next_line(true)? else {
                break;
            };
            if line::is_line_comment(&raw) || line::is_block_comment_opener(&raw) {
                blocks.push(self.read_comment(&raw)?);
                continue;
            }
            let (code, trailing) = line::split_trailing_comment(&raw);
            let kind = line::classify(code)
                .ok_or_else(|| ParseError::structural(self.reader.name(), &raw))?;
            if let Some(comment) = trailing {
                blocks.push(Block::leaf(BlockKind::LineComment, comment));
            }
            let block = match kind {
                LineKind::EnumOpen => self.read_scope(code, BlockKind::Enum)?,
                LineKind::MessageOpen => self.read_scope(code, BlockKind::Message)?,
                LineKind::ServiceOpen => self.read_scope(code, BlockKind::Service)?,
                LineKind::Syntax | LineKind::Package | LineKind::Import | LineKind::Option => {
                    Block::leaf(BlockKind::Header, code)
                }
                _ => return Err(ParseError::structural(self.reader.name(), &raw)),
            };
            blocks.push(block);
        }
        if self.reader.depth() != 0 {
            return Err(ParseError::Nesting {
                source_name: self.reader.name().to_string(),
                detail: format!("{} scope(s) left open", self.reader.depth()),
            });
        }
        Ok(blocks)
    }

    fn next_in_scope(&mut self, opening: &str) -> Result<String> {
        let line = if self.reader.is_eof() {
            None
        } else {
            self.reader.next_line(true)?
        };
        line.ok_or_else(|| ParseError::Unclosed {
            source_name: self.reader.name().to_string(),
            opening: opening.to_string(),
        })
    }

    /// Reads everything up to the `}` matching `opening`.
    fn read_scope(&mut self, opening: &str, kind: BlockKind) -> Result<Block> {
        let mut text = indented_text(opening, 0);
        let mut children: Vec<Block> = Vec::new();

        self.reader.push_depth();
        let depth = self.reader.depth();
        let closing = loop {
            let raw = self.next_in_scope(opening)?;

            if line::is_line_comment(&raw) || line::is_block_comment_opener(&raw) {
                let comment = self.read_comment(&raw)?;
                text.push_str(&indented_text(comment.text(), 1));
                children.push(comment);
                continue;
            }

            let (code, trailing) = line::split_trailing_comment(&raw);
            let line_kind = line::classify(code).ok_or_else(|| ParseError::structural(opening, &raw))?;

            if line_kind == LineKind::CloseBrace {
                if self.reader.depth() != depth {
                    return Err(ParseError::Nesting {
                        source_name: self.reader.name().to_string(),
                        detail: format!("'{opening}' closed at depth {}", self.reader.depth()),
                    });
                }
                self.reader.pop_depth()?;
                text.push_str(&indented_text(code, 0));
                break code.to_string();
            }

            if let Some(comment) = trailing {
                let comment = Block::leaf(BlockKind::LineComment, comment);
                text.push_str(&indented_text(comment.text(), 1));
                children.push(comment);
            }

            let child = self.read_child(opening, kind, line_kind, code, &raw)?;
            text.push_str(&indented_text(child.text(), 1));
            children.push(child);
        };

        let block = Block {
            kind,
            head: opening.to_string(),
            closing: Some(closing),
            children,
            text,
        };
        trace!(">>>> {:?} block text:\n{}", kind, block.text());
        Ok(block)
    }

    fn read_child(
        &mut self,
        opening: &str,
        parent: BlockKind,
        line_kind: LineKind,
        code: &str,
        raw: &str,
    ) -> Result<Block> {
        let block = match (parent, line_kind) {
            (_, LineKind::Option) => Block::leaf(BlockKind::Header, code),

            (BlockKind::Enum, LineKind::EnumConstant) => {
                // Sanity check the ordinal before accepting the line.
                line::parse_enum_constant(code)?;
                Block::leaf(BlockKind::EnumConstant, code)
            }
            (BlockKind::Enum | BlockKind::Message, LineKind::ReservedField) => {
                Block::leaf(BlockKind::ReservedField, code)
            }

            (BlockKind::Message, LineKind::Field) => Block::leaf(BlockKind::Field, code),
            (BlockKind::Message, LineKind::MapField) => {
                // Fails early when the <key, value> types are missing.
                line::parse_map_field(code)?;
                Block::leaf(BlockKind::MapField, code)
            }
            (BlockKind::Message, LineKind::EnumOpen) => self.read_scope(code, BlockKind::Enum)?,
            (BlockKind::Message, LineKind::OneofOpen) => self.read_scope(code, BlockKind::Oneof)?,

            // No map fields, no repeated fields, no nested oneof blocks.
            (BlockKind::Oneof, LineKind::Field) => {
                if line::parse_field(code)?.repeated {
                    return Err(ParseError::structural(opening, raw));
                }
                Block::leaf(BlockKind::OneofField, code)
            }

            (BlockKind::Service, LineKind::RpcOpen) => self.read_scope(code, BlockKind::RpcMethod)?,
            (BlockKind::Service, LineKind::RpcInline) => Block::leaf(BlockKind::RpcMethod, code),

            _ => return Err(ParseError::structural(opening, raw)),
        };
        Ok(block)
    }

    fn read_comment(&mut self, first_line: &str) -> Result<Block> {
        if line::is_block_comment_opener(first_line) {
            self.read_block_comment(first_line)
        } else {
            self.read_line_comment(first_line)
        }
    }

    fn read_block_comment(&mut self, first_line: &str) -> Result<Block> {
        // A block comment can be single line.
        if first_line.len() > 2 && line::is_block_comment_closer(first_line) {
            return Ok(Block::leaf(BlockKind::BlockComment, first_line));
        }
        let mut lines = vec![first_line.to_string()];
        loop {
            if self.reader.is_eof() {
                return Err(ParseError::Unclosed {
                    source_name: self.reader.name().to_string(),
                    opening: first_line.to_string(),
                });
            }
            let Some(line) = self.reader.next_line(false)? else {
                break;
            };
            let done = line::is_block_comment_closer(&line);
            lines.push(line);
            if done {
                return Ok(Block::leaf(BlockKind::BlockComment, lines.join("\n")));
            }
        }
        Err(ParseError::Unclosed {
            source_name: self.reader.name().to_string(),
            opening: first_line.to_string(),
        })
    }

    fn read_line_comment(&mut self, first_line: &str) -> Result<Block> {
        let mut lines = vec![first_line.to_string()];
        while !self.reader.is_eof() {
            let saved = self.reader.position();
            match self.reader.next_line(true)? {
                Some(line) if line::is_line_comment(&line) => lines.push(line),
                _ => {
                    // Push the non-comment line back for the caller.
                    self.reader.seek(saved);
                    break;
                }
            }
        }
        Ok(Block::leaf(BlockKind::LineComment, lines.join("\n")))
    }
}
