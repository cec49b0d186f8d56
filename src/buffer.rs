//! Character sources feeding the lexer.
//!
//! A buffer yields one character at a time with a single character of
//! lookahead and keeps track of line, column and the leading indentation of
//! the current physical line, which is what lets the lexer emit
//! `Indent`/`Dedent` tokens without re-scanning.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// End-of-input sentinel returned by `peek` once the source is exhausted.
pub const EOF_CHAR: char = '\0';

pub trait Buffer {
    /// Current character without consuming it.
    fn peek(&self) -> char;

    /// Advance to the next character.
    fn consume(&mut self);

    fn line(&self) -> usize;
    fn col(&self) -> usize;

    /// Number of leading whitespace columns of the current physical line.
    fn indent(&self) -> usize;

    /// True when the current line holds nothing but whitespace.
    fn empty_line(&self) -> bool;

    fn file_name(&self) -> &str;

    fn next_char(&mut self) -> char {
        self.consume();
        self.peek()
    }
}

/// Shared cursor logic over an in-memory character vector.
struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    indent: usize,
    empty_line: bool,
}

impl Cursor {
    fn new(source: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let mut cursor = Self {
            chars,
            pos: 0,
            line: 1,
            col: 0,
            indent: 0,
            empty_line: true,
        };
        cursor.count_indent();
        cursor
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or(EOF_CHAR)
    }

    fn consume(&mut self) {
        let c = self.peek();
        if c == EOF_CHAR {
            return;
        }

        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
            self.count_indent();
        } else {
            self.col += 1;
            if !c.is_whitespace() {
                self.empty_line = false;
            }
        }
    }

    // Measure the leading whitespace of the line starting at `pos`.
    fn count_indent(&mut self) {
        let mut indent = 0;
        let mut empty = true;
        for &c in &self.chars[self.pos..] {
            match c {
                ' ' => indent += 1,
                '\t' => indent += 4,
                '\n' => break,
                _ => {
                    empty = false;
                    break;
                }
            }
        }
        self.indent = indent;
        self.empty_line = empty;
    }
}

/// File-backed buffer, the production provider.
pub struct FileBuffer {
    file_name: String,
    cursor: Cursor,
}

impl FileBuffer {
    pub fn open(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        Ok(Self {
            file_name: path.display().to_string(),
            cursor: Cursor::new(&source),
        })
    }
}

impl Buffer for FileBuffer {
    fn peek(&self) -> char {
        self.cursor.peek()
    }

    fn consume(&mut self) {
        self.cursor.consume();
    }

    fn line(&self) -> usize {
        self.cursor.line
    }

    fn col(&self) -> usize {
        self.cursor.col
    }

    fn indent(&self) -> usize {
        self.cursor.indent
    }

    fn empty_line(&self) -> bool {
        self.cursor.empty_line
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// String-backed buffer used by the test suite and the REPL-style driver.
pub struct StringBuffer {
    cursor: Cursor,
}

impl StringBuffer {
    pub fn new(source: &str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }
}

impl Buffer for StringBuffer {
    fn peek(&self) -> char {
        self.cursor.peek()
    }

    fn consume(&mut self) {
        self.cursor.consume();
    }

    fn line(&self) -> usize {
        self.cursor.line
    }

    fn col(&self) -> usize {
        self.cursor.col
    }

    fn indent(&self) -> usize {
        self.cursor.indent
    }

    fn empty_line(&self) -> bool {
        self.cursor.empty_line
    }

    fn file_name(&self) -> &str {
        "<string>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_line_and_column() {
        let mut buf = StringBuffer::new("ab\ncd");
        assert_eq!(buf.peek(), 'a');
        assert_eq!(buf.line(), 1);
        buf.consume();
        buf.consume();
        assert_eq!(buf.peek(), '\n');
        buf.consume();
        assert_eq!(buf.line(), 2);
        assert_eq!(buf.col(), 0);
        assert_eq!(buf.peek(), 'c');
    }

    #[test]
    fn measures_leading_indent() {
        let mut buf = StringBuffer::new("a:\n    b\nc");
        assert_eq!(buf.indent(), 0);
        while buf.peek() != '\n' {
            buf.consume();
        }
        buf.consume();
        assert_eq!(buf.indent(), 4);
        assert!(!buf.empty_line());
    }

    #[test]
    fn flags_empty_lines() {
        let mut buf = StringBuffer::new("\n  \nx");
        assert!(buf.empty_line());
        buf.consume();
        assert!(buf.empty_line());
    }

    #[test]
    fn peek_at_end_is_eof() {
        let mut buf = StringBuffer::new("x");
        buf.consume();
        assert_eq!(buf.peek(), EOF_CHAR);
        buf.consume();
        assert_eq!(buf.peek(), EOF_CHAR);
    }
}
