/// Cursor over the lines of one parsing unit, with mark/rewind for speculative parsing
use crate::source::{SourceLine, SourceLines};

/// A saved cursor location. Positions order by line, then by byte index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    line_index: usize,
    index: usize,
}

/// Walks over `SourceLines` one character at a time. Between two lines the scanner
/// yields a `\n`; after the last line it yields nothing.
#[derive(Debug, Clone)]
pub struct Scanner {
    lines: Vec<SourceLine>,
    line_index: usize,
    index: usize,
}

impl Scanner {
    pub fn new(lines: SourceLines) -> Self {
        let mut lines = lines.into_lines();
        if lines.is_empty() {
            lines.push(SourceLine::new("", None));
        }
        Scanner {
            lines,
            line_index: 0,
            index: 0,
        }
    }

    fn line(&self) -> &str {
        &self.lines[self.line_index].content
    }

    fn has_next_line(&self) -> bool {
        self.line_index + 1 < self.lines.len()
    }

    /// The character at the cursor, `None` at the end of input.
    pub fn peek(&self) -> Option<char> {
        let line = self.line();
        if self.index < line.len() {
            line[self.index..].chars().next()
        } else if self.has_next_line() {
            Some('\n')
        } else {
            None
        }
    }

    /// The character before the cursor, `None` at the start of input.
    pub fn peek_previous(&self) -> Option<char> {
        if self.index > 0 {
            self.line()[..self.index].chars().next_back()
        } else if self.line_index > 0 {
            Some('\n')
        } else {
            None
        }
    }

    pub fn has_next(&self) -> bool {
        self.index < self.line().len() || self.has_next_line()
    }

    /// Moves past the current character. Does nothing at the end of input.
    pub fn advance(&mut self) {
        let next = self.line()[self.index..].chars().next();
        match next {
            Some(c) => self.index += c.len_utf8(),
            None => {
                if self.has_next_line() {
                    self.line_index += 1;
                    self.index = 0;
                }
            }
        }
    }

    /// Consumes `c` if it is next.
    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes `s` if the rest of the current line starts with it.
    pub fn eat_str(&mut self, s: &str) -> bool {
        if self.line()[self.index..].starts_with(s) {
            self.index += s.len();
            true
        } else {
            false
        }
    }

    /// Consumes a run of `c` and returns its length.
    pub fn match_multiple(&mut self, c: char) -> usize {
        self.match_while(|next| next == c)
    }

    /// Consumes characters while `predicate` holds and returns how many were consumed.
    pub fn match_while(&mut self, predicate: impl Fn(char) -> bool) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.advance();
            count += 1;
        }
        count
    }

    /// Consumes spaces, tabs, line endings, vertical tabs and form feeds.
    pub fn whitespace(&mut self) -> usize {
        self.match_while(|c| matches!(c, ' ' | '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r'))
    }

    /// Advances to the next `c` without consuming it. Returns the number of characters
    /// skipped, or `None` (leaving the cursor at the end) if there is no `c`.
    pub fn find(&mut self, c: char) -> Option<usize> {
        self.find_matching(|next| next == c)
    }

    pub fn find_matching(&mut self, predicate: impl Fn(char) -> bool) -> Option<usize> {
        let mut skipped = 0;
        loop {
            match self.peek() {
                Some(next) if predicate(next) => return Some(skipped),
                Some(_) => {
                    self.advance();
                    skipped += 1;
                }
                None => return None,
            }
        }
    }

    pub fn mark(&self) -> Position {
        Position {
            line_index: self.line_index,
            index: self.index,
        }
    }

    pub fn rewind(&mut self, position: Position) {
        self.line_index = position.line_index;
        self.index = position.index;
    }

    /// The lines between two marks, with their source spans.
    pub fn source(&self, begin: Position, end: Position) -> SourceLines {
        if begin.line_index == end.line_index {
            let line = &self.lines[begin.line_index];
            return SourceLines::of(line.substring(begin.index, end.index));
        }
        let mut lines = SourceLines::empty();
        let first = &self.lines[begin.line_index];
        lines.add_line(first.substring(begin.index, first.content.len()));
        for line in &self.lines[begin.line_index + 1..end.line_index] {
            lines.add_line(line.clone());
        }
        lines.add_line(self.lines[end.line_index].substring(0, end.index));
        lines
    }

    /// The text between two marks, lines joined with `\n`.
    pub fn text(&self, begin: Position, end: Position) -> String {
        self.source(begin, end).content()
    }
}
