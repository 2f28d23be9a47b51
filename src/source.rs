/// Source positions attached to nodes, and the line fragments the parsers work on
use serde::{Deserialize, Serialize};

/// A contiguous range of input on a single line.
///
/// `column_index` and `input_index` are byte offsets, the first within the line and
/// the second within the whole input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line_index: usize,
    pub column_index: usize,
    pub input_index: usize,
    pub length: usize,
}

impl SourceSpan {
    pub fn new(line_index: usize, column_index: usize, input_index: usize, length: usize) -> Self {
        SourceSpan {
            line_index,
            column_index,
            input_index,
            length,
        }
    }

    /// The part of this span starting `begin` bytes in.
    pub fn sub_span(&self, begin: usize) -> Self {
        self.sub_span_range(begin, self.length)
    }

    pub fn sub_span_range(&self, begin: usize, end: usize) -> Self {
        let end = end.min(self.length);
        let begin = begin.min(end);
        SourceSpan {
            line_index: self.line_index,
            column_index: self.column_index + begin,
            input_index: self.input_index + begin,
            length: end - begin,
        }
    }
}

/// Appends spans, extending the last one instead when the new span continues it on the same line.
pub(crate) fn merge_spans(target: &mut Vec<SourceSpan>, spans: &[SourceSpan]) {
    for span in spans {
        match target.last_mut() {
            Some(last)
                if last.line_index == span.line_index
                    && last.column_index + last.length == span.column_index =>
            {
                last.length += span.length;
            }
            _ => target.push(*span),
        }
    }
}

/// One line of input (or the part of it a block parser kept), without its line terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLine {
    pub content: String,
    pub span: Option<SourceSpan>,
}

impl SourceLine {
    pub fn new(content: impl Into<String>, span: Option<SourceSpan>) -> Self {
        SourceLine {
            content: content.into(),
            span,
        }
    }

    pub fn substring(&self, begin: usize, end: usize) -> SourceLine {
        let content = self.content[begin..end].to_string();
        let span = self.span.and_then(|span| {
            if end > begin {
                Some(SourceSpan::new(
                    span.line_index,
                    span.column_index + begin,
                    span.input_index + begin,
                    end - begin,
                ))
            } else {
                None
            }
        });
        SourceLine { content, span }
    }
}

/// The lines making up one parsing unit, e.g. the text of a paragraph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLines {
    lines: Vec<SourceLine>,
}

impl SourceLines {
    pub fn empty() -> Self {
        SourceLines::default()
    }

    pub fn of(line: SourceLine) -> Self {
        SourceLines { lines: vec![line] }
    }

    pub fn add_line(&mut self, line: SourceLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[SourceLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drops the last `count` lines and returns them.
    pub(crate) fn remove_last(&mut self, count: usize) -> Vec<SourceLine> {
        let keep = self.lines.len().saturating_sub(count);
        self.lines.split_off(keep)
    }

    /// The text of all lines joined with `\n`.
    pub fn content(&self) -> String {
        let mut content = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                content.push('\n');
            }
            content.push_str(&line.content);
        }
        content
    }

    pub fn source_spans(&self) -> Vec<SourceSpan> {
        self.lines.iter().filter_map(|line| line.span).collect()
    }

    pub(crate) fn into_lines(self) -> Vec<SourceLine> {
        self.lines
    }
}

impl From<Vec<SourceLine>> for SourceLines {
    fn from(lines: Vec<SourceLine>) -> Self {
        SourceLines { lines }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_joins_lines() {
        let mut lines = SourceLines::empty();
        lines.add_line(SourceLine::new("foo", None));
        lines.add_line(SourceLine::new("bar", None));
        assert_eq!(lines.content(), "foo\nbar");
    }

    #[test]
    fn test_substring_keeps_span_offsets() {
        let line = SourceLine::new("> quote", Some(SourceSpan::new(3, 0, 40, 7)));
        let rest = line.substring(2, 7);
        assert_eq!(rest.content, "quote");
        assert_eq!(rest.span, Some(SourceSpan::new(3, 2, 42, 5)));
        assert_eq!(line.substring(7, 7).span, None);
    }

    #[test]
    fn test_merge_adjacent_spans() {
        let mut spans = vec![SourceSpan::new(0, 0, 0, 1)];
        merge_spans(
            &mut spans,
            &[SourceSpan::new(0, 1, 1, 3), SourceSpan::new(1, 0, 5, 2)],
        );
        assert_eq!(
            spans,
            vec![SourceSpan::new(0, 0, 0, 4), SourceSpan::new(1, 0, 5, 2)]
        );
    }
}
