use crate::ast::{Document, NodeId, NodeValue};
use crate::block::{BlockContinue, BlockParser, BlockParserFactory, BlockStart, MatchedBlockParser, ParserState};
use crate::characters::{CODE_BLOCK_INDENT, skip, skip_space_tab};
use crate::inline::InlineParser;
use crate::scanner::Scanner;
use crate::source::{SourceLine, SourceLines};

/// ATX (`# Title`) and setext (`Title\n===`) headings. Both are complete after one line.
pub(crate) struct HeadingParser {
    level: u8,
    content: SourceLines,
}

impl BlockParser for HeadingParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::Heading { level: self.level }
    }

    fn try_continue(&mut self, _state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        None
    }

    fn parse_inlines(&mut self, inline_parser: &mut InlineParser<'_>, document: &mut Document, node: NodeId) {
        if !self.content.is_empty() {
            inline_parser.parse(self.content.clone(), document, node);
        }
    }
}

pub(crate) struct HeadingFactory;

impl BlockParserFactory for HeadingFactory {
    fn try_start(&self, state: &ParserState<'_>, matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        if state.indent() >= CODE_BLOCK_INDENT {
            return None;
        }
        let line = state.line();
        let next_non_space = state.next_non_space_index();
        let line_end = line.content.len();

        if state.next_non_space_char() == Some('#') {
            if let Some(heading) = atx_heading(&line.substring(next_non_space, line_end)) {
                return Some(BlockStart::of(vec![Box::new(heading)]).at_index(line_end));
            }
        }

        let level = setext_heading_level(&line.content, next_non_space)?;
        let paragraph = matched.paragraph_lines()?;
        let heading = HeadingParser {
            level,
            content: paragraph.clone(),
        };
        Some(
            BlockStart::of(vec![Box::new(heading)])
                .at_index(line_end)
                .replace_paragraph_lines(paragraph.len()),
        )
    }
}

/// An opening run of 1 to 6 `#`, then a space or the end of line; an optional closing run
/// of `#` preceded by a space is dropped.
fn atx_heading(line: &SourceLine) -> Option<HeadingParser> {
    let mut scanner = Scanner::new(SourceLines::of(line.clone()));
    let level = scanner.match_multiple('#');
    if level == 0 || level > 6 {
        return None;
    }
    let level = level as u8;
    if !scanner.has_next() {
        return Some(HeadingParser {
            level,
            content: SourceLines::empty(),
        });
    }
    if !matches!(scanner.peek(), Some(' ' | '\t')) {
        return None;
    }

    scanner.whitespace();
    let start = scanner.mark();
    let mut end = start;
    let mut hash_can_end = true;
    while let Some(c) = scanner.peek() {
        match c {
            '#' => {
                if hash_can_end {
                    scanner.match_multiple('#');
                    let whitespace = scanner.whitespace();
                    // Anything after the hashes makes them part of the content.
                    if scanner.has_next() {
                        end = scanner.mark();
                    }
                    hash_can_end = whitespace > 0;
                } else {
                    scanner.advance();
                    end = scanner.mark();
                }
            }
            ' ' | '\t' => {
                hash_can_end = true;
                scanner.advance();
            }
            _ => {
                hash_can_end = false;
                scanner.advance();
                end = scanner.mark();
            }
        }
    }

    let source = scanner.source(start, end);
    let content = if source.content().is_empty() {
        SourceLines::empty()
    } else {
        source
    };
    Some(HeadingParser { level, content })
}

/// Level of a setext underline (`=` for 1, `-` for 2) starting at `index`.
fn setext_heading_level(line: &str, index: usize) -> Option<u8> {
    let (marker, level) = match line.as_bytes().get(index)? {
        b'=' => (b'=', 1),
        b'-' => (b'-', 2),
        _ => return None,
    };
    let after_marker = skip(marker, line, index + 1);
    (skip_space_tab(line, after_marker) >= line.len()).then_some(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atx(line: &str) -> Option<(u8, String)> {
        atx_heading(&SourceLine::new(line, None)).map(|h| (h.level, h.content.content()))
    }

    #[test]
    fn test_atx_levels() {
        assert_eq!(atx("# foo"), Some((1, "foo".into())));
        assert_eq!(atx("###### foo"), Some((6, "foo".into())));
        assert_eq!(atx("####### foo"), None);
        assert_eq!(atx("#5 bolt"), None);
        assert_eq!(atx("#"), Some((1, "".into())));
    }

    #[test]
    fn test_atx_closing_sequence() {
        assert_eq!(atx("## foo ##"), Some((2, "foo".into())));
        assert_eq!(atx("# foo #######   "), Some((1, "foo".into())));
        assert_eq!(atx("### foo ### b"), Some((3, "foo ### b".into())));
        assert_eq!(atx("# foo#"), Some((1, "foo#".into())));
        assert_eq!(atx("### ###"), Some((3, "".into())));
    }

    #[test]
    fn test_setext_level() {
        assert_eq!(setext_heading_level("===", 0), Some(1));
        assert_eq!(setext_heading_level("  ---  ", 2), Some(2));
        assert_eq!(setext_heading_level("= =", 0), None);
        assert_eq!(setext_heading_level("--- a", 0), None);
    }
}
