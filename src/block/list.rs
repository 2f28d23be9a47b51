use crate::ast::{BulletList, Document, ListItem, NodeId, NodeValue, OrderedList};
use crate::block::{BlockContinue, BlockParser, BlockParserFactory, BlockStart, MatchedBlockParser, ParserState};
use crate::characters::{CODE_BLOCK_INDENT, columns_to_next_tab_stop};

/// A bullet or ordered list. Lists have no markers of their own; they stay open for as long
/// as list items keep being added.
pub(crate) struct ListBlockParser {
    value: NodeValue,
    had_blank_line: bool,
    lines_after_blank: usize,
}

impl BlockParser for ListBlockParser {
    fn node_value(&self) -> NodeValue {
        self.value.clone()
    }

    fn is_container(&self) -> bool {
        true
    }

    fn can_contain(&mut self, document: &mut Document, node: NodeId, child: &NodeValue) -> bool {
        if !matches!(child, NodeValue::ListItem(_)) {
            return false;
        }
        // A new item right after a blank line makes the list loose.
        if self.had_blank_line && self.lines_after_blank == 1 {
            document.value_mut(node).set_list_tight(false);
            self.had_blank_line = false;
        }
        true
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        if state.is_blank() {
            self.had_blank_line = true;
            self.lines_after_blank = 0;
        } else if self.had_blank_line {
            self.lines_after_blank += 1;
        }
        Some(BlockContinue::AtIndex(state.index()))
    }
}

pub(crate) struct ListItemParser {
    content_indent: usize,
    had_blank_line: bool,
    marker_indent: usize,
}

impl BlockParser for ListItemParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::ListItem(ListItem {
            marker_indent: self.marker_indent,
            content_indent: self.content_indent,
        })
    }

    fn is_container(&self) -> bool {
        true
    }

    fn can_contain(&mut self, document: &mut Document, node: NodeId, _child: &NodeValue) -> bool {
        // Two blocks separated by a blank line inside one item make the list loose.
        if self.had_blank_line {
            if let Some(list) = document.parent(node) {
                document.value_mut(list).set_list_tight(false);
            }
        }
        true
    }

    fn try_continue(&mut self, state: &ParserState<'_>, node: NodeId) -> Option<BlockContinue> {
        if state.is_blank() {
            // An item can begin with at most one blank line.
            state.document().first_child(node)?;
            // Blank lines inside code blocks do not affect tightness.
            self.had_blank_line = matches!(
                state.active_block_value(),
                NodeValue::Paragraph | NodeValue::ListItem(_)
            );
            return Some(BlockContinue::AtIndex(state.next_non_space_index()));
        }
        if state.indent() >= self.content_indent {
            Some(BlockContinue::AtColumn(state.column() + self.content_indent))
        } else {
            None
        }
    }
}

pub(crate) struct ListFactory;

impl BlockParserFactory for ListFactory {
    fn try_start(&self, state: &ParserState<'_>, matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        if state.indent() >= CODE_BLOCK_INDENT {
            return None;
        }
        let marker_index = state.next_non_space_index();
        let marker_column = state.column() + state.indent();
        let in_paragraph = matched.paragraph_lines().is_some();
        let (list, content_column) =
            parse_list(&state.line().content, marker_index, marker_column, in_paragraph)?;

        let item = ListItemParser {
            content_indent: content_column - state.column(),
            had_blank_line: false,
            marker_indent: state.indent(),
        };
        if lists_match(matched.value(), &list) {
            Some(BlockStart::of(vec![Box::new(item)]).at_column(content_column))
        } else {
            let list = ListBlockParser {
                value: list,
                had_blank_line: false,
                lines_after_blank: 0,
            };
            Some(BlockStart::of(vec![Box::new(list), Box::new(item)]).at_column(content_column))
        }
    }
}

/// Parses the marker at `marker_index` and finds the column where the item's content starts.
fn parse_list(line: &str, marker_index: usize, marker_column: usize, in_paragraph: bool) -> Option<(NodeValue, usize)> {
    let (list, index_after_marker) = parse_list_marker(line, marker_index)?;
    let column_after_marker = marker_column + (index_after_marker - marker_index);

    let mut content_column = column_after_marker;
    let mut has_content = false;
    for c in line[index_after_marker..].chars() {
        match c {
            '\t' => content_column += columns_to_next_tab_stop(content_column),
            ' ' => content_column += 1,
            _ => {
                has_content = true;
                break;
            }
        }
    }

    if in_paragraph {
        // Only an ordered list starting at 1 may interrupt a paragraph, and never with an empty item.
        if matches!(&list, NodeValue::OrderedList(ordered) if ordered.start != 1) || !has_content {
            return None;
        }
    }

    // With no content or indented code after the marker, the content starts one column in.
    if !has_content || content_column - column_after_marker > CODE_BLOCK_INDENT {
        content_column = column_after_marker + 1;
    }
    Some((list, content_column))
}

/// A bullet (`-`, `+`, `*`) or an ordered marker of 1 to 9 digits followed by `.` or `)`.
/// The marker must be followed by a space, a tab or the end of the line.
fn parse_list_marker(line: &str, index: usize) -> Option<(NodeValue, usize)> {
    let bytes = line.as_bytes();
    let followed_by_space = |i: usize| matches!(bytes.get(i), None | Some(b' ' | b'\t'));
    match bytes.get(index)? {
        &c @ (b'-' | b'+' | b'*') => followed_by_space(index + 1).then(|| {
            let list = NodeValue::BulletList(BulletList {
                marker: c as char,
                tight: true,
            });
            (list, index + 1)
        }),
        _ => {
            let digits = bytes[index..].iter().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 || digits > 9 {
                return None;
            }
            let delimiter_index = index + digits;
            let delimiter = match bytes.get(delimiter_index) {
                Some(b'.') => '.',
                Some(b')') => ')',
                _ => return None,
            };
            if !followed_by_space(delimiter_index + 1) {
                return None;
            }
            let start = line[index..delimiter_index].parse().ok()?;
            let list = NodeValue::OrderedList(OrderedList {
                start,
                delimiter,
                tight: true,
            });
            Some((list, delimiter_index + 1))
        }
    }
}

/// Whether a new item belongs to the already-open list `matched`.
fn lists_match(matched: &NodeValue, list: &NodeValue) -> bool {
    match (matched, list) {
        (NodeValue::BulletList(a), NodeValue::BulletList(b)) => a.marker == b.marker,
        (NodeValue::OrderedList(a), NodeValue::OrderedList(b)) => a.delimiter == b.delimiter,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullet_markers() {
        let (list, after) = parse_list_marker("- foo", 0).unwrap();
        assert_eq!(after, 1);
        assert!(matches!(list, NodeValue::BulletList(BulletList { marker: '-', .. })));
        assert!(parse_list_marker("-foo", 0).is_none());
        assert!(parse_list_marker("*", 0).is_some());
        assert!(parse_list_marker("x foo", 0).is_none());
    }

    #[test]
    fn test_ordered_markers() {
        let (list, after) = parse_list_marker("123) foo", 0).unwrap();
        assert_eq!(after, 4);
        assert_eq!(
            list,
            NodeValue::OrderedList(OrderedList {
                start: 123,
                delimiter: ')',
                tight: true,
            })
        );
        assert!(parse_list_marker("1234567890. foo", 0).is_none());
        assert!(parse_list_marker("1.foo", 0).is_none());
        assert!(parse_list_marker("1:", 0).is_none());
    }

    #[test]
    fn test_content_column() {
        assert_eq!(parse_list("- foo", 0, 0, false).map(|(_, c)| c), Some(2));
        assert_eq!(parse_list("-    foo", 0, 0, false).map(|(_, c)| c), Some(5));
        // Five spaces after the marker start an indented code block inside the item.
        assert_eq!(parse_list("-      foo", 0, 0, false).map(|(_, c)| c), Some(2));
        assert_eq!(parse_list("-", 0, 0, false).map(|(_, c)| c), Some(2));
        assert_eq!(parse_list("1.\tfoo", 0, 0, false).map(|(_, c)| c), Some(4));
    }

    #[test]
    fn test_interrupting_a_paragraph() {
        assert!(parse_list("2. foo", 0, 0, true).is_none());
        assert!(parse_list("1. foo", 0, 0, true).is_some());
        assert!(parse_list("-", 0, 0, true).is_none());
        assert!(parse_list("- bar", 0, 0, true).is_some());
    }

    #[test]
    fn test_lists_match() {
        let dash = parse_list_marker("- a", 0).unwrap().0;
        let plus = parse_list_marker("+ a", 0).unwrap().0;
        let dot = parse_list_marker("1. a", 0).unwrap().0;
        let other_dot = parse_list_marker("7. a", 0).unwrap().0;
        assert!(lists_match(&dash, &dash));
        assert!(!lists_match(&dash, &plus));
        assert!(lists_match(&dot, &other_dot));
        assert!(!lists_match(&dot, &dash));
    }
}
