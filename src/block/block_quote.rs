use crate::ast::{Document, NodeId, NodeValue};
use crate::block::{BlockContinue, BlockParser, BlockParserFactory, BlockStart, MatchedBlockParser, ParserState};
use crate::characters::{CODE_BLOCK_INDENT, is_space_or_tab};

pub(crate) struct BlockQuoteParser;

/// A `>` marker with at most three spaces of indentation.
fn is_marker(state: &ParserState<'_>) -> bool {
    state.indent() < CODE_BLOCK_INDENT && state.next_non_space_char() == Some('>')
}

/// Column after the marker and the one optional space or tab that follows it.
fn column_after_marker(state: &ParserState<'_>) -> usize {
    let mut column = state.column() + state.indent() + 1;
    let after = state.next_non_space_index() + 1;
    if state.line().content[after..].starts_with(is_space_or_tab) {
        column += 1;
    }
    column
}

impl BlockParser for BlockQuoteParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::BlockQuote
    }

    fn is_container(&self) -> bool {
        true
    }

    fn can_contain(&mut self, _document: &mut Document, _node: NodeId, _child: &NodeValue) -> bool {
        true
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        is_marker(state).then(|| BlockContinue::AtColumn(column_after_marker(state)))
    }
}

pub(crate) struct BlockQuoteFactory;

impl BlockParserFactory for BlockQuoteFactory {
    fn try_start(&self, state: &ParserState<'_>, _matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        if !is_marker(state) {
            return None;
        }
        Some(BlockStart::of(vec![Box::new(BlockQuoteParser)]).at_column(column_after_marker(state)))
    }
}
