use crate::ast::{NodeId, NodeValue};
use crate::block::{BlockContinue, BlockParser, BlockParserFactory, BlockStart, MatchedBlockParser, ParserState};
use crate::characters::CODE_BLOCK_INDENT;

pub(crate) struct ThematicBreakParser;

impl BlockParser for ThematicBreakParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::ThematicBreak
    }

    fn try_continue(&mut self, _state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        // A thematic break is a single line.
        None
    }
}

pub(crate) struct ThematicBreakFactory;

impl BlockParserFactory for ThematicBreakFactory {
    fn try_start(&self, state: &ParserState<'_>, _matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        if state.indent() >= CODE_BLOCK_INDENT || !is_thematic_break(state.rest()) {
            return None;
        }
        Some(BlockStart::of(vec![Box::new(ThematicBreakParser)]).at_index(state.line().content.len()))
    }
}

/// Three or more matching `-`, `_` or `*`, with any spaces or tabs between them.
pub(crate) fn is_thematic_break(line: &str) -> bool {
    let mut dashes = 0;
    let mut underscores = 0;
    let mut asterisks = 0;
    for c in line.chars() {
        match c {
            '-' => dashes += 1,
            '_' => underscores += 1,
            '*' => asterisks += 1,
            ' ' | '\t' => {}
            _ => return false,
        }
    }
    (dashes >= 3 && underscores == 0 && asterisks == 0)
        || (underscores >= 3 && dashes == 0 && asterisks == 0)
        || (asterisks >= 3 && dashes == 0 && underscores == 0)
}
