use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{Document, NodeId, NodeValue};
use crate::block::{BlockContinue, BlockParser, BlockParserFactory, BlockStart, MatchedBlockParser, ParserState};
use crate::characters::CODE_BLOCK_INDENT;
use crate::source::SourceLine;

const TAG_NAME: &str = "[A-Za-z][A-Za-z0-9-]*";
const ATTRIBUTE_NAME: &str = "[a-zA-Z_:][a-zA-Z0-9:._-]*";
const UNQUOTED_VALUE: &str = "[^\"'=<>`\\x00-\\x20]+";
const SINGLE_QUOTED_VALUE: &str = "'[^']*'";
const DOUBLE_QUOTED_VALUE: &str = "\"[^\"]*\"";
const WHITESPACE: &str = "[ \\t\\n\\x0B\\x0C\\r]";

const BLOCK_TAGS: &str = "address|article|aside|base|basefont|blockquote|body|caption|center|col|colgroup|dd|details|dialog|dir|div|dl|dt|fieldset|figcaption|figure|footer|form|frame|frameset|h1|h2|h3|h4|h5|h6|head|header|hr|html|iframe|legend|li|link|main|menu|menuitem|nav|noframes|ol|optgroup|option|p|param|search|section|summary|table|tbody|td|tfoot|th|thead|title|tr|track|ul";

/// Opening and closing patterns for the seven kinds of HTML block. Kinds without a
/// closing pattern end at a blank line.
static BLOCK_PATTERNS: LazyLock<Vec<(Regex, Option<Regex>)>> = LazyLock::new(|| {
    let open_tag = format!(
        "<{TAG_NAME}(?:{WHITESPACE}+{ATTRIBUTE_NAME}(?:{WHITESPACE}*={WHITESPACE}*(?:{UNQUOTED_VALUE}|{SINGLE_QUOTED_VALUE}|{DOUBLE_QUOTED_VALUE}))?)*{WHITESPACE}*/?>"
    );
    let close_tag = format!("</{TAG_NAME}{WHITESPACE}*>");
    let patterns = [
        (
            format!("(?i)^<(?:script|pre|style|textarea)(?:{WHITESPACE}|>|$)"),
            Some("(?i)</(?:script|pre|style|textarea)>".to_string()),
        ),
        ("^<!--".to_string(), Some("-->".to_string())),
        ("^<[?]".to_string(), Some("\\?>".to_string())),
        ("^<![A-Za-z]".to_string(), Some(">".to_string())),
        ("^<!\\[CDATA\\[".to_string(), Some("\\]\\]>".to_string())),
        (
            format!("(?i)^</?(?:{BLOCK_TAGS})(?:{WHITESPACE}|/?>|$)"),
            None,
        ),
        (format!("(?i)^(?:{open_tag}|{close_tag}){WHITESPACE}*$"), None),
    ];
    patterns
        .into_iter()
        .map(|(open, close)| {
            let open = Regex::new(&open).unwrap();
            let close = close.map(|close| Regex::new(&close).unwrap());
            (open, close)
        })
        .collect()
});

/// Index of the kind that may not interrupt a paragraph.
const OPEN_OR_CLOSING_TAG_KIND: usize = 6;

pub(crate) struct HtmlBlockParser {
    closing_pattern: Option<&'static Regex>,
    finished: bool,
    lines: Vec<String>,
}

impl BlockParser for HtmlBlockParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::HtmlBlock {
            literal: String::new(),
        }
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        if self.finished {
            return None;
        }
        // Blocks that end at a blank line.
        if state.is_blank() && self.closing_pattern.is_none() {
            return None;
        }
        Some(BlockContinue::AtIndex(state.index()))
    }

    fn add_line(&mut self, line: SourceLine) {
        if let Some(pattern) = self.closing_pattern {
            if pattern.is_match(&line.content) {
                self.finished = true;
            }
        }
        self.lines.push(line.content);
    }

    fn close_block(&mut self, document: &mut Document, node: NodeId) {
        *document.value_mut(node) = NodeValue::HtmlBlock {
            literal: self.lines.join("\n"),
        };
    }
}

pub(crate) struct HtmlBlockFactory;

impl BlockParserFactory for HtmlBlockFactory {
    fn try_start(&self, state: &ParserState<'_>, matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        if state.indent() >= CODE_BLOCK_INDENT || state.next_non_space_char() != Some('<') {
            return None;
        }
        let rest = state.rest();
        let interrupts_paragraph = *matched.value() == NodeValue::Paragraph
            || state.active_can_have_lazy_continuation_lines();
        for (kind, (opener, closer)) in BLOCK_PATTERNS.iter().enumerate() {
            if kind == OPEN_OR_CLOSING_TAG_KIND && interrupts_paragraph {
                continue;
            }
            if opener.is_match(rest) {
                let parser = HtmlBlockParser {
                    closing_pattern: closer.as_ref(),
                    finished: false,
                    lines: Vec::new(),
                };
                return Some(BlockStart::of(vec![Box::new(parser)]).at_index(state.index()));
            }
        }
        None
    }
}
