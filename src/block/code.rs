use crate::ast::{Document, FencedCodeBlock, NodeId, NodeValue};
use crate::block::{BlockContinue, BlockParser, BlockParserFactory, BlockStart, MatchedBlockParser, ParserState};
use crate::characters::{CODE_BLOCK_INDENT, is_blank, skip, skip_space_tab};
use crate::escaping::unescape_string;
use crate::source::SourceLine;

pub(crate) struct FencedCodeBlockParser {
    fence_char: char,
    opening_fence_length: usize,
    fence_indent: usize,
    first_line: Option<String>,
    other_lines: String,
}

impl FencedCodeBlockParser {
    fn new(fence_char: char, fence_length: usize, fence_indent: usize) -> Self {
        FencedCodeBlockParser {
            fence_char,
            opening_fence_length: fence_length,
            fence_indent,
            first_line: None,
            other_lines: String::new(),
        }
    }

    /// A closing fence is at least as long as the opening one, followed only by spaces or tabs.
    fn try_closing(&self, line: &str, index: usize) -> bool {
        let fences = skip(self.fence_char as u8, line, index) - index;
        fences >= self.opening_fence_length && skip_space_tab(line, index + fences) == line.len()
    }
}

impl BlockParser for FencedCodeBlockParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::FencedCodeBlock(FencedCodeBlock {
            fence_char: self.fence_char,
            fence_length: self.opening_fence_length,
            fence_indent: self.fence_indent,
            info: String::new(),
            literal: String::new(),
        })
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        let next_non_space = state.next_non_space_index();
        let line = &state.line().content;
        if state.indent() < CODE_BLOCK_INDENT
            && next_non_space < line.len()
            && self.try_closing(line, next_non_space)
        {
            return Some(BlockContinue::Finished);
        }
        // Drop up to the opening fence's indentation from content lines.
        let mut new_index = state.index();
        let mut remaining = self.fence_indent;
        while remaining > 0 && line.as_bytes().get(new_index) == Some(&b' ') {
            new_index += 1;
            remaining -= 1;
        }
        Some(BlockContinue::AtIndex(new_index))
    }

    fn add_line(&mut self, line: SourceLine) {
        if self.first_line.is_none() {
            self.first_line = Some(line.content);
        } else {
            self.other_lines.push_str(&line.content);
            self.other_lines.push('\n');
        }
    }

    fn close_block(&mut self, document: &mut Document, node: NodeId) {
        let info = self.first_line.take().unwrap_or_default();
        let info = unescape_string(info.trim_matches([' ', '\t'])).into_owned();
        if let NodeValue::FencedCodeBlock(block) = document.value_mut(node) {
            block.info = info;
            block.literal = std::mem::take(&mut self.other_lines);
        }
    }
}

pub(crate) struct FencedCodeBlockFactory;

impl BlockParserFactory for FencedCodeBlockFactory {
    fn try_start(&self, state: &ParserState<'_>, _matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        let indent = state.indent();
        if indent >= CODE_BLOCK_INDENT {
            return None;
        }
        let next_non_space = state.next_non_space_index();
        let parser = check_opener(&state.line().content, next_non_space, indent)?;
        let fence_length = parser.opening_fence_length;
        Some(BlockStart::of(vec![Box::new(parser)]).at_index(next_non_space + fence_length))
    }
}

/// Three or more backticks or tildes. A backtick fence's info string may not contain backticks.
fn check_opener(line: &str, index: usize, indent: usize) -> Option<FencedCodeBlockParser> {
    let rest = &line[index..];
    let backticks = rest.bytes().take_while(|&b| b == b'`').count();
    let tildes = rest.bytes().take_while(|&b| b == b'~').count();
    if backticks >= 3 {
        if rest[backticks..].contains('`') {
            return None;
        }
        Some(FencedCodeBlockParser::new('`', backticks, indent))
    } else if tildes >= 3 {
        Some(FencedCodeBlockParser::new('~', tildes, indent))
    } else {
        None
    }
}

pub(crate) struct IndentedCodeBlockParser {
    lines: Vec<String>,
}

impl BlockParser for IndentedCodeBlockParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::IndentedCodeBlock {
            literal: String::new(),
        }
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        if state.indent() >= CODE_BLOCK_INDENT {
            Some(BlockContinue::AtColumn(state.column() + CODE_BLOCK_INDENT))
        } else if state.is_blank() {
            Some(BlockContinue::AtIndex(state.next_non_space_index()))
        } else {
            None
        }
    }

    fn add_line(&mut self, line: SourceLine) {
        self.lines.push(line.content);
    }

    fn close_block(&mut self, document: &mut Document, node: NodeId) {
        // Trailing blank lines are not part of the block.
        let last_non_blank = self.lines.iter().rposition(|line| !is_blank(line));
        let mut literal = String::new();
        if let Some(last) = last_non_blank {
            for line in &self.lines[..=last] {
                literal.push_str(line);
                literal.push('\n');
            }
        }
        *document.value_mut(node) = NodeValue::IndentedCodeBlock { literal };
    }
}

pub(crate) struct IndentedCodeBlockFactory;

impl BlockParserFactory for IndentedCodeBlockFactory {
    fn try_start(&self, state: &ParserState<'_>, _matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        // An indented code block cannot interrupt a paragraph.
        if state.indent() >= CODE_BLOCK_INDENT
            && !state.is_blank()
            && *state.active_block_value() != NodeValue::Paragraph
        {
            let parser = IndentedCodeBlockParser { lines: Vec::new() };
            return Some(BlockStart::of(vec![Box::new(parser)]).at_column(state.column() + CODE_BLOCK_INDENT));
        }
        None
    }
}
