//! Block-level parsing: the parser and factory traits that the block engine drives,
//! plus the core block parsers.
use serde::{Deserialize, Serialize};

use crate::ast::{Document, LinkReferenceDefinition, NodeId, NodeValue};
use crate::inline::InlineParser;
use crate::source::{SourceLine, SourceLines, SourceSpan};

pub(crate) mod block_quote;
pub(crate) mod code;
pub(crate) mod document;
pub(crate) mod heading;
pub(crate) mod html;
pub(crate) mod link_reference;
pub(crate) mod list;
pub(crate) mod paragraph;
pub(crate) mod thematic_break;

/// Parser for one open block. Created by a `BlockParserFactory` when the block starts and
/// kept on the open-block stack until the block closes.
pub trait BlockParser {
    /// The value of the node created for this block.
    fn node_value(&self) -> NodeValue;

    fn is_container(&self) -> bool {
        false
    }

    fn can_have_lazy_continuation_lines(&self) -> bool {
        false
    }

    /// Whether a new child block may be added. Called on the deepest open block;
    /// returning false closes it and asks its parent.
    fn can_contain(&mut self, _document: &mut Document, _node: NodeId, _child: &NodeValue) -> bool {
        false
    }

    /// Tries to continue this block on the current line. `None` means the block does not
    /// continue.
    fn try_continue(&mut self, state: &ParserState<'_>, node: NodeId) -> Option<BlockContinue>;

    fn add_line(&mut self, _line: SourceLine) {}

    fn add_source_span(&mut self, document: &mut Document, node: NodeId, span: SourceSpan) {
        document.add_source_span(node, span);
    }

    /// The lines of a paragraph that can still be claimed by a new block (e.g. a setext heading).
    fn paragraph_lines(&self) -> Option<&SourceLines> {
        None
    }

    /// Gives up the last `count` paragraph lines, returning their spans. Only paragraphs
    /// support this.
    fn remove_paragraph_lines(&mut self, _count: usize) -> Option<Vec<SourceSpan>> {
        None
    }

    /// Link reference definitions found in this block, collected before it closes.
    fn definitions(&mut self) -> Vec<LinkReferenceDefinition> {
        Vec::new()
    }

    fn close_block(&mut self, _document: &mut Document, _node: NodeId) {}

    /// Runs inline parsing over the block's text, once all blocks are closed.
    fn parse_inlines(&mut self, _inline_parser: &mut InlineParser<'_>, _document: &mut Document, _node: NodeId) {}
}

/// Recognizes the start of a block kind.
pub trait BlockParserFactory: Send + Sync {
    fn try_start(&self, state: &ParserState<'_>, matched: &MatchedBlockParser<'_>) -> Option<BlockStart>;
}

/// How an open block continues on the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockContinue {
    /// Continue, with the line content starting at this byte index.
    AtIndex(usize),
    /// Continue, with the line content starting at this column.
    AtColumn(usize),
    /// The block is complete including this line.
    Finished,
}

/// Result of a successful `BlockParserFactory::try_start`.
pub struct BlockStart {
    pub(crate) parsers: Vec<Box<dyn BlockParser>>,
    pub(crate) new_index: Option<usize>,
    pub(crate) new_column: Option<usize>,
    pub(crate) replace_paragraph_lines: usize,
    pub(crate) replace_active_block_parser: bool,
}

impl BlockStart {
    pub fn of(parsers: Vec<Box<dyn BlockParser>>) -> Self {
        BlockStart {
            parsers,
            new_index: None,
            new_column: None,
            replace_paragraph_lines: 0,
            replace_active_block_parser: false,
        }
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.new_index = Some(index);
        self
    }

    pub fn at_column(mut self, column: usize) -> Self {
        self.new_column = Some(column);
        self
    }

    /// Absorbs the last `lines` lines of the paragraph being interrupted into the new block.
    pub fn replace_paragraph_lines(mut self, lines: usize) -> Self {
        self.replace_paragraph_lines = lines;
        self
    }

    /// Replaces the deepest open block with the new one.
    pub fn replace_active_block_parser(mut self) -> Self {
        self.replace_active_block_parser = true;
        self
    }
}

/// Cursor state of the line being parsed, handed to block parsers and factories.
#[derive(Debug, Clone, Default)]
pub(crate) struct LineCursor {
    pub(crate) line: SourceLine,
    pub(crate) index: usize,
    pub(crate) column: usize,
    pub(crate) column_is_in_tab: bool,
    pub(crate) next_non_space: usize,
    pub(crate) next_non_space_column: usize,
    pub(crate) indent: usize,
    pub(crate) blank: bool,
}

/// Read-only view of the block engine for the current line.
pub struct ParserState<'a> {
    pub(crate) cursor: &'a LineCursor,
    pub(crate) document: &'a Document,
    pub(crate) active_node: NodeId,
    pub(crate) active_lazy: bool,
}

impl ParserState<'_> {
    pub fn line(&self) -> &SourceLine {
        &self.cursor.line
    }

    /// Byte index of the cursor in the current line.
    pub fn index(&self) -> usize {
        self.cursor.index
    }

    pub fn next_non_space_index(&self) -> usize {
        self.cursor.next_non_space
    }

    pub fn column(&self) -> usize {
        self.cursor.column
    }

    /// Columns of indentation from the cursor to the next non-space character.
    pub fn indent(&self) -> usize {
        self.cursor.indent
    }

    pub fn is_blank(&self) -> bool {
        self.cursor.blank
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    /// The deepest open block, which may be a paragraph that failed to continue.
    pub fn active_block(&self) -> NodeId {
        self.active_node
    }

    pub fn active_block_value(&self) -> &NodeValue {
        self.document.value(self.active_node)
    }

    pub fn active_can_have_lazy_continuation_lines(&self) -> bool {
        self.active_lazy
    }

    /// The character at the next non-space position, if any.
    pub(crate) fn next_non_space_char(&self) -> Option<char> {
        self.cursor.line.content[self.cursor.next_non_space..].chars().next()
    }

    /// Content of the current line from the next non-space position on.
    pub(crate) fn rest(&self) -> &str {
        &self.cursor.line.content[self.cursor.next_non_space..]
    }
}

/// The deepest block that matched the current line, offered to factories.
pub struct MatchedBlockParser<'a> {
    pub(crate) node: NodeId,
    pub(crate) value: &'a NodeValue,
    pub(crate) paragraph_lines: Option<&'a SourceLines>,
}

impl MatchedBlockParser<'_> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn value(&self) -> &NodeValue {
        self.value
    }

    /// Lines of the matched paragraph, if the matched block is a paragraph with content.
    pub fn paragraph_lines(&self) -> Option<&SourceLines> {
        self.paragraph_lines.filter(|lines| !lines.is_empty())
    }
}

/// The core block kinds, in the order their factories are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    BlockQuote,
    Heading,
    FencedCodeBlock,
    HtmlBlock,
    ThematicBreak,
    List,
    IndentedCodeBlock,
}

impl BlockType {
    pub const ALL: [BlockType; 7] = [
        BlockType::BlockQuote,
        BlockType::Heading,
        BlockType::FencedCodeBlock,
        BlockType::HtmlBlock,
        BlockType::ThematicBreak,
        BlockType::List,
        BlockType::IndentedCodeBlock,
    ];

    pub(crate) fn factory(self) -> Box<dyn BlockParserFactory> {
        match self {
            BlockType::BlockQuote => Box::new(block_quote::BlockQuoteFactory),
            BlockType::Heading => Box::new(heading::HeadingFactory),
            BlockType::FencedCodeBlock => Box::new(code::FencedCodeBlockFactory),
            BlockType::HtmlBlock => Box::new(html::HtmlBlockFactory),
            BlockType::ThematicBreak => Box::new(thematic_break::ThematicBreakFactory),
            BlockType::List => Box::new(list::ListFactory),
            BlockType::IndentedCodeBlock => Box::new(code::IndentedCodeBlockFactory),
        }
    }
}
