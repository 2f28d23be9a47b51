//! The block engine: feeds input line by line through the open-block stack.
use log::{debug, trace};

use crate::ast::{Document, NodeId, NodeValue};
use crate::block::paragraph::ParagraphParser;
use crate::block::{
    BlockContinue, BlockParser, BlockParserFactory, BlockStart, LineCursor, MatchedBlockParser, ParserState,
};
use crate::characters::{CODE_BLOCK_INDENT, columns_to_next_tab_stop};
use crate::inline::{InlineContext, InlineParser};
use crate::parser::SourceSpanMode;
use crate::references::LinkReferenceMap;
use crate::source::{SourceLine, SourceSpan};

/// Root of the open-block stack.
struct DocumentBlockParser;

impl BlockParser for DocumentBlockParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::Document
    }

    fn is_container(&self) -> bool {
        true
    }

    fn can_contain(&mut self, _document: &mut Document, _node: NodeId, _child: &NodeValue) -> bool {
        true
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        Some(BlockContinue::AtIndex(state.index()))
    }
}

struct OpenBlock {
    parser: Box<dyn BlockParser>,
    node: NodeId,
    /// Byte index in the current line where this block's content starts.
    source_index: usize,
}

pub(crate) struct DocumentParser<'a> {
    factories: &'a [Box<dyn BlockParserFactory>],
    inline_context: &'a InlineContext,
    source_spans: SourceSpanMode,
    cursor: LineCursor,
    line_count: usize,
    document: Document,
    definitions: LinkReferenceMap,
    /// Root first; the last entry is the active block.
    open: Vec<OpenBlock>,
    /// Closed blocks in closing order, kept for inline parsing.
    closed: Vec<OpenBlock>,
}

impl<'a> DocumentParser<'a> {
    pub(crate) fn new(
        factories: &'a [Box<dyn BlockParserFactory>],
        inline_context: &'a InlineContext,
        source_spans: SourceSpanMode,
    ) -> Self {
        let document = Document::new();
        let root = OpenBlock {
            parser: Box::new(DocumentBlockParser),
            node: document.root(),
            source_index: 0,
        };
        DocumentParser {
            factories,
            inline_context,
            source_spans,
            cursor: LineCursor::default(),
            line_count: 0,
            document,
            definitions: LinkReferenceMap::new(),
            open: vec![root],
            closed: Vec::new(),
        }
    }

    /// Parses the whole input into a document with inline content resolved.
    pub(crate) fn parse(mut self, input: &str) -> Document {
        let (input, offset) = match input.strip_prefix('\u{FEFF}') {
            Some(rest) => (rest, '\u{FEFF}'.len_utf8()),
            None => (input, 0),
        };
        let bytes = input.as_bytes();
        let mut line_start = 0;
        while let Some(found) = input[line_start..].find(['\n', '\r']) {
            let line_break = line_start + found;
            self.parse_line(&input[line_start..line_break], offset + line_start);
            line_start = if bytes[line_break] == b'\r' && bytes.get(line_break + 1) == Some(&b'\n') {
                line_break + 2
            } else {
                line_break + 1
            };
        }
        if !input.is_empty() && (line_start == 0 || line_start < input.len()) {
            self.parse_line(&input[line_start..], offset + line_start);
        }
        self.finish()
    }

    fn parse_line(&mut self, line: &str, input_index: usize) {
        self.set_line(line, input_index);

        // The document always continues, so start at its first child.
        let mut matches = 1;
        for i in 1..self.open.len() {
            self.find_next_non_space();
            let node = self.open[i].node;
            let (active_node, active_lazy) = self.active();
            let state = ParserState {
                cursor: &self.cursor,
                document: &self.document,
                active_node,
                active_lazy,
            };
            let Some(result) = self.open[i].parser.try_continue(&state, node) else {
                break;
            };
            self.open[i].source_index = self.cursor.index;
            match result {
                BlockContinue::Finished => {
                    self.add_source_spans();
                    self.close_block_parsers(self.open.len() - i);
                    return;
                }
                BlockContinue::AtIndex(index) => self.set_new_index(index),
                BlockContinue::AtColumn(column) => self.set_new_column(column),
            }
            matches += 1;
        }

        let mut unmatched = self.open.len() - matches;
        let mut matched = matches - 1;
        let mut started_new_block = false;
        let mut last_index = self.cursor.index;

        // Only containers and paragraphs (for setext headings) can have blocks start inside them.
        let mut try_block_starts = self.open[matched].parser.is_container()
            || *self.document.value(self.open[matched].node) == NodeValue::Paragraph;
        while try_block_starts {
            last_index = self.cursor.index;
            self.find_next_non_space();

            // No block starts with a letter.
            if self.cursor.blank || (self.cursor.indent < CODE_BLOCK_INDENT && self.next_is_letter()) {
                self.set_new_index(self.cursor.next_non_space);
                break;
            }
            let Some(block_start) = self.find_block_start(matched) else {
                self.set_new_index(self.cursor.next_non_space);
                break;
            };
            assert!(
                !block_start.parsers.is_empty(),
                "a block start must contain at least one block parser"
            );

            started_new_block = true;
            let source_index = self.cursor.index;
            if unmatched > 0 {
                self.close_block_parsers(unmatched);
                unmatched = 0;
            }

            if let Some(index) = block_start.new_index {
                self.set_new_index(index);
            } else if let Some(column) = block_start.new_column {
                self.set_new_column(column);
            }

            let replaced_spans = self.replace_for(&block_start);
            for parser in block_start.parsers {
                try_block_starts = parser.is_container();
                let node = self.add_child(parser, source_index);
                if let Some(spans) = &replaced_spans {
                    self.document.set_source_spans(node, spans.clone());
                }
                matched = self.open.len() - 1;
            }
        }

        let active_lazy = self.active().1;
        if !started_new_block && !self.cursor.blank && active_lazy {
            // Lazy continuation of the active paragraph.
            if let Some(active) = self.open.last_mut() {
                active.source_index = last_index;
            }
            self.add_line();
            return;
        }

        if unmatched > 0 {
            self.close_block_parsers(unmatched);
        }
        if !self.open[matched].parser.is_container() {
            self.add_line();
        } else if !self.cursor.blank {
            self.add_child(Box::new(ParagraphParser::new()), last_index);
            self.add_line();
        } else {
            // A blank line in a container, e.g. right after an empty list item marker.
            self.add_source_spans();
        }
    }

    /// The active block's node and whether it accepts lazy continuation lines.
    fn active(&self) -> (NodeId, bool) {
        match self.open.last() {
            Some(block) => (block.node, block.parser.can_have_lazy_continuation_lines()),
            None => (self.document.root(), false),
        }
    }

    fn next_is_letter(&self) -> bool {
        self.cursor.line.content[self.cursor.next_non_space..]
            .chars()
            .next()
            .is_some_and(char::is_alphabetic)
    }

    fn find_block_start(&self, matched: usize) -> Option<BlockStart> {
        let block = &self.open[matched];
        let matched = MatchedBlockParser {
            node: block.node,
            value: self.document.value(block.node),
            paragraph_lines: block.parser.paragraph_lines(),
        };
        let (active_node, active_lazy) = self.active();
        let state = ParserState {
            cursor: &self.cursor,
            document: &self.document,
            active_node,
            active_lazy,
        };
        self.factories
            .iter()
            .find_map(|factory| factory.try_start(&state, &matched))
    }

    /// Takes paragraph lines or the whole active block for a block start that asks for it,
    /// returning the source spans the new block inherits.
    fn replace_for(&mut self, block_start: &BlockStart) -> Option<Vec<SourceSpan>> {
        let replace_active = block_start.replace_active_block_parser;
        if block_start.replace_paragraph_lines == 0 && !replace_active {
            return None;
        }
        let active_is_paragraph = self
            .open
            .last()
            .is_some_and(|block| block.parser.paragraph_lines().is_some());
        if active_is_paragraph {
            let lines = if replace_active {
                usize::MAX
            } else {
                block_start.replace_paragraph_lines
            };
            Some(self.replace_paragraph_lines(lines))
        } else if replace_active {
            Some(self.replace_active_block_parser())
        } else {
            None
        }
    }

    fn replace_paragraph_lines(&mut self, lines: usize) -> Vec<SourceSpan> {
        let spans = self
            .open
            .last_mut()
            .and_then(|block| block.parser.remove_paragraph_lines(lines))
            .unwrap_or_default();
        // With no lines left, closing also removes the paragraph from the tree.
        self.close_block_parsers(1);
        spans
    }

    /// Removes the active block without parsing its inlines.
    fn replace_active_block_parser(&mut self) -> Vec<SourceSpan> {
        assert!(self.open.len() > 1, "a block start cannot replace the document");
        let Some(mut block) = self.open.pop() else {
            return Vec::new();
        };
        block.parser.close_block(&mut self.document, block.node);
        self.document.unlink(block.node);
        self.document.source_spans(block.node).to_vec()
    }

    fn set_line(&mut self, line: &str, input_index: usize) {
        let content = if line.contains('\0') {
            line.replace('\0', "\u{FFFD}")
        } else {
            line.to_string()
        };
        let span = (self.source_spans != SourceSpanMode::None)
            .then(|| SourceSpan::new(self.line_count, 0, input_index, content.len()));
        self.line_count += 1;
        self.cursor = LineCursor {
            line: SourceLine::new(content, span),
            ..LineCursor::default()
        };
    }

    fn find_next_non_space(&mut self) {
        let content = self.cursor.line.content.as_bytes();
        let mut index = self.cursor.index;
        let mut column = self.cursor.column;
        let mut blank = true;
        while let Some(&c) = content.get(index) {
            match c {
                b' ' => column += 1,
                b'\t' => column += columns_to_next_tab_stop(column),
                _ => {
                    blank = false;
                    break;
                }
            }
            index += 1;
        }
        self.cursor.blank = blank;
        self.cursor.next_non_space = index;
        self.cursor.next_non_space_column = column;
        self.cursor.indent = column - self.cursor.column;
    }

    fn set_new_index(&mut self, new_index: usize) {
        if new_index >= self.cursor.next_non_space {
            self.cursor.index = self.cursor.next_non_space;
            self.cursor.column = self.cursor.next_non_space_column;
        }
        let length = self.cursor.line.content.len();
        while self.cursor.index < new_index && self.cursor.index != length {
            self.advance();
        }
        self.cursor.column_is_in_tab = false;
    }

    fn set_new_column(&mut self, new_column: usize) {
        if new_column >= self.cursor.next_non_space_column {
            self.cursor.index = self.cursor.next_non_space;
            self.cursor.column = self.cursor.next_non_space_column;
        }
        let length = self.cursor.line.content.len();
        while self.cursor.column < new_column && self.cursor.index != length {
            self.advance();
        }
        if self.cursor.column > new_column {
            // Overshot in the middle of a tab.
            self.cursor.index -= 1;
            self.cursor.column = new_column;
            self.cursor.column_is_in_tab = true;
        } else {
            self.cursor.column_is_in_tab = false;
        }
    }

    fn advance(&mut self) {
        let Some(c) = self.cursor.line.content[self.cursor.index..].chars().next() else {
            return;
        };
        self.cursor.index += c.len_utf8();
        if c == '\t' {
            self.cursor.column += columns_to_next_tab_stop(self.cursor.column);
        } else {
            self.cursor.column += 1;
        }
    }

    /// Adds the rest of the line to the active block.
    fn add_line(&mut self) {
        let line = &self.cursor.line;
        let index = self.cursor.index;
        let content = if self.cursor.column_is_in_tab {
            // Expand the rest of a partially consumed tab to spaces.
            let mut content = " ".repeat(columns_to_next_tab_stop(self.cursor.column));
            content.push_str(&line.content[index + 1..]);
            content
        } else {
            line.content[index..].to_string()
        };
        let span = match line.span {
            Some(span) if self.source_spans == SourceSpanMode::BlocksAndInlines && index < span.length => {
                Some(span.sub_span(index))
            }
            _ => None,
        };
        if let Some(active) = self.open.last_mut() {
            active.parser.add_line(SourceLine::new(content, span));
        }
        self.add_source_spans();
    }

    fn add_source_spans(&mut self) {
        let Some(span) = self.cursor.line.span else {
            return;
        };
        let length = self.cursor.line.content.len();
        let index = self.cursor.index;
        // The document itself gets no spans.
        for block in self.open.iter_mut().skip(1) {
            // A lazy continuation line starts before where the block expects its content.
            let block_index = block.source_index.min(index);
            if length != block_index {
                block
                    .parser
                    .add_source_span(&mut self.document, block.node, span.sub_span(block_index));
            }
        }
    }

    /// Adds a new block under the deepest open block that can contain it, closing the
    /// blocks that can't.
    fn add_child(&mut self, parser: Box<dyn BlockParser>, source_index: usize) -> NodeId {
        let value = parser.node_value();
        while let Some(active) = self.open.last_mut() {
            if active.parser.can_contain(&mut self.document, active.node, &value) {
                break;
            }
            self.close_block_parsers(1);
        }
        let parent = self.active().0;
        trace!("line {}: starting {:?}", self.line_count, value);
        let node = self.document.new_node(value);
        self.document.append_child(parent, node);
        self.open.push(OpenBlock {
            parser,
            node,
            source_index,
        });
        node
    }

    fn close_block_parsers(&mut self, count: usize) {
        for _ in 0..count {
            let Some(mut block) = self.open.pop() else {
                return;
            };
            for definition in block.parser.definitions() {
                self.definitions.add(definition);
            }
            block.parser.close_block(&mut self.document, block.node);
            trace!("line {}: closed {:?}", self.line_count, self.document.value(block.node));
            self.closed.push(block);
        }
    }

    /// Closes every open block, then parses the inline content of each.
    fn finish(mut self) -> Document {
        self.close_block_parsers(self.open.len());
        debug!(
            "parsed {} lines with {} link reference definitions",
            self.line_count,
            self.definitions.len()
        );
        let mut inline_parser = InlineParser::new(
            self.inline_context,
            &self.definitions,
            self.source_spans == SourceSpanMode::BlocksAndInlines,
        );
        for block in &mut self.closed {
            block
                .parser
                .parse_inlines(&mut inline_parser, &mut self.document, block.node);
        }
        self.document
    }
}
