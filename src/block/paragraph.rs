use crate::ast::{Document, LinkReferenceDefinition, NodeId, NodeValue};
use crate::block::link_reference::LinkReferenceDefinitionParser;
use crate::block::{BlockContinue, BlockParser, ParserState};
use crate::inline::InlineParser;
use crate::source::{SourceLine, SourceLines, SourceSpan};

/// Paragraph text. Leading link reference definitions are split off when the
/// paragraph closes.
pub(crate) struct ParagraphParser {
    definitions: LinkReferenceDefinitionParser,
}

impl ParagraphParser {
    pub(crate) fn new() -> Self {
        ParagraphParser {
            definitions: LinkReferenceDefinitionParser::new(),
        }
    }
}

impl BlockParser for ParagraphParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::Paragraph
    }

    fn can_have_lazy_continuation_lines(&self) -> bool {
        true
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        if state.is_blank() {
            None
        } else {
            Some(BlockContinue::AtIndex(state.index()))
        }
    }

    fn add_line(&mut self, line: SourceLine) {
        self.definitions.parse(line);
    }

    fn add_source_span(&mut self, _document: &mut Document, _node: NodeId, span: SourceSpan) {
        // The node gets the spans of its remaining lines when it closes.
        self.definitions.add_source_span(span);
    }

    fn paragraph_lines(&self) -> Option<&SourceLines> {
        Some(self.definitions.paragraph_lines())
    }

    fn remove_paragraph_lines(&mut self, count: usize) -> Option<Vec<SourceSpan>> {
        Some(self.definitions.remove_lines(count))
    }

    fn definitions(&mut self) -> Vec<LinkReferenceDefinition> {
        self.definitions
            .definitions()
            .into_iter()
            .map(|(definition, _)| definition)
            .collect()
    }

    fn close_block(&mut self, document: &mut Document, node: NodeId) {
        for (definition, spans) in self.definitions.definitions() {
            let definition_node = document.new_node(NodeValue::LinkReferenceDefinition(definition));
            document.set_source_spans(definition_node, spans);
            document.insert_before(node, definition_node);
        }

        if self.definitions.paragraph_lines().is_empty() {
            document.unlink(node);
        } else {
            document.set_source_spans(node, self.definitions.paragraph_source_spans().to_vec());
        }
    }

    fn parse_inlines(&mut self, inline_parser: &mut InlineParser<'_>, document: &mut Document, node: NodeId) {
        let lines = self.definitions.paragraph_lines();
        if !lines.is_empty() {
            inline_parser.parse(lines.clone(), document, node);
        }
    }
}
