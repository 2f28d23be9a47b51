//! The parser entry point and its builder
use std::collections::HashSet;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::ast::Document;
use crate::block::document::DocumentParser;
use crate::block::{BlockParserFactory, BlockType};
use crate::error::ConfigError;
use crate::inline::delimiter::DelimiterProcessor;
use crate::inline::link::LinkProcessor;
use crate::inline::{InlineContentParserFactory, InlineContext};
use crate::renderer::HtmlRendererBuilder;

/// Which nodes get source spans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceSpanMode {
    #[default]
    None,
    Blocks,
    BlocksAndInlines,
}

/// Runs over the finished document, e.g. to rewrite text nodes across inline boundaries.
pub trait PostProcessor: Send + Sync {
    fn process(&self, document: &mut Document);
}

/// A bundle of parser and renderer additions.
pub trait Extension {
    fn extend_parser(&self, builder: ParserBuilder) -> ParserBuilder {
        builder
    }

    fn extend_renderer(&self, builder: HtmlRendererBuilder) -> HtmlRendererBuilder {
        builder
    }
}

/// Parses CommonMark text into a `Document`. Reusable and shareable between threads.
pub struct Parser {
    block_factories: Vec<Box<dyn BlockParserFactory>>,
    inline_context: InlineContext,
    post_processors: Vec<Arc<dyn PostProcessor>>,
    source_span_mode: SourceSpanMode,
}

impl Parser {
    /// A parser for plain CommonMark.
    pub fn new() -> Self {
        Parser {
            block_factories: BlockType::ALL.iter().map(|block_type| block_type.factory()).collect(),
            inline_context: InlineContext::default(),
            post_processors: Vec::new(),
            source_span_mode: SourceSpanMode::None,
        }
    }

    pub fn builder() -> ParserBuilder {
        ParserBuilder::default()
    }

    /// Parses `input`. Every string is valid input.
    pub fn parse(&self, input: &str) -> Document {
        debug!("parsing {} bytes", input.len());
        let mut document =
            DocumentParser::new(&self.block_factories, &self.inline_context, self.source_span_mode).parse(input);
        for post_processor in &self.post_processors {
            post_processor.process(&mut document);
        }
        document
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures a `Parser`. Registration order is priority order throughout.
pub struct ParserBuilder {
    block_factories: Vec<Box<dyn BlockParserFactory>>,
    enabled_block_types: Vec<BlockType>,
    delimiter_processors: Vec<Arc<dyn DelimiterProcessor>>,
    content_parser_factories: Vec<Arc<dyn InlineContentParserFactory>>,
    link_processors: Vec<Arc<dyn LinkProcessor>>,
    post_processors: Vec<Arc<dyn PostProcessor>>,
    source_span_mode: SourceSpanMode,
}

impl Default for ParserBuilder {
    fn default() -> Self {
        ParserBuilder {
            block_factories: Vec::new(),
            enabled_block_types: BlockType::ALL.to_vec(),
            delimiter_processors: Vec::new(),
            content_parser_factories: Vec::new(),
            link_processors: Vec::new(),
            post_processors: Vec::new(),
            source_span_mode: SourceSpanMode::None,
        }
    }
}

impl ParserBuilder {
    /// Adds a block factory, tried before the core ones.
    pub fn block_parser_factory(mut self, factory: impl BlockParserFactory + 'static) -> Self {
        self.block_factories.push(Box::new(factory));
        self
    }

    /// Restricts the core block kinds that are recognized. Lines that would start a
    /// disabled kind become paragraph text.
    pub fn enabled_block_types(mut self, block_types: impl IntoIterator<Item = BlockType>) -> Self {
        let enabled: HashSet<BlockType> = block_types.into_iter().collect();
        self.enabled_block_types = BlockType::ALL
            .into_iter()
            .filter(|block_type| enabled.contains(block_type))
            .collect();
        self
    }

    pub fn delimiter_processor(mut self, processor: impl DelimiterProcessor + 'static) -> Self {
        self.delimiter_processors.push(Arc::new(processor));
        self
    }

    /// Adds an inline content parser factory, consulted before the core parsers that
    /// share a trigger character.
    pub fn inline_content_parser_factory(mut self, factory: impl InlineContentParserFactory + 'static) -> Self {
        self.content_parser_factories.push(Arc::new(factory));
        self
    }

    /// Adds a link processor, tried on `]` when neither an inline link nor a reference
    /// matched.
    pub fn link_processor(mut self, processor: impl LinkProcessor + 'static) -> Self {
        self.link_processors.push(Arc::new(processor));
        self
    }

    pub fn post_processor(mut self, post_processor: impl PostProcessor + 'static) -> Self {
        self.post_processors.push(Arc::new(post_processor));
        self
    }

    pub fn source_span_mode(mut self, mode: SourceSpanMode) -> Self {
        self.source_span_mode = mode;
        self
    }

    pub fn extension(self, extension: &dyn Extension) -> Self {
        extension.extend_parser(self)
    }

    /// Fails if the delimiter processors conflict with each other or with `*` and `_`.
    pub fn build(self) -> Result<Parser, ConfigError> {
        let inline_context = InlineContext::new(
            self.content_parser_factories,
            self.delimiter_processors,
            self.link_processors,
        )?;
        let mut block_factories = self.block_factories;
        block_factories.extend(self.enabled_block_types.into_iter().map(BlockType::factory));
        Ok(Parser {
            block_factories,
            inline_context,
            post_processors: self.post_processors,
            source_span_mode: self.source_span_mode,
        })
    }
}
