//! Inline parsing: turns the text of a leaf block into inline nodes.
//!
//! Text is scanned left to right. Brackets and delimiter runs are first added as plain
//! text nodes and recorded on two stacks; links are resolved when a `]` is reached and
//! emphasis once the enclosing link or the whole block is complete.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::trace;

use crate::ast::{Document, Link, NodeId, NodeValue};
use crate::characters::{is_punctuation, is_whitespace};
use crate::error::ConfigError;
use crate::escaping::unescape_string;
use crate::references::LinkReferenceMap;
use crate::scanner::{Position, Scanner};
use crate::source::SourceLines;

pub(crate) mod content;
pub mod delimiter;
pub mod link;
pub(crate) mod link_scanner;

use delimiter::{DelimiterProcessor, DelimiterProcessors, DelimiterRun};
use link::{LinkInfo, LinkProcessor, LinkResult};

/// Longest link label, in characters, that is still considered a label.
const MAX_LABEL_LENGTH: usize = 999;

/// Parses an inline construct that starts with one of its factory's trigger characters.
pub trait InlineContentParser {
    /// Called with the scanner at a trigger character. Returning `None` leaves the
    /// character to the other parsers; the scanner is rewound either way.
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline>;
}

/// Creates an `InlineContentParser` for each block whose inline content gets parsed.
pub trait InlineContentParserFactory: Send + Sync {
    fn trigger_characters(&self) -> Vec<char>;

    fn create(&self) -> Box<dyn InlineContentParser>;
}

/// What an `InlineContentParser` gets to work with.
pub struct InlineParserState<'p> {
    scanner: &'p mut Scanner,
    document: &'p mut Document,
    definitions: &'p LinkReferenceMap,
}

impl InlineParserState<'_> {
    pub fn scanner(&mut self) -> &mut Scanner {
        self.scanner
    }

    pub fn document(&mut self) -> &mut Document {
        self.document
    }

    pub fn definitions(&self) -> &LinkReferenceMap {
        self.definitions
    }

    /// Creates a detached node. The returned node of a `ParsedInline` is appended by the
    /// inline parser.
    pub fn new_node(&mut self, value: NodeValue) -> NodeId {
        self.document.new_node(value)
    }
}

/// A node produced by an `InlineContentParser`, and where parsing continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInline {
    node: NodeId,
    position: Position,
}

impl ParsedInline {
    pub fn of(node: NodeId, position: Position) -> Self {
        ParsedInline { node, position }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

/// Characters at which plain text stops.
struct SpecialCharacters {
    ascii: [bool; 128],
    other: HashSet<char>,
}

impl SpecialCharacters {
    fn new() -> Self {
        SpecialCharacters {
            ascii: [false; 128],
            other: HashSet::new(),
        }
    }

    fn insert(&mut self, c: char) {
        match self.ascii.get_mut(c as usize) {
            Some(flag) => *flag = true,
            None => {
                self.other.insert(c);
            }
        }
    }

    fn contains(&self, c: char) -> bool {
        match self.ascii.get(c as usize) {
            Some(&flag) => flag,
            None => self.other.contains(&c),
        }
    }
}

/// Inline extension points, shared by every block parsed with one parser configuration.
pub(crate) struct InlineContext {
    content_parser_factories: Vec<Arc<dyn InlineContentParserFactory>>,
    /// Indices into `content_parser_factories`, by trigger character, in priority order.
    triggers: HashMap<char, Vec<usize>>,
    delimiter_processors: HashMap<char, Arc<dyn DelimiterProcessor>>,
    link_processors: Vec<Arc<dyn LinkProcessor>>,
    special_characters: SpecialCharacters,
}

impl InlineContext {
    /// Custom content parser factories take priority over the core ones for the same
    /// trigger character.
    pub(crate) fn new(
        content_parser_factories: Vec<Arc<dyn InlineContentParserFactory>>,
        delimiter_processors: Vec<Arc<dyn DelimiterProcessor>>,
        link_processors: Vec<Arc<dyn LinkProcessor>>,
    ) -> Result<Self, ConfigError> {
        let mut processors = DelimiterProcessors::core();
        for processor in delimiter_processors {
            processors.add(processor)?;
        }
        Ok(Self::assemble(content_parser_factories, processors, link_processors))
    }

    fn assemble(
        mut content_parser_factories: Vec<Arc<dyn InlineContentParserFactory>>,
        delimiter_processors: DelimiterProcessors,
        link_processors: Vec<Arc<dyn LinkProcessor>>,
    ) -> Self {
        content_parser_factories.extend(content::core_factories());
        let delimiter_processors = delimiter_processors.into_map();

        let mut special_characters = SpecialCharacters::new();
        for c in ['\n', '[', ']', '!'] {
            special_characters.insert(c);
        }
        let mut triggers: HashMap<char, Vec<usize>> = HashMap::new();
        for (index, factory) in content_parser_factories.iter().enumerate() {
            for c in factory.trigger_characters() {
                special_characters.insert(c);
                triggers.entry(c).or_default().push(index);
            }
        }
        for &c in delimiter_processors.keys() {
            special_characters.insert(c);
        }

        InlineContext {
            content_parser_factories,
            triggers,
            delimiter_processors,
            link_processors,
            special_characters,
        }
    }
}

impl Default for InlineContext {
    fn default() -> Self {
        Self::assemble(Vec::new(), DelimiterProcessors::core(), Vec::new())
    }
}

/// A run of delimiter characters, each added to the document as its own text node.
/// Delimiters form a doubly linked list through indices into `InlineParser::delimiters`.
struct Delimiter {
    characters: Vec<NodeId>,
    delimiter: char,
    can_open: bool,
    can_close: bool,
    original_length: usize,
    previous: Option<usize>,
    next: Option<usize>,
}

/// An opening `[` or `![`.
#[derive(Clone, Copy)]
struct Bracket {
    /// The text node holding the bracket.
    node: NodeId,
    /// Position of the `[` or `!`.
    start: Position,
    /// Position right after the `[`.
    content_position: Position,
    image: bool,
    /// Links may not contain other links; brackets before a finished link get deactivated.
    active: bool,
    /// The last delimiter before this bracket, which bounds emphasis inside the link text.
    previous_delimiter: Option<usize>,
    /// Whether another bracket followed this one.
    bracket_after: bool,
}

/// Parses the inline content of leaf blocks. Block parsers receive one in
/// [`BlockParser::parse_inlines`](crate::block::BlockParser::parse_inlines).
pub struct InlineParser<'a> {
    context: &'a InlineContext,
    definitions: &'a LinkReferenceMap,
    content_parsers: Vec<Box<dyn InlineContentParser>>,
    scanner: Scanner,
    /// Whether the parser was configured to give inline nodes spans at all.
    inline_spans: bool,
    include_source_spans: bool,
    trailing_spaces: usize,
    delimiters: Vec<Delimiter>,
    last_delimiter: Option<usize>,
    brackets: Vec<Bracket>,
    /// Brackets below this index are already deactivated.
    bracket_floor: usize,
}

impl<'a> InlineParser<'a> {
    pub(crate) fn new(context: &'a InlineContext, definitions: &'a LinkReferenceMap, inline_spans: bool) -> Self {
        InlineParser {
            context,
            definitions,
            content_parsers: Vec::new(),
            scanner: Scanner::new(SourceLines::empty()),
            inline_spans,
            include_source_spans: false,
            trailing_spaces: 0,
            delimiters: Vec::new(),
            last_delimiter: None,
            brackets: Vec::new(),
            bracket_floor: 0,
        }
    }

    /// Parses `lines` and appends the resulting inline nodes to `block`. Inline nodes get
    /// source spans when inline spans are enabled and the lines carry them.
    pub fn parse(&mut self, lines: SourceLines, document: &mut Document, block: NodeId) {
        self.reset(lines);
        while let Some(c) = self.scanner.peek() {
            self.parse_inline(c, document, block);
        }
        self.process_delimiters(document, None);
        merge_text_nodes(document, block);
        trace!("parsed inlines of {:?}", document.value(block));
    }

    fn reset(&mut self, lines: SourceLines) {
        self.include_source_spans = self.inline_spans && !lines.source_spans().is_empty();
        self.scanner = Scanner::new(lines);
        self.trailing_spaces = 0;
        self.delimiters.clear();
        self.last_delimiter = None;
        self.brackets.clear();
        self.bracket_floor = 0;
        // Content parsers may keep state, so each block gets fresh ones.
        self.content_parsers = self
            .context
            .content_parser_factories
            .iter()
            .map(|factory| factory.create())
            .collect();
    }

    /// Parses the construct at the scanner, which is at `c`, and appends what it produced.
    fn parse_inline(&mut self, c: char, document: &mut Document, block: NodeId) {
        let context = self.context;
        if c == '\n' {
            let node = self.parse_line_break(document);
            document.append_child(block, node);
            return;
        }
        self.trailing_spaces = 0;
        match c {
            '[' => return self.parse_open_bracket(document, block),
            '!' => return self.parse_bang(document, block),
            ']' => return self.parse_close_bracket(document, block),
            _ => {}
        }
        if !context.special_characters.contains(c) {
            return self.parse_text(document, block);
        }

        if let Some(indices) = context.triggers.get(&c) {
            let start = self.scanner.mark();
            for &index in indices {
                let mut state = InlineParserState {
                    scanner: &mut self.scanner,
                    document: &mut *document,
                    definitions: self.definitions,
                };
                let Some(parsed) = self.content_parsers[index].try_parse(&mut state) else {
                    self.scanner.rewind(start);
                    continue;
                };
                assert!(parsed.position > start, "inline content parser for {c:?} consumed no input");
                self.scanner.rewind(parsed.position);
                if self.include_source_spans && document.source_spans(parsed.node).is_empty() {
                    let spans = self.scanner.source(start, parsed.position).source_spans();
                    document.set_source_spans(parsed.node, spans);
                }
                document.append_child(block, parsed.node);
                return;
            }
        }

        if let Some(processor) = context.delimiter_processors.get(&c)
            && self.parse_delimiters(processor.as_ref(), c, document, block)
        {
            return;
        }
        self.parse_text(document, block);
    }

    /// A text node for the input between two positions.
    fn text_node(&self, document: &mut Document, begin: Position, end: Position) -> NodeId {
        let source = self.scanner.source(begin, end);
        let node = document.new_node(NodeValue::Text(source.content()));
        if self.include_source_spans {
            document.set_source_spans(node, source.source_spans());
        }
        node
    }

    /// Plain text up to the next special character. Spaces before a line ending are
    /// dropped (and remembered for a hard break), as is whitespace at the end.
    fn parse_text(&mut self, document: &mut Document, block: NodeId) {
        let special_characters = &self.context.special_characters;
        let start = self.scanner.mark();
        self.scanner.advance();
        let end_char = loop {
            match self.scanner.peek() {
                Some(c) if !special_characters.contains(c) => self.scanner.advance(),
                end => break end,
            }
        };

        let source = self.scanner.source(start, self.scanner.mark());
        let mut content = source.content();
        match end_char {
            Some('\n') => {
                let trimmed = content.trim_end_matches(' ').len();
                self.trailing_spaces = content.len() - trimmed;
                content.truncate(trimmed);
            }
            None => {
                let trimmed = content.trim_end_matches([' ', '\t']).len();
                content.truncate(trimmed);
            }
            Some(_) => {}
        }
        if content.is_empty() {
            return;
        }
        let node = document.new_node(NodeValue::Text(content));
        if self.include_source_spans {
            document.set_source_spans(node, source.source_spans());
        }
        document.append_child(block, node);
    }

    fn parse_line_break(&mut self, document: &mut Document) -> NodeId {
        self.scanner.advance();
        let value = if self.trailing_spaces >= 2 {
            NodeValue::HardLineBreak
        } else {
            NodeValue::SoftLineBreak
        };
        self.trailing_spaces = 0;
        document.new_node(value)
    }

    /// A run of delimiter characters. Returns false if the run is shorter than the
    /// processor's minimum, leaving it to be parsed as text.
    fn parse_delimiters(
        &mut self,
        processor: &dyn DelimiterProcessor,
        delimiter: char,
        document: &mut Document,
        block: NodeId,
    ) -> bool {
        let before = self.scanner.peek_previous();
        let start = self.scanner.mark();
        let length = self.scanner.match_multiple(delimiter);
        if length < processor.min_length() {
            self.scanner.rewind(start);
            return false;
        }
        let after = self.scanner.peek();
        let (can_open, can_close) = flanking(before, after, delimiter, processor);

        self.scanner.rewind(start);
        let mut characters = Vec::with_capacity(length);
        let mut begin = start;
        while self.scanner.eat(delimiter) {
            let end = self.scanner.mark();
            let node = self.text_node(document, begin, end);
            document.append_child(block, node);
            characters.push(node);
            begin = end;
        }

        let index = self.delimiters.len();
        self.delimiters.push(Delimiter {
            characters,
            delimiter,
            can_open,
            can_close,
            original_length: length,
            previous: self.last_delimiter,
            next: None,
        });
        if let Some(previous) = self.last_delimiter {
            self.delimiters[previous].next = Some(index);
        }
        self.last_delimiter = Some(index);
        true
    }

    fn parse_open_bracket(&mut self, document: &mut Document, block: NodeId) {
        let start = self.scanner.mark();
        self.scanner.advance();
        let content_position = self.scanner.mark();
        let node = self.text_node(document, start, content_position);
        document.append_child(block, node);
        self.add_bracket(node, start, content_position, false);
    }

    /// `![` opens an image; any other `!` is text.
    fn parse_bang(&mut self, document: &mut Document, block: NodeId) {
        let start = self.scanner.mark();
        self.scanner.advance();
        let image = self.scanner.eat('[');
        let end = self.scanner.mark();
        let node = self.text_node(document, start, end);
        document.append_child(block, node);
        if image {
            self.add_bracket(node, start, end, true);
        }
    }

    fn add_bracket(&mut self, node: NodeId, start: Position, content_position: Position, image: bool) {
        if let Some(last) = self.brackets.last_mut() {
            last.bracket_after = true;
        }
        self.brackets.push(Bracket {
            node,
            start,
            content_position,
            image,
            active: true,
            previous_delimiter: self.last_delimiter,
            bracket_after: false,
        });
    }

    fn remove_last_bracket(&mut self) {
        self.brackets.pop();
        self.bracket_floor = self.bracket_floor.min(self.brackets.len());
    }

    /// Tries to close the last bracket as a link or image; otherwise `]` is text.
    fn parse_close_bracket(&mut self, document: &mut Document, block: NodeId) {
        let before_close = self.scanner.mark();
        self.scanner.advance();
        let after_close = self.scanner.mark();

        let Some(opener) = self.brackets.last() else {
            let node = self.text_node(document, before_close, after_close);
            return document.append_child(block, node);
        };
        if opener.active
            && let Some(node) = self.parse_link_or_image(document, before_close, after_close)
        {
            return document.append_child(block, node);
        }

        self.scanner.rewind(after_close);
        self.remove_last_bracket();
        let node = self.text_node(document, before_close, after_close);
        document.append_child(block, node);
    }

    /// Inline link, then reference link, then the custom link processors.
    fn parse_link_or_image(&mut self, document: &mut Document, before_close: Position, after_close: Position) -> Option<NodeId> {
        let context = self.context;
        let opener = *self.brackets.last()?;

        // `[text](destination "title")`
        if let Some((destination, title)) = self.parse_inline_destination_title() {
            let value = link_value(opener.image, destination, title);
            return Some(self.wrap_bracket(document, opener, value));
        }
        self.scanner.rewind(after_close);

        // `[text][label]`, `[text][]` or `[text]`. Even `[text](` may be a reference.
        let label = self.parse_link_label();
        if label.is_none() {
            self.scanner.rewind(after_close);
        }
        let reference = match label.as_deref() {
            Some(label) if !label.is_empty() => Some(label.to_string()),
            // Text containing a bracket cannot be a label.
            _ if opener.bracket_after => None,
            _ => Some(self.scanner.text(opener.content_position, before_close)),
        };
        let definition = reference
            .as_deref()
            .filter(|reference| reference.chars().count() <= MAX_LABEL_LENGTH)
            .and_then(|reference| self.definitions.get(reference));
        if let Some(definition) = definition {
            let value = link_value(opener.image, definition.destination.clone(), definition.title.clone());
            return Some(self.wrap_bracket(document, opener, value));
        }
        if context.link_processors.is_empty() {
            return None;
        }

        let info = LinkInfo {
            image: opener.image,
            text: self.scanner.text(opener.content_position, before_close),
            label,
            after_close,
        };
        let processor_start = self.scanner.mark();
        for processor in &context.link_processors {
            let Some(result) = processor.process(&info, &mut self.scanner, self.definitions) else {
                self.scanner.rewind(processor_start);
                continue;
            };
            let position = result.position();
            assert!(position >= after_close, "link processor continued before the closing bracket");
            self.scanner.rewind(position);
            return Some(match result {
                LinkResult::Wrap { value, .. } => self.wrap_bracket(document, opener, value),
                LinkResult::Replace { value, .. } => self.replace_bracket(document, opener, value),
            });
        }
        None
    }

    /// `(destination "title")` right after the `]`.
    fn parse_inline_destination_title(&mut self) -> Option<(String, Option<String>)> {
        let scanner = &mut self.scanner;
        if !scanner.eat('(') {
            return None;
        }
        scanner.whitespace();
        let start = scanner.mark();
        if !link_scanner::scan_link_destination(scanner) {
            return None;
        }
        let raw = scanner.text(start, scanner.mark());
        let raw = match raw.strip_prefix('<') {
            Some(inner) => &inner[..inner.len() - 1],
            None => raw.as_str(),
        };
        let destination = unescape_string(raw).into_owned();

        let mut title = None;
        if scanner.whitespace() >= 1 {
            let start = scanner.mark();
            if link_scanner::scan_link_title(scanner) {
                let raw = scanner.text(start, scanner.mark());
                title = Some(unescape_string(&raw[1..raw.len() - 1]).into_owned());
            }
            scanner.whitespace();
        }
        scanner.eat(')').then_some((destination, title))
    }

    /// `[label]` right after the `]`: `Some("")` for `[]`, `None` if there is no valid label.
    fn parse_link_label(&mut self) -> Option<String> {
        let scanner = &mut self.scanner;
        if !scanner.eat('[') {
            return None;
        }
        let start = scanner.mark();
        if !link_scanner::scan_link_label_content(scanner) {
            return None;
        }
        let end = scanner.mark();
        if !scanner.eat(']') {
            return None;
        }
        let label = scanner.text(start, end);
        (label.chars().count() <= MAX_LABEL_LENGTH).then_some(label)
    }

    /// Moves everything after the bracket's node into a new `value` node. `opener` is the
    /// last bracket.
    fn wrap_bracket(&mut self, document: &mut Document, opener: Bracket, value: NodeValue) -> NodeId {
        let wrapper = document.new_node(value);
        let mut next = document.next_sibling(opener.node);
        while let Some(node) = next {
            next = document.next_sibling(node);
            document.append_child(wrapper, node);
        }
        if self.include_source_spans {
            let spans = self.scanner.source(opener.start, self.scanner.mark()).source_spans();
            document.set_source_spans(wrapper, spans);
        }

        self.process_delimiters(document, opener.previous_delimiter);
        document.unlink(opener.node);
        self.remove_last_bracket();

        // No links in links: earlier `[` can no longer form one.
        if !opener.image {
            for bracket in &mut self.brackets[self.bracket_floor..] {
                if !bracket.image {
                    bracket.active = false;
                }
            }
            self.bracket_floor = self.brackets.len();
        }
        wrapper
    }

    /// Replaces the bracket's node and everything after it with a new `value` node.
    /// `opener` is the last bracket.
    fn replace_bracket(&mut self, document: &mut Document, opener: Bracket, value: NodeValue) -> NodeId {
        while let Some(last) = self.last_delimiter
            && self.last_delimiter != opener.previous_delimiter
        {
            self.remove_delimiter(last);
        }
        let replacement = document.new_node(value);
        if self.include_source_spans {
            let spans = self.scanner.source(opener.start, self.scanner.mark()).source_spans();
            document.set_source_spans(replacement, spans);
        }
        self.remove_last_bracket();

        let mut next = Some(opener.node);
        while let Some(node) = next {
            next = document.next_sibling(node);
            document.unlink(node);
        }
        replacement
    }

    fn run(&self, index: usize) -> DelimiterRun<'_> {
        let delimiter = &self.delimiters[index];
        DelimiterRun {
            characters: &delimiter.characters,
            can_open: delimiter.can_open,
            can_close: delimiter.can_close,
            original_length: delimiter.original_length,
        }
    }

    /// Matches closers with openers above `stack_bottom`, letting the delimiter processors
    /// create nodes, then drops every delimiter above `stack_bottom`.
    fn process_delimiters(&mut self, document: &mut Document, stack_bottom: Option<usize>) {
        if self.last_delimiter == stack_bottom {
            return;
        }
        let context = self.context;
        // Lowest opener worth searching for, per closer kind. Emphasis only rejects an
        // opener for the rule of 3, which depends on nothing but the closer's character,
        // whether it can also open, and its length modulo 3.
        let mut openers_bottom: HashMap<(char, bool, usize), Option<usize>> = HashMap::new();

        let mut closer = self.last_delimiter;
        while let Some(index) = closer
            && self.delimiters[index].previous != stack_bottom
        {
            closer = self.delimiters[index].previous;
        }

        while let Some(closer_index) = closer {
            let delimiter = &self.delimiters[closer_index];
            let Some(processor) = context
                .delimiter_processors
                .get(&delimiter.delimiter)
                .filter(|_| delimiter.can_close)
            else {
                closer = delimiter.next;
                continue;
            };
            let opening_character = processor.opening_character();
            let key = (delimiter.delimiter, delimiter.can_open, delimiter.original_length % 3);
            let bottom = openers_bottom.get(&key).copied().unwrap_or(stack_bottom);

            let emphasis = matches!(delimiter.delimiter, '*' | '_');

            let mut used = 0;
            let mut potential_opener_found = false;
            let mut opener = delimiter.previous;
            while let Some(index) = opener
                && opener != stack_bottom
                && opener != bottom
            {
                let candidate = &self.delimiters[index];
                if candidate.can_open && candidate.delimiter == opening_character {
                    potential_opener_found = true;
                    let (opener_run, closer_run) = (self.run(index), self.run(closer_index));
                    used = processor.process(document, &opener_run, &closer_run);
                    if used > 0 {
                        assert!(
                            used <= opener_run.length() && used <= closer_run.length(),
                            "delimiter processor for {opening_character:?} used more characters than available"
                        );
                        break;
                    }
                }
                opener = candidate.previous;
            }

            let Some(opener_index) = opener.filter(|_| used > 0) else {
                let next = self.delimiters[closer_index].next;
                // Other processors may reject an opener for its current length, which can
                // still change, so only a search without any candidate is final for them.
                if emphasis || !potential_opener_found {
                    openers_bottom.insert(key, self.delimiters[closer_index].previous);
                    if !self.delimiters[closer_index].can_open {
                        // Can neither open nor close anymore; its nodes stay as text.
                        self.remove_delimiter(closer_index);
                    }
                }
                closer = next;
                continue;
            };

            // The processor has wrapped the nodes between the runs; the used characters go.
            let opener_characters = &mut self.delimiters[opener_index].characters;
            let keep = opener_characters.len() - used;
            for node in opener_characters.drain(keep..) {
                document.unlink(node);
            }
            for node in self.delimiters[closer_index].characters.drain(..used) {
                document.unlink(node);
            }
            self.remove_delimiters_between(opener_index, closer_index);

            if self.delimiters[opener_index].characters.is_empty() {
                self.remove_delimiter(opener_index);
            }
            if self.delimiters[closer_index].characters.is_empty() {
                closer = self.delimiters[closer_index].next;
                self.remove_delimiter(closer_index);
            }
        }

        while let Some(last) = self.last_delimiter
            && self.last_delimiter != stack_bottom
        {
            self.remove_delimiter(last);
        }
    }

    fn remove_delimiters_between(&mut self, opener: usize, closer: usize) {
        let mut delimiter = self.delimiters[closer].previous;
        while let Some(index) = delimiter
            && index != opener
        {
            delimiter = self.delimiters[index].previous;
            self.remove_delimiter(index);
        }
    }

    /// Unlinks a delimiter from the stack. Its text nodes stay in the document.
    fn remove_delimiter(&mut self, index: usize) {
        let Delimiter { previous, next, .. } = self.delimiters[index];
        if let Some(previous) = previous {
            self.delimiters[previous].next = next;
        }
        match next {
            Some(next) => self.delimiters[next].previous = previous,
            None => self.last_delimiter = previous,
        }
    }
}

/// Whether a delimiter run can open and/or close, from the characters around it.
/// The start and end of the input count as whitespace.
fn flanking(before: Option<char>, after: Option<char>, delimiter: char, processor: &dyn DelimiterProcessor) -> (bool, bool) {
    let before_whitespace = before.is_none_or(is_whitespace);
    let before_punctuation = before.is_some_and(is_punctuation);
    let after_whitespace = after.is_none_or(is_whitespace);
    let after_punctuation = after.is_some_and(is_punctuation);

    let left_flanking =
        !after_whitespace && (!after_punctuation || before_whitespace || before_punctuation);
    let right_flanking =
        !before_whitespace && (!before_punctuation || after_whitespace || after_punctuation);

    if delimiter == '_' {
        (
            left_flanking && (!right_flanking || before_punctuation),
            right_flanking && (!left_flanking || after_punctuation),
        )
    } else {
        (
            left_flanking && delimiter == processor.opening_character(),
            right_flanking && delimiter == processor.closing_character(),
        )
    }
}

fn link_value(image: bool, destination: String, title: Option<String>) -> NodeValue {
    let link = Link { destination, title };
    if image { NodeValue::Image(link) } else { NodeValue::Link(link) }
}

/// Merges adjacent text nodes below `block`, joining their source spans.
fn merge_text_nodes(document: &mut Document, block: NodeId) {
    let nodes: Vec<NodeId> = document.descendants(block).collect();
    for node in nodes {
        let NodeValue::Text(literal) = document.value(node) else {
            continue;
        };
        let Some(previous) = document.previous_sibling(node) else {
            continue;
        };
        if !matches!(document.value(previous), NodeValue::Text(_)) {
            continue;
        }
        let literal = literal.clone();
        if let NodeValue::Text(previous_literal) = document.value_mut(previous) {
            previous_literal.push_str(&literal);
        }
        let spans = document.source_spans(node).to_vec();
        document.merge_source_spans(previous, &spans);
        document.unlink(node);
    }
}
