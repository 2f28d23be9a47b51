use markloom::ast::{CustomNode, Link};
use markloom::block::{BlockContinue, BlockParser, BlockParserFactory, BlockStart, MatchedBlockParser, ParserState};
use markloom::inline::delimiter::{DelimiterProcessor, DelimiterRun, wrap_delimited};
use markloom::inline::link::{LinkInfo, LinkProcessor, LinkResult};
use markloom::inline::{InlineContentParser, InlineContentParserFactory, InlineParserState, ParsedInline};
use markloom::references::LinkReferenceMap;
use markloom::scanner::Scanner;
use markloom::source::SourceLine;
use markloom::{
    AttributeProvider, Attributes, ConfigError, Document, Extension, HtmlRenderer, HtmlRendererBuilder, NodeId,
    NodeValue, Parser, ParserBuilder, PostProcessor,
};
use pretty_assertions::assert_eq;

fn custom(name: &str, class: Option<&str>, literal: Option<String>) -> CustomNode {
    let mut node = CustomNode::new(name);
    if let Some(class) = class {
        node.attributes.insert("class".to_string(), class.to_string());
    }
    node.literal = literal;
    node
}

fn render(parser: &Parser, renderer: &HtmlRenderer, input: &str) -> String {
    renderer.render(&parser.parse(input))
}

// Block extensions

/// `::: name` ... `:::` fenced containers.
struct ContainerFactory;

struct ContainerParser {
    name: String,
}

impl BlockParserFactory for ContainerFactory {
    fn try_start(&self, state: &ParserState<'_>, _matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        if state.indent() >= 4 {
            return None;
        }
        let line = &state.line().content;
        let name = line[state.next_non_space_index()..].strip_prefix(":::")?.trim();
        if name.is_empty() {
            return None;
        }
        let parser = ContainerParser { name: name.to_string() };
        Some(BlockStart::of(vec![Box::new(parser)]).at_index(line.len()))
    }
}

impl BlockParser for ContainerParser {
    fn node_value(&self) -> NodeValue {
        let mut node = custom("container", Some(&self.name), None);
        node.container = true;
        NodeValue::CustomBlock(node)
    }

    fn is_container(&self) -> bool {
        true
    }

    fn can_contain(&mut self, _document: &mut Document, _node: NodeId, _child: &NodeValue) -> bool {
        true
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        let rest = &state.line().content[state.next_non_space_index()..];
        if state.indent() < 4 && rest.trim_end() == ":::" {
            return Some(BlockContinue::Finished);
        }
        Some(BlockContinue::AtIndex(state.index()))
    }
}

/// `$$` ... `$$` math blocks, kept verbatim.
struct MathFactory;

#[derive(Default)]
struct MathParser {
    lines: Vec<String>,
}

impl BlockParserFactory for MathFactory {
    fn try_start(&self, state: &ParserState<'_>, _matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
        let line = &state.line().content;
        if state.indent() >= 4 || line[state.next_non_space_index()..].trim_end() != "$$" {
            return None;
        }
        Some(BlockStart::of(vec![Box::new(MathParser::default())]).at_index(line.len()))
    }
}

impl BlockParser for MathParser {
    fn node_value(&self) -> NodeValue {
        NodeValue::CustomBlock(custom("math", Some("math"), None))
    }

    fn try_continue(&mut self, state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
        if state.line().content[state.next_non_space_index()..].trim_end() == "$$" {
            return Some(BlockContinue::Finished);
        }
        Some(BlockContinue::AtIndex(state.index()))
    }

    fn add_line(&mut self, line: SourceLine) {
        self.lines.push(line.content);
    }

    fn close_block(&mut self, document: &mut Document, node: NodeId) {
        // The first line is what followed the opening `$$`.
        let mut literal = String::new();
        for line in self.lines.iter().skip(1) {
            literal.push_str(line);
            literal.push('\n');
        }
        if let NodeValue::CustomBlock(custom) = document.value_mut(node) {
            custom.literal = Some(literal);
        }
    }
}

#[test]
fn custom_container_block() {
    let parser = Parser::builder().block_parser_factory(ContainerFactory).build().unwrap();
    let renderer = HtmlRenderer::builder().node_tag("container", "div").build();
    assert_eq!(
        render(&parser, &renderer, "::: note\nsome *content*\n\n- item\n:::\nafter\n"),
        "<div class=\"note\">\n<p>some <em>content</em></p>\n<ul>\n<li>item</li>\n</ul>\n</div>\n<p>after</p>\n"
    );
}

#[test]
fn custom_container_closes_at_end_of_input() {
    let parser = Parser::builder().block_parser_factory(ContainerFactory).build().unwrap();
    let document = parser.parse("::: tip\n> quoted");
    let container = document.first_child(document.root()).unwrap();
    assert!(matches!(document.value(container), NodeValue::CustomBlock(c) if c.name == "container"));
    let quote = document.first_child(container).unwrap();
    assert_eq!(document.value(quote), &NodeValue::BlockQuote);
}

#[test]
fn custom_leaf_block() {
    let parser = Parser::builder().block_parser_factory(MathFactory).build().unwrap();
    let renderer = HtmlRenderer::builder().node_tag("math", "div").build();
    assert_eq!(
        render(&parser, &renderer, "$$\nx < *y*\n\nz\n$$\n"),
        "<div class=\"math\">x &lt; *y*\n\nz\n</div>\n"
    );
}

#[test]
fn custom_block_factories_take_priority() {
    // `***` is also a thematic break.
    struct RuleFactory;
    struct RuleParser;
    impl BlockParserFactory for RuleFactory {
        fn try_start(&self, state: &ParserState<'_>, _matched: &MatchedBlockParser<'_>) -> Option<BlockStart> {
            let line = &state.line().content;
            (line[state.next_non_space_index()..].trim_end() == "***")
                .then(|| BlockStart::of(vec![Box::new(RuleParser)]).at_index(line.len()))
        }
    }
    impl BlockParser for RuleParser {
        fn node_value(&self) -> NodeValue {
            NodeValue::CustomBlock(custom("stars", None, Some("***".to_string())))
        }

        fn try_continue(&mut self, _state: &ParserState<'_>, _node: NodeId) -> Option<BlockContinue> {
            None
        }
    }

    let parser = Parser::builder().block_parser_factory(RuleFactory).build().unwrap();
    let renderer = HtmlRenderer::builder().node_tag("stars", "div").build();
    assert_eq!(render(&parser, &renderer, "***\n---\n"), "<div>***</div>\n<hr />\n");
}

// Delimiter processors

/// `~~text~~`
struct Strikethrough;

impl DelimiterProcessor for Strikethrough {
    fn opening_character(&self) -> char {
        '~'
    }

    fn closing_character(&self) -> char {
        '~'
    }

    fn min_length(&self) -> usize {
        2
    }

    fn process(&self, document: &mut Document, opener: &DelimiterRun<'_>, closer: &DelimiterRun<'_>) -> usize {
        if opener.length() >= 2 && closer.length() >= 2 {
            wrap_delimited(document, opener, closer, 2, NodeValue::CustomInline(custom("strikethrough", None, None)));
            2
        } else {
            0
        }
    }
}

/// `~text~`
struct Subscript;

impl DelimiterProcessor for Subscript {
    fn opening_character(&self) -> char {
        '~'
    }

    fn closing_character(&self) -> char {
        '~'
    }

    fn process(&self, document: &mut Document, opener: &DelimiterRun<'_>, closer: &DelimiterRun<'_>) -> usize {
        wrap_delimited(document, opener, closer, 1, NodeValue::CustomInline(custom("subscript", None, None)));
        1
    }
}

/// `{text}`, an asymmetric pair.
struct Braces;

impl DelimiterProcessor for Braces {
    fn opening_character(&self) -> char {
        '{'
    }

    fn closing_character(&self) -> char {
        '}'
    }

    fn process(&self, document: &mut Document, opener: &DelimiterRun<'_>, closer: &DelimiterRun<'_>) -> usize {
        wrap_delimited(document, opener, closer, 1, NodeValue::CustomInline(custom("braced", None, None)));
        1
    }
}

struct StrikethroughExtension;

impl Extension for StrikethroughExtension {
    fn extend_parser(&self, builder: ParserBuilder) -> ParserBuilder {
        builder.delimiter_processor(Strikethrough)
    }

    fn extend_renderer(&self, builder: HtmlRendererBuilder) -> HtmlRendererBuilder {
        builder.node_tag("strikethrough", "del")
    }
}

#[test]
fn strikethrough_extension() {
    let parser = Parser::builder().extension(&StrikethroughExtension).build().unwrap();
    let renderer = HtmlRenderer::builder().extension(&StrikethroughExtension).build();
    assert_eq!(
        render(&parser, &renderer, "a ~~b *c*~~ d ~e~"),
        "<p>a <del>b <em>c</em></del> d ~e~</p>\n"
    );
    assert_eq!(render(&parser, &renderer, "~~unclosed"), "<p>~~unclosed</p>\n");
}

#[test]
fn staggered_delimiter_processors() {
    let parser = Parser::builder()
        .delimiter_processor(Strikethrough)
        .delimiter_processor(Subscript)
        .build()
        .unwrap();
    let renderer = HtmlRenderer::builder()
        .node_tag("strikethrough", "del")
        .node_tag("subscript", "sub")
        .build();
    assert_eq!(
        render(&parser, &renderer, "H~2~O and ~~gone~~"),
        "<p>H<sub>2</sub>O and <del>gone</del></p>\n"
    );
}

#[test]
fn asymmetric_delimiter_processor() {
    let parser = Parser::builder().delimiter_processor(Braces).build().unwrap();
    let renderer = HtmlRenderer::builder().node_tag("braced", "span").build();
    assert_eq!(render(&parser, &renderer, "a {b *c*} d"), "<p>a <span>b <em>c</em></span> d</p>\n");
    assert_eq!(render(&parser, &renderer, "}a{"), "<p>}a{</p>\n");
}

#[test]
fn conflicting_delimiter_processors_are_rejected() {
    struct Fixed(char, char, usize);
    impl DelimiterProcessor for Fixed {
        fn opening_character(&self) -> char {
            self.0
        }

        fn closing_character(&self) -> char {
            self.1
        }

        fn min_length(&self) -> usize {
            self.2
        }

        fn process(&self, _document: &mut Document, _opener: &DelimiterRun<'_>, _closer: &DelimiterRun<'_>) -> usize {
            0
        }
    }

    let result = Parser::builder().delimiter_processor(Fixed('*', '!', 1)).build();
    assert_eq!(result.err(), Some(ConfigError::DelimiterConflict { delimiter: '*' }));

    let result = Parser::builder().delimiter_processor(Fixed('_', '_', 1)).build();
    assert_eq!(
        result.err(),
        Some(ConfigError::DuplicateMinLength {
            delimiter: '_',
            min_length: 1
        })
    );

    let result = Parser::builder()
        .delimiter_processor(Braces)
        .delimiter_processor(Fixed('}', '}', 2))
        .build();
    assert_eq!(result.err(), Some(ConfigError::DelimiterConflict { delimiter: '}' }));

    let result = Parser::builder().delimiter_processor(Fixed('~', '~', 0)).build();
    assert_eq!(result.err(), Some(ConfigError::InvalidMinLength { delimiter: '~' }));

    // A longer run of an emphasis character is fine.
    assert!(Parser::builder().delimiter_processor(Fixed('*', '*', 3)).build().is_ok());
}

#[test]
#[should_panic(expected = "used more characters than available")]
fn over_consuming_delimiter_processor_panics() {
    struct Greedy;
    impl DelimiterProcessor for Greedy {
        fn opening_character(&self) -> char {
            '^'
        }

        fn closing_character(&self) -> char {
            '^'
        }

        fn process(&self, _document: &mut Document, _opener: &DelimiterRun<'_>, _closer: &DelimiterRun<'_>) -> usize {
            5
        }
    }

    let parser = Parser::builder().delimiter_processor(Greedy).build().unwrap();
    parser.parse("^a^");
}

// Inline content parsers

/// `@name` mentions.
struct MentionFactory;

struct MentionParser;

impl InlineContentParserFactory for MentionFactory {
    fn trigger_characters(&self) -> Vec<char> {
        vec!['@']
    }

    fn create(&self) -> Box<dyn InlineContentParser> {
        Box::new(MentionParser)
    }
}

impl InlineContentParser for MentionParser {
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
        let scanner = state.scanner();
        scanner.advance();
        let start = scanner.mark();
        if scanner.match_while(|c| c.is_ascii_alphanumeric() || c == '_') == 0 {
            return None;
        }
        let end = scanner.mark();
        let name = scanner.text(start, end);
        let node = state.new_node(NodeValue::CustomInline(custom("mention", Some("mention"), Some(format!("@{name}")))));
        Some(ParsedInline::of(node, end))
    }
}

/// `<:name:>` emoji, sharing `<` with autolinks and inline HTML.
struct EmojiFactory;

struct EmojiParser;

impl InlineContentParserFactory for EmojiFactory {
    fn trigger_characters(&self) -> Vec<char> {
        vec!['<']
    }

    fn create(&self) -> Box<dyn InlineContentParser> {
        Box::new(EmojiParser)
    }
}

impl InlineContentParser for EmojiParser {
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
        let scanner = state.scanner();
        scanner.advance();
        if !scanner.eat(':') {
            return None;
        }
        let start = scanner.mark();
        if scanner.match_while(|c| c.is_ascii_lowercase()) == 0 {
            return None;
        }
        let name = scanner.text(start, scanner.mark());
        if !scanner.eat_str(":>") {
            return None;
        }
        let end = scanner.mark();
        let node = state.new_node(NodeValue::CustomInline(custom("emoji", Some(&name), None)));
        Some(ParsedInline::of(node, end))
    }
}

/// Numbers each `^` within a block, starting from 1.
struct CounterFactory;

struct CounterParser {
    count: usize,
}

impl InlineContentParserFactory for CounterFactory {
    fn trigger_characters(&self) -> Vec<char> {
        vec!['^']
    }

    fn create(&self) -> Box<dyn InlineContentParser> {
        Box::new(CounterParser { count: 0 })
    }
}

impl InlineContentParser for CounterParser {
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
        self.count += 1;
        state.scanner().advance();
        let position = state.scanner().mark();
        let node = state.new_node(NodeValue::CustomInline(custom("counter", None, Some(self.count.to_string()))));
        Some(ParsedInline::of(node, position))
    }
}

#[test]
fn mention_content_parser() {
    let parser = Parser::builder().inline_content_parser_factory(MentionFactory).build().unwrap();
    let renderer = HtmlRenderer::builder().node_tag("mention", "span").build();
    assert_eq!(
        render(&parser, &renderer, "hi @bob! and @ alone"),
        "<p>hi <span class=\"mention\">@bob</span>! and @ alone</p>\n"
    );
    // Code spans are not scanned for triggers.
    assert_eq!(render(&parser, &renderer, "`@bob`"), "<p><code>@bob</code></p>\n");
}

#[test]
fn custom_content_parsers_run_before_core_ones() {
    let parser = Parser::builder().inline_content_parser_factory(EmojiFactory).build().unwrap();
    let renderer = HtmlRenderer::builder().node_tag("emoji", "i").build();
    assert_eq!(
        render(&parser, &renderer, "<:smile:> <https://example.com> <b>"),
        "<p><i class=\"smile\"></i> <a href=\"https://example.com\">https://example.com</a> <b></p>\n"
    );
}

#[test]
fn content_parsers_are_created_per_block() {
    let parser = Parser::builder().inline_content_parser_factory(CounterFactory).build().unwrap();
    assert_eq!(
        render(&parser, &HtmlRenderer::new(), "a^b^\n\n# c^"),
        "<p>a1b2</p>\n<h1>c1</h1>\n"
    );
}

#[test]
#[should_panic(expected = "consumed no input")]
fn content_parser_must_consume_input() {
    struct Stuck;
    impl InlineContentParser for Stuck {
        fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
            let position = state.scanner().mark();
            let node = state.new_node(NodeValue::Text(String::new()));
            Some(ParsedInline::of(node, position))
        }
    }
    struct StuckFactory;
    impl InlineContentParserFactory for StuckFactory {
        fn trigger_characters(&self) -> Vec<char> {
            vec!['%']
        }

        fn create(&self) -> Box<dyn InlineContentParser> {
            Box::new(Stuck)
        }
    }

    let parser = Parser::builder().inline_content_parser_factory(StuckFactory).build().unwrap();
    parser.parse("100%");
}

// Link processors

/// `[Page]` without a definition links to a wiki page.
struct WikiLinks;

impl LinkProcessor for WikiLinks {
    fn process(&self, info: &LinkInfo, scanner: &mut Scanner, _definitions: &LinkReferenceMap) -> Option<LinkResult> {
        if info.image || info.label.is_some() || info.text.contains(['[', ']']) {
            return None;
        }
        let link = Link {
            destination: format!("/wiki/{}", info.text.replace(' ', "_")),
            title: None,
        };
        Some(LinkResult::wrap_text_in(NodeValue::Link(link), scanner.mark()))
    }
}

/// `[^label]` footnote references.
struct Footnotes;

impl LinkProcessor for Footnotes {
    fn process(&self, info: &LinkInfo, scanner: &mut Scanner, _definitions: &LinkReferenceMap) -> Option<LinkResult> {
        let label = info.text.strip_prefix('^')?;
        let mut node = custom("footnote-ref", None, Some(label.to_string()));
        node.attributes.insert("id".to_string(), format!("fnref-{label}"));
        Some(LinkResult::replace_with(NodeValue::CustomInline(node), scanner.mark()))
    }
}

/// `[text]{class}` spans, consuming the braces after the bracket.
struct ClassSpans;

impl LinkProcessor for ClassSpans {
    fn process(&self, _info: &LinkInfo, scanner: &mut Scanner, _definitions: &LinkReferenceMap) -> Option<LinkResult> {
        if !scanner.eat('{') {
            return None;
        }
        let start = scanner.mark();
        scanner.find('}')?;
        let class = scanner.text(start, scanner.mark());
        scanner.advance();
        Some(LinkResult::wrap_text_in(
            NodeValue::CustomInline(custom("span", Some(&class), None)),
            scanner.mark(),
        ))
    }
}

#[test]
fn link_processor_wraps_text() {
    let parser = Parser::builder().link_processor(WikiLinks).build().unwrap();
    assert_eq!(
        render(&parser, &HtmlRenderer::new(), "see [Home *Page*] or [defined]\n\n[defined]: /here\n"),
        "<p>see <a href=\"/wiki/Home_*Page*\">Home <em>Page</em></a> or <a href=\"/here\">defined</a></p>\n"
    );
}

#[test]
fn link_processor_replaces_brackets() {
    let parser = Parser::builder()
        .link_processor(Footnotes)
        .link_processor(WikiLinks)
        .build()
        .unwrap();
    let renderer = HtmlRenderer::builder().node_tag("footnote-ref", "sup").build();
    assert_eq!(
        render(&parser, &renderer, "text[^1] and [^*x*]"),
        "<p>text<sup id=\"fnref-1\">1</sup> and <sup id=\"fnref-*x*\">*x*</sup></p>\n"
    );
    // The first processor that accepts wins.
    assert_eq!(
        render(&parser, &renderer, "[Wiki]"),
        "<p><a href=\"/wiki/Wiki\">Wiki</a></p>\n"
    );
}

#[test]
fn link_processor_consumes_following_input() {
    let parser = Parser::builder().link_processor(ClassSpans).build().unwrap();
    let renderer = HtmlRenderer::builder().node_tag("span", "span").build();
    assert_eq!(
        render(&parser, &renderer, "a [b *c*]{warn} d [e]{"),
        "<p>a <span class=\"warn\">b <em>c</em></span> d [e]{</p>\n"
    );
}

#[test]
fn links_cannot_contain_processed_links() {
    let parser = Parser::builder().link_processor(WikiLinks).build().unwrap();
    assert_eq!(
        render(&parser, &HtmlRenderer::new(), "[a [b] c](/url)"),
        "<p>[a <a href=\"/wiki/b\">b</a> c](/url)</p>\n"
    );
}

// Post-processing and rendering hooks

/// Turns `(c)` in text into `©`.
struct Copyright;

impl PostProcessor for Copyright {
    fn process(&self, document: &mut Document) {
        let nodes: Vec<NodeId> = document.descendants(document.root()).collect();
        for node in nodes {
            if let NodeValue::Text(literal) = document.value_mut(node) {
                *literal = literal.replace("(c)", "\u{a9}");
            }
        }
    }
}

struct ExternalLinks;

impl AttributeProvider for ExternalLinks {
    fn set_attributes(&self, _document: &Document, _node: NodeId, tag: &str, attributes: &mut Attributes) {
        if tag == "a" && attributes.get("href").is_some_and(|href| href.starts_with("http")) {
            attributes.set("rel", "nofollow");
        }
    }
}

#[test]
fn post_processor_rewrites_text() {
    let parser = Parser::builder().post_processor(Copyright).build().unwrap();
    assert_eq!(
        render(&parser, &HtmlRenderer::new(), "(c) 2024 `(c)`"),
        "<p>\u{a9} 2024 <code>(c)</code></p>\n"
    );
}

#[test]
fn attribute_provider_sees_final_attributes() {
    let renderer = HtmlRenderer::builder().attribute_provider(ExternalLinks).build();
    assert_eq!(
        render(&Parser::new(), &renderer, "[a](https://x.org) [b](/local)"),
        "<p><a href=\"https://x.org\" rel=\"nofollow\">a</a> <a href=\"/local\">b</a></p>\n"
    );
}

#[test]
fn everything_together() {
    struct Kitchen;
    impl Extension for Kitchen {
        fn extend_parser(&self, builder: ParserBuilder) -> ParserBuilder {
            builder
                .block_parser_factory(ContainerFactory)
                .inline_content_parser_factory(MentionFactory)
                .link_processor(Footnotes)
                .post_processor(Copyright)
                .extension(&StrikethroughExtension)
        }

        fn extend_renderer(&self, builder: HtmlRendererBuilder) -> HtmlRendererBuilder {
            builder
                .node_tag("container", "section")
                .node_tag("mention", "b")
                .extension(&StrikethroughExtension)
        }
    }

    let parser = Parser::builder().extension(&Kitchen).build().unwrap();
    let renderer = HtmlRenderer::builder().extension(&Kitchen).build();
    assert_eq!(
        render(&parser, &renderer, "::: box\n~~old~~ @new[^n] (c)\n:::\n"),
        "<section class=\"box\">\n<p><del>old</del> <b class=\"mention\">@new</b>n \u{a9}</p>\n</section>\n"
    );
}
