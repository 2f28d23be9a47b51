//! HTML rendering of a `Document`, following the CommonMark reference output
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::ast::{CustomNode, Document, Link, NodeId, NodeValue, Visit, Visitor};
use crate::escaping::{escape_html, percent_encode_url};
use crate::parser::Extension;

/// HTML attributes in insertion order. Setting an existing name keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Adjusts the attributes of every tag the renderer writes for a node.
pub trait AttributeProvider: Send + Sync {
    fn set_attributes(&self, document: &Document, node: NodeId, tag: &str, attributes: &mut Attributes);
}

/// Rewrites link and image destinations when URL sanitizing is on.
pub trait UrlSanitizer: Send + Sync {
    fn sanitize_link_url(&self, url: &str) -> String;

    fn sanitize_image_url(&self, url: &str) -> String {
        self.sanitize_link_url(url)
    }
}

/// Keeps relative URLs and URLs with an allowed scheme; anything else becomes empty.
#[derive(Debug, Clone)]
pub struct DefaultUrlSanitizer {
    protocols: Vec<String>,
}

impl DefaultUrlSanitizer {
    pub fn new() -> Self {
        Self::with_protocols(["http", "https", "mailto", "data"])
    }

    pub fn with_protocols<I, S>(protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DefaultUrlSanitizer {
            protocols: protocols.into_iter().map(|protocol| protocol.into().to_lowercase()).collect(),
        }
    }
}

impl Default for DefaultUrlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlSanitizer for DefaultUrlSanitizer {
    fn sanitize_link_url(&self, url: &str) -> String {
        let url = url.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{c}'));
        // The scheme ends at the first ':' before any path, query or fragment.
        for (index, c) in url.char_indices() {
            match c {
                '?' | '#' | '/' => break,
                ':' => {
                    let protocol = url[..index].to_lowercase();
                    if !self.protocols.contains(&protocol) {
                        return String::new();
                    }
                    break;
                }
                _ => {}
            }
        }
        url.to_string()
    }
}

/// Renders documents to HTML.
pub struct HtmlRenderer {
    soft_break: String,
    escape_html: bool,
    percent_encode_urls: bool,
    url_sanitizer: Option<Arc<dyn UrlSanitizer>>,
    attribute_providers: Vec<Arc<dyn AttributeProvider>>,
    /// Tags for custom node kinds, by node name.
    node_tags: HashMap<String, String>,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        HtmlRendererBuilder::default().build()
    }

    pub fn builder() -> HtmlRendererBuilder {
        HtmlRendererBuilder::default()
    }

    pub fn render(&self, document: &Document) -> String {
        let mut writer = HtmlWriter {
            renderer: self,
            output: String::new(),
        };
        document.walk(document.root(), &mut writer);
        writer.output
    }

    /// Renders into `sink`. Errors from the sink are returned unchanged.
    pub fn render_to<W: io::Write>(&self, document: &Document, sink: &mut W) -> io::Result<()> {
        sink.write_all(self.render(document).as_bytes())
    }

    fn attributes(&self, document: &Document, node: NodeId, tag: &str, mut attributes: Attributes) -> Attributes {
        for provider in &self.attribute_providers {
            provider.set_attributes(document, node, tag, &mut attributes);
        }
        attributes
    }

    fn url(&self, url: &str) -> String {
        if self.percent_encode_urls {
            percent_encode_url(url)
        } else {
            url.to_string()
        }
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HtmlRendererBuilder {
    soft_break: String,
    escape_html: bool,
    percent_encode_urls: bool,
    url_sanitizer: Option<Arc<dyn UrlSanitizer>>,
    attribute_providers: Vec<Arc<dyn AttributeProvider>>,
    node_tags: HashMap<String, String>,
}

impl Default for HtmlRendererBuilder {
    fn default() -> Self {
        HtmlRendererBuilder {
            soft_break: "\n".to_string(),
            escape_html: false,
            percent_encode_urls: true,
            url_sanitizer: None,
            attribute_providers: Vec::new(),
            node_tags: HashMap::new(),
        }
    }
}

impl HtmlRendererBuilder {
    /// What a soft line break renders as, e.g. `"<br />"` or `" "`.
    pub fn soft_break(mut self, soft_break: impl Into<String>) -> Self {
        self.soft_break = soft_break.into();
        self
    }

    /// Renders raw HTML blocks and inline HTML as escaped text.
    pub fn escape_html(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }

    pub fn percent_encode_urls(mut self, percent_encode_urls: bool) -> Self {
        self.percent_encode_urls = percent_encode_urls;
        self
    }

    /// Sanitizes link and image URLs with [`DefaultUrlSanitizer`] and marks links
    /// `rel="nofollow"`. Turning it off drops any custom sanitizer.
    pub fn sanitize_urls(mut self, sanitize_urls: bool) -> Self {
        self.url_sanitizer = sanitize_urls.then(|| Arc::new(DefaultUrlSanitizer::new()) as Arc<dyn UrlSanitizer>);
        self
    }

    /// Sanitizes URLs with `sanitizer`; implies `sanitize_urls(true)`.
    pub fn url_sanitizer(mut self, sanitizer: impl UrlSanitizer + 'static) -> Self {
        self.url_sanitizer = Some(Arc::new(sanitizer));
        self
    }

    pub fn attribute_provider(mut self, provider: impl AttributeProvider + 'static) -> Self {
        self.attribute_providers.push(Arc::new(provider));
        self
    }

    /// Renders custom nodes named `name` as `<tag>` elements. Custom nodes without a tag
    /// render only their content.
    pub fn node_tag(mut self, name: impl Into<String>, tag: impl Into<String>) -> Self {
        self.node_tags.insert(name.into(), tag.into());
        self
    }

    pub fn extension(self, extension: &dyn Extension) -> Self {
        extension.extend_renderer(self)
    }

    pub fn build(self) -> HtmlRenderer {
        HtmlRenderer {
            soft_break: self.soft_break,
            escape_html: self.escape_html,
            percent_encode_urls: self.percent_encode_urls,
            url_sanitizer: self.url_sanitizer,
            attribute_providers: self.attribute_providers,
            node_tags: self.node_tags,
        }
    }
}

struct HtmlWriter<'r> {
    renderer: &'r HtmlRenderer,
    output: String,
}

impl HtmlWriter<'_> {
    /// Starts a new line unless the output is empty or already at one.
    fn line(&mut self) {
        if !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
    }

    fn raw(&mut self, html: &str) {
        self.output.push_str(html);
    }

    fn text(&mut self, text: &str) {
        self.output.push_str(&escape_html(text));
    }

    fn open_tag(&mut self, document: &Document, node: NodeId, tag: &str, attributes: Attributes) {
        self.write_tag(document, node, tag, attributes, false);
    }

    fn void_tag(&mut self, document: &Document, node: NodeId, tag: &str, attributes: Attributes) {
        self.write_tag(document, node, tag, attributes, true);
    }

    fn write_tag(&mut self, document: &Document, node: NodeId, tag: &str, attributes: Attributes, void: bool) {
        let attributes = self.renderer.attributes(document, node, tag, attributes);
        self.output.push('<');
        self.output.push_str(tag);
        for (name, value) in attributes.iter() {
            self.output.push(' ');
            self.output.push_str(name);
            self.output.push_str("=\"");
            self.output.push_str(&escape_html(value));
            self.output.push('"');
        }
        self.output.push_str(if void { " />" } else { ">" });
    }

    fn close_tag(&mut self, tag: &str) {
        self.output.push_str("</");
        self.output.push_str(tag);
        self.output.push('>');
    }

    fn code_block(&mut self, document: &Document, node: NodeId, literal: &str, info: Option<&str>) {
        self.line();
        self.open_tag(document, node, "pre", Attributes::new());
        let mut code_attributes = Attributes::new();
        if let Some(language) = info.and_then(|info| info.split(' ').next()).filter(|l| !l.is_empty()) {
            code_attributes.set("class", format!("language-{language}"));
        }
        self.open_tag(document, node, "code", code_attributes);
        self.text(literal);
        self.close_tag("code");
        self.close_tag("pre");
        self.line();
    }

    fn link_attributes(&self, link: &Link, url_attribute: &str) -> Attributes {
        let mut attributes = Attributes::new();
        let destination = match &self.renderer.url_sanitizer {
            Some(sanitizer) if url_attribute == "src" => sanitizer.sanitize_image_url(&link.destination),
            Some(sanitizer) => {
                attributes.set("rel", "nofollow");
                sanitizer.sanitize_link_url(&link.destination)
            }
            None => link.destination.clone(),
        };
        attributes.set(url_attribute, self.renderer.url(&destination));
        attributes
    }

    fn custom_tag(&self, custom: &CustomNode) -> Option<String> {
        self.renderer.node_tags.get(&custom.name).cloned()
    }

    fn enter_custom(&mut self, document: &Document, node: NodeId, custom: &CustomNode, block: bool) {
        let Some(tag) = self.custom_tag(custom) else {
            if let Some(literal) = &custom.literal {
                self.text(literal);
            }
            return;
        };
        if block {
            self.line();
        }
        let mut attributes = Attributes::new();
        for (name, value) in &custom.attributes {
            attributes.set(name.as_str(), value.as_str());
        }
        self.open_tag(document, node, &tag, attributes);
        if let Some(literal) = &custom.literal {
            self.text(literal);
        }
    }

    fn leave_custom(&mut self, custom: &CustomNode, block: bool) {
        if let Some(tag) = self.custom_tag(custom) {
            self.close_tag(&tag);
            if block {
                self.line();
            }
        }
    }
}

/// Paragraphs directly inside items of a tight list render without `<p>`.
fn in_tight_list(document: &Document, paragraph: NodeId) -> bool {
    document
        .parent(paragraph)
        .filter(|&item| matches!(document.value(item), NodeValue::ListItem(_)))
        .and_then(|item| document.parent(item))
        .and_then(|list| document.value(list).list_tight())
        .unwrap_or(false)
}

fn heading_tag(level: u8) -> String {
    format!("h{level}")
}

impl Visitor for HtmlWriter<'_> {
    fn enter(&mut self, document: &Document, node: NodeId) -> Visit {
        match document.value(node) {
            NodeValue::Document | NodeValue::LinkReferenceDefinition(_) => {}
            NodeValue::BlockQuote => {
                self.line();
                self.open_tag(document, node, "blockquote", Attributes::new());
                self.line();
            }
            NodeValue::BulletList(_) => {
                self.line();
                self.open_tag(document, node, "ul", Attributes::new());
                self.line();
            }
            NodeValue::OrderedList(list) => {
                let mut attributes = Attributes::new();
                if list.start != 1 {
                    attributes.set("start", list.start.to_string());
                }
                self.line();
                self.open_tag(document, node, "ol", attributes);
                self.line();
            }
            NodeValue::ListItem(_) => self.open_tag(document, node, "li", Attributes::new()),
            NodeValue::FencedCodeBlock(code) => {
                self.code_block(document, node, &code.literal, Some(&code.info));
            }
            NodeValue::IndentedCodeBlock { literal } => self.code_block(document, node, literal, None),
            NodeValue::Heading { level } => {
                self.line();
                self.open_tag(document, node, &heading_tag(*level), Attributes::new());
            }
            NodeValue::HtmlBlock { literal } => {
                self.line();
                if self.renderer.escape_html {
                    self.open_tag(document, node, "p", Attributes::new());
                    self.text(literal);
                    self.close_tag("p");
                } else {
                    self.raw(literal);
                }
                self.line();
            }
            NodeValue::Paragraph => {
                if !in_tight_list(document, node) {
                    self.line();
                    self.open_tag(document, node, "p", Attributes::new());
                }
            }
            NodeValue::ThematicBreak => {
                self.line();
                self.void_tag(document, node, "hr", Attributes::new());
                self.line();
            }
            NodeValue::Text(literal) => self.text(literal),
            NodeValue::Code(literal) => {
                self.open_tag(document, node, "code", Attributes::new());
                self.text(literal);
                self.close_tag("code");
            }
            NodeValue::Emphasis { .. } => self.open_tag(document, node, "em", Attributes::new()),
            NodeValue::StrongEmphasis { .. } => self.open_tag(document, node, "strong", Attributes::new()),
            NodeValue::Link(link) => {
                let mut attributes = self.link_attributes(link, "href");
                if let Some(title) = &link.title {
                    attributes.set("title", title.as_str());
                }
                self.open_tag(document, node, "a", attributes);
            }
            NodeValue::Image(link) => {
                let mut attributes = self.link_attributes(link, "src");
                attributes.set("alt", document.text_content(node));
                if let Some(title) = &link.title {
                    attributes.set("title", title.as_str());
                }
                self.void_tag(document, node, "img", attributes);
                return Visit::SkipChildren;
            }
            NodeValue::HtmlInline(literal) => {
                if self.renderer.escape_html {
                    self.text(literal);
                } else {
                    self.raw(literal);
                }
            }
            NodeValue::SoftLineBreak => {
                let soft_break = &self.renderer.soft_break;
                self.output.push_str(soft_break);
            }
            NodeValue::HardLineBreak => {
                self.void_tag(document, node, "br", Attributes::new());
                self.line();
            }
            NodeValue::CustomBlock(custom) => self.enter_custom(document, node, custom, true),
            NodeValue::CustomInline(custom) => self.enter_custom(document, node, custom, false),
        }
        Visit::Children
    }

    fn leave(&mut self, document: &Document, node: NodeId) {
        match document.value(node) {
            NodeValue::BlockQuote => {
                self.line();
                self.close_tag("blockquote");
                self.line();
            }
            NodeValue::BulletList(_) => {
                self.line();
                self.close_tag("ul");
                self.line();
            }
            NodeValue::OrderedList(_) => {
                self.line();
                self.close_tag("ol");
                self.line();
            }
            NodeValue::ListItem(_) => {
                self.close_tag("li");
                self.line();
            }
            NodeValue::Heading { level } => {
                self.close_tag(&heading_tag(*level));
                self.line();
            }
            NodeValue::Paragraph => {
                if !in_tight_list(document, node) {
                    self.close_tag("p");
                    self.line();
                }
            }
            NodeValue::Emphasis { .. } => self.close_tag("em"),
            NodeValue::StrongEmphasis { .. } => self.close_tag("strong"),
            NodeValue::Link(_) => self.close_tag("a"),
            NodeValue::CustomBlock(custom) => self.leave_custom(custom, true),
            NodeValue::CustomInline(custom) => self.leave_custom(custom, false),
            _ => {}
        }
    }
}
