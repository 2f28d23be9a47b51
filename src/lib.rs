//! A CommonMark parser and HTML renderer with pluggable block, inline and link syntax.
//!
//! ```
//! let html = markloom::markdown_to_html("*Hello* [world](https://example.com)");
//! assert_eq!(html, "<p><em>Hello</em> <a href=\"https://example.com\">world</a></p>\n");
//! ```
pub mod ast;
pub mod block;
mod characters;
pub mod error;
pub mod escaping;
pub mod inline;
pub mod parser;
pub mod references;
pub mod renderer;
pub mod scanner;
pub mod source;

pub use ast::{Document, NodeId, NodeValue};
pub use error::ConfigError;
pub use parser::{Extension, Parser, ParserBuilder, PostProcessor, SourceSpanMode};
pub use renderer::{
    AttributeProvider, Attributes, DefaultUrlSanitizer, HtmlRenderer, HtmlRendererBuilder, UrlSanitizer,
};

/// Parse markdown text and render to HTML
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new();
    let document = parser.parse(markdown);
    let renderer = HtmlRenderer::new();
    renderer.render(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(markdown_to_html(""), "");
    }

    #[test]
    fn test_basic_image() {
        let result = markdown_to_html("![foo](/url \"title\")\n");
        assert_eq!(
            result,
            "<p><img src=\"/url\" alt=\"foo\" title=\"title\" /></p>\n"
        );
    }

    #[test]
    fn test_image_without_title() {
        let result = markdown_to_html("![bar](/path)\n");
        assert_eq!(result, "<p><img src=\"/path\" alt=\"bar\" /></p>\n");
    }

    #[test]
    fn test_reference_defined_after_use() {
        let result = markdown_to_html("[a][1]\n\n[1]: /url \"t\"\n");
        assert_eq!(result, "<p><a href=\"/url\" title=\"t\">a</a></p>\n");
    }

    #[test_fuzz::test_fuzz]
    fn render_any_input(markdown: &str) {
        let html = markdown_to_html(markdown);
        assert!(html.is_empty() || html.ends_with('\n'));
    }

    #[test]
    fn test_render_any_input_seeds() {
        for seed in ["*a **b", "[x](<y", "> - `z", "\0\r\n\t", "&#x110000;", "<!-- -->"] {
            render_any_input(seed);
        }
    }
}
