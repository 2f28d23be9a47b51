//! The core inline content parsers: backslash escapes, code spans, entity references,
//! autolinks and raw HTML.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::ast::{Link, NodeValue};
use crate::characters::is_escapable;
use crate::escaping::decode_entity;
use crate::inline::{InlineContentParser, InlineContentParserFactory, InlineParserState, ParsedInline};
use crate::scanner::{Position, Scanner};

/// Factory for a core parser.
struct CoreContentParserFactory {
    triggers: &'static [char],
    create: fn() -> Box<dyn InlineContentParser>,
}

impl InlineContentParserFactory for CoreContentParserFactory {
    fn trigger_characters(&self) -> Vec<char> {
        self.triggers.to_vec()
    }

    fn create(&self) -> Box<dyn InlineContentParser> {
        (self.create)()
    }
}

pub(crate) fn core_factories() -> Vec<Arc<dyn InlineContentParserFactory>> {
    vec![
        Arc::new(CoreContentParserFactory {
            triggers: &['\\'],
            create: || Box::new(BackslashParser),
        }),
        Arc::new(CoreContentParserFactory {
            triggers: &['`'],
            create: || Box::new(BackticksParser::default()),
        }),
        Arc::new(CoreContentParserFactory {
            triggers: &['&'],
            create: || Box::new(EntityParser),
        }),
        Arc::new(CoreContentParserFactory {
            triggers: &['<'],
            create: || Box::new(AutolinkParser),
        }),
        Arc::new(CoreContentParserFactory {
            triggers: &['<'],
            create: || Box::new(HtmlInlineParser::default()),
        }),
    ]
}

/// `\` before a line ending is a hard break, before ASCII punctuation an escape.
struct BackslashParser;

impl InlineContentParser for BackslashParser {
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
        let scanner = state.scanner();
        scanner.advance();
        let value = match scanner.peek() {
            Some('\n') => {
                scanner.advance();
                NodeValue::HardLineBreak
            }
            Some(c) if is_escapable(c) => {
                scanner.advance();
                NodeValue::Text(c.to_string())
            }
            _ => NodeValue::Text("\\".to_string()),
        };
        let position = scanner.mark();
        Some(ParsedInline::of(state.new_node(value), position))
    }
}

/// Code spans. A run of backticks is closed only by a run of the same length; an
/// unclosed run is literal text.
#[derive(Default)]
struct BackticksParser {
    /// Start of the last run of each length, once a scan has reached the end of the block.
    last_runs: Option<HashMap<usize, Position>>,
}

impl InlineContentParser for BackticksParser {
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
        let scanner = state.scanner();
        let start = scanner.mark();
        let opening = scanner.match_multiple('`');
        let after_opening = scanner.mark();

        let closer_ahead = match &self.last_runs {
            Some(last_runs) => last_runs.get(&opening).is_some_and(|&last| last > start),
            None => true,
        };
        if closer_ahead {
            let mut last_runs = HashMap::new();
            while scanner.find('`').is_some() {
                let before_closing = scanner.mark();
                let length = scanner.match_multiple('`');
                if length != opening {
                    last_runs.insert(length, before_closing);
                    continue;
                }
                let content = scanner.text(after_opening, before_closing).replace('\n', " ");
                let position = scanner.mark();
                let literal = strip_code_span_padding(content);
                return Some(ParsedInline::of(state.new_node(NodeValue::Code(literal)), position));
            }
            last_runs.insert(opening, start);
            self.last_runs = Some(last_runs);
        }

        let ticks = scanner.text(start, after_opening);
        Some(ParsedInline::of(state.new_node(NodeValue::Text(ticks)), after_opening))
    }
}

/// One space is stripped from both ends when the content has a space at each end and
/// is not only spaces.
fn strip_code_span_padding(content: String) -> String {
    if content.len() >= 3 && content.starts_with(' ') && content.ends_with(' ') && content.contains(|c| c != ' ') {
        content[1..content.len() - 1].to_string()
    } else {
        content
    }
}

/// `&name;`, `&#digits;` or `&#xhex;` naming a known character.
struct EntityParser;

impl InlineContentParser for EntityParser {
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
        let scanner = state.scanner();
        let start = scanner.mark();
        scanner.advance();
        if scanner.eat('#') {
            let digits = if scanner.eat('x') || scanner.eat('X') {
                scanner.match_while(|c| c.is_ascii_hexdigit())
            } else {
                scanner.match_while(|c| c.is_ascii_digit())
            };
            if digits == 0 {
                return None;
            }
        } else if scanner.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            scanner.match_while(|c| c.is_ascii_alphanumeric());
        } else {
            return None;
        }
        if !scanner.eat(';') {
            return None;
        }
        let position = scanner.mark();
        let (decoded, _) = decode_entity(&scanner.text(start, position))?;
        Some(ParsedInline::of(state.new_node(NodeValue::Text(decoded)), position))
    }
}

static URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9.+-]{1,31}:[^<>\x00-\x20]*$").unwrap());

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@",
        r"[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?",
        r"(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    ))
    .unwrap()
});

/// `<scheme:rest>` or `<user@host>`.
struct AutolinkParser;

impl InlineContentParser for AutolinkParser {
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
        let scanner = state.scanner();
        scanner.advance();
        let text_start = scanner.mark();
        // Neither form allows `<`, spaces or control characters before the closing `>`.
        scanner.find_matching(|c| c == '>' || c == '<' || c <= ' ')?;
        let text_end = scanner.mark();
        if !scanner.eat('>') {
            return None;
        }
        let content = scanner.text(text_start, text_end);
        let destination = if URI.is_match(&content) {
            content.clone()
        } else if EMAIL.is_match(&content) {
            format!("mailto:{content}")
        } else {
            return None;
        };
        let position = scanner.mark();
        let text_spans = scanner.source(text_start, text_end).source_spans();

        let link = state.new_node(NodeValue::Link(Link {
            destination,
            title: None,
        }));
        let text = state.new_node(NodeValue::Text(content));
        let document = state.document();
        document.set_source_spans(text, text_spans);
        document.append_child(link, text);
        Some(ParsedInline::of(link, position))
    }
}

/// Raw HTML constructs that end with a fixed closing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Delimited {
    ProcessingInstruction,
    Comment,
    Cdata,
    Declaration,
}

/// Open and closing tags, comments, processing instructions, declarations and CDATA
/// sections, kept verbatim.
#[derive(Default)]
struct HtmlInlineParser {
    /// Constructs whose closing sequence does not occur in the rest of the block.
    unclosed: HashSet<Delimited>,
}

impl HtmlInlineParser {
    fn try_delimited(&mut self, scanner: &mut Scanner, kind: Delimited) -> bool {
        if self.unclosed.contains(&kind) {
            return false;
        }
        let matched = match kind {
            Delimited::ProcessingInstruction => try_processing_instruction(scanner),
            Delimited::Comment => try_comment(scanner),
            Delimited::Cdata => try_cdata(scanner),
            Delimited::Declaration => try_declaration(scanner),
        };
        if !matched && !scanner.has_next() {
            self.unclosed.insert(kind);
        }
        matched
    }
}

impl InlineContentParser for HtmlInlineParser {
    fn try_parse(&mut self, state: &mut InlineParserState<'_>) -> Option<ParsedInline> {
        let scanner = state.scanner();
        let start = scanner.mark();
        scanner.advance();
        let matched = match scanner.peek()? {
            c if c.is_ascii_alphabetic() => try_open_tag(scanner),
            '/' => try_closing_tag(scanner),
            '?' => self.try_delimited(scanner, Delimited::ProcessingInstruction),
            '!' => {
                scanner.advance();
                match scanner.peek() {
                    Some('-') => self.try_delimited(scanner, Delimited::Comment),
                    Some('[') => self.try_delimited(scanner, Delimited::Cdata),
                    Some(c) if c.is_ascii_alphabetic() => self.try_delimited(scanner, Delimited::Declaration),
                    _ => false,
                }
            }
            _ => false,
        };
        if !matched {
            return None;
        }
        let position = scanner.mark();
        let literal = scanner.text(start, position);
        Some(ParsedInline::of(state.new_node(NodeValue::HtmlInline(literal)), position))
    }
}

fn is_tag_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn is_attribute_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_attribute_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-')
}

fn is_attribute_value_end(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | '"' | '\'' | '=' | '<' | '>' | '`')
}

/// `<tag attr="value" flag/>`, starting at the first letter of the tag name.
fn try_open_tag(scanner: &mut Scanner) -> bool {
    scanner.advance();
    scanner.match_while(is_tag_name_continue);
    let mut whitespace = scanner.whitespace() >= 1;
    while whitespace && scanner.peek().is_some_and(is_attribute_start) {
        scanner.match_while(is_attribute_continue);
        whitespace = scanner.whitespace() >= 1;
        if scanner.eat('=') {
            scanner.whitespace();
            match scanner.peek() {
                Some(quote @ ('\'' | '"')) => {
                    scanner.advance();
                    if scanner.find(quote).is_none() {
                        return false;
                    }
                    scanner.advance();
                }
                _ => {
                    if scanner.find_matching(is_attribute_value_end).is_none_or(|n| n == 0) {
                        return false;
                    }
                }
            }
            whitespace = scanner.whitespace() >= 1;
        }
    }
    scanner.eat('/');
    scanner.eat('>')
}

/// `</tag >`, starting at the `/`.
fn try_closing_tag(scanner: &mut Scanner) -> bool {
    scanner.advance();
    if !scanner.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    scanner.match_while(is_tag_name_continue);
    scanner.whitespace();
    scanner.eat('>')
}

/// `<?...?>`, starting at the `?`.
fn try_processing_instruction(scanner: &mut Scanner) -> bool {
    scanner.advance();
    while scanner.find('?').is_some() {
        scanner.advance();
        if scanner.eat('>') {
            return true;
        }
    }
    false
}

/// `<!-->`, `<!--->` or `<!-- ... -->`, starting at the first `-`.
fn try_comment(scanner: &mut Scanner) -> bool {
    scanner.advance();
    if !scanner.eat('-') {
        return false;
    }
    if scanner.eat('>') || scanner.eat_str("->") {
        return true;
    }
    while scanner.find('-').is_some() {
        if scanner.eat_str("-->") {
            return true;
        }
        scanner.advance();
    }
    false
}

/// `<![CDATA[ ... ]]>`, starting at the `[`.
fn try_cdata(scanner: &mut Scanner) -> bool {
    if !scanner.eat_str("[CDATA[") {
        return false;
    }
    while scanner.find(']').is_some() {
        if scanner.eat_str("]]>") {
            return true;
        }
        scanner.advance();
    }
    false
}

/// `<!NAME ...>`, starting at the first letter.
fn try_declaration(scanner: &mut Scanner) -> bool {
    scanner.match_while(|c| c.is_ascii_alphabetic());
    if scanner.find('>').is_none() {
        return false;
    }
    scanner.advance();
    true
}
