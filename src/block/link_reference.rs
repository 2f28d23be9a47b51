use crate::ast::LinkReferenceDefinition;
use crate::escaping::{normalize_label, unescape_string};
use crate::inline::link_scanner;
use crate::scanner::Scanner;
use crate::source::{SourceLine, SourceLines, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for the `[` that opens a definition.
    StartDefinition,
    /// Inside the label, possibly across lines.
    Label,
    Destination,
    /// After the destination, a title may follow on the same or the next line.
    StartTitle,
    /// Inside a title that spans lines.
    Title,
    /// Not a definition; every following line is paragraph text.
    Paragraph,
}

/// Recognizes link reference definitions at the start of a paragraph, line by line.
///
/// A definition is only committed once it is complete, so lines that turn out not to be
/// part of one stay available as paragraph text.
#[derive(Debug)]
pub(crate) struct LinkReferenceDefinitionParser {
    state: State,
    paragraph_lines: SourceLines,
    definitions: Vec<(LinkReferenceDefinition, Vec<SourceSpan>)>,
    source_spans: Vec<SourceSpan>,
    label: Option<String>,
    destination: Option<String>,
    title_delimiter: char,
    title: Option<String>,
    reference_valid: bool,
}

impl LinkReferenceDefinitionParser {
    pub(crate) fn new() -> Self {
        LinkReferenceDefinitionParser {
            state: State::StartDefinition,
            paragraph_lines: SourceLines::empty(),
            definitions: Vec::new(),
            source_spans: Vec::new(),
            label: None,
            destination: None,
            title_delimiter: '\0',
            title: None,
            reference_valid: false,
        }
    }

    pub(crate) fn parse(&mut self, line: SourceLine) {
        self.paragraph_lines.add_line(line.clone());
        if self.state == State::Paragraph {
            return;
        }

        let mut scanner = Scanner::new(SourceLines::of(line));
        while scanner.has_next() {
            let success = match self.state {
                State::StartDefinition => self.start_definition(&mut scanner),
                State::Label => self.label(&mut scanner),
                State::Destination => self.destination(&mut scanner),
                State::StartTitle => self.start_title(&mut scanner),
                State::Title => self.title(&mut scanner),
                State::Paragraph => true,
            };
            if !success {
                self.state = State::Paragraph;
                return;
            }
            if self.state == State::Paragraph {
                return;
            }
        }
    }

    pub(crate) fn add_source_span(&mut self, span: SourceSpan) {
        self.source_spans.push(span);
    }

    pub(crate) fn paragraph_lines(&self) -> &SourceLines {
        &self.paragraph_lines
    }

    /// Spans of the lines that are still paragraph text.
    pub(crate) fn paragraph_source_spans(&self) -> &[SourceSpan] {
        &self.source_spans
    }

    pub(crate) fn definitions(&mut self) -> Vec<(LinkReferenceDefinition, Vec<SourceSpan>)> {
        self.finish_reference(0);
        self.definitions.clone()
    }

    pub(crate) fn remove_lines(&mut self, count: usize) -> Vec<SourceSpan> {
        self.paragraph_lines.remove_last(count);
        let keep = self.source_spans.len().saturating_sub(count);
        self.source_spans.split_off(keep)
    }

    fn start_definition(&mut self, scanner: &mut Scanner) -> bool {
        // Finish any earlier definition now that a new line starts.
        self.finish_reference(1);

        scanner.whitespace();
        if !scanner.eat('[') {
            return false;
        }
        self.state = State::Label;
        self.label = Some(String::new());
        if !scanner.has_next() {
            if let Some(label) = self.label.as_mut() {
                label.push('\n');
            }
        }
        true
    }

    fn label(&mut self, scanner: &mut Scanner) -> bool {
        let start = scanner.mark();
        if !link_scanner::scan_link_label_content(scanner) {
            return false;
        }
        let content = scanner.text(start, scanner.mark());
        let Some(label) = self.label.as_mut() else {
            return false;
        };
        label.push_str(&content);

        if !scanner.has_next() {
            // The label continues on the next line.
            label.push('\n');
            return true;
        }
        if !scanner.eat(']') {
            return false;
        }
        // The label must be followed by a colon, and must not be blank or too long.
        if !scanner.eat(':') {
            return false;
        }
        if label.chars().count() > 999 {
            return false;
        }
        if normalize_label(label).is_empty() {
            return false;
        }
        self.state = State::Destination;
        scanner.whitespace();
        true
    }

    fn destination(&mut self, scanner: &mut Scanner) -> bool {
        scanner.whitespace();
        let start = scanner.mark();
        if !link_scanner::scan_link_destination(scanner) {
            return false;
        }
        let raw = scanner.text(start, scanner.mark());
        let destination = if raw.starts_with('<') {
            &raw[1..raw.len() - 1]
        } else {
            raw.as_str()
        };
        self.destination = Some(unescape_string(destination).into_owned());

        let whitespace = scanner.whitespace();
        if !scanner.has_next() {
            // The definition is complete here, though a title may still follow on the next line.
            self.reference_valid = true;
            self.paragraph_lines = SourceLines::empty();
        } else if whitespace == 0 {
            // A title on the same line must be separated from the destination.
            return false;
        }
        self.state = State::StartTitle;
        true
    }

    fn start_title(&mut self, scanner: &mut Scanner) -> bool {
        scanner.whitespace();
        if !scanner.has_next() {
            self.state = State::StartDefinition;
            return true;
        }
        self.title_delimiter = match scanner.peek() {
            Some('"') => '"',
            Some('\'') => '\'',
            Some('(') => ')',
            _ => {
                // No title; what follows may be another definition.
                self.finish_reference(1);
                self.state = State::StartDefinition;
                return true;
            }
        };
        self.state = State::Title;
        scanner.advance();
        self.title = Some(String::new());
        if !scanner.has_next() {
            if let Some(title) = self.title.as_mut() {
                title.push('\n');
            }
        }
        true
    }

    fn title(&mut self, scanner: &mut Scanner) -> bool {
        let start = scanner.mark();
        if !link_scanner::scan_link_title_content(scanner, self.title_delimiter) {
            // Unbalanced parentheses in the title.
            self.title = None;
            return false;
        }
        let content = scanner.text(start, scanner.mark());
        let Some(title) = self.title.as_mut() else {
            return false;
        };
        title.push_str(&content);

        if !scanner.has_next() {
            title.push('\n');
            return true;
        }
        // Skip the closing delimiter; only whitespace may follow it.
        scanner.advance();
        scanner.whitespace();
        if scanner.has_next() {
            self.title = None;
            return false;
        }
        self.reference_valid = true;
        self.paragraph_lines = SourceLines::empty();
        self.state = State::StartDefinition;
        true
    }

    /// Commits the pending definition. `pending_lines` counts paragraph lines whose span
    /// has not been added yet.
    fn finish_reference(&mut self, pending_lines: usize) {
        if !self.reference_valid {
            return;
        }
        self.reference_valid = false;

        let label = self.label.take().unwrap_or_default();
        let destination = self.destination.take().unwrap_or_default();
        // A title still open when the paragraph ends is paragraph text, not part of the definition.
        let title = self.title.take().filter(|_| self.state != State::Title);
        let title = title.map(|title| unescape_string(&title).into_owned());
        let definition = LinkReferenceDefinition {
            label,
            destination,
            title,
        };
        let paragraph_spans = self.paragraph_lines.len().saturating_sub(pending_lines);
        let split = self.source_spans.len().saturating_sub(paragraph_spans);
        let rest = self.source_spans.split_off(split);
        let spans = std::mem::replace(&mut self.source_spans, rest);
        self.definitions.push((definition, spans));
    }
}
