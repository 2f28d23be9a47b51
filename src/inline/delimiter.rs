//! Delimiter processors: how runs of a delimiter character (like `*` and `_`) are
//! matched and turned into nodes.
use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{Document, NodeId, NodeValue};
use crate::error::ConfigError;
use crate::source::SourceSpan;

/// Customizes matching of one delimiter character, or of an opening/closing pair.
pub trait DelimiterProcessor: Send + Sync {
    fn opening_character(&self) -> char;

    fn closing_character(&self) -> char;

    /// Runs shorter than this are plain text.
    fn min_length(&self) -> usize {
        1
    }

    /// Tries to match `opener` with `closer`, which are known to use this processor's
    /// characters and to be able to open and close.
    ///
    /// Returns how many delimiter characters to use from each run, at most the length of
    /// either. On a match the processor builds the resulting node, usually with
    /// [`wrap_delimited`]; the used characters are removed afterwards. Returning 0 means
    /// no match, and the document must be left untouched.
    fn process(&self, document: &mut Document, opener: &DelimiterRun<'_>, closer: &DelimiterRun<'_>) -> usize;
}

/// View of a delimiter run handed to a [`DelimiterProcessor`]. Each remaining delimiter
/// character is its own text node.
#[derive(Debug, Clone, Copy)]
pub struct DelimiterRun<'a> {
    pub(crate) characters: &'a [NodeId],
    pub(crate) can_open: bool,
    pub(crate) can_close: bool,
    pub(crate) original_length: usize,
}

impl<'a> DelimiterRun<'a> {
    pub fn can_open(&self) -> bool {
        self.can_open
    }

    pub fn can_close(&self) -> bool {
        self.can_close
    }

    /// Remaining characters in the run.
    pub fn length(&self) -> usize {
        self.characters.len()
    }

    /// Length of the run when it was scanned, before any characters were used.
    pub fn original_length(&self) -> usize {
        self.original_length
    }

    /// The innermost character of an opening run.
    pub fn opener(&self) -> NodeId {
        self.characters[self.characters.len() - 1]
    }

    /// The innermost character of a closing run.
    pub fn closer(&self) -> NodeId {
        self.characters[0]
    }

    /// The innermost `count` characters of an opening run.
    pub fn openers(&self, count: usize) -> &'a [NodeId] {
        &self.characters[self.characters.len() - count..]
    }

    /// The innermost `count` characters of a closing run.
    pub fn closers(&self, count: usize) -> &'a [NodeId] {
        &self.characters[..count]
    }
}

/// Wraps everything between the innermost used characters of `opener` and `closer` in a
/// new node, placed right after the opener. With source spans enabled the new node spans
/// from the first used opening character to the last used closing one.
pub fn wrap_delimited(
    document: &mut Document,
    opener: &DelimiterRun<'_>,
    closer: &DelimiterRun<'_>,
    used: usize,
    value: NodeValue,
) -> NodeId {
    let node = document.wrap_between(opener.opener(), closer.closer(), value);
    let mut spans: Vec<SourceSpan> = Vec::new();
    for &character in opener.openers(used) {
        spans.extend_from_slice(document.source_spans(character));
    }
    let children: Vec<NodeId> = document.children(node).collect();
    for child in children {
        spans.extend_from_slice(document.source_spans(child));
    }
    for &character in closer.closers(used) {
        spans.extend_from_slice(document.source_spans(character));
    }
    if !spans.is_empty() {
        document.merge_source_spans(node, &spans);
    }
    node
}

/// `*` and `_` emphasis: one character from each run makes emphasis, two make strong
/// emphasis.
#[derive(Debug, Clone, Copy)]
pub struct EmphasisDelimiterProcessor {
    delimiter: char,
}

impl EmphasisDelimiterProcessor {
    pub fn new(delimiter: char) -> Self {
        EmphasisDelimiterProcessor { delimiter }
    }
}

impl DelimiterProcessor for EmphasisDelimiterProcessor {
    fn opening_character(&self) -> char {
        self.delimiter
    }

    fn closing_character(&self) -> char {
        self.delimiter
    }

    fn process(&self, document: &mut Document, opener: &DelimiterRun<'_>, closer: &DelimiterRun<'_>) -> usize {
        // When either run can both open and close, the sum of the original lengths must
        // not be a multiple of 3 unless both lengths are.
        if (opener.can_close() || closer.can_open())
            && closer.original_length() % 3 != 0
            && (opener.original_length() + closer.original_length()) % 3 == 0
        {
            return 0;
        }

        let delimiter = self.delimiter;
        let (used, value) = if opener.length() >= 2 && closer.length() >= 2 {
            (2, NodeValue::StrongEmphasis { delimiter })
        } else {
            (1, NodeValue::Emphasis { delimiter })
        };
        wrap_delimited(document, opener, closer, used, value);
        used
    }
}

/// Several symmetric processors for one character, picked by the opening run's length.
/// Processors are kept longest minimum length first.
struct StaggeredDelimiterProcessor {
    delimiter: char,
    processors: Vec<Arc<dyn DelimiterProcessor>>,
}

impl StaggeredDelimiterProcessor {
    fn add(&mut self, processor: Arc<dyn DelimiterProcessor>) -> Result<(), ConfigError> {
        let min_length = processor.min_length();
        if self.processors.iter().any(|p| p.min_length() == min_length) {
            return Err(ConfigError::DuplicateMinLength {
                delimiter: self.delimiter,
                min_length,
            });
        }
        let position = self
            .processors
            .iter()
            .position(|p| p.min_length() < min_length)
            .unwrap_or(self.processors.len());
        self.processors.insert(position, processor);
        Ok(())
    }

    /// The processor with the longest minimum length the run satisfies. Runs shorter than
    /// every minimum fall back to the longest.
    fn find_processor(&self, length: usize) -> Option<&Arc<dyn DelimiterProcessor>> {
        self.processors
            .iter()
            .find(|p| p.min_length() <= length)
            .or_else(|| self.processors.first())
    }
}

impl DelimiterProcessor for StaggeredDelimiterProcessor {
    fn opening_character(&self) -> char {
        self.delimiter
    }

    fn closing_character(&self) -> char {
        self.delimiter
    }

    fn min_length(&self) -> usize {
        self.processors.iter().map(|p| p.min_length()).min().unwrap_or(1)
    }

    fn process(&self, document: &mut Document, opener: &DelimiterRun<'_>, closer: &DelimiterRun<'_>) -> usize {
        match self.find_processor(opener.length()) {
            Some(processor) => processor.process(document, opener, closer),
            None => 0,
        }
    }
}

enum Registered {
    Single(Arc<dyn DelimiterProcessor>),
    Staggered(StaggeredDelimiterProcessor),
}

/// Delimiter processors keyed by the characters they handle.
pub(crate) struct DelimiterProcessors {
    by_character: HashMap<char, Registered>,
}

impl DelimiterProcessors {
    /// The `*` and `_` emphasis processors.
    pub(crate) fn core() -> Self {
        let mut by_character = HashMap::new();
        for delimiter in ['*', '_'] {
            let processor: Arc<dyn DelimiterProcessor> = Arc::new(EmphasisDelimiterProcessor::new(delimiter));
            by_character.insert(delimiter, Registered::Single(processor));
        }
        DelimiterProcessors { by_character }
    }

    pub(crate) fn add(&mut self, processor: Arc<dyn DelimiterProcessor>) -> Result<(), ConfigError> {
        let opening = processor.opening_character();
        let closing = processor.closing_character();
        if processor.min_length() == 0 {
            return Err(ConfigError::InvalidMinLength { delimiter: opening });
        }
        if opening != closing {
            self.add_for_character(opening, Arc::clone(&processor))?;
            return self.add_for_character(closing, processor);
        }

        match self.by_character.remove(&opening) {
            None => {
                self.by_character.insert(opening, Registered::Single(processor));
                Ok(())
            }
            Some(Registered::Staggered(mut staggered)) => {
                let result = staggered.add(processor);
                self.by_character.insert(opening, Registered::Staggered(staggered));
                result
            }
            Some(Registered::Single(existing)) => {
                if existing.opening_character() != existing.closing_character() {
                    self.by_character.insert(opening, Registered::Single(existing));
                    return Err(ConfigError::DelimiterConflict { delimiter: opening });
                }
                let mut staggered = StaggeredDelimiterProcessor {
                    delimiter: opening,
                    processors: vec![Arc::clone(&existing)],
                };
                match staggered.add(processor) {
                    Ok(()) => {
                        self.by_character.insert(opening, Registered::Staggered(staggered));
                        Ok(())
                    }
                    Err(err) => {
                        self.by_character.insert(opening, Registered::Single(existing));
                        Err(err)
                    }
                }
            }
        }
    }

    fn add_for_character(&mut self, delimiter: char, processor: Arc<dyn DelimiterProcessor>) -> Result<(), ConfigError> {
        if self.by_character.contains_key(&delimiter) {
            return Err(ConfigError::DelimiterConflict { delimiter });
        }
        self.by_character.insert(delimiter, Registered::Single(processor));
        Ok(())
    }

    pub(crate) fn into_map(self) -> HashMap<char, Arc<dyn DelimiterProcessor>> {
        self.by_character
            .into_iter()
            .map(|(delimiter, registered)| {
                let processor: Arc<dyn DelimiterProcessor> = match registered {
                    Registered::Single(processor) => processor,
                    Registered::Staggered(staggered) => Arc::new(staggered),
                };
                (delimiter, processor)
            })
            .collect()
    }
}
