//! Errors reported when assembling a parser from its extensions
use thiserror::Error;

/// A parser configuration that cannot be built. Parsing itself never fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("delimiter {delimiter:?} is claimed by more than one processor and at least one is asymmetric")]
    DelimiterConflict { delimiter: char },

    #[error("delimiter {delimiter:?} already has a processor with minimum length {min_length}")]
    DuplicateMinLength { delimiter: char, min_length: usize },

    #[error("delimiter processor for {delimiter:?} has a minimum length of 0")]
    InvalidMinLength { delimiter: char },
}
