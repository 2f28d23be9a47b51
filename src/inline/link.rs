//! Custom link resolution, tried on `]` when neither an inline link nor a reference
//! definition matched.
use crate::ast::NodeValue;
use crate::references::LinkReferenceMap;
use crate::scanner::{Position, Scanner};

/// What is known about a bracketed span when custom link processors run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    /// Whether the opening bracket was `![`.
    pub image: bool,
    /// The source text between the brackets.
    pub text: String,
    /// The label of a following `[label]`, or `Some("")` for `[]`.
    pub label: Option<String>,
    /// Scanner position right after the closing `]`.
    pub after_close: Position,
}

/// How the bracketed span turns into nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkResult {
    /// The span's content becomes the children of a new node.
    Wrap { value: NodeValue, position: Position },
    /// The span, brackets and content included, is replaced by a new node.
    Replace { value: NodeValue, position: Position },
}

impl LinkResult {
    /// Wraps the link text in `value`; parsing continues at `position`.
    pub fn wrap_text_in(value: NodeValue, position: Position) -> Self {
        LinkResult::Wrap { value, position }
    }

    /// Replaces the whole bracketed span with `value`; parsing continues at `position`.
    pub fn replace_with(value: NodeValue, position: Position) -> Self {
        LinkResult::Replace { value, position }
    }

    pub fn position(&self) -> Position {
        match self {
            LinkResult::Wrap { position, .. } | LinkResult::Replace { position, .. } => *position,
        }
    }
}

/// Resolves bracketed spans the core syntax leaves alone, e.g. footnote references or
/// wiki links.
///
/// The scanner starts right after the closing `]`, or after the link label if there was
/// one. A processor may consume more input; the returned position must not be before
/// [`LinkInfo::after_close`]. Returning `None` rewinds the scanner and tries the next
/// processor.
pub trait LinkProcessor: Send + Sync {
    fn process(&self, info: &LinkInfo, scanner: &mut Scanner, definitions: &LinkReferenceMap) -> Option<LinkResult>;
}
