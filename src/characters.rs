/// Character classes used by the block and inline rules
use unicode_categories::UnicodeCategories;

/// Indentation that turns a line into indented code.
pub(crate) const CODE_BLOCK_INDENT: usize = 4;

/// Unicode punctuation: ASCII punctuation plus the P and S general categories.
pub(crate) fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || c.is_punctuation() || c.is_symbol()
}

/// Unicode whitespace: the Zs category plus tab, line feed, form feed and carriage return.
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\u{0C}' | '\r') || c.is_separator_space()
}

/// Characters a backslash can escape.
pub(crate) fn is_escapable(c: char) -> bool {
    c.is_ascii_punctuation()
}

pub(crate) fn is_space_or_tab(c: char) -> bool {
    c == ' ' || c == '\t'
}

pub(crate) fn columns_to_next_tab_stop(column: usize) -> usize {
    4 - (column % 4)
}

/// True if the line holds nothing but spaces and tabs (or line terminators).
pub(crate) fn is_blank(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0B' | b'\x0C'))
}

/// Index of the first byte after a run of `c` starting at `start`.
pub(crate) fn skip(c: u8, s: &str, start: usize) -> usize {
    s.as_bytes()[start..]
        .iter()
        .position(|&b| b != c)
        .map_or(s.len(), |offset| start + offset)
}

/// Index of the first byte after the spaces and tabs starting at `start`.
pub(crate) fn skip_space_tab(s: &str, start: usize) -> usize {
    s.as_bytes()[start..]
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .map_or(s.len(), |offset| start + offset)
}
