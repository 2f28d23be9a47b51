//! Scanning of link labels, destinations and titles, shared by inline links and
//! link reference definitions. Each function leaves the scanner after what it matched.
use crate::characters::is_escapable;
use crate::scanner::Scanner;

/// Deepest nesting of unescaped parentheses allowed in a destination.
const MAX_PAREN_DEPTH: usize = 32;

fn skip_escape(scanner: &mut Scanner) {
    scanner.advance();
    if scanner.peek().is_some_and(is_escapable) {
        scanner.advance();
    }
}

/// Label content up to (not including) the closing `]`. Fails on an unescaped `[`.
pub(crate) fn scan_link_label_content(scanner: &mut Scanner) -> bool {
    while let Some(c) = scanner.peek() {
        match c {
            '\\' => skip_escape(scanner),
            ']' => return true,
            '[' => return false,
            _ => scanner.advance(),
        }
    }
    true
}

/// A destination in angle brackets, or a run without spaces or control characters whose
/// parentheses are balanced. The run may only be empty when followed by `)`.
pub(crate) fn scan_link_destination(scanner: &mut Scanner) -> bool {
    if !scanner.has_next() {
        return false;
    }
    if !scanner.eat('<') {
        return scan_link_destination_with_balanced_parens(scanner);
    }
    while let Some(c) = scanner.peek() {
        match c {
            '\\' => skip_escape(scanner),
            '\n' | '<' => return false,
            '>' => {
                scanner.advance();
                return true;
            }
            _ => scanner.advance(),
        }
    }
    false
}

fn scan_link_destination_with_balanced_parens(scanner: &mut Scanner) -> bool {
    let mut parens = 0;
    let mut empty = true;
    while let Some(c) = scanner.peek() {
        match c {
            ' ' => return !empty,
            '\\' => skip_escape(scanner),
            '(' => {
                parens += 1;
                if parens > MAX_PAREN_DEPTH {
                    return false;
                }
                scanner.advance();
            }
            ')' => {
                // The closing parenthesis of an inline link may directly follow `(`.
                if parens == 0 {
                    return true;
                }
                parens -= 1;
                scanner.advance();
            }
            c if c.is_control() => return !empty,
            _ => scanner.advance(),
        }
        empty = false;
    }
    !empty
}

/// A title in double quotes, single quotes or parentheses, including the delimiters.
pub(crate) fn scan_link_title(scanner: &mut Scanner) -> bool {
    let end_delimiter = match scanner.peek() {
        Some('"') => '"',
        Some('\'') => '\'',
        Some('(') => ')',
        _ => return false,
    };
    scanner.advance();
    if !scan_link_title_content(scanner, end_delimiter) || !scanner.has_next() {
        return false;
    }
    scanner.advance();
    true
}

/// Title content up to (not including) `end_delimiter`. Within parentheses an unescaped
/// `(` is not allowed.
pub(crate) fn scan_link_title_content(scanner: &mut Scanner, end_delimiter: char) -> bool {
    while let Some(c) = scanner.peek() {
        if c == '\\' {
            skip_escape(scanner);
        } else if c == end_delimiter {
            return true;
        } else if end_delimiter == ')' && c == '(' {
            return false;
        } else {
            scanner.advance();
        }
    }
    true
}
