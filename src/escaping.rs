/// Backslash escapes, entities, label normalization and URL/HTML escaping
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use unicode_casefold::UnicodeCaseFold;

use crate::characters::is_escapable;

/// HTML5 named entities keyed by name without `&` and `;`.
static NAMED_ENTITIES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    entities::ENTITIES
        .iter()
        .filter(|e| e.entity.ends_with(';'))
        .map(|e| (&e.entity[1..e.entity.len() - 1], e.characters))
        .collect()
});

/// Decodes an entity reference at the start of `s` (which begins with `&`).
/// Returns the decoded text and the number of bytes the reference occupies.
pub(crate) fn decode_entity(s: &str) -> Option<(String, usize)> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'&') {
        return None;
    }
    if bytes.get(1) == Some(&b'#') {
        let hex = matches!(bytes.get(2), Some(b'x' | b'X'));
        let digits_start = if hex { 3 } else { 2 };
        let max_digits = if hex { 6 } else { 7 };
        let digits = bytes[digits_start..]
            .iter()
            .take_while(|b| if hex { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
            .count();
        let end = digits_start + digits;
        if digits == 0 || digits > max_digits || bytes.get(end) != Some(&b';') {
            return None;
        }
        let radix = if hex { 16 } else { 10 };
        let code = u32::from_str_radix(&s[digits_start..end], radix).unwrap_or(0);
        let c = match code {
            0 => '\u{FFFD}',
            _ => char::from_u32(code).unwrap_or('\u{FFFD}'),
        };
        return Some((c.to_string(), end + 1));
    }

    let name_len = bytes[1..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    let end = 1 + name_len;
    if name_len == 0 || !bytes[1].is_ascii_alphabetic() || bytes.get(end) != Some(&b';') {
        return None;
    }
    NAMED_ENTITIES
        .get(&s[1..end])
        .map(|decoded| (decoded.to_string(), end + 1))
}

/// Resolves backslash escapes and entity references.
pub fn unescape_string(s: &str) -> Cow<'_, str> {
    if !s.contains(['\\', '&']) {
        return Cow::Borrowed(s);
    }
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find(['\\', '&']) {
        result.push_str(&rest[..pos]);
        rest = &rest[pos..];
        if rest.starts_with('\\') {
            match rest[1..].chars().next() {
                Some(c) if is_escapable(c) => {
                    result.push(c);
                    rest = &rest[1 + c.len_utf8()..];
                }
                _ => {
                    result.push('\\');
                    rest = &rest[1..];
                }
            }
        } else if let Some((decoded, len)) = decode_entity(rest) {
            result.push_str(&decoded);
            rest = &rest[len..];
        } else {
            result.push('&');
            rest = &rest[1..];
        }
    }
    result.push_str(rest);
    Cow::Owned(result)
}

/// Normalizes a link label for matching: trims, case folds and collapses internal
/// runs of spaces, tabs and line endings to one space.
pub fn normalize_label(label: &str) -> String {
    let folded: String = label.chars().case_fold().collect();
    folded
        .split([' ', '\t', '\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Percent-encodes a URL for an `href` or `src` attribute. Existing `%XX` escapes and
/// characters that are safe in URLs are kept as they are.
pub fn percent_encode_url(url: &str) -> String {
    const SAFE: &[u8] = b":/?#@!$&'()*+,;=-._~";
    let bytes = url.as_bytes();
    let mut result = String::with_capacity(url.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit()
            {
                result.push_str(&url[i..i + 3]);
                i += 3;
            } else {
                result.push_str("%25");
                i += 1;
            }
        } else if b.is_ascii_alphanumeric() || SAFE.contains(&b) {
            result.push(b as char);
            i += 1;
        } else {
            result.push_str(&format!("%{:02X}", b));
            i += 1;
        }
    }
    result
}

/// Escapes `&`, `<`, `>` and `"` for HTML text and attribute values.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
