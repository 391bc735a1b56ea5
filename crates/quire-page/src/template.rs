//! Placeholder scanning.
//!
//! A placeholder is `open` + name + `close`, where the name is non-empty after
//! trimming and contains no whitespace. Anything else is literal text.
//! Replacement content is never rescanned within the same pass.

use quire_settings::Delimiter;

/// What to do with one placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Substitute the placeholder with this text.
    Replace(String),
    /// Leave the placeholder in place.
    Keep,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

/// Locate the next placeholder at or after `from`.
///
/// Returns `(start, end, name)` where `start..end` spans the whole token.
fn next_placeholder<'t>(
    template: &'t str,
    from: usize,
    delimiter: &Delimiter,
) -> Option<(usize, usize, &'t str)> {
    let mut cursor = from;
    while let Some(offset) = template[cursor..].find(&delimiter.open) {
        let start = cursor + offset;
        let name_start = start + delimiter.open.len();
        let close = template[name_start..].find(&delimiter.close)?;
        let name_end = name_start + close;
        let name = template[name_start..name_end].trim();
        if valid_name(name) {
            return Some((start, name_end + delimiter.close.len(), name));
        }
        cursor = name_start;
    }
    None
}

/// Whether `template` holds at least one placeholder.
pub fn contains_placeholder(template: &str, delimiter: &Delimiter) -> bool {
    next_placeholder(template, 0, delimiter).is_some()
}

/// Names of all placeholders, in template order.
pub fn placeholder_names<'t>(template: &'t str, delimiter: &Delimiter) -> Vec<&'t str> {
    let mut names = Vec::new();
    let mut cursor = 0;
    while let Some((_, end, name)) = next_placeholder(template, cursor, delimiter) {
        names.push(name);
        cursor = end;
    }
    names
}

/// Run one pass over `template`, resolving each placeholder left to right.
pub fn substitute<F>(template: &str, delimiter: &Delimiter, mut resolve: F) -> String
where
    F: FnMut(&str) -> Resolution,
{
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    while let Some((start, end, name)) = next_placeholder(template, cursor, delimiter) {
        out.push_str(&template[cursor..start]);
        match resolve(name) {
            Resolution::Replace(text) => out.push_str(&text),
            Resolution::Keep => out.push_str(&template[start..end]),
        }
        cursor = end;
    }
    out.push_str(&template[cursor..]);
    out
}

/// Build the placeholder token for `name`.
pub fn token(delimiter: &Delimiter, name: &str) -> String {
    format!("{}{name}{}", delimiter.open, delimiter.close)
}
