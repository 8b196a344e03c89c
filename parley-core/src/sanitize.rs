// ABOUTME: Text and filename sanitizers applied to everything users can type.
// ABOUTME: Markup escaping for chat text, safe names for stored files and uploads.

use regex::Regex;
use std::sync::LazyLock;

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);")
        .expect("entity pattern is valid")
});

/// Escape `&`, `<` and `>` so user text can never inject markup.
/// Character references that are already escaped are left alone,
/// so sanitizing twice gives the same result as sanitizing once.
pub fn escape_markup(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, ch) in value.char_indices() {
        match ch {
            '&' if ENTITY.is_match(&value[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape markup and keep at most `max_chars` characters
pub fn clean_capped(value: &str, max_chars: usize) -> String {
    escape_markup(value).chars().take(max_chars).collect()
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
/// Used for the file name component of everything the store writes.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Reduce an uploaded or requested file name to a safe flat name.
///
/// Path separators and whitespace runs become a single `_`, anything that
/// is not ASCII alphanumeric or one of `_.-` is dropped, and leading or
/// trailing dots and underscores are stripped. The result may be empty.
pub fn secure_filename(name: &str) -> String {
    let spaced = name.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Lowercased extension of a file name, without the dot
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
