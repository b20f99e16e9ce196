//! Identity key derivation.
//!
//! A key is `{first}_{last}.png` where each name is trimmed and every
//! whitespace character is replaced by `_`. The same derivation is used when
//! a client hands a key back, so a stored key can always be re-derived from
//! its own stem.

/// Extension appended to every identity key. Stored images are named by key.
pub const IMAGE_EXTENSION: &str = ".png";

/// File extensions recognized as stored images.
pub const RECOGNIZED_IMAGE_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

/// Trim a name and replace each whitespace character with `_`.
#[inline]
pub fn clean_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Derive the identity key for a first/last name pair.
///
/// Callers must reject names that are empty after trimming.
#[must_use]
pub fn derive_key(first_name: &str, last_name: &str) -> String {
    format!(
        "{}_{}{}",
        clean_name(first_name),
        clean_name(last_name),
        IMAGE_EXTENSION
    )
}

/// Bring a client-supplied key back into canonical form.
///
/// The stem is split on the first `_` and re-derived. A first name that
/// contained a space cannot be told apart from a last name that did, so the
/// split always favours the last name. Keys without the image extension or
/// without an `_` come back unchanged.
#[must_use]
pub fn normalize_key(raw: &str) -> String {
    let Some(stem) = raw.strip_suffix(IMAGE_EXTENSION) else {
        return raw.to_string();
    };
    match stem.split_once('_') {
        Some((first, last)) => derive_key(first, last),
        None => raw.to_string(),
    }
}

/// Whether `name` is a single path component that stays inside its
/// directory when joined onto it.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Whether a file name carries one of the recognized image extensions.
pub fn is_image_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RECOGNIZED_IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(ext))
}
