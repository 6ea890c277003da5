//! Output file naming.
//!
//! Exported files are named `{base_name}{index}.jpg`, where the index starts
//! at a configurable integer and increases by one per exported image in
//! chronological order. The base name comes from user input, so it is
//! normalised first. Surrounding whitespace is trimmed and inner whitespace
//! runs collapse to a single `_`. Path separators and other characters that
//! are reserved in file names become `_`, so the name can never leave the
//! output directory. An empty or dots-only result falls back to
//! [`DEFAULT_BASE_NAME`].
//!
//! - `"card"` + 1 → `card1.jpg`
//! - `"  my   deck "` + 12 → `my_deck12.jpg`
//! - `"../x"` + 2 → `.._x2.jpg`
//! - `""` + 3 → `card3.jpg`

/// Base name used when the user supplies none.
pub const DEFAULT_BASE_NAME: &str = "card";

/// Characters that can't appear in a file name on common filesystems.
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Normalise a user-supplied base name into a single path component.
pub fn sanitize_base_name(raw: &str) -> String {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        DEFAULT_BASE_NAME.to_string()
    } else {
        cleaned
    }
}

/// File name for the export at `index`.
pub fn output_file_name(base_name: &str, index: i64) -> String {
    format!("{base_name}{index}.jpg")
}

/// File name for an item's preview.
///
/// The relative source path loses its extension and has `/` flattened to `_`,
/// so previews of same-named files in different folders don't collide.
pub fn preview_file_name(source_name: &str) -> String {
    let stem = match source_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
        _ => source_name,
    };
    format!("{}-preview.jpg", stem.replace('/', "_"))
}
