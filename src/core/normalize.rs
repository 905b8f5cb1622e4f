//! Title normalization for catalog lookups and duplicate grouping.

/// Characters removed from raw titles before lookup
const STRIPPED_CHARS: &[char] = &['"', '\u{201C}', '\u{201D}', '™', '®', '©'];

/// Clean a raw platform title for lookup:
/// - Remove double quotes (straight and typographic) and ™ ® © glyphs
/// - Collapse runs of whitespace to a single space
/// - Trim
///
/// Apostrophes survive, catalog names use them ("Assassin's Creed").
pub fn normalize(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive key for grouping normalized titles
pub fn grouping_key(normalized: &str) -> String {
    normalized.to_lowercase()
}
