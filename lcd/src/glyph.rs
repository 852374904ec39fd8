//! Built-in custom character patterns.
//!
//! The JHD1313M1 ROM has no Latin-1 accents, so these have to be uploaded to CGRAM with
//! [crate::Jhd1313m1::set_custom_char] and then written as their slot number (`'\u{0}'..='\u{7}'`).
//! Only 8 can be loaded at a time.

/// 8 rows, top to bottom. Only the low 5 bits of each row are displayed.
pub type GlyphPattern = [u8; 8];

pub const CUSTOM_CHARS: &[(&str, GlyphPattern)] = &[
    ("é", [130, 132, 142, 145, 159, 144, 142, 128]),
    ("è", [136, 132, 142, 145, 159, 144, 142, 128]),
    ("ê", [132, 138, 142, 145, 159, 144, 142, 128]),
    ("à", [136, 134, 128, 142, 145, 147, 141, 128]),
    ("â", [132, 138, 128, 142, 145, 147, 141, 128]),
    ("á", [2, 4, 14, 1, 15, 17, 15, 0]),
    ("î", [132, 138, 128, 140, 132, 132, 142, 128]),
    ("í", [2, 4, 12, 4, 4, 4, 14, 0]),
    ("û", [132, 138, 128, 145, 145, 147, 141, 128]),
    ("ù", [136, 134, 128, 145, 145, 147, 141, 128]),
    ("ñ", [14, 0, 22, 25, 17, 17, 17, 0]),
    ("ó", [2, 4, 14, 17, 17, 17, 14, 0]),
    ("heart", [0, 10, 31, 31, 31, 14, 4, 0]),
    ("smiley", [0, 0, 10, 0, 0, 17, 14, 0]),
    ("frowney", [0, 0, 10, 0, 0, 0, 14, 17]),
];

/// Looks up a built-in pattern by name.
pub fn custom_char(name: &str) -> Option<&'static GlyphPattern> {
    CUSTOM_CHARS
        .iter()
        .find(|(glyph, _)| *glyph == name)
        .map(|(_, pattern)| pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = CUSTOM_CHARS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), CUSTOM_CHARS.len());
    }

    #[test]
    fn finds_patterns_by_name() {
        assert_eq!(custom_char("heart"), Some(&[0, 10, 31, 31, 31, 14, 4, 0]));
        assert_eq!(custom_char("ñ"), Some(&[14, 0, 22, 25, 17, 17, 17, 0]));
        assert_eq!(custom_char("ü"), None);
    }

    #[test]
    fn visible_rows_fit_five_columns() {
        // The set bit 7 in some rows is ignored by the controller.
        for (name, pattern) in CUSTOM_CHARS {
            for row in pattern {
                assert!(row & 0b0110_0000 == 0, "{} has a row wider than 5 dots", name);
            }
        }
    }
}
