//! Slug normalization
//!
//! Turns arbitrary device and command names into `[a-z0-9_]` tokens usable as
//! the object part of an entity id.

/// Object id used when a name contains nothing that survives normalization
pub const EMPTY_SLUG: &str = "unnamed";

/// Normalize a name into a slug.
///
/// ASCII letters are lowercased, ASCII digits kept, every other run of
/// characters collapses into a single underscore. Leading and trailing
/// underscores are trimmed. Never fails: a name with no usable characters
/// becomes [`EMPTY_SLUG`].
pub fn slugify(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
        } else if !result.is_empty() && !result.ends_with('_') {
            result.push('_');
        }
    }

    let trimmed = result.trim_end_matches('_');
    if trimmed.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Check whether a string is already a normalized slug
pub fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && !s.contains("__")
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_plain() {
        assert_eq!(slugify("Living Room Fan"), "living_room_fan");
        assert_eq!(slugify("tonys_office_ceiling_fan"), "tonys_office_ceiling_fan");
    }

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify("__Bed--room  TV__"), "bed_room_tv");
        assert_eq!(slugify("a___b"), "a_b");
        assert_eq!(slugify("Tony's Office"), "tony_s_office");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Küche Licht"), "k_che_licht");
    }

    #[test]
    fn test_slugify_never_empty() {
        assert_eq!(slugify(""), EMPTY_SLUG);
        assert_eq!(slugify("!!! ???"), EMPTY_SLUG);
    }

    #[test]
    fn test_is_slug() {
        assert!(is_slug("living_room_fan"));
        assert!(is_slug("fan2"));
        assert!(!is_slug("_fan"));
        assert!(!is_slug("fan_"));
        assert!(!is_slug("living__room"));
        assert!(!is_slug("Fan"));
        assert!(!is_slug(""));
    }

    #[test]
    fn test_slugify_output_is_slug() {
        for name in ["x", "Ceiling Fan #2", "  _odd__name_ ", "ÄÖÜ", "vol+"] {
            assert!(is_slug(&slugify(name)), "{name}");
        }
    }
}
