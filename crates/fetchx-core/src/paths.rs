//! Destination paths for downloaded assets.
//!
//! Layout: `{sanitized-query}/{provider}/{provider}_{item-id}.{ext}`, relative to
//! the transfer facility's download root. Deterministic for a given item, so a
//! re-run targets the same name and the facility's conflict policy decides.

use std::path::PathBuf;

use crate::provider::{MediaType, Provider};

const NAME_MAX: usize = 255;

/// Replaces every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_query(query: &str) -> String {
    let out: String = query
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    truncate(out)
}

/// Sanitizes one path component (e.g. an item id) for safe use on Linux.
///
/// - Replaces NUL, `/`, `\`, whitespace and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots and underscores
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replaced = c == '\0' || c == '/' || c == '\\' || c.is_control() || c.is_whitespace();
        if replaced || c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    truncate(out.trim_matches(|c| c == '.' || c == '_').to_string())
}

fn truncate(mut s: String) -> String {
    if s.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !s.is_char_boundary(take) {
            take -= 1;
        }
        s.truncate(take);
    }
    s
}

/// Relative destination for one item.
pub fn destination(query: &str, provider: Provider, item_id: &str, media: MediaType) -> PathBuf {
    let mut id = sanitize_component(item_id);
    if id.is_empty() {
        id = "item".to_string();
    }
    let file = format!("{}_{}.{}", provider.as_str(), id, media.extension());
    PathBuf::from(sanitize_query(query))
        .join(provider.as_str())
        .join(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn query_keeps_only_ascii_alphanumerics() {
        assert_eq!(sanitize_query("cats"), "cats");
        assert_eq!(sanitize_query("red cars/2024"), "red_cars_2024");
        assert_eq!(sanitize_query("../etc"), "___etc");
        assert_eq!(sanitize_query("café"), "caf_");
    }

    #[test]
    fn component_sanitizing() {
        assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_component("..hidden.."), "hidden");
        assert_eq!(sanitize_component("file___name"), "file_name");
        assert_eq!(sanitize_component("Dwu85P9-SOIk"), "Dwu85P9-SOIk");
        assert_eq!(sanitize_component("x\x00y"), "x_y");
    }

    #[test]
    fn destination_layout() {
        assert_eq!(
            destination("cats", Provider::Pexels, "12345", MediaType::Images),
            Path::new("cats/pexels/pexels_12345.jpg")
        );
        assert_eq!(
            destination("ocean waves", Provider::Pixabay, "77", MediaType::Videos),
            Path::new("ocean_waves/pixabay/pixabay_77.mp4")
        );
        assert_eq!(
            destination("x", Provider::Unsplash, "..", MediaType::Images),
            Path::new("x/unsplash/unsplash_item.jpg")
        );
    }

    #[test]
    fn long_names_are_truncated() {
        let long = "a".repeat(400);
        assert_eq!(sanitize_query(&long).len(), NAME_MAX);
        assert_eq!(sanitize_component(&long).len(), NAME_MAX);
    }
}
