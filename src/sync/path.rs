//! Storage path layout
//!
//! Destination paths embed the space label and sanitized title, never the
//! document token: the bucket stays human-browsable, at the cost of rename
//! history (handled by the executor as delete-old/create-new).

use std::path::{Path, PathBuf};

const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace filesystem-hostile characters with `_` and trim whitespace
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Destination key in object storage: `{prefix}{space}/{title}.md`
pub fn object_path(prefix: &str, space_label: &str, title: &str) -> String {
    format!(
        "{}{}/{}.md",
        prefix,
        sanitize_component(space_label),
        sanitize_component(title)
    )
}

/// Local staging path mirroring the storage layout
pub fn staging_path(root: &Path, space_label: &str, title: &str) -> PathBuf {
    root.join(sanitize_component(space_label))
        .join(format!("{}.md", sanitize_component(title)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_every_invalid_char() {
        assert_eq!(sanitize_component(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_sanitize_trims_whitespace() {
        assert_eq!(sanitize_component("  Design Review  "), "Design Review");
    }

    #[test]
    fn test_sanitized_path_has_no_illegal_chars() {
        let path = object_path("wiki/", "Eng", "Q3: Roadmap / Planning?");
        assert_eq!(path, "wiki/Eng/Q3_ Roadmap _ Planning_.md");
        let file_name = path.rsplit('/').next().unwrap();
        assert!(!file_name.contains(|c| INVALID_CHARS.contains(&c)));
    }

    #[test]
    fn test_object_path_layout() {
        assert_eq!(object_path("wiki/", "Eng", "Notes"), "wiki/Eng/Notes.md");
    }
}
