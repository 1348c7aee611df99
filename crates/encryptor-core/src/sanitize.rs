//! strongSwan identifier sanitisation.
//!
//! Peer names may contain spaces and other characters that are not legal in
//! a `swanctl` connection name, CHILD_SA name, or config filename. Every
//! on-disk or `swanctl`-facing identifier uses the sanitised form; the
//! original name is preserved only in the database and a leading comment in
//! the generated config file.

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// ```
/// use encryptor_core::sanitize::sanitize_name;
///
/// assert_eq!(sanitize_name("Site A"), "Site_A");
/// assert_eq!(sanitize_name("peer@office#1"), "peer_office_1");
/// ```
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_already_legal_names() {
        assert_eq!(sanitize_name("site-a"), "site-a");
        assert_eq!(sanitize_name("Site_A_1"), "Site_A_1");
    }

    #[test]
    fn replaces_spaces_and_punctuation() {
        assert_eq!(sanitize_name("Site A"), "Site_A");
        assert_eq!(sanitize_name("My Remote Site"), "My_Remote_Site");
        assert_eq!(sanitize_name("peer@office#1"), "peer_office_1");
    }

    #[test]
    fn is_idempotent() {
        let once = sanitize_name("Site A");
        assert_eq!(sanitize_name(&once), once);
    }
}
