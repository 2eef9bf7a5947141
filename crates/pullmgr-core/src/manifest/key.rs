use crate::session::SessionIdentity;

/// Key a manifest is stored under: one manifest per `(host, mailbox, action)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestKey(String);

impl ManifestKey {
    /// `<host>_<mailbox>_<action>`, with anything outside `[A-Za-z0-9._-]` replaced by `-`.
    pub fn for_identity(identity: &SessionIdentity) -> Self {
        let raw = format!("{}_{}_{}", identity.host, identity.mailbox, identity.action);
        let cleaned: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        // A leading dot would hide the file and ".." would escape the directory.
        let cleaned = cleaned.trim_start_matches('.').to_string();
        Self(if cleaned.is_empty() {
            "unnamed".to_string()
        } else {
            cleaned
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name used by the JSON codec.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl std::fmt::Display for ManifestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
