//! Size-sorted remote listing.

use crate::entry::{Entry, EntryFilter, SortOrder};
use crate::session::{SessionError, TransferSession};

/// List the session's remote root, keeping entries accepted by `filter`,
/// largest first. Entries of equal size keep the order the remote listed them.
///
/// `Ok(vec![])` is a legitimately empty mailbox; an unreachable listing is an error.
pub fn list_entries(
    session: &dyn TransferSession,
    filter: &dyn EntryFilter,
    recursive: bool,
) -> Result<Vec<Entry>, SessionError> {
    let mut entries = session.list(None, recursive, filter, SortOrder::SizeDescending)?;
    // Sessions may ignore the requested order; the stable sort keeps natural order on ties.
    entries.sort_by(|a, b| b.length.cmp(&a.length));
    tracing::debug!(
        session = %session.identity(),
        count = entries.len(),
        "listed remote entries"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FilesOnly;
    use crate::test_support::ScriptedSession;

    #[test]
    fn sorts_descending_with_stable_ties() {
        let session = ScriptedSession::with_listing(vec![
            Entry::new("a", 100, 0),
            Entry::new("b", 500, 0),
            Entry::new("c", 100, 0),
        ]);
        let list = list_entries(&session, &FilesOnly, true).unwrap();
        let paths: Vec<&str> = list.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, ["b", "a", "c"]);
    }

    #[test]
    fn empty_listing_is_success() {
        let session = ScriptedSession::with_listing(Vec::new());
        assert!(list_entries(&session, &FilesOnly, true).unwrap().is_empty());
    }

    #[test]
    fn unavailable_listing_is_error() {
        let session = ScriptedSession::unavailable();
        assert!(matches!(
            list_entries(&session, &FilesOnly, true),
            Err(SessionError::Unavailable(_))
        ));
    }
}
