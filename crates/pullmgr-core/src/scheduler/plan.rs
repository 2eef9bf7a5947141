use crate::entry::Entry;

/// Decision made before any worker starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePlan {
    pub file_count: usize,
    pub total_bytes: u64,
    pub threshold: u64,
}

impl SchedulePlan {
    pub fn new(entries: &[Entry], threshold: u64) -> Self {
        Self {
            file_count: entries.len(),
            total_bytes: entries.iter().map(|e| e.length).sum(),
            threshold,
        }
    }

    /// A sibling session pays off only with more than one file and more bytes than the threshold.
    pub fn wants_second_session(&self) -> bool {
        self.file_count > 1 && self.total_bytes > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_session_needs_bytes_and_files() {
        let two = [Entry::new("a", 500, 0), Entry::new("b", 100, 0)];
        assert!(SchedulePlan::new(&two, 300).wants_second_session());
        assert!(!SchedulePlan::new(&two, 600).wants_second_session());
        assert!(!SchedulePlan::new(&two[..1], 10).wants_second_session());
        assert!(!SchedulePlan::new(&[], 0).wants_second_session());
    }
}
