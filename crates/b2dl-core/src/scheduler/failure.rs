//! First-failure-wins slot shared by every task of a batch.

use std::sync::{Mutex, PoisonError};

use crate::error::DownloadError;

/// Holds at most one error: the first recorded. Later failures never
/// replace it.
#[derive(Debug, Default)]
pub struct FirstFailure {
    slot: Mutex<Option<DownloadError>>,
}

impl FirstFailure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err`. Returns true if it became the retained failure.
    pub fn record(&self, err: DownloadError) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(err);
        true
    }

    pub fn take(&self) -> Option<DownloadError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::sync::Arc;

    fn mismatch(name: &str) -> DownloadError {
        DownloadError::IntegrityMismatch {
            name: name.to_string(),
            expected: "a".into(),
            actual: "b".into(),
        }
    }

    #[test]
    fn first_failure_is_never_overwritten() {
        let slot = FirstFailure::new();
        assert!(slot.take().is_none());
        assert!(slot.record(mismatch("one")));
        assert!(!slot.record(DownloadError::TaskAborted {
            name: "two".into(),
            reason: "panic".into(),
        }));
        let err = slot.take().unwrap();
        assert_eq!(err.kind(), FailureKind::IntegrityMismatch);
        assert!(err.to_string().contains("one"));
    }

    #[test]
    fn concurrent_records_keep_exactly_one() {
        let slot = Arc::new(FirstFailure::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || slot.record(mismatch(&format!("f{}", i))))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(slot.take().is_some());
        assert!(slot.take().is_none());
    }
}
