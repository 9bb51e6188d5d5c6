//! Debounced persistence
//!
//! Edits arrive in bursts, so each change records the latest serialized
//! tree and re-arms a single deadline instead of writing immediately. The
//! write happens once the quiet period elapses with no further changes,
//! or eagerly via [`DebouncedSaver::flush`] when a session closes. Time is
//! supplied by the caller, which keeps scheduling deterministic and
//! thread-free.

use std::time::{Duration, Instant};

use crate::document_model;
use crate::playbook::{Playbook, PlaybookError, PlaybookStore};

/// Default quiet period between the last change and the write
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct PendingSave {
    playbook_id: String,
    tree_json: String,
    deadline: Instant,
}

/// Coalesces a burst of changes into one store write
#[derive(Debug)]
pub struct DebouncedSaver {
    quiet_period: Duration,
    pending: Option<PendingSave>,
}

impl DebouncedSaver {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
        }
    }

    /// Record a change, replacing any pending state and re-arming the
    /// deadline
    ///
    /// Only the most recent tree is kept; intermediate states of a burst
    /// are never written.
    pub fn mark_dirty(&mut self, playbook: &Playbook, now: Instant) -> Result<(), PlaybookError> {
        let tree_json = document_model::to_json(&playbook.content)?;
        self.pending = Some(PendingSave {
            playbook_id: playbook.id.clone(),
            tree_json,
            deadline: now + self.quiet_period,
        });
        Ok(())
    }

    /// Deadline of the pending write, if one is armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Write the pending state if its quiet period has elapsed
    ///
    /// # Returns
    /// * `true` when a write happened
    pub fn poll(
        &mut self,
        now: Instant,
        store: &mut dyn PlaybookStore,
    ) -> Result<bool, PlaybookError> {
        match &self.pending {
            Some(p) if now >= p.deadline => self.write_pending(store),
            _ => Ok(false),
        }
    }

    /// Write any pending state immediately, e.g. on session close
    pub fn flush(&mut self, store: &mut dyn PlaybookStore) -> Result<bool, PlaybookError> {
        if self.pending.is_some() {
            self.write_pending(store)
        } else {
            Ok(false)
        }
    }

    fn write_pending(&mut self, store: &mut dyn PlaybookStore) -> Result<bool, PlaybookError> {
        // Taken before the write so a store error does not retry stale state
        // forever; the next change re-arms the saver.
        if let Some(p) = self.pending.take() {
            log::debug!("writing debounced save for playbook {}", p.playbook_id);
            store.save_content(&p.playbook_id, &p.tree_json)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl Default for DebouncedSaver {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown_builder::build_document;
    use crate::playbook::MemoryStore;

    fn playbook(text: &str) -> Playbook {
        let mut pb = Playbook::new("pb-1", "T", "u1");
        pb.content = build_document(text);
        pb
    }

    #[test]
    fn test_no_write_before_quiet_period() {
        let mut saver = DebouncedSaver::new(Duration::from_millis(500));
        let mut store = MemoryStore::new();
        let t0 = Instant::now();

        saver.mark_dirty(&playbook("draft one\n"), t0).unwrap();
        assert!(!saver.poll(t0 + Duration::from_millis(100), &mut store).unwrap());
        assert!(store.load_content("pb-1").is_err());
    }

    #[test]
    fn test_burst_coalesces_to_latest_state() {
        let mut saver = DebouncedSaver::new(Duration::from_millis(500));
        let mut store = MemoryStore::new();
        let t0 = Instant::now();

        saver.mark_dirty(&playbook("draft one\n"), t0).unwrap();
        saver
            .mark_dirty(&playbook("draft two\n"), t0 + Duration::from_millis(300))
            .unwrap();

        // The first deadline passed, but the second change re-armed it
        assert!(!saver.poll(t0 + Duration::from_millis(600), &mut store).unwrap());
        assert!(saver.poll(t0 + Duration::from_millis(800), &mut store).unwrap());

        let saved = store.load_content("pb-1").unwrap();
        assert!(saved.contains("draft two"));
        assert!(!saved.contains("draft one"));
    }

    #[test]
    fn test_poll_writes_once() {
        let mut saver = DebouncedSaver::new(Duration::from_millis(100));
        let mut store = MemoryStore::new();
        let t0 = Instant::now();

        saver.mark_dirty(&playbook("only draft\n"), t0).unwrap();
        assert!(saver.poll(t0 + Duration::from_millis(200), &mut store).unwrap());
        assert!(!saver.poll(t0 + Duration::from_millis(300), &mut store).unwrap());
        assert!(saver.next_deadline().is_none());
    }

    #[test]
    fn test_flush_writes_immediately() {
        let mut saver = DebouncedSaver::new(Duration::from_secs(60));
        let mut store = MemoryStore::new();

        saver.mark_dirty(&playbook("closing state\n"), Instant::now()).unwrap();
        assert!(saver.flush(&mut store).unwrap());
        assert!(store.load_content("pb-1").unwrap().contains("closing state"));

        // Nothing left pending after a flush
        assert!(!saver.flush(&mut store).unwrap());
    }
}
