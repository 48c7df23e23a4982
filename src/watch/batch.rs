// src/watch/batch.rs

//! Debounce window bookkeeping.
//!
//! [`ChangeBatcher`] is a pure state machine: the caller passes the current
//! time in and asks for the window deadline, so the async watcher loop owns
//! the only timer and tests can drive windows with synthetic instants.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::types::DebouncePolicy;
use crate::watch::WatchedFile;

/// Changes collected during one debounce window, in arrival order.
#[derive(Debug)]
pub struct Batch<H> {
    id: u64,
    deadline: Instant,
    entries: Vec<(WatchedFile, H)>,
}

impl<H> Batch<H> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(WatchedFile, H)> {
        self.entries
    }
}

/// Holds at most one open [`Batch`].
#[derive(Debug)]
pub struct ChangeBatcher<H> {
    delay: Duration,
    policy: DebouncePolicy,
    open: Option<Batch<H>>,
    next_id: u64,
}

impl<H> ChangeBatcher<H> {
    pub fn new(delay: Duration, policy: DebouncePolicy) -> Self {
        Self {
            delay,
            policy,
            open: None,
            next_id: 1,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Number of changes in the open window.
    pub fn len(&self) -> usize {
        self.open.as_ref().map_or(0, Batch::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the open window closes, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.open.as_ref().map(|batch| batch.deadline)
    }

    /// Add a change to the open window, opening one if needed. Returns the
    /// window's (possibly moved) deadline.
    pub fn push(&mut self, file: WatchedFile, handler: H, now: Instant) -> Instant {
        let delay = self.delay;
        let policy = self.policy;

        let batch = match &mut self.open {
            Some(batch) => {
                if policy == DebouncePolicy::Reset {
                    batch.deadline = now + delay;
                }
                batch
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                debug!(batch_id = id, delay_ms = delay.as_millis() as u64, "opening batch window");
                self.open.insert(Batch {
                    id,
                    deadline: now + delay,
                    entries: Vec::new(),
                })
            }
        };

        batch.entries.push((file, handler));
        batch.deadline
    }

    /// Close and return the open window if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<Batch<H>> {
        match &self.open {
            Some(batch) if batch.deadline <= now => self.open.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::InputFile;
    use std::path::PathBuf;

    fn watched(task: &str, rel: &str) -> WatchedFile {
        WatchedFile {
            task: task.to_string(),
            file: InputFile {
                group: "app".to_string(),
                path: PathBuf::from("src").join(rel),
                relative: rel.to_string(),
            },
        }
    }

    #[test]
    fn fixed_window_keeps_first_deadline() {
        let start = Instant::now();
        let mut batcher = ChangeBatcher::new(Duration::from_millis(200), DebouncePolicy::Fixed);

        let first = batcher.push(watched("styles", "a.scss"), 1, start);
        let second = batcher.push(
            watched("app", "b.js"),
            2,
            start + Duration::from_millis(150),
        );

        assert_eq!(first, start + Duration::from_millis(200));
        assert_eq!(second, first);
        assert!(batcher.take_due(start + Duration::from_millis(199)).is_none());

        let batch = batcher.take_due(first).expect("window is due");
        assert_eq!(batch.id(), 1);
        let order: Vec<i32> = batch.into_entries().into_iter().map(|(_, h)| h).collect();
        assert_eq!(order, vec![1, 2]);
        assert!(!batcher.is_open());
    }

    #[test]
    fn reset_window_moves_deadline_on_each_change() {
        let start = Instant::now();
        let mut batcher = ChangeBatcher::new(Duration::from_millis(200), DebouncePolicy::Reset);

        batcher.push(watched("styles", "a.scss"), (), start);
        let moved = batcher.push(
            watched("styles", "a.scss"),
            (),
            start + Duration::from_millis(150),
        );

        assert_eq!(moved, start + Duration::from_millis(350));
        assert!(batcher.take_due(start + Duration::from_millis(200)).is_none());
        assert_eq!(batcher.take_due(moved).map(|b| b.len()), Some(2));
    }

    #[test]
    fn next_change_after_close_opens_a_new_window() {
        let start = Instant::now();
        let mut batcher = ChangeBatcher::new(Duration::from_millis(200), DebouncePolicy::Fixed);

        let deadline = batcher.push(watched("styles", "a.scss"), (), start);
        let first = batcher.take_due(deadline).unwrap();

        batcher.push(watched("styles", "a.scss"), (), deadline + Duration::from_millis(1));
        let second = batcher.take_due(deadline + Duration::from_millis(500)).unwrap();

        assert_eq!((first.id(), second.id()), (1, 2));
    }
}
