//! Fire-and-continue progress reporting.
//!
//! The engine never calls the caller's callback directly: events travel over
//! an unbounded channel to a dedicated delivery thread, so a slow callback
//! cannot stall reconciliation work.
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

/// A single progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Items completed so far.
    pub current: usize,
    /// Items in the batch.
    pub total: usize,
    /// What just happened.
    pub message: String,
}

/// Progress reporter handed to batch operations.
#[derive(Debug)]
pub struct Progress {
    sender: Option<Sender<ProgressEvent>>,
    handle: Option<JoinHandle<()>>,
}

impl Progress {
    /// A reporter that discards every event.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            sender: None,
            handle: None,
        }
    }

    /// Deliver events to `callback` on a background thread.
    ///
    /// Falls back to [`Progress::none`] if the thread cannot be spawned.
    #[must_use]
    pub fn new(callback: impl Fn(usize, usize, &str) + Send + 'static) -> Self {
        let (sender, receiver) = mpsc::channel::<ProgressEvent>();
        let spawned = std::thread::Builder::new()
            .name("dotlink-progress".to_string())
            .spawn(move || {
                for event in receiver {
                    callback(event.current, event.total, &event.message);
                }
            });
        match spawned {
            Ok(handle) => Self {
                sender: Some(sender),
                handle: Some(handle),
            },
            Err(e) => {
                tracing::debug!("progress thread unavailable: {e}");
                Self::none()
            }
        }
    }

    /// Queue an event; never blocks.
    pub fn report(&self, current: usize, total: usize, message: &str) {
        if let Some(sender) = &self.sender {
            // A closed channel only means nobody is listening any more.
            let _ = sender.send(ProgressEvent {
                current,
                total,
                message: message.to_string(),
            });
        }
    }

    /// Stop accepting events and wait until every queued event was delivered.
    pub fn finish(self) {
        let Self { sender, handle } = self;
        drop(sender);
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn none_discards_events() {
        let progress = Progress::none();
        progress.report(1, 2, "ignored");
        progress.finish();
    }

    #[test]
    fn events_are_delivered_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |current, total, message| {
            sink.lock()
                .unwrap()
                .push(format!("{current}/{total} {message}"));
        });
        progress.report(1, 2, "vim");
        progress.report(2, 2, "zsh");
        progress.finish();
        assert_eq!(*seen.lock().unwrap(), vec!["1/2 vim", "2/2 zsh"]);
    }

    #[test]
    fn slow_callback_does_not_block_reporter() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let progress = Progress::new(move |_, _, _| {
            let _ = release_rx.lock().unwrap().recv();
        });
        for i in 0..100 {
            progress.report(i, 100, "tick");
        }
        for _ in 0..100 {
            release_tx.send(()).unwrap();
        }
        progress.finish();
    }
}
