use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::types::FileId;

struct Entry {
    generation: u64,
    cancel: oneshot::Sender<()>,
}

/// Per-session registry of every pending timer, keyed by file id.
///
/// Registering an id that is already present cancels the previous timer, so an
/// id never has more than one live timer. Dropping the registry cancels all of
/// them.
#[derive(Default)]
pub struct TimerRegistry {
    entries: Mutex<HashMap<FileId, Entry>>,
    next_generation: AtomicU64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, file_id: FileId) -> TimerHandle {
        let (cancel, cancelled) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .lock()
            .insert(file_id, Entry { generation, cancel });
        if let Some(previous) = previous {
            tracing::debug!(%file_id, "Replacing pending timer");
            let _ = previous.cancel.send(());
        }
        TimerHandle {
            file_id,
            generation,
            cancelled,
            fired: false,
        }
    }

    pub fn cancel(&self, file_id: &FileId) -> bool {
        match self.lock().remove(file_id) {
            Some(entry) => {
                let _ = entry.cancel.send(());
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let entries: Vec<Entry> = self.lock().drain().map(|(_, entry)| entry).collect();
        let count = entries.len();
        for entry in entries {
            let _ = entry.cancel.send(());
        }
        count
    }

    /// Drops the entry of a finished timer. A newer registration for the same id
    /// is left untouched.
    pub fn release(&self, handle: &TimerHandle) {
        let mut entries = self.lock();
        if entries
            .get(&handle.file_id)
            .is_some_and(|entry| entry.generation == handle.generation)
        {
            entries.remove(&handle.file_id);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FileId, Entry>> {
        // The map stays consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cancellation side of one registration, owned by the task driving the job.
pub struct TimerHandle {
    file_id: FileId,
    generation: u64,
    cancelled: oneshot::Receiver<()>,
    fired: bool,
}

impl TimerHandle {
    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn is_cancelled(&mut self) -> bool {
        if self.fired {
            return true;
        }
        match self.cancelled.try_recv() {
            Err(TryRecvError::Empty) => false,
            Ok(()) | Err(TryRecvError::Closed) => {
                self.fired = true;
                true
            }
        }
    }

    /// Sleeps for `duration`. Returns `false` if cancelled first.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        self.guard(tokio::time::sleep(duration)).await.is_some()
    }

    /// Runs `fut` unless cancelled first, in which case its output is discarded.
    pub async fn guard<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        if self.fired {
            return None;
        }
        tokio::select! {
            biased;
            _ = &mut self.cancelled => {
                self.fired = true;
                None
            }
            output = fut => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn test_register_replaces_previous_timer() {
        let registry = TimerRegistry::new();
        let file_id = Uuid::new_v4();

        let mut first = registry.register(file_id);
        let mut second = registry.register(file_id);

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.len(), 1);

        registry.release(&first);
        assert_eq!(registry.len(), 1);
        registry.release(&second);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let registry = std::sync::Arc::new(TimerRegistry::new());
        let file_id = Uuid::new_v4();
        let mut handle = registry.register(file_id);

        let canceller = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel(&file_id);
        });

        assert!(!handle.sleep(Duration::from_secs(60)).await);
        assert!(!handle.sleep(Duration::from_millis(1)).await);
        assert!(handle.guard(async { 1 }).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_when_not_cancelled() {
        let registry = TimerRegistry::new();
        let mut handle = registry.register(Uuid::new_v4());
        assert!(handle.sleep(Duration::from_secs(1)).await);
        assert_eq!(handle.guard(async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_registry_cancels_timers() {
        let registry = TimerRegistry::new();
        let mut a = registry.register(Uuid::new_v4());
        let mut b = registry.register(Uuid::new_v4());
        drop(registry);
        assert!(a.is_cancelled());
        assert!(!b.sleep(Duration::from_secs(1)).await);
    }

    #[test]
    fn test_cancel_all_counts_entries() {
        let registry = TimerRegistry::new();
        let _a = registry.register(Uuid::new_v4());
        let _b = registry.register(Uuid::new_v4());
        assert_eq!(registry.cancel_all(), 2);
        assert!(registry.is_empty());
        assert!(!registry.cancel(&Uuid::new_v4()));
    }
}
