use adapter::{CdcEventHandler, ReplicationChange, ReplicationSource, ReplicationStatus};
use db_errors::CdcError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Per-source state held by the CDC engine: `{client, details, eventHandler,
/// lastPosition, stopSignal, running}` (§4.5). `running` is a plain
/// `AtomicBool`; `last_position`/`last_error` sit behind a `Mutex` because
/// they're written from the poll/stream task and read from `status()` calls
/// on arbitrary other tasks.
pub struct SourceState {
    pub source_id: String,
    running: AtomicBool,
    eventually_consistent: bool,
    last_position: Mutex<Option<String>>,
    last_error: Mutex<Option<String>>,
    stop_tx: watch::Sender<bool>,
}

impl SourceState {
    pub fn new(source_id: impl Into<String>, eventually_consistent: bool) -> Arc<Self> {
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Self {
            source_id: source_id.into(),
            running: AtomicBool::new(true),
            eventually_consistent,
            last_position: Mutex::new(None),
            last_error: Mutex::new(None),
            stop_tx,
        })
    }

    pub fn stop_receiver(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Shares the same sender the poll/stream task listens on, so the
    /// public [`ReplicationSource`] handle and the internal state agree on
    /// a single stop signal (§4.5 "a single-slot channel so multiple Stop
    /// calls are idempotent").
    pub fn stop_sender(&self) -> watch::Sender<bool> {
        self.stop_tx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn record_position(&self, position: impl Into<String>) {
        *self.last_position.lock().unwrap() = Some(position.into());
    }

    /// A transient error is logged and retried at the next tick -- the
    /// source keeps running (§4.5). Only [`mark_fatal`] stops it.
    pub fn record_transient_error(&self, message: impl Into<String>) {
        *self.last_error.lock().unwrap() = Some(message.into());
    }

    pub fn mark_fatal(&self, message: impl Into<String>) {
        *self.last_error.lock().unwrap() = Some(message.into());
        self.running.store(false, Ordering::SeqCst);
    }

    /// Idempotent: a second or third call just re-sends `true` on the
    /// single-slot watch channel (§4.5).
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);
    }

    pub fn status(&self) -> ReplicationStatus {
        ReplicationStatus {
            source_id: self.source_id.clone(),
            running: self.is_running(),
            eventually_consistent: self.eventually_consistent,
            last_position: self.last_position.lock().unwrap().clone(),
            last_error: self.last_error.lock().unwrap().clone(),
        }
    }
}

/// Registry of running sources, keyed by source id. Adapters construct one
/// per `ReplicationOperator` implementation; it is not a process-wide
/// singleton like [`adapter::AdapterRegistry`] because each adapter
/// instance owns its own set of sources.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Mutex<BTreeMap<String, Arc<SourceState>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, state: Arc<SourceState>) {
        self.sources
            .lock()
            .unwrap()
            .insert(state.source_id.clone(), state);
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<SourceState>> {
        self.sources.lock().unwrap().get(source_id).cloned()
    }

    pub fn status(&self, source_id: &str) -> Result<ReplicationStatus, CdcError> {
        self.get(source_id)
            .map(|s| s.status())
            .ok_or_else(|| CdcError::NotFound(source_id.to_string()))
    }

    pub fn stop(&self, source_id: &str) -> Result<(), CdcError> {
        self.get(source_id)
            .map(|s| s.stop())
            .ok_or_else(|| CdcError::NotFound(source_id.to_string()))
    }

    pub fn remove(&self, source_id: &str) -> Option<Arc<SourceState>> {
        self.sources.lock().unwrap().remove(source_id)
    }
}

/// Builds the public [`ReplicationSource`] handle a caller holds onto,
/// wired to the same stop channel as the internal [`SourceState`].
pub fn make_handle(state: &Arc<SourceState>) -> ReplicationSource {
    ReplicationSource {
        source_id: state.source_id.clone(),
        stop: state.stop_sender(),
    }
}

pub fn spawn_poll_loop<F>(
    state: Arc<SourceState>,
    handler: CdcEventHandler,
    poll_interval: std::time::Duration,
    mut tick: F,
) where
    F: FnMut() -> Result<Vec<ReplicationChange>, CdcError> + Send + 'static,
{
    let mut stop_rx = state.stop_receiver();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match tick() {
                        Ok(changes) => {
                            for change in changes {
                                state.record_position(change.position.clone());
                                handler(change);
                            }
                        }
                        Err(err) if err.is_fatal() => {
                            state.mark_fatal(err.to_string());
                            break;
                        }
                        Err(err) => {
                            state.record_transient_error(err.to_string());
                        }
                    }
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        state.stop();
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_idempotent_and_marks_not_running() {
        let state = SourceState::new("src-1", false);
        assert!(state.is_running());
        state.stop();
        state.stop();
        assert!(!state.is_running());
    }

    #[test]
    fn registry_status_for_unknown_source_is_not_found() {
        let registry = SourceRegistry::new();
        let err = registry.status("nope").unwrap_err();
        assert!(matches!(err, CdcError::NotFound(_)));
    }

    #[tokio::test]
    async fn poll_loop_stops_within_one_interval_of_signal() {
        let state = SourceState::new("src-1", true);
        let handler: CdcEventHandler = Arc::new(|_| {});
        spawn_poll_loop(state.clone(), handler, std::time::Duration::from_millis(5), || Ok(vec![]));
        state.stop();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!state.is_running());
    }
}
