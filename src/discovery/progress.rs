//! Delivery of discovery progress events

use tokio::sync::mpsc;

use crate::discovery::models::DiscoveryProgress;

/// Receives progress events from a discovery run.
///
/// Delivery is fire-and-forget: a sink that cannot accept an event drops it
/// and the run carries on.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: DiscoveryProgress);
}

impl ProgressSink for mpsc::UnboundedSender<DiscoveryProgress> {
    fn emit(&self, progress: DiscoveryProgress) {
        let _ = self.send(progress);
    }
}

impl ProgressSink for mpsc::Sender<DiscoveryProgress> {
    fn emit(&self, progress: DiscoveryProgress) {
        if let Err(e) = self.try_send(progress) {
            tracing::debug!(error = %e, "Dropped discovery progress event");
        }
    }
}

/// Adapts a closure into a sink
pub struct FnSink<F>(pub F);

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(DiscoveryProgress) + Send + Sync,
{
    fn emit(&self, progress: DiscoveryProgress) {
        (self.0)(progress)
    }
}

/// Discards every event
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _progress: DiscoveryProgress) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::discovery::models::DiscoveryStep;

    #[test]
    fn test_full_bounded_channel_drops_event() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.emit(DiscoveryProgress::new(DiscoveryStep::Probing, "a", 10, 0));
        tx.emit(DiscoveryProgress::new(DiscoveryStep::Parsing, "b", 30, 0));

        assert_eq!(rx.try_recv().unwrap().step, DiscoveryStep::Probing);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.emit(DiscoveryProgress::new(DiscoveryStep::Complete, "done", 100, 0));
    }

    #[test]
    fn test_fn_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = FnSink(|p: DiscoveryProgress| seen.lock().unwrap().push(p.progress));
        sink.emit(DiscoveryProgress::new(DiscoveryStep::Starting, "", 0, 0));
        sink.emit(DiscoveryProgress::new(DiscoveryStep::Probing, "", 10, 0));
        assert_eq!(*seen.lock().unwrap(), [0, 10]);
    }
}
