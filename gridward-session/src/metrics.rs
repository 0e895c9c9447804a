use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tick-loop counters, updated from the single owning task and readable from anywhere via
/// [`Metrics::snapshot`]. Mirrors the granularity a console `stats` command or an external
/// dashboard would want; this crate only exposes the numbers; rendering them is someone else's
/// job.
#[derive(Default)]
pub struct Metrics {
    ticks_completed: AtomicU64,
    last_tick_nanos: AtomicU64,
    actions_applied: AtomicU64,
    actions_dropped: AtomicU64,
    bytes_sent: AtomicU64,
    players_connected: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks_completed: u64,
    pub last_tick_nanos: u64,
    pub actions_applied: u64,
    pub actions_dropped: u64,
    pub bytes_sent: u64,
    pub players_connected: u64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_tick(&self, duration_nanos: u64) {
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);
        self.last_tick_nanos.store(duration_nanos, Ordering::Relaxed);
    }

    pub fn record_action_applied(&self) {
        self.actions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action_dropped(&self) {
        self.actions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn set_players_connected(&self, count: u64) {
        self.players_connected.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_completed: self.ticks_completed.load(Ordering::Relaxed),
            last_tick_nanos: self.last_tick_nanos.load(Ordering::Relaxed),
            actions_applied: self.actions_applied.load(Ordering::Relaxed),
            actions_dropped: self.actions_dropped.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            players_connected: self.players_connected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_values() {
        let metrics = Metrics::new();
        metrics.record_tick(1_500_000);
        metrics.record_action_applied();
        metrics.record_action_applied();
        metrics.record_action_dropped();
        metrics.record_bytes_sent(128);
        metrics.set_players_connected(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ticks_completed, 1);
        assert_eq!(snapshot.last_tick_nanos, 1_500_000);
        assert_eq!(snapshot.actions_applied, 2);
        assert_eq!(snapshot.actions_dropped, 1);
        assert_eq!(snapshot.bytes_sent, 128);
        assert_eq!(snapshot.players_connected, 3);
    }
}
