//! Per-agent counters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Monotonically accumulating counters for one agent.
///
/// Task counters and the duration average are written only by the owning
/// agent's worker; message counters are bumped on the send/deliver paths.
/// Everyone else reads through [`AgentStats::snapshot`].
#[derive(Debug, Default)]
pub struct AgentStats {
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    avg_task_micros: AtomicU64,
    last_active_ms: AtomicI64,
}

impl AgentStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful task, folding its duration into the running
    /// average: `avg += (d - avg) / n`.
    pub fn record_completion(&self, duration: Duration) {
        let n = self.tasks_completed.fetch_add(1, Ordering::Relaxed) + 1;
        let avg = self.avg_task_micros.load(Ordering::Relaxed) as i64;
        let d = duration.as_micros().min(i64::MAX as u128) as i64;
        let next = avg + (d - avg) / n as i64;
        self.avg_task_micros.store(next.max(0) as u64, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_failure(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn inc_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_messages_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Refresh the last-active timestamp.
    pub fn touch(&self) {
        self.last_active_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            avg_task_duration_ms: self.avg_task_micros.load(Ordering::Relaxed) as f64 / 1000.0,
            last_active: DateTime::from_timestamp_millis(self.last_active_ms.load(Ordering::Relaxed))
                .filter(|_| self.last_active_ms.load(Ordering::Relaxed) != 0),
        }
    }
}

/// Point-in-time copy of an agent's counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub avg_task_duration_ms: f64,
    pub last_active: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = AgentStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap.tasks_completed, 0);
        assert_eq!(snap.tasks_failed, 0);
        assert_eq!(snap.avg_task_duration_ms, 0.0);
        assert!(snap.last_active.is_none());
    }

    #[test]
    fn test_running_average() {
        let stats = AgentStats::new();
        stats.record_completion(Duration::from_millis(100));
        stats.record_completion(Duration::from_millis(300));
        let snap = stats.snapshot();
        assert_eq!(snap.tasks_completed, 2);
        // 100ms, then 100 + (300 - 100) / 2 = 200ms
        assert!((snap.avg_task_duration_ms - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_failure_does_not_touch_average() {
        let stats = AgentStats::new();
        stats.record_completion(Duration::from_millis(50));
        stats.record_failure();
        let snap = stats.snapshot();
        assert_eq!(snap.tasks_failed, 1);
        assert_eq!(snap.tasks_completed, 1);
        assert!((snap.avg_task_duration_ms - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_message_counters() {
        let stats = AgentStats::new();
        stats.inc_messages_sent();
        stats.inc_messages_received();
        stats.inc_messages_received();
        let snap = stats.snapshot();
        assert_eq!(snap.messages_sent, 1);
        assert_eq!(snap.messages_received, 2);
    }

    #[test]
    fn test_touch_sets_last_active() {
        let stats = AgentStats::new();
        stats.touch();
        assert!(stats.snapshot().last_active.is_some());
    }
}
