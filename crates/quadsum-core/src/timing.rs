//! Timing events recorded for every dispatched phase.
//!
//! A [`Timeline`] holds the epoch all offsets are measured from. Each phase
//! dispatched onto the worker pool records when it was queued, when a worker
//! started it and when the last unit finished.

use std::time::{Duration, Instant};

use serde::Serialize;

/// A dispatched unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    /// Zero-initialization of the storage.
    Clear,
    /// Pyramid points routed into the finest level.
    Scatter,
    /// Pyramid level computed from the level below it.
    Reduce { level: u32 },
    /// Quadtree concurrent insertion of every point.
    Insert,
    /// Copy of the finished structure into caller-owned storage.
    Readout,
}

impl Phase {
    /// Whether the phase is part of the summary computation itself, as
    /// opposed to allocating or copying out storage.
    pub fn is_kernel(&self) -> bool {
        matches!(self, Self::Scatter | Self::Reduce { .. } | Self::Insert)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clear => write!(f, "clear"),
            Self::Scatter => write!(f, "scatter"),
            Self::Reduce { level } => write!(f, "reduce[{level}]"),
            Self::Insert => write!(f, "insert"),
            Self::Readout => write!(f, "readout"),
        }
    }
}

/// Offsets of one phase relative to its timeline's epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingEvent {
    #[serde(flatten)]
    pub phase: Phase,
    pub queued: Duration,
    pub start: Duration,
    pub end: Duration,
}

impl TimingEvent {
    /// Execution span of the phase.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// Time between queueing and the first worker picking the phase up.
    pub fn latency(&self) -> Duration {
        self.start.saturating_sub(self.queued)
    }
}

/// Event log of one or more runs sharing an epoch.
#[derive(Debug, Clone)]
pub struct Timeline {
    epoch: Instant,
    events: Vec<TimingEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            events: Vec::new(),
        }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Offset of "now" from the epoch.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    pub fn push(&mut self, event: TimingEvent) {
        self.events.push(event);
    }

    /// Time `op` on the calling thread and record it as `phase`.
    pub fn record<R>(&mut self, phase: Phase, op: impl FnOnce() -> R) -> R {
        let start = self.elapsed();
        let result = op();
        let end = self.elapsed();
        self.push(TimingEvent {
            phase,
            queued: start,
            start,
            end,
        });
        result
    }

    pub fn events(&self) -> &[TimingEvent] {
        &self.events
    }

    /// Drop recorded events, keeping the epoch.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn into_events(self) -> Vec<TimingEvent> {
        self.events
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Net and total kernel time of a sequence of events. `Clear` and `Readout`
/// phases are left out of both figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimingSummary {
    /// Sum of the execution spans of every kernel event.
    pub net: Duration,
    /// For each unbroken stretch of kernel events, the time from the start of
    /// its first event to the end of its last one, summed over the stretches.
    pub total: Duration,
}

impl TimingSummary {
    pub fn from_events(events: &[TimingEvent]) -> Self {
        let mut summary = Self::default();
        for stretch in events
            .split(|e| !e.phase.is_kernel())
            .filter(|s| !s.is_empty())
        {
            summary.net += stretch.iter().map(TimingEvent::duration).sum::<Duration>();
            if let (Some(first), Some(last)) = (stretch.first(), stretch.last()) {
                summary.total += last.end.saturating_sub(first.start);
            }
        }
        summary
    }

    /// Divide both figures by `runs`, the number of measured runs.
    pub fn per_run(self, runs: usize) -> Self {
        let runs = u32::try_from(runs.max(1)).unwrap_or(u32::MAX);
        Self {
            net: self.net / runs,
            total: self.total / runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(start_ms: u64, end_ms: u64) -> TimingEvent {
        phase_event(Phase::Scatter, start_ms, end_ms)
    }

    fn phase_event(phase: Phase, start_ms: u64, end_ms: u64) -> TimingEvent {
        TimingEvent {
            phase,
            queued: Duration::from_millis(start_ms),
            start: Duration::from_millis(start_ms),
            end: Duration::from_millis(end_ms),
        }
    }

    #[test]
    fn test_summary_net_and_total() {
        let events = [event(0, 2), event(5, 6), event(10, 14)];
        let summary = TimingSummary::from_events(&events);
        assert_eq!(summary.net, Duration::from_millis(7));
        assert_eq!(summary.total, Duration::from_millis(14));
    }

    #[test]
    fn test_summary_skips_clear_and_readout() {
        let events = [
            phase_event(Phase::Clear, 0, 1),
            phase_event(Phase::Scatter, 1, 3),
            phase_event(Phase::Reduce { level: 0 }, 4, 6),
            phase_event(Phase::Readout, 6, 9),
            phase_event(Phase::Clear, 9, 10),
            phase_event(Phase::Insert, 10, 12),
            phase_event(Phase::Readout, 12, 20),
        ];
        let summary = TimingSummary::from_events(&events);
        assert_eq!(summary.net, Duration::from_millis(6));
        assert_eq!(summary.total, Duration::from_millis(7));
    }

    #[test]
    fn test_summary_empty() {
        assert_eq!(TimingSummary::from_events(&[]), TimingSummary::default());
    }

    #[test]
    fn test_per_run() {
        let summary = TimingSummary {
            net: Duration::from_millis(30),
            total: Duration::from_millis(60),
        }
        .per_run(3);
        assert_eq!(summary.net, Duration::from_millis(10));
        assert_eq!(summary.total, Duration::from_millis(20));
    }

    #[test]
    fn test_record_orders_offsets() {
        let mut timeline = Timeline::new();
        let value = timeline.record(Phase::Readout, || 7);
        assert_eq!(value, 7);
        let recorded = timeline.events()[0];
        assert_eq!(recorded.phase, Phase::Readout);
        assert!(recorded.start <= recorded.end);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Reduce { level: 3 }.to_string(), "reduce[3]");
        assert_eq!(Phase::Insert.to_string(), "insert");
    }
}
