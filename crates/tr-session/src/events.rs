//! Progress and event sink: bounded trial history plus a single current
//! status, published to an observer that may not exist.
//!
//! Emission is fire-and-forget: if nobody is listening the event is simply
//! dropped, and the in-memory views (plus the durable snapshot) remain the
//! system of record for a reconnecting observer.

use std::collections::VecDeque;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tr_types::session::{LogEntry, SessionState, TrialRecord};

/// Events pushed to the observer (the UI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session state changed.
    Status {
        state: SessionState,
        message: Option<String>,
    },
    /// One trial finished, baseline included. `completed` is the trial
    /// number; `total` is the configured budget of suggested trials.
    Trial {
        record: TrialRecord,
        completed: u32,
        total: u32,
    },
    /// Final best-result summary, sent once at cleanup when a best exists.
    Best { record: TrialRecord },
}

/// Capacity bounds for the in-memory views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSinkConfig {
    /// Trial history cap; the oldest records are evicted first.
    pub history_cap: usize,
    /// Journal cap, same eviction order.
    pub journal_cap: usize,
}

impl Default for EventSinkConfig {
    fn default() -> Self {
        Self {
            history_cap: 200,
            journal_cap: 500,
        }
    }
}

struct SinkInner {
    history: VecDeque<TrialRecord>,
    /// Trial number of the best result. A reference into `history`, not a
    /// copy: once that record is evicted there is no best to show.
    best_trial: Option<u32>,
    last_status: Option<(SessionState, Option<String>)>,
    journal: VecDeque<LogEntry>,
    total_recorded: u32,
}

/// Bounded trial history and current-status publisher.
pub struct EventSink {
    config: EventSinkConfig,
    tx: Sender<SessionEvent>,
    inner: RwLock<SinkInner>,
}

impl EventSink {
    pub fn new(config: EventSinkConfig, tx: Sender<SessionEvent>) -> Self {
        Self {
            config,
            tx,
            inner: RwLock::new(SinkInner {
                history: VecDeque::new(),
                best_trial: None,
                last_status: None,
                journal: VecDeque::new(),
                total_recorded: 0,
            }),
        }
    }

    /// Sink with no subscriber. Events are discarded; the in-memory views
    /// still track everything.
    pub fn detached() -> Self {
        let (tx, _rx) = crossbeam_channel::unbounded();
        Self::new(EventSinkConfig::default(), tx)
    }

    /// Clear all views at the start of a new run.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.history.clear();
        inner.best_trial = None;
        inner.last_status = None;
        inner.journal.clear();
        inner.total_recorded = 0;
    }

    /// Publish a state transition and journal it.
    pub fn publish_status(&self, state: SessionState, message: Option<String>) {
        {
            let mut inner = self.inner.write();
            inner.last_status = Some((state, message.clone()));
            let line = match &message {
                Some(m) => format!("{state}: {m}"),
                None => state.to_string(),
            };
            inner.journal.push_back(LogEntry::new(line));
            while inner.journal.len() > self.config.journal_cap {
                inner.journal.pop_front();
            }
        }

        self.emit(SessionEvent::Status { state, message });
    }

    /// Append a completed trial, evicting the oldest past the cap, and
    /// publish it with `(completed, total)` progress.
    pub fn record_trial(&self, record: TrialRecord, completed: u32, total: u32) {
        {
            let mut inner = self.inner.write();
            if record.is_best_so_far {
                inner.best_trial = Some(record.trial_number);
            }
            inner.history.push_back(record.clone());
            while inner.history.len() > self.config.history_cap {
                inner.history.pop_front();
            }
            inner.total_recorded += 1;
        }

        self.emit(SessionEvent::Trial {
            record,
            completed,
            total,
        });
    }

    /// Publish the final best-result summary and journal it.
    pub fn publish_best(&self, record: TrialRecord) {
        {
            let mut inner = self.inner.write();
            inner
                .journal
                .push_back(LogEntry::new(format!("best result at trial {}", record.trial_number)));
            while inner.journal.len() > self.config.journal_cap {
                inner.journal.pop_front();
            }
        }

        self.emit(SessionEvent::Best { record });
    }

    /// The best result, if its record is still in the bounded history.
    pub fn best_result(&self) -> Option<TrialRecord> {
        let inner = self.inner.read();
        let n = inner.best_trial?;
        inner.history.iter().find(|t| t.trial_number == n).cloned()
    }

    pub fn history(&self) -> Vec<TrialRecord> {
        self.inner.read().history.iter().cloned().collect()
    }

    pub fn journal(&self) -> Vec<LogEntry> {
        self.inner.read().journal.iter().cloned().collect()
    }

    pub fn last_status(&self) -> Option<(SessionState, Option<String>)> {
        self.inner.read().last_status.clone()
    }

    /// Trials recorded in the current run, evicted ones included.
    pub fn total_recorded(&self) -> u32 {
        self.inner.read().total_recorded
    }

    fn emit(&self, event: SessionEvent) {
        // Best-effort send; a missing or slow subscriber is not our problem.
        let _ = self.tx.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crossbeam_channel::unbounded;
    use tr_types::filters::MetricMap;
    use tr_types::params::ParamMap;

    fn record(n: u32, best: bool) -> TrialRecord {
        TrialRecord {
            trial_number: n,
            parameters: ParamMap::new(),
            metrics: MetricMap::new(),
            is_valid: true,
            is_best_so_far: best,
            filter_reasons: vec![],
            completed_at: Utc::now(),
        }
    }

    fn capped(history_cap: usize) -> EventSink {
        let (tx, _rx) = unbounded();
        EventSink::new(
            EventSinkConfig {
                history_cap,
                ..Default::default()
            },
            tx,
        )
    }

    #[test]
    fn history_evicts_oldest_first() {
        let sink = capped(3);
        for n in 0..5 {
            sink.record_trial(record(n, false), n, 4);
        }

        let history = sink.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].trial_number, 2);
        assert_eq!(history[2].trial_number, 4);
        assert_eq!(sink.total_recorded(), 5);
    }

    #[test]
    fn best_reference_dies_with_eviction() {
        let sink = capped(2);
        sink.record_trial(record(0, true), 0, 4);
        assert_eq!(sink.best_result().unwrap().trial_number, 0);

        sink.record_trial(record(1, false), 1, 4);
        sink.record_trial(record(2, false), 2, 4);

        // Trial 0 has been evicted; the best reference points at nothing.
        assert!(sink.best_result().is_none());
    }

    #[test]
    fn best_follows_newest_flag() {
        let sink = capped(10);
        sink.record_trial(record(0, true), 0, 4);
        sink.record_trial(record(1, false), 1, 4);
        sink.record_trial(record(2, true), 2, 4);

        assert_eq!(sink.best_result().unwrap().trial_number, 2);
    }

    #[test]
    fn subscriber_receives_events_in_order() {
        let (tx, rx) = unbounded();
        let sink = EventSink::new(EventSinkConfig::default(), tx);

        sink.publish_status(SessionState::Running, Some("started".into()));
        sink.record_trial(record(0, false), 0, 2);
        sink.record_trial(record(1, true), 1, 2);
        sink.publish_best(record(1, true));

        let events: Vec<SessionEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], SessionEvent::Status { state: SessionState::Running, .. }));
        assert!(matches!(events[1], SessionEvent::Trial { completed: 0, .. }));
        assert!(matches!(events[2], SessionEvent::Trial { completed: 1, .. }));
        assert!(matches!(events[3], SessionEvent::Best { .. }));
    }

    #[test]
    fn detached_sink_swallows_events() {
        let sink = EventSink::detached();
        sink.publish_status(SessionState::Running, None);
        sink.record_trial(record(0, true), 0, 1);

        // Nothing is listening, but the views still track everything.
        assert_eq!(sink.history().len(), 1);
        assert_eq!(sink.best_result().unwrap().trial_number, 0);
        assert_eq!(sink.last_status().unwrap().0, SessionState::Running);
    }

    #[test]
    fn status_and_best_are_journaled() {
        let sink = EventSink::detached();
        sink.publish_status(SessionState::Running, Some("optimization session started".into()));
        sink.publish_best(record(3, true));

        let journal = sink.journal();
        assert_eq!(journal.len(), 2);
        assert!(journal[0].message.contains("running"));
        assert!(journal[1].message.contains("trial 3"));
    }

    #[test]
    fn journal_is_capped() {
        let (tx, _rx) = unbounded();
        let sink = EventSink::new(
            EventSinkConfig {
                journal_cap: 3,
                ..Default::default()
            },
            tx,
        );

        for i in 0..5 {
            sink.publish_status(SessionState::Running, Some(format!("update {i}")));
        }

        let journal = sink.journal();
        assert_eq!(journal.len(), 3);
        assert!(journal[0].message.contains("update 2"));
    }

    #[test]
    fn reset_clears_everything() {
        let sink = EventSink::detached();
        sink.publish_status(SessionState::Running, None);
        sink.record_trial(record(0, true), 0, 1);

        sink.reset();
        assert!(sink.history().is_empty());
        assert!(sink.journal().is_empty());
        assert!(sink.best_result().is_none());
        assert!(sink.last_status().is_none());
        assert_eq!(sink.total_recorded(), 0);
    }
}
