use tracing::debug;

use crate::{Conductor, Timeline};

/// Result of an undo or redo request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryOutcome {
    Applied,
    /// A tempo edit was reverted or reapplied; the conductor now runs at
    /// this bpm.
    TempoRestored(f64),
    NothingToUndo,
    NothingToRedo,
}

#[derive(Debug, Clone)]
struct Snapshot {
    timeline: Timeline,
    /// Conductor tempo, present only for tempo edits.
    bpm: Option<f64>,
}

/// Linear undo log of full timeline snapshots.
///
/// Each snapshot is an owned deep copy, so later edits can never reach into
/// an older entry. Recording after an undo discards the redo branch.
#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<Snapshot>,
    redo: Vec<Snapshot>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Stores the state from before a mutation.
    pub fn record(&mut self, before: Timeline) {
        self.push(Snapshot {
            timeline: before,
            bpm: None,
        });
    }

    /// Stores the state from before a tempo change, including the old tempo.
    pub fn record_tempo(&mut self, before: Timeline, bpm: f64) {
        self.push(Snapshot {
            timeline: before,
            bpm: Some(bpm),
        });
    }

    pub fn undo(&mut self, timeline: &mut Timeline, conductor: &mut Conductor) -> HistoryOutcome {
        match self.undo.pop() {
            Some(previous) => {
                let (current, outcome) = restore(previous, timeline, conductor);
                self.redo.push(current);
                debug!(remaining = self.undo.len(), "undo");
                outcome
            }
            None => HistoryOutcome::NothingToUndo,
        }
    }

    pub fn redo(&mut self, timeline: &mut Timeline, conductor: &mut Conductor) -> HistoryOutcome {
        match self.redo.pop() {
            Some(next) => {
                let (current, outcome) = restore(next, timeline, conductor);
                self.undo.push(current);
                debug!(remaining = self.redo.len(), "redo");
                outcome
            }
            None => HistoryOutcome::NothingToRedo,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    fn push(&mut self, snapshot: Snapshot) {
        self.redo.clear();
        self.undo.push(snapshot);
        if self.undo.len() > self.limit {
            let overflow = self.undo.len() - self.limit;
            self.undo.drain(0..overflow);
        }
    }
}

/// Swaps `snapshot` in and returns the state it replaced, shaped the same
/// way so the move can be reversed.
fn restore(snapshot: Snapshot, timeline: &mut Timeline, conductor: &mut Conductor) -> (Snapshot, HistoryOutcome) {
    let (bpm, outcome) = match snapshot.bpm {
        Some(bpm) => {
            let current = conductor.bpm();
            conductor.restore_bpm(bpm);
            (Some(current), HistoryOutcome::TempoRestored(bpm))
        }
        None => (None, HistoryOutcome::Applied),
    };
    let replaced = Snapshot {
        timeline: std::mem::replace(timeline, snapshot.timeline),
        bpm,
    };
    (replaced, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Move, TimeSignature};

    fn conductor() -> Conductor {
        Conductor::new(120.0, TimeSignature::FOUR_FOUR, 0.0).unwrap()
    }

    #[test]
    fn undo_redo_walks_the_log() {
        let mut conductor = conductor();
        let mut history = History::new(10);
        let mut timeline = Timeline::new();

        assert_eq!(history.undo(&mut timeline, &mut conductor), HistoryOutcome::NothingToUndo);
        history.record(timeline.clone());
        timeline.insert_note(1.0, Move::Up, None, &conductor);
        let placed = timeline.clone();

        assert_eq!(history.undo(&mut timeline, &mut conductor), HistoryOutcome::Applied);
        assert!(timeline.is_empty());
        assert_eq!(history.redo(&mut timeline, &mut conductor), HistoryOutcome::Applied);
        assert_eq!(timeline, placed);
        assert_eq!(history.redo(&mut timeline, &mut conductor), HistoryOutcome::NothingToRedo);
    }

    #[test]
    fn tempo_snapshots_swap_the_conductor_tempo() {
        let mut conductor = conductor();
        let mut history = History::new(10);
        let mut timeline = Timeline::new();

        history.record_tempo(timeline.clone(), conductor.bpm());
        conductor.set_bpm(90.0).unwrap();

        assert_eq!(
            history.undo(&mut timeline, &mut conductor),
            HistoryOutcome::TempoRestored(120.0)
        );
        assert_eq!(conductor.bpm(), 120.0);
        assert_eq!(
            history.redo(&mut timeline, &mut conductor),
            HistoryOutcome::TempoRestored(90.0)
        );
        assert_eq!(conductor.bpm(), 90.0);
    }

    #[test]
    fn recording_truncates_redo_and_respects_limit() {
        let mut conductor = conductor();
        let mut history = History::new(2);
        let mut timeline = Timeline::new();
        for _ in 0..3 {
            history.record(timeline.clone());
        }
        assert_eq!(history.undo(&mut timeline, &mut conductor), HistoryOutcome::Applied);
        assert_eq!(history.undo(&mut timeline, &mut conductor), HistoryOutcome::Applied);
        assert_eq!(history.undo(&mut timeline, &mut conductor), HistoryOutcome::NothingToUndo);

        history.record(timeline.clone());
        assert!(!history.can_redo());
    }
}
