//! Chart editing commands with snapshot undo.

mod gesture;
mod history;

use std::collections::BTreeSet;

use tracing::{debug, trace};

pub use gesture::Gesture;
pub use history::{History, HistoryOutcome};

use crate::{
    config::{EditorConfig, FlipMode},
    schema::{EventKind, Params},
    Conductor, Move, Result, Stamp, StampId, Timeline,
};

/// Editing operations issued by the editor surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlaceNote { step: i64, lane: Move },
    StretchNote { id: StampId, length: u32 },
    DeleteNote(StampId),
    /// Places an event; `params` defaults to the schema defaults for `kind`.
    PlaceEvent {
        step: i64,
        kind: EventKind,
        params: Option<Params>,
    },
    DeleteEvent(StampId),
    /// Replaces the parameters of a placed event; the kind must match.
    UpdateEvent { id: StampId, params: Params },
    MoveStamps { ids: Vec<StampId>, step_delta: i64 },
    Copy(Vec<StampId>),
    Cut(Vec<StampId>),
    /// Pastes the clipboard so its earliest stamp lands on `step`.
    Paste { step: i64 },
    SelectStamps(Vec<StampId>),
    InvertSelection,
    FlipMoves(Vec<StampId>),
    Undo,
    Redo,
}

impl Command {
    /// Whether applying the command records an undo snapshot.
    pub fn is_undoable(&self) -> bool {
        !matches!(
            self,
            Command::Copy(_)
                | Command::SelectStamps(_)
                | Command::InvertSelection
                | Command::Undo
                | Command::Redo
        )
    }
}

/// What a command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Placed(StampId),
    Removed(Vec<Stamp>),
    Changed,
    Copied(usize),
    Pasted(Vec<StampId>),
    Selected(usize),
    History(HistoryOutcome),
}

#[derive(Debug, Clone, PartialEq)]
struct ClipboardEntry {
    offset: i64,
    stamp: Stamp,
}

/// Editing state for one chart: the timeline, its undo log, the selection
/// and the clipboard.
#[derive(Debug, Clone)]
pub struct Editor {
    timeline: Timeline,
    history: History,
    selection: BTreeSet<StampId>,
    clipboard: Vec<ClipboardEntry>,
    flip_mode: FlipMode,
    gesture: Gesture,
}

impl Editor {
    pub fn new(timeline: Timeline, config: &EditorConfig) -> Self {
        Self {
            timeline,
            history: History::new(config.history_limit),
            selection: BTreeSet::new(),
            clipboard: Vec::new(),
            flip_mode: config.flip_mode,
            gesture: Gesture::Idle,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &BTreeSet<StampId> {
        &self.selection
    }

    pub fn clipboard_len(&self) -> usize {
        self.clipboard.len()
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    /// Applies `command` on the conductor's grid. Only undo and redo of a
    /// tempo edit change the conductor.
    pub fn apply(&mut self, command: Command, conductor: &mut Conductor) -> Result<CommandOutcome> {
        trace!(?command, "apply command");
        match command {
            Command::PlaceNote { step, lane } => {
                let time = conductor.step_to_time(step.max(0) as f64);
                self.mutate(|timeline| Ok(timeline.insert_note(time, lane, None, conductor).id()))
                    .map(CommandOutcome::Placed)
            }
            Command::StretchNote { id, length } => self
                .mutate(|timeline| timeline.stretch_note(id, length))
                .map(|_| CommandOutcome::Changed),
            Command::DeleteNote(id) => {
                let removed = self.mutate(|timeline| timeline.remove_note(id))?;
                self.selection.remove(&id);
                Ok(CommandOutcome::Removed(vec![Stamp::Note(removed)]))
            }
            Command::PlaceEvent { step, kind, params } => {
                let time = conductor.step_to_time(step.max(0) as f64);
                let params = params.unwrap_or_else(|| kind.default_params());
                if params.kind() != kind {
                    return Err(format!("{} parameters given for a {kind} event", params.kind()).into());
                }
                self.mutate(|timeline| Ok(timeline.insert_event(time, params, conductor).id()))
                    .map(CommandOutcome::Placed)
            }
            Command::DeleteEvent(id) => {
                let removed = self.mutate(|timeline| timeline.remove_event(id))?;
                self.selection.remove(&id);
                Ok(CommandOutcome::Removed(vec![Stamp::Event(removed)]))
            }
            Command::UpdateEvent { id, params } => self
                .mutate(|timeline| timeline.update_event(id, params))
                .map(|_| CommandOutcome::Changed),
            Command::MoveStamps { ids, step_delta } => self
                .mutate(|timeline| timeline.move_stamps(&ids, step_delta, conductor))
                .map(|_| {
                    self.retain_selection();
                    CommandOutcome::Changed
                }),
            Command::Copy(ids) => {
                self.clipboard = self.clipboard_entries(&ids, conductor);
                Ok(CommandOutcome::Copied(self.clipboard.len()))
            }
            Command::Cut(ids) => {
                let entries = self.clipboard_entries(&ids, conductor);
                let removed = self.mutate(|timeline| {
                    ids.iter()
                        .map(|id| timeline.remove(*id))
                        .collect::<Result<Vec<_>>>()
                })?;
                self.clipboard = entries;
                self.retain_selection();
                Ok(CommandOutcome::Removed(removed))
            }
            Command::Paste { step } => {
                let entries = self.clipboard.clone();
                let placed = self.mutate(|timeline| Ok(paste(timeline, &entries, step, conductor)))?;
                self.selection = placed.iter().copied().collect();
                Ok(CommandOutcome::Pasted(placed))
            }
            Command::SelectStamps(ids) => {
                self.selection = ids
                    .into_iter()
                    .filter(|id| self.timeline.stamp(*id).is_some())
                    .collect();
                Ok(CommandOutcome::Selected(self.selection.len()))
            }
            Command::InvertSelection => {
                self.selection = self
                    .timeline
                    .stamp_ids()
                    .filter(|id| !self.selection.contains(id))
                    .collect();
                Ok(CommandOutcome::Selected(self.selection.len()))
            }
            Command::FlipMoves(ids) => {
                let mode = self.flip_mode;
                self.mutate(|timeline| Ok(timeline.flip_moves(&ids, mode)))
                    .map(|_| CommandOutcome::Changed)
            }
            Command::Undo => Ok(CommandOutcome::History(self.undo(conductor))),
            Command::Redo => Ok(CommandOutcome::History(self.redo(conductor))),
        }
    }

    pub fn undo(&mut self, conductor: &mut Conductor) -> HistoryOutcome {
        let outcome = self.history.undo(&mut self.timeline, conductor);
        self.retain_selection();
        outcome
    }

    pub fn redo(&mut self, conductor: &mut Conductor) -> HistoryOutcome {
        let outcome = self.history.redo(&mut self.timeline, conductor);
        self.retain_selection();
        outcome
    }

    /// Changes tempo from the editor and re-snaps the chart. The tempo and
    /// any stacked notes the new grid evicts are undone together.
    pub fn set_bpm(&mut self, conductor: &mut Conductor, bpm: f64) -> Result<usize> {
        let previous = conductor.bpm();
        conductor.set_bpm(bpm)?;
        if bpm == previous {
            return Ok(0);
        }
        let before = self.timeline.clone();
        let evicted = self.timeline.sweep_duplicates(conductor);
        self.history.record_tempo(before, previous);
        self.retain_selection();
        debug!(bpm, evicted, "editor tempo change");
        Ok(evicted)
    }

    /// Runs a mutation against the timeline, recording the prior state on
    /// success and restoring it on failure.
    fn mutate<T>(&mut self, edit: impl FnOnce(&mut Timeline) -> Result<T>) -> Result<T> {
        let before = self.timeline.clone();
        match edit(&mut self.timeline) {
            Ok(value) => {
                self.history.record(before);
                Ok(value)
            }
            Err(err) => {
                self.timeline = before;
                Err(err)
            }
        }
    }

    fn clipboard_entries(&self, ids: &[StampId], conductor: &Conductor) -> Vec<ClipboardEntry> {
        let mut stamps: Vec<Stamp> = ids.iter().filter_map(|id| self.timeline.stamp(*id)).collect();
        stamps.sort_by(|a, b| a.time().total_cmp(&b.time()));
        let origin = stamps.first().map(|stamp| stamp.step(conductor)).unwrap_or(0);
        stamps
            .into_iter()
            .map(|stamp| ClipboardEntry {
                offset: stamp.step(conductor) - origin,
                stamp,
            })
            .collect()
    }

    fn retain_selection(&mut self) {
        let timeline = &self.timeline;
        self.selection.retain(|id| timeline.stamp(*id).is_some());
    }
}

fn paste(timeline: &mut Timeline, entries: &[ClipboardEntry], step: i64, conductor: &Conductor) -> Vec<StampId> {
    entries
        .iter()
        .map(|entry| {
            let time = conductor.step_to_time((step + entry.offset).max(0) as f64);
            match &entry.stamp {
                Stamp::Note(note) => timeline.insert_note(time, note.lane, note.length, conductor).id(),
                Stamp::Event(event) => timeline
                    .insert_event(time, event.params().clone(), conductor)
                    .id(),
            }
        })
        .collect()
}
