use crate::{BeatgridError, Conductor, Move, Result, StampId};

use super::{Command, CommandOutcome, Editor};

/// Pointer interaction in progress.
///
/// Placing: `Idle → Placing → Stretching* → Idle` (committed).
/// Moving: `Idle → Selecting → Dragging → Idle` (released).
/// Every transition that edits the chart goes through [`Editor::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Idle,
    Placing { id: StampId, head: i64 },
    Stretching { id: StampId, head: i64, length: u32 },
    Selecting { anchor: i64 },
    Dragging { anchor: i64, current: i64 },
}

impl Editor {
    /// Places a note and starts a placement gesture on it.
    pub fn begin_place(&mut self, step: i64, lane: Move, conductor: &mut Conductor) -> Result<StampId> {
        self.expect_idle()?;
        let CommandOutcome::Placed(id) = self.apply(Command::PlaceNote { step, lane }, conductor)? else {
            return Err(BeatgridError::msg("note placement produced no stamp"));
        };
        self.gesture = Gesture::Placing { id, head: step.max(0) };
        Ok(id)
    }

    /// Extends the note being placed so its tail reaches `step`.
    pub fn stretch_to(&mut self, step: i64, conductor: &mut Conductor) -> Result<()> {
        let (id, head, current) = match self.gesture {
            Gesture::Placing { id, head } => (id, head, 0),
            Gesture::Stretching { id, head, length } => (id, head, length),
            _ => return Err(BeatgridError::msg("no note is being placed")),
        };
        let length = (step - head).max(0) as u32;
        if length != current {
            self.apply(Command::StretchNote { id, length }, conductor)?;
        }
        self.gesture = Gesture::Stretching { id, head, length };
        Ok(())
    }

    /// Finishes a placement gesture.
    pub fn commit(&mut self) -> Result<StampId> {
        match self.gesture {
            Gesture::Placing { id, .. } | Gesture::Stretching { id, .. } => {
                self.gesture = Gesture::Idle;
                Ok(id)
            }
            _ => Err(BeatgridError::msg("no note is being placed")),
        }
    }

    /// Selects stamps and anchors a drag at `step`.
    pub fn begin_select(&mut self, ids: Vec<StampId>, step: i64, conductor: &mut Conductor) -> Result<usize> {
        self.expect_idle()?;
        let selected = match self.apply(Command::SelectStamps(ids), conductor)? {
            CommandOutcome::Selected(count) => count,
            _ => 0,
        };
        self.gesture = Gesture::Selecting { anchor: step };
        Ok(selected)
    }

    pub fn drag_to(&mut self, step: i64) -> Result<()> {
        let anchor = match self.gesture {
            Gesture::Selecting { anchor } | Gesture::Dragging { anchor, .. } => anchor,
            _ => return Err(BeatgridError::msg("nothing is selected for dragging")),
        };
        self.gesture = Gesture::Dragging { anchor, current: step };
        Ok(())
    }

    /// Drops the dragged selection. Returns the applied step offset.
    pub fn release(&mut self, conductor: &mut Conductor) -> Result<i64> {
        let delta = match self.gesture {
            Gesture::Dragging { anchor, current } => current - anchor,
            Gesture::Selecting { .. } => 0,
            _ => return Err(BeatgridError::msg("nothing is being dragged")),
        };
        self.gesture = Gesture::Idle;
        if delta != 0 && !self.selection.is_empty() {
            let ids = self.selection.iter().copied().collect();
            self.apply(Command::MoveStamps { ids, step_delta: delta }, conductor)?;
        }
        Ok(delta)
    }

    /// Abandons the current gesture. Edits already applied stay in history.
    pub fn cancel_gesture(&mut self) {
        self.gesture = Gesture::Idle;
    }

    fn expect_idle(&self) -> Result<()> {
        if self.gesture == Gesture::Idle {
            Ok(())
        } else {
            Err(BeatgridError::msg(format!("gesture already in progress: {:?}", self.gesture)))
        }
    }
}
