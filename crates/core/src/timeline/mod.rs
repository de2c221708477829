//! Time-ordered notes and events of a chart.
//!
//! Stamps store absolute seconds. Steps are derived through the conductor on
//! demand, so a tempo change moves the grid, not the content.

use std::{cmp::Ordering, collections::HashSet, fmt, ops::RangeInclusive};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::{
    config::FlipMode,
    schema::{EventKind, Params},
    BeatgridError, Conductor, Result,
};

/// Identity of a stamp inside one timeline. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StampId(u64);

impl fmt::Display for StampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lane a note is played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Left,
    Down,
    Up,
    Right,
}

impl Move {
    pub const ALL: [Move; 4] = [Move::Left, Move::Down, Move::Up, Move::Right];

    pub fn flipped(self, mode: FlipMode) -> Self {
        let horizontal = matches!(mode, FlipMode::Horizontal | FlipMode::Both);
        let vertical = matches!(mode, FlipMode::Vertical | FlipMode::Both);
        match self {
            Move::Left if horizontal => Move::Right,
            Move::Right if horizontal => Move::Left,
            Move::Up if vertical => Move::Down,
            Move::Down if vertical => Move::Up,
            other => other,
        }
    }
}

/// A playable note. `length` is the sustain in steps; absent or zero is a tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartNote {
    #[serde(skip)]
    id: StampId,
    #[serde(skip)]
    written: u64,
    pub time: f64,
    #[serde(rename = "move")]
    pub lane: Move,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl ChartNote {
    pub fn new(time: f64, lane: Move, length: Option<u32>) -> Self {
        Self {
            id: StampId::default(),
            written: 0,
            time: time.max(0.0),
            lane,
            length,
        }
    }

    pub fn id(&self) -> StampId {
        self.id
    }

    pub fn sustain(&self) -> u32 {
        self.length.unwrap_or(0)
    }

    pub fn is_sustain(&self) -> bool {
        self.sustain() > 0
    }

    pub fn step(&self, conductor: &Conductor) -> i64 {
        conductor.snap_step(self.time)
    }

    /// True if `step` is this note's head or lies on its sustain trail.
    pub fn covers_step(&self, step: i64, conductor: &Conductor) -> bool {
        let head = self.step(conductor);
        step >= head && step <= head + self.sustain() as i64
    }
}

/// A timed parameter bundle. `params` always holds exactly the parameters the
/// schema declares for `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredEvent", into = "StoredEvent")]
pub struct ChartEvent {
    id: StampId,
    written: u64,
    pub time: f64,
    kind: EventKind,
    params: Params,
}

impl ChartEvent {
    /// Event at `time` with schema defaults.
    pub fn new(time: f64, kind: EventKind) -> Self {
        Self::with_params(time, kind.default_params())
    }

    /// Event at `time` carrying `params`; the kind comes from the params.
    pub fn with_params(time: f64, params: Params) -> Self {
        Self {
            id: StampId::default(),
            written: 0,
            time: time.max(0.0),
            kind: params.kind(),
            params,
        }
    }

    pub fn id(&self) -> StampId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn step(&self, conductor: &Conductor) -> i64 {
        conductor.snap_step(self.time)
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEvent {
    time: f64,
    kind: String,
    #[serde(default)]
    params: Map<String, Value>,
}

impl TryFrom<StoredEvent> for ChartEvent {
    type Error = BeatgridError;

    fn try_from(stored: StoredEvent) -> Result<Self> {
        let kind = EventKind::from_name(&stored.kind)?;
        let params = Params::from_json(kind, &stored.params)?;
        Ok(ChartEvent::with_params(stored.time, params))
    }
}

impl From<ChartEvent> for StoredEvent {
    fn from(event: ChartEvent) -> Self {
        Self {
            time: event.time,
            kind: event.kind.name().to_string(),
            params: event.params.to_json(),
        }
    }
}

/// Either kind of placed object, used by selection, clipboard and hit
/// notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum Stamp {
    Note(ChartNote),
    Event(ChartEvent),
}

impl Stamp {
    pub fn id(&self) -> StampId {
        match self {
            Stamp::Note(note) => note.id,
            Stamp::Event(event) => event.id,
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            Stamp::Note(note) => note.time,
            Stamp::Event(event) => event.time,
        }
    }

    pub fn step(&self, conductor: &Conductor) -> i64 {
        conductor.snap_step(self.time())
    }
}

/// Ordered notes and events of one chart.
///
/// Both sequences stay sorted by time after every mutation, and at most one
/// note occupies any step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    notes: Vec<ChartNote>,
    events: Vec<ChartEvent>,
    next_id: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a timeline from loaded stamps. Ids follow input order, so a
    /// later duplicate wins over an earlier one.
    pub fn from_parts(notes: Vec<ChartNote>, events: Vec<ChartEvent>, conductor: &Conductor) -> Self {
        let mut timeline = Self::new();
        for mut note in notes {
            timeline.stamp_note(&mut note);
            timeline.notes.push(note);
        }
        for mut event in events {
            timeline.stamp_event(&mut event);
            timeline.events.push(event);
        }
        timeline.resort();
        timeline.sweep_duplicates(conductor);
        timeline
    }

    pub fn notes(&self) -> &[ChartNote] {
        &self.notes
    }

    pub fn events(&self) -> &[ChartEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.events.is_empty()
    }

    pub fn note(&self, id: StampId) -> Option<&ChartNote> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn event(&self, id: StampId) -> Option<&ChartEvent> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn stamp(&self, id: StampId) -> Option<Stamp> {
        self.note(id)
            .cloned()
            .map(Stamp::Note)
            .or_else(|| self.event(id).cloned().map(Stamp::Event))
    }

    pub fn stamp_ids(&self) -> impl Iterator<Item = StampId> + '_ {
        self.notes
            .iter()
            .map(|note| note.id)
            .chain(self.events.iter().map(|event| event.id))
    }

    pub fn events_of_kind(&self, kind: EventKind) -> impl Iterator<Item = &ChartEvent> + '_ {
        self.events.iter().filter(move |event| event.kind == kind)
    }

    /// Places a note, evicting whatever note already sits on the same step.
    pub fn insert_note(
        &mut self,
        time: f64,
        lane: Move,
        length: Option<u32>,
        conductor: &Conductor,
    ) -> &ChartNote {
        let mut note = ChartNote::new(time, lane, length);
        let step = note.step(conductor);
        self.notes.retain(|existing| {
            let occupied = existing.step(conductor) == step;
            if occupied {
                trace!(id = %existing.id, step, "note replaced");
            }
            !occupied
        });
        self.stamp_note(&mut note);
        let index = self.notes.partition_point(|existing| existing.time <= note.time);
        self.notes.insert(index, note);
        &self.notes[index]
    }

    /// Places an event, replacing an event of the same kind on the same step.
    pub fn insert_event(&mut self, time: f64, params: Params, conductor: &Conductor) -> &ChartEvent {
        let mut event = ChartEvent::with_params(time, params);
        let step = event.step(conductor);
        self.events
            .retain(|existing| existing.kind != event.kind || existing.step(conductor) != step);
        self.stamp_event(&mut event);
        let index = self.events.partition_point(|existing| existing.time <= event.time);
        self.events.insert(index, event);
        &self.events[index]
    }

    pub fn remove_note(&mut self, id: StampId) -> Result<ChartNote> {
        let index = self
            .notes
            .iter()
            .position(|note| note.id == id)
            .ok_or(BeatgridError::NotFound(id))?;
        Ok(self.notes.remove(index))
    }

    pub fn remove_event(&mut self, id: StampId) -> Result<ChartEvent> {
        let index = self
            .events
            .iter()
            .position(|event| event.id == id)
            .ok_or(BeatgridError::NotFound(id))?;
        Ok(self.events.remove(index))
    }

    /// Removes a note or an event by id.
    pub fn remove(&mut self, id: StampId) -> Result<Stamp> {
        match self.remove_note(id) {
            Ok(note) => Ok(Stamp::Note(note)),
            Err(_) => self.remove_event(id).map(Stamp::Event),
        }
    }

    /// Note starting on `step`, otherwise a note whose sustain trail covers it.
    pub fn note_at_step(&self, step: i64, conductor: &Conductor) -> Option<&ChartNote> {
        self.notes
            .iter()
            .find(|note| note.step(conductor) == step)
            .or_else(|| {
                self.notes.iter().find(|note| {
                    let head = note.step(conductor);
                    note.is_sustain() && step > head && step <= head + note.sustain() as i64
                })
            })
    }

    /// First event placed on `step`, optionally restricted to one kind.
    pub fn event_at_step(
        &self,
        step: i64,
        kind: Option<EventKind>,
        conductor: &Conductor,
    ) -> Option<&ChartEvent> {
        self.events.iter().find(|event| {
            event.step(conductor) == step && kind.map_or(true, |kind| event.kind == kind)
        })
    }

    /// Restores the one-note-per-step invariant. The most recently written
    /// note on a step survives. Events are deduplicated per kind the same way.
    /// Returns how many stamps were evicted.
    pub fn sweep_duplicates(&mut self, conductor: &Conductor) -> usize {
        let before = self.notes.len() + self.events.len();

        let mut survivors: Vec<ChartNote> = Vec::with_capacity(self.notes.len());
        let mut notes = std::mem::take(&mut self.notes);
        notes.sort_by(|a, b| {
            a.step(conductor)
                .cmp(&b.step(conductor))
                .then(b.written.cmp(&a.written))
        });
        let mut last_step = None;
        for note in notes {
            let step = note.step(conductor);
            if last_step != Some(step) {
                last_step = Some(step);
                survivors.push(note);
            }
        }
        self.notes = survivors;

        let mut seen = HashSet::new();
        let mut events = std::mem::take(&mut self.events);
        events.sort_by(|a, b| b.written.cmp(&a.written));
        events.retain(|event| seen.insert((event.kind, event.step(conductor))));
        self.events = events;

        self.resort();
        let evicted = before - self.notes.len() - self.events.len();
        if evicted > 0 {
            warn!(evicted, "evicted stacked stamps");
        }
        evicted
    }

    /// Notes whose head step falls inside `steps`, optionally limited to lanes.
    pub fn notes_in_step_range(
        &self,
        steps: RangeInclusive<i64>,
        lanes: Option<&[Move]>,
        conductor: &Conductor,
    ) -> Vec<&ChartNote> {
        self.notes
            .iter()
            .filter(|note| steps.contains(&note.step(conductor)))
            .filter(|note| lanes.map_or(true, |lanes| lanes.contains(&note.lane)))
            .collect()
    }

    pub fn events_in_step_range(
        &self,
        steps: RangeInclusive<i64>,
        conductor: &Conductor,
    ) -> Vec<&ChartEvent> {
        self.events
            .iter()
            .filter(|event| steps.contains(&event.step(conductor)))
            .collect()
    }

    /// Note closest to `time`; the earlier one wins a tie.
    pub fn nearest_note(&self, time: f64) -> Option<&ChartNote> {
        let index = self.notes.partition_point(|note| note.time < time);
        let after = self.notes.get(index);
        let before = index.checked_sub(1).and_then(|index| self.notes.get(index));
        match (before, after) {
            (Some(before), Some(after)) => {
                if (time - before.time) <= (after.time - time) {
                    Some(before)
                } else {
                    Some(after)
                }
            }
            (before, after) => before.or(after),
        }
    }

    /// Stamps whose step lies in `(from_step, to_step]`, in time order with
    /// events ahead of notes on the same step.
    pub fn stamps_crossed(&self, from_step: i64, to_step: i64, conductor: &Conductor) -> Vec<Stamp> {
        if to_step <= from_step {
            return Vec::new();
        }
        // a stamp snaps to step `s` when its time lies in [s - 0.5, s + 0.5) steps
        let start = conductor.step_to_time(from_step as f64 + 0.5);
        let end = conductor.step_to_time(to_step as f64 + 0.5);
        let mut stamps = self.stamps_between(start, end);
        stamps.sort_by_key(|stamp| (stamp.step(conductor), matches!(stamp, Stamp::Note(_))));
        stamps
    }

    /// Stamps with `start <= time < end`, in time order. Events come first
    /// when a note and an event share a time.
    pub fn stamps_between(&self, start: f64, end: f64) -> Vec<Stamp> {
        if !(end > start) {
            return Vec::new();
        }
        let events = window(&self.events, |event| event.time, start, end);
        let notes = window(&self.notes, |note| note.time, start, end);
        let mut stamps: Vec<Stamp> = events
            .iter()
            .cloned()
            .map(Stamp::Event)
            .chain(notes.iter().cloned().map(Stamp::Note))
            .collect();
        stamps.sort_by(|a, b| a.time().total_cmp(&b.time()));
        stamps
    }

    /// Shifts stamps by whole steps, clamping at zero. Moved stamps count as
    /// freshly written, so they win any step they land on.
    pub fn move_stamps(&mut self, ids: &[StampId], step_delta: i64, conductor: &Conductor) -> Result<()> {
        for id in ids {
            if self.note(*id).is_none() && self.event(*id).is_none() {
                return Err(BeatgridError::NotFound(*id));
            }
        }
        let shift = |time: f64| {
            let step = (conductor.snap_step(time) + step_delta).max(0);
            conductor.step_to_time(step as f64)
        };

        for index in 0..self.notes.len() {
            if ids.contains(&self.notes[index].id) {
                let written = self.bump();
                let note = &mut self.notes[index];
                note.time = shift(note.time);
                note.written = written;
            }
        }
        for index in 0..self.events.len() {
            if ids.contains(&self.events[index].id) {
                let written = self.bump();
                let event = &mut self.events[index];
                event.time = shift(event.time);
                event.written = written;
            }
        }

        self.resort();
        self.sweep_duplicates(conductor);
        Ok(())
    }

    /// Sets a note's sustain length in steps; zero turns it into a tap.
    pub fn stretch_note(&mut self, id: StampId, length: u32) -> Result<()> {
        let note = self
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or(BeatgridError::NotFound(id))?;
        note.length = (length > 0).then_some(length);
        Ok(())
    }

    /// Replaces the parameters of an event. The kind stays fixed.
    pub fn update_event(&mut self, id: StampId, params: Params) -> Result<()> {
        let event = self
            .events
            .iter_mut()
            .find(|event| event.id == id)
            .ok_or(BeatgridError::NotFound(id))?;
        if params.kind() != event.kind {
            return Err(BeatgridError::msg(format!(
                "cannot store {} parameters on a {} event",
                params.kind(),
                event.kind
            )));
        }
        event.params = params;
        Ok(())
    }

    /// Mirrors the lanes of the listed notes. Unknown ids are ignored.
    pub fn flip_moves(&mut self, ids: &[StampId], mode: FlipMode) -> usize {
        let mut flipped = 0;
        for note in self.notes.iter_mut().filter(|note| ids.contains(&note.id)) {
            note.lane = note.lane.flipped(mode);
            flipped += 1;
        }
        flipped
    }

    fn bump(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn stamp_note(&mut self, note: &mut ChartNote) {
        let id = self.bump();
        note.id = StampId(id);
        note.written = id;
    }

    fn stamp_event(&mut self, event: &mut ChartEvent) {
        let id = self.bump();
        event.id = StampId(id);
        event.written = id;
    }

    fn resort(&mut self) {
        self.notes.sort_by(|a, b| by_time(a.time, a.written, b.time, b.written));
        self.events.sort_by(|a, b| by_time(a.time, a.written, b.time, b.written));
    }
}

fn window<T>(items: &[T], time: impl Fn(&T) -> f64, start: f64, end: f64) -> &[T] {
    let lo = items.partition_point(|item| time(item) < start);
    let hi = items.partition_point(|item| time(item) < end).max(lo);
    &items[lo..hi]
}

fn by_time(a_time: f64, a_written: u64, b_time: f64, b_written: u64) -> Ordering {
    a_time.total_cmp(&b_time).then(a_written.cmp(&b_written))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    use super::*;
    use crate::TimeSignature;

    fn conductor() -> Conductor {
        Conductor::new(120.0, TimeSignature::FOUR_FOUR, 0.0).unwrap()
    }

    fn at(step: i64, conductor: &Conductor) -> f64 {
        conductor.step_to_time(step as f64)
    }

    #[test]
    fn same_step_insert_is_last_write_wins() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        timeline.insert_note(at(4, &conductor), Move::Up, None, &conductor);
        timeline.insert_note(at(4, &conductor) + 0.01, Move::Left, None, &conductor);

        assert_eq!(timeline.notes().len(), 1);
        let note = timeline.note_at_step(4, &conductor).unwrap();
        assert_eq!(note.lane, Move::Left);
    }

    #[test]
    fn notes_stay_sorted() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        for step in [8, 2, 5, 0] {
            timeline.insert_note(at(step, &conductor), Move::Down, None, &conductor);
        }
        let steps: Vec<_> = timeline.notes().iter().map(|n| n.step(&conductor)).collect();
        assert_eq!(steps, vec![0, 2, 5, 8]);
    }

    #[test]
    fn remove_reports_missing_ids() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        let id = timeline.insert_note(1.0, Move::Right, None, &conductor).id();

        assert_eq!(timeline.remove_note(id).unwrap().lane, Move::Right);
        assert!(matches!(timeline.remove_note(id), Err(BeatgridError::NotFound(_))));
        assert!(timeline.remove(id).is_err());
    }

    #[test]
    fn sustain_trail_is_hit_tested() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        timeline.insert_note(at(4, &conductor), Move::Up, Some(3), &conductor);

        assert!(timeline.note_at_step(4, &conductor).is_some());
        assert!(timeline.note_at_step(5, &conductor).is_some());
        assert!(timeline.note_at_step(7, &conductor).is_some());
        assert!(timeline.note_at_step(8, &conductor).is_none());
        assert!(timeline.note_at_step(3, &conductor).is_none());
    }

    #[test]
    fn exact_head_beats_a_covering_trail() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        timeline.insert_note(at(0, &conductor), Move::Up, Some(8), &conductor);
        timeline.insert_note(at(3, &conductor), Move::Left, None, &conductor);

        assert_eq!(timeline.note_at_step(3, &conductor).unwrap().lane, Move::Left);
    }

    #[test]
    fn tempo_change_sweep_keeps_latest_note() {
        let mut conductor = conductor();
        let mut timeline = Timeline::new();
        timeline.insert_note(at(2, &conductor), Move::Up, None, &conductor);
        timeline.insert_note(at(3, &conductor), Move::Down, None, &conductor);
        assert_eq!(timeline.notes().len(), 2);

        // at a quarter of the tempo both notes round onto step 1
        conductor.set_bpm(30.0).unwrap();
        assert_eq!(timeline.sweep_duplicates(&conductor), 1);
        assert_eq!(timeline.notes().len(), 1);
        assert_eq!(timeline.notes()[0].lane, Move::Down);
    }

    #[test]
    fn events_replace_same_kind_on_same_step() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        timeline.insert_event(1.0, EventKind::CamMove.default_params(), &conductor);
        timeline.insert_event(1.0, EventKind::PlayAnim.default_params(), &conductor);
        timeline.insert_event(1.0, EventKind::CamMove.default_params(), &conductor);

        assert_eq!(timeline.events().len(), 2);
        assert!(timeline
            .event_at_step(8, Some(EventKind::PlayAnim), &conductor)
            .is_some());
        assert!(timeline
            .event_at_step(8, Some(EventKind::BpmChange), &conductor)
            .is_none());
    }

    #[test]
    fn box_select_by_steps_and_lanes() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        for (step, lane) in [(0, Move::Left), (2, Move::Up), (4, Move::Up), (6, Move::Right)] {
            timeline.insert_note(at(step, &conductor), lane, None, &conductor);
        }
        timeline.insert_event(at(3, &conductor), EventKind::CamMove.default_params(), &conductor);

        assert_eq!(timeline.notes_in_step_range(1..=5, None, &conductor).len(), 2);
        assert_eq!(
            timeline
                .notes_in_step_range(0..=6, Some(&[Move::Left, Move::Right]), &conductor)
                .len(),
            2
        );
        assert_eq!(timeline.events_in_step_range(0..=2, &conductor).len(), 0);
        assert_eq!(timeline.events_in_step_range(3..=3, &conductor).len(), 1);
    }

    #[test]
    fn nearest_note_prefers_earlier_on_tie() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        assert!(timeline.nearest_note(1.0).is_none());
        timeline.insert_note(1.0, Move::Left, None, &conductor);
        timeline.insert_note(2.0, Move::Right, None, &conductor);

        assert_eq!(timeline.nearest_note(1.5).unwrap().lane, Move::Left);
        assert_eq!(timeline.nearest_note(1.8).unwrap().lane, Move::Right);
        assert_eq!(timeline.nearest_note(9.0).unwrap().lane, Move::Right);
        assert_eq!(timeline.nearest_note(0.0).unwrap().lane, Move::Left);
    }

    #[test]
    fn crossed_stamps_are_half_open() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        timeline.insert_note(at(4, &conductor), Move::Left, None, &conductor);
        timeline.insert_note(at(6, &conductor), Move::Up, None, &conductor);
        timeline.insert_event(at(6, &conductor), EventKind::PlayAnim.default_params(), &conductor);

        let crossed = timeline.stamps_crossed(4, 6, &conductor);
        assert_eq!(crossed.len(), 2);
        assert!(matches!(crossed[0], Stamp::Event(_)));
        assert!(matches!(crossed[1], Stamp::Note(_)));
        assert!(timeline.stamps_crossed(6, 4, &conductor).is_empty());
        assert_eq!(timeline.stamps_crossed(3, 4, &conductor).len(), 1);
    }

    #[test]
    fn stamps_between_uses_absolute_time() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        timeline.insert_note(0.9, Move::Left, None, &conductor);
        timeline.insert_note(1.05, Move::Up, None, &conductor);
        timeline.insert_event(1.05, EventKind::ChangeDancer.default_params(), &conductor);

        let ahead = timeline.stamps_between(1.01, 2.0);
        assert_eq!(ahead.len(), 2);
        assert!(matches!(ahead[0], Stamp::Event(_)));
        assert_eq!(ahead[1].time(), 1.05);
        assert_eq!(timeline.stamps_between(0.0, 1.05).len(), 1);
        assert!(timeline.stamps_between(2.0, 1.0).is_empty());
    }

    #[test]
    fn moved_notes_win_the_step_they_land_on() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        let mover = timeline.insert_note(at(2, &conductor), Move::Up, None, &conductor).id();
        timeline.insert_note(at(4, &conductor), Move::Down, None, &conductor);

        timeline.move_stamps(&[mover], 2, &conductor).unwrap();
        assert_eq!(timeline.notes().len(), 1);
        assert_eq!(timeline.notes()[0].id(), mover);
        assert_abs_diff_eq!(timeline.notes()[0].time, 0.5);

        timeline.move_stamps(&[mover], -10, &conductor).unwrap();
        assert_eq!(timeline.notes()[0].time, 0.0);
        assert!(timeline.move_stamps(&[StampId(999)], 1, &conductor).is_err());
    }

    #[test]
    fn stretch_and_flip() {
        let conductor = conductor();
        let mut timeline = Timeline::new();
        let id = timeline.insert_note(0.0, Move::Left, None, &conductor).id();

        timeline.stretch_note(id, 4).unwrap();
        assert_eq!(timeline.note(id).unwrap().length, Some(4));
        timeline.stretch_note(id, 0).unwrap();
        assert_eq!(timeline.note(id).unwrap().length, None);

        assert_eq!(timeline.flip_moves(&[id], FlipMode::Horizontal), 1);
        assert_eq!(timeline.note(id).unwrap().lane, Move::Right);
        assert_eq!(Move::Up.flipped(FlipMode::Horizontal), Move::Up);
        assert_eq!(Move::Up.flipped(FlipMode::Both), Move::Down);
    }

    #[test]
    fn events_serialize_with_kind_names() {
        let event = ChartEvent::new(2.5, EventKind::BpmChange);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], json!("bpm-change"));
        assert_eq!(json["params"]["bpm"], json!(100.0));

        let parsed: ChartEvent =
            serde_json::from_value(json!({ "time": 1.0, "kind": "change-dancer" })).unwrap();
        assert_eq!(parsed.params().text("dancer"), Some("gf"));
        assert!(serde_json::from_value::<ChartEvent>(json!({ "time": 1.0, "kind": "nope" })).is_err());
    }

    #[test]
    fn notes_serialize_move_and_optional_length() {
        let note = ChartNote::new(1.5, Move::Down, None);
        assert_eq!(
            serde_json::to_value(&note).unwrap(),
            json!({ "time": 1.5, "move": "down" })
        );
        let held: ChartNote =
            serde_json::from_value(json!({ "time": 0.0, "move": "right", "length": 2 })).unwrap();
        assert_eq!(held.sustain(), 2);
    }

    #[test]
    fn from_parts_sorts_and_deduplicates() {
        let conductor = conductor();
        let timeline = Timeline::from_parts(
            vec![
                ChartNote::new(1.0, Move::Up, None),
                ChartNote::new(0.5, Move::Left, None),
                ChartNote::new(1.0, Move::Down, None),
            ],
            vec![ChartEvent::new(0.0, EventKind::CamMove)],
            &conductor,
        );
        let lanes: Vec<_> = timeline.notes().iter().map(|n| n.lane).collect();
        assert_eq!(lanes, vec![Move::Left, Move::Down]);
        assert_eq!(timeline.stamp_ids().count(), 3);
    }
}
