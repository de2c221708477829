//! Effective event values at an arbitrary time.
//!
//! Every function here is a pure function of `(kind, time, events)`, so
//! playback and random-access scrubbing see identical results. `events` must
//! be sorted by time, which [`Timeline`](crate::Timeline) guarantees.

use serde::{Deserialize, Serialize};

use crate::{
    easing::lerp,
    schema::{EventKind, Params},
    ChartEvent,
};

/// Last event of `kind` with `time <= at`, or `None` when nothing is active.
pub fn active_instance(kind: EventKind, at: f64, events: &[ChartEvent]) -> Option<&ChartEvent> {
    let end = events.partition_point(|event| event.time <= at);
    last_of_kind(kind, &events[..end])
}

/// Active event of `kind`, or a synthetic default event at time zero when
/// `at` precedes every instance.
pub fn active_or_default(kind: EventKind, at: f64, events: &[ChartEvent]) -> ChartEvent {
    active_instance(kind, at, events)
        .cloned()
        .unwrap_or_else(|| ChartEvent::new(0.0, kind))
}

/// Event of the same kind placed strictly before `current`.
fn previous_instance<'a>(current: &ChartEvent, events: &'a [ChartEvent]) -> Option<&'a ChartEvent> {
    let end = events.partition_point(|event| event.time < current.time);
    last_of_kind(current.kind(), &events[..end])
}

fn last_of_kind(kind: EventKind, events: &[ChartEvent]) -> Option<&ChartEvent> {
    events.iter().rev().find(|event| event.kind() == kind)
}

/// Parameters of a continuous kind at `at`, tweened from the previous
/// instance toward the active one. Falls back to schema defaults before the
/// first instance.
pub fn resolve_continuous(kind: EventKind, at: f64, events: &[ChartEvent]) -> Params {
    match active_instance(kind, at, events) {
        Some(current) => tween(current, previous_instance(current, events), at),
        None => kind.default_params(),
    }
}

/// Effective parameters of any kind at `at`. Continuous kinds tween, the rest
/// hold the value of the active instance.
pub fn resolve(kind: EventKind, at: f64, events: &[ChartEvent]) -> Params {
    if kind.is_continuous() {
        resolve_continuous(kind, at, events)
    } else {
        active_or_default(kind, at, events).params().clone()
    }
}

/// Progress through `current`'s tween at `at`. A zero duration jumps as soon
/// as time passes the event.
fn progress(current: &ChartEvent, at: f64) -> f64 {
    let duration = current.params().number("duration").unwrap_or(0.0);
    let raw = (at - current.time) / duration;
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

fn tween(current: &ChartEvent, previous: Option<&ChartEvent>, at: f64) -> Params {
    let kind = current.kind();
    let eased = current.params().easing().apply(progress(current, at));
    let defaults;
    let from = match previous {
        Some(previous) => previous.params(),
        None => {
            defaults = kind.default_params();
            &defaults
        }
    };

    let mut resolved = current.params().clone();
    for spec in kind.specs().iter().filter(|spec| spec.tweens()) {
        if let (Some(start), Some(end)) = (from.number(spec.name), current.params().number(spec.name)) {
            resolved.replace_number(spec.name, lerp(start, end, eased));
        }
    }
    resolved
}

/// Resolution helper that remembers where the previous lookup landed.
///
/// The hint is only trusted after checking it against the current slice, and
/// a miss falls back to a binary search, so results never depend on call
/// order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveCursor {
    end: Option<usize>,
}

impl ResolveCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active<'a>(&mut self, kind: EventKind, at: f64, events: &'a [ChartEvent]) -> Option<&'a ChartEvent> {
        let end = match self.end {
            Some(end) if hint_is_valid(end, at, events) => end,
            _ => events.partition_point(|event| event.time <= at),
        };
        self.end = Some(end);
        last_of_kind(kind, &events[..end])
    }

    pub fn resolve(&mut self, kind: EventKind, at: f64, events: &[ChartEvent]) -> Params {
        match self.active(kind, at, events) {
            Some(current) if kind.is_continuous() => {
                tween(current, previous_instance(current, events), at)
            }
            Some(current) => current.params().clone(),
            None => kind.default_params(),
        }
    }

    pub fn reset(&mut self) {
        self.end = None;
    }
}

fn hint_is_valid(end: usize, at: f64, events: &[ChartEvent]) -> bool {
    if end > events.len() {
        return false;
    }
    let before_ok = end == 0 || events[end - 1].time <= at;
    let after_ok = end == events.len() || events[end].time > at;
    before_ok && after_ok
}

/// Camera transform resolved from `cam-move` events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
    pub angle: f64,
}

impl CameraState {
    pub fn from_params(params: &Params) -> Self {
        Self {
            x: params.number("x").unwrap_or(0.0),
            y: params.number("y").unwrap_or(0.0),
            zoom: params.number("zoom").unwrap_or(1.0),
            angle: params.number("angle").unwrap_or(0.0),
        }
    }
}

/// Everything event-driven a frame needs, resolved for one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationState {
    pub camera: CameraState,
    pub scroll_speed: f64,
    pub playback_speed: f64,
    /// Tempo from the latest `bpm-change`, if any has been reached.
    pub bpm: Option<f64>,
    pub dancer: String,
}

impl PresentationState {
    pub fn at(time: f64, events: &[ChartEvent]) -> Self {
        let camera = CameraState::from_params(&resolve(EventKind::CamMove, time, events));
        let scroll = resolve(EventKind::ChangeScroll, time, events);
        let speed = resolve(EventKind::ChangeSpeed, time, events);
        let dancer = resolve(EventKind::ChangeDancer, time, events);

        Self {
            camera,
            scroll_speed: scroll.number("speed").unwrap_or(1.0),
            playback_speed: speed.number("speed").unwrap_or(1.0),
            bpm: active_instance(EventKind::BpmChange, time, events)
                .and_then(|event| event.params().number("bpm")),
            dancer: dancer.text("dancer").unwrap_or_default().to_string(),
        }
    }
}
