//! Music-time conductor.
//!
//! Converts playback time into beats and steps and reports each boundary
//! crossing once. Negative `elapsed` means the count-in is still running and
//! nothing is audible yet; readers must not clamp it to zero.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{signal::Signal, BeatgridError, ListenerId, Result};

/// Musical meter. Serialized as `[steps_per_beat, beats_per_measure]` to match
/// the chart manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct TimeSignature {
    pub beats_per_measure: u32,
    pub steps_per_beat: u32,
}

impl TimeSignature {
    pub const FOUR_FOUR: TimeSignature = TimeSignature {
        beats_per_measure: 4,
        steps_per_beat: 4,
    };

    pub fn new(beats_per_measure: u32, steps_per_beat: u32) -> Self {
        Self {
            beats_per_measure,
            steps_per_beat,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.beats_per_measure == 0 || self.steps_per_beat == 0 {
            return Err(BeatgridError::config(format!(
                "time signature fields must be positive, got {}/{}",
                self.beats_per_measure, self.steps_per_beat
            )));
        }
        Ok(())
    }

    pub fn steps_per_measure(&self) -> u32 {
        self.beats_per_measure * self.steps_per_beat
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::FOUR_FOUR
    }
}

impl From<[u32; 2]> for TimeSignature {
    fn from([steps_per_beat, beats_per_measure]: [u32; 2]) -> Self {
        Self::new(beats_per_measure, steps_per_beat)
    }
}

impl From<TimeSignature> for [u32; 2] {
    fn from(value: TimeSignature) -> Self {
        [value.steps_per_beat, value.beats_per_measure]
    }
}

/// What a single [`Conductor::tick`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConductorTick {
    /// New beat index if a beat boundary was crossed.
    pub beat: Option<i64>,
    /// New step index if a step boundary was crossed.
    pub step: Option<i64>,
    /// Whole beats left in the count-in, when that number changed.
    pub count_in: Option<u32>,
    /// True on the tick where the count-in finished.
    pub started: bool,
}

impl ConductorTick {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Tracks beat and step position against the playback clock.
///
/// A single tick may jump several steps after a frame hitch; only the new
/// index is reported and the skipped ones are not replayed.
#[derive(Debug)]
pub struct Conductor {
    bpm: f64,
    time_signature: TimeSignature,
    beat_interval: f64,
    step_interval: f64,
    elapsed: f64,
    current_beat: i64,
    current_step: i64,
    count_in: Option<u32>,
    paused: bool,
    song_duration: f64,
    beat_hit: Signal<i64>,
    step_hit: Signal<i64>,
    count_in_hit: Signal<u32>,
}

impl Conductor {
    /// Creates a conductor with `pre_roll` seconds of count-in before zero.
    pub fn new(bpm: f64, time_signature: TimeSignature, pre_roll: f64) -> Result<Self> {
        validate_bpm(bpm)?;
        time_signature.validate()?;
        if !pre_roll.is_finite() || pre_roll < 0.0 {
            return Err(BeatgridError::config(format!(
                "pre-roll must be a non-negative number of seconds, got {pre_roll}"
            )));
        }

        let beat_interval = 60.0 / bpm;
        let step_interval = beat_interval / time_signature.steps_per_beat as f64;
        let elapsed = -pre_roll;
        debug!(bpm, ?time_signature, pre_roll, "conductor initialised");

        Ok(Self {
            bpm,
            time_signature,
            beat_interval,
            step_interval,
            elapsed,
            current_beat: 0,
            current_step: 0,
            count_in: beats_remaining(elapsed, beat_interval),
            paused: false,
            song_duration: 0.0,
            beat_hit: Signal::new(),
            step_hit: Signal::new(),
            count_in_hit: Signal::new(),
        })
    }

    /// Creates a conductor whose count-in lasts `pre_roll_beats` beats.
    pub fn with_count_in(
        bpm: f64,
        time_signature: TimeSignature,
        pre_roll_beats: u32,
    ) -> Result<Self> {
        validate_bpm(bpm)?;
        Self::new(bpm, time_signature, pre_roll_beats as f64 * 60.0 / bpm)
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    /// Seconds per beat.
    pub fn beat_interval(&self) -> f64 {
        self.beat_interval
    }

    /// Seconds per step.
    pub fn step_interval(&self) -> f64 {
        self.step_interval
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn current_beat(&self) -> i64 {
        self.current_beat
    }

    pub fn current_step(&self) -> i64 {
        self.current_step
    }

    pub fn current_measure(&self) -> i64 {
        self.current_beat
            .div_euclid(self.time_signature.beats_per_measure as i64)
    }

    pub fn beat_in_measure(&self) -> u32 {
        self.current_beat
            .rem_euclid(self.time_signature.beats_per_measure as i64) as u32
    }

    pub fn step_in_beat(&self) -> u32 {
        self.current_step
            .rem_euclid(self.time_signature.steps_per_beat as i64) as u32
    }

    /// True while the count-in is still running.
    pub fn in_pre_roll(&self) -> bool {
        self.elapsed < 0.0
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Freezes the conductor. The caller is responsible for pausing the
    /// transport as well.
    pub fn pause(&mut self) {
        if !self.paused {
            debug!(elapsed = self.elapsed, "conductor paused");
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            debug!(elapsed = self.elapsed, "conductor resumed");
        }
        self.paused = false;
    }

    pub fn set_song_duration(&mut self, seconds: f64) {
        self.song_duration = seconds.max(0.0);
    }

    pub fn song_duration(&self) -> f64 {
        self.song_duration
    }

    pub fn total_beats(&self) -> f64 {
        self.bpm * self.song_duration / 60.0
    }

    pub fn total_steps(&self) -> f64 {
        self.time_signature.steps_per_beat as f64 * self.total_beats()
    }

    pub fn step_to_time(&self, step: f64) -> f64 {
        step * self.step_interval
    }

    /// Fractional step for `time`; callers round or floor as they need.
    pub fn time_to_step(&self, time: f64) -> f64 {
        time / self.step_interval
    }

    pub fn beat_to_time(&self, beat: f64) -> f64 {
        beat * self.beat_interval
    }

    pub fn time_to_beat(&self, time: f64) -> f64 {
        time / self.beat_interval
    }

    /// Step a placed stamp snaps to.
    pub fn snap_step(&self, time: f64) -> i64 {
        self.time_to_step(time).round() as i64
    }

    /// Changes tempo. Stamps keep their absolute times, so the grid shifts
    /// under them. The current beat and step are recomputed silently.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        validate_bpm(bpm)?;
        debug!(from = self.bpm, to = bpm, "bpm changed");
        self.bpm = bpm;
        self.recompute_intervals();
        Ok(())
    }

    /// Reinstates a tempo previously read from [`Conductor::bpm`], which is
    /// always valid.
    pub(crate) fn restore_bpm(&mut self, bpm: f64) {
        debug!(from = self.bpm, to = bpm, "bpm restored");
        self.bpm = bpm;
        self.recompute_intervals();
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) -> Result<()> {
        time_signature.validate()?;
        debug!(?time_signature, "time signature changed");
        self.time_signature = time_signature;
        self.recompute_intervals();
        Ok(())
    }

    /// Jumps to `seconds` without reporting any crossing.
    pub fn seek(&mut self, seconds: f64) {
        trace!(from = self.elapsed, to = seconds, "conductor seek");
        self.elapsed = seconds;
        self.resync_indices();
        self.count_in = beats_remaining(self.elapsed, self.beat_interval);
    }

    /// Advances the conductor by one frame.
    ///
    /// During the count-in `dt` is accumulated and `transport_time` ignored.
    /// Afterwards the transport position replaces `elapsed` outright so drift
    /// never accumulates.
    pub fn tick(&mut self, transport_time: f64, dt: f64) -> ConductorTick {
        let mut outcome = ConductorTick::default();
        if self.paused {
            return outcome;
        }

        if self.elapsed < 0.0 {
            self.elapsed += dt;
            let remaining = beats_remaining(self.elapsed, self.beat_interval);
            if remaining != self.count_in {
                self.count_in = remaining;
                if let Some(beats) = remaining {
                    outcome.count_in = Some(beats);
                    self.count_in_hit.emit(&beats);
                }
            }
            if self.elapsed >= 0.0 {
                debug!(elapsed = self.elapsed, "count-in finished");
                outcome.started = true;
            }
            return outcome;
        }

        self.elapsed = transport_time;
        let beat = (self.elapsed / self.beat_interval).floor() as i64;
        let step = (self.elapsed / self.step_interval).floor() as i64;

        if beat != self.current_beat {
            self.current_beat = beat;
            outcome.beat = Some(beat);
            self.beat_hit.emit(&beat);
        }
        if step != self.current_step {
            self.current_step = step;
            outcome.step = Some(step);
            self.step_hit.emit(&step);
        }

        outcome
    }

    pub fn on_beat_hit<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&i64) + 'static,
    {
        self.beat_hit.connect(listener)
    }

    pub fn on_step_hit<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&i64) + 'static,
    {
        self.step_hit.connect(listener)
    }

    /// Called with the number of whole beats left whenever it changes.
    pub fn on_count_in<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&u32) + 'static,
    {
        self.count_in_hit.connect(listener)
    }

    /// Removes a listener registered through any of the `on_*` methods.
    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        self.beat_hit.disconnect(id)
            || self.step_hit.disconnect(id)
            || self.count_in_hit.disconnect(id)
    }

    fn recompute_intervals(&mut self) {
        self.beat_interval = 60.0 / self.bpm;
        self.step_interval = self.beat_interval / self.time_signature.steps_per_beat as f64;
        self.resync_indices();
    }

    fn resync_indices(&mut self) {
        let elapsed = self.elapsed.max(0.0);
        self.current_beat = (elapsed / self.beat_interval).floor() as i64;
        self.current_step = (elapsed / self.step_interval).floor() as i64;
    }
}

pub(crate) fn validate_bpm(bpm: f64) -> Result<()> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(BeatgridError::config(format!(
            "bpm must be a positive number, got {bpm}"
        )));
    }
    Ok(())
}

fn beats_remaining(elapsed: f64, beat_interval: f64) -> Option<u32> {
    if elapsed >= 0.0 {
        return None;
    }
    Some((-elapsed / beat_interval).ceil() as u32)
}
