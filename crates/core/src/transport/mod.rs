//! Audio transport boundary.
//!
//! Decoding and playback live outside the core. The conductor only needs a
//! handle that reports where playback is and accepts seek/pause requests.

/// Playback handle consumed by the conductor and the session.
///
/// Once playback has started the transport is the single source of truth for
/// elapsed song time.
pub trait Transport {
    /// Current playback position in seconds.
    fn time(&self) -> f64;

    /// Length of the loaded audio in seconds.
    fn duration(&self) -> f64;

    fn seek(&mut self, seconds: f64);

    fn is_paused(&self) -> bool;

    fn set_paused(&mut self, paused: bool);

    /// Playback rate multiplier, 1.0 being normal speed.
    fn speed(&self) -> f64 {
        1.0
    }

    fn set_speed(&mut self, _speed: f64) {}

    /// Stops playback and releases the underlying stream.
    fn stop(&mut self);
}

/// Deterministic transport that advances only when told to.
///
/// Used by tests and by the command line simulator in place of a real audio
/// backend.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    time: f64,
    duration: f64,
    paused: bool,
    speed: f64,
    stopped: bool,
}

impl SimulatedTransport {
    /// Creates a paused transport positioned at zero.
    pub fn new(duration: f64) -> Self {
        Self {
            time: 0.0,
            duration: duration.max(0.0),
            paused: true,
            speed: 1.0,
            stopped: false,
        }
    }

    /// Advances playback by `delta` wall-clock seconds, scaled by the speed.
    /// Paused or stopped transports do not move.
    pub fn advance(&mut self, delta: f64) {
        if self.paused || self.stopped {
            return;
        }
        self.time = (self.time + delta * self.speed).clamp(0.0, self.duration);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.duration
    }
}

impl Transport for SimulatedTransport {
    fn time(&self) -> f64 {
        self.time
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn seek(&mut self, seconds: f64) {
        self.time = seconds.clamp(0.0, self.duration);
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
    }

    fn stop(&mut self) {
        self.paused = true;
        self.stopped = true;
        self.time = 0.0;
    }
}
