//! Core library for the Beatgrid rhythm chart editor.
//!
//! The crate holds everything below the user interface: the beat clock
//! (conductor), the event parameter schema and its time resolution, the chart
//! timeline with its editing commands, and a session type that drives them
//! all from an audio transport. Rendering and audio decoding live elsewhere.

pub mod chart;
pub mod conductor;
pub mod config;
pub mod easing;
pub mod editor;
pub mod error;
pub mod resolve;
pub mod schema;
pub mod session;
pub mod signal;
pub mod timeline;
pub mod transport;

pub use chart::{ChartBody, ChartFile, Manifest};
pub use conductor::{Conductor, ConductorTick, TimeSignature};
pub use config::{AppConfig, ConductorConfig, EditorConfig, FlipMode, PlaybackConfig};
pub use easing::Easing;
pub use editor::{Command, CommandOutcome, Editor, Gesture, History, HistoryOutcome};
pub use error::{BeatgridError, Result};
pub use resolve::{
    active_instance, active_or_default, resolve, resolve_continuous, CameraState,
    PresentationState, ResolveCursor,
};
pub use schema::{EventKind, ParamSpec, ParamType, ParamValue, Params};
pub use session::{FrameReport, Session};
pub use signal::{ListenerId, Signal};
pub use timeline::{ChartEvent, ChartNote, Move, Stamp, StampId, Timeline};
pub use transport::{SimulatedTransport, Transport};
