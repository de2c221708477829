//! Persisted chart shape.
//!
//! Notes and events carry absolute times in seconds so that tempo edits round
//! trip without moving content.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::ConductorConfig, ChartEvent, ChartNote, Conductor, Result, TimeSignature, Timeline,
};

/// Song metadata stored next to the chart body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub charter: String,
    pub initial_bpm: f64,
    #[serde(default = "default_scroll_speed")]
    pub initial_scrollspeed: f64,
    /// `[steps_per_beat, beats_per_measure]`.
    #[serde(default)]
    pub time_signature: TimeSignature,
    pub uuid: String,
    #[serde(default)]
    pub cover_file: String,
    #[serde(default)]
    pub audio_file: String,
}

fn default_scroll_speed() -> f64 {
    1.0
}

impl Manifest {
    /// Metadata for a brand new chart with a fresh uuid.
    pub fn new(name: impl Into<String>, artist: impl Into<String>, initial_bpm: f64) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            charter: String::new(),
            initial_bpm,
            initial_scrollspeed: default_scroll_speed(),
            time_signature: TimeSignature::FOUR_FOUR,
            uuid: Uuid::new_v4().to_string(),
            cover_file: String::new(),
            audio_file: String::new(),
        }
    }

    /// Metadata for a new chart using the configured tempo and signature.
    pub fn with_defaults(
        name: impl Into<String>,
        artist: impl Into<String>,
        config: &ConductorConfig,
    ) -> Self {
        Self {
            time_signature: config.default_time_signature,
            ..Self::new(name, artist, config.default_bpm)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartBody {
    #[serde(default)]
    pub notes: Vec<ChartNote>,
    #[serde(default)]
    pub events: Vec<ChartEvent>,
}

/// A complete chart file: manifest plus notes and events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartFile {
    pub manifest: Manifest,
    #[serde(default)]
    pub chart: ChartBody,
}

impl ChartFile {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            chart: ChartBody::default(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let chart = Self::from_json(&fs::read_to_string(path)?)?;
        debug!(
            path = %path.display(),
            name = %chart.manifest.name,
            notes = chart.chart.notes.len(),
            events = chart.chart.events.len(),
            "loaded chart"
        );
        Ok(chart)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), "saved chart");
        Ok(())
    }

    /// Conductor for this chart's initial tempo and meter.
    pub fn conductor(&self, pre_roll_beats: u32) -> Result<Conductor> {
        Conductor::with_count_in(
            self.manifest.initial_bpm,
            self.manifest.time_signature,
            pre_roll_beats,
        )
    }

    /// Sorted, deduplicated timeline for the stored stamps.
    pub fn timeline(&self, conductor: &Conductor) -> Timeline {
        Timeline::from_parts(
            self.chart.notes.clone(),
            self.chart.events.clone(),
            conductor,
        )
    }

    /// Replaces the stored stamps with the contents of `timeline`.
    pub fn store_timeline(&mut self, timeline: &Timeline) {
        self.chart.notes = timeline.notes().to_vec();
        self.chart.events = timeline.events().to_vec();
    }
}
