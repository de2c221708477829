use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BeatgridError, Result, TimeSignature};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub conductor: ConductorConfig,
    pub editor: EditorConfig,
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing sections and fields keep their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let conductor = &self.conductor;
        if !conductor.default_bpm.is_finite() || conductor.default_bpm <= 0.0 {
            return Err(BeatgridError::config(format!(
                "default bpm must be positive, got {}",
                conductor.default_bpm
            )));
        }
        conductor.default_time_signature.validate()?;
        if self.playback.frame_rate == 0 {
            return Err(BeatgridError::config("frame rate must be at least 1"));
        }
        if !self.playback.playback_rate.is_finite() || self.playback.playback_rate <= 0.0 {
            return Err(BeatgridError::config(format!(
                "playback rate must be positive, got {}",
                self.playback.playback_rate
            )));
        }
        Ok(())
    }
}

/// Configuration for new conductors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Length of the count-in before the song starts.
    pub pre_roll_beats: u32,
    pub default_bpm: f64,
    pub default_time_signature: TimeSignature,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            pre_roll_beats: 4,
            default_bpm: 120.0,
            default_time_signature: TimeSignature::FOUR_FOUR,
        }
    }
}

/// Which lanes `FlipMoves` swaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlipMode {
    /// Left and right trade places.
    #[default]
    Horizontal,
    /// Up and down trade places.
    Vertical,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo snapshots kept.
    pub history_limit: usize,
    pub flip_mode: FlipMode,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            flip_mode: FlipMode::Horizontal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub frame_rate: u32,
    pub playback_rate: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            playback_rate: 1.0,
        }
    }
}

impl PlaybackConfig {
    /// Seconds per simulated frame.
    pub fn frame_delta(&self) -> f64 {
        1.0 / self.frame_rate.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "editor": { "history_limit": 5 } }"#).unwrap();

        assert_eq!(config.editor.history_limit, 5);
        assert_eq!(config.editor.flip_mode, FlipMode::Horizontal);
        assert_eq!(config.conductor, ConductorConfig::default());
        assert_eq!(config.playback.frame_rate, 60);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.playback.frame_rate = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.conductor.default_bpm = -1.0;
        assert!(matches!(config.validate(), Err(BeatgridError::InvalidConfig(_))));

        let mut config = AppConfig::default();
        config.conductor.default_time_signature = TimeSignature::new(4, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beatgrid.json");
        let mut config = AppConfig::default();
        config.editor.flip_mode = FlipMode::Both;
        config.conductor.pre_roll_beats = 2;

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }
}
