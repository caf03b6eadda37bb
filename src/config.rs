//! Dispatcher configuration.

use crate::{Error, Result};
use canto_synth::RenderMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_INSTRUMENT_FILE: &str = "gmmidi.json";
pub const DEFAULT_DRUM_FILE: &str = "gmdrums.json";
pub const DEFAULT_PPQN: u16 = 24;
/// 120 BPM.
pub const DEFAULT_TEMPO_USPQ: u32 = 500_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Directory holding the bank description files.
    pub data_path: PathBuf,
    pub instrument_file: String,
    pub drum_file: String,
    /// Channel that is always classified as drums.
    pub drum_channel: u8,
    pub render_mode: RenderMode,
    /// Pulses per quarter note.
    pub ppqn: u16,
    /// Microseconds per quarter note.
    pub tempo_uspq: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("."),
            instrument_file: DEFAULT_INSTRUMENT_FILE.to_string(),
            drum_file: DEFAULT_DRUM_FILE.to_string(),
            drum_channel: canto_midi::consts::DRUMS_CHANNEL,
            render_mode: RenderMode::default(),
            ppqn: DEFAULT_PPQN,
            tempo_uspq: DEFAULT_TEMPO_USPQ,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.drum_channel > 15 {
            return Err(Error::InvalidConfig(format!(
                "drum_channel {} out of range (0-15)",
                self.drum_channel
            )));
        }
        if self.ppqn == 0 {
            return Err(Error::InvalidConfig("ppqn must be non-zero".to_string()));
        }
        if self.tempo_uspq == 0 {
            return Err(Error::InvalidConfig(
                "tempo_uspq must be non-zero".to_string(),
            ));
        }
        if self.instrument_file.is_empty() || self.drum_file.is_empty() {
            return Err(Error::InvalidConfig(
                "instrument and drum file names must be set".to_string(),
            ));
        }
        Ok(())
    }
}
