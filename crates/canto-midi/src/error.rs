//! Error types for canto-midi.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown chorus preset: {0}")]
    UnknownChorusPreset(u8),

    #[error("Unknown reverb preset: {0}")]
    UnknownReverbPreset(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
