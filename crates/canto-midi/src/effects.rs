//! GM2 chorus and reverb type presets.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChorusPreset {
    Chorus1,
    Chorus2,
    Chorus3,
    Chorus4,
    FeedbackChorus,
    Flanger,
}

impl ChorusPreset {
    /// Name of the effect asset that implements this preset.
    pub fn asset_name(self) -> &'static str {
        match self {
            ChorusPreset::Chorus1 => "chorus/chorus1",
            ChorusPreset::Chorus2 => "chorus/chorus2",
            ChorusPreset::Chorus3 => "chorus/chorus3",
            ChorusPreset::Chorus4 => "chorus/chorus4",
            ChorusPreset::FeedbackChorus => "chorus/feedback",
            ChorusPreset::Flanger => "chorus/flanger",
        }
    }
}

impl TryFrom<u8> for ChorusPreset {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ChorusPreset::Chorus1),
            1 => Ok(ChorusPreset::Chorus2),
            2 => Ok(ChorusPreset::Chorus3),
            3 => Ok(ChorusPreset::Chorus4),
            4 => Ok(ChorusPreset::FeedbackChorus),
            5 => Ok(ChorusPreset::Flanger),
            other => Err(Error::UnknownChorusPreset(other)),
        }
    }
}

/// GM2 reverb types. Values 5 to 7 are unassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReverbPreset {
    SmallRoom,
    MediumRoom,
    LargeRoom,
    MediumHall,
    LargeHall,
    Plate,
}

impl ReverbPreset {
    pub fn asset_name(self) -> &'static str {
        match self {
            ReverbPreset::SmallRoom => "reverb/room-small",
            ReverbPreset::MediumRoom => "reverb/room-medium",
            ReverbPreset::LargeRoom => "reverb/room-large",
            ReverbPreset::MediumHall => "reverb/concerthall",
            ReverbPreset::LargeHall => "reverb/concerthall-large",
            ReverbPreset::Plate => "reverb/plate",
        }
    }
}

impl TryFrom<u8> for ReverbPreset {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ReverbPreset::SmallRoom),
            1 => Ok(ReverbPreset::MediumRoom),
            2 => Ok(ReverbPreset::LargeRoom),
            3 => Ok(ReverbPreset::MediumHall),
            4 => Ok(ReverbPreset::LargeHall),
            8 => Ok(ReverbPreset::Plate),
            other => Err(Error::UnknownReverbPreset(other)),
        }
    }
}
