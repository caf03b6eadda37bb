use serde::{Deserialize, Serialize};
use std::fmt;

/// Device standard announced by the stream, ordered from least to most capable.
///
/// Once a mode has been entered the interpreter never steps back down.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DeviceMode {
    #[default]
    Plain,
    GeneralMidi1,
    GeneralMidi2,
    GeneralStandard,
    ExtendedGeneralMidi,
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceMode::Plain => "MIDI",
            DeviceMode::GeneralMidi1 => "General MIDI",
            DeviceMode::GeneralMidi2 => "General MIDI 2.0",
            DeviceMode::GeneralStandard => "GS MIDI",
            DeviceMode::ExtendedGeneralMidi => "Extended MIDI (XG)",
        };
        f.write_str(name)
    }
}
