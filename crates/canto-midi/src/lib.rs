//! MIDI protocol layer for the Canto dispatcher.
//!
//! Provides byte framing, tagged message kinds, the RPN/NRPN registry and the
//! GM/GS/XG System Exclusive interpreter. Nothing here touches audio: every
//! component returns typed changes for the caller to apply.

pub mod consts;

pub mod error;
pub use error::{Error, Result};

pub mod utils;
pub use utils::{
    centered_14bit, centered_7bit, combine_14bit, semitones_to_ratio, velocity_to_gain,
};

mod message;
pub use message::{
    message_len, ChannelMessage, Controller, MidiMessage, NotesOff, RealTimeMessage, SystemCommon,
};

mod decoder;
pub use decoder::{Push, StreamDecoder, MAX_SYSEX_LEN};

mod param;
pub use param::{ParamValue, ParameterChange, ParameterRegistry, DEFAULT_PITCH_BEND_RANGE};

mod device;
pub use device::DeviceMode;

mod effects;
pub use effects::{ChorusPreset, ReverbPreset};

mod sysex;
pub use sysex::{ChorusParam, ReverbParam, SysExEvent, SysExEvents, SysExInterpreter};
