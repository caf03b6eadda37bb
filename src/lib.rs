//! # Canto - MIDI interpreter and synthesis dispatcher
//!
//! Turns a stream of MIDI 1.0 bytes into operations on an external mixing
//! engine: note on/off, pitch, pressure, timbre and effect-send changes.
//!
//! ## Architecture
//!
//! Canto is an umbrella crate that coordinates:
//! - **canto-midi** - Stream framing, RPN/NRPN registry, GM/GS/XG System Exclusive
//! - **canto-synth** - Bank resolution, buffer cache, channel state, mixer facade
//!
//! ## Quick Start
//!
//! ```ignore
//! use canto::prelude::*;
//!
//! let mut dispatcher = MessageDispatcher::builder()
//!     .bank_index(banks)
//!     .build(mixer, loader)?;
//!
//! // Program change, then middle C
//! dispatcher.push_all(&[0xC0, 0x00, 0x90, 60, 100]);
//! ```

pub use canto_midi as midi;
pub use canto_synth as synth;

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::DispatcherConfig;

mod builder;
pub use builder::DispatcherBuilder;

mod dispatcher;
pub use dispatcher::MessageDispatcher;

pub mod prelude {
    pub use crate::{DispatcherBuilder, DispatcherConfig, Error, MessageDispatcher, Result};
    pub use canto_midi::{DeviceMode, MidiMessage, StreamDecoder};
    pub use canto_synth::{
        group_id, AssetLoader, BankConfig, BufferId, BufferInfo, ChannelParam, GroupId,
        InstrumentBankIndex, Mixer, RenderMode, SharedLoader, SharedMixer,
    };
}
