//! Channel state and sample resolution for the Canto dispatcher.
//!
//! - [`InstrumentBankIndex`]: bank/program/drum/patch-layer lookup with fallbacks
//! - [`BufferCache`]: reference-counted sample buffers behind an [`AssetLoader`]
//! - [`Channel`] / [`ChannelTable`]: per-channel performance state
//! - [`Mixer`]: facade over the external mixing engine

pub mod error;
pub use error::{Error, Result};

pub mod bank;
pub use bank::{BankConfig, DrumSample, Instrument, InstrumentBankIndex, Patch, PatchLayer};

mod cache;
pub use cache::{cache_key, AssetLoader, BufferCache, BufferInfo, PressureRouting, SharedLoader};

mod mixer;
pub use mixer::{
    group_id, BufferId, ChannelParam, EffectAsset, EffectParam, EffectSlot, GroupId, MasterParam,
    Mixer, NoteOn, RenderMode, VoiceGroup,
};

pub mod choke;

mod channel;
pub use channel::{Channel, DEFAULT_GAIN};

mod table;
pub use table::{ChannelTable, SharedMixer};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
