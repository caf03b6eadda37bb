//! Narrow facade over the external mixing engine.
//!
//! Voice allocation and rendering live outside this crate. Channels talk to
//! the engine through [`Mixer`], keyed by a [`GroupId`] that combines the port
//! and channel number.

use serde::{Deserialize, Serialize};

/// Voice group id: `port << 4 | channel`.
pub type GroupId = u16;

#[inline]
pub fn group_id(port: u8, channel: u8) -> GroupId {
    (u16::from(port) << 4) | u16::from(channel & 0x0F)
}

/// Handle to a buffer owned by the mixing engine. Id 0 is reserved for "no buffer".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BufferId(pub u32);

impl BufferId {
    pub const EMPTY: BufferId = BufferId(0);

    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

/// Rendering capability tag applied to base buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    #[default]
    Stereo,
    Spatial,
    Hrtf,
}

/// Registration details for a new voice group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoiceGroup {
    pub drums: bool,
    /// Drum-kit effect or other per-channel base buffer.
    pub base: Option<BufferId>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteOn {
    pub key: u8,
    /// Normalized, 0.0 to 1.0.
    pub velocity: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    pub buffer: BufferId,
}

/// Per-group parameter update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChannelParam {
    Gain(f32),
    Expression(f32),
    /// -1.0 (left) to 1.0 (right).
    Pan(f32),
    /// Pitch-bend ratio.
    PitchBend(f32),
    /// Channel tuning ratio.
    Tuning(f32),
    Modulation(f32),
    PressureVolume(f32),
    PressurePitch(f32),
    KeyPressure { key: u8, value: f32 },
    Hold(bool),
    Sostenuto(bool),
    Soft(bool),
    Portamento(bool),
    FilterResonance(f32),
    FilterCutoff(f32),
    AttackTime(f32),
    ReleaseTime(f32),
    DecayTime(f32),
    ChorusLevel(f32),
    ReverbLevel(f32),
    StereoWidth(bool),
}

/// Engine-wide parameter update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MasterParam {
    Gain(f32),
    /// Rotation about the listener, in radians.
    Rotation(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectSlot {
    Chorus,
    Reverb,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectParam {
    /// Hz.
    ModulationRate(f32),
    /// Seconds.
    ModulationDepth(f32),
    Feedback(f32),
    SendToReverb(f32),
    DecayDepth(f32),
}

/// Loaded effect description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectAsset {
    pub name: String,
    pub id: BufferId,
}

/// Mixing engine seen from the MIDI control thread.
///
/// Implementations are expected to be internally synchronized with their
/// render thread, which is why every method takes `&self`.
pub trait Mixer {
    /// Creates the voice group for a channel.
    ///
    /// # Errors
    /// Returns an error when the engine cannot host another group.
    fn register(&self, group: GroupId, voices: &VoiceGroup) -> crate::Result<()>;

    /// Destroys the voice group. Unknown groups are ignored.
    fn deregister(&self, group: GroupId);

    /// Starts a voice.
    fn play(&self, group: GroupId, note: &NoteOn);

    /// Releases the voice playing `key`.
    fn stop(&self, group: GroupId, key: u8);

    /// Releases every voice of the group.
    fn stop_all(&self, group: GroupId);

    /// Requests a graceful stop of the group's sounding voices.
    fn finish(&self, group: GroupId);

    /// Returns true once every voice of the group has stopped.
    fn finished(&self, group: GroupId) -> bool;

    fn set_param(&self, group: GroupId, param: ChannelParam);

    fn set_master(&self, param: MasterParam);

    /// Moves the group from the primary bus to the reverb send bus.
    fn attach_reverb(&self, group: GroupId);

    /// Moves the group back to the primary bus.
    fn detach_reverb(&self, group: GroupId);

    fn set_effect_send(&self, group: GroupId, slot: EffectSlot, effect: &EffectAsset);

    fn set_effect_param(&self, slot: EffectSlot, param: EffectParam);

    fn set_render_mode(&self, buffer: BufferId, mode: RenderMode);
}
