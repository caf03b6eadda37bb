//! Tagged MIDI message kinds produced by the stream decoder.

use crate::consts::*;
use midi_msg::{
    ChannelModeMsg, ChannelVoiceMsg, MidiMsg, ParseError, PolyMode, SystemCommonMsg,
};
use serde::{Deserialize, Serialize};

/// Single-byte real-time messages, handled without touching the decoder buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealTimeMessage {
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSense,
    SystemReset,
}

impl RealTimeMessage {
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            TIMING_CLOCK => Some(Self::TimingClock),
            START => Some(Self::Start),
            CONTINUE => Some(Self::Continue),
            STOP => Some(Self::Stop),
            ACTIVE_SENSE => Some(Self::ActiveSense),
            SYSTEM_RESET => Some(Self::SystemReset),
            _ => None,
        }
    }
}

/// System common messages. Their data is consumed but carries no synthesis meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemCommon {
    TimeCodeQuarterFrame(u8),
    SongPosition(u16),
    SongSelect(u8),
    TuneRequest,
    /// 0xF4, 0xF5 and a stray 0xF7.
    Undefined(u8),
}

/// Channel voice message without its channel number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMessage {
    NoteOff { key: u8, velocity: u8 },
    NoteOn { key: u8, velocity: u8 },
    PolyPressure { key: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// 14-bit value, 8192 = center.
    PitchBend { value: u16 },
}

impl ChannelMessage {
    /// Note-On with velocity 0 counts as Note-Off.
    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self,
            ChannelMessage::NoteOff { .. } | ChannelMessage::NoteOn { velocity: 0, .. }
        )
    }
}

/// A complete message taken off the decoder buffer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiMessage {
    Channel { channel: u8, message: ChannelMessage },
    System(SystemCommon),
    /// Full exclusive block including the 0xF0 and 0xF7 framing bytes.
    SysEx(Vec<u8>),
}

/// Total length in bytes (status included) of the message starting with `status`.
///
/// Returns `None` for data bytes, exclusive start and real-time bytes.
pub fn message_len(status: u8) -> Option<usize> {
    match status & 0xF0 {
        NOTE_OFF | NOTE_ON | POLYPHONIC_AFTERTOUCH | CONTROL_CHANGE | PITCH_BEND => Some(3),
        PROGRAM_CHANGE | CHANNEL_AFTERTOUCH => Some(2),
        SYSTEM => match status {
            TIME_CODE_QUARTER_FRAME | SONG_SELECT => Some(2),
            SONG_POSITION => Some(3),
            0xF4 | 0xF5 | TUNE_REQUEST | EXCLUSIVE_END => Some(1),
            _ => None,
        },
        _ => None,
    }
}

impl From<ChannelVoiceMsg> for ChannelMessage {
    fn from(msg: ChannelVoiceMsg) -> Self {
        match msg {
            ChannelVoiceMsg::NoteOff { note, velocity } => Self::NoteOff {
                key: note,
                velocity,
            },
            ChannelVoiceMsg::NoteOn { note, velocity } => Self::NoteOn {
                key: note,
                velocity,
            },
            ChannelVoiceMsg::HighResNoteOff { note, velocity } => Self::NoteOff {
                key: note,
                velocity: (velocity >> 7) as u8,
            },
            ChannelVoiceMsg::HighResNoteOn { note, velocity } => Self::NoteOn {
                key: note,
                velocity: (velocity >> 7) as u8,
            },
            ChannelVoiceMsg::PolyPressure { note, pressure } => Self::PolyPressure {
                key: note,
                pressure,
            },
            ChannelVoiceMsg::ControlChange { control } => {
                let simple = control.to_simple();
                Self::ControlChange {
                    controller: simple.control(),
                    value: simple.value(),
                }
            }
            ChannelVoiceMsg::ProgramChange { program } => Self::ProgramChange { program },
            ChannelVoiceMsg::ChannelPressure { pressure } => Self::ChannelPressure { pressure },
            ChannelVoiceMsg::PitchBend { bend } => Self::PitchBend { value: bend },
        }
    }
}

/// Channel mode messages travel as controllers 120-127.
impl From<ChannelModeMsg> for ChannelMessage {
    fn from(msg: ChannelModeMsg) -> Self {
        let (controller, value) = match msg {
            ChannelModeMsg::AllSoundOff => (ALL_SOUND_OFF, 0),
            ChannelModeMsg::ResetAllControllers => (ALL_CONTROLLERS_OFF, 0),
            ChannelModeMsg::LocalControl(on) => (LOCAL_CONTROL, if on { 127 } else { 0 }),
            ChannelModeMsg::AllNotesOff => (ALL_NOTES_OFF, 0),
            ChannelModeMsg::OmniMode(false) => (OMNI_OFF, 0),
            ChannelModeMsg::OmniMode(true) => (OMNI_ON, 0),
            ChannelModeMsg::PolyMode(PolyMode::Mono(channels)) => (MONO_ALL_NOTES_OFF, channels),
            ChannelModeMsg::PolyMode(PolyMode::Poly) => (POLY_ALL_NOTES_OFF, 0),
        };
        Self::ControlChange { controller, value }
    }
}

impl MidiMessage {
    /// Decodes one complete, non-exclusive command.
    ///
    /// `bytes` must start with a status byte and hold `message_len(bytes[0])` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, midi_msg::ParseError> {
        let (msg, _len) = match MidiMsg::from_midi(bytes) {
            Ok(decoded) => decoded,
            Err(ParseError::UndefinedSystemCommonMessage(status)) => {
                return Ok(Self::System(SystemCommon::Undefined(status)));
            }
            Err(ParseError::UnexpectedEndOfSystemExclusiveFlag) => {
                return Ok(Self::System(SystemCommon::Undefined(EXCLUSIVE_END)));
            }
            Err(e) => return Err(e),
        };

        match msg {
            MidiMsg::ChannelVoice { channel, msg } => Ok(Self::Channel {
                channel: channel as u8,
                message: msg.into(),
            }),
            MidiMsg::ChannelMode { channel, msg } => Ok(Self::Channel {
                channel: channel as u8,
                message: msg.into(),
            }),
            MidiMsg::SystemCommon { msg } => Ok(Self::System(match msg {
                SystemCommonMsg::SongPosition(position) => SystemCommon::SongPosition(position),
                SystemCommonMsg::SongSelect(song) => SystemCommon::SongSelect(song),
                SystemCommonMsg::TuneRequest => SystemCommon::TuneRequest,
                // Quarter frames decode into an accumulated time code; keep the raw piece.
                _ => SystemCommon::TimeCodeQuarterFrame(bytes.get(1).copied().unwrap_or(0)),
            })),
            _ => Err(ParseError::Invalid(
                "Expected channel or system common message",
            )),
        }
    }
}

/// Shared "all notes off" group of channel mode messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotesOff {
    AllSoundOff,
    AllNotesOff,
    OmniOff,
    OmniOn,
    MonoOn,
    PolyOn,
}

/// Controller numbers classified by the handler that consumes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Controller {
    BankSelect { fine: bool },
    ModulationWheel,
    Volume,
    Pan,
    Expression,
    HoldPedal,
    PortamentoPedal,
    SostenutoPedal,
    SoftPedal,
    FilterResonance,
    ReleaseTime,
    AttackTime,
    FilterCutoff,
    DecayTime,
    ReverbSend,
    ChorusSend,
    DataEntry { fine: bool },
    DataIncrement,
    DataDecrement,
    ParameterSelect { registered: bool, coarse: bool },
    /// Resets the performance controllers, then joins the [`NotesOff`] group.
    AllControllersOff,
    NotesOff(NotesOff),
    Unsupported(u8),
}

impl From<u8> for Controller {
    fn from(number: u8) -> Self {
        match number {
            BANK_SELECT => Controller::BankSelect { fine: false },
            n if n == BANK_SELECT | FINE => Controller::BankSelect { fine: true },
            MODULATION_WHEEL => Controller::ModulationWheel,
            CHANNEL_VOLUME => Controller::Volume,
            PAN => Controller::Pan,
            EXPRESSION => Controller::Expression,
            HOLD_PEDAL => Controller::HoldPedal,
            PORTAMENTO_PEDAL => Controller::PortamentoPedal,
            SOSTENUTO_PEDAL => Controller::SostenutoPedal,
            SOFT_PEDAL => Controller::SoftPedal,
            FILTER_RESONANCE => Controller::FilterResonance,
            RELEASE_TIME => Controller::ReleaseTime,
            ATTACK_TIME => Controller::AttackTime,
            FILTER_CUTOFF => Controller::FilterCutoff,
            DECAY_TIME => Controller::DecayTime,
            REVERB_SEND => Controller::ReverbSend,
            CHORUS_SEND => Controller::ChorusSend,
            DATA_ENTRY => Controller::DataEntry { fine: false },
            n if n == DATA_ENTRY | FINE => Controller::DataEntry { fine: true },
            DATA_INCREMENT => Controller::DataIncrement,
            DATA_DECREMENT => Controller::DataDecrement,
            REGISTERED_PARAM_COARSE => Controller::ParameterSelect {
                registered: true,
                coarse: true,
            },
            REGISTERED_PARAM_FINE => Controller::ParameterSelect {
                registered: true,
                coarse: false,
            },
            UNREGISTERED_PARAM_COARSE => Controller::ParameterSelect {
                registered: false,
                coarse: true,
            },
            UNREGISTERED_PARAM_FINE => Controller::ParameterSelect {
                registered: false,
                coarse: false,
            },
            ALL_CONTROLLERS_OFF => Controller::AllControllersOff,
            ALL_SOUND_OFF => Controller::NotesOff(NotesOff::AllSoundOff),
            ALL_NOTES_OFF => Controller::NotesOff(NotesOff::AllNotesOff),
            OMNI_OFF => Controller::NotesOff(NotesOff::OmniOff),
            OMNI_ON => Controller::NotesOff(NotesOff::OmniOn),
            MONO_ALL_NOTES_OFF => Controller::NotesOff(NotesOff::MonoOn),
            POLY_ALL_NOTES_OFF => Controller::NotesOff(NotesOff::PolyOn),
            other => Controller::Unsupported(other),
        }
    }
}
