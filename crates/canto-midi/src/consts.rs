//! MIDI 1.0 status bytes, controller numbers and registered parameter ids.

// Status bytes
pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLYPHONIC_AFTERTOUCH: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_AFTERTOUCH: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;
pub const SYSTEM: u8 = 0xF0;

pub const EXCLUSIVE_START: u8 = 0xF0;
pub const TIME_CODE_QUARTER_FRAME: u8 = 0xF1;
pub const SONG_POSITION: u8 = 0xF2;
pub const SONG_SELECT: u8 = 0xF3;
pub const TUNE_REQUEST: u8 = 0xF6;
pub const EXCLUSIVE_END: u8 = 0xF7;

// Real-time bytes
pub const TIMING_CLOCK: u8 = 0xF8;
pub const START: u8 = 0xFA;
pub const CONTINUE: u8 = 0xFB;
pub const STOP: u8 = 0xFC;
pub const ACTIVE_SENSE: u8 = 0xFE;
pub const SYSTEM_RESET: u8 = 0xFF;

// Controller numbers
pub const FINE: u8 = 0x20;

pub const BANK_SELECT: u8 = 0x00;
pub const MODULATION_WHEEL: u8 = 0x01;
pub const BREATH_CONTROLLER: u8 = 0x02;
pub const FOOT_CONTROLLER: u8 = 0x04;
pub const PORTAMENTO_TIME: u8 = 0x05;
pub const DATA_ENTRY: u8 = 0x06;
pub const CHANNEL_VOLUME: u8 = 0x07;
pub const BALANCE: u8 = 0x08;
pub const PAN: u8 = 0x0A;
pub const EXPRESSION: u8 = 0x0B;
pub const HOLD_PEDAL: u8 = 0x40;
pub const PORTAMENTO_PEDAL: u8 = 0x41;
pub const SOSTENUTO_PEDAL: u8 = 0x42;
pub const SOFT_PEDAL: u8 = 0x43;
pub const LEGATO_PEDAL: u8 = 0x44;
pub const HOLD_PEDAL2: u8 = 0x45;
pub const SOUND_VARIATION: u8 = 0x46;
pub const FILTER_RESONANCE: u8 = 0x47;
pub const RELEASE_TIME: u8 = 0x48;
pub const ATTACK_TIME: u8 = 0x49;
pub const FILTER_CUTOFF: u8 = 0x4A;
pub const DECAY_TIME: u8 = 0x4B;
pub const PORTAMENTO_CONTROL: u8 = 0x54;
pub const REVERB_SEND: u8 = 0x5B;
pub const TREMOLO_DEPTH: u8 = 0x5C;
pub const CHORUS_SEND: u8 = 0x5D;
pub const CELESTE_DEPTH: u8 = 0x5E;
pub const PHASER_DEPTH: u8 = 0x5F;
pub const DATA_INCREMENT: u8 = 0x60;
pub const DATA_DECREMENT: u8 = 0x61;
pub const UNREGISTERED_PARAM_FINE: u8 = 0x62;
pub const UNREGISTERED_PARAM_COARSE: u8 = 0x63;
pub const REGISTERED_PARAM_FINE: u8 = 0x64;
pub const REGISTERED_PARAM_COARSE: u8 = 0x65;
pub const ALL_SOUND_OFF: u8 = 0x78;
pub const ALL_CONTROLLERS_OFF: u8 = 0x79;
pub const LOCAL_CONTROL: u8 = 0x7A;
pub const ALL_NOTES_OFF: u8 = 0x7B;
pub const OMNI_OFF: u8 = 0x7C;
pub const OMNI_ON: u8 = 0x7D;
pub const MONO_ALL_NOTES_OFF: u8 = 0x7E;
pub const POLY_ALL_NOTES_OFF: u8 = 0x7F;

// Registered parameters (MSB << 8 | LSB)
pub const PITCH_BEND_SENSITIVITY: u16 = 0x0000;
pub const CHANNEL_FINE_TUNING: u16 = 0x0001;
pub const CHANNEL_COARSE_TUNING: u16 = 0x0002;
pub const TUNING_PROGRAM_CHANGE: u16 = 0x0003;
pub const TUNING_BANK_SELECT: u16 = 0x0004;
pub const MODULATION_DEPTH_RANGE: u16 = 0x0005;
pub const PARAMETER_RESET: u16 = 0x7F7F;

pub const MAX_REGISTERED_PARAM: u8 = 0x06;

// System exclusive manufacturer ids
pub const ROLAND: u8 = 0x41;
pub const YAMAHA: u8 = 0x43;
pub const UNIVERSAL_NON_REALTIME: u8 = 0x7E;
pub const UNIVERSAL_REALTIME: u8 = 0x7F;

/// Channel that is always classified as a drum channel (MIDI channel 10).
pub const DRUMS_CHANNEL: u8 = 0x09;

/// Bank select coarse values reserved for channel classification.
pub const DRUM_BANK: u8 = 0x78;
pub const MELODIC_BANK: u8 = 0x79;
