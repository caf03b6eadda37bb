//! Per-channel performance state.

use crate::bank::InstrumentBankIndex;
use crate::cache::{BufferCache, BufferInfo, PressureRouting};
use crate::choke::choked_keys;
use crate::mixer::{ChannelParam, GroupId, Mixer, NoteOn};
use canto_midi::{
    centered_14bit, semitones_to_ratio, velocity_to_gain, DeviceMode, DEFAULT_PITCH_BEND_RANGE,
};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use tracing::{debug, trace};

/// Gain restored by All Controllers Off.
pub const DEFAULT_GAIN: f32 = 100.0 / 127.0;

const DEFAULT_MODULATION_RANGE: f32 = 1.0;

/// Cached buffer for the keys in `[floor, threshold)`.
#[derive(Clone, Copy, Debug)]
struct KeyZone {
    floor: u8,
    buffer: BufferInfo,
}

#[derive(Debug)]
pub struct Channel {
    group: GroupId,
    bank: u16,
    program: u8,
    drums: bool,
    mode: DeviceMode,

    tuning: f32,
    pitch_bend_range: f32,
    modulation_range: f32,
    pressure: PressureRouting,
    wide: bool,
    mono: bool,

    gain: f32,
    pan: f32,
    expression: f32,
    hold: bool,
    sostenuto: bool,
    soft: bool,
    portamento: bool,
    reverb_level: f32,
    chorus_level: f32,
    finishing: bool,

    base: BufferInfo,
    // Melodic: keyed by zone threshold. Drums: keyed by note.
    keys: BTreeMap<u8, KeyZone>,
    sounding: SmallVec<[u8; 16]>,
}

impl Channel {
    pub fn new(group: GroupId, bank: u16, program: u8, drums: bool, base: BufferInfo) -> Self {
        Self {
            group,
            bank,
            program,
            drums,
            mode: DeviceMode::Plain,
            tuning: 1.0,
            pitch_bend_range: DEFAULT_PITCH_BEND_RANGE,
            modulation_range: DEFAULT_MODULATION_RANGE,
            pressure: PressureRouting {
                volume: true,
                pitch: false,
                sensitivity: 1.0,
            },
            wide: false,
            mono: false,
            gain: DEFAULT_GAIN,
            pan: 0.0,
            expression: 1.0,
            hold: false,
            sostenuto: false,
            soft: false,
            portamento: false,
            reverb_level: 0.0,
            chorus_level: 0.0,
            finishing: false,
            base,
            keys: BTreeMap::new(),
            sounding: SmallVec::new(),
        }
    }

    #[inline]
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Channel number within its port.
    #[inline]
    pub fn number(&self) -> u8 {
        (self.group & 0x0F) as u8
    }

    #[inline]
    pub fn bank(&self) -> u16 {
        self.bank
    }

    #[inline]
    pub fn program(&self) -> u8 {
        self.program
    }

    #[inline]
    pub fn is_drums(&self) -> bool {
        self.drums
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DeviceMode) {
        self.mode = mode;
    }

    /// Tuning ratio.
    pub fn tuning(&self) -> f32 {
        self.tuning
    }

    pub fn pitch_bend_range(&self) -> f32 {
        self.pitch_bend_range
    }

    pub fn modulation_range(&self) -> f32 {
        self.modulation_range
    }

    pub fn pressure_routing(&self) -> PressureRouting {
        self.pressure
    }

    pub fn is_wide(&self) -> bool {
        self.wide
    }

    pub fn is_mono(&self) -> bool {
        self.mono
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn expression(&self) -> f32 {
        self.expression
    }

    pub fn hold(&self) -> bool {
        self.hold
    }

    pub fn sostenuto(&self) -> bool {
        self.sostenuto
    }

    pub fn soft(&self) -> bool {
        self.soft
    }

    pub fn portamento(&self) -> bool {
        self.portamento
    }

    pub fn reverb_level(&self) -> f32 {
        self.reverb_level
    }

    pub fn chorus_level(&self) -> f32 {
        self.chorus_level
    }

    pub fn base(&self) -> BufferInfo {
        self.base
    }

    pub fn is_finishing(&self) -> bool {
        self.finishing
    }

    pub(crate) fn set_finishing(&mut self, finishing: bool) {
        self.finishing = finishing;
    }

    /// Keys started and not yet stopped.
    pub fn sounding(&self) -> &[u8] {
        &self.sounding
    }

    pub fn set_pitch_bend_range(&mut self, semitones: f32) {
        self.pitch_bend_range = semitones;
    }

    pub fn set_modulation_range(&mut self, semitones: f32) {
        self.modulation_range = semitones;
    }

    /// Sets the tuning from a centered value in [-1.0, 1.0] semitones.
    pub fn set_tuning(&mut self, mixer: &dyn Mixer, centered: f32) {
        self.tuning = semitones_to_ratio(centered);
        mixer.set_param(self.group, ChannelParam::Tuning(self.tuning));
    }

    pub fn set_mono(&mut self, mixer: &dyn Mixer, mono: bool) {
        if mono && !self.mono {
            self.stop_all(mixer);
        }
        self.mono = mono;
    }

    pub(crate) fn set_reverb_level(&mut self, level: f32) {
        self.reverb_level = level;
    }

    /// Stores and forwards a performance parameter.
    pub fn set_param(&mut self, mixer: &dyn Mixer, param: ChannelParam) {
        match param {
            ChannelParam::Gain(v) => self.gain = v,
            ChannelParam::Pan(v) => self.pan = v,
            ChannelParam::Expression(v) => self.expression = v,
            ChannelParam::Hold(on) => self.hold = on,
            ChannelParam::Sostenuto(on) => self.sostenuto = on,
            ChannelParam::Soft(on) => self.soft = on,
            ChannelParam::Portamento(on) => self.portamento = on,
            ChannelParam::ChorusLevel(v) => self.chorus_level = v,
            ChannelParam::ReverbLevel(v) => self.reverb_level = v,
            _ => {}
        }
        mixer.set_param(self.group, param);
    }

    /// 14-bit bend value, scaled by the pitch-bend range.
    pub fn set_pitch_bend(&mut self, mixer: &dyn Mixer, value: u16) {
        let semitones = centered_14bit(value) * self.pitch_bend_range;
        mixer.set_param(self.group, ChannelParam::PitchBend(semitones_to_ratio(semitones)));
    }

    pub fn set_modulation(&mut self, mixer: &dyn Mixer, value: u8) {
        let depth = velocity_to_gain(value) * self.modulation_range;
        mixer.set_param(self.group, ChannelParam::Modulation(depth));
    }

    pub fn set_pressure(&mut self, mixer: &dyn Mixer, value: u8) {
        let pressure = velocity_to_gain(value) * self.pressure.sensitivity;
        if self.pressure.volume {
            mixer.set_param(self.group, ChannelParam::PressureVolume(pressure));
        }
        if self.pressure.pitch {
            mixer.set_param(self.group, ChannelParam::PressurePitch(pressure));
        }
    }

    pub fn set_key_pressure(&mut self, mixer: &dyn Mixer, key: u8, value: u8) {
        let value = velocity_to_gain(value) * self.pressure.sensitivity;
        mixer.set_param(self.group, ChannelParam::KeyPressure { key, value });
    }

    /// All Controllers Off.
    pub fn reset_controllers(&mut self, mixer: &dyn Mixer) {
        self.pitch_bend_range = DEFAULT_PITCH_BEND_RANGE;
        for param in [
            ChannelParam::Expression(1.0),
            ChannelParam::Gain(DEFAULT_GAIN),
            ChannelParam::Pan(0.0),
            ChannelParam::Hold(false),
            ChannelParam::Sostenuto(false),
            ChannelParam::Soft(false),
            ChannelParam::Portamento(false),
            ChannelParam::PitchBend(1.0),
            ChannelParam::PressureVolume(0.0),
            ChannelParam::PressurePitch(0.0),
        ] {
            self.set_param(mixer, param);
        }
    }

    /// Resolves the buffer for `key` and starts a voice on it.
    ///
    /// Returns false when no sample could be resolved; the note is dropped.
    pub fn play(
        &mut self,
        banks: &InstrumentBankIndex,
        cache: &mut BufferCache,
        mixer: &dyn Mixer,
        key: u8,
        velocity: u8,
        device_tuning: f32,
    ) -> bool {
        let buffer = if self.drums {
            self.drum_buffer(banks, cache, key)
        } else {
            self.melodic_buffer(banks, cache, mixer, key)
        };
        let Some(buffer) = buffer else {
            trace!(group = self.group, key, "No sample for key, note dropped");
            return false;
        };

        if self.drums {
            for &choked in choked_keys(self.program, key) {
                if self.sounding.contains(&choked) {
                    self.stop(mixer, choked);
                }
            }
        } else if self.mono {
            self.stop_all(mixer);
        }

        self.finishing = false;
        mixer.play(
            self.group,
            &NoteOn {
                key,
                velocity: velocity_to_gain(velocity),
                pitch: self.tuning * device_tuning,
                buffer: buffer.id,
            },
        );
        if !self.sounding.contains(&key) {
            self.sounding.push(key);
        }
        true
    }

    pub fn stop(&mut self, mixer: &dyn Mixer, key: u8) {
        mixer.stop(self.group, key);
        self.sounding.retain(|k| *k != key);
    }

    pub fn stop_all(&mut self, mixer: &dyn Mixer) {
        mixer.stop_all(self.group);
        self.sounding.clear();
    }

    /// Drops every buffer reference held by this channel.
    pub fn release(&mut self, cache: &mut BufferCache) {
        for (_, zone) in std::mem::take(&mut self.keys) {
            cache.destroy(&zone.buffer);
        }
        cache.destroy(&self.base);
        self.base = BufferInfo::EMPTY;
        self.sounding.clear();
    }

    fn drum_buffer(
        &mut self,
        banks: &InstrumentBankIndex,
        cache: &mut BufferCache,
        key: u8,
    ) -> Option<BufferInfo> {
        if let Some(zone) = self.keys.get(&key) {
            return Some(zone.buffer);
        }

        let sample = banks.get_drum(self.program, key)?;
        debug!(
            "Loading drum kit {} key {}: {}",
            self.program, key, sample.file
        );
        let buffer = cache.buffer(&sample.file, sample.layer);
        if buffer.is_empty() {
            return None;
        }
        self.keys.insert(key, KeyZone { floor: key, buffer });
        Some(buffer)
    }

    fn melodic_buffer(
        &mut self,
        banks: &InstrumentBankIndex,
        cache: &mut BufferCache,
        mixer: &dyn Mixer,
        key: u8,
    ) -> Option<BufferInfo> {
        if let Some((_, zone)) = self.keys.range((Excluded(key), Unbounded)).next() {
            if zone.floor <= key {
                return Some(zone.buffer);
            }
        }

        let instrument = banks.get_instrument(self.bank, self.program)?;
        let patch = banks.get_patch(&instrument.file, key);
        debug!(
            "Loading instrument bank {} program {}: {}",
            self.bank, self.program, instrument.file
        );
        let buffer = match patch.layer {
            Some(layer) => cache.buffer(&layer.file, layer.layer),
            None => cache.buffer(&instrument.file, 0),
        };
        if buffer.is_empty() {
            return None;
        }

        self.keys.insert(
            patch.threshold,
            KeyZone {
                floor: patch.floor,
                buffer,
            },
        );

        self.wide = instrument.wide || buffer.wide;
        self.pressure = buffer.pressure;
        mixer.set_param(self.group, ChannelParam::StereoWidth(self.wide));
        Some(buffer)
    }
}
