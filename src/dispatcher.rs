//! Top-level MIDI byte consumer.
//!
//! Bytes are framed by a [`StreamDecoder`]; complete messages are routed to
//! the channel table, the per-channel parameter registries or the SysEx
//! interpreter. Global state (device tuning, master gain, omni routing,
//! tempo plumbing) lives here.

use crate::builder::DispatcherBuilder;
use crate::config::DispatcherConfig;
use crate::Result;
use canto_midi::consts::{DRUM_BANK, MELODIC_BANK};
use canto_midi::{
    centered_7bit, semitones_to_ratio, velocity_to_gain, ChannelMessage, ChorusParam, Controller,
    DeviceMode, MidiMessage, NotesOff, ParameterChange, ParameterRegistry, Push, RealTimeMessage,
    ReverbParam, StreamDecoder, SysExEvent, SysExInterpreter, SystemCommon,
};
use canto_synth::{
    group_id, Channel, ChannelParam, ChannelTable, EffectParam, GroupId, InstrumentBankIndex,
    MasterParam, RenderMode, SharedLoader, SharedMixer,
};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub struct MessageDispatcher {
    decoder: StreamDecoder,
    sysex: SysExInterpreter,
    params: HashMap<GroupId, ParameterRegistry>,
    channels: ChannelTable,
    mixer: SharedMixer,

    /// Bank accumulated by CC 0 / CC 32 for the next program change.
    pending_banks: HashMap<GroupId, u16>,
    omni: bool,

    master_gain: f32,
    master_balance: f32,
    master_fine_tuning: f32,
    master_coarse_tuning: f32,

    port: u8,
    port_mask: u32,
    ppqn: u16,
    tempo_uspq: u32,
    uspp: u32,
    /// Timing restored by [`MessageDispatcher::rewind`].
    configured_ppqn: u16,
    configured_tempo_uspq: u32,
}

impl MessageDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Dispatcher with the default configuration.
    pub fn new(
        mixer: SharedMixer,
        loader: SharedLoader,
        banks: InstrumentBankIndex,
    ) -> Result<Self> {
        Self::builder().bank_index(banks).build(mixer, loader)
    }

    pub(crate) fn from_parts(
        config: &DispatcherConfig,
        mixer: SharedMixer,
        loader: SharedLoader,
        banks: Arc<InstrumentBankIndex>,
    ) -> Result<Self> {
        let mut channels = ChannelTable::new(mixer.clone(), loader, banks);
        channels.set_drum_channel(config.drum_channel)?;
        channels.set_render_mode(config.render_mode);

        let mut dispatcher = Self {
            decoder: StreamDecoder::new(),
            sysex: SysExInterpreter::new(),
            params: HashMap::new(),
            channels,
            mixer,
            pending_banks: HashMap::new(),
            omni: false,
            master_gain: 1.0,
            master_balance: 0.0,
            master_fine_tuning: 0.0,
            master_coarse_tuning: 0.0,
            port: 0,
            port_mask: u32::MAX,
            ppqn: config.ppqn,
            tempo_uspq: config.tempo_uspq,
            uspp: 0,
            configured_ppqn: config.ppqn,
            configured_tempo_uspq: config.tempo_uspq,
        };
        dispatcher.set_tempo(config.tempo_uspq);
        Ok(dispatcher)
    }

    /// Feeds one byte of the MIDI stream.
    pub fn push(&mut self, byte: u8) {
        match self.decoder.push(byte) {
            Push::RealTime(message) => self.realtime(message),
            Push::Buffered => {
                while let Some(message) = self.decoder.next_message() {
                    self.dispatch(message);
                }
            }
            Push::Ignored => trace!(byte, "Data byte without status ignored"),
        }
    }

    pub fn push_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Routes an already framed message.
    pub fn dispatch(&mut self, message: MidiMessage) {
        match message {
            MidiMessage::Channel { channel, message } => self.channel_message(channel, message),
            MidiMessage::SysEx(bytes) => {
                for event in self.sysex.interpret(&bytes) {
                    self.apply_sysex(event);
                }
            }
            MidiMessage::System(common) => self.system_common(common),
        }
    }

    // System Reset is acknowledged but intentionally does nothing.
    fn realtime(&mut self, message: RealTimeMessage) {
        trace!(?message, "Real-time message");
    }

    fn system_common(&mut self, message: SystemCommon) {
        trace!(?message, "System common message ignored");
    }

    fn channel_message(&mut self, channel: u8, message: ChannelMessage) {
        let group = group_id(self.port, channel);
        match message {
            ChannelMessage::NoteOn { key, velocity } if velocity > 0 => {
                self.note_on(group, key, velocity)
            }
            ChannelMessage::NoteOn { key, .. } | ChannelMessage::NoteOff { key, .. } => {
                self.note_off(group, key)
            }
            ChannelMessage::PolyPressure { key, pressure } => {
                if let Some(key) = self.map_key(group, key) {
                    let mixer = self.mixer.as_ref();
                    if let Some(channel) = with_channel(&mut self.channels, group) {
                        channel.set_key_pressure(mixer, key, pressure);
                    }
                }
            }
            ChannelMessage::ChannelPressure { pressure } => {
                let mixer = self.mixer.as_ref();
                if let Some(channel) = with_channel(&mut self.channels, group) {
                    channel.set_pressure(mixer, pressure);
                }
            }
            ChannelMessage::PitchBend { value } => {
                let mixer = self.mixer.as_ref();
                if let Some(channel) = with_channel(&mut self.channels, group) {
                    channel.set_pitch_bend(mixer, value);
                }
            }
            ChannelMessage::ProgramChange { program } => {
                let bank = self.pending_banks.get(&group).copied().unwrap_or(0);
                if let Err(e) = self.channels.new_channel(group, bank, program) {
                    warn!("Program change to bank {} program {} failed: {}", bank, program, e);
                }
            }
            ChannelMessage::ControlChange { controller, value } => {
                self.control_change(group, controller, value)
            }
        }
    }

    /// Targets for a note: the addressed channel, or every active channel in omni mode.
    fn note_targets(&self, group: GroupId) -> SmallVec<[GroupId; 16]> {
        let mut targets = SmallVec::new();
        targets.push(group);
        if self.omni {
            targets.extend(self.channels.groups().into_iter().filter(|g| *g != group));
        }
        targets
    }

    /// Melodic channels transpose by `key - 0x20 + coarse tuning`; out of range keys are dropped.
    fn map_key(&mut self, group: GroupId, key: u8) -> Option<u8> {
        let drums = with_channel(&mut self.channels, group)?.is_drums();
        if drums {
            return Some(key);
        }
        let coarse = self.registry(group).coarse_tuning();
        let mapped = i16::from(key) - 0x20 + i16::from(coarse);
        match u8::try_from(mapped) {
            Ok(mapped) if mapped <= 0x7F => Some(mapped),
            _ => {
                trace!(group, key, mapped, "Remapped key out of range, note dropped");
                None
            }
        }
    }

    fn note_on(&mut self, group: GroupId, key: u8, velocity: u8) {
        let tuning = self.device_tuning();
        for target in self.note_targets(group) {
            let Some(mapped) = self.map_key(target, key) else {
                continue;
            };
            if let Err(e) = self.channels.play(target, mapped, velocity, tuning) {
                warn!("Note on channel {} failed: {}", target, e);
            }
        }
    }

    fn note_off(&mut self, group: GroupId, key: u8) {
        for target in self.note_targets(group) {
            if !self.channels.contains(target) {
                continue;
            }
            if let Some(mapped) = self.map_key(target, key) {
                self.channels.stop(target, mapped);
            }
        }
    }

    fn control_change(&mut self, group: GroupId, number: u8, value: u8) {
        let normalized = velocity_to_gain(value);
        let pedal = value >= 64;

        let param = match Controller::from(number) {
            Controller::BankSelect { fine: false } => {
                let bank = self.pending_banks.entry(group).or_insert(0);
                *bank = (*bank & 0x7F) | (u16::from(value) << 7);
                match value {
                    DRUM_BANK => self.channels.mark_drums(group, true),
                    MELODIC_BANK => self.channels.mark_drums(group, false),
                    _ => {}
                }
                return;
            }
            Controller::BankSelect { fine: true } => {
                let bank = self.pending_banks.entry(group).or_insert(0);
                *bank = (*bank & !0x7F) | u16::from(value);
                return;
            }
            Controller::ModulationWheel => {
                let mixer = self.mixer.as_ref();
                if let Some(channel) = with_channel(&mut self.channels, group) {
                    channel.set_modulation(mixer, value);
                }
                return;
            }
            Controller::ReverbSend => {
                if let Err(e) = self.channels.set_reverb_level(group, value) {
                    warn!("Reverb send on channel {} failed: {}", group, e);
                }
                return;
            }
            Controller::DataEntry { fine } => {
                let change = self.registry(group).data_entry(fine, value);
                self.apply_parameter(group, change);
                return;
            }
            Controller::DataIncrement => {
                let change = self.registry(group).increment();
                self.apply_parameter(group, change);
                return;
            }
            Controller::DataDecrement => {
                let change = self.registry(group).decrement();
                self.apply_parameter(group, change);
                return;
            }
            Controller::ParameterSelect { .. } => {
                self.registry(group).select(number, value);
                return;
            }
            Controller::AllControllersOff => {
                let mixer = self.mixer.as_ref();
                if let Some(channel) = with_channel(&mut self.channels, group) {
                    channel.reset_controllers(mixer);
                }
                self.notes_off(group, NotesOff::AllNotesOff);
                return;
            }
            Controller::NotesOff(kind) => {
                self.notes_off(group, kind);
                return;
            }
            Controller::Unsupported(number) => {
                trace!(group, controller = number, value, "Unsupported controller");
                return;
            }
            Controller::Volume => ChannelParam::Gain(normalized),
            Controller::Pan => ChannelParam::Pan(centered_7bit(value)),
            Controller::Expression => ChannelParam::Expression(normalized),
            Controller::HoldPedal => ChannelParam::Hold(pedal),
            Controller::SostenutoPedal => ChannelParam::Sostenuto(pedal),
            Controller::SoftPedal => ChannelParam::Soft(pedal),
            Controller::PortamentoPedal => ChannelParam::Portamento(pedal),
            Controller::FilterResonance => ChannelParam::FilterResonance(normalized),
            Controller::ReleaseTime => ChannelParam::ReleaseTime(normalized),
            Controller::AttackTime => ChannelParam::AttackTime(normalized),
            Controller::FilterCutoff => ChannelParam::FilterCutoff(normalized),
            Controller::DecayTime => ChannelParam::DecayTime(normalized),
            Controller::ChorusSend => ChannelParam::ChorusLevel(normalized),
        };

        let mixer = self.mixer.as_ref();
        if let Some(channel) = with_channel(&mut self.channels, group) {
            channel.set_param(mixer, param);
        }
    }

    /// Shared handler of the channel mode messages.
    fn notes_off(&mut self, group: GroupId, kind: NotesOff) {
        self.channels.stop_all(group);
        match kind {
            NotesOff::OmniOff => self.omni = false,
            NotesOff::OmniOn => self.omni = true,
            NotesOff::MonoOn | NotesOff::PolyOn => {
                let mixer = self.mixer.as_ref();
                if let Some(channel) = with_channel(&mut self.channels, group) {
                    channel.set_mono(mixer, kind == NotesOff::MonoOn);
                }
            }
            NotesOff::AllSoundOff | NotesOff::AllNotesOff => {}
        }
    }

    fn apply_parameter(&mut self, group: GroupId, change: Option<ParameterChange>) {
        let Some(change) = change else {
            return;
        };
        let mixer = self.mixer.as_ref();
        let Some(channel) = with_channel(&mut self.channels, group) else {
            return;
        };
        match change {
            ParameterChange::PitchBendRange(semitones) => channel.set_pitch_bend_range(semitones),
            ParameterChange::ModulationDepth(semitones) => {
                channel.set_modulation_range(semitones)
            }
            ParameterChange::Tuning(centered) => channel.set_tuning(mixer, centered),
        }
    }

    fn apply_sysex(&mut self, event: SysExEvent) {
        match event {
            SysExEvent::SilenceAll => self.channels.silence_all(),
            SysExEvent::DeviceMode(mode) => self.channels.set_mode(mode),
            SysExEvent::DrumPart { channel, drums } => {
                self.channels.mark_drums(group_id(self.port, channel), drums)
            }
            SysExEvent::MasterVolume(gain) => {
                self.master_gain = gain;
                self.mixer.set_master(MasterParam::Gain(gain));
            }
            SysExEvent::MasterBalance(balance) => {
                self.master_balance = balance;
                self.mixer.set_master(MasterParam::Rotation(balance * FRAC_PI_2));
            }
            SysExEvent::MasterFineTuning(centered) => self.master_fine_tuning = centered,
            SysExEvent::MasterCoarseTuning(centered) => self.master_coarse_tuning = centered,
            SysExEvent::Chorus(param) => self.apply_chorus(param),
            SysExEvent::Reverb(param) => self.apply_reverb(param),
        }
    }

    fn apply_chorus(&mut self, param: ChorusParam) {
        let param = match param {
            ChorusParam::Type(preset) => {
                debug!(?preset, "Chorus type");
                if let Err(e) = self.channels.set_chorus(preset.asset_name()) {
                    warn!("Chorus preset {:?} unavailable: {}", preset, e);
                }
                return;
            }
            ChorusParam::ModulationRate(hz) => EffectParam::ModulationRate(hz),
            ChorusParam::ModulationDepth(secs) => EffectParam::ModulationDepth(secs),
            ChorusParam::Feedback(level) => EffectParam::Feedback(level),
            ChorusParam::SendToReverb(level) => EffectParam::SendToReverb(level),
        };
        self.channels.set_chorus_param(param);
    }

    fn apply_reverb(&mut self, param: ReverbParam) {
        match param {
            ReverbParam::Type(preset) => {
                debug!(?preset, "Reverb type");
                if let Err(e) = self.channels.set_reverb(preset.asset_name()) {
                    warn!("Reverb preset {:?} unavailable: {}", preset, e);
                }
            }
            ReverbParam::DecayDepth(depth) => {
                self.channels.set_reverb_param(EffectParam::DecayDepth(depth))
            }
        }
    }

    fn registry(&mut self, group: GroupId) -> &mut ParameterRegistry {
        self.params.entry(group).or_default()
    }

    /// Parameter registry for a channel, if it has received any controller.
    pub fn parameters(&self, group: GroupId) -> Option<&ParameterRegistry> {
        self.params.get(&group)
    }

    pub fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelTable {
        &mut self.channels
    }

    pub fn channel(&self, group: GroupId) -> Option<&Channel> {
        self.channels.get(group)
    }

    pub fn mode(&self) -> DeviceMode {
        self.sysex.mode()
    }

    /// Pitch multiplier from the master fine and coarse tuning.
    pub fn device_tuning(&self) -> f32 {
        semitones_to_ratio(self.master_fine_tuning + self.master_coarse_tuning)
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn master_balance(&self) -> f32 {
        self.master_balance
    }

    pub fn is_omni(&self) -> bool {
        self.omni
    }

    pub fn finish(&mut self, group: GroupId) {
        self.channels.finish(group);
    }

    pub fn finished(&self, group: GroupId) -> bool {
        self.channels.finished(group)
    }

    /// Selects the port that subsequent channel numbers belong to.
    pub fn set_port(&mut self, port: u8) {
        self.port = port;
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    pub fn set_port_mask(&mut self, mask: u32) {
        self.port_mask = mask;
    }

    pub fn port_mask(&self) -> u32 {
        self.port_mask
    }

    pub fn is_port_active(&self, port: u8) -> bool {
        port < 32 && self.port_mask & (1 << port) != 0
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.channels.set_render_mode(mode);
    }

    pub fn render_mode(&self) -> RenderMode {
        self.channels.render_mode()
    }

    /// Tempo in microseconds per quarter note.
    pub fn set_tempo(&mut self, uspq: u32) {
        self.tempo_uspq = uspq;
        self.uspp = uspq / u32::from(self.ppqn.max(1));
    }

    pub fn tempo(&self) -> u32 {
        self.tempo_uspq
    }

    pub fn set_ppqn(&mut self, ppqn: u16) {
        self.ppqn = ppqn.max(1);
        self.set_tempo(self.tempo_uspq);
    }

    pub fn ppqn(&self) -> u16 {
        self.ppqn
    }

    /// Microseconds per pulse.
    pub fn uspp(&self) -> u32 {
        self.uspp
    }

    /// Returns to the power-on state: channels dropped, buffers released,
    /// framing reset, master gain and balance centered, timing back to the
    /// configured values.
    pub fn rewind(&mut self) {
        self.channels.clear();
        self.decoder.reset();
        self.sysex.reset();
        self.channels.set_mode(DeviceMode::Plain);
        self.params.clear();
        self.pending_banks.clear();
        self.omni = false;
        self.master_fine_tuning = 0.0;
        self.master_coarse_tuning = 0.0;
        if self.master_gain != 1.0 {
            self.master_gain = 1.0;
            self.mixer.set_master(MasterParam::Gain(1.0));
        }
        if self.master_balance != 0.0 {
            self.master_balance = 0.0;
            self.mixer.set_master(MasterParam::Rotation(0.0));
        }
        self.ppqn = self.configured_ppqn;
        self.set_tempo(self.configured_tempo_uspq);
    }
}

/// Looks up the channel, creating it lazily. Construction failures are logged.
fn with_channel(channels: &mut ChannelTable, group: GroupId) -> Option<&mut Channel> {
    match channels.channel(group) {
        Ok(channel) => Some(channel),
        Err(e) => {
            warn!("Channel {} unavailable: {}", group, e);
            None
        }
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("mode", &self.sysex.mode())
            .field("channels", &self.channels)
            .field("port", &self.port)
            .field("omni", &self.omni)
            .finish_non_exhaustive()
    }
}
