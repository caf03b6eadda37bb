//! Manufacturer System Exclusive interpretation (GM, GM2, GS, XG).
//!
//! [`SysExInterpreter::interpret`] takes one complete exclusive block and
//! returns the global changes it requests. Unknown manufacturers, sub-ids and
//! malformed global-parameter addresses yield no events.

use crate::consts::*;
use crate::device::DeviceMode;
use crate::effects::{ChorusPreset, ReverbPreset};
use crate::utils::{centered_14bit, centered_7bit, combine_14bit};
use smallvec::SmallVec;
use tracing::{info, trace};

// Universal sub-ids
const GENERAL_MIDI_SYSTEM: u8 = 0x09;
const GM_SYSTEM_ON: u8 = 0x01;
const GM_SYSTEM_OFF: u8 = 0x02;
const GM2_SYSTEM_ON: u8 = 0x03;

const DEVICE_CONTROL: u8 = 0x04;
const MASTER_VOLUME: u8 = 0x01;
const MASTER_BALANCE: u8 = 0x02;
const MASTER_FINE_TUNING: u8 = 0x03;
const MASTER_COARSE_TUNING: u8 = 0x04;
const GLOBAL_PARAMETER_CONTROL: u8 = 0x05;

// Global parameter slot paths
const SLOT_REVERB: [u8; 2] = [0x01, 0x01];
const SLOT_CHORUS: [u8; 2] = [0x01, 0x02];

// Roland GS
const GS_MODEL: u8 = 0x42;
const GS_DATA_SET: u8 = 0x12;
const GS_RESET: [u8; 3] = [0x40, 0x00, 0x7F];
const GS_USE_FOR_RHYTHM: u8 = 0x15;

// Yamaha XG system on, following the manufacturer id
const XG_MODEL: u8 = 0x4C;
const XG_SYSTEM_ON: [u8; 4] = [0x00, 0x00, 0x7E, 0x00];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChorusParam {
    Type(ChorusPreset),
    /// Hz.
    ModulationRate(f32),
    /// Seconds.
    ModulationDepth(f32),
    Feedback(f32),
    SendToReverb(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReverbParam {
    Type(ReverbPreset),
    DecayDepth(f32),
}

/// Global change requested by an exclusive message.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SysExEvent {
    /// Stop every sounding voice; emitted before a GM system-on mode change.
    SilenceAll,
    DeviceMode(DeviceMode),
    DrumPart { channel: u8, drums: bool },
    MasterVolume(f32),
    MasterBalance(f32),
    MasterFineTuning(f32),
    MasterCoarseTuning(f32),
    Chorus(ChorusParam),
    Reverb(ReverbParam),
}

pub type SysExEvents = SmallVec<[SysExEvent; 2]>;

#[derive(Debug, Clone, Default)]
pub struct SysExInterpreter {
    mode: DeviceMode,
}

impl SysExInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Raises the device mode; requests for an equal or lower mode are ignored.
    pub fn escalate(&mut self, mode: DeviceMode) -> Option<SysExEvent> {
        if mode <= self.mode {
            trace!(current = %self.mode, requested = %mode, "Device mode downgrade ignored");
            return None;
        }
        info!("Device mode: {}", mode);
        self.mode = mode;
        Some(SysExEvent::DeviceMode(mode))
    }

    pub fn reset(&mut self) {
        self.mode = DeviceMode::Plain;
    }

    /// Interprets one exclusive block. The 0xF0/0xF7 framing bytes are optional.
    pub fn interpret(&mut self, message: &[u8]) -> SysExEvents {
        let mut payload = message;
        if let [EXCLUSIVE_START, rest @ ..] = payload {
            payload = rest;
        }
        if let [rest @ .., EXCLUSIVE_END] = payload {
            payload = rest;
        }

        let mut events = SysExEvents::new();
        let Some((&manufacturer, body)) = payload.split_first() else {
            return events;
        };

        match manufacturer {
            ROLAND => self.roland(body, &mut events),
            YAMAHA => self.yamaha(body, &mut events),
            UNIVERSAL_NON_REALTIME => self.non_realtime(body, &mut events),
            UNIVERSAL_REALTIME => self.realtime(body, &mut events),
            other => trace!(manufacturer = other, "Unsupported exclusive manufacturer"),
        }
        events
    }

    /// `dev model cmd a1 a2 a3 data.. checksum`
    fn roland(&mut self, body: &[u8], events: &mut SysExEvents) {
        let [_device, GS_MODEL, GS_DATA_SET, address @ .., checksum] = body else {
            trace!("Unsupported Roland message");
            return;
        };
        if address.len() < 4 {
            return;
        }

        let sum: u32 = address.iter().map(|&b| u32::from(b)).sum::<u32>() + u32::from(*checksum);
        if sum % 128 != 0 {
            trace!(checksum, "Roland checksum mismatch");
            return;
        }

        let (addr, data) = address.split_at(3);
        match addr {
            a if a == GS_RESET => {
                if data[0] == 0x00 {
                    events.extend(self.escalate(DeviceMode::GeneralStandard));
                }
            }
            [0x40, part @ (0x19 | 0x1A), GS_USE_FOR_RHYTHM] => {
                let channel = if *part == 0x19 { DRUMS_CHANNEL } else { 11 };
                events.push(SysExEvent::DrumPart {
                    channel,
                    drums: data[0] != 0,
                });
            }
            _ => trace!(address = ?addr, "Unsupported GS parameter"),
        }
    }

    /// `1n 4C a1 a2 a3 data`
    fn yamaha(&mut self, body: &[u8], events: &mut SysExEvents) {
        match body {
            [device, XG_MODEL, rest @ ..] if device & 0xF0 == 0x10 && rest == XG_SYSTEM_ON => {
                events.extend(self.escalate(DeviceMode::ExtendedGeneralMidi));
            }
            _ => trace!("Unsupported Yamaha message"),
        }
    }

    fn non_realtime(&mut self, body: &[u8], events: &mut SysExEvents) {
        match body {
            [_device, GENERAL_MIDI_SYSTEM, GM_SYSTEM_ON, ..] => {
                events.push(SysExEvent::SilenceAll);
                events.extend(self.escalate(DeviceMode::GeneralMidi1));
            }
            [_device, GENERAL_MIDI_SYSTEM, GM_SYSTEM_OFF, ..] => {}
            [_device, GENERAL_MIDI_SYSTEM, GM2_SYSTEM_ON, ..] => {
                events.push(SysExEvent::SilenceAll);
                events.extend(self.escalate(DeviceMode::GeneralMidi2));
            }
            _ => trace!("Unsupported non-realtime message"),
        }
    }

    fn realtime(&mut self, body: &[u8], events: &mut SysExEvents) {
        let [_device, DEVICE_CONTROL, sub_id, data @ ..] = body else {
            trace!("Unsupported realtime message");
            return;
        };

        match (*sub_id, data) {
            (MASTER_VOLUME, [_lsb, msb, ..]) => {
                events.push(SysExEvent::MasterVolume(f32::from(*msb) / 127.0));
            }
            (MASTER_BALANCE, [_lsb, msb, ..]) => {
                events.push(SysExEvent::MasterBalance((f32::from(*msb) - 64.0) / 64.0));
            }
            (MASTER_FINE_TUNING, [lsb, msb, ..]) => {
                let value = centered_14bit(combine_14bit(*msb, *lsb));
                events.push(SysExEvent::MasterFineTuning(value));
            }
            (MASTER_COARSE_TUNING, [_lsb, msb, ..]) => {
                events.push(SysExEvent::MasterCoarseTuning(centered_7bit(*msb)));
            }
            (GLOBAL_PARAMETER_CONTROL, data) => global_parameter(data, events),
            _ => trace!(sub_id, "Unsupported device control message"),
        }
    }
}

/// `sw pw vw slot[sw*2] (param[pw] value[vw])*`
fn global_parameter(data: &[u8], events: &mut SysExEvents) {
    let [slot_width, param_width, value_width, rest @ ..] = data else {
        return;
    };
    let slot_len = usize::from(*slot_width) * 2;
    let (pw, vw) = (usize::from(*param_width), usize::from(*value_width));
    if rest.len() < slot_len || pw == 0 || vw == 0 {
        trace!("Malformed global parameter header");
        return;
    }

    let (slot, pairs) = rest.split_at(slot_len);
    for pair in pairs.chunks_exact(pw + vw) {
        // Only the least significant parameter/value bytes carry meaning here.
        let param = pair[pw - 1];
        let value = pair[pw + vw - 1];
        let event = match slot {
            s if s == SLOT_CHORUS => chorus_param(param, value).map(SysExEvent::Chorus),
            s if s == SLOT_REVERB => reverb_param(param, value).map(SysExEvent::Reverb),
            _ => None,
        };
        match event {
            Some(event) => events.push(event),
            None => trace!(?slot, param, value, "Unsupported global parameter"),
        }
    }
}

fn chorus_param(param: u8, value: u8) -> Option<ChorusParam> {
    let v = f32::from(value);
    match param {
        0 => ChorusPreset::try_from(value).ok().map(ChorusParam::Type),
        1 => Some(ChorusParam::ModulationRate(0.122 * v)),
        2 => Some(ChorusParam::ModulationDepth(1e-3 * (v + 1.0) / 3.2)),
        3 => Some(ChorusParam::Feedback(0.763 * v)),
        4 => Some(ChorusParam::SendToReverb(0.787 * v)),
        _ => None,
    }
}

fn reverb_param(param: u8, value: u8) -> Option<ReverbParam> {
    match param {
        0 => ReverbPreset::try_from(value).ok().map(ReverbParam::Type),
        1 => Some(ReverbParam::DecayDepth(
            ((f32::from(value) - 40.0) * 0.025).exp(),
        )),
        _ => None,
    }
}
