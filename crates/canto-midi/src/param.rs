//! Registered and non-registered parameter (RPN/NRPN) state machine.
//!
//! The selector controllers pick a slot, Data Entry writes its coarse or
//! fine half, and Data Increment/Decrement step the fine half with carry into
//! coarse. Writes to one of the well-known registered parameters produce a
//! [`ParameterChange`] for the owner to apply to its channel.

use crate::consts::*;
use crate::utils::{centered_14bit, combine_14bit};
use std::collections::BTreeMap;
use tracing::trace;

/// Pitch-bend range restored by a parameter reset.
pub const DEFAULT_PITCH_BEND_RANGE: f32 = 2.0;

/// Coarse/fine 7-bit pair held by one parameter slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParamValue {
    pub coarse: u8,
    pub fine: u8,
}

impl ParamValue {
    pub const fn new(coarse: u8, fine: u8) -> Self {
        Self { coarse, fine }
    }

    /// `coarse + fine / 100`, used by the semitone-valued parameters.
    #[inline]
    pub fn semitones(&self) -> f32 {
        self.coarse as f32 + self.fine as f32 * 0.01
    }

    #[inline]
    pub fn centered(&self) -> f32 {
        centered_14bit(combine_14bit(self.coarse, self.fine))
    }
}

/// Side effect of a registered parameter write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterChange {
    /// Semitones.
    PitchBendRange(f32),
    /// Semitones.
    ModulationDepth(f32),
    /// Centered tuning in [-1.0, 1.0].
    Tuning(f32),
}

#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    msb_type: u8,
    lsb_type: u8,
    registered: bool,
    rpn: BTreeMap<u16, ParamValue>,
    nrpn: BTreeMap<u16, ParamValue>,
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterRegistry {
    pub fn new() -> Self {
        let rpn = BTreeMap::from([
            (PITCH_BEND_SENSITIVITY, ParamValue::new(2, 0)),
            (CHANNEL_FINE_TUNING, ParamValue::new(0x40, 0)),
            (CHANNEL_COARSE_TUNING, ParamValue::new(2, 0)),
            (TUNING_PROGRAM_CHANGE, ParamValue::new(0, 0)),
            (TUNING_BANK_SELECT, ParamValue::new(0, 0)),
            (MODULATION_DEPTH_RANGE, ParamValue::new(1, 0)),
        ]);

        Self {
            msb_type: 0,
            lsb_type: 0,
            registered: false,
            rpn,
            nrpn: BTreeMap::new(),
        }
    }

    /// Handles one of the four parameter-number controllers.
    ///
    /// Slot numbers above [`MAX_REGISTERED_PARAM`] are clamped to it, except
    /// 0x7F which keeps the reset selector (0x7F7F) addressable.
    pub fn select(&mut self, controller: u8, value: u8) {
        let value = match value & 0x7F {
            0x7F => 0x7F,
            v => v.min(MAX_REGISTERED_PARAM),
        };
        match controller {
            REGISTERED_PARAM_COARSE => {
                self.registered = true;
                self.msb_type = value;
            }
            REGISTERED_PARAM_FINE => {
                self.registered = true;
                self.lsb_type = value;
            }
            UNREGISTERED_PARAM_COARSE => {
                self.registered = false;
                self.msb_type = value;
            }
            UNREGISTERED_PARAM_FINE => {
                self.registered = false;
                self.lsb_type = value;
            }
            other => trace!(controller = other, "Not a parameter selector"),
        }
    }

    /// Composite selector of the current slot.
    #[inline]
    pub fn selector(&self) -> u16 {
        (u16::from(self.msb_type) << 8) | u16::from(self.lsb_type)
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Data Entry MSB (`fine == false`) or LSB write.
    pub fn data_entry(&mut self, fine: bool, value: u8) -> Option<ParameterChange> {
        let value = value & 0x7F;
        let slot = self.current_slot();
        if fine {
            slot.fine = value;
        } else {
            slot.coarse = value;
        }
        self.apply()
    }

    pub fn increment(&mut self) -> Option<ParameterChange> {
        let slot = self.current_slot();
        if slot.fine == 0x7F {
            slot.fine = 0;
            slot.coarse = (slot.coarse + 1).min(0x7F);
        } else {
            slot.fine += 1;
        }
        self.apply()
    }

    pub fn decrement(&mut self) -> Option<ParameterChange> {
        let slot = self.current_slot();
        if slot.fine == 0 {
            slot.fine = 0x7F;
            slot.coarse = slot.coarse.saturating_sub(1);
        } else {
            slot.fine -= 1;
        }
        self.apply()
    }

    pub fn registered_param(&self, selector: u16) -> ParamValue {
        self.rpn.get(&selector).copied().unwrap_or_default()
    }

    pub fn unregistered_param(&self, selector: u16) -> ParamValue {
        self.nrpn.get(&selector).copied().unwrap_or_default()
    }

    /// Coarse half of the channel coarse tuning parameter, used for key remapping.
    #[inline]
    pub fn coarse_tuning(&self) -> u8 {
        self.registered_param(CHANNEL_COARSE_TUNING).coarse
    }

    /// Restores the power-on values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn current_slot(&mut self) -> &mut ParamValue {
        let selector = self.selector();
        let table = if self.registered {
            &mut self.rpn
        } else {
            &mut self.nrpn
        };
        table.entry(selector).or_default()
    }

    fn apply(&self) -> Option<ParameterChange> {
        if !self.registered {
            return None;
        }

        let selector = self.selector();
        let value = self.registered_param(selector);
        match selector {
            PITCH_BEND_SENSITIVITY => Some(ParameterChange::PitchBendRange(value.semitones())),
            MODULATION_DEPTH_RANGE => Some(ParameterChange::ModulationDepth(value.semitones())),
            PARAMETER_RESET => Some(ParameterChange::PitchBendRange(DEFAULT_PITCH_BEND_RANGE)),
            CHANNEL_FINE_TUNING | CHANNEL_COARSE_TUNING => {
                Some(ParameterChange::Tuning(value.centered()))
            }
            TUNING_PROGRAM_CHANGE | TUNING_BANK_SELECT => {
                trace!(selector, "Tuning program/bank select ignored");
                None
            }
            _ => None,
        }
    }
}
