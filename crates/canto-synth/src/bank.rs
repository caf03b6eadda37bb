//! Instrument, drum-kit and patch-layer lookup tables.
//!
//! The tables are built once from a [`BankConfig`] and never change while
//! channels are playing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::path::Path;
use tracing::{debug, warn};

/// Threshold reported by [`InstrumentBankIndex::get_patch`] for unlayered instruments.
pub const NO_PATCH: u8 = 255;

const MAX_BANK: u16 = 0x3FFF;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instrument {
    pub file: String,
    /// Stereo-width flag.
    pub wide: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrumSample {
    pub file: String,
    pub layer: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchLayer {
    pub layer: u8,
    pub file: String,
}

/// Layer chosen for a key or velocity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Patch<'a> {
    /// Exclusive ceiling of the zone, [`NO_PATCH`] when the instrument is not layered.
    pub threshold: u8,
    /// Inclusive floor of the zone.
    pub floor: u8,
    pub layer: Option<&'a PatchLayer>,
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentBankIndex {
    banks: BTreeMap<u16, BTreeMap<u8, Instrument>>,
    /// Keyed by `program << 7`.
    drums: BTreeMap<u16, BTreeMap<u8, DrumSample>>,
    patches: HashMap<String, BTreeMap<u8, PatchLayer>>,
    drum_effects: BTreeMap<u16, String>,
}

impl InstrumentBankIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &BankConfig) -> Result<Self> {
        let mut index = Self::new();
        index.merge(config)?;
        Ok(index)
    }

    /// Reads the instrument and drum descriptions from `dir`.
    pub fn load(dir: impl AsRef<Path>, instrument_file: &str, drum_file: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let mut index = Self::new();
        for file in [instrument_file, drum_file] {
            let path = dir.join(file);
            debug!("Loading bank description {}", path.display());
            index.merge(&BankConfig::from_path(&path)?)?;
        }
        Ok(index)
    }

    /// Adds every entry of `config`, replacing duplicates.
    pub fn merge(&mut self, config: &BankConfig) -> Result<()> {
        config.validate()?;

        for bank in &config.banks {
            let programs = self.banks.entry(bank.bank).or_default();
            for p in &bank.programs {
                programs.insert(
                    p.program,
                    Instrument {
                        file: p.file.clone(),
                        wide: p.wide,
                    },
                );
            }
            if let Some(effect) = &bank.drum_effect {
                self.drum_effects.insert(bank.bank, effect.clone());
            }
        }

        for kit in &config.drums {
            let keys = self.drums.entry(u16::from(kit.program) << 7).or_default();
            for k in &kit.keys {
                keys.insert(
                    k.key,
                    DrumSample {
                        file: k.file.clone(),
                        layer: k.layer,
                    },
                );
            }
        }

        for patch in &config.patches {
            let layers = self.patches.entry(patch.name.clone()).or_default();
            for l in &patch.layers {
                layers.insert(
                    l.threshold,
                    PatchLayer {
                        layer: l.layer,
                        file: l.file.clone(),
                    },
                );
            }
        }

        Ok(())
    }

    pub fn insert_instrument(&mut self, bank: u16, program: u8, instrument: Instrument) {
        self.banks.entry(bank).or_default().insert(program, instrument);
    }

    pub fn insert_drum(&mut self, program: u8, key: u8, sample: DrumSample) {
        self.drums
            .entry(u16::from(program) << 7)
            .or_default()
            .insert(key, sample);
    }

    pub fn insert_patch_layer(&mut self, name: &str, threshold: u8, layer: PatchLayer) {
        if threshold == NO_PATCH {
            warn!("Patch {} layer {}: threshold {} is reserved", name, layer.layer, NO_PATCH);
            return;
        }
        self.patches
            .entry(name.to_string())
            .or_default()
            .insert(threshold, layer);
    }

    pub fn set_drum_effect(&mut self, bank: u16, effect: &str) {
        self.drum_effects.insert(bank, effect.to_string());
    }

    /// Melodic lookup. A miss retries with the low 7 bank bits cleared, then
    /// with bank 0.
    pub fn get_instrument(&self, bank: u16, program: u8) -> Option<&Instrument> {
        let mut bank = bank;
        loop {
            if let Some(instrument) = self.banks.get(&bank).and_then(|b| b.get(&program)) {
                return Some(instrument);
            }
            if bank & 0x7F != 0 {
                bank &= !0x7F;
            } else if bank != 0 {
                bank = 0;
            } else {
                return None;
            }
        }
    }

    /// Drum lookup. A miss retries with the program rounded down to a multiple
    /// of 8, and a program that already is one collapses to kit 0.
    pub fn get_drum(&self, program: u8, key: u8) -> Option<&DrumSample> {
        let mut program = program;
        loop {
            if let Some(sample) = self
                .drums
                .get(&(u16::from(program) << 7))
                .and_then(|kit| kit.get(&key))
            {
                return Some(sample);
            }
            if program == 0 {
                return None;
            }
            program = if program % 8 != 0 { program & !7 } else { 0 };
        }
    }

    /// Selects the first layer whose threshold is strictly above `key`.
    pub fn get_patch(&self, name: &str, key: u8) -> Patch<'_> {
        let Some(layers) = self.patches.get(name) else {
            return Patch {
                threshold: NO_PATCH,
                floor: 0,
                layer: None,
            };
        };

        let floor = layers
            .range((Unbounded, Included(key)))
            .next_back()
            .map_or(0, |(&t, _)| t);
        match layers.range((Excluded(key), Unbounded)).next() {
            Some((&threshold, layer)) => Patch {
                threshold,
                floor,
                layer: Some(layer),
            },
            // Above the top layer: the plain instrument covers [floor, NO_PATCH).
            None => Patch {
                threshold: NO_PATCH,
                floor,
                layer: None,
            },
        }
    }

    pub fn get_drum_effect(&self, bank: u16) -> Option<&str> {
        self.drum_effects.get(&bank).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty() && self.drums.is_empty()
    }
}

/// Bank/program/drum/patch description, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConfig {
    #[serde(default)]
    pub banks: Vec<BankEntry>,
    #[serde(default)]
    pub drums: Vec<DrumKitEntry>,
    #[serde(default)]
    pub patches: Vec<PatchEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankEntry {
    pub bank: u16,
    #[serde(default)]
    pub programs: Vec<ProgramEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drum_effect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub program: u8,
    pub file: String,
    #[serde(default)]
    pub wide: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumKitEntry {
    pub program: u8,
    #[serde(default)]
    pub keys: Vec<DrumKeyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumKeyEntry {
    pub key: u8,
    pub file: String,
    #[serde(default)]
    pub layer: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub name: String,
    #[serde(default)]
    pub layers: Vec<PatchLayerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchLayerEntry {
    pub threshold: u8,
    pub layer: u8,
    pub file: String,
}

impl BankConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        for bank in &self.banks {
            if bank.bank > MAX_BANK {
                return Err(Error::InvalidConfig(format!(
                    "bank {} exceeds {MAX_BANK}",
                    bank.bank
                )));
            }
            if let Some(p) = bank.programs.iter().find(|p| p.program > 127) {
                return Err(Error::InvalidConfig(format!(
                    "bank {}: program {} out of range",
                    bank.bank, p.program
                )));
            }
            if let Some(p) = bank.programs.iter().find(|p| p.file.is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "bank {}: program {} has no file",
                    bank.bank, p.program
                )));
            }
        }

        for kit in &self.drums {
            if kit.program > 127 {
                return Err(Error::InvalidConfig(format!(
                    "drum kit {} out of range",
                    kit.program
                )));
            }
            if let Some(k) = kit.keys.iter().find(|k| k.key > 127) {
                return Err(Error::InvalidConfig(format!(
                    "drum kit {}: key {} out of range",
                    kit.program, k.key
                )));
            }
        }

        for patch in &self.patches {
            if patch.name.is_empty() {
                return Err(Error::InvalidConfig("patch without a name".to_string()));
            }
            if patch.layers.iter().any(|l| l.threshold == NO_PATCH) {
                return Err(Error::InvalidConfig(format!(
                    "patch {}: threshold {NO_PATCH} is reserved",
                    patch.name
                )));
            }
        }

        Ok(())
    }
}
