//! Test helpers and fixtures for Canto integration tests
//!
//! A recording mixer stands in for the audio engine and an in-memory loader
//! for the sample decoders, so every test runs without audio hardware.

#![allow(dead_code)]

use canto::prelude::*;
use canto::synth::{DrumSample, Instrument, PatchLayer};
use std::sync::Arc;

pub use canto::synth::testing::{Call, MemoryLoader, RecordingMixer};

/// GM-ish bank: piano and strings in bank 0, a variation piano in bank 0x80,
/// a standard kit with hi-hats and a kit filter.
pub fn gm_banks() -> InstrumentBankIndex {
    let mut banks = InstrumentBankIndex::new();
    banks.insert_instrument(0, 0, instrument("piano"));
    banks.insert_instrument(0, 48, instrument("strings"));
    banks.insert_instrument(0x80, 0, instrument("piano-variation"));
    for key in [35, 36, 38, 42, 44, 46] {
        banks.insert_drum(
            0,
            key,
            DrumSample {
                file: format!("standard/{key}"),
                layer: 0,
            },
        );
    }
    banks.insert_patch_layer(
        "strings",
        64,
        PatchLayer {
            layer: 1,
            file: "strings".to_string(),
        },
    );
    banks.insert_patch_layer(
        "strings",
        128,
        PatchLayer {
            layer: 2,
            file: "strings".to_string(),
        },
    );
    banks.set_drum_effect(0, "standard-kit-filter");
    banks
}

fn instrument(file: &str) -> Instrument {
    Instrument {
        file: file.to_string(),
        wide: false,
    }
}

pub struct Fixture {
    pub dispatcher: MessageDispatcher,
    pub mixer: Arc<RecordingMixer>,
    pub loader: Arc<MemoryLoader>,
}

pub fn fixture() -> Fixture {
    fixture_with(gm_banks())
}

pub fn fixture_with(banks: InstrumentBankIndex) -> Fixture {
    init_tracing();
    let mixer = Arc::new(RecordingMixer::default());
    let loader = Arc::new(MemoryLoader::default());
    let dispatcher = MessageDispatcher::builder()
        .bank_index(banks)
        .build(mixer.clone(), loader.clone())
        .expect("Failed to build test dispatcher");
    Fixture {
        dispatcher,
        mixer,
        loader,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
