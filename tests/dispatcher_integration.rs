//! End-to-end dispatch tests: bytes in, mixer calls out.
//!
//! Run with:
//! ```bash
//! cargo test -p canto --test dispatcher_integration
//! ```

mod helpers;

use approx::assert_relative_eq;
use canto::prelude::*;
use canto::synth::bank::{BankEntry, DrumKeyEntry, DrumKitEntry, ProgramEntry};
use canto::synth::MasterParam;
use helpers::{fixture, Call};
use midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};

fn note_on(channel: Channel, note: u8, velocity: u8) -> Vec<u8> {
    MidiMsg::ChannelVoice {
        channel,
        msg: ChannelVoiceMsg::NoteOn { note, velocity },
    }
    .to_midi()
}

#[test]
fn test_unseen_channels_have_defaults() {
    let mut f = fixture();
    for n in 0..16u16 {
        let channel = f.dispatcher.channels_mut().channel(n).unwrap();
        assert_eq!(channel.bank(), 0, "channel {n}");
        assert_eq!(channel.program(), 0, "channel {n}");
        assert_eq!(channel.is_drums(), n == 9, "channel {n}");
    }
}

#[test]
fn test_note_on_is_transposed_by_coarse_tuning_register() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xC0, 0x00, 0x90, 60, 100]);

    let plays = f.mixer.plays();
    assert_eq!(plays.len(), 1);
    let (group, note) = plays[0];
    assert_eq!(group, 0);
    assert_eq!(note.key, 30);
    assert_relative_eq!(note.velocity, 100.0 / 127.0);
    assert_relative_eq!(note.pitch, 1.0);
}

#[test]
fn test_drum_keys_are_not_transposed() {
    let mut f = fixture();
    f.dispatcher.push_all(&note_on(Channel::Ch10, 42, 90));

    let plays = f.mixer.plays();
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].0, 9);
    assert_eq!(plays[0].1.key, 42);
}

#[test]
fn test_running_status_and_realtime_interleaving() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x90, 60, 0xF8, 100, 62, 100, 0xFE, 64, 100]);
    let keys: Vec<u8> = f.mixer.plays().iter().map(|(_, n)| n.key).collect();
    assert_eq!(keys, vec![30, 32, 34]);
}

#[test]
fn test_note_off_stops_remapped_key() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x90, 60, 100, 0x80, 60, 0]);
    assert_eq!(f.mixer.count(|c| *c == Call::Stop(0, 30)), 1);

    // Velocity 0 Note-On counts as Note-Off.
    f.dispatcher.push_all(&[0x90, 62, 100, 62, 0]);
    assert_eq!(f.mixer.count(|c| *c == Call::Stop(0, 32)), 1);
}

#[test]
fn test_bank_select_accumulates_before_program_change() {
    let mut f = fixture();
    // Bank MSB 1, LSB 5 => bank 0x85, which falls back to 0x80.
    f.dispatcher.push_all(&[0xB0, 0x00, 0x01, 0xB0, 0x20, 0x05, 0xC0, 0x00]);
    assert_eq!(f.dispatcher.channel(0).unwrap().bank(), 0x85);

    f.dispatcher.push_all(&[0x90, 60, 100]);
    assert!(f
        .loader
        .loaded
        .lock()
        .contains(&"piano-variation".to_string()));
}

#[test]
fn test_bank_fallback_to_zero() {
    let mut f = fixture();
    f.dispatcher
        .push_all(&[0xB1, 0x00, 0x02, 0xB1, 0x20, 0x00, 0xC1, 0x00, 0x91, 60, 100]);
    assert_eq!(f.loader.loaded.lock().as_slice(), &["piano".to_string()]);
}

#[test]
fn test_reserved_bank_marks_drums_at_next_program_change() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x93, 60, 100]);
    f.dispatcher.push_all(&[0xB3, 0x00, 0x78]);
    assert!(!f.dispatcher.channel(3).unwrap().is_drums());

    f.dispatcher.push_all(&[0xC3, 0x00]);
    assert!(f.dispatcher.channel(3).unwrap().is_drums());

    f.dispatcher.push_all(&[0xB3, 0x00, 0x79, 0xC3, 0x00]);
    assert!(!f.dispatcher.channel(3).unwrap().is_drums());
}

#[test]
fn test_program_change_releases_previous_buffers() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xC0, 0x00, 0x90, 60, 100]);
    assert_eq!(f.dispatcher.channels().cache().refcount("piano", 0), Some(1));

    f.dispatcher.push_all(&[0xC0, 48]);
    assert_eq!(f.dispatcher.channels().cache().refcount("piano", 0), None);
    assert_eq!(f.loader.unloaded.lock().len(), 1);
    assert!(f.mixer.calls().contains(&Call::Deregister(0)));
}

#[test]
fn test_unresolvable_note_is_dropped() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xC0, 0x05, 0x90, 60, 100]);
    assert!(f.mixer.plays().is_empty());
}

#[test]
fn test_negative_remapped_key_is_dropped() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x90, 10, 100]);
    assert!(f.mixer.plays().is_empty());
}

#[test]
fn test_hihat_choke() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x99, 46, 100]);
    f.mixer.take();
    f.dispatcher.push_all(&[0x99, 42, 100]);
    let calls = f.mixer.take();
    let stop = calls.iter().position(|c| *c == Call::Stop(9, 46));
    let play = calls.iter().position(|c| matches!(c, Call::Play(9, _)));
    assert!(stop.is_some() && stop < play);
}

#[test]
fn test_rpn_pitch_bend_range_scales_bend() {
    let mut f = fixture();
    f.dispatcher
        .push_all(&[0xB0, 0x65, 0x00, 0xB0, 0x64, 0x00, 0xB0, 0x06, 12]);
    assert_relative_eq!(f.dispatcher.channel(0).unwrap().pitch_bend_range(), 12.0);

    f.mixer.take();
    f.dispatcher.push_all(&[0xE0, 0x7F, 0x7F]);
    match f.mixer.take().as_slice() {
        [Call::Param(0, ChannelParam::PitchBend(ratio))] => assert_relative_eq!(*ratio, 2.0),
        other => panic!("unexpected calls {other:?}"),
    }
}

#[test]
fn test_rpn_increment_carries_into_range() {
    let mut f = fixture();
    f.dispatcher.push_all(&[
        0xB0, 0x65, 0x00, 0xB0, 0x64, 0x00, // pitch bend sensitivity
        0xB0, 0x06, 3, 0xB0, 0x26, 127, 0xB0, 0x60, 0x00,
    ]);
    let param = f.dispatcher.parameters(0).unwrap().registered_param(0);
    assert_eq!((param.coarse, param.fine), (4, 0));
    assert_relative_eq!(f.dispatcher.channel(0).unwrap().pitch_bend_range(), 4.0);

    f.dispatcher.push_all(&[0xB0, 0x61, 0x00]);
    let param = f.dispatcher.parameters(0).unwrap().registered_param(0);
    assert_eq!((param.coarse, param.fine), (3, 127));
}

#[test]
fn test_coarse_tuning_rpn_changes_key_and_tuning() {
    let mut f = fixture();
    f.dispatcher
        .push_all(&[0xB0, 0x65, 0x00, 0xB0, 0x64, 0x02, 0xB0, 0x06, 0x20]);
    f.dispatcher.push_all(&[0x90, 60, 100]);

    let plays = f.mixer.plays();
    assert_eq!(plays[0].1.key, 60);
    assert_relative_eq!(plays[0].1.pitch, 2.0_f32.powf(-0.5 / 12.0), epsilon = 1e-6);
}

#[test]
fn test_nrpn_data_entry_has_no_side_effect() {
    let mut f = fixture();
    f.dispatcher
        .push_all(&[0xB0, 0x63, 0x00, 0xB0, 0x62, 0x00, 0xB0, 0x06, 24]);
    assert_relative_eq!(f.dispatcher.channel(0).unwrap().pitch_bend_range(), 2.0);
}

#[test]
fn test_reverb_send_moves_channel_between_buses() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xB2, 0x5B, 0x00]);
    assert_eq!(f.mixer.count(|c| matches!(c, Call::DetachReverb(_))), 0);

    f.dispatcher.push_all(&[0xB2, 0x5B, 40, 0xB2, 0x5B, 90]);
    assert_eq!(f.mixer.count(|c| *c == Call::AttachReverb(2)), 1);
    assert!(f.dispatcher.channels().is_on_reverb_bus(2));

    f.dispatcher.push_all(&[0xB2, 0x5B, 0x00]);
    assert_eq!(f.mixer.count(|c| *c == Call::DetachReverb(2)), 1);
    assert!(!f.dispatcher.channels().is_on_reverb_bus(2));
}

#[test]
fn test_reverb_attached_after_channel_registered() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xB2, 0x5B, 40]);
    let calls = f.mixer.calls();
    let register = calls.iter().position(|c| matches!(c, Call::Register(2, _)));
    let attach = calls.iter().position(|c| *c == Call::AttachReverb(2));
    assert!(register.is_some());
    assert!(register < attach);
}

#[test]
fn test_program_change_drops_reverb_membership() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xB2, 0x5B, 40, 0xC2, 0x00]);
    assert!(!f.dispatcher.channels().is_on_reverb_bus(2));
    assert_relative_eq!(f.dispatcher.channel(2).unwrap().reverb_level(), 0.0);
    assert!(f.mixer.calls().contains(&Call::Deregister(2)));
}

#[test]
fn test_controllers_forwarded() {
    let mut f = fixture();
    f.dispatcher
        .push_all(&[0xB0, 0x07, 127, 0xB0, 0x0A, 0x00, 0xB0, 0x40, 0x7F, 0xB0, 0x4A, 0x40]);
    let channel = f.dispatcher.channel(0).unwrap();
    assert_relative_eq!(channel.gain(), 1.0);
    assert_relative_eq!(channel.pan(), -1.0);
    assert!(channel.hold());

    let calls = f.mixer.calls();
    assert!(calls.contains(&Call::Param(0, ChannelParam::FilterCutoff(64.0 / 127.0))));
}

#[test]
fn test_unknown_controller_ignored() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xB0, 0x03, 0x10]);
    assert_eq!(f.mixer.count(|c| matches!(c, Call::Param(..))), 0);
}

#[test]
fn test_all_controllers_off_resets_and_stops() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xB0, 0x0B, 0x10, 0x90, 60, 100]);
    f.mixer.take();
    f.dispatcher.push_all(&[0xB0, 0x79, 0x00]);

    let calls = f.mixer.take();
    assert!(calls.contains(&Call::Param(0, ChannelParam::Expression(1.0))));
    assert_eq!(calls.last(), Some(&Call::StopAll(0)));
    assert!(f.dispatcher.channel(0).unwrap().sounding().is_empty());
}

#[test]
fn test_notes_off_group_shares_handler() {
    for cc in [0x78, 0x7B, 0x7C, 0x7D, 0x7E, 0x7F] {
        let mut f = fixture();
        f.dispatcher.push_all(&[0x90, 60, 100]);
        f.mixer.take();
        f.dispatcher.push_all(&[0xB0, cc, 0x00]);
        assert!(
            f.mixer.calls().contains(&Call::StopAll(0)),
            "controller {cc:#x}"
        );
    }
}

#[test]
fn test_omni_routes_to_all_channels() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x90, 60, 100, 0x91, 60, 100]);
    f.dispatcher.push_all(&[0xB0, 0x7D, 0x00]);
    assert!(f.dispatcher.is_omni());

    f.mixer.take();
    f.dispatcher.push_all(&[0x90, 64, 100]);
    let groups: Vec<GroupId> = f.mixer.plays().iter().map(|(g, _)| *g).collect();
    assert_eq!(groups, vec![0, 1]);

    f.dispatcher.push_all(&[0xB0, 0x7C, 0x00]);
    assert!(!f.dispatcher.is_omni());
}

#[test]
fn test_mono_mode_stops_before_new_note() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0xB0, 0x7E, 0x01]);
    assert!(f.dispatcher.channel(0).unwrap().is_mono());

    f.dispatcher.push_all(&[0x90, 60, 100]);
    f.mixer.take();
    f.dispatcher.push_all(&[0x90, 62, 100]);
    assert_eq!(f.mixer.take().first(), Some(&Call::StopAll(0)));

    f.dispatcher.push_all(&[0xB0, 0x7F, 0x00]);
    assert!(!f.dispatcher.channel(0).unwrap().is_mono());
}

#[test]
fn test_channel_pressure_needs_routing() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x90, 60, 100]);
    f.mixer.take();
    // The piano buffer carries no pressure routing.
    f.dispatcher.push_all(&[0xD0, 127]);
    assert!(f.mixer.take().is_empty());
}

#[test]
fn test_finish_is_idempotent() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x90, 60, 100]);
    assert!(!f.dispatcher.finished(0));
    f.dispatcher.finish(0);
    f.dispatcher.finish(0);
    assert_eq!(f.mixer.count(|c| *c == Call::Finish(0)), 1);
    assert!(f.dispatcher.finished(0));
}

#[test]
fn test_ports_replicate_channels() {
    let mut f = fixture();
    f.dispatcher.set_port(1);
    f.dispatcher.push_all(&[0x90, 60, 100]);
    assert_eq!(f.mixer.plays()[0].0, 0x10);
    assert!(f.dispatcher.channel(0x10).is_some());
    assert!(f.dispatcher.channel(0).is_none());
}

#[test]
fn test_tempo_plumbing() {
    let mut f = fixture();
    assert_eq!(f.dispatcher.ppqn(), 24);
    assert_eq!(f.dispatcher.uspp(), 500_000 / 24);
    f.dispatcher.set_tempo(600_000);
    assert_eq!(f.dispatcher.uspp(), 25_000);
    f.dispatcher.set_ppqn(480);
    assert_eq!(f.dispatcher.uspp(), 1_250);
}

#[test]
fn test_rewind_restores_power_on_state() {
    let mut f = fixture();
    f.dispatcher.push_all(&[0x90, 60, 100, 0x99, 36, 100, 0x91, 60]);
    f.dispatcher.set_tempo(250_000);
    f.dispatcher.rewind();

    assert!(f.dispatcher.channels().is_empty());
    assert!(f.dispatcher.channels().cache().is_empty());
    assert_eq!(f.dispatcher.tempo(), 500_000);

    // The dangling partial message was discarded with the decoder buffer.
    f.dispatcher.push_all(&[100]);
    assert_eq!(f.mixer.plays().len(), 2);
}

#[test]
fn test_rewind_keeps_configured_timing_and_centers_master() {
    helpers::init_tracing();
    let mixer = std::sync::Arc::new(helpers::RecordingMixer::default());
    let loader = std::sync::Arc::new(helpers::MemoryLoader::default());
    let mut dispatcher = MessageDispatcher::builder()
        .config(DispatcherConfig {
            ppqn: 96,
            tempo_uspq: 600_000,
            ..Default::default()
        })
        .bank_index(helpers::gm_banks())
        .build(mixer.clone(), loader)
        .unwrap();

    dispatcher.set_ppqn(480);
    dispatcher.set_tempo(250_000);
    // Master volume at half, balance hard left.
    dispatcher.push_all(&[0xF0, 0x7F, 0x7F, 0x04, 0x01, 0x00, 0x40, 0xF7]);
    dispatcher.push_all(&[0xF0, 0x7F, 0x7F, 0x04, 0x02, 0x00, 0x00, 0xF7]);
    assert!(dispatcher.master_gain() < 1.0);
    mixer.take();

    dispatcher.rewind();
    assert_eq!(dispatcher.ppqn(), 96);
    assert_eq!(dispatcher.tempo(), 600_000);
    assert_relative_eq!(dispatcher.master_gain(), 1.0);
    assert_relative_eq!(dispatcher.master_balance(), 0.0);
    let calls = mixer.calls();
    assert!(calls.contains(&Call::Master(MasterParam::Gain(1.0))));
    assert!(calls.contains(&Call::Master(MasterParam::Rotation(0.0))));
}

#[test]
fn test_builder_loads_bank_files() {
    helpers::init_tracing();
    let dir = std::env::temp_dir().join(format!("canto-banks-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let instruments = BankConfig {
        banks: vec![BankEntry {
            bank: 0,
            programs: vec![ProgramEntry {
                program: 0,
                file: "grand".to_string(),
                wide: true,
            }],
            drum_effect: None,
        }],
        ..Default::default()
    };
    let drums = BankConfig {
        drums: vec![DrumKitEntry {
            program: 0,
            keys: vec![DrumKeyEntry {
                key: 36,
                file: "kick".to_string(),
                layer: 0,
            }],
        }],
        ..Default::default()
    };
    std::fs::write(dir.join("gmmidi.json"), instruments.to_json_string().unwrap()).unwrap();
    std::fs::write(dir.join("gmdrums.json"), drums.to_json_string().unwrap()).unwrap();

    let mixer = std::sync::Arc::new(helpers::RecordingMixer::default());
    let loader = std::sync::Arc::new(helpers::MemoryLoader::default());
    let mut dispatcher = MessageDispatcher::builder()
        .config(DispatcherConfig {
            data_path: dir.clone(),
            ..Default::default()
        })
        .load_banks()
        .build(mixer.clone(), loader.clone())
        .unwrap();

    dispatcher.push_all(&[0x90, 60, 100, 0x99, 36, 100]);
    assert_eq!(mixer.plays().len(), 2);
    assert!(dispatcher.channel(0).unwrap().is_wide());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_builder_rejects_invalid_config() {
    let mixer = std::sync::Arc::new(helpers::RecordingMixer::default());
    let loader = std::sync::Arc::new(helpers::MemoryLoader::default());
    let result = MessageDispatcher::builder()
        .config(DispatcherConfig {
            drum_channel: 20,
            ..Default::default()
        })
        .build(mixer, loader);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_builder_missing_bank_files() {
    let mixer = std::sync::Arc::new(helpers::RecordingMixer::default());
    let loader = std::sync::Arc::new(helpers::MemoryLoader::default());
    let result = MessageDispatcher::builder()
        .config(DispatcherConfig {
            data_path: "/nonexistent/canto".into(),
            ..Default::default()
        })
        .load_banks()
        .build(mixer, loader);
    // File errors come from bank loading, wrapped by the synth layer.
    assert!(matches!(
        result,
        Err(Error::Synth(canto::synth::Error::Io(_)))
    ));
}
