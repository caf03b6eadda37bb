//! Recording mixer and in-memory loader for tests.
//!
//! Built for the unit tests and, with the `testing` feature, for downstream
//! integration tests.

use crate::cache::{AssetLoader, BufferInfo};
use crate::error::{Error, Result};
use crate::mixer::*;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Register(GroupId, VoiceGroup),
    Deregister(GroupId),
    Play(GroupId, NoteOn),
    Stop(GroupId, u8),
    StopAll(GroupId),
    Finish(GroupId),
    Param(GroupId, ChannelParam),
    Master(MasterParam),
    AttachReverb(GroupId),
    DetachReverb(GroupId),
    EffectSend(GroupId, EffectSlot, String),
    EffectParam(EffectSlot, EffectParam),
    RenderMode(BufferId, RenderMode),
}

#[derive(Default)]
pub struct RecordingMixer {
    pub calls: Mutex<Vec<Call>>,
    pub reject_register: Mutex<bool>,
}

impl RecordingMixer {
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn plays(&self) -> Vec<(GroupId, NoteOn)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Play(group, note) => Some((*group, *note)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl Mixer for RecordingMixer {
    fn register(&self, group: GroupId, voices: &VoiceGroup) -> Result<()> {
        if *self.reject_register.lock() {
            return Err(Error::Mixer("no free voice groups".to_string()));
        }
        self.record(Call::Register(group, *voices));
        Ok(())
    }

    fn deregister(&self, group: GroupId) {
        self.record(Call::Deregister(group));
    }

    fn play(&self, group: GroupId, note: &NoteOn) {
        self.record(Call::Play(group, *note));
    }

    fn stop(&self, group: GroupId, key: u8) {
        self.record(Call::Stop(group, key));
    }

    fn stop_all(&self, group: GroupId) {
        self.record(Call::StopAll(group));
    }

    fn finish(&self, group: GroupId) {
        self.record(Call::Finish(group));
    }

    fn finished(&self, group: GroupId) -> bool {
        self.calls.lock().contains(&Call::Finish(group))
    }

    fn set_param(&self, group: GroupId, param: ChannelParam) {
        self.record(Call::Param(group, param));
    }

    fn set_master(&self, param: MasterParam) {
        self.record(Call::Master(param));
    }

    fn attach_reverb(&self, group: GroupId) {
        self.record(Call::AttachReverb(group));
    }

    fn detach_reverb(&self, group: GroupId) {
        self.record(Call::DetachReverb(group));
    }

    fn set_effect_send(&self, group: GroupId, slot: EffectSlot, effect: &EffectAsset) {
        self.record(Call::EffectSend(group, slot, effect.name.clone()));
    }

    fn set_effect_param(&self, slot: EffectSlot, param: EffectParam) {
        self.record(Call::EffectParam(slot, param));
    }

    fn set_render_mode(&self, buffer: BufferId, mode: RenderMode) {
        self.record(Call::RenderMode(buffer, mode));
    }
}

/// Hands out a stable id per cache key. Names starting with "missing" fail to load.
#[derive(Default)]
pub struct MemoryLoader {
    ids: Mutex<HashMap<String, u32>>,
    pub loaded: Mutex<Vec<String>>,
    pub unloaded: Mutex<Vec<BufferId>>,
}

impl MemoryLoader {
    fn id_for(&self, key: String) -> BufferId {
        let mut ids = self.ids.lock();
        let next = ids.len() as u32 + 1;
        BufferId(*ids.entry(key).or_insert(next))
    }
}

fn not_found(name: &str) -> Result<()> {
    if name.starts_with("missing") {
        return Err(Error::AssetLoad {
            name: name.to_string(),
            reason: "not found".to_string(),
        });
    }
    Ok(())
}

impl AssetLoader for MemoryLoader {
    fn load(&self, name: &str, level: u8) -> Result<BufferInfo> {
        not_found(name)?;
        let key = crate::cache::cache_key(name, level);
        self.loaded.lock().push(key.clone());
        Ok(BufferInfo {
            id: self.id_for(key),
            ..Default::default()
        })
    }

    fn unload(&self, buffer: &BufferInfo) {
        self.unloaded.lock().push(buffer.id);
    }

    fn load_effect(&self, name: &str) -> Result<EffectAsset> {
        not_found(name)?;
        Ok(EffectAsset {
            name: name.to_string(),
            id: self.id_for(name.to_string()),
        })
    }
}
