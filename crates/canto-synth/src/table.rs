//! Active channels, keyed by voice group.
//!
//! The table owns the buffer cache and the shared mixer handle, so every
//! channel operation that touches sample lifetimes goes through here.

use crate::bank::InstrumentBankIndex;
use crate::cache::{BufferCache, BufferInfo, SharedLoader};
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::mixer::{
    ChannelParam, EffectAsset, EffectParam, EffectSlot, GroupId, Mixer, RenderMode, VoiceGroup,
};
use canto_midi::consts::DRUMS_CHANNEL;
use canto_midi::DeviceMode;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub type SharedMixer = Arc<dyn Mixer + Send + Sync>;

pub struct ChannelTable {
    mixer: SharedMixer,
    cache: BufferCache,
    banks: Arc<InstrumentBankIndex>,
    channels: BTreeMap<GroupId, Channel>,
    /// Explicit drum/melodic classification, applied at the next program change.
    drum_marks: HashMap<GroupId, bool>,
    reverb_bus: BTreeSet<GroupId>,
    drum_channel: u8,
    render_mode: RenderMode,
    mode: DeviceMode,
    chorus: Option<EffectAsset>,
    reverb: Option<EffectAsset>,
}

impl ChannelTable {
    pub fn new(mixer: SharedMixer, loader: SharedLoader, banks: Arc<InstrumentBankIndex>) -> Self {
        Self {
            mixer,
            cache: BufferCache::new(loader),
            banks,
            channels: BTreeMap::new(),
            drum_marks: HashMap::new(),
            reverb_bus: BTreeSet::new(),
            drum_channel: DRUMS_CHANNEL,
            render_mode: RenderMode::default(),
            mode: DeviceMode::Plain,
            chorus: None,
            reverb: None,
        }
    }

    /// Changes the channel number that is always classified as drums.
    pub fn set_drum_channel(&mut self, channel: u8) -> Result<()> {
        if channel > 15 {
            return Err(Error::InvalidChannel(u16::from(channel)));
        }
        self.drum_channel = channel;
        Ok(())
    }

    pub fn drum_channel(&self) -> u8 {
        self.drum_channel
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.render_mode = mode;
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    /// Device mode inherited by every channel.
    pub fn set_mode(&mut self, mode: DeviceMode) {
        self.mode = mode;
        for channel in self.channels.values_mut() {
            channel.set_mode(mode);
        }
    }

    pub fn mixer(&self) -> &dyn Mixer {
        self.mixer.as_ref()
    }

    pub fn cache(&self) -> &BufferCache {
        &self.cache
    }

    pub fn bank_index(&self) -> &InstrumentBankIndex {
        &self.banks
    }

    pub fn get(&self, group: GroupId) -> Option<&Channel> {
        self.channels.get(&group)
    }

    pub fn contains(&self, group: GroupId) -> bool {
        self.channels.contains_key(&group)
    }

    pub fn groups(&self) -> Vec<GroupId> {
        self.channels.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns the channel, creating it with bank 0 program 0 if needed.
    pub fn channel(&mut self, group: GroupId) -> Result<&mut Channel> {
        if !self.channels.contains_key(&group) {
            return self.new_channel(group, 0, 0);
        }
        self.channels
            .get_mut(&group)
            .ok_or(Error::InvalidChannel(group))
    }

    /// Replaces the channel for `group` with a fresh one.
    pub fn new_channel(&mut self, group: GroupId, bank: u16, program: u8) -> Result<&mut Channel> {
        self.remove(group);

        let number = (group & 0x0F) as u8;
        let drums = number == self.drum_channel
            || self.drum_marks.get(&group).copied().unwrap_or(false);

        let mut base = BufferInfo::EMPTY;
        if drums {
            if let Some(effect) = self.banks.get_drum_effect(bank) {
                base = self.cache.buffer(effect, 0);
                if !base.is_empty() {
                    self.mixer.set_render_mode(base.id, self.render_mode);
                }
            }
        }

        let voices = VoiceGroup {
            drums,
            base: (!base.is_empty()).then_some(base.id),
        };
        if let Err(e) = self.mixer.register(group, &voices) {
            self.cache.destroy(&base);
            return Err(Error::ChannelConstruction {
                channel: group,
                reason: e.to_string(),
            });
        }

        debug!(group, bank, program, drums, "New channel");
        let mut channel = Channel::new(group, bank, program, drums, base);
        channel.set_mode(self.mode);
        for (slot, effect) in [
            (EffectSlot::Chorus, &self.chorus),
            (EffectSlot::Reverb, &self.reverb),
        ] {
            if let Some(effect) = effect {
                self.mixer.set_effect_send(group, slot, effect);
            }
        }

        Ok(self.channels.entry(group).or_insert(channel))
    }

    /// Deregisters and drops the channel, releasing its buffers.
    pub fn remove(&mut self, group: GroupId) -> bool {
        let Some(mut channel) = self.channels.remove(&group) else {
            return false;
        };
        self.mixer.deregister(group);
        channel.release(&mut self.cache);
        self.reverb_bus.remove(&group);
        true
    }

    /// Drops every channel and classification.
    pub fn clear(&mut self) {
        for group in self.groups() {
            self.remove(group);
        }
        self.drum_marks.clear();
    }

    pub fn mark_drums(&mut self, group: GroupId, drums: bool) {
        self.drum_marks.insert(group, drums);
    }

    pub fn play(
        &mut self,
        group: GroupId,
        key: u8,
        velocity: u8,
        device_tuning: f32,
    ) -> Result<bool> {
        self.channel(group)?;
        let Some(channel) = self.channels.get_mut(&group) else {
            return Ok(false);
        };
        Ok(channel.play(
            &self.banks,
            &mut self.cache,
            self.mixer.as_ref(),
            key,
            velocity,
            device_tuning,
        ))
    }

    pub fn stop(&mut self, group: GroupId, key: u8) {
        if let Some(channel) = self.channels.get_mut(&group) {
            channel.stop(self.mixer.as_ref(), key);
        }
    }

    pub fn stop_all(&mut self, group: GroupId) {
        if let Some(channel) = self.channels.get_mut(&group) {
            channel.stop_all(self.mixer.as_ref());
        }
    }

    /// Stops every sounding voice of every channel.
    pub fn silence_all(&mut self) {
        for channel in self.channels.values_mut() {
            channel.stop_all(self.mixer.as_ref());
        }
    }

    /// Requests a graceful stop. Repeated calls are no-ops until a new note starts.
    pub fn finish(&mut self, group: GroupId) {
        if let Some(channel) = self.channels.get_mut(&group) {
            if !channel.is_finishing() {
                self.mixer.finish(group);
                channel.set_finishing(true);
            }
        }
    }

    pub fn finished(&self, group: GroupId) -> bool {
        match self.channels.get(&group) {
            Some(_) => self.mixer.finished(group),
            None => true,
        }
    }

    /// Effect 1 depth. Non-zero values move the channel onto the reverb bus.
    pub fn set_reverb_level(&mut self, group: GroupId, value: u8) -> Result<()> {
        let mixer = self.mixer.clone();
        if value > 0 {
            let level = f32::from(value) / 127.0;
            // The mixer only attaches registered groups.
            let channel = self.channel(group)?;
            channel.set_param(mixer.as_ref(), ChannelParam::ReverbLevel(level));
            if self.reverb_bus.insert(group) {
                mixer.attach_reverb(group);
            }
        } else if self.reverb_bus.remove(&group) {
            mixer.detach_reverb(group);
            if let Some(channel) = self.channels.get_mut(&group) {
                channel.set_reverb_level(0.0);
            }
        } else {
            trace!(group, "Channel not on reverb bus");
        }
        Ok(())
    }

    pub fn is_on_reverb_bus(&self, group: GroupId) -> bool {
        self.reverb_bus.contains(&group)
    }

    /// Loads a chorus asset and sends every active channel to it.
    pub fn set_chorus(&mut self, name: &str) -> Result<()> {
        let effect = self.load_effect(name)?;
        self.broadcast(EffectSlot::Chorus, &effect);
        self.chorus = Some(effect);
        Ok(())
    }

    pub fn set_reverb(&mut self, name: &str) -> Result<()> {
        let effect = self.load_effect(name)?;
        self.broadcast(EffectSlot::Reverb, &effect);
        self.reverb = Some(effect);
        Ok(())
    }

    pub fn set_chorus_param(&self, param: EffectParam) {
        self.mixer.set_effect_param(EffectSlot::Chorus, param);
    }

    pub fn set_reverb_param(&self, param: EffectParam) {
        self.mixer.set_effect_param(EffectSlot::Reverb, param);
    }

    pub fn chorus(&self) -> Option<&EffectAsset> {
        self.chorus.as_ref()
    }

    pub fn reverb(&self) -> Option<&EffectAsset> {
        self.reverb.as_ref()
    }

    fn load_effect(&self, name: &str) -> Result<EffectAsset> {
        self.cache.effect(name).inspect_err(|e| {
            warn!("Unable to load effect {}: {}", name, e);
        })
    }

    fn broadcast(&self, slot: EffectSlot, effect: &EffectAsset) {
        for &group in self.channels.keys() {
            self.mixer.set_effect_send(group, slot, effect);
        }
    }
}

impl Drop for ChannelTable {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for ChannelTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTable")
            .field("channels", &self.channels.keys())
            .field("reverb_bus", &self.reverb_bus)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{DrumSample, Instrument, PatchLayer};
    use crate::testing::{Call, MemoryLoader, RecordingMixer};
    use approx::assert_relative_eq;

    fn banks() -> InstrumentBankIndex {
        let mut index = InstrumentBankIndex::new();
        index.insert_instrument(
            0,
            0,
            Instrument {
                file: "piano".to_string(),
                wide: true,
            },
        );
        index.insert_instrument(
            0,
            48,
            Instrument {
                file: "strings".to_string(),
                wide: false,
            },
        );
        for (threshold, layer) in [(64, 1), (128, 2)] {
            index.insert_patch_layer(
                "strings",
                threshold,
                PatchLayer {
                    layer,
                    file: "strings".to_string(),
                },
            );
        }
        for key in [42, 44, 46, 36] {
            index.insert_drum(
                0,
                key,
                DrumSample {
                    file: format!("kit/{key}"),
                    layer: 0,
                },
            );
        }
        index.set_drum_effect(0, "kit-filter");
        index
    }

    fn table() -> (ChannelTable, Arc<RecordingMixer>, Arc<MemoryLoader>) {
        let mixer = Arc::new(RecordingMixer::default());
        let loader = Arc::new(MemoryLoader::default());
        let table = ChannelTable::new(mixer.clone(), loader.clone(), Arc::new(banks()));
        (table, mixer, loader)
    }

    #[test]
    fn test_lazy_channel_defaults() {
        let (mut table, _mixer, _loader) = table();
        for n in 0..16u16 {
            let channel = table.channel(n).unwrap();
            assert_eq!(channel.bank(), 0);
            assert_eq!(channel.program(), 0);
            assert_eq!(channel.is_drums(), n == 9);
        }
        assert_eq!(table.len(), 16);
    }

    #[test]
    fn test_drum_channel_gets_kit_effect() {
        let (mut table, mixer, _loader) = table();
        table.set_render_mode(RenderMode::Hrtf);
        let base = table.channel(9).unwrap().base();
        assert!(!base.is_empty());
        let calls = mixer.take();
        assert!(calls.contains(&Call::RenderMode(base.id, RenderMode::Hrtf)));
        assert!(calls.contains(&Call::Register(
            9,
            VoiceGroup {
                drums: true,
                base: Some(base.id)
            }
        )));
    }

    #[test]
    fn test_program_change_replaces_channel() {
        let (mut table, mixer, loader) = table();
        assert!(table.play(0, 60, 100, 1.0).unwrap());
        assert_eq!(table.cache().refcount("piano", 0), Some(1));

        table.new_channel(0, 0, 48).unwrap();
        assert_eq!(table.cache().refcount("piano", 0), None);
        assert_eq!(loader.unloaded.lock().len(), 1);
        assert_eq!(mixer.count(|c| *c == Call::Deregister(0)), 1);
        assert_eq!(table.get(0).unwrap().program(), 48);
    }

    #[test]
    fn test_drum_marks_apply_on_program_change() {
        let (mut table, _mixer, _loader) = table();
        table.channel(3).unwrap();
        table.mark_drums(3, true);
        assert!(!table.get(3).unwrap().is_drums());
        table.new_channel(3, 0, 0).unwrap();
        assert!(table.get(3).unwrap().is_drums());
    }

    #[test]
    fn test_register_failure() {
        let (mut table, mixer, _loader) = table();
        *mixer.reject_register.lock() = true;
        let err = table.new_channel(9, 0, 0).unwrap_err();
        assert!(matches!(err, Error::ChannelConstruction { channel: 9, .. }));
        assert!(!table.contains(9));
        // The kit effect reference was handed back.
        assert!(table.cache().is_empty());
    }

    #[test]
    fn test_melodic_play() {
        let (mut table, mixer, _loader) = table();
        table.play(0, 60, 127, 1.0).unwrap();
        let plays: Vec<_> = mixer
            .take()
            .into_iter()
            .filter_map(|c| match c {
                Call::Play(group, note) => Some((group, note)),
                _ => None,
            })
            .collect();
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].1.key, 60);
        assert_relative_eq!(plays[0].1.velocity, 1.0);
        assert_relative_eq!(plays[0].1.pitch, 1.0);
        assert!(table.get(0).unwrap().is_wide());
    }

    #[test]
    fn test_layered_buffers_cached_per_zone() {
        let (mut table, _mixer, _loader) = table();
        table.new_channel(0, 0, 48).unwrap();
        table.play(0, 30, 100, 1.0).unwrap();
        table.play(0, 40, 100, 1.0).unwrap();
        table.play(0, 90, 100, 1.0).unwrap();
        assert_eq!(table.cache().refcount("strings", 1), Some(1));
        assert_eq!(table.cache().refcount("strings", 2), Some(1));
    }

    #[test]
    fn test_unresolved_note_dropped() {
        let (mut table, mixer, _loader) = table();
        table.new_channel(0, 0, 5).unwrap();
        assert!(!table.play(0, 60, 100, 1.0).unwrap());
        assert_eq!(mixer.count(|c| matches!(c, Call::Play(..))), 0);
    }

    #[test]
    fn test_hihat_choke() {
        let (mut table, mixer, _loader) = table();
        table.play(9, 46, 100, 1.0).unwrap();
        table.play(9, 36, 100, 1.0).unwrap();
        mixer.take();
        table.play(9, 42, 100, 1.0).unwrap();
        let calls = mixer.take();
        assert_eq!(calls.first(), Some(&Call::Stop(9, 46)));
        assert_eq!(table.get(9).unwrap().sounding(), &[36, 42]);
    }

    #[test]
    fn test_mono_stops_previous_note() {
        let (mut table, mixer, _loader) = table();
        table.play(0, 60, 100, 1.0).unwrap();
        let channel = table.channel(0).unwrap();
        channel.set_mono(mixer.as_ref(), true);
        mixer.take();
        table.play(0, 62, 100, 1.0).unwrap();
        assert_eq!(mixer.take().first(), Some(&Call::StopAll(0)));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let (mut table, mixer, _loader) = table();
        table.channel(2).unwrap();
        assert!(!table.finished(2));
        table.finish(2);
        table.finish(2);
        assert_eq!(mixer.count(|c| *c == Call::Finish(2)), 1);
        assert!(table.finished(2));
    }

    #[test]
    fn test_reverb_bus_membership() {
        let (mut table, mixer, _loader) = table();
        table.set_reverb_level(4, 0).unwrap();
        assert_eq!(mixer.count(|c| matches!(c, Call::DetachReverb(_))), 0);

        table.set_reverb_level(4, 64).unwrap();
        table.set_reverb_level(4, 100).unwrap();
        assert_eq!(mixer.count(|c| *c == Call::AttachReverb(4)), 1);
        assert!(table.is_on_reverb_bus(4));
        assert_relative_eq!(table.get(4).unwrap().reverb_level(), 100.0 / 127.0);

        table.set_reverb_level(4, 0).unwrap();
        assert_eq!(mixer.count(|c| *c == Call::DetachReverb(4)), 1);
        assert!(!table.is_on_reverb_bus(4));
    }

    #[test]
    fn test_reverb_attach_after_register() {
        let (mut table, mixer, _loader) = table();
        table.set_reverb_level(2, 40).unwrap();
        let calls = mixer.take();
        let register = calls
            .iter()
            .position(|c| matches!(c, Call::Register(2, _)));
        let attach = calls.iter().position(|c| *c == Call::AttachReverb(2));
        assert!(register.is_some());
        assert!(register < attach);
    }

    #[test]
    fn test_replaced_channel_leaves_reverb_bus() {
        let (mut table, mixer, _loader) = table();
        table.set_reverb_level(2, 40).unwrap();
        assert!(table.is_on_reverb_bus(2));

        table.new_channel(2, 0, 0).unwrap();
        assert!(!table.is_on_reverb_bus(2));
        assert_relative_eq!(table.get(2).unwrap().reverb_level(), 0.0);

        // Rejoining attaches again.
        table.set_reverb_level(2, 40).unwrap();
        assert_eq!(mixer.count(|c| *c == Call::AttachReverb(2)), 2);
    }

    #[test]
    fn test_chorus_broadcast() {
        let (mut table, mixer, _loader) = table();
        table.channel(0).unwrap();
        table.channel(1).unwrap();
        table.set_chorus("chorus/flanger").unwrap();
        assert_eq!(
            mixer.count(|c| matches!(c, Call::EffectSend(_, EffectSlot::Chorus, _))),
            2
        );

        mixer.take();
        table.channel(5).unwrap();
        assert!(mixer.take().contains(&Call::EffectSend(
            5,
            EffectSlot::Chorus,
            "chorus/flanger".to_string()
        )));
    }

    #[test]
    fn test_clear_releases_everything() {
        let (mut table, _mixer, _loader) = table();
        table.play(0, 60, 100, 1.0).unwrap();
        table.play(9, 36, 100, 1.0).unwrap();
        table.clear();
        assert!(table.is_empty());
        assert!(table.cache().is_empty());
    }

    #[test]
    fn test_invalid_drum_channel() {
        let (mut table, _mixer, _loader) = table();
        assert!(matches!(
            table.set_drum_channel(16),
            Err(Error::InvalidChannel(16))
        ));
    }
}
