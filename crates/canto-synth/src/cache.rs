//! Reference-counted sample buffer cache.

use crate::error::Result;
use crate::mixer::{BufferId, EffectAsset};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How channel pressure is routed for a buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PressureRouting {
    pub volume: bool,
    pub pitch: bool,
    pub sensitivity: f32,
}

/// Loaded buffer and the metadata a channel picks up from it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BufferInfo {
    pub id: BufferId,
    pub wide: bool,
    pub pressure: PressureRouting,
}

impl BufferInfo {
    /// Returned when a buffer could not be loaded.
    pub const EMPTY: BufferInfo = BufferInfo {
        id: BufferId::EMPTY,
        wide: false,
        pressure: PressureRouting {
            volume: false,
            pitch: false,
            sensitivity: 0.0,
        },
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Source of sample buffers and effect assets (file readers, decoders).
pub trait AssetLoader {
    /// Loads layer `level` of the sample set `name`.
    fn load(&self, name: &str, level: u8) -> Result<BufferInfo>;

    /// Releases a buffer returned by [`AssetLoader::load`].
    fn unload(&self, buffer: &BufferInfo);

    fn load_effect(&self, name: &str) -> Result<EffectAsset>;
}

pub type SharedLoader = Arc<dyn AssetLoader + Send + Sync>;

#[derive(Debug)]
struct CacheEntry {
    refs: usize,
    buffer: BufferInfo,
}

/// Cache key of layer `level` of `name`.
pub fn cache_key(name: &str, level: u8) -> String {
    if level == 0 {
        name.to_string()
    } else {
        format!("{name}?patch={level}")
    }
}

pub struct BufferCache {
    loader: SharedLoader,
    entries: HashMap<String, CacheEntry>,
}

impl BufferCache {
    pub fn new(loader: SharedLoader) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
        }
    }

    /// Returns a referenced buffer, loading it on first use.
    ///
    /// Load failures return [`BufferInfo::EMPTY`] and leave the cache unchanged.
    pub fn buffer(&mut self, name: &str, level: u8) -> BufferInfo {
        let key = cache_key(name, level);
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.refs += 1;
            return entry.buffer;
        }

        match self.loader.load(name, level) {
            Ok(buffer) if !buffer.is_empty() => {
                debug!("Loaded buffer {} as {:?}", key, buffer.id);
                self.entries.insert(key, CacheEntry { refs: 1, buffer });
                buffer
            }
            Ok(_) => {
                debug!("Loader returned no buffer for {}", key);
                BufferInfo::EMPTY
            }
            Err(e) => {
                warn!("Unable to load {}: {}", key, e);
                BufferInfo::EMPTY
            }
        }
    }

    /// Drops one reference; the buffer is unloaded when the last one goes.
    pub fn destroy(&mut self, buffer: &BufferInfo) {
        if buffer.is_empty() {
            return;
        }

        let Some(key) = self
            .entries
            .iter_mut()
            .find(|(_, entry)| entry.buffer.id == buffer.id)
            .map(|(key, entry)| {
                entry.refs = entry.refs.saturating_sub(1);
                (entry.refs == 0).then(|| key.clone())
            })
        else {
            debug!("Release of unknown buffer {:?}", buffer.id);
            return;
        };

        if let Some(key) = key {
            if let Some(entry) = self.entries.remove(&key) {
                debug!("Unloading buffer {}", key);
                self.loader.unload(&entry.buffer);
            }
        }
    }

    pub fn effect(&self, name: &str) -> Result<EffectAsset> {
        self.loader.load_effect(name)
    }

    pub fn refcount(&self, name: &str, level: u8) -> Option<usize> {
        self.entries.get(&cache_key(name, level)).map(|e| e.refs)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for BufferCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCache")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}
