//! Builder for configuring and constructing a `MessageDispatcher`.

use crate::config::DispatcherConfig;
use crate::{MessageDispatcher, Result};
use canto_synth::{InstrumentBankIndex, SharedLoader, SharedMixer};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bank tables come from one of three places, in order of precedence: an
/// index handed to [`bank_index`](Self::bank_index), the description files
/// named by the config when [`load_banks`](Self::load_banks) is set, or an
/// empty index that resolves nothing.
///
/// # Example
///
/// ```ignore
/// use canto::prelude::*;
///
/// let mut dispatcher = MessageDispatcher::builder()
///     .config(DispatcherConfig {
///         data_path: "/usr/share/canto".into(),
///         ..Default::default()
///     })
///     .load_banks()
///     .build(mixer, loader)?;
///
/// dispatcher.push_all(&[0x90, 60, 100]);
/// ```
#[derive(Debug, Default)]
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    banks: Option<InstrumentBankIndex>,
    load_banks: bool,
}

impl DispatcherBuilder {
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bank_index(mut self, banks: InstrumentBankIndex) -> Self {
        self.banks = Some(banks);
        self
    }

    /// Reads the instrument and drum files from `config.data_path` at build time.
    pub fn load_banks(mut self) -> Self {
        self.load_banks = true;
        self
    }

    pub fn build(self, mixer: SharedMixer, loader: SharedLoader) -> Result<MessageDispatcher> {
        self.config.validate()?;

        let banks = match self.banks {
            Some(banks) => banks,
            None if self.load_banks => {
                debug!(
                    "Loading banks from {} ({}, {})",
                    self.config.data_path.display(),
                    self.config.instrument_file,
                    self.config.drum_file
                );
                InstrumentBankIndex::load(
                    &self.config.data_path,
                    &self.config.instrument_file,
                    &self.config.drum_file,
                )?
            }
            None => {
                warn!("No instrument banks configured, every note will be dropped");
                InstrumentBankIndex::new()
            }
        };

        MessageDispatcher::from_parts(&self.config, mixer, loader, Arc::new(banks))
    }
}
