//! Run configuration, loaded from YAML.
use std::fs::File;

use chip8::{constants::DEFAULT_FREQUENCY, prelude::*};
use serde::Deserialize;

use crate::error::CliError;

/// Settings for a headless run.
///
/// ```yaml
/// steps: 600
/// clock_frequency: 60
/// held_keys: [5]
/// bell: true
/// vm:
///   rng_seed: 1234
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConf {
    /// Number of instructions to execute before stopping.
    pub steps: usize,
    /// Steps per second. Zero runs as fast as possible.
    pub clock_frequency: Hz,
    /// Keys held down for the whole run.
    pub held_keys: Vec<KeyCode>,
    /// Ring the terminal bell while the sound timer runs.
    pub bell: bool,
    pub vm: Chip8Conf,
}

impl Default for RunConf {
    fn default() -> Self {
        Self {
            steps: 600,
            clock_frequency: Hz(DEFAULT_FREQUENCY),
            held_keys: vec![],
            bell: false,
            vm: Chip8Conf::default(),
        }
    }
}

impl RunConf {
    pub fn from_file(filepath: &str) -> Result<Self, CliError> {
        let file = File::open(filepath)?;
        let conf: RunConf = serde_yaml::from_reader(file)?;
        log::debug!("loaded run config: {conf:#?}");
        Ok(conf)
    }

    /// Keyboard state with the held keys pressed.
    pub fn key_state(&self) -> [bool; 16] {
        let mut keys = [false; 16];
        for key in &self.held_keys {
            keys[key.as_u8() as usize] = true;
        }
        keys
    }
}
