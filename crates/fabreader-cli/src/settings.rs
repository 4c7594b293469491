//! Configuration file handling.

use anyhow::Context;
use fabreader_network::LinkConfig;
use fabreader_reader::ReaderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "wifi")]
use fabreader_network::WifiCredentials;

/// Everything the binary reads from its TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reader: ReaderConfig,
    pub link: LinkConfig,
    #[cfg(feature = "wifi")]
    pub wifi: WifiCredentials,
    pub log_level: Option<String>,
    /// Run on the in-memory link instead of the compiled-in backend.
    pub mock_link: bool,
}

impl Settings {
    /// Read settings from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Fill in values derived from other settings.
    pub fn finish(&mut self) {
        if self.link.route_target.is_none() {
            let target = &self.reader.target;
            self.link.route_target = Some((target.host.clone(), target.port));
        }

        #[cfg(feature = "wifi")]
        {
            if self.wifi.ssid.is_none() {
                self.wifi.ssid = option_env!("FABREADER_WIFI_SSID").map(str::to_string);
            }
            if self.wifi.passphrase.is_none() {
                self.wifi.passphrase = option_env!("FABREADER_WIFI_PASSPHRASE").map(str::to_string);
            }
        }
    }
}
