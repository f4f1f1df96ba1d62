// src/notify/routing.rs
//! Country → destination channel lookup with full-name aliases and a default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "CHANNELS_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/channels.toml";

/// Built-in full-name aliases (lowercase). Config entries extend or override these.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("spain", "es"),
    ("españa", "es"),
    ("espana", "es"),
    ("portugal", "pt"),
    ("brazil", "br"),
    ("brasil", "br"),
    ("mexico", "mx"),
    ("méxico", "mx"),
    ("peru", "pe"),
    ("perú", "pe"),
    ("chile", "cl"),
    ("colombia", "co"),
    ("guatemala", "gt"),
    ("argentina", "ar"),
    ("ecuador", "ec"),
    ("paraguay", "py"),
    ("uruguay", "uy"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub default_channel: Option<String>,
    /// Two-letter country code → channel id.
    pub channels: BTreeMap<String, String>,
    /// Full country name → two-letter code.
    pub aliases: BTreeMap<String, String>,
}

impl ChannelsConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading channels from {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// `$CHANNELS_CONFIG_PATH`, then `config/channels.toml`, else empty.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            return Self::load_from(&PathBuf::from(p));
        }
        let p = PathBuf::from(DEFAULT_PATH);
        if p.exists() {
            return Self::load_from(&p);
        }
        Ok(Self::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelRouter {
    channels: BTreeMap<String, String>,
    aliases: BTreeMap<String, String>,
    default_channel: Option<String>,
}

impl ChannelRouter {
    pub fn new(cfg: ChannelsConfig) -> Self {
        let mut aliases: BTreeMap<String, String> = BUILTIN_ALIASES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in cfg.aliases {
            aliases.insert(k.trim().to_lowercase(), v.trim().to_lowercase());
        }
        let channels = cfg
            .channels
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let default_channel = cfg.default_channel.filter(|c| !c.trim().is_empty());
        Self {
            channels,
            aliases,
            default_channel,
        }
    }

    pub fn with_default(mut self, channel: Option<String>) -> Self {
        if let Some(c) = channel.filter(|c| !c.trim().is_empty()) {
            self.default_channel = Some(c);
        }
        self
    }

    /// Canonical two-letter code for a region hint, if it can be resolved.
    pub fn country_code(&self, region: &str) -> String {
        let key = region.trim().to_lowercase();
        if self.channels.contains_key(&key) {
            return key;
        }
        self.aliases.get(&key).cloned().unwrap_or(key)
    }

    /// Destination for `region`; falls back to the default channel.
    pub fn resolve(&self, region: Option<&str>) -> Option<&str> {
        region
            .filter(|r| !r.trim().is_empty())
            .and_then(|r| self.channels.get(&self.country_code(r)))
            .or(self.default_channel.as_ref())
            .map(String::as_str)
    }
}
