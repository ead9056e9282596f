//! Bridge configuration loaded from `panel-bridge.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::client::DEFAULT_REQUEST_TIMEOUT;
use crate::router::UnknownRequestPolicy;

pub const CONFIG_FILES: &[&str] = &["panel-bridge.toml", ".panel-bridge.toml"];

/// Messaging settings shared by both peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Config file path (if found).
    pub config_path: Option<PathBuf>,
    /// Deadline for correlated requests.
    pub request_timeout: Duration,
    /// Reply policy for correlated requests of unknown type.
    pub unknown_requests: UnknownRequestPolicy,
    /// Transcript of every frame sent and received.
    pub protocol_log: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            unknown_requests: UnknownRequestPolicy::default(),
            protocol_log: None,
        }
    }
}

/// The `[bridge]` table as written on disk.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub request_timeout_ms: Option<u64>,
    pub unknown_requests: Option<UnknownRequestPolicy>,
    pub protocol_log: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    bridge: BridgeSection,
}

impl BridgeConfig {
    /// Loads the first config file found in `root`, falling back to defaults.
    pub fn load(root: &Path) -> Self {
        let Some(path) = find_config_file(root) else {
            return Self::default();
        };
        Self::load_file(root, &path)
    }

    pub fn load_file(root: &Path, path: &Path) -> Self {
        let Ok(contents) = std::fs::read_to_string(path) else {
            warn!("Failed to read panel-bridge config at {}", path.display());
            return Self {
                config_path: Some(path.to_path_buf()),
                ..Self::default()
            };
        };
        Self::from_contents(root, Some(path.to_path_buf()), &contents)
    }

    pub fn from_contents(root: &Path, config_path: Option<PathBuf>, contents: &str) -> Self {
        let parsed: ConfigFile = match toml::from_str(contents) {
            Ok(parsed) => parsed,
            Err(err) => {
                match &config_path {
                    Some(path) => warn!(
                        "Failed to parse panel-bridge config at {}: {err}",
                        path.display()
                    ),
                    None => warn!("Failed to parse panel-bridge config: {err}"),
                }
                return Self {
                    config_path,
                    ..Self::default()
                };
            }
        };
        Self::from_section(root, config_path, parsed.bridge)
    }

    pub fn from_section(root: &Path, config_path: Option<PathBuf>, section: BridgeSection) -> Self {
        let defaults = Self::default();
        let request_timeout = match section.request_timeout_ms {
            Some(0) => {
                warn!("request_timeout_ms must be positive; using default");
                defaults.request_timeout
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.request_timeout,
        };
        Self {
            config_path,
            request_timeout,
            unknown_requests: section.unknown_requests.unwrap_or_default(),
            protocol_log: section.protocol_log.map(|path| resolve_path(root, &path)),
        }
    }
}

pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
