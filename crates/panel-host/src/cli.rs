//! CLI definitions for panel-host.

use clap::{ArgAction, Parser};
use panel_bridge::UnknownRequestPolicy;
use std::path::PathBuf;

use crate::config::HostConfig;

#[derive(Debug, Parser)]
#[command(
    name = "panel-host",
    version,
    about = "Host-side peer for the code analyzer panel",
    after_help = "Speaks Content-Length framed JSON envelopes on stdin/stdout.\n\nExamples:\n  panel-host\n  panel-host --config ./panel-bridge.toml --verbose\n  panel-host --protocol-log ./bridge.log --ignore-unknown"
)]
pub struct Cli {
    /// Config file (defaults to panel-bridge.toml in the working directory).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Append every frame sent and received to this file.
    #[arg(long, value_name = "FILE")]
    pub protocol_log: Option<PathBuf>,
    /// Leave correlated requests of unknown type unanswered.
    #[arg(long, action = ArgAction::SetTrue)]
    pub ignore_unknown: bool,
    /// Log at debug level.
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut HostConfig) {
        if let Some(path) = &self.protocol_log {
            config.bridge.protocol_log = Some(path.clone());
        }
        if self.ignore_unknown {
            config.bridge.unknown_requests = UnknownRequestPolicy::Ignore;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence() {
        let cli = Cli::parse_from([
            "panel-host",
            "--protocol-log",
            "frames.log",
            "--ignore-unknown",
        ]);
        let mut config = HostConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.bridge.protocol_log, Some(PathBuf::from("frames.log")));
        assert_eq!(config.bridge.unknown_requests, UnknownRequestPolicy::Ignore);
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::parse_from(["panel-host"]);
        let mut config = HostConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, HostConfig::default());
        assert!(!cli.verbose);
    }
}
