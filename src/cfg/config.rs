// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{ProbeKind, SptMode, YesNo};

/// Command timeout used when the caller does not pick one.
pub const DEFAULT_TIMEOUT_SECS: u32 = 60;
/// Interval between progress probes of FORMAT UNIT / SANITIZE.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
/// Upper bound accepted for `TimeoutSecs`; larger values are clamped.
pub const MAX_TIMEOUT_SECS: u32 = 24 * 60 * 60;

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// How commands are conveyed to the device.
    #[serde(default, rename = "PassThrough")]
    pub pass_through: PassThroughConfig,
    /// Long-operation progress polling.
    #[serde(default, rename = "Polling")]
    pub polling: PollingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PassThroughConfig {
    #[serde(default = "default_timeout", rename = "TimeoutSecs")]
    /// Per-command timeout in seconds.
    pub timeout_secs: u32,

    #[serde(default, rename = "Verbosity")]
    /// Diagnostic verbosity (0 = quiet).
    pub verbosity: i32,

    #[serde(default = "default_no", rename = "StrictSense")]
    /// Report NO SENSE / RECOVERED ERROR instead of treating them as OK.
    pub strict_sense: YesNo,

    #[serde(default, rename = "SptMode")]
    /// Windows SPT flavour.
    pub spt_mode: SptMode,

    #[serde(default, rename = "Nvme")]
    pub nvme: NvmeConfig,
}

impl Default for PassThroughConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verbosity: 0,
            strict_sense: YesNo::No,
            spt_mode: SptMode::Direct,
            nvme: NvmeConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NvmeConfig {
    #[serde(default = "default_yes", rename = "SntlEnabled")]
    /// Translate SCSI commands for NVMe devices.
    pub sntl_enabled: YesNo,

    #[serde(default = "default_yes", rename = "TurPowerCheck")]
    /// TEST UNIT READY queries the power state.
    pub tur_power_check: YesNo,
}

impl Default for NvmeConfig {
    fn default() -> Self {
        Self {
            sntl_enabled: YesNo::Yes,
            tur_power_check: YesNo::Yes,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval", rename = "IntervalSecs", with = "serde_secs")]
    pub interval: Duration,

    #[serde(default, rename = "Probe")]
    pub probe: ProbeKind,

    #[serde(default = "default_no", rename = "Early")]
    /// Return right after an IMMED submission instead of polling.
    pub early: YesNo,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            probe: ProbeKind::Auto,
            early: YesNo::No,
        }
    }
}

fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

fn default_interval() -> Duration {
    Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
}

fn default_yes() -> YesNo {
    YesNo::Yes
}

fn default_no() -> YesNo {
    YesNo::No
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {path:?}"))?;
        Self::from_yaml(&s)
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        let mut cfg: Config =
            serde_yaml::from_str(s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        let pt = &mut self.pass_through;
        ensure!(pt.timeout_secs >= 1, "TimeoutSecs must be >= 1");
        if pt.timeout_secs > MAX_TIMEOUT_SECS {
            pt.timeout_secs = MAX_TIMEOUT_SECS;
        }
        ensure!(pt.verbosity >= 0, "Verbosity must not be negative");

        ensure!(
            !self.polling.interval.is_zero(),
            "Polling.IntervalSecs must be >= 1"
        );
        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = Config::from_yaml("{}").expect("defaults");
        assert_eq!(cfg.pass_through.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.pass_through.spt_mode, SptMode::Direct);
        assert!(cfg.pass_through.nvme.sntl_enabled.as_bool());
        assert_eq!(cfg.polling.interval, Duration::from_secs(60));
        assert_eq!(cfg.polling.probe, ProbeKind::Auto);
    }

    #[test]
    fn aliases_and_clamping() {
        let cfg = Config::from_yaml(
            "PassThrough:\n  TimeoutSecs: 999999\n  StrictSense: yes\n  SptMode: indirect\n  Nvme:\n    TurPowerCheck: No\nPolling:\n  IntervalSecs: 5\n  Probe: rs\n",
        )
        .expect("config");
        assert_eq!(cfg.pass_through.timeout_secs, MAX_TIMEOUT_SECS);
        assert!(cfg.pass_through.strict_sense.as_bool());
        assert_eq!(cfg.pass_through.spt_mode, SptMode::Indirect);
        assert!(!cfg.pass_through.nvme.tur_power_check.as_bool());
        assert_eq!(cfg.polling.interval, Duration::from_secs(5));
        assert_eq!(cfg.polling.probe, ProbeKind::RequestSense);
    }

    #[test]
    fn zero_interval_rejected() {
        assert!(Config::from_yaml("Polling:\n  IntervalSecs: 0\n").is_err());
    }
}
