// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-wide settings fixed once at startup.

use anyhow::{Result, bail};
use once_cell::sync::OnceCell;

use crate::cfg::{
    config::{Config, PollingConfig},
    enums::SptMode,
    logger::WARNINGS_ENV,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvmeOptions {
    pub sntl_enabled: bool,
    pub tur_power_check: bool,
}

impl Default for NvmeOptions {
    fn default() -> Self {
        Self {
            sntl_enabled: true,
            tur_power_check: true,
        }
    }
}

/// Where warnings go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WarningsDest {
    #[default]
    Stderr,
    Stdout,
    File(String),
}

impl WarningsDest {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "stderr" => WarningsDest::Stderr,
            "stdout" => WarningsDest::Stdout,
            path => WarningsDest::File(path.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessContext {
    pub spt_mode: SptMode,
    pub verbosity: i32,
    pub strict_sense: bool,
    pub timeout_secs: u32,
    pub warnings: WarningsDest,
    pub nvme: NvmeOptions,
    pub polling: PollingConfig,
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ProcessContext {
    pub fn from_config(cfg: &Config) -> Self {
        let pt = &cfg.pass_through;
        Self {
            spt_mode: pt.spt_mode,
            verbosity: pt.verbosity,
            strict_sense: pt.strict_sense.as_bool(),
            timeout_secs: pt.timeout_secs,
            warnings: std::env::var(WARNINGS_ENV)
                .map(|v| WarningsDest::parse(&v))
                .unwrap_or_default(),
            nvme: NvmeOptions {
                sntl_enabled: pt.nvme.sntl_enabled.as_bool(),
                tur_power_check: pt.nvme.tur_power_check.as_bool(),
            },
            polling: cfg.polling.clone(),
        }
    }
}

static CONTEXT: OnceCell<ProcessContext> = OnceCell::new();
static DEFAULT_CONTEXT: OnceCell<ProcessContext> = OnceCell::new();

/// Fix the process context. Fails when called twice.
pub fn init_process_context(ctx: ProcessContext) -> Result<()> {
    if CONTEXT.set(ctx).is_err() {
        bail!("process context already initialised");
    }
    Ok(())
}

/// The initialised context, or defaults when startup never set one.
pub fn process_context() -> &'static ProcessContext {
    CONTEXT
        .get()
        .unwrap_or_else(|| DEFAULT_CONTEXT.get_or_init(ProcessContext::default))
}
