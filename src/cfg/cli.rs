// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use argh::FromArgs;

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// Send a SCSI command to a device and report the outcome as an exit code.
#[derive(FromArgs, Debug)]
pub struct Args {
    /// pass-through config (YAML)
    #[argh(option)]
    pub config: Option<String>,

    /// logger config (YAML); plain stderr logging when absent
    #[argh(option)]
    pub logger: Option<String>,

    /// increase verbosity (repeatable)
    #[argh(switch, short = 'v')]
    pub verbose: u8,

    /// open the device read-only
    #[argh(switch, short = 'r')]
    pub readonly: bool,

    /// report NO SENSE / RECOVERED ERROR as errors
    #[argh(switch)]
    pub strict: bool,

    /// command timeout in seconds
    #[argh(option, short = 't')]
    pub timeout: Option<u32>,

    /// device name, e.g. /dev/sg1 or /dev/nvme0n1
    #[argh(positional)]
    pub device: String,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum Command {
    Inquiry(InquiryArgs),
    Tur(TurArgs),
    Sanitize(SanitizeArgs),
    Format(FormatArgs),
}

/// standard INQUIRY or a VPD page
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "inquiry")]
pub struct InquiryArgs {
    /// VPD page code (hex or decimal)
    #[argh(option, short = 'p', from_str_fn(parse_u8))]
    pub page: Option<u8>,
}

/// TEST UNIT READY, optionally repeated
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "tur")]
pub struct TurArgs {
    /// number of times to send the command
    #[argh(option, short = 'n', default = "1")]
    pub count: u32,

    /// report progress of a format or sanitize in progress
    #[argh(switch, short = 'p')]
    pub progress: bool,
}

/// SANITIZE (block erase unless another action is chosen)
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "sanitize")]
pub struct SanitizeArgs {
    /// crypto erase instead of block erase
    #[argh(switch)]
    pub crypto: bool,

    /// exit failure mode
    #[argh(switch)]
    pub exit_failure: bool,

    /// return immediately and poll for progress
    #[argh(switch)]
    pub immed: bool,

    /// poll interval in seconds
    #[argh(option)]
    pub interval: Option<u64>,
}

/// FORMAT UNIT with default parameters
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "format")]
pub struct FormatArgs {
    /// protection type field (0..=3)
    #[argh(option, default = "0")]
    pub fmtpinfo: u8,

    /// return immediately and poll for progress
    #[argh(switch)]
    pub immed: bool,

    /// poll interval in seconds
    #[argh(option)]
    pub interval: Option<u64>,
}

/// `0x83`, `83h` or `131`.
pub fn parse_u8(s: &str) -> Result<u8, String> {
    let t = s.trim();
    let parsed = if let Some(h) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u8::from_str_radix(h, 16)
    } else if let Some(h) = t.strip_suffix('h').or_else(|| t.strip_suffix('H')) {
        u8::from_str_radix(h, 16)
    } else {
        t.parse()
    };
    parsed.map_err(|e| format!("bad number {s:?}: {e}"))
}
