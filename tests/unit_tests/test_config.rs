// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use scsi_pt_rs::cfg::{
    cli::resolve_config_path,
    config::Config,
    context::ProcessContext,
    enums::{ProbeKind, SptMode},
};

#[test]
fn sample_config_loads() -> Result<()> {
    let cfg = resolve_config_path("tests/config.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    assert_eq!(cfg.pass_through.timeout_secs, 30);
    assert_eq!(cfg.pass_through.verbosity, 1);
    assert_eq!(cfg.pass_through.spt_mode, SptMode::Direct);
    assert_eq!(cfg.polling.interval, Duration::from_secs(10));
    assert_eq!(cfg.polling.probe, ProbeKind::TestUnitReady);

    let ctx = ProcessContext::from_config(&cfg);
    assert_eq!(ctx.timeout_secs, 30);
    assert!(ctx.nvme.sntl_enabled);
    assert!(!ctx.strict_sense);
    Ok(())
}

#[test]
fn missing_config_is_an_error() {
    assert!(
        resolve_config_path("tests/does_not_exist.yaml")
            .and_then(Config::load_from_file)
            .is_err()
    );
}
