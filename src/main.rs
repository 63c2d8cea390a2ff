// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::process::ExitCode;

use anyhow::{Context, Result};
use scsi_pt_rs::{
    cfg::{
        cli::{Args, Command, FormatArgs, InquiryArgs, SanitizeArgs, TurArgs, resolve_config_path},
        config::Config,
        context::{ProcessContext, init_process_context},
        enums::ProbeKind,
        logger::{init_default_logger, init_logger},
    },
    control_block::{
        inquiry::VpdPage,
        sanitize::{SanitizeAction, SanitizeOptions},
    },
    handlers::{
        common::HelperOpts,
        inquiry::{inquiry_standard, inquiry_vpd, vpd_device_id, vpd_unit_serial},
        unit::{probe_progress, test_unit_ready},
    },
    models::error::{ErrorKind, PtError},
    pt::device::{DeviceHandle, open_device},
    state_machine::long_op::{LongOp, PollOptions, Progress, SystemClock, run_long_op},
    utils::hex_spaced,
};
use tracing::{error, info};

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("scsi_pt: {e:#}");
            ErrorKind::FileError.exit_code()
        },
    };
    ExitCode::from(code.clamp(0, 255) as u8)
}

fn run(args: Args) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => resolve_config_path(path)
            .and_then(Config::load_from_file)
            .context("failed to resolve or load config")?,
        None => Config::default(),
    };
    let pt = &mut config.pass_through;
    pt.verbosity = pt.verbosity.max(args.verbose as i32);
    if args.strict {
        pt.strict_sense = true.into();
    }
    if let Some(t) = args.timeout {
        pt.timeout_secs = t;
    }
    config.validate_and_normalize()?;

    let _guard = match &args.logger {
        Some(path) => init_logger(path)?,
        None => init_default_logger(config.pass_through.verbosity)?,
    };
    let ctx = ProcessContext::from_config(&config);
    init_process_context(ctx)?;

    let dev = match open_device(&args.device, args.readonly, config.pass_through.verbosity) {
        Ok(dev) => dev,
        Err(e) => {
            error!("open {}: {e}", args.device);
            return Ok(e.exit_code());
        },
    };
    info!("opened {} as {:?}", dev.name(), dev.kind());

    let opts = HelperOpts::default();
    let res = match &args.command {
        Command::Inquiry(a) => inquiry(&dev, a, &opts),
        Command::Tur(a) => tur(&dev, a, &opts),
        Command::Sanitize(a) => sanitize(&dev, a, &opts),
        Command::Format(a) => format(&dev, a, &opts),
    };
    dev.close();

    Ok(match res {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}: {e}", args.device);
            e.exit_code()
        },
    })
}

fn inquiry(dev: &DeviceHandle, a: &InquiryArgs, opts: &HelperOpts) -> Result<(), PtError> {
    match a.page {
        None => {
            let inq = inquiry_standard(dev, opts)?;
            println!("  Vendor:   {}", inq.vendor_id);
            println!("  Product:  {}", inq.product_id);
            println!("  Revision: {}", inq.product_rev);
            println!("  PDT:      0x{:02x} [{}]", inq.device_type, inq.device_type_str());
        },
        Some(p) if p == VpdPage::UnitSerial as u8 => {
            println!("  Unit serial number: {}", vpd_unit_serial(dev, opts)?);
        },
        Some(p) if p == VpdPage::DeviceId as u8 => {
            for d in vpd_device_id(dev, opts)? {
                println!("  assoc={} type={}: {}", d.association, d.id_type, d.identifier);
            }
        },
        Some(p) => {
            let page = inquiry_vpd(dev, p, opts)?;
            println!("  VPD page 0x{p:02x}: [{}]", hex_spaced(&page));
        },
    }
    Ok(())
}

fn tur(dev: &DeviceHandle, a: &TurArgs, opts: &HelperOpts) -> Result<(), PtError> {
    for _ in 0..a.count.max(1) {
        if a.progress {
            match probe_progress(dev, ProbeKind::TestUnitReady, opts)? {
                Some(raw) => println!("Progress indication: {} done", Progress { raw }),
                None => println!("No progress indication"),
            }
        } else {
            test_unit_ready(dev, opts)?;
        }
    }
    Ok(())
}

fn report(p: Progress) {
    println!("Progress indication: {p} done");
}

fn sanitize(dev: &DeviceHandle, a: &SanitizeArgs, opts: &HelperOpts) -> Result<(), PtError> {
    let action = match (a.crypto, a.exit_failure) {
        (true, true) => return Err(PtError::syntax("--crypto and --exit-failure are exclusive")),
        (true, false) => SanitizeAction::CryptoErase,
        (false, true) => SanitizeAction::ExitFailureMode,
        (false, false) => SanitizeAction::BlockErase,
    };
    let op = LongOp::Sanitize {
        opts: SanitizeOptions::new(action),
        overwrite: None,
    };
    run_with_poll(dev, &op, a.immed, a.interval, opts)
}

fn format(dev: &DeviceHandle, a: &FormatArgs, opts: &HelperOpts) -> Result<(), PtError> {
    let op = LongOp::FormatUnit { fmtpinfo: a.fmtpinfo };
    run_with_poll(dev, &op, a.immed, a.interval, opts)
}

fn run_with_poll(
    dev: &DeviceHandle,
    op: &LongOp,
    immed: bool,
    interval: Option<u64>,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    let mut popts = PollOptions::default();
    if let Some(secs) = interval {
        popts.interval = std::time::Duration::from_secs(secs);
    }
    let clock = SystemClock::default();
    let outcome = run_long_op(dev, op, immed, &clock, &popts, opts, &mut report)?;
    if outcome.ticks > 0 {
        info!("done after {:?}", outcome.elapsed);
    }
    Ok(())
}
