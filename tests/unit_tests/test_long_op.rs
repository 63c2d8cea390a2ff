// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use scsi_pt_rs::{
    cfg::enums::ProbeKind,
    control_block::sanitize::{SanitizeAction, SanitizeOptions},
    handlers::common::HelperOpts,
    state_machine::long_op::{
        LongOp, ManualClock, PollOptions, Progress, poll_until_done, run_long_op,
    },
};
use serial_test::serial;

use super::common::{Reply, ScriptedTarget};

fn opts() -> HelperOpts {
    HelperOpts {
        timeout_secs: 5,
        verbose: 0,
        strict: false,
    }
}

/// NOT READY, LOGICAL UNIT NOT READY with a sense-key-specific progress
/// descriptor.
fn progress_sense(raw: u16) -> Reply {
    let [hi, lo] = raw.to_be_bytes();
    Reply::check(&[
        0x72, 0x02, 0x04, 0x02, 0, 0, 0, 8, 0x02, 0x06, 0, 0, 0x80, hi, lo, 0,
    ])
}

fn no_progress() -> Reply {
    Reply::check(&[0x72, 0x02, 0x04, 0x02, 0, 0, 0, 0])
}

#[test]
#[serial]
fn sanitize_immed_then_tur_polling() -> Result<()> {
    let t = ScriptedTarget::new(vec![
        Reply::good(&[]),
        progress_sense(0x1234),
        progress_sense(0x89ab),
        no_progress(),
    ]);
    let clock = ManualClock::default();
    let popts = PollOptions {
        interval: Duration::from_secs(60),
        probe: ProbeKind::TestUnitReady,
        early: false,
    };
    let op = LongOp::Sanitize {
        opts: SanitizeOptions::new(SanitizeAction::BlockErase),
        overwrite: None,
    };
    let mut lines = Vec::new();
    let outcome = run_long_op(&t, &op, true, &clock, &popts, &opts(), &mut |p: Progress| {
        lines.push(format!("Progress indication: {p} done"))
    })?;

    assert_eq!(
        lines,
        vec![
            format!("Progress indication: {}.{:02}% done", 7, 11),
            format!("Progress indication: {}.{:02}% done", 53, 77),
        ]
    );
    assert_eq!(0x1234u32 * 100 / 65536, 7);
    assert_eq!(0x89abu32 * 100 / 65536, 53);
    assert_eq!(outcome.ticks, 3);
    assert_eq!(outcome.elapsed, Duration::from_secs(180));

    let cdbs = t.cdbs();
    assert_eq!(cdbs[0][..2], [0x48u8, 0x82]);
    assert!(cdbs[1..].iter().all(|c| c == &vec![0u8; 6]));
    Ok(())
}

#[test]
#[serial]
fn poller_stops_within_n_plus_one_ticks() -> Result<()> {
    for n in 0..8u16 {
        let mut replies: Vec<Reply> = (0..n)
            .map(|i| progress_sense(0xffff - (n - i) * 0x1000))
            .collect();
        replies.push(Reply::good(&[]));
        // anything after the first quiet probe must not be consumed
        replies.push(progress_sense(0x0001));
        let t = ScriptedTarget::new(replies);
        let clock = ManualClock::default();
        let popts = PollOptions {
            interval: Duration::from_secs(1),
            probe: ProbeKind::TestUnitReady,
            early: false,
        };
        let mut seen = 0u32;
        let outcome = poll_until_done(&t, &clock, &popts, &opts(), &mut |_| seen += 1)?;
        assert!(outcome.ticks <= n as u32 + 1, "n={n}: {} ticks", outcome.ticks);
        assert_eq!(seen, n as u32);
        assert_eq!(t.cdbs().len(), n as usize + 1);
    }
    Ok(())
}
