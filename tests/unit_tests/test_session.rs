// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use hex_literal::hex;
use scsi_pt_rs::{
    handlers::{common::HelperOpts, unit::test_unit_ready},
    models::{error::ErrorKind, status::ResultCategory},
    pt::session::{DataDir, ExecStatus, PtCommand, PtSession, outstanding_sessions},
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

#[test]
#[serial]
fn every_constructed_session_is_released() {
    let base = outstanding_sessions();
    let t = ScriptedTarget::new(vec![]);
    {
        let a = PtSession::open(&t);
        let b = PtSession::open(&t);
        assert_eq!(outstanding_sessions(), base + 2);
        drop(a);
        let c = PtSession::open(&t);
        drop(b);
        assert_eq!(outstanding_sessions(), base + 1);
        drop(c);
    }
    assert_eq!(outstanding_sessions(), base);
}

#[test]
#[serial]
fn helpers_release_sessions_on_error_paths() {
    let base = outstanding_sessions();
    let t = ScriptedTarget::new(vec![
        Reply::check(&hex!("72 02 3a 00 00 00 00 00")),
        Reply {
            host_status: 0x01,
            ..Default::default()
        },
        Reply::good(&[]),
    ]);
    for _ in 0..3 {
        let _ = test_unit_ready(&t, &opts());
    }
    assert_eq!(outstanding_sessions(), base);
}

#[test]
#[serial]
fn last_cdb_wins() {
    let t1 = ScriptedTarget::new(vec![Reply::good(&[])]);
    let mut s = PtSession::open(&t1);
    s.set_cdb(&hex!("12 00 00 00 24 00"));
    s.set_cdb(&hex!("00 00 00 00 00 00"));
    let st1 = s.execute(5, 0);
    let r1 = s.result().clone();
    drop(s);

    let t2 = ScriptedTarget::new(vec![Reply::good(&[])]);
    let mut s = PtSession::open(&t2);
    s.set_cdb(&hex!("00 00 00 00 00 00"));
    let st2 = s.execute(5, 0);
    let r2 = s.result().clone();
    drop(s);

    assert_eq!(st1, st2);
    assert_eq!(r1.category, r2.category);
    assert_eq!(r1.status, r2.status);
    assert_eq!(t1.cdbs(), t2.cdbs());
}

#[test]
#[serial]
fn residual_reduces_actual_length() -> Result<()> {
    let t = ScriptedTarget::new(vec![Reply {
        data: vec![0x11; 412],
        resid: Some(100),
        ..Default::default()
    }]);
    let cdb = hex!("28 00 00 00 00 00 00 00 01 00");
    let mut buf = vec![0u8; 512];
    let (st, s) = PtCommand::new(&cdb)
        .data(DataDir::In(&mut buf))
        .run(&t);
    assert_eq!(st, ExecStatus::Submitted);
    assert_eq!(s.classify(false), ErrorKind::Ok);
    assert_eq!(s.resid(), 100);
    assert_eq!(s.actual_lengths().0, 412);
    Ok(())
}

#[test]
#[serial]
fn transport_error_surfaces() {
    let t = ScriptedTarget::new(vec![
        Reply {
            host_status: 0x01,
            ..Default::default()
        },
        Reply {
            host_status: 0x01,
            ..Default::default()
        },
    ]);
    let cdb = [0u8; 6];
    let mut sense = [0u8; 32];
    let (_, s) = PtCommand::new(&cdb).sense(&mut sense).run(&t);
    assert_eq!(s.result_category(), ResultCategory::TransportErr);
    assert!(s.transport_err_str().is_some_and(|m| !m.is_empty()));
    drop(s);

    let err = test_unit_ready(&t, &opts()).expect_err("no connect");
    assert_eq!(err.kind, ErrorKind::Transport);
    let code = err.exit_code();
    assert_ne!(code, 0);
    for sense_kind in [
        ErrorKind::NotReady,
        ErrorKind::MediumHard,
        ErrorKind::IllegalReq,
        ErrorKind::UnitAttention,
        ErrorKind::DataProtect,
        ErrorKind::AbortedCommand,
        ErrorKind::Miscompare,
        ErrorKind::Protection,
    ] {
        assert_ne!(code, sense_kind.exit_code());
    }
}
