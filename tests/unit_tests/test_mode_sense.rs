// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use hex_literal::hex;
use scsi_pt_rs::{
    control_block::mode::PageControl,
    handlers::{common::HelperOpts, mode::mode_sense10},
    models::{
        error::{ErrorKind, classify},
        sense_data::normalize,
    },
    pt::session::{DataDir, PtCommand},
};
use serial_test::serial;

use super::common::{Reply, ScriptedTarget};

const SENSE: [u8; 8] = hex!("72 05 24 00 00 00 00 00");

fn opts() -> HelperOpts {
    HelperOpts {
        timeout_secs: 5,
        verbose: 0,
        strict: false,
    }
}

#[test]
#[serial]
fn descriptor_sense_maps_to_illegal_request() {
    let t = ScriptedTarget::new(vec![Reply::check(&SENSE)]);
    let err = mode_sense10(&t, false, PageControl::Current, 0x01, 0, 8, &opts())
        .expect_err("check condition");

    assert_eq!(t.cdbs(), vec![hex!("5a 00 01 00 00 00 00 00 08 00").to_vec()]);
    assert_eq!(err.kind, ErrorKind::IllegalReq);
    assert_eq!(err.exit_code(), 5);
}

#[test]
#[serial]
fn classifier_sees_the_returned_sense() {
    let t = ScriptedTarget::new(vec![Reply::check(&SENSE)]);
    let cdb = hex!("5a 00 01 00 00 00 00 00 08 00");
    let mut din = [0u8; 8];
    let mut sense = [0u8; 64];
    let (st, s) = PtCommand::new(&cdb)
        .data(DataDir::In(&mut din))
        .sense(&mut sense)
        .run(&t);

    assert_eq!(s.sense_buf(), &SENSE[..]);
    assert_eq!(classify(st, s.result(), s.sense_buf(), false), ErrorKind::IllegalReq);
    let sd = normalize(s.sense_buf()).expect("descriptor sense");
    assert_eq!((sd.sense_key, sd.asc, sd.ascq), (0x05, 0x24, 0x00));
}
