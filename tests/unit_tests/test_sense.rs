// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use scsi_pt_rs::{
    models::{
        error::{ErrorKind, classify},
        sense_data::{SenseCategory, category, info_field, normalize},
        status::ResultCategory,
    },
    pt::session::{ExecStatus, PtResult},
};

use super::common::load_fixture;

const FIXTURES: [&str; 3] = [
    "tests/unit_tests/fixtures/sense/fixed_medium_error.hex",
    "tests/unit_tests/fixtures/sense/desc_illegal_request.hex",
    "tests/unit_tests/fixtures/sense/fixed_unit_attention.hex",
];

fn check_condition(sense: &[u8]) -> PtResult {
    let mut res = PtResult {
        status: 0x02,
        sense_len: sense.len(),
        ..Default::default()
    };
    res.derive_category();
    res
}

#[test]
fn category_survives_parse_and_pack() -> Result<()> {
    for path in FIXTURES {
        let raw = load_fixture(path)?;
        let sd = normalize(&raw).with_context(|| format!("{path} should decode"))?;
        let packed = sd.pack();
        assert_eq!(category(&packed), category(&raw), "{path}");
        assert_eq!(normalize(&packed).map(|p| (p.sense_key, p.asc, p.ascq)), Some((sd.sense_key, sd.asc, sd.ascq)));
    }
    Ok(())
}

#[test]
fn fixture_categories() -> Result<()> {
    let expected = [
        SenseCategory::MediumHard,
        SenseCategory::IllegalReq,
        SenseCategory::UnitAttention,
    ];
    for (path, want) in FIXTURES.iter().zip(expected) {
        assert_eq!(category(&load_fixture(path)?), want, "{path}");
    }
    Ok(())
}

#[test]
fn descriptor_information_field() -> Result<()> {
    let raw = load_fixture(FIXTURES[1])?;
    assert_eq!(info_field(&raw), (true, 0x1234));
    Ok(())
}

#[test]
fn no_sense_key_is_ok_whatever_the_asc() {
    for asc in [0x00u8, 0x04, 0x1d, 0x5d, 0xff] {
        for desc in [false, true] {
            let sense = if desc {
                vec![0x72, 0x00, asc, 0x01, 0, 0, 0, 0]
            } else {
                let mut s = vec![0u8; 18];
                s[0] = 0x70;
                s[7] = 10;
                s[12] = asc;
                s
            };
            let res = check_condition(&sense);
            assert_eq!(res.category, ResultCategory::Sense);
            assert_eq!(classify(ExecStatus::Submitted, &res, &sense, false), ErrorKind::Ok);
        }
    }
}

#[test]
fn illegal_request_is_illegal_req_whatever_the_asc() {
    for (asc, ascq) in [(0x20u8, 0x00u8), (0x24, 0x00), (0x25, 0x00), (0x26, 0x01), (0x00, 0x00)] {
        let sense = [0x72, 0x05, asc, ascq, 0, 0, 0, 0];
        let res = check_condition(&sense);
        assert_eq!(
            classify(ExecStatus::Submitted, &res, &sense, false),
            ErrorKind::IllegalReq,
            "asc {asc:02x}/{ascq:02x}"
        );
        assert_eq!(
            classify(ExecStatus::Submitted, &res, &sense, true),
            ErrorKind::IllegalReq
        );
    }
}
