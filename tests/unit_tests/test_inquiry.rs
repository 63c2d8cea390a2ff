// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use scsi_pt_rs::{
    control_block::inquiry::parse_inquiry_standard,
    handlers::{common::HelperOpts, inquiry::inquiry_standard},
};
use serial_test::serial;

use super::common::{Reply, ScriptedTarget, load_fixture};

#[test]
#[serial]
fn standard_inquiry_round_trip() -> Result<()> {
    let raw = load_fixture("tests/unit_tests/fixtures/inquiry/standard_96.hex")?;
    assert_eq!(raw.len(), 96);
    let t = ScriptedTarget::new(vec![Reply {
        data: raw.clone(),
        resid: Some(0),
        ..Default::default()
    }]);
    let opts = HelperOpts {
        timeout_secs: 5,
        verbose: 0,
        strict: false,
    };

    let inq = inquiry_standard(&t, &opts)?;

    assert_eq!(t.cdbs(), vec![vec![0x12, 0x00, 0x00, 0x00, 0x60, 0x00]]);
    assert_eq!(inq.peripheral_qualifier, 0);
    assert_eq!(inq.device_type, 0);
    assert_eq!(inq, parse_inquiry_standard(&raw)?);
    assert_eq!(inq.vendor_id.as_bytes(), raw[8..16].trim_ascii_end());
    assert_eq!(inq.product_id.as_bytes(), raw[16..32].trim_ascii_end());
    assert_eq!(inq.product_rev.as_bytes(), raw[32..36].trim_ascii_end());
    Ok(())
}
