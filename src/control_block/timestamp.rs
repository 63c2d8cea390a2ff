// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REPORT TIMESTAMP (MAINTENANCE IN, SA 0x0F) and SET TIMESTAMP
//! (MAINTENANCE OUT, SA 0x0F). The timestamp is milliseconds since the Unix
//! epoch in a 48-bit field.

use anyhow::{Result, bail};

use crate::{
    control_block::{
        common::{maint_in, maint_out},
        service_action::{build_maintenance_in, build_maintenance_out},
    },
    utils::{get_unaligned_be16, get_unaligned_be48, put_unaligned_be16, put_unaligned_be48},
};

/// Timestamp parameter data length (header + 10).
pub const TIMESTAMP_PARAM_LEN: usize = 12;

#[inline]
pub fn build_report_timestamp(alloc_len: u32) -> [u8; 12] {
    build_maintenance_in(maint_in::REPORT_TIMESTAMP, alloc_len, 0)
}

#[inline]
pub fn build_set_timestamp() -> [u8; 12] {
    build_maintenance_out(maint_out::SET_TIMESTAMP, TIMESTAMP_PARAM_LEN as u32, 0)
}

/// Who set the device clock last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampOrigin {
    PowerOn,
    SetTimestamp,
    OtherLu,
    Other(u8),
}

impl From<u8> for TimestampOrigin {
    fn from(v: u8) -> Self {
        match v & 0x07 {
            0 => TimestampOrigin::PowerOn,
            2 => TimestampOrigin::SetTimestamp,
            3 => TimestampOrigin::OtherLu,
            other => TimestampOrigin::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub origin: TimestampOrigin,
    pub millis: u64,
}

impl Timestamp {
    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(i64::try_from(self.millis).ok()?)
    }
}

pub fn parse_timestamp(buf: &[u8]) -> Result<Timestamp> {
    if buf.len() < TIMESTAMP_PARAM_LEN {
        bail!("REPORT TIMESTAMP buffer too short: {}", buf.len());
    }
    let len = get_unaligned_be16(buf) as usize;
    if len < 10 {
        bail!("timestamp parameter data length {len} < 10");
    }
    Ok(Timestamp {
        origin: TimestampOrigin::from(buf[2]),
        millis: get_unaligned_be48(&buf[4..]),
    })
}

/// SET TIMESTAMP parameter list for `millis` since the epoch.
pub fn timestamp_param_list(millis: u64) -> [u8; TIMESTAMP_PARAM_LEN] {
    let mut p = [0u8; TIMESTAMP_PARAM_LEN];
    put_unaligned_be16(10, &mut p);
    put_unaligned_be48(millis & 0xffff_ffff_ffff, &mut p[4..]);
    p
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn cdbs() {
        assert_eq!(
            build_report_timestamp(12),
            hex!("a3 0f 00 00 00 00 00 00 00 0c 00 00")
        );
        assert_eq!(
            build_set_timestamp(),
            hex!("a4 0f 00 00 00 00 00 00 00 0c 00 00")
        );
    }

    #[test]
    fn parse_reported_timestamp() {
        let p = timestamp_param_list(1_700_000_000_000);
        let mut buf = p;
        buf[2] = 0x02;
        let ts = parse_timestamp(&buf).expect("timestamp");
        assert_eq!(ts.origin, TimestampOrigin::SetTimestamp);
        assert_eq!(ts.millis, 1_700_000_000_000);
        assert_eq!(
            ts.to_datetime().map(|d| d.timestamp()),
            Some(1_700_000_000)
        );
    }
}
