// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Zone management (ZBC): REPORT ZONES via ZBC IN, and the ZBC OUT actions.

use anyhow::{Result, bail};

use crate::{
    control_block::common::opcode,
    utils::{get_unaligned_be32, get_unaligned_be64},
};

pub const REPORT_ZONES_SA: u8 = 0x00;
/// Header and every zone descriptor are 64 bytes.
pub const ZONE_DESC_LEN: usize = 64;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ZoneAction {
    Close = 0x01,
    Finish = 0x02,
    Open = 0x03,
    ResetWritePointer = 0x04,
}

/// REPORTING OPTIONS of REPORT ZONES (subset).
pub mod reporting {
    pub const ALL: u8 = 0x00;
    pub const EMPTY: u8 = 0x01;
    pub const IMPLICIT_OPEN: u8 = 0x02;
    pub const EXPLICIT_OPEN: u8 = 0x03;
    pub const CLOSED: u8 = 0x04;
    pub const FULL: u8 = 0x05;
    pub const READ_ONLY: u8 = 0x06;
    pub const OFFLINE: u8 = 0x07;
    pub const RWP_RECOMMENDED: u8 = 0x10;
    pub const NON_SEQ: u8 = 0x11;
    pub const NOT_WRITE_POINTER: u8 = 0x3f;
}

/// REPORT ZONES.
///   [0]=0x95, [1]=SA 0x00, [2..10]=ZONE START LBA, [10..14]=ALLOC_LEN,
///   [14]=PARTIAL<<7|REPORTING OPTIONS, [15]=CONTROL
#[inline]
pub fn build_report_zones(start_lba: u64, alloc_len: u32, partial: bool, options: u8) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = opcode::ZBC_IN;
    cdb[1] = REPORT_ZONES_SA;
    cdb[2..10].copy_from_slice(&start_lba.to_be_bytes());
    cdb[10..14].copy_from_slice(&alloc_len.to_be_bytes());
    cdb[14] = ((partial as u8) << 7) | (options & 0x3f);
    cdb
}

/// ZBC OUT.
///   [0]=0x94, [1]=SA, [2..10]=ZONE ID, [12..14]=ZONE COUNT, [14]=ALL
#[inline]
pub fn build_zone_action(action: ZoneAction, zone_id: u64, count: u16, all: bool) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = opcode::ZBC_OUT;
    cdb[1] = action as u8;
    if !all {
        cdb[2..10].copy_from_slice(&zone_id.to_be_bytes());
        cdb[12..14].copy_from_slice(&count.to_be_bytes());
    }
    cdb[14] = all as u8;
    cdb
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneDescriptor {
    /// 1 conventional, 2 sequential write required, 3 sequential write
    /// preferred.
    pub zone_type: u8,
    pub condition: u8,
    pub non_seq: bool,
    pub reset: bool,
    pub length: u64,
    pub start_lba: u64,
    pub write_pointer: u64,
}

impl ZoneDescriptor {
    pub fn condition_str(&self) -> &'static str {
        match self.condition {
            0x0 => "not write pointer",
            0x1 => "empty",
            0x2 => "implicitly opened",
            0x3 => "explicitly opened",
            0x4 => "closed",
            0xd => "read only",
            0xe => "full",
            0xf => "offline",
            _ => "reserved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReport {
    pub list_len: u32,
    pub same: u8,
    pub max_lba: u64,
    pub zones: Vec<ZoneDescriptor>,
}

pub fn parse_report_zones(buf: &[u8]) -> Result<ZoneReport> {
    if buf.len() < ZONE_DESC_LEN {
        bail!("REPORT ZONES header too short: {}", buf.len());
    }
    let list_len = get_unaligned_be32(buf);
    let end = (ZONE_DESC_LEN + list_len as usize).min(buf.len());
    let zones = buf[ZONE_DESC_LEN..end]
        .chunks_exact(ZONE_DESC_LEN)
        .map(|d| ZoneDescriptor {
            zone_type: d[0] & 0x0f,
            condition: d[1] >> 4,
            non_seq: d[1] & 0x02 != 0,
            reset: d[1] & 0x01 != 0,
            length: get_unaligned_be64(&d[8..]),
            start_lba: get_unaligned_be64(&d[16..]),
            write_pointer: get_unaligned_be64(&d[24..]),
        })
        .collect();
    Ok(ZoneReport {
        list_len,
        same: buf[4] & 0x0f,
        max_lba: get_unaligned_be64(&buf[8..]),
        zones,
    })
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::utils::put_unaligned_be64;

    #[test]
    fn cdbs() {
        let cdb = build_report_zones(0, 0x1000, true, reporting::FULL);
        assert_eq!(&cdb[..2], &hex!("95 00"));
        assert_eq!(cdb[14], 0x85);
        assert_eq!(
            build_zone_action(ZoneAction::ResetWritePointer, 0x8_0000, 1, false),
            hex!("94 04 00 00 00 00 00 08 00 00 00 00 00 01 00 00")
        );
        assert_eq!(&build_zone_action(ZoneAction::Close, 5, 1, true)[2..14], &[0u8; 12]);
    }

    #[test]
    fn parse_two_zones() {
        let mut buf = vec![0u8; 64 * 3];
        buf[3] = 128;
        put_unaligned_be64(0xffff, &mut buf[8..]);
        buf[64] = 0x01;
        buf[65] = 0x00;
        put_unaligned_be64(0x8000, &mut buf[64 + 8..]);
        buf[128] = 0x02;
        buf[129] = 0x20;
        put_unaligned_be64(0x8000, &mut buf[128 + 8..]);
        put_unaligned_be64(0x8000, &mut buf[128 + 16..]);
        put_unaligned_be64(0x8010, &mut buf[128 + 24..]);
        let r = parse_report_zones(&buf).expect("zones");
        assert_eq!(r.max_lba, 0xffff);
        assert_eq!(r.zones.len(), 2);
        assert_eq!(r.zones[1].condition_str(), "implicitly opened");
        assert_eq!(r.zones[1].write_pointer, 0x8010);
        assert!(parse_report_zones(&buf[..63]).is_err());
    }
}
