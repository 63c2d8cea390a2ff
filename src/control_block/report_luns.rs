// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REPORT LUNS: 12-byte CDB builder and LUN list parser.
//!
//! CDB layout (SPC):
//!   [0]  = 0xA0 (REPORT LUNS)
//!   [2]  = SELECT REPORT
//!   [6..9]  = ALLOCATION LENGTH (big-endian u32)
//!   [11] = CONTROL
//!
//! Response starts with:
//!   [0..3] = LUN LIST LENGTH (big-endian u32, multiple of 8)
//!   [4..7] = reserved
//!   [8..]  = LUN entries (8 bytes each)

use anyhow::{Result, bail};

use crate::{control_block::common::opcode, utils::get_unaligned_be32};

/// Common SELECT REPORT values (byte 2).
pub mod select_report {
    /// All logical unit addresses.
    pub const ALL: u8 = 0x00;
    /// Well known logical unit addresses.
    pub const WELL_KNOWN: u8 = 0x01;
    /// All logical unit addresses (excluding well known), the common choice.
    pub const ALL_MAPPED: u8 = 0x02;
}

/// SPC requires an allocation length of at least 16.
pub const REPORT_LUNS_MIN_ALLOC: u32 = 16;

#[inline]
pub fn build_report_luns(select: u8, allocation_len: u32, control: u8) -> [u8; 12] {
    let mut cdb = [0u8; 12];
    cdb[0] = opcode::REPORT_LUNS;
    cdb[2] = select;
    cdb[6..10].copy_from_slice(&allocation_len.max(REPORT_LUNS_MIN_ALLOC).to_be_bytes());
    cdb[11] = control;
    cdb
}

/// Convenience: select=ALL, control=0.
#[inline]
pub fn build_report_luns_simple(allocation_len: u32) -> [u8; 12] {
    build_report_luns(select_report::ALL, allocation_len, 0x00)
}

/// Parsed REPORT LUNS response. `list_len` is what the device holds; the
/// `luns` vector only carries the entries that fit the returned buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LunList {
    pub list_len: u32,
    pub luns: Vec<[u8; 8]>,
}

impl LunList {
    /// True when the allocation length cut the list short.
    pub fn is_truncated(&self) -> bool {
        (self.luns.len() * 8) < self.list_len as usize
    }
}

/// Decode a single-level peripheral/flat LUN into its numeric value.
pub fn lun_number(lun: &[u8; 8]) -> u16 {
    match lun[0] >> 6 {
        // peripheral device addressing
        0b00 => lun[1] as u16,
        // flat space addressing
        0b01 => (((lun[0] & 0x3f) as u16) << 8) | lun[1] as u16,
        _ => u16::MAX,
    }
}

pub fn parse_report_luns(buf: &[u8]) -> Result<LunList> {
    if buf.len() < 8 {
        bail!("REPORT LUNS buffer too short: {}", buf.len());
    }
    let list_len = get_unaligned_be32(buf);
    if list_len % 8 != 0 {
        bail!("REPORT LUNS list length {list_len} is not a multiple of 8");
    }
    let avail = (buf.len() - 8).min(list_len as usize);
    let luns = buf[8..8 + avail]
        .chunks_exact(8)
        .map(|c| {
            let mut l = [0u8; 8];
            l.copy_from_slice(c);
            l
        })
        .collect();
    Ok(LunList { list_len, luns })
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn cdb_clamps_small_allocation() {
        assert_eq!(
            build_report_luns_simple(4),
            hex!("a0 00 00 00 00 00 00 00 00 10 00 00")
        );
    }

    #[test]
    fn parses_truncated_list() {
        let buf = hex!(
            "00 00 00 18 00 00 00 00"
            "00 00 00 00 00 00 00 00"
            "40 05 00 00 00 00 00 00"
        );
        let l = parse_report_luns(&buf).expect("luns");
        assert_eq!(l.luns.len(), 2);
        assert!(l.is_truncated());
        assert_eq!(lun_number(&l.luns[0]), 0);
        assert_eq!(lun_number(&l.luns[1]), 5);
    }

    #[test]
    fn odd_list_length_rejected() {
        assert!(parse_report_luns(&hex!("00 00 00 05 00 00 00 00")).is_err());
    }
}
