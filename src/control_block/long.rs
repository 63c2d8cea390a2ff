// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! READ LONG(10) / WRITE LONG(10).
//!
//! A wrong BYTE TRANSFER LENGTH is rejected with ILLEGAL REQUEST, ILI set,
//! and the INFORMATION field holding `requested - actual`.

use crate::{control_block::common::opcode, models::sense_data::SenseData};

/// READ LONG(10): `[1]=PBLOCK<<2|CORRCT<<1`, `[2..6]=LBA`, `[7..9]=BYTE LEN`.
#[inline]
pub fn build_read_long10(pblock: bool, correct: bool, lba: u32, xfer_len: u16) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::READ_LONG_10;
    cdb[1] = ((pblock as u8) << 2) | ((correct as u8) << 1);
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&xfer_len.to_be_bytes());
    cdb
}

/// WRITE LONG(10): `[1]=COR_DIS<<7|WR_UNCOR<<6|PBLOCK<<5`.
#[inline]
pub fn build_write_long10(cor_dis: bool, wr_uncor: bool, pblock: bool, lba: u32, xfer_len: u16) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::WRITE_LONG_10;
    cdb[1] = ((cor_dis as u8) << 7) | ((wr_uncor as u8) << 6) | ((pblock as u8) << 5);
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&xfer_len.to_be_bytes());
    cdb
}

/// Transfer length the device expects, recovered from an ILI rejection.
pub fn corrected_long_len(requested: u16, sense: &SenseData) -> Option<u16> {
    if !sense.ili {
        return None;
    }
    let (valid, info) = sense.information?;
    if !valid {
        return None;
    }
    // INFORMATION is a signed difference in the low 32 bits
    let diff = info as u32 as i32 as i64;
    u16::try_from(requested as i64 - diff).ok()
}
