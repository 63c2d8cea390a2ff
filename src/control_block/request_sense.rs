// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REQUEST SENSE: 6-byte CDB builder.
//!
//! CDB layout (SPC):
//!   [0] = 0x03 (REQUEST SENSE)
//!   [1] = DESC (bit 0), other bits reserved=0
//!   [2]..[3] = reserved (0)
//!   [4] = ALLOCATION LENGTH (number of bytes to return)
//!   [5] = CONTROL
//!
//! Notes:
//! - `desc=false` requests Fixed sense format; `desc=true` requests Descriptor
//!   format. The target may still choose format per its mode settings.
//! - The returned sense arrives as *data-in*, with GOOD status.

use crate::control_block::common::opcode;

/// Allocation length that fits any fixed or descriptor sense we decode.
pub const REQUEST_SENSE_ALLOC: u8 = 252;

#[inline]
pub fn build_request_sense(desc: bool, allocation_len: u8, control: u8) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::REQUEST_SENSE;
    cdb[1] = desc as u8;
    cdb[4] = allocation_len;
    cdb[5] = control;
    cdb
}

/// Convenience: DESC=0 (fixed format), CONTROL=0.
#[inline]
pub fn build_request_sense_simple(allocation_len: u8) -> [u8; 6] {
    build_request_sense(false, allocation_len, 0x00)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn desc_bit_and_alloc() {
        assert_eq!(build_request_sense(true, 0xfc, 0), hex!("03 01 00 00 fc 00"));
        assert_eq!(build_request_sense_simple(18), hex!("03 00 00 00 12 00"));
    }
}
