// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::control_block::common::opcode;

/// WRPROTECT[7:5] | DPO[4] | FUA[3].
const WRITE_FLAGS_MASK: u8 = 0b1111_1000;

/// Build a SCSI **WRITE(10)** CDB.
///
/// Layout (SBC):
/// - byte 0  : OPERATION CODE = 0x2A
/// - byte 1  : flags (reserved bits dropped)
/// - bytes 2..5  : LBA (big-endian, 32-bit)
/// - byte 6  : GROUP NUMBER
/// - bytes 7..8  : TRANSFER LENGTH (big-endian, 16-bit)
/// - byte 9  : CONTROL
#[inline]
pub fn build_write10(lba: u32, blocks: u16, flags: u8, control: u8) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::WRITE_10;
    cdb[1] = flags & WRITE_FLAGS_MASK;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
    cdb[9] = control;
    cdb
}

/// Build a SCSI **WRITE(16)** CDB (64-bit LBA, 32-bit transfer length).
#[inline]
pub fn build_write16(lba: u64, blocks: u32, flags: u8, control: u8) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = opcode::WRITE_16;
    cdb[1] = flags & WRITE_FLAGS_MASK;
    cdb[2..10].copy_from_slice(&lba.to_be_bytes());
    cdb[10..14].copy_from_slice(&blocks.to_be_bytes());
    cdb[15] = control;
    cdb
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn write10_layout() {
        assert_eq!(
            build_write10(0x10, 1, 0x08, 0),
            hex!("2a 08 00 00 00 10 00 00 01 00")
        );
    }

    #[test]
    fn write16_layout() {
        let cdb = build_write16(7, 0x0001_0000, 0, 0);
        assert_eq!(cdb[0], 0x8a);
        assert_eq!(cdb[9], 7);
        assert_eq!(&cdb[10..14], &hex!("00 01 00 00"));
    }
}
