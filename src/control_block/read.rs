// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::control_block::common::opcode;

/// Flag bits accepted in byte 1: RDPROTECT[7:5] | DPO[4] | FUA[3].
const READ_FLAGS_MASK: u8 = 0b1111_1000;

/// Build a **SCSI READ(10)** CDB.
///
/// Parameters:
/// - `lba`     : 32-bit Logical Block Address to start reading from
/// - `blocks`  : number of logical blocks to transfer (0 => no data)
/// - `flags`   : RDPROTECT[7:5] | DPO[4] | FUA[3] (other bits are dropped)
/// - `control` : CONTROL byte
///
/// Layout (SBC):
/// - byte 0      : OPERATION CODE = 0x28
/// - byte 1      : flags
/// - bytes 2..5  : LBA (big-endian, 32-bit)
/// - byte 6      : GROUP NUMBER
/// - bytes 7..8  : TRANSFER LENGTH (big-endian, 16-bit)
/// - byte 9      : CONTROL
#[inline]
pub fn build_read10(lba: u32, blocks: u16, flags: u8, control: u8) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::READ_10;
    cdb[1] = flags & READ_FLAGS_MASK;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
    cdb[9] = control;
    cdb
}

/// Build a **SCSI READ(16)** CDB.
///
/// Layout (SBC):
/// - byte  0      : OPERATION CODE = 0x88
/// - byte  1      : flags
/// - bytes 2..9   : LBA (big-endian, 64-bit)
/// - bytes 10..13 : TRANSFER LENGTH (big-endian, 32-bit)
/// - byte  14     : GROUP NUMBER
/// - byte  15     : CONTROL
#[inline]
pub fn build_read16(lba: u64, blocks: u32, flags: u8, control: u8) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = opcode::READ_16;
    cdb[1] = flags & READ_FLAGS_MASK;
    cdb[2..10].copy_from_slice(&lba.to_be_bytes());
    cdb[10..14].copy_from_slice(&blocks.to_be_bytes());
    cdb[15] = control;
    cdb
}
