// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! READ BUFFER (10/16) and WRITE BUFFER (10).

use anyhow::{Result, bail};

use crate::{
    control_block::common::opcode,
    utils::{get_unaligned_be24, put_unaligned_be24},
};

/// MODE field values (low 5 bits of byte 1).
pub mod buffer_mode {
    pub const COMBINED_HEADER_DATA: u8 = 0x00;
    pub const VENDOR: u8 = 0x01;
    pub const DATA: u8 = 0x02;
    pub const DESCRIPTOR: u8 = 0x03;
    pub const DOWNLOAD_MICROCODE_SAVE: u8 = 0x05;
    pub const DOWNLOAD_MICROCODE_OFFSETS_SAVE: u8 = 0x07;
    pub const ECHO: u8 = 0x0a;
    pub const ECHO_DESCRIPTOR: u8 = 0x0b;
    pub const DOWNLOAD_MICROCODE_OFFSETS_DEFER: u8 = 0x0e;
    pub const ACTIVATE_DEFERRED_MICROCODE: u8 = 0x0f;
    pub const ERROR_HISTORY: u8 = 0x1c;
}

/// Largest offset / length the 24-bit fields of the (10) CDBs can carry.
pub const BUFFER10_MAX: u32 = 0x00ff_ffff;

/// READ BUFFER(10).
///   [0]=0x3C, [1]=MODE SPECIFIC(7..5)|MODE(4..0), [2]=BUFFER ID,
///   [3..6]=BUFFER OFFSET (BE24), [6..9]=ALLOC_LEN (BE24), [9]=CONTROL
#[inline]
pub fn build_read_buffer10(mode: u8, mode_specific: u8, buffer_id: u8, offset: u32, alloc_len: u32) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::READ_BUFFER_10;
    cdb[1] = ((mode_specific & 0x07) << 5) | (mode & 0x1f);
    cdb[2] = buffer_id;
    put_unaligned_be24(offset & BUFFER10_MAX, &mut cdb[3..]);
    put_unaligned_be24(alloc_len & BUFFER10_MAX, &mut cdb[6..]);
    cdb
}

/// READ BUFFER(16).
///   [0]=0x9B, [1]=MODE SPECIFIC|MODE, [2..10]=BUFFER OFFSET (BE64),
///   [10..14]=ALLOC_LEN (BE32), [14]=BUFFER ID, [15]=CONTROL
#[inline]
pub fn build_read_buffer16(mode: u8, mode_specific: u8, buffer_id: u8, offset: u64, alloc_len: u32) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = opcode::READ_BUFFER_16;
    cdb[1] = ((mode_specific & 0x07) << 5) | (mode & 0x1f);
    cdb[2..10].copy_from_slice(&offset.to_be_bytes());
    cdb[10..14].copy_from_slice(&alloc_len.to_be_bytes());
    cdb[14] = buffer_id;
    cdb
}

/// WRITE BUFFER(10).
///   [0]=0x3B, [1]=MODE SPECIFIC|MODE, [2]=BUFFER ID,
///   [3..6]=BUFFER OFFSET (BE24), [6..9]=PARAM LIST LEN (BE24), [9]=CONTROL
#[inline]
pub fn build_write_buffer10(mode: u8, mode_specific: u8, buffer_id: u8, offset: u32, param_len: u32) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::WRITE_BUFFER;
    cdb[1] = ((mode_specific & 0x07) << 5) | (mode & 0x1f);
    cdb[2] = buffer_id;
    put_unaligned_be24(offset & BUFFER10_MAX, &mut cdb[3..]);
    put_unaligned_be24(param_len & BUFFER10_MAX, &mut cdb[6..]);
    cdb
}

/// Response of READ BUFFER in descriptor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Power-of-two exponent; 0xFF means offsets other than 0 are refused.
    pub offset_boundary: u8,
    pub capacity: u32,
}

impl BufferDescriptor {
    /// Required offset alignment in bytes, `None` when only offset 0 works.
    pub fn alignment(&self) -> Option<u64> {
        (self.offset_boundary != 0xff).then(|| 1u64 << self.offset_boundary.min(63))
    }
}

pub fn parse_buffer_descriptor(buf: &[u8]) -> Result<BufferDescriptor> {
    if buf.len() < 4 {
        bail!("READ BUFFER descriptor too short: {}", buf.len());
    }
    Ok(BufferDescriptor {
        offset_boundary: buf[0],
        capacity: get_unaligned_be24(&buf[1..]),
    })
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn descriptor_mode_cdb() {
        assert_eq!(
            build_read_buffer10(buffer_mode::DESCRIPTOR, 0, 0, 0, 4),
            hex!("3c 03 00 00 00 00 00 00 04 00")
        );
    }

    #[test]
    fn read_buffer16_layout() {
        let cdb = build_read_buffer16(buffer_mode::ERROR_HISTORY, 0, 0x10, 0x1_0000_0000, 0x2000);
        assert_eq!(cdb[0], 0x9b);
        assert_eq!(cdb[1], 0x1c);
        assert_eq!(&cdb[2..10], &hex!("00 00 00 01 00 00 00 00"));
        assert_eq!(&cdb[10..14], &hex!("00 00 20 00"));
        assert_eq!(cdb[14], 0x10);
    }

    #[test]
    fn write_buffer_microcode() {
        assert_eq!(
            build_write_buffer10(buffer_mode::DOWNLOAD_MICROCODE_OFFSETS_SAVE, 0, 0, 0x8000, 0x8000),
            hex!("3b 07 00 00 80 00 00 80 00 00")
        );
    }

    #[test]
    fn descriptor_alignment() {
        let d = parse_buffer_descriptor(&hex!("09 01 00 00")).expect("descriptor");
        assert_eq!(d.alignment(), Some(512));
        assert_eq!(d.capacity, 0x010000);
        let d = parse_buffer_descriptor(&hex!("ff 00 00 10")).expect("descriptor");
        assert_eq!(d.alignment(), None);
    }
}
