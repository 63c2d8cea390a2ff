// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, anyhow};
use zerocopy::{
    FromBytes, Immutable, KnownLayout,
    byteorder::{BigEndian, U32, U64},
};

use crate::control_block::{
    common::{opcode, sai16},
    service_action::build_service_action_in16,
};

/// Response length of READ CAPACITY(10).
pub const RC10_LEN: usize = 8;
/// Full response length of READ CAPACITY(16).
pub const RC16_LEN: usize = 32;

/// Build a **SCSI READ CAPACITY(10)** CDB (opcode 0x25).
///
/// Notes:
/// - With `pmi = false`, targets return the **maximum LBA** (last logical
///   block) and the **logical block length** (8-byte response).
/// - If the device is larger than 2 TB, the Max LBA will be `0xFFFF_FFFF`,
///   which is a hint to issue **READ CAPACITY(16)** instead.
#[inline]
pub fn build_read_capacity10(lba: u32, pmi: bool, control: u8) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::READ_CAPACITY_10;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes()); // only used if PMI=1
    cdb[8] = pmi as u8;
    cdb[9] = control;
    cdb
}

/// Build a **SCSI READ CAPACITY(16)** CDB via SERVICE ACTION IN(16)
/// (opcode 0x9E, SA=0x10). Use `alloc_len = 32` to get full data.
#[inline]
pub fn build_read_capacity16(lba: u64, pmi: bool, alloc_len: u32, control: u8) -> [u8; 16] {
    let mut cdb = build_service_action_in16(sai16::READ_CAPACITY_16, alloc_len, control);
    cdb[2..10].copy_from_slice(&lba.to_be_bytes());
    cdb[14] = pmi as u8;
    cdb
}

/// Raw 8-byte parameter data returned by READ CAPACITY(10) command
///
/// All fields are stored in big-endian format as SBC lays them out.
#[repr(C)]
#[derive(FromBytes, KnownLayout, Immutable, Debug)]
pub struct Rc10Raw {
    /// Maximum logical block address (bytes 0-3) - highest valid LBA on the device
    pub max_lba: U32<BigEndian>,
    /// Block length in bytes (bytes 4-7) - size of each logical block
    pub block_len: U32<BigEndian>,
}

/// Raw 32-byte READ CAPACITY(16) parameter data.
#[repr(C)]
#[derive(FromBytes, KnownLayout, Immutable, Debug)]
pub struct Rc16Raw {
    /// Maximum logical block address (bytes 0-7) - 64-bit LBA for large devices
    pub max_lba: U64<BigEndian>,
    /// Block length in bytes (bytes 8-11) - size of each logical block
    pub block_len: U32<BigEndian>,
    /// byte 12: P_TYPE[3:1] | PROT_EN[0]
    pub prot: u8,
    /// byte 13: P_I_EXPONENT[7:4] | LOGICAL BLOCKS PER PHYSICAL BLOCK EXPONENT[3:0]
    pub exponents: u8,
    /// bytes 14-15: LBPME | LBPRZ | LOWEST ALIGNED LBA
    pub lbp: [u8; 2],
    reserved: [u8; 16],
}

impl Rc10Raw {
    #[inline]
    pub fn total_bytes(&self) -> u64 {
        (self.max_lba.get() as u64 + 1) * self.block_len.get() as u64
    }

    /// If true, target likely needs READ CAPACITY(16).
    #[inline]
    pub fn indicates_overflow(&self) -> bool {
        self.max_lba == u32::MAX
    }
}

impl Rc16Raw {
    #[inline]
    pub fn total_bytes(&self) -> u128 {
        (self.max_lba.get() as u128 + 1) * self.block_len.get() as u128
    }

    #[inline]
    pub fn protection_enabled(&self) -> bool {
        self.prot & 0x01 != 0
    }

    /// Protection type 1..=3, or 0 when protection is off.
    #[inline]
    pub fn protection_type(&self) -> u8 {
        if self.protection_enabled() {
            ((self.prot >> 1) & 0x07) + 1
        } else {
            0
        }
    }

    #[inline]
    pub fn logical_per_physical(&self) -> u32 {
        1u32 << (self.exponents & 0x0f)
    }

    /// Logical block provisioning management enabled (thin provisioned).
    #[inline]
    pub fn lbpme(&self) -> bool {
        self.lbp[0] & 0x80 != 0
    }

    /// Unmapped blocks read back as zeros.
    #[inline]
    pub fn lbprz(&self) -> bool {
        self.lbp[0] & 0x40 != 0
    }

    #[inline]
    pub fn lowest_aligned_lba(&self) -> u16 {
        u16::from_be_bytes([self.lbp[0] & 0x3f, self.lbp[1]])
    }
}

/// Parse READ CAPACITY(10) parameter data (needs ≥ 8 bytes).
#[inline]
pub fn parse_read_capacity10_zerocopy(buf: &[u8]) -> Result<&Rc10Raw> {
    let (raw, _rest) = Rc10Raw::ref_from_prefix(buf)
        .map_err(|_| anyhow!("READ CAPACITY(10): need ≥ 8 bytes, got {}", buf.len()))?;
    Ok(raw)
}

/// Parse READ CAPACITY(16) parameter data (needs the full 32 bytes).
#[inline]
pub fn parse_read_capacity16_zerocopy(buf: &[u8]) -> Result<&Rc16Raw> {
    let (raw, _rest) = Rc16Raw::ref_from_prefix(buf)
        .map_err(|_| anyhow!("READ CAPACITY(16): need ≥ 32 bytes, got {}", buf.len()))?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn cdbs() {
        assert_eq!(build_read_capacity10(0, false, 0), hex!("25 00 00 00 00 00 00 00 00 00"));
        assert_eq!(
            build_read_capacity16(0, false, 32, 0),
            hex!("9e 10 00 00 00 00 00 00 00 00 00 00 00 20 00 00")
        );
    }

    #[test]
    fn rc10_overflow() {
        let rc = parse_read_capacity10_zerocopy(&hex!("ff ff ff ff 00 00 02 00"))
            .expect("rc10");
        assert!(rc.indicates_overflow());
        assert!(parse_read_capacity10_zerocopy(&[0u8; 7]).is_err());
    }

    #[test]
    fn rc16_fields() {
        let mut b = [0u8; 32];
        b[0..8].copy_from_slice(&hex!("00 00 00 00 00 0f ff ff"));
        b[8..12].copy_from_slice(&hex!("00 00 02 00"));
        b[12] = 0x03; // type 2, enabled
        b[13] = 0x03; // 8 logical per physical
        b[14] = 0xc0;
        let rc = parse_read_capacity16_zerocopy(&b).expect("rc16");
        assert_eq!(rc.total_bytes(), 0x10_0000 * 512);
        assert_eq!(rc.protection_type(), 2);
        assert_eq!(rc.logical_per_physical(), 8);
        assert!(rc.lbpme() && rc.lbprz());
        assert!(parse_read_capacity16_zerocopy(&b[..12]).is_err());
    }
}
