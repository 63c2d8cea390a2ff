// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SAT ATA PASS-THROUGH (12) and (16) CDB builders, plus the ATA IDENTIFY
//! string helper.

use crate::control_block::common::opcode;

/// ATA command codes used by the helpers.
pub mod ata_cmd {
    pub const IDENTIFY_DEVICE: u8 = 0xec;
    pub const CHECK_POWER_MODE: u8 = 0xe5;
    pub const SMART: u8 = 0xb0;
}

/// PROTOCOL field (byte 1, bits 4..1).
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AtaProtocol {
    HardReset = 0,
    SoftReset = 1,
    NonData = 3,
    PioDataIn = 4,
    PioDataOut = 5,
    Dma = 6,
    ExecuteDeviceDiagnostic = 8,
    UdmaDataIn = 10,
    UdmaDataOut = 11,
    ReturnResponseInfo = 15,
}

/// T_LENGTH: where the transfer length lives.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TLength {
    #[default]
    None = 0,
    Features = 1,
    SectorCount = 2,
    Tpsiu = 3,
}

/// Task file and transfer description for one pass-through command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtaCommand {
    pub protocol: AtaProtocol,
    /// 48-bit command (16-byte CDB only).
    pub extend: bool,
    pub ck_cond: bool,
    pub t_dir_in: bool,
    /// Length counted in blocks rather than bytes.
    pub byte_block: bool,
    pub t_length: TLength,
    pub features: u16,
    pub count: u16,
    pub lba: u64,
    pub device: u8,
    pub command: u8,
}

impl AtaCommand {
    pub fn non_data(command: u8) -> Self {
        Self {
            protocol: AtaProtocol::NonData,
            extend: false,
            ck_cond: false,
            t_dir_in: false,
            byte_block: false,
            t_length: TLength::None,
            features: 0,
            count: 0,
            lba: 0,
            device: 0,
            command,
        }
    }

    /// IDENTIFY DEVICE: one 512-byte block, PIO data-in.
    pub fn identify_device() -> Self {
        Self {
            protocol: AtaProtocol::PioDataIn,
            t_dir_in: true,
            byte_block: true,
            t_length: TLength::SectorCount,
            count: 1,
            device: 0xa0,
            ..Self::non_data(ata_cmd::IDENTIFY_DEVICE)
        }
    }

    fn flags_byte(&self) -> u8 {
        ((self.ck_cond as u8) << 5)
            | ((self.t_dir_in as u8) << 3)
            | ((self.byte_block as u8) << 2)
            | (self.t_length as u8)
    }
}

/// ATA PASS-THROUGH(12); 28-bit registers only.
#[inline]
pub fn build_ata_pt12(cmd: &AtaCommand) -> [u8; 12] {
    let mut cdb = [0u8; 12];
    cdb[0] = opcode::ATA_PASS_THROUGH_12;
    cdb[1] = (cmd.protocol as u8) << 1;
    cdb[2] = cmd.flags_byte();
    cdb[3] = cmd.features as u8;
    cdb[4] = cmd.count as u8;
    cdb[5] = cmd.lba as u8;
    cdb[6] = (cmd.lba >> 8) as u8;
    cdb[7] = (cmd.lba >> 16) as u8;
    cdb[8] = cmd.device;
    cdb[9] = cmd.command;
    cdb
}

/// ATA PASS-THROUGH(16). With `extend` the high-order register bytes are
/// carried in the even offsets.
#[inline]
pub fn build_ata_pt16(cmd: &AtaCommand) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = opcode::ATA_PASS_THROUGH_16;
    cdb[1] = ((cmd.protocol as u8) << 1) | (cmd.extend as u8);
    cdb[2] = cmd.flags_byte();
    let lba = cmd.lba.to_le_bytes();
    if cmd.extend {
        cdb[3] = (cmd.features >> 8) as u8;
        cdb[5] = (cmd.count >> 8) as u8;
        cdb[7] = lba[3];
        cdb[9] = lba[4];
        cdb[11] = lba[5];
    }
    cdb[4] = cmd.features as u8;
    cdb[6] = cmd.count as u8;
    cdb[8] = lba[0];
    cdb[10] = lba[1];
    cdb[12] = lba[2];
    cdb[13] = cmd.device;
    cdb[14] = cmd.command;
    cdb
}

/// ATA strings are stored as big-endian 16-bit words. `words` is the word
/// range within the 512-byte IDENTIFY block, e.g. 27..47 for the model.
pub fn ata_string(identify: &[u8], words: std::ops::Range<usize>) -> String {
    let start = (words.start * 2).min(identify.len());
    let end = (words.end * 2).min(identify.len());
    let mut out: Vec<u8> = identify[start..end]
        .chunks_exact(2)
        .flat_map(|w| [w[1], w[0]])
        .collect();
    while out.last().is_some_and(|b| *b == b' ' || *b == 0) {
        out.pop();
    }
    String::from_utf8_lossy(&out).trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn identify_16() {
        assert_eq!(
            build_ata_pt16(&AtaCommand::identify_device()),
            hex!("85 08 0e 00 00 00 01 00 00 00 00 00 00 a0 ec 00")
        );
    }

    #[test]
    fn smart_return_status_12() {
        let mut c = AtaCommand::non_data(ata_cmd::SMART);
        c.ck_cond = true;
        c.features = 0xda;
        c.lba = 0xc2_4f00;
        assert_eq!(
            build_ata_pt12(&c),
            hex!("a1 06 20 da 00 00 4f c2 00 b0 00 00")
        );
    }

    #[test]
    fn extended_registers() {
        let mut c = AtaCommand::non_data(0x24);
        c.extend = true;
        c.count = 0x0102;
        c.lba = 0x0000_0605_0403_0201;
        let cdb = build_ata_pt16(&c);
        assert_eq!(cdb[1], 0x07);
        assert_eq!(&cdb[5..13], &hex!("01 02 04 01 05 02 06 03"));
    }

    #[test]
    fn identify_strings_are_byte_swapped() {
        let mut id = [0u8; 512];
        id[54..62].copy_from_slice(b"ASSMNU G");
        id[62..94].fill(b' ');
        assert_eq!(ata_string(&id, 27..47), "SAMSUNG");
    }
}
