// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! FORMAT UNIT (SBC) and FORMAT MEDIUM (SSC); both use opcode 0x04.

use crate::control_block::common::opcode;

/// Options of FORMAT UNIT byte 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatUnitOptions {
    /// Protection type selector, 0..=3.
    pub fmtpinfo: u8,
    pub longlist: bool,
    /// A parameter list follows.
    pub fmtdata: bool,
    pub cmplst: bool,
    pub defect_list_format: u8,
}

/// FORMAT UNIT(6).
///   [0]=0x04, [1]=FMTPINFO(7..6)|LONGLIST|FMTDATA|CMPLST|DEFECT LIST FORMAT(2..0),
///   [5]=CONTROL
#[inline]
pub fn build_format_unit(opts: &FormatUnitOptions) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::FORMAT_UNIT;
    cdb[1] = ((opts.fmtpinfo & 0x03) << 6)
        | ((opts.longlist as u8) << 5)
        | ((opts.fmtdata as u8) << 4)
        | ((opts.cmplst as u8) << 3)
        | (opts.defect_list_format & 0x07);
    cdb
}

/// Short (4-byte) FORMAT UNIT parameter list header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatParamHeader {
    pub protection_field_usage: u8,
    /// Format options valid.
    pub fov: bool,
    pub dpry: bool,
    pub dcrt: bool,
    pub stpf: bool,
    pub ip: bool,
    /// Return before the format completes; progress is then polled.
    pub immed: bool,
    pub defect_list_len: u16,
}

impl FormatParamHeader {
    pub fn to_bytes(&self) -> [u8; 4] {
        let mut b = [0u8; 4];
        b[0] = self.protection_field_usage & 0x07;
        b[1] = ((self.fov as u8) << 7)
            | ((self.dpry as u8) << 6)
            | ((self.dcrt as u8) << 5)
            | ((self.stpf as u8) << 4)
            | ((self.ip as u8) << 3)
            | ((self.immed as u8) << 1);
        b[2..4].copy_from_slice(&self.defect_list_len.to_be_bytes());
        b
    }
}

/// FORMAT MEDIUM (SSC).
///   [0]=0x04, [1]=VERIFY<<1|IMMED, [2]=FORMAT(3..0), [3..5]=TRANSFER LENGTH
#[inline]
pub fn build_format_medium(verify: bool, immed: bool, format: u8, xfer_len: u16) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::FORMAT_MEDIUM;
    cdb[1] = ((verify as u8) << 1) | (immed as u8);
    cdb[2] = format & 0x0f;
    cdb[3..5].copy_from_slice(&xfer_len.to_be_bytes());
    cdb
}
