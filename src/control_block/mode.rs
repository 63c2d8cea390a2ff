// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! MODE SENSE / MODE SELECT (6 / 10): CDB builders, the mode parameter
//! header and the page walker.

use anyhow::{Result, bail};

use crate::{
    control_block::common::opcode,
    utils::get_unaligned_be16,
};

/// Page Control (PC) for MODE SENSE byte 2 (bits 7..6).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PageControl {
    Current = 0b00,
    Changeable = 0b01,
    Default = 0b10,
    Saved = 0b11,
}

/// Page code that returns every page.
pub const ALL_PAGES: u8 = 0x3f;

#[inline]
fn pc_page(pc: PageControl, page_code: u8) -> u8 {
    ((pc as u8) << 6) | (page_code & 0x3F)
}

/// MODE SENSE(6).
/// Layout:
///   [0]=0x1A, [1]=DBD<<3, [2]=PC(7..6)|PAGE(5..0), [3]=SUBPAGE, [4]=ALLOC_LEN,
///   [5]=CONTROL
#[inline]
pub fn build_mode_sense6(
    dbd: bool,
    pc: PageControl,
    page_code: u8,
    subpage_code: u8,
    allocation_len: u8,
    control: u8,
) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::MODE_SENSE_6;
    cdb[1] = (dbd as u8) << 3;
    cdb[2] = pc_page(pc, page_code);
    cdb[3] = subpage_code;
    cdb[4] = allocation_len;
    cdb[5] = control;
    cdb
}

/// MODE SENSE(10).
/// Layout:
///   [0]=0x5A, [1]=LLBAA<<4|DBD<<3, [2]=PC|PAGE, [3]=SUBPAGE,
///   [7..9]=ALLOC_LEN (BE), [9]=CONTROL
#[allow(clippy::too_many_arguments)]
#[inline]
pub fn build_mode_sense10(
    llbaa: bool,
    dbd: bool,
    pc: PageControl,
    page_code: u8,
    subpage_code: u8,
    allocation_len: u16,
    control: u8,
) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::MODE_SENSE_10;
    cdb[1] = ((llbaa as u8) << 4) | ((dbd as u8) << 3);
    cdb[2] = pc_page(pc, page_code);
    cdb[3] = subpage_code;
    cdb[7..9].copy_from_slice(&allocation_len.to_be_bytes());
    cdb[9] = control;
    cdb
}

/// MODE SELECT(6): `[1]=PF<<4|SP`, `[4]=PARAM LIST LEN`.
#[inline]
pub fn build_mode_select6(pf: bool, sp: bool, param_len: u8, control: u8) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::MODE_SELECT_6;
    cdb[1] = ((pf as u8) << 4) | (sp as u8);
    cdb[4] = param_len;
    cdb[5] = control;
    cdb
}

/// MODE SELECT(10): `[1]=PF<<4|SP`, `[7..9]=PARAM LIST LEN`.
#[inline]
pub fn build_mode_select10(pf: bool, sp: bool, param_len: u16, control: u8) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::MODE_SELECT_10;
    cdb[1] = ((pf as u8) << 4) | (sp as u8);
    cdb[7..9].copy_from_slice(&param_len.to_be_bytes());
    cdb[9] = control;
    cdb
}

/// Decoded mode parameter header (either size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeHeader {
    /// MODE DATA LENGTH, excluding itself.
    pub mode_data_len: u16,
    pub medium_type: u8,
    pub device_specific: u8,
    pub long_lba: bool,
    pub block_desc_len: u16,
    /// 4 for the (6) header, 8 for the (10) one.
    pub header_len: usize,
}

impl ModeHeader {
    /// WP bit of the device-specific parameter (direct-access devices).
    pub fn write_protected(&self) -> bool {
        self.device_specific & 0x80 != 0
    }

    /// Offset of the first mode page.
    pub fn pages_offset(&self) -> usize {
        self.header_len + self.block_desc_len as usize
    }

    /// Total bytes the device wanted to return.
    pub fn total_len(&self) -> usize {
        self.mode_data_len as usize + if self.header_len == 4 { 1 } else { 2 }
    }
}

pub fn parse_mode_header6(buf: &[u8]) -> Result<ModeHeader> {
    if buf.len() < 4 {
        bail!("MODE SENSE(6) header too short: {}", buf.len());
    }
    Ok(ModeHeader {
        mode_data_len: buf[0] as u16,
        medium_type: buf[1],
        device_specific: buf[2],
        long_lba: false,
        block_desc_len: buf[3] as u16,
        header_len: 4,
    })
}

pub fn parse_mode_header10(buf: &[u8]) -> Result<ModeHeader> {
    if buf.len() < 8 {
        bail!("MODE SENSE(10) header too short: {}", buf.len());
    }
    Ok(ModeHeader {
        mode_data_len: get_unaligned_be16(buf),
        medium_type: buf[2],
        device_specific: buf[3],
        long_lba: buf[4] & 0x01 != 0,
        block_desc_len: get_unaligned_be16(&buf[6..]),
        header_len: 8,
    })
}

/// One mode page as returned by MODE SENSE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModePage {
    pub page_code: u8,
    pub subpage_code: u8,
    /// Parameters savable.
    pub ps: bool,
    /// Page body after the 2- or 4-byte page header.
    pub data: Vec<u8>,
}

/// Walk the pages after the header and block descriptors. Stops at the
/// end of the mode data or the buffer, whichever comes first.
pub fn parse_mode_pages(buf: &[u8], hdr: &ModeHeader) -> Result<Vec<ModePage>> {
    let end = hdr.total_len().min(buf.len());
    let mut off = hdr.pages_offset();
    if off > end {
        bail!("block descriptors ({}) overrun mode data ({end})", hdr.block_desc_len);
    }
    let mut pages = Vec::new();
    while off + 2 <= end {
        let b0 = buf[off];
        let spf = b0 & 0x40 != 0;
        let (subpage, body_len, hlen) = if spf {
            if off + 4 > end {
                break;
            }
            (buf[off + 1], get_unaligned_be16(&buf[off + 2..]) as usize, 4)
        } else {
            (0, buf[off + 1] as usize, 2)
        };
        let start = off + hlen;
        let stop = (start + body_len).min(end);
        pages.push(ModePage {
            page_code: b0 & 0x3f,
            subpage_code: subpage,
            ps: b0 & 0x80 != 0,
            data: buf[start..stop].to_vec(),
        });
        off = start + body_len;
    }
    Ok(pages)
}
