// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! LOG SENSE / LOG SELECT CDB builders and log page parsing.

use anyhow::{Result, bail};

use crate::{
    control_block::{common::opcode, mode::PageControl},
    utils::get_unaligned_be16,
};

/// Supported log pages.
pub const SUPPORTED_PAGES: u8 = 0x00;
pub const TEMPERATURE_PAGE: u8 = 0x0d;
pub const SELF_TEST_RESULTS_PAGE: u8 = 0x10;

/// LOG SENSE.
///   [0]=0x4D, [1]=SP(bit0), [2]=PC|PAGE, [3]=SUBPAGE,
///   [5..7]=PARAMETER POINTER, [7..9]=ALLOC_LEN, [9]=CONTROL
#[inline]
pub fn build_log_sense(
    sp: bool,
    pc: PageControl,
    page_code: u8,
    subpage_code: u8,
    param_pointer: u16,
    allocation_len: u16,
) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::LOG_SENSE;
    cdb[1] = sp as u8;
    cdb[2] = ((pc as u8) << 6) | (page_code & 0x3f);
    cdb[3] = subpage_code;
    cdb[5..7].copy_from_slice(&param_pointer.to_be_bytes());
    cdb[7..9].copy_from_slice(&allocation_len.to_be_bytes());
    cdb
}

/// LOG SELECT. With `pcr` set and no parameter list the device resets its
/// cumulative counters.
///   [0]=0x4C, [1]=PCR<<1|SP, [2]=PC|PAGE, [3]=SUBPAGE, [7..9]=PARAM LIST LEN
#[inline]
pub fn build_log_select(
    pcr: bool,
    sp: bool,
    pc: PageControl,
    page_code: u8,
    subpage_code: u8,
    param_len: u16,
) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::LOG_SELECT;
    cdb[1] = ((pcr as u8) << 1) | (sp as u8);
    cdb[2] = ((pc as u8) << 6) | (page_code & 0x3f);
    cdb[3] = subpage_code;
    cdb[7..9].copy_from_slice(&param_len.to_be_bytes());
    cdb
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPageHeader {
    pub page_code: u8,
    pub subpage_code: u8,
    /// Disable Save.
    pub ds: bool,
    pub spf: bool,
    pub page_len: u16,
}

pub fn parse_log_header(buf: &[u8]) -> Result<LogPageHeader> {
    if buf.len() < 4 {
        bail!("log page too short: {}", buf.len());
    }
    Ok(LogPageHeader {
        page_code: buf[0] & 0x3f,
        subpage_code: buf[1],
        ds: buf[0] & 0x80 != 0,
        spf: buf[0] & 0x40 != 0,
        page_len: get_unaligned_be16(&buf[2..]),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogParameter {
    pub code: u16,
    /// DU | TSD | ETC | TMC | FORMAT AND LINKING.
    pub control: u8,
    pub value: Vec<u8>,
}

impl LogParameter {
    /// Big-endian counter value; wider than 8 bytes keeps the low 8.
    pub fn as_u64(&self) -> u64 {
        self.value
            .iter()
            .rev()
            .take(8)
            .rev()
            .fold(0u64, |acc, b| (acc << 8) | *b as u64)
    }
}

/// Split the page body into parameters. A parameter whose length runs past
/// the page is an error.
pub fn parse_log_parameters(buf: &[u8]) -> Result<(LogPageHeader, Vec<LogParameter>)> {
    let hdr = parse_log_header(buf)?;
    let end = 4 + hdr.page_len as usize;
    if buf.len() < end {
        bail!(
            "log page 0x{:02x} truncated: header says {}, have {}",
            hdr.page_code,
            hdr.page_len,
            buf.len() - 4
        );
    }
    let mut params = Vec::new();
    let mut off = 4;
    while off + 4 <= end {
        let len = buf[off + 3] as usize;
        let start = off + 4;
        if start + len > end {
            bail!("log parameter at {off} overruns the page");
        }
        params.push(LogParameter {
            code: get_unaligned_be16(&buf[off..]),
            control: buf[off + 2],
            value: buf[start..start + len].to_vec(),
        });
        off = start + len;
    }
    Ok((hdr, params))
}

/// Page list of the supported-pages page (0x00).
pub fn parse_supported_log_pages(buf: &[u8]) -> Result<Vec<u8>> {
    let hdr = parse_log_header(buf)?;
    let end = (4 + hdr.page_len as usize).min(buf.len());
    Ok(buf[4..end].iter().map(|p| p & 0x3f).collect())
}
