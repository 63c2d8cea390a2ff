// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SEND DIAGNOSTIC / RECEIVE DIAGNOSTIC RESULTS.

use anyhow::{Result, bail};

use crate::{control_block::common::opcode, utils::get_unaligned_be16};

/// SELF-TEST CODE values (byte 1, bits 7..5).
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SelfTestCode {
    Default = 0,
    BackgroundShort = 1,
    BackgroundExtended = 2,
    AbortBackground = 4,
    ForegroundShort = 5,
    ForegroundExtended = 6,
}

/// SEND DIAGNOSTIC.
///   [0]=0x1D, [1]=SELF-TEST CODE(7..5)|PF<<4|SELFTEST<<2|DEVOFFL<<1|UNITOFFL,
///   [3..5]=PARAM LIST LEN, [5]=CONTROL
#[inline]
pub fn build_send_diagnostic(code: SelfTestCode, pf: bool, selftest: bool, param_len: u16) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::SEND_DIAGNOSTIC;
    cdb[1] = ((code as u8) << 5) | ((pf as u8) << 4) | ((selftest as u8) << 2);
    cdb[3..5].copy_from_slice(&param_len.to_be_bytes());
    cdb
}

/// RECEIVE DIAGNOSTIC RESULTS.
///   [0]=0x1C, [1]=PCV, [2]=PAGE CODE, [3..5]=ALLOC_LEN, [5]=CONTROL
#[inline]
pub fn build_receive_diagnostic(pcv: bool, page_code: u8, alloc_len: u16) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::RECEIVE_DIAGNOSTIC;
    cdb[1] = pcv as u8;
    cdb[2] = if pcv { page_code } else { 0 };
    cdb[3..5].copy_from_slice(&alloc_len.to_be_bytes());
    cdb
}

/// Diagnostic page: (page code, body).
pub fn parse_diagnostic_page(buf: &[u8]) -> Result<(u8, &[u8])> {
    if buf.len() < 4 {
        bail!("diagnostic page too short: {}", buf.len());
    }
    let len = get_unaligned_be16(&buf[2..]) as usize;
    if buf.len() < 4 + len {
        bail!(
            "diagnostic page 0x{:02x} truncated: header says {len}, have {}",
            buf[0],
            buf.len() - 4
        );
    }
    Ok((buf[0], &buf[4..4 + len]))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn cdbs() {
        assert_eq!(
            build_send_diagnostic(SelfTestCode::BackgroundShort, false, false, 0),
            hex!("1d 20 00 00 00 00")
        );
        assert_eq!(
            build_send_diagnostic(SelfTestCode::Default, true, true, 0)[1],
            0x14
        );
        assert_eq!(build_receive_diagnostic(true, 0x02, 0x400), hex!("1c 01 02 04 00 00"));
    }

    #[test]
    fn page_parse() {
        let (pc, body) = parse_diagnostic_page(&hex!("00 00 00 02 00 02")).expect("page");
        assert_eq!(pc, 0);
        assert_eq!(body, &[0x00, 0x02]);
        assert!(parse_diagnostic_page(&hex!("02 00 00 08 00")).is_err());
    }
}
