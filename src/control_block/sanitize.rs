// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SANITIZE (SBC-3, opcode 0x48).
//!
//! CDB layout:
//!   [0] = 0x48
//!   [1] = IMMED(7) | ZNR(6) | AUSE(5) | SERVICE ACTION(4..0)
//!   [7..9] = PARAMETER LIST LENGTH (BE)
//!   [9] = CONTROL

use anyhow::{Result, ensure};

use crate::control_block::common::opcode;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SanitizeAction {
    Overwrite = 0x01,
    BlockErase = 0x02,
    CryptoErase = 0x03,
    ExitFailureMode = 0x1f,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeOptions {
    pub action: SanitizeAction,
    pub immed: bool,
    /// Zoned no reset.
    pub znr: bool,
    /// Allow unrestricted sanitize exit.
    pub ause: bool,
}

impl SanitizeOptions {
    pub fn new(action: SanitizeAction) -> Self {
        Self {
            action,
            immed: false,
            znr: false,
            ause: false,
        }
    }
}

#[inline]
pub fn build_sanitize(opts: &SanitizeOptions, param_len: u16) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode::SANITIZE;
    cdb[1] = ((opts.immed as u8) << 7)
        | ((opts.znr as u8) << 6)
        | ((opts.ause as u8) << 5)
        | (opts.action as u8 & 0x1f);
    cdb[7..9].copy_from_slice(&param_len.to_be_bytes());
    cdb
}

/// OVERWRITE parameter list: header plus the initialization pattern.
pub fn overwrite_param_list(invert: bool, test: u8, count: u8, pattern: &[u8]) -> Result<Vec<u8>> {
    ensure!(!pattern.is_empty(), "overwrite pattern must not be empty");
    ensure!(
        (1..=0x1f).contains(&count),
        "overwrite count {count} out of range 1..=31"
    );
    let plen = u16::try_from(pattern.len())?;
    let mut p = Vec::with_capacity(4 + pattern.len());
    p.push(((invert as u8) << 7) | ((test & 0x03) << 5) | count);
    p.push(0);
    p.extend_from_slice(&plen.to_be_bytes());
    p.extend_from_slice(pattern);
    Ok(p)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn block_erase_immed() {
        let mut o = SanitizeOptions::new(SanitizeAction::BlockErase);
        o.immed = true;
        assert_eq!(build_sanitize(&o, 0), hex!("48 82 00 00 00 00 00 00 00 00"));
        let mut o = SanitizeOptions::new(SanitizeAction::ExitFailureMode);
        o.ause = true;
        assert_eq!(build_sanitize(&o, 0)[1], 0x3f);
    }

    #[test]
    fn overwrite_list() {
        let p = overwrite_param_list(true, 0, 3, &[0xa5, 0x5a]).expect("param list");
        assert_eq!(p, hex!("83 00 00 02 a5 5a"));
        assert!(overwrite_param_list(false, 0, 0, &[0]).is_err());
        assert!(overwrite_param_list(false, 0, 1, &[]).is_err());
    }
}
