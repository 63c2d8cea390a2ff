// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REPORT PROVISIONING INITIALIZATION PATTERN (SERVICE ACTION IN(16),
//! SA 0x1D).
//!
//! Parameter data:
//!   [0..4] = PROVISIONING INITIALIZATION PATTERN LENGTH (n - 3)
//!   [4..8] = reserved
//!   [8..]  = pattern

use anyhow::{Result, bail};

use crate::{
    control_block::{common::sai16, service_action::build_service_action_in16},
    utils::get_unaligned_be32,
};

#[inline]
pub fn build_report_provisioning_init_pattern(alloc_len: u32) -> [u8; 16] {
    build_service_action_in16(sai16::REPORT_PROVISIONING_INIT_PATTERN, alloc_len, 0)
}

pub fn parse_provisioning_init_pattern(buf: &[u8]) -> Result<Vec<u8>> {
    if buf.len() < 8 {
        bail!("provisioning pattern buffer too short: {}", buf.len());
    }
    let len = get_unaligned_be32(buf) as usize;
    let pattern_len = len.saturating_sub(4);
    if buf.len() < 8 + pattern_len {
        bail!(
            "provisioning pattern truncated: header says {pattern_len}, have {}",
            buf.len() - 8
        );
    }
    Ok(buf[8..8 + pattern_len].to_vec())
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn cdb_and_pattern() {
        let cdb = build_report_provisioning_init_pattern(0x40);
        assert_eq!(&cdb[..2], &hex!("9e 1d"));
        assert_eq!(&cdb[10..14], &hex!("00 00 00 40"));

        let buf = hex!("00 00 00 08 00 00 00 00 de ad be ef");
        assert_eq!(
            parse_provisioning_init_pattern(&buf).expect("pattern"),
            hex!("de ad be ef")
        );
        assert!(parse_provisioning_init_pattern(&buf[..10]).is_err());
    }
}
