// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Capacity and provisioning queries: READ CAPACITY, REPORT LUNS, GET LBA
//! STATUS, REPORT PROVISIONING INITIALIZATION PATTERN and REPORT SUPPORTED
//! OPERATION CODES.

use crate::{
    control_block::{
        provisioning::{build_report_provisioning_init_pattern, parse_provisioning_init_pattern},
        read_capacity::{
            RC10_LEN, RC16_LEN, build_read_capacity10, build_read_capacity16,
            parse_read_capacity10_zerocopy, parse_read_capacity16_zerocopy,
        },
        report_luns::{LunList, build_report_luns_simple, parse_report_luns},
        service_action::{
            CommandDescriptor, LbaStatusDescriptor, OneCommand, RsocOptions,
            build_get_lba_status, build_report_supported_opcodes, parse_lba_status,
            parse_supported_opcodes_all, parse_supported_opcodes_one,
        },
    },
    handlers::common::{HelperOpts, exec_in, malformed},
    models::error::PtError,
    pt::session::PtTarget,
};

/// Capacity as reported by either READ CAPACITY variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub last_lba: u64,
    pub block_len: u32,
    /// 0 when protection is off or unknown.
    pub protection_type: u8,
    pub logical_per_physical: u32,
    pub thin_provisioned: bool,
}

impl Capacity {
    pub fn total_bytes(&self) -> u128 {
        (self.last_lba as u128 + 1) * self.block_len as u128
    }
}

pub fn read_capacity10<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<Capacity, PtError> {
    let data = exec_in(target, &build_read_capacity10(0, false, 0), RC10_LEN, opts)?;
    let rc = malformed(parse_read_capacity10_zerocopy(&data))?;
    Ok(Capacity {
        last_lba: rc.max_lba.get() as u64,
        block_len: rc.block_len.get(),
        protection_type: 0,
        logical_per_physical: 1,
        thin_provisioned: false,
    })
}

pub fn read_capacity16<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<Capacity, PtError> {
    let data = exec_in(
        target,
        &build_read_capacity16(0, false, RC16_LEN as u32, 0),
        RC16_LEN,
        opts,
    )?;
    let rc = malformed(parse_read_capacity16_zerocopy(&data))?;
    Ok(Capacity {
        last_lba: rc.max_lba.get(),
        block_len: rc.block_len.get(),
        protection_type: rc.protection_type(),
        logical_per_physical: rc.logical_per_physical(),
        thin_provisioned: rc.lbpme(),
    })
}

/// READ CAPACITY(10), falling back to (16) when the LBA does not fit.
pub fn read_capacity<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<Capacity, PtError> {
    let cap = read_capacity10(target, opts)?;
    if cap.last_lba == u32::MAX as u64 {
        read_capacity16(target, opts)
    } else {
        Ok(cap)
    }
}

pub fn report_luns<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<LunList, PtError> {
    const ALLOC: u32 = 8 + 8 * 256;
    let data = exec_in(target, &build_report_luns_simple(ALLOC), ALLOC as usize, opts)?;
    malformed(parse_report_luns(&data))
}

pub fn get_lba_status<T: PtTarget + ?Sized>(
    target: &T,
    start_lba: u64,
    opts: &HelperOpts,
) -> Result<Vec<LbaStatusDescriptor>, PtError> {
    const ALLOC: u32 = 8 + 16 * 64;
    let data = exec_in(target, &build_get_lba_status(start_lba, ALLOC), ALLOC as usize, opts)?;
    malformed(parse_lba_status(&data))
}

pub fn provisioning_init_pattern<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<Vec<u8>, PtError> {
    const ALLOC: u32 = 512;
    let data = exec_in(
        target,
        &build_report_provisioning_init_pattern(ALLOC),
        ALLOC as usize,
        opts,
    )?;
    malformed(parse_provisioning_init_pattern(&data))
}

pub fn supported_opcodes<T: PtTarget + ?Sized>(
    target: &T,
    with_timeouts: bool,
    opts: &HelperOpts,
) -> Result<Vec<CommandDescriptor>, PtError> {
    const ALLOC: u32 = 0x8000;
    let cdb = build_report_supported_opcodes(with_timeouts, RsocOptions::All, 0, 0, ALLOC);
    let data = exec_in(target, &cdb, ALLOC as usize, opts)?;
    malformed(parse_supported_opcodes_all(&data))
}

/// Whether `opcode` (with `sa` when it has service actions) is supported.
pub fn query_opcode<T: PtTarget + ?Sized>(
    target: &T,
    opcode: u8,
    sa: Option<u16>,
    opts: &HelperOpts,
) -> Result<OneCommand, PtError> {
    const ALLOC: u32 = 4 + 32;
    let (options, sa) = match sa {
        Some(sa) => (RsocOptions::OneOpcodeSa, sa),
        None => (RsocOptions::OneOpcode, 0),
    };
    let cdb = build_report_supported_opcodes(false, options, opcode, sa, ALLOC);
    let data = exec_in(target, &cdb, ALLOC as usize, opts)?;
    malformed(parse_supported_opcodes_one(&data))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::handlers::common::mock::*;

    fn opts() -> HelperOpts {
        HelperOpts {
            timeout_secs: 5,
            verbose: 0,
            strict: false,
        }
    }

    #[test]
    fn falls_back_to_16() {
        let mut rc16 = [0u8; 32];
        rc16[..12].copy_from_slice(&hex!("00 00 00 01 00 00 00 00 00 00 10 00"));
        let t = MockTarget::with(vec![good(&hex!("ff ff ff ff 00 00 02 00")), good(&rc16)]);
        let cap = read_capacity(&t, &opts()).expect("capacity");
        assert_eq!(cap.last_lba, 0x1_0000_0000);
        assert_eq!(cap.block_len, 4096);
        assert_eq!(t.cdbs().len(), 2);
        assert_eq!(t.cdbs()[1][..2], hex!("9e 10"));
    }

    #[test]
    fn small_disk_stays_on_10() {
        let t = MockTarget::with(vec![good(&hex!("00 00 ff ff 00 00 02 00"))]);
        let cap = read_capacity(&t, &opts()).expect("capacity");
        assert_eq!(cap.total_bytes(), 0x1_0000 * 512);
        assert_eq!(t.cdbs().len(), 1);
    }

    #[test]
    fn short_rc16_is_malformed() {
        let t = MockTarget::with(vec![good(&[0u8; 12])]);
        let err = read_capacity16(&t, &opts()).expect_err("short");
        assert_eq!(err.kind, crate::models::error::ErrorKind::Malformed);
    }
}
