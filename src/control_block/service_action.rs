// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SERVICE ACTION IN/OUT(16) and MAINTENANCE IN/OUT(12) CDB builders, plus
//! the commands that ride on them and have no module of their own.

use anyhow::{Result, bail};

use crate::{
    control_block::common::{maint_in, opcode, sai16},
    utils::{get_unaligned_be16, get_unaligned_be32, get_unaligned_be64},
};

/// SERVICE ACTION IN(16): `[0]=0x9E [1]=SA [10..14]=ALLOC [15]=CONTROL`.
#[inline]
pub fn build_service_action_in16(sa: u8, alloc_len: u32, control: u8) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = opcode::SERVICE_ACTION_IN_16;
    cdb[1] = sa & 0x1f;
    cdb[10..14].copy_from_slice(&alloc_len.to_be_bytes());
    cdb[15] = control;
    cdb
}

/// SERVICE ACTION OUT(16): `[0]=0x9F [1]=SA [10..14]=PARAM LIST LEN`.
#[inline]
pub fn build_service_action_out16(sa: u8, param_len: u32, control: u8) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = opcode::SERVICE_ACTION_OUT_16;
    cdb[1] = sa & 0x1f;
    cdb[10..14].copy_from_slice(&param_len.to_be_bytes());
    cdb[15] = control;
    cdb
}

/// MAINTENANCE IN(12): `[0]=0xA3 [1]=SA [6..10]=ALLOC [11]=CONTROL`.
#[inline]
pub fn build_maintenance_in(sa: u8, alloc_len: u32, control: u8) -> [u8; 12] {
    let mut cdb = [0u8; 12];
    cdb[0] = opcode::MAINTENANCE_IN;
    cdb[1] = sa & 0x1f;
    cdb[6..10].copy_from_slice(&alloc_len.to_be_bytes());
    cdb[11] = control;
    cdb
}

/// MAINTENANCE OUT(12): `[0]=0xA4 [1]=SA [6..10]=PARAM LIST LEN`.
#[inline]
pub fn build_maintenance_out(sa: u8, param_len: u32, control: u8) -> [u8; 12] {
    let mut cdb = [0u8; 12];
    cdb[0] = opcode::MAINTENANCE_OUT;
    cdb[1] = sa & 0x1f;
    cdb[6..10].copy_from_slice(&param_len.to_be_bytes());
    cdb[11] = control;
    cdb
}

/// REPORTING OPTIONS of REPORT SUPPORTED OPERATION CODES.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RsocOptions {
    /// Every supported command.
    All = 0,
    /// One opcode, no service action.
    OneOpcode = 1,
    /// One opcode + service action.
    OneOpcodeSa = 2,
    /// One opcode, service action only if the opcode has them.
    OneOpcodeMaybeSa = 3,
}

#[inline]
pub fn build_report_supported_opcodes(
    rctd: bool,
    options: RsocOptions,
    req_opcode: u8,
    req_sa: u16,
    alloc_len: u32,
) -> [u8; 12] {
    let mut cdb = build_maintenance_in(maint_in::REPORT_SUPPORTED_OPCODES, alloc_len, 0);
    cdb[2] = ((rctd as u8) << 7) | (options as u8 & 0x07);
    cdb[3] = req_opcode;
    cdb[4..6].copy_from_slice(&req_sa.to_be_bytes());
    cdb
}

/// One command descriptor of the "all commands" format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub opcode: u8,
    pub service_action: Option<u16>,
    pub cdb_len: u16,
    /// Nominal/recommended timeouts when RCTD was set.
    pub timeouts: Option<(u32, u32)>,
}

pub fn parse_supported_opcodes_all(buf: &[u8]) -> Result<Vec<CommandDescriptor>> {
    if buf.len() < 4 {
        bail!("REPORT SUPPORTED OPCODES buffer too short: {}", buf.len());
    }
    let list_len = get_unaligned_be32(buf) as usize;
    let end = (4 + list_len).min(buf.len());
    let mut off = 4;
    let mut out = Vec::new();
    while off + 8 <= end {
        let d = &buf[off..];
        let ctdp = d[5] & 0x02 != 0;
        let servactv = d[5] & 0x01 != 0;
        let mut desc = CommandDescriptor {
            opcode: d[0],
            service_action: servactv.then(|| get_unaligned_be16(&d[2..])),
            cdb_len: get_unaligned_be16(&d[6..]),
            timeouts: None,
        };
        off += 8;
        if ctdp {
            // 12-byte timeouts descriptor follows
            if off + 12 > end {
                bail!("command timeouts descriptor at {off} is truncated");
            }
            let t = &buf[off..];
            desc.timeouts = Some((get_unaligned_be32(&t[4..]), get_unaligned_be32(&t[8..])));
            off += 12;
        }
        out.push(desc);
    }
    Ok(out)
}

/// Result of a one-command query: SUPPORT field and the CDB usage map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneCommand {
    /// 1 = not supported, 3 = supported per standard, 5 = vendor specific.
    pub support: u8,
    pub usage_map: Vec<u8>,
}

impl OneCommand {
    pub fn is_supported(&self) -> bool {
        matches!(self.support, 3 | 5)
    }
}

pub fn parse_supported_opcodes_one(buf: &[u8]) -> Result<OneCommand> {
    if buf.len() < 4 {
        bail!("one-command parameter data too short: {}", buf.len());
    }
    let cdb_size = get_unaligned_be16(&buf[2..]) as usize;
    if buf.len() < 4 + cdb_size {
        bail!("CDB usage map truncated: want {cdb_size}, have {}", buf.len() - 4);
    }
    Ok(OneCommand {
        support: buf[1] & 0x07,
        usage_map: buf[4..4 + cdb_size].to_vec(),
    })
}

/// GET LBA STATUS(16): starting LBA plus allocation length.
#[inline]
pub fn build_get_lba_status(start_lba: u64, alloc_len: u32) -> [u8; 16] {
    let mut cdb = build_service_action_in16(sai16::GET_LBA_STATUS, alloc_len, 0);
    cdb[2..10].copy_from_slice(&start_lba.to_be_bytes());
    cdb
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LbaStatusDescriptor {
    pub lba: u64,
    pub blocks: u32,
    /// 0 = mapped, 1 = deallocated, 2 = anchored.
    pub provisioning_status: u8,
}

pub fn parse_lba_status(buf: &[u8]) -> Result<Vec<LbaStatusDescriptor>> {
    if buf.len() < 8 {
        bail!("GET LBA STATUS buffer too short: {}", buf.len());
    }
    let len = get_unaligned_be32(buf) as usize;
    let end = (4 + len).min(buf.len());
    Ok(buf
        .get(8..end)
        .unwrap_or_default()
        .chunks_exact(16)
        .map(|d| LbaStatusDescriptor {
            lba: get_unaligned_be64(d),
            blocks: get_unaligned_be32(&d[8..]),
            provisioning_status: d[12] & 0x0f,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn rsoc_one_command_cdb() {
        assert_eq!(
            build_report_supported_opcodes(true, RsocOptions::OneOpcodeSa, 0x9e, 0x10, 0x200),
            hex!("a3 0c 82 9e 00 10 00 00 02 00 00 00")
        );
    }

    #[test]
    fn all_commands_with_timeouts() {
        let buf = hex!(
            "00 00 00 1c"
            "12 00 00 00 00 00 00 06"
            "9e 00 00 10 00 03 00 10"
            "00 0a 00 00 00 00 00 1e 00 00 00 3c"
        );
        let v = parse_supported_opcodes_all(&buf).expect("rsoc");
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].opcode, 0x12);
        assert_eq!(v[0].service_action, None);
        assert_eq!(v[1].service_action, Some(0x10));
        assert_eq!(v[1].timeouts, Some((30, 60)));
    }

    #[test]
    fn one_command_usage_map() {
        let one = parse_supported_opcodes_one(&hex!("00 03 00 06 12 01 ff ff ff 07"))
            .expect("one");
        assert!(one.is_supported());
        assert_eq!(one.usage_map.len(), 6);
        assert!(parse_supported_opcodes_one(&hex!("00 03 00 06 12")).is_err());
    }

    #[test]
    fn lba_status_descriptors() {
        let buf = hex!(
            "00 00 00 14 00 00 00 00"
            "00 00 00 00 00 00 10 00 00 00 08 00 01 00 00 00"
        );
        let v = parse_lba_status(&buf).expect("lba status");
        assert_eq!(v[0].lba, 0x1000);
        assert_eq!(v[0].blocks, 0x800);
        assert_eq!(v[0].provisioning_status, 1);
    }
}
