// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Block I/O and medium-wide commands: READ/WRITE, READ/WRITE LONG,
//! FORMAT UNIT, FORMAT MEDIUM and SANITIZE submission.
//!
//! The long operations here only submit; waiting for an IMMED submission is
//! [`crate::state_machine::long_op`]'s job.

use tracing::info;

use crate::{
    control_block::{
        format::{FormatParamHeader, FormatUnitOptions, build_format_medium, build_format_unit},
        long::{build_read_long10, build_write_long10, corrected_long_len},
        read::{build_read10, build_read16},
        sanitize::{SanitizeAction, SanitizeOptions, build_sanitize, overwrite_param_list},
        write::{build_write10, build_write16},
    },
    handlers::common::{HelperOpts, exec_cdb, exec_in, exec_out},
    models::error::{ErrorKind, PtError},
    pt::session::{DataDir, PtTarget},
};

fn xfer_len(blocks: u32, block_len: u32) -> Result<usize, PtError> {
    (blocks as usize)
        .checked_mul(block_len as usize)
        .ok_or_else(|| PtError::syntax("transfer length overflows"))
}

/// READ(10) or READ(16), whichever fits `lba` and `blocks`.
pub fn read_blocks<T: PtTarget + ?Sized>(
    target: &T,
    lba: u64,
    blocks: u32,
    block_len: u32,
    opts: &HelperOpts,
) -> Result<Vec<u8>, PtError> {
    let len = xfer_len(blocks, block_len)?;
    match (u32::try_from(lba), u16::try_from(blocks)) {
        (Ok(lba), Ok(blocks)) => exec_in(target, &build_read10(lba, blocks, 0, 0), len, opts),
        _ => exec_in(target, &build_read16(lba, blocks, 0, 0), len, opts),
    }
}

/// WRITE(10) or WRITE(16); `data` must be a whole number of blocks.
pub fn write_blocks<T: PtTarget + ?Sized>(
    target: &T,
    lba: u64,
    data: &[u8],
    block_len: u32,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    if block_len == 0 || data.len() % block_len as usize != 0 {
        return Err(PtError::syntax(format!(
            "{} bytes is not a multiple of block length {block_len}",
            data.len()
        )));
    }
    let blocks = u32::try_from(data.len() / block_len as usize)
        .map_err(|_| PtError::syntax("too many blocks for one WRITE"))?;
    match (u32::try_from(lba), u16::try_from(blocks)) {
        (Ok(lba), Ok(blocks)) => exec_out(target, &build_write10(lba, blocks, 0, 0), Some(data), opts),
        _ => exec_out(target, &build_write16(lba, blocks, 0, 0), Some(data), opts),
    }
}

/// READ LONG(10). When the device rejects `len` with ILI set, the command is
/// repeated once with the length the device asked for.
pub fn read_long<T: PtTarget + ?Sized>(
    target: &T,
    lba: u32,
    len: u16,
    correct: bool,
    opts: &HelperOpts,
) -> Result<Vec<u8>, PtError> {
    let mut buf = vec![0u8; len as usize];
    let reply = exec_cdb(
        target,
        &build_read_long10(false, correct, lba, len),
        DataDir::In(&mut buf),
        opts,
    );
    let corrected = match reply.kind {
        ErrorKind::IllegalReq => reply
            .sense_data()
            .and_then(|sd| corrected_long_len(len, &sd))
            .filter(|actual| *actual != len),
        _ => None,
    };
    if let Some(actual) = corrected {
        info!("READ LONG: device expects {actual} bytes, not {len}");
        return exec_in(
            target,
            &build_read_long10(false, correct, lba, actual),
            actual as usize,
            opts,
        );
    }
    let reply = reply.into_result()?;
    buf.truncate(reply.actual_in);
    Ok(buf)
}

pub fn write_long<T: PtTarget + ?Sized>(
    target: &T,
    lba: u32,
    data: &[u8],
    cor_dis: bool,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    let len = u16::try_from(data.len())
        .map_err(|_| PtError::syntax("WRITE LONG data longer than 65535 bytes"))?;
    exec_out(target, &build_write_long10(cor_dis, false, false, lba, len), Some(data), opts)
}

/// Mark `lba` uncorrectable with WRITE LONG (WR_UNCOR, no data).
pub fn write_uncorrectable<T: PtTarget + ?Sized>(target: &T, lba: u32, opts: &HelperOpts) -> Result<(), PtError> {
    exec_out(target, &build_write_long10(false, true, false, lba, 0), None, opts)
}

/// FORMAT UNIT with default defect handling. With `immed`, a short
/// parameter header carrying the IMMED bit is sent.
pub fn format_unit<T: PtTarget + ?Sized>(
    target: &T,
    fmtpinfo: u8,
    immed: bool,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    if fmtpinfo > 3 {
        return Err(PtError::syntax(format!("fmtpinfo {fmtpinfo} out of range 0..=3")));
    }
    let mut cdb_opts = FormatUnitOptions {
        fmtpinfo,
        ..Default::default()
    };
    if immed {
        cdb_opts.fmtdata = true;
        let header = FormatParamHeader {
            immed: true,
            ..Default::default()
        }
        .to_bytes();
        exec_out(target, &build_format_unit(&cdb_opts), Some(&header), opts)
    } else {
        exec_out(target, &build_format_unit(&cdb_opts), None, opts)
    }
}

/// FORMAT MEDIUM for tape; `format` is the FORMAT field (0 = default).
pub fn format_medium<T: PtTarget + ?Sized>(
    target: &T,
    verify: bool,
    immed: bool,
    format: u8,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    exec_out(target, &build_format_medium(verify, immed, format, 0), None, opts)
}

/// Parameters of an OVERWRITE sanitize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwriteParams {
    pub invert: bool,
    pub count: u8,
    pub pattern: Vec<u8>,
}

/// SANITIZE. `overwrite` is required for [`SanitizeAction::Overwrite`] and
/// ignored otherwise.
pub fn sanitize<T: PtTarget + ?Sized>(
    target: &T,
    sopts: &SanitizeOptions,
    overwrite: Option<&OverwriteParams>,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    if sopts.action != SanitizeAction::Overwrite {
        return exec_out(target, &build_sanitize(sopts, 0), None, opts);
    }
    let ow = overwrite.ok_or_else(|| PtError::syntax("OVERWRITE needs a pattern"))?;
    let params = overwrite_param_list(ow.invert, 0, ow.count, &ow.pattern)
        .map_err(|e| PtError::syntax(format!("{e:#}")))?;
    let len = u16::try_from(params.len()).map_err(|_| PtError::syntax("overwrite pattern too long"))?;
    exec_out(target, &build_sanitize(sopts, len), Some(&params), opts)
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
    fn read_picks_cdb_size() {
        let t = MockTarget::with(vec![good(&[0u8; 1024]), good(&[0u8; 512])]);
        assert_eq!(read_blocks(&t, 0, 2, 512, &opts()).expect("read").len(), 1024);
        read_blocks(&t, 0x1_0000_0000, 1, 512, &opts()).expect("read16");
        let cdbs = t.cdbs();
        assert_eq!(cdbs[0], hex!("28 00 00 00 00 00 00 00 02 00").to_vec());
        assert_eq!(cdbs[1][0], 0x88);
    }

    #[test]
    fn write_rejects_partial_block() {
        let t = MockTarget::with(vec![]);
        let err = write_blocks(&t, 0, &[0u8; 100], 512, &opts()).expect_err("partial");
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(t.cdbs().is_empty());
    }

    #[test]
    fn read_long_retries_with_device_length() {
        // ILLEGAL REQUEST, ILI, INFORMATION = 520 - 528 = -8
        let sense = hex!("f0 00 25 ff ff ff f8 0a 00 00 00 00 24 00 00 00 00 00");
        let t = MockTarget::with(vec![check(&sense), good(&[0x5a; 528])]);
        let data = read_long(&t, 7, 520, false, &opts()).expect("read long");
        assert_eq!(data.len(), 528);
        let cdbs = t.cdbs();
        assert_eq!(cdbs.len(), 2);
        assert_eq!(cdbs[1][7..9], hex!("02 10"));
    }

    #[test]
    fn immediate_format_sends_header() {
        let t = MockTarget::with(vec![good(&[])]);
        format_unit(&t, 0, true, &opts()).expect("format");
        assert_eq!(t.cdbs()[0], hex!("04 10 00 00 00 00").to_vec());
        assert_eq!(t.data_out()[0], hex!("00 02 00 00").to_vec());
    }

    #[test]
    fn overwrite_needs_pattern() {
        let t = MockTarget::with(vec![good(&[])]);
        let sopts = SanitizeOptions::new(SanitizeAction::Overwrite);
        assert_eq!(
            sanitize(&t, &sopts, None, &opts()).map_err(|e| e.kind),
            Err(ErrorKind::Syntax)
        );
        let ow = OverwriteParams {
            invert: false,
            count: 1,
            pattern: vec![0xa5; 4],
        };
        sanitize(&t, &sopts, Some(&ow), &opts()).expect("overwrite");
        assert_eq!(t.cdbs()[0], hex!("48 01 00 00 00 00 00 00 08 00").to_vec());
        assert_eq!(t.data_out()[0], hex!("01 00 00 04 a5 a5 a5 a5").to_vec());
    }
}
