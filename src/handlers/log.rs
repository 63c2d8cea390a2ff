// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::{
        log::{
            LogPageHeader, LogParameter, SUPPORTED_PAGES, build_log_select, build_log_sense,
            parse_log_parameters, parse_supported_log_pages,
        },
        mode::PageControl,
    },
    handlers::common::{HelperOpts, exec_in, exec_out, malformed},
    models::error::PtError,
    pt::session::PtTarget,
};

const LOG_ALLOC: u16 = 0xfffc;

pub fn log_sense<T: PtTarget + ?Sized>(
    target: &T,
    pc: PageControl,
    page: u8,
    subpage: u8,
    param_pointer: u16,
    opts: &HelperOpts,
) -> Result<Vec<u8>, PtError> {
    let cdb = build_log_sense(false, pc, page, subpage, param_pointer, LOG_ALLOC);
    exec_in(target, &cdb, LOG_ALLOC as usize, opts)
}

/// Cumulative values of one page, split into parameters.
pub fn log_page<T: PtTarget + ?Sized>(
    target: &T,
    page: u8,
    subpage: u8,
    opts: &HelperOpts,
) -> Result<(LogPageHeader, Vec<LogParameter>), PtError> {
    let data = log_sense(target, PageControl::Changeable, page, subpage, 0, opts)?;
    malformed(parse_log_parameters(&data))
}

pub fn supported_log_pages<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<Vec<u8>, PtError> {
    let data = log_sense(target, PageControl::Changeable, SUPPORTED_PAGES, 0, 0, opts)?;
    malformed(parse_supported_log_pages(&data))
}

/// LOG SELECT with PCR: reset the parameters selected by `pc`.
pub fn log_reset<T: PtTarget + ?Sized>(target: &T, pc: PageControl, opts: &HelperOpts) -> Result<(), PtError> {
    exec_out(target, &build_log_select(true, false, pc, 0, 0, 0), None, opts)
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
    fn reads_cumulative_values() {
        let t = MockTarget::with(vec![good(&hex!("0d 00 00 06 00 00 03 02 00 28"))]);
        let (hdr, params) = log_page(&t, 0x0d, 0, &opts()).expect("log page");
        assert_eq!(hdr.page_code, 0x0d);
        assert_eq!(params[0].as_u64(), 40);
        assert_eq!(t.cdbs()[0][2], 0x4d);
    }

    #[test]
    fn reset_has_no_data() {
        let t = MockTarget::with(vec![good(&[])]);
        log_reset(&t, PageControl::Default, &opts()).expect("reset");
        assert!(t.data_out().is_empty());
        assert_eq!(t.cdbs()[0][..3], hex!("4c 02 80"));
    }
}
