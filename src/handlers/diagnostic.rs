// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SEND DIAGNOSTIC / RECEIVE DIAGNOSTIC RESULTS.
//!
//! Buffers are page aligned so the same helpers work when the command is
//! tunnelled to an NVMe enclosure.

use crate::{
    control_block::diagnostic::{
        SelfTestCode, build_receive_diagnostic, build_send_diagnostic, parse_diagnostic_page,
    },
    handlers::common::{HelperOpts, exec_cdb, exec_out, malformed},
    models::error::PtError,
    pt::{
        aligned::AlignedBuf,
        session::{DataDir, PtTarget},
    },
};

const DIAG_ALLOC: u16 = 0xfffc;

/// Start a self-test (no parameter list).
pub fn self_test<T: PtTarget + ?Sized>(target: &T, code: SelfTestCode, opts: &HelperOpts) -> Result<(), PtError> {
    let selftest = code == SelfTestCode::Default;
    exec_out(target, &build_send_diagnostic(code, false, selftest, 0), None, opts)
}

/// SEND DIAGNOSTIC with PF set and `page` as the parameter list.
pub fn send_diagnostic<T: PtTarget + ?Sized>(target: &T, page: &[u8], opts: &HelperOpts) -> Result<(), PtError> {
    let len = u16::try_from(page.len()).map_err(|_| PtError::syntax("diagnostic page too long"))?;
    let mut buf = AlignedBuf::new(page.len())?;
    buf.copy_from_slice(page);
    let cdb = build_send_diagnostic(SelfTestCode::Default, true, false, len);
    exec_cdb(target, &cdb, DataDir::Out(&buf), opts).into_result().map(|_| ())
}

/// RECEIVE DIAGNOSTIC RESULTS for `page`: (page code, page body).
pub fn receive_diagnostic<T: PtTarget + ?Sized>(
    target: &T,
    page: u8,
    opts: &HelperOpts,
) -> Result<(u8, Vec<u8>), PtError> {
    let mut buf = AlignedBuf::new(DIAG_ALLOC as usize)?;
    let cdb = build_receive_diagnostic(true, page, DIAG_ALLOC);
    let reply = exec_cdb(target, &cdb, DataDir::In(&mut buf), opts).into_result()?;
    let got = &buf[..reply.actual_in.min(buf.len())];
    let (code, body) = malformed(parse_diagnostic_page(got))?;
    if code != page {
        return Err(PtError::malformed(format!(
            "asked for diagnostic page 0x{page:02x}, got 0x{code:02x}"
        )));
    }
    Ok((code, body.to_vec()))
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
    fn default_self_test() {
        let t = MockTarget::with(vec![good(&[])]);
        self_test(&t, SelfTestCode::Default, &opts()).expect("self test");
        assert_eq!(t.cdbs()[0], hex!("1d 04 00 00 00 00").to_vec());
    }

    #[test]
    fn page_roundtrip_through_device() {
        let t = MockTarget::with(vec![good(&[]), good(&hex!("02 00 00 02 aa bb"))]);
        send_diagnostic(&t, &hex!("02 00 00 00"), &opts()).expect("send");
        assert_eq!(t.data_out()[0], hex!("02 00 00 00").to_vec());
        let (code, body) = receive_diagnostic(&t, 2, &opts()).expect("receive");
        assert_eq!(code, 2);
        assert_eq!(body, vec![0xaa, 0xbb]);
    }

    #[test]
    fn wrong_page_is_malformed() {
        let t = MockTarget::with(vec![good(&hex!("07 00 00 00"))]);
        let err = receive_diagnostic(&t, 2, &opts()).expect_err("wrong page");
        assert_eq!(err.kind, crate::models::error::ErrorKind::Malformed);
    }
}
