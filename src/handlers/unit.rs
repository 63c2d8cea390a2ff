// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tracing::debug;

use crate::{
    cfg::enums::ProbeKind,
    control_block::{
        request_sense::{REQUEST_SENSE_ALLOC, build_request_sense},
        test_unit_ready::build_test_unit_ready,
    },
    handlers::common::{HelperOpts, exec_cdb, exec_in},
    models::{
        error::{ErrorKind, PtError},
        sense_data::{SenseData, normalize, progress_field},
    },
    pt::session::{DataDir, PtTarget},
};

/// TEST UNIT READY.
pub fn test_unit_ready<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<(), PtError> {
    exec_cdb(target, &build_test_unit_ready(0), DataDir::None, opts)
        .into_result()
        .map(|_| ())
}

/// REQUEST SENSE. The sense the device returns as data is decoded; `None`
/// when it sent nothing recognisable.
pub fn request_sense<T: PtTarget + ?Sized>(
    target: &T,
    desc: bool,
    opts: &HelperOpts,
) -> Result<Option<SenseData>, PtError> {
    let data = exec_in(
        target,
        &build_request_sense(desc, REQUEST_SENSE_ALLOC, 0),
        REQUEST_SENSE_ALLOC as usize,
        opts,
    )?;
    Ok(normalize(&data))
}

/// One progress probe for a long-running operation.
///
/// Returns the progress numerator (over 65 536) when the device reports
/// one. A probe that ends with NOT READY, NO SENSE or RECOVERED ERROR and no
/// progress is `Ok(None)`; any other failure is returned as an error.
pub fn probe_progress<T: PtTarget + ?Sized>(
    target: &T,
    probe: ProbeKind,
    opts: &HelperOpts,
) -> Result<Option<u16>, PtError> {
    match probe {
        ProbeKind::RequestSense => {
            let data = match exec_in(
                target,
                &build_request_sense(false, REQUEST_SENSE_ALLOC, 0),
                REQUEST_SENSE_ALLOC as usize,
                opts,
            ) {
                Ok(d) => d,
                Err(e) if ends_quietly(e.kind) => {
                    debug!("request sense probe: {e}");
                    return Ok(None);
                },
                Err(e) => return Err(e),
            };
            if let Some(p) = progress_field(&data) {
                return Ok(Some(p));
            }
            match normalize(&data) {
                Some(sd) if !ends_quietly(ErrorKind::from(sd.category())) => Err(PtError::new(
                    ErrorKind::from(sd.category()),
                    sd.to_string(),
                )),
                _ => Ok(None),
            }
        },
        ProbeKind::TestUnitReady | ProbeKind::Auto => {
            let reply = exec_cdb(target, &build_test_unit_ready(0), DataDir::None, opts);
            if let Some(p) = progress_field(&reply.sense) {
                return Ok(Some(p));
            }
            if !ends_quietly(reply.kind) {
                reply.into_result()?;
            }
            Ok(None)
        },
    }
}

fn ends_quietly(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Ok | ErrorKind::NotReady | ErrorKind::NoSense | ErrorKind::Recovered
    )
}
