// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::zone::{
        ZONE_DESC_LEN, ZoneAction, ZoneReport, build_report_zones, build_zone_action,
        parse_report_zones,
    },
    handlers::common::{HelperOpts, exec_in, exec_out, malformed},
    models::error::PtError,
    pt::session::PtTarget,
};

/// REPORT ZONES from `start_lba`, at most `max_zones` descriptors.
pub fn report_zones<T: PtTarget + ?Sized>(
    target: &T,
    start_lba: u64,
    max_zones: u32,
    options: u8,
    opts: &HelperOpts,
) -> Result<ZoneReport, PtError> {
    let alloc = (max_zones as usize + 1)
        .checked_mul(ZONE_DESC_LEN)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| PtError::syntax(format!("{max_zones} zones do not fit one REPORT ZONES")))?;
    let cdb = build_report_zones(start_lba, alloc, true, options);
    let data = exec_in(target, &cdb, alloc as usize, opts)?;
    malformed(parse_report_zones(&data))
}

/// OPEN/CLOSE/FINISH/RESET WRITE POINTER on one zone, or on all with `None`.
pub fn zone_action<T: PtTarget + ?Sized>(
    target: &T,
    action: ZoneAction,
    zone_id: Option<u64>,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    let cdb = match zone_id {
        Some(id) => build_zone_action(action, id, 0, false),
        None => build_zone_action(action, 0, 0, true),
    };
    exec_out(target, &cdb, None, opts)
}
