// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::mode::{
        ModeHeader, ModePage, PageControl, build_mode_select6, build_mode_select10,
        build_mode_sense6, build_mode_sense10, parse_mode_header10, parse_mode_pages,
    },
    handlers::common::{HelperOpts, exec_in, exec_out, malformed},
    models::error::PtError,
    pt::session::PtTarget,
};

pub fn mode_sense6<T: PtTarget + ?Sized>(
    target: &T,
    dbd: bool,
    pc: PageControl,
    page: u8,
    subpage: u8,
    alloc: u8,
    opts: &HelperOpts,
) -> Result<Vec<u8>, PtError> {
    let cdb = build_mode_sense6(dbd, pc, page, subpage, alloc, 0);
    exec_in(target, &cdb, alloc as usize, opts)
}

pub fn mode_sense10<T: PtTarget + ?Sized>(
    target: &T,
    dbd: bool,
    pc: PageControl,
    page: u8,
    subpage: u8,
    alloc: u16,
    opts: &HelperOpts,
) -> Result<Vec<u8>, PtError> {
    let cdb = build_mode_sense10(false, dbd, pc, page, subpage, alloc, 0);
    exec_in(target, &cdb, alloc as usize, opts)
}

/// MODE SENSE(10) decoded into header and pages.
pub fn mode_pages<T: PtTarget + ?Sized>(
    target: &T,
    pc: PageControl,
    page: u8,
    subpage: u8,
    opts: &HelperOpts,
) -> Result<(ModeHeader, Vec<ModePage>), PtError> {
    let data = mode_sense10(target, false, pc, page, subpage, 0xfffc, opts)?;
    let hdr = malformed(parse_mode_header10(&data))?;
    let pages = malformed(parse_mode_pages(&data, &hdr))?;
    Ok((hdr, pages))
}

/// MODE SELECT(6) with PF set. `params` includes the mode parameter header.
pub fn mode_select6<T: PtTarget + ?Sized>(
    target: &T,
    sp: bool,
    params: &[u8],
    opts: &HelperOpts,
) -> Result<(), PtError> {
    let len = u8::try_from(params.len())
        .map_err(|_| PtError::syntax(format!("MODE SELECT(6) list of {} bytes", params.len())))?;
    exec_out(target, &build_mode_select6(true, sp, len, 0), Some(params), opts)
}

pub fn mode_select10<T: PtTarget + ?Sized>(
    target: &T,
    sp: bool,
    params: &[u8],
    opts: &HelperOpts,
) -> Result<(), PtError> {
    let len = u16::try_from(params.len())
        .map_err(|_| PtError::syntax(format!("MODE SELECT(10) list of {} bytes", params.len())))?;
    exec_out(target, &build_mode_select10(true, sp, len, 0), Some(params), opts)
}
