// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::buffer::{
        BUFFER10_MAX, BufferDescriptor, buffer_mode, build_read_buffer10, build_read_buffer16,
        build_write_buffer10, parse_buffer_descriptor,
    },
    handlers::common::{HelperOpts, exec_in, exec_out, malformed},
    models::error::PtError,
    pt::session::PtTarget,
};

/// READ BUFFER, using the (16) CDB only when the (10) fields overflow.
pub fn read_buffer<T: PtTarget + ?Sized>(
    target: &T,
    mode: u8,
    buffer_id: u8,
    offset: u64,
    len: u32,
    opts: &HelperOpts,
) -> Result<Vec<u8>, PtError> {
    if offset <= BUFFER10_MAX as u64 && len <= BUFFER10_MAX {
        let cdb = build_read_buffer10(mode, 0, buffer_id, offset as u32, len);
        exec_in(target, &cdb, len as usize, opts)
    } else {
        let cdb = build_read_buffer16(mode, 0, buffer_id, offset, len);
        exec_in(target, &cdb, len as usize, opts)
    }
}

pub fn buffer_descriptor<T: PtTarget + ?Sized>(
    target: &T,
    buffer_id: u8,
    opts: &HelperOpts,
) -> Result<BufferDescriptor, PtError> {
    let data = read_buffer(target, buffer_mode::DESCRIPTOR, buffer_id, 0, 4, opts)?;
    malformed(parse_buffer_descriptor(&data))
}

pub fn write_buffer<T: PtTarget + ?Sized>(
    target: &T,
    mode: u8,
    buffer_id: u8,
    offset: u32,
    data: &[u8],
    opts: &HelperOpts,
) -> Result<(), PtError> {
    if offset > BUFFER10_MAX || data.len() > BUFFER10_MAX as usize {
        return Err(PtError::syntax(format!(
            "WRITE BUFFER offset {offset} / length {} exceed 24 bits",
            data.len()
        )));
    }
    let cdb = build_write_buffer10(mode, 0, buffer_id, offset, data.len() as u32);
    exec_out(target, &cdb, Some(data), opts)
}

/// Download microcode in `chunk` sized pieces with offsets, then save.
pub fn download_microcode<T: PtTarget + ?Sized>(
    target: &T,
    image: &[u8],
    chunk: usize,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    if chunk == 0 {
        return Err(PtError::syntax("microcode chunk size 0"));
    }
    for (i, piece) in image.chunks(chunk).enumerate() {
        let offset = u32::try_from(i * chunk)
            .map_err(|_| PtError::syntax("microcode image too large"))?;
        write_buffer(target, buffer_mode::DOWNLOAD_MICROCODE_OFFSETS_SAVE, 0, offset, piece, opts)?;
    }
    Ok(())
}
