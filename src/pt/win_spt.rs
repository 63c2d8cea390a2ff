// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Windows SCSI Pass-Through (SPT) backend.
//!
//! Two variants: *direct* maps the caller's buffer (`SCSI_PASS_THROUGH_DIRECT`)
//! and *indirect* bounces data through a buffer trailing the request
//! (`SCSI_PASS_THROUGH`). ATA PASS-THROUGH CDBs fall back to
//! `IOCTL_ATA_PASS_THROUGH` when the port driver refuses them.

use crate::{
    cfg::enums::SptMode,
    models::sense_data::{build_sense, descriptor_type, sense_key},
    pt::{
        backend::PtBackend,
        device::DeviceHandle,
        session::{ExecStatus, PtIo, PtResult},
    },
};

pub const IOCTL_SCSI_PASS_THROUGH: u32 = 0x0004_D004;
pub const IOCTL_SCSI_PASS_THROUGH_DIRECT: u32 = 0x0004_D014;
pub const IOCTL_ATA_PASS_THROUGH: u32 = 0x0004_D02C;

pub const SCSI_IOCTL_DATA_OUT: u8 = 0;
pub const SCSI_IOCTL_DATA_IN: u8 = 1;
pub const SCSI_IOCTL_DATA_UNSPECIFIED: u8 = 2;

/// Longest CDB the SPT structures carry.
pub const SPT_CDB_MAX: usize = 16;
const SPT_SENSE_LEN: usize = 64;

pub const ATA_FLAGS_DRDY_REQUIRED: u16 = 0x01;
pub const ATA_FLAGS_DATA_IN: u16 = 0x02;
pub const ATA_FLAGS_DATA_OUT: u16 = 0x04;
pub const ATA_FLAGS_48BIT_COMMAND: u16 = 0x08;
pub const ATA_FLAGS_USE_DMA: u16 = 0x10;

const ATA_PASS_THROUGH_12: u8 = 0xa1;
const ATA_PASS_THROUGH_16: u8 = 0x85;

/// ATA task-file image decoded from a SAT CDB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtaTaskFile {
    /// features, count, lba low/mid/high, device, command, reserved
    pub current: [u8; 8],
    /// High-order bytes for 48-bit commands.
    pub previous: [u8; 8],
    pub flags: u16,
    pub ck_cond: bool,
}

pub fn is_ata_pass_through(cdb: &[u8]) -> bool {
    matches!(
        (cdb.first(), cdb.len()),
        (Some(&ATA_PASS_THROUGH_12), 12) | (Some(&ATA_PASS_THROUGH_16), 16)
    )
}

/// Decode a SAT ATA PASS-THROUGH(12/16) CDB into the task file
/// `ATA_PASS_THROUGH_EX` expects.
pub fn sat_to_task_file(cdb: &[u8]) -> Option<AtaTaskFile> {
    if !is_ata_pass_through(cdb) {
        return None;
    }
    let protocol = (cdb[1] >> 1) & 0x0f;
    let extend = cdb[0] == ATA_PASS_THROUGH_16 && cdb[1] & 0x01 != 0;
    let t_dir_in = cdb[2] & 0x08 != 0;
    let t_length = cdb[2] & 0x03;
    let mut tf = AtaTaskFile {
        ck_cond: cdb[2] & 0x20 != 0,
        flags: ATA_FLAGS_DRDY_REQUIRED,
        ..Default::default()
    };
    if t_length != 0 {
        tf.flags |= if t_dir_in {
            ATA_FLAGS_DATA_IN
        } else {
            ATA_FLAGS_DATA_OUT
        };
    }
    // DMA, DMA queued, UDMA in/out
    if matches!(protocol, 6 | 7 | 10 | 11) {
        tf.flags |= ATA_FLAGS_USE_DMA;
    }
    if cdb[0] == ATA_PASS_THROUGH_12 {
        tf.current = [cdb[3], cdb[4], cdb[5], cdb[6], cdb[7], cdb[8], cdb[9], 0];
    } else {
        tf.current = [cdb[4], cdb[6], cdb[8], cdb[10], cdb[12], cdb[13], cdb[14], 0];
        if extend {
            tf.flags |= ATA_FLAGS_48BIT_COMMAND;
            tf.previous = [cdb[3], cdb[5], cdb[7], cdb[9], cdb[11], 0, 0, 0];
        }
    }
    Some(tf)
}

/// Build the sense SAT returns for a completed ATA command: the ATA status
/// return descriptor, under ABORTED COMMAND when the ERR bit is set, RECOVERED
/// ERROR / ATA PASS THROUGH INFORMATION AVAILABLE when CK_COND asked for it.
/// `None` when no sense is due.
pub fn ata_result_sense(tf: &AtaTaskFile, out_current: &[u8; 8], out_previous: &[u8; 8]) -> Option<Vec<u8>> {
    let err = out_current[6] & 0x01 != 0;
    if !err && !tf.ck_cond {
        return None;
    }
    let (key, ascq) = if err {
        (sense_key::ABORTED_COMMAND, 0x00)
    } else {
        (sense_key::RECOVERED_ERROR, 0x1d)
    };
    let (hdr, _) = build_sense(true, key, 0x00, ascq);
    let mut s = hdr[..8].to_vec();
    let extend = tf.flags & ATA_FLAGS_48BIT_COMMAND != 0;
    s.extend_from_slice(&[
        descriptor_type::ATA_STATUS_RETURN,
        0x0c,
        u8::from(extend),
        out_current[0],
        out_previous[1],
        out_current[1],
        out_previous[2],
        out_current[2],
        out_previous[3],
        out_current[3],
        out_previous[4],
        out_current[4],
        out_current[5],
        out_current[6],
    ]);
    s[7] = 14;
    Some(s)
}

/// Windows SPT backend.
#[derive(Debug)]
pub struct SptBackend {
    mode: SptMode,
}

impl Default for SptBackend {
    fn default() -> Self {
        Self::new(SptMode::Direct)
    }
}

impl SptBackend {
    pub fn new(mode: SptMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SptMode {
        self.mode
    }
}

impl PtBackend for SptBackend {
    fn name(&self) -> &'static str {
        match self.mode {
            SptMode::Direct => "win-spt-direct",
            SptMode::Indirect => "win-spt-indirect",
        }
    }

    fn submit(
        &mut self,
        io: &mut PtIo<'_>,
        dev: Option<&DeviceHandle>,
        res: &mut PtResult,
        timeout_secs: u32,
        verbose: i32,
    ) -> ExecStatus {
        let Some(dev) = dev else {
            return ExecStatus::BadParams;
        };
        if io.cdb.len() > SPT_CDB_MAX {
            return ExecStatus::BadParams;
        }
        sys::submit(self.mode, io, dev, res, timeout_secs, verbose)
    }
}

#[cfg(windows)]
mod sys {
    use std::{
        mem::{offset_of, size_of},
        os::windows::io::AsRawHandle,
        ptr,
    };

    use tracing::debug;
    use winapi::{
        shared::{
            minwindef::{DWORD, UCHAR, ULONG, USHORT},
            ntdef::PVOID,
            winerror,
        },
        um::{errhandlingapi::GetLastError, ioapiset::DeviceIoControl},
    };

    use super::*;

    #[repr(C)]
    struct ScsiPassThroughDirect {
        length: USHORT,
        scsi_status: UCHAR,
        path_id: UCHAR,
        target_id: UCHAR,
        lun: UCHAR,
        cdb_length: UCHAR,
        sense_info_length: UCHAR,
        data_in: UCHAR,
        data_transfer_length: ULONG,
        timeout_value: ULONG,
        data_buffer: PVOID,
        sense_info_offset: ULONG,
        cdb: [UCHAR; 16],
    }

    #[repr(C)]
    struct SptdWithSense {
        sptd: ScsiPassThroughDirect,
        filler: ULONG,
        sense: [UCHAR; SPT_SENSE_LEN],
    }

    #[repr(C)]
    #[derive(Clone, Copy)]
    struct ScsiPassThrough {
        length: USHORT,
        scsi_status: UCHAR,
        path_id: UCHAR,
        target_id: UCHAR,
        lun: UCHAR,
        cdb_length: UCHAR,
        sense_info_length: UCHAR,
        data_in: UCHAR,
        data_transfer_length: ULONG,
        timeout_value: ULONG,
        data_buffer_offset: usize,
        sense_info_offset: ULONG,
        cdb: [UCHAR; 16],
    }

    #[repr(C)]
    #[derive(Clone, Copy)]
    struct AtaPassThroughEx {
        length: USHORT,
        ata_flags: USHORT,
        path_id: UCHAR,
        target_id: UCHAR,
        lun: UCHAR,
        reserved_as_uchar: UCHAR,
        data_transfer_length: ULONG,
        timeout_value: ULONG,
        reserved_as_ulong: ULONG,
        data_buffer_offset: usize,
        previous_task_file: [UCHAR; 8],
        current_task_file: [UCHAR; 8],
    }

    fn win_to_errno(code: DWORD) -> i32 {
        match code {
            winerror::ERROR_ACCESS_DENIED => libc::EACCES,
            winerror::ERROR_INVALID_FUNCTION => libc::ENOTTY,
            winerror::ERROR_INVALID_PARAMETER => libc::EINVAL,
            winerror::ERROR_NOT_READY | winerror::ERROR_BUSY => libc::EBUSY,
            winerror::ERROR_NOT_ENOUGH_MEMORY | winerror::ERROR_OUTOFMEMORY => libc::ENOMEM,
            winerror::ERROR_FILE_NOT_FOUND | winerror::ERROR_PATH_NOT_FOUND => libc::ENOENT,
            _ => libc::EIO,
        }
    }

    /// Issue one DeviceIoControl with the same buffer in and out.
    ///
    /// # Safety
    /// `buf` must point to `len` writable bytes laid out as the ioctl expects;
    /// any pointers inside it must stay valid for the call.
    unsafe fn ioctl_inout(dev: &DeviceHandle, code: DWORD, buf: PVOID, len: usize) -> Result<(), DWORD> {
        let Some(file) = dev.file() else {
            return Err(winerror::ERROR_INVALID_HANDLE);
        };
        let mut returned: DWORD = 0;
        // SAFETY: forwarded from the caller.
        let ok = unsafe {
            DeviceIoControl(
                file.as_raw_handle() as _,
                code,
                buf,
                len as DWORD,
                buf,
                len as DWORD,
                &mut returned,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            // SAFETY: no preconditions.
            Err(unsafe { GetLastError() })
        } else {
            Ok(())
        }
    }

    fn fail(res: &mut PtResult, code: DWORD) -> ExecStatus {
        if code == winerror::ERROR_SEM_TIMEOUT {
            return ExecStatus::Timeout;
        }
        res.set_transport_err(0, format!("DeviceIoControl failed, Windows error {code}"));
        ExecStatus::OsError(win_to_errno(code))
    }

    fn direction(io: &PtIo<'_>) -> (u8, usize) {
        match (io.data_in.as_deref(), io.data_out) {
            (Some(d), _) => (SCSI_IOCTL_DATA_IN, d.len()),
            (None, Some(d)) => (SCSI_IOCTL_DATA_OUT, d.len()),
            (None, None) => (SCSI_IOCTL_DATA_UNSPECIFIED, 0),
        }
    }

    fn complete(io: &mut PtIo<'_>, res: &mut PtResult, status: u8, sense: &[u8], xfer: usize, dir: u8) {
        res.status = status;
        res.sense_len = if status != 0 { io.write_sense(sense) } else { 0 };
        let requested = if dir == SCSI_IOCTL_DATA_IN { res.req_din } else { res.req_dout };
        let resid = requested.saturating_sub(xfer) as i64;
        if dir == SCSI_IOCTL_DATA_IN {
            res.resid = resid;
        } else if dir == SCSI_IOCTL_DATA_OUT {
            res.dout_resid = resid;
        }
        res.derive_category();
    }

    fn submit_direct(io: &mut PtIo<'_>, dev: &DeviceHandle, res: &mut PtResult, timeout: u32) -> Result<(), DWORD> {
        let (dir, len) = direction(io);
        let data_buffer: PVOID = match (io.data_in.as_deref_mut(), io.data_out) {
            (Some(d), _) => d.as_mut_ptr().cast(),
            (None, Some(d)) => d.as_ptr() as PVOID,
            (None, None) => ptr::null_mut(),
        };
        let mut cdb = [0u8; 16];
        cdb[..io.cdb.len()].copy_from_slice(&io.cdb);
        let mut req = SptdWithSense {
            sptd: ScsiPassThroughDirect {
                length: size_of::<ScsiPassThroughDirect>() as USHORT,
                scsi_status: 0,
                path_id: 0,
                target_id: 0,
                lun: 0,
                cdb_length: io.cdb.len() as UCHAR,
                sense_info_length: SPT_SENSE_LEN as UCHAR,
                data_in: dir,
                data_transfer_length: len as ULONG,
                timeout_value: timeout,
                data_buffer,
                sense_info_offset: offset_of!(SptdWithSense, sense) as ULONG,
                cdb,
            },
            filler: 0,
            sense: [0; SPT_SENSE_LEN],
        };
        // SAFETY: req is a valid SPTD followed by its sense area and
        // data_buffer points into a buffer borrowed by io.
        unsafe {
            ioctl_inout(
                dev,
                IOCTL_SCSI_PASS_THROUGH_DIRECT,
                (&mut req as *mut SptdWithSense).cast(),
                size_of::<SptdWithSense>(),
            )?
        };
        let sense_len = (req.sptd.sense_info_length as usize).min(SPT_SENSE_LEN);
        complete(
            io,
            res,
            req.sptd.scsi_status,
            &req.sense[..sense_len],
            req.sptd.data_transfer_length as usize,
            dir,
        );
        Ok(())
    }

    fn submit_indirect(io: &mut PtIo<'_>, dev: &DeviceHandle, res: &mut PtResult, timeout: u32) -> Result<(), DWORD> {
        let (dir, len) = direction(io);
        let hdr_len = size_of::<ScsiPassThrough>();
        let sense_off = hdr_len;
        let data_off = (sense_off + SPT_SENSE_LEN).next_multiple_of(8);
        let mut buf = vec![0u8; data_off + len];
        if let Some(d) = io.data_out {
            buf[data_off..].copy_from_slice(d);
        }
        let mut cdb = [0u8; 16];
        cdb[..io.cdb.len()].copy_from_slice(&io.cdb);
        let hdr = ScsiPassThrough {
            length: hdr_len as USHORT,
            scsi_status: 0,
            path_id: 0,
            target_id: 0,
            lun: 0,
            cdb_length: io.cdb.len() as UCHAR,
            sense_info_length: SPT_SENSE_LEN as UCHAR,
            data_in: dir,
            data_transfer_length: len as ULONG,
            timeout_value: timeout,
            data_buffer_offset: data_off,
            sense_info_offset: sense_off as ULONG,
            cdb,
        };
        // SAFETY: buf is at least hdr_len bytes long.
        unsafe { ptr::write_unaligned(buf.as_mut_ptr().cast::<ScsiPassThrough>(), hdr) };
        // SAFETY: buf holds the header, sense area and data area at the
        // offsets recorded in the header.
        unsafe { ioctl_inout(dev, IOCTL_SCSI_PASS_THROUGH, buf.as_mut_ptr().cast(), buf.len())? };
        // SAFETY: as above.
        let out = unsafe { ptr::read_unaligned(buf.as_ptr().cast::<ScsiPassThrough>()) };
        let xfer = (out.data_transfer_length as usize).min(len);
        if let Some(d) = io.data_in.as_deref_mut() {
            d[..xfer].copy_from_slice(&buf[data_off..data_off + xfer]);
        }
        let sense_len = (out.sense_info_length as usize).min(SPT_SENSE_LEN);
        let sense = buf[sense_off..sense_off + sense_len].to_vec();
        complete(io, res, out.scsi_status, &sense, xfer, dir);
        Ok(())
    }

    fn submit_ata(io: &mut PtIo<'_>, dev: &DeviceHandle, res: &mut PtResult, timeout: u32, tf: AtaTaskFile) -> Result<(), DWORD> {
        let (dir, len) = direction(io);
        let hdr_len = size_of::<AtaPassThroughEx>();
        let data_off = hdr_len.next_multiple_of(8);
        let mut buf = vec![0u8; data_off + len];
        if let Some(d) = io.data_out {
            buf[data_off..].copy_from_slice(d);
        }
        let hdr = AtaPassThroughEx {
            length: hdr_len as USHORT,
            ata_flags: tf.flags,
            path_id: 0,
            target_id: 0,
            lun: 0,
            reserved_as_uchar: 0,
            data_transfer_length: len as ULONG,
            timeout_value: timeout,
            reserved_as_ulong: 0,
            data_buffer_offset: data_off,
            previous_task_file: tf.previous,
            current_task_file: tf.current,
        };
        // SAFETY: buf is at least hdr_len bytes long.
        unsafe { ptr::write_unaligned(buf.as_mut_ptr().cast::<AtaPassThroughEx>(), hdr) };
        // SAFETY: buf holds the header followed by the data area.
        unsafe { ioctl_inout(dev, IOCTL_ATA_PASS_THROUGH, buf.as_mut_ptr().cast(), buf.len())? };
        // SAFETY: as above.
        let out = unsafe { ptr::read_unaligned(buf.as_ptr().cast::<AtaPassThroughEx>()) };
        let xfer = (out.data_transfer_length as usize).min(len);
        if let Some(d) = io.data_in.as_deref_mut() {
            d[..xfer].copy_from_slice(&buf[data_off..data_off + xfer]);
        }
        match ata_result_sense(&tf, &out.current_task_file, &out.previous_task_file) {
            Some(sense) => complete(io, res, 0x02, &sense, xfer, dir),
            None => complete(io, res, 0x00, &[], xfer, dir),
        }
        Ok(())
    }

    pub(super) fn submit(
        mode: SptMode,
        io: &mut PtIo<'_>,
        dev: &DeviceHandle,
        res: &mut PtResult,
        timeout_secs: u32,
        verbose: i32,
    ) -> ExecStatus {
        let r = match mode {
            SptMode::Direct => submit_direct(io, dev, res, timeout_secs),
            SptMode::Indirect => submit_indirect(io, dev, res, timeout_secs),
        };
        let r = match (r, sat_to_task_file(&io.cdb)) {
            (Err(winerror::ERROR_INVALID_FUNCTION), Some(tf)) => {
                if verbose > 1 {
                    debug!("SPT refused ATA PASS-THROUGH, retrying via IOCTL_ATA_PASS_THROUGH");
                }
                submit_ata(io, dev, res, timeout_secs, tf)
            },
            (r, _) => r,
        };
        match r {
            Ok(()) => ExecStatus::Submitted,
            Err(code) => {
                if verbose > 0 {
                    debug!("{}: DeviceIoControl error {code}", dev.name());
                }
                fail(res, code)
            },
        }
    }
}

#[cfg(not(windows))]
mod sys {
    use super::*;

    pub(super) fn submit(
        _mode: SptMode,
        _io: &mut PtIo<'_>,
        _dev: &DeviceHandle,
        _res: &mut PtResult,
        _timeout_secs: u32,
        _verbose: i32,
    ) -> ExecStatus {
        ExecStatus::NotSupported
    }
}
