// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Linux generic SCSI (`SG_IO` v3 interface) backend.

use crate::{
    models::status::ResultCategory,
    pt::{
        backend::PtBackend,
        device::DeviceHandle,
        session::{ExecStatus, PtFlags, PtIo, PtResult},
    },
};

pub const SG_DXFER_NONE: i32 = -1;
pub const SG_DXFER_TO_DEV: i32 = -2;
pub const SG_DXFER_FROM_DEV: i32 = -3;

pub const SG_FLAG_Q_AT_TAIL: u32 = 0x10;
pub const SG_FLAG_Q_AT_HEAD: u32 = 0x20;

/// `host_status` values (Linux `DID_*`).
pub mod host {
    pub const DID_OK: u16 = 0x00;
    pub const DID_NO_CONNECT: u16 = 0x01;
    pub const DID_BUS_BUSY: u16 = 0x02;
    pub const DID_TIME_OUT: u16 = 0x03;
    pub const DID_BAD_TARGET: u16 = 0x04;
    pub const DID_ABORT: u16 = 0x05;
    pub const DID_PARITY: u16 = 0x06;
    pub const DID_ERROR: u16 = 0x07;
    pub const DID_RESET: u16 = 0x08;
    pub const DID_BAD_INTR: u16 = 0x09;
    pub const DID_PASSTHROUGH: u16 = 0x0a;
    pub const DID_SOFT_ERROR: u16 = 0x0b;
    pub const DID_IMM_RETRY: u16 = 0x0c;
    pub const DID_REQUEUE: u16 = 0x0d;
    pub const DID_TRANSPORT_DISRUPTED: u16 = 0x0e;
    pub const DID_TRANSPORT_FAILFAST: u16 = 0x0f;
    pub const DID_TARGET_FAILURE: u16 = 0x10;
    pub const DID_NEXUS_FAILURE: u16 = 0x11;
    pub const DID_ALLOC_FAILURE: u16 = 0x12;
    pub const DID_MEDIUM_ERROR: u16 = 0x13;
}

/// `driver_status` low nibble (Linux `DRIVER_*`).
pub mod driver {
    pub const DRIVER_OK: u16 = 0x00;
    pub const DRIVER_BUSY: u16 = 0x01;
    pub const DRIVER_SOFT: u16 = 0x02;
    pub const DRIVER_MEDIA: u16 = 0x03;
    pub const DRIVER_ERROR: u16 = 0x04;
    pub const DRIVER_INVALID: u16 = 0x05;
    pub const DRIVER_TIMEOUT: u16 = 0x06;
    pub const DRIVER_HARD: u16 = 0x07;
    pub const DRIVER_SENSE: u16 = 0x08;
    pub const DRIVER_STATUS_MASK: u16 = 0x0f;
}

const HOST_NAMES: [&str; 20] = [
    "DID_OK",
    "DID_NO_CONNECT",
    "DID_BUS_BUSY",
    "DID_TIME_OUT",
    "DID_BAD_TARGET",
    "DID_ABORT",
    "DID_PARITY",
    "DID_ERROR",
    "DID_RESET",
    "DID_BAD_INTR",
    "DID_PASSTHROUGH",
    "DID_SOFT_ERROR",
    "DID_IMM_RETRY",
    "DID_REQUEUE",
    "DID_TRANSPORT_DISRUPTED",
    "DID_TRANSPORT_FAILFAST",
    "DID_TARGET_FAILURE",
    "DID_NEXUS_FAILURE",
    "DID_ALLOC_FAILURE",
    "DID_MEDIUM_ERROR",
];

const DRIVER_NAMES: [&str; 9] = [
    "DRIVER_OK",
    "DRIVER_BUSY",
    "DRIVER_SOFT",
    "DRIVER_MEDIA",
    "DRIVER_ERROR",
    "DRIVER_INVALID",
    "DRIVER_TIMEOUT",
    "DRIVER_HARD",
    "DRIVER_SENSE",
];

pub fn host_status_str(h: u16) -> String {
    match HOST_NAMES.get(h as usize) {
        Some(s) => format!("Host_status=0x{h:02x} [{s}]"),
        None => format!("Host_status=0x{h:02x} [unknown]"),
    }
}

pub fn driver_status_str(d: u16) -> String {
    let code = d & driver::DRIVER_STATUS_MASK;
    match DRIVER_NAMES.get(code as usize) {
        Some(s) => format!("Driver_status=0x{d:02x} [{s}]"),
        None => format!("Driver_status=0x{d:02x} [unknown]"),
    }
}

/// Kernel fields returned in the SG_IO header after completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SgCompletion {
    pub status: u8,
    pub sb_len_wr: u8,
    pub host_status: u16,
    pub driver_status: u16,
    pub resid: i32,
    pub duration_ms: u32,
}

/// Translate the completion record into result fields and the execution
/// status. Platform independent so the mapping can be exercised anywhere.
pub fn translate_completion(c: &SgCompletion, res: &mut PtResult) -> ExecStatus {
    res.status = c.status;
    res.sense_len = c.sb_len_wr as usize;
    res.host_status = c.host_status;
    res.driver_status = c.driver_status;
    res.resid = c.resid as i64;

    let drv = c.driver_status & driver::DRIVER_STATUS_MASK;
    if c.host_status == host::DID_TIME_OUT || drv == driver::DRIVER_TIMEOUT {
        res.set_transport_err(c.host_status as i32, host_status_str(c.host_status));
        res.category = ResultCategory::Timeout;
        return ExecStatus::Timeout;
    }

    if drv == driver::DRIVER_SENSE && res.sense_len > 0 {
        res.category = ResultCategory::Sense;
    } else if c.host_status != host::DID_OK {
        res.set_transport_err(c.host_status as i32, host_status_str(c.host_status));
        res.category = ResultCategory::TransportErr;
    } else if drv != driver::DRIVER_OK && drv != driver::DRIVER_SENSE {
        res.set_transport_err(
            (drv as i32) << 8,
            driver_status_str(c.driver_status),
        );
        res.category = ResultCategory::TransportErr;
    } else {
        res.derive_category();
    }
    ExecStatus::Submitted
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn sg_flags(flags: PtFlags) -> u32 {
    let mut f = 0;
    if flags.contains(PtFlags::Q_AT_HEAD) {
        f |= SG_FLAG_Q_AT_HEAD;
    }
    if flags.contains(PtFlags::Q_AT_TAIL) {
        f |= SG_FLAG_Q_AT_TAIL;
    }
    f
}

#[derive(Debug, Default)]
pub struct LinuxSgBackend;

impl PtBackend for LinuxSgBackend {
    fn name(&self) -> &'static str {
        "linux-sg"
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
        if io.cdb.len() > u8::MAX as usize {
            return ExecStatus::BadParams;
        }
        sys::submit(io, dev, res, timeout_secs, verbose)
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::{os::unix::io::AsRawFd, ptr};

    use libc::{c_int, c_uchar, c_uint, c_ushort, c_void};
    use tracing::debug;

    use super::*;

    const SG_IO: libc::c_ulong = 0x2285;

    #[repr(C)]
    #[allow(non_camel_case_types)]
    #[derive(Debug)]
    struct sg_io_hdr {
        interface_id: c_int,
        dxfer_direction: c_int,
        cmd_len: c_uchar,
        mx_sb_len: c_uchar,
        iovec_count: c_ushort,
        dxfer_len: c_uint,
        dxferp: *mut c_void,
        cmdp: *const c_uchar,
        sbp: *mut c_uchar,
        timeout: c_uint,
        flags: c_uint,
        pack_id: c_int,
        usr_ptr: *mut c_void,
        status: c_uchar,
        masked_status: c_uchar,
        msg_status: c_uchar,
        sb_len_wr: c_uchar,
        host_status: c_ushort,
        driver_status: c_ushort,
        resid: c_int,
        duration: c_uint,
        info: c_uint,
    }

    pub(super) fn submit(
        io: &mut PtIo<'_>,
        dev: &DeviceHandle,
        res: &mut PtResult,
        timeout_secs: u32,
        verbose: i32,
    ) -> ExecStatus {
        let Some(file) = dev.file() else {
            return ExecStatus::OsError(libc::EBADF);
        };

        let (direction, dxferp, dxfer_len) = match (io.data_in.as_deref_mut(), io.data_out) {
            (Some(din), _) => (SG_DXFER_FROM_DEV, din.as_mut_ptr() as *mut c_void, din.len()),
            (None, Some(dout)) => (SG_DXFER_TO_DEV, dout.as_ptr() as *mut c_void, dout.len()),
            (None, None) => (SG_DXFER_NONE, ptr::null_mut(), 0),
        };
        let (sbp, mx_sb_len) = match io.sense.as_deref_mut() {
            Some(s) => (s.as_mut_ptr(), s.len().min(u8::MAX as usize)),
            None => (ptr::null_mut(), 0),
        };

        let mut hdr = sg_io_hdr {
            interface_id: 'S' as c_int,
            dxfer_direction: direction,
            cmd_len: io.cdb.len() as c_uchar,
            mx_sb_len: mx_sb_len as c_uchar,
            iovec_count: 0,
            dxfer_len: dxfer_len as c_uint,
            dxferp,
            cmdp: io.cdb.as_ptr(),
            sbp,
            timeout: timeout_secs.saturating_mul(1000),
            flags: sg_flags(io.flags),
            pack_id: io.packet_id,
            usr_ptr: ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        // SAFETY: every pointer in hdr refers to a buffer borrowed by `io`
        // for the whole call, and the lengths match those buffers.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), SG_IO as _, &mut hdr) };
        if rc < 0 {
            let errno = std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(libc::EIO);
            if verbose > 0 {
                debug!("SG_IO ioctl on {} failed: errno={errno}", dev.name());
            }
            return ExecStatus::OsError(errno);
        }

        let c = SgCompletion {
            status: hdr.status,
            sb_len_wr: hdr.sb_len_wr,
            host_status: hdr.host_status,
            driver_status: hdr.driver_status,
            resid: hdr.resid,
            duration_ms: hdr.duration,
        };
        res.duration_ns = Some(c.duration_ms as u64 * 1_000_000);
        if direction == SG_DXFER_TO_DEV {
            res.dout_resid = c.resid as i64;
        }
        let st = translate_completion(&c, res);
        if direction == SG_DXFER_TO_DEV {
            res.resid = 0;
        }
        st
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use super::*;

    pub(super) fn submit(
        _io: &mut PtIo<'_>,
        _dev: &DeviceHandle,
        _res: &mut PtResult,
        _timeout_secs: u32,
        _verbose: i32,
    ) -> ExecStatus {
        ExecStatus::NotSupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sense_wins_over_status() {
        let mut r = PtResult::default();
        let c = SgCompletion {
            status: 0x02,
            sb_len_wr: 18,
            driver_status: driver::DRIVER_SENSE,
            ..Default::default()
        };
        assert_eq!(translate_completion(&c, &mut r), ExecStatus::Submitted);
        assert_eq!(r.category, ResultCategory::Sense);
    }

    #[test]
    fn host_no_connect_is_transport() {
        let mut r = PtResult::default();
        let c = SgCompletion {
            host_status: host::DID_NO_CONNECT,
            ..Default::default()
        };
        translate_completion(&c, &mut r);
        assert_eq!(r.category, ResultCategory::TransportErr);
        assert!(
            r.transport_msg
                .as_deref()
                .is_some_and(|s| s.contains("DID_NO_CONNECT"))
        );
    }

    #[test]
    fn host_timeout_is_timeout() {
        let mut r = PtResult::default();
        let c = SgCompletion {
            host_status: host::DID_TIME_OUT,
            ..Default::default()
        };
        assert_eq!(translate_completion(&c, &mut r), ExecStatus::Timeout);
    }

    #[test]
    fn busy_and_good_like_statuses() {
        let mut r = PtResult::default();
        translate_completion(
            &SgCompletion {
                status: 0x08,
                ..Default::default()
            },
            &mut r,
        );
        assert_eq!(r.category, ResultCategory::Status);
        translate_completion(
            &SgCompletion {
                status: 0x04,
                ..Default::default()
            },
            &mut r,
        );
        assert_eq!(r.category, ResultCategory::Good);
    }

    #[test]
    fn queue_flags_map() {
        assert_eq!(sg_flags(PtFlags::Q_AT_HEAD), SG_FLAG_Q_AT_HEAD);
        assert_eq!(sg_flags(PtFlags::empty()), 0);
    }
}
