// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! FreeBSD CAM backend: one `XPT_SCSI_IO` CCB per command through libcam.

use crate::{
    models::status::ResultCategory,
    pt::{
        backend::PtBackend,
        device::DeviceHandle,
        session::{ExecStatus, PtFlags, PtIo, PtResult},
    },
};

pub const XPT_SCSI_IO: u32 = 0x01;

pub const CAM_CDB_POINTER: u32 = 0x0000_0001;
pub const CAM_DIR_IN: u32 = 0x0000_0040;
pub const CAM_DIR_OUT: u32 = 0x0000_0080;
pub const CAM_DIR_NONE: u32 = 0x0000_00c0;
pub const CAM_DEV_QFRZDIS: u32 = 0x0000_0400;

pub const MSG_SIMPLE_Q_TAG: u8 = 0x20;
pub const MSG_HEAD_OF_Q_TAG: u8 = 0x21;
pub const MSG_ORDERED_Q_TAG: u8 = 0x22;

/// `cam_status` codes (low 6 bits).
pub mod cam {
    pub const CAM_REQ_INPROG: u32 = 0x00;
    pub const CAM_REQ_CMP: u32 = 0x01;
    pub const CAM_REQ_ABORTED: u32 = 0x02;
    pub const CAM_UA_ABORT: u32 = 0x03;
    pub const CAM_REQ_CMP_ERR: u32 = 0x04;
    pub const CAM_BUSY: u32 = 0x05;
    pub const CAM_REQ_INVALID: u32 = 0x06;
    pub const CAM_PATH_INVALID: u32 = 0x07;
    pub const CAM_DEV_NOT_THERE: u32 = 0x08;
    pub const CAM_UA_TERMIO: u32 = 0x09;
    pub const CAM_SEL_TIMEOUT: u32 = 0x0a;
    pub const CAM_CMD_TIMEOUT: u32 = 0x0b;
    pub const CAM_SCSI_STATUS_ERROR: u32 = 0x0c;
    pub const CAM_MSG_REJECT_REC: u32 = 0x0d;
    pub const CAM_SCSI_BUS_RESET: u32 = 0x0e;
    pub const CAM_UNCOR_PARITY: u32 = 0x0f;
    pub const CAM_AUTOSENSE_FAIL: u32 = 0x10;
    pub const CAM_NO_HBA: u32 = 0x11;
    pub const CAM_DATA_RUN_ERR: u32 = 0x12;
    pub const CAM_UNEXP_BUSFREE: u32 = 0x13;
    pub const CAM_SEQUENCE_FAIL: u32 = 0x14;
    pub const CAM_CCB_LEN_ERR: u32 = 0x15;
    pub const CAM_PROVIDE_FAIL: u32 = 0x16;
    pub const CAM_BDR_SENT: u32 = 0x17;
    pub const CAM_REQ_TERMIO: u32 = 0x18;
    pub const CAM_STATUS_MASK: u32 = 0x3f;
    pub const CAM_DEV_QFRZN: u32 = 0x40;
    pub const CAM_AUTOSNS_VALID: u32 = 0x80;
}

pub fn cam_status_str(st: u32) -> &'static str {
    match st & cam::CAM_STATUS_MASK {
        cam::CAM_REQ_INPROG => "CCB request is in progress",
        cam::CAM_REQ_CMP => "CCB request completed without error",
        cam::CAM_REQ_ABORTED => "CCB request aborted by the host",
        cam::CAM_UA_ABORT => "Unable to abort CCB request",
        cam::CAM_REQ_CMP_ERR => "CCB request completed with an error",
        cam::CAM_BUSY => "CAM subsystem is busy",
        cam::CAM_REQ_INVALID => "CCB request was invalid",
        cam::CAM_PATH_INVALID => "Supplied Path ID is invalid",
        cam::CAM_DEV_NOT_THERE => "Device Not Present",
        cam::CAM_UA_TERMIO => "Unable to terminate I/O CCB request",
        cam::CAM_SEL_TIMEOUT => "Selection Timeout",
        cam::CAM_CMD_TIMEOUT => "Command timeout",
        cam::CAM_SCSI_STATUS_ERROR => "SCSI Status Error",
        cam::CAM_MSG_REJECT_REC => "Message Reject Reveived",
        cam::CAM_SCSI_BUS_RESET => "SCSI Bus Reset Sent/Received",
        cam::CAM_UNCOR_PARITY => "Uncorrectable parity/CRC error",
        cam::CAM_AUTOSENSE_FAIL => "Auto-Sense Retrieval Failed",
        cam::CAM_NO_HBA => "No HBA Detected",
        cam::CAM_DATA_RUN_ERR => "Data Overrun error",
        cam::CAM_UNEXP_BUSFREE => "Unexpected Bus Free",
        cam::CAM_SEQUENCE_FAIL => "Target Bus Phase Sequence Failure",
        cam::CAM_CCB_LEN_ERR => "CCB length supplied is inadequate",
        cam::CAM_PROVIDE_FAIL => "Unable to provide requested capability",
        cam::CAM_BDR_SENT => "SCSI BDR Message Sent",
        cam::CAM_REQ_TERMIO => "CCB request terminated by the host",
        _ => "Unknown CAM status",
    }
}

/// Fields read back from a completed CCB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CamCompletion {
    pub cam_status: u32,
    pub scsi_status: u8,
    /// Autosense bytes requested minus `sense_resid`.
    pub sense_len: u8,
    pub resid: i32,
}

/// Map a CCB completion onto result fields.
pub fn translate_completion(c: &CamCompletion, res: &mut PtResult) -> ExecStatus {
    let st = c.cam_status & cam::CAM_STATUS_MASK;
    res.status = c.scsi_status;
    res.resid = c.resid as i64;
    res.sense_len = if c.cam_status & cam::CAM_AUTOSNS_VALID != 0 {
        c.sense_len as usize
    } else {
        0
    };
    match st {
        cam::CAM_REQ_CMP => {
            res.status = 0;
            res.derive_category();
        },
        cam::CAM_SCSI_STATUS_ERROR => res.derive_category(),
        cam::CAM_AUTOSENSE_FAIL => {
            // CHECK CONDITION without usable sense
            res.sense_len = 0;
            res.derive_category();
        },
        cam::CAM_CMD_TIMEOUT => {
            res.set_transport_err(st as i32, cam_status_str(st));
            res.category = ResultCategory::Timeout;
            return ExecStatus::Timeout;
        },
        _ => {
            res.set_transport_err(st as i32, cam_status_str(st));
            res.category = ResultCategory::TransportErr;
        },
    }
    ExecStatus::Submitted
}

#[cfg_attr(not(target_os = "freebsd"), allow(dead_code))]
fn tag_action(flags: PtFlags) -> u8 {
    if flags.contains(PtFlags::Q_AT_HEAD) {
        MSG_HEAD_OF_Q_TAG
    } else {
        MSG_SIMPLE_Q_TAG
    }
}

/// CAM backend. The libcam device is opened on first use and kept until the
/// cache is cleared or the backend dropped.
#[derive(Debug, Default)]
pub struct CamBackend {
    dev: Option<sys::CamDevice>,
}

impl PtBackend for CamBackend {
    fn name(&self) -> &'static str {
        "freebsd-cam"
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
        sys::submit(&mut self.dev, io, dev, res, timeout_secs, verbose)
    }

    fn clear_cache(&mut self) {
        self.dev = None;
    }
}

#[cfg(target_os = "freebsd")]
mod sys {
    use std::{ffi::CString, mem::size_of, ptr};

    use libc::{c_char, c_int, c_void};
    use tracing::debug;

    use super::*;

    const IOCDBLEN: usize = 16;
    const SSD_FULL_SIZE: usize = 252;

    #[repr(C)]
    struct cam_device {
        _opaque: [u8; 0],
    }

    #[repr(C)]
    struct CamPinfo {
        priority: u32,
        generation: u32,
        index: c_int,
    }

    #[repr(C)]
    struct CamqEntry {
        next: *mut c_void,
        prev: *mut c_void,
    }

    #[repr(C)]
    struct Bintime {
        sec: libc::time_t,
        frac: u64,
    }

    #[repr(C)]
    struct CcbHdr {
        pinfo: CamPinfo,
        xpt_links: CamqEntry,
        sim_links: CamqEntry,
        periph_links: CamqEntry,
        retry_count: u16,
        alloc_flags: u16,
        cbfcnp: *mut c_void,
        func_code: u32,
        status: u32,
        path: *mut c_void,
        path_id: u32,
        target_id: u32,
        target_lun: u64,
        flags: u32,
        xflags: u32,
        periph_priv: [usize; 2],
        sim_priv: [usize; 2],
        qos_etime: Bintime,
        qos_sim_data: usize,
        qos_periph_data: usize,
        timeout: u32,
        softtimeout: libc::timeval,
    }

    #[repr(C)]
    union CdbIo {
        cdb_ptr: *const u8,
        cdb_bytes: [u8; IOCDBLEN],
    }

    #[repr(C)]
    struct CcbScsiio {
        ccb_h: CcbHdr,
        next_ccb: *mut c_void,
        req_map: *mut u8,
        data_ptr: *mut u8,
        dxfer_len: u32,
        sense_data: [u8; SSD_FULL_SIZE],
        sense_len: u8,
        cdb_len: u8,
        sglist_cnt: u16,
        scsi_status: u8,
        sense_resid: u8,
        resid: u32,
        cdb_io: CdbIo,
        msg_ptr: *mut u8,
        msg_len: u16,
        tag_action: u8,
        priority: u8,
        tag_id: u32,
        init_id: u32,
    }

    #[link(name = "cam")]
    unsafe extern "C" {
        fn cam_open_device(path: *const c_char, flags: c_int) -> *mut cam_device;
        fn cam_close_device(dev: *mut cam_device);
        fn cam_getccb(dev: *mut cam_device) -> *mut c_void;
        fn cam_freeccb(ccb: *mut c_void);
        fn cam_send_ccb(dev: *mut cam_device, ccb: *mut c_void) -> c_int;
    }

    /// Owned libcam device.
    #[derive(Debug)]
    pub(super) struct CamDevice(*mut cam_device);

    // SAFETY: the handle is only used through &mut of the owning backend.
    unsafe impl Send for CamDevice {}

    impl Drop for CamDevice {
        fn drop(&mut self) {
            // SAFETY: pointer came from cam_open_device and is closed once.
            unsafe { cam_close_device(self.0) };
        }
    }

    struct Ccb(*mut c_void);

    impl Drop for Ccb {
        fn drop(&mut self) {
            // SAFETY: pointer came from cam_getccb and is freed once.
            unsafe { cam_freeccb(self.0) };
        }
    }

    fn open(name: &str, read_only: bool) -> Result<CamDevice, i32> {
        let path = CString::new(name).map_err(|_| libc::EINVAL)?;
        let flags = if read_only { libc::O_RDONLY } else { libc::O_RDWR };
        // SAFETY: path is a valid NUL-terminated string.
        let d = unsafe { cam_open_device(path.as_ptr(), flags) };
        if d.is_null() {
            Err(std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(libc::ENODEV))
        } else {
            Ok(CamDevice(d))
        }
    }

    pub(super) fn submit(
        cache: &mut Option<CamDevice>,
        io: &mut PtIo<'_>,
        dev: &DeviceHandle,
        res: &mut PtResult,
        timeout_secs: u32,
        verbose: i32,
    ) -> ExecStatus {
        let cd = match cache {
            Some(cd) => cd.0,
            None => match open(dev.name(), dev.is_read_only()) {
                Ok(cd) => cache.insert(cd).0,
                Err(errno) => return ExecStatus::OsError(errno),
            },
        };
        // SAFETY: cd is an open cam device.
        let raw = unsafe { cam_getccb(cd) };
        if raw.is_null() {
            return ExecStatus::OsError(libc::ENOMEM);
        }
        let ccb = Ccb(raw);
        let csio = ccb.0.cast::<CcbScsiio>();

        let (dir, data_ptr, dxfer_len) = match (io.data_in.as_deref_mut(), io.data_out) {
            (Some(d), _) => (CAM_DIR_IN, d.as_mut_ptr(), d.len()),
            (None, Some(d)) => (CAM_DIR_OUT, d.as_ptr() as *mut u8, d.len()),
            (None, None) => (CAM_DIR_NONE, ptr::null_mut(), 0),
        };
        let sense_cap = io.sense_cap().min(SSD_FULL_SIZE);

        // SAFETY: cam_getccb returns a zeroed-header union ccb large enough
        // for ccb_scsiio; everything after the header is cleared first.
        unsafe {
            let body = (csio as *mut u8).add(size_of::<CcbHdr>());
            ptr::write_bytes(body, 0, size_of::<CcbScsiio>() - size_of::<CcbHdr>());
            let c = &mut *csio;
            c.ccb_h.func_code = XPT_SCSI_IO;
            c.ccb_h.flags = dir | CAM_DEV_QFRZDIS;
            c.ccb_h.xflags = 0;
            c.ccb_h.retry_count = 0;
            c.ccb_h.cbfcnp = ptr::null_mut();
            c.ccb_h.timeout = timeout_secs.saturating_mul(1000);
            c.data_ptr = data_ptr;
            c.dxfer_len = dxfer_len as u32;
            c.sense_len = sense_cap as u8;
            c.cdb_len = io.cdb.len() as u8;
            c.tag_action = tag_action(io.flags);
            c.priority = io.priority;
            if io.cdb.len() <= IOCDBLEN {
                c.cdb_io.cdb_bytes[..io.cdb.len()].copy_from_slice(&io.cdb);
            } else {
                c.ccb_h.flags |= CAM_CDB_POINTER;
                c.cdb_io.cdb_ptr = io.cdb.as_ptr();
            }
        }

        // SAFETY: the ccb is fully initialised and its buffers are borrowed
        // by io for the duration of the call.
        let rc = unsafe { cam_send_ccb(cd, ccb.0) };
        if rc < 0 {
            let errno = std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(libc::EIO);
            if verbose > 0 {
                debug!("cam_send_ccb on {} failed: errno={errno}", dev.name());
            }
            return ExecStatus::OsError(errno);
        }

        // SAFETY: the kernel has completed the ccb.
        let c = unsafe { &*csio };
        let comp = CamCompletion {
            cam_status: c.ccb_h.status,
            scsi_status: c.scsi_status,
            sense_len: c.sense_len.saturating_sub(c.sense_resid),
            resid: c.resid as i32,
        };
        if comp.cam_status & cam::CAM_AUTOSNS_VALID != 0 {
            io.write_sense(&c.sense_data[..comp.sense_len as usize]);
        }
        let st = translate_completion(&comp, res);
        if dir == CAM_DIR_OUT {
            res.dout_resid = res.resid;
            res.resid = 0;
        }
        st
    }
}

#[cfg(not(target_os = "freebsd"))]
mod sys {
    use super::*;

    #[derive(Debug)]
    pub(super) struct CamDevice;

    pub(super) fn submit(
        _cache: &mut Option<CamDevice>,
        _io: &mut PtIo<'_>,
        _dev: &DeviceHandle,
        _res: &mut PtResult,
        _timeout_secs: u32,
        _verbose: i32,
    ) -> ExecStatus {
        ExecStatus::NotSupported
    }
}
