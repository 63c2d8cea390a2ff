// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Device handles: open by name, detect NVMe, close explicitly.

use std::{
    fs::{File, OpenOptions},
    path::Path,
};

use tracing::{debug, warn};

use crate::models::error::PtError;

/// Transport family of an opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Scsi,
    Nvme,
}

/// Raw OS handle value (file descriptor, or HANDLE on Windows).
#[cfg(unix)]
pub type RawHandle = std::os::unix::io::RawFd;
#[cfg(windows)]
pub type RawHandle = std::os::windows::io::RawHandle;
#[cfg(not(any(unix, windows)))]
pub type RawHandle = i32;

#[derive(Debug)]
pub struct DeviceHandle {
    file: Option<File>,
    name: String,
    kind: DeviceKind,
    /// NVMe namespace id, 0 for a controller node or a SCSI device.
    nsid: u32,
    read_only: bool,
}

#[cfg(unix)]
const NONBLOCK: i32 = libc::O_NONBLOCK;
#[cfg(not(unix))]
const NONBLOCK: i32 = 0;

const ACCESS_MODE_MASK: i32 = 0o3;

#[cfg(target_os = "linux")]
const NVME_IOCTL_ID: libc::c_ulong = 0x4E40;

/// Open `name` read-only or read-write with the flags pass-through needs.
pub fn open_device(name: &str, read_only: bool, verbose: i32) -> Result<DeviceHandle, PtError> {
    let access = if read_only {
        libc::O_RDONLY
    } else {
        libc::O_RDWR
    };
    open_device_flags(name, access | NONBLOCK, verbose)
}

/// Open `name` with explicit OS open flags (`O_RDWR`, `O_NONBLOCK`,
/// `O_EXCL`...). Only the access mode is interpreted on non-Unix hosts.
pub fn open_device_flags(name: &str, flags: i32, verbose: i32) -> Result<DeviceHandle, PtError> {
    let access = flags & ACCESS_MODE_MASK;
    let read_only = access == libc::O_RDONLY;
    let mut opts = OpenOptions::new();
    opts.read(true).write(!read_only);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.custom_flags(flags & !access);
    }

    let file = opts.open(Path::new(name)).map_err(|e| {
        if verbose > 0 {
            warn!("could not open {name}: {e}");
        }
        PtError::from(e)
    })?;

    let (kind, nsid) = detect_kind(name, &file);
    if verbose > 1 {
        debug!("opened {name}: kind={kind:?} nsid={nsid} read_only={read_only}");
    }
    Ok(DeviceHandle {
        file: Some(file),
        name: name.to_string(),
        kind,
        nsid,
        read_only,
    })
}

fn is_nvme_name(name: &str) -> bool {
    let base = Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    base.starts_with("nvme")
}

#[cfg(target_os = "linux")]
fn detect_kind(name: &str, file: &File) -> (DeviceKind, u32) {
    use std::os::unix::io::AsRawFd;

    if !is_nvme_name(name) {
        return (DeviceKind::Scsi, 0);
    }
    // SAFETY: NVME_IOCTL_ID takes no argument and only returns the nsid.
    let r = unsafe { libc::ioctl(file.as_raw_fd(), NVME_IOCTL_ID as _) };
    // char device of the controller answers ENOTTY: nsid stays 0
    (DeviceKind::Nvme, if r > 0 { r as u32 } else { 0 })
}

#[cfg(not(target_os = "linux"))]
fn detect_kind(name: &str, _file: &File) -> (DeviceKind, u32) {
    if is_nvme_name(name) {
        (DeviceKind::Nvme, nsid_from_name(name))
    } else {
        (DeviceKind::Scsi, 0)
    }
}

/// `nvme0n3` -> 3, `nvme0` -> 0.
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn nsid_from_name(name: &str) -> u32 {
    let base = Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    base.rsplit_once('n')
        .filter(|(head, _)| head.len() > 4)
        .and_then(|(_, tail)| tail.split('p').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

impl DeviceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn nsid(&self) -> u32 {
        self.nsid
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Underlying file; `None` after [`DeviceHandle::close`].
    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    /// Raw OS handle, `None` once closed.
    pub fn raw(&self) -> Option<RawHandle> {
        let f = self.file.as_ref()?;
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            Some(f.as_raw_fd())
        }
        #[cfg(windows)]
        {
            use std::os::windows::io::AsRawHandle;
            Some(f.as_raw_handle())
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = f;
            None
        }
    }

    /// Explicit close. Dropping the handle closes it too; sessions that
    /// borrowed it are already gone by then.
    pub fn close(mut self) {
        if let Some(f) = self.file.take() {
            debug!("closing {}", self.name);
            drop(f);
        }
    }
}
