// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use enum_dispatch::enum_dispatch;

use crate::{
    cfg::context::process_context,
    pt::{
        device::{DeviceHandle, DeviceKind},
        dummy::DummyBackend,
        freebsd_cam::CamBackend,
        linux_sg::LinuxSgBackend,
        nvme::NvmeBackend,
        session::{ExecStatus, PtIo, PtResult},
        win_spt::SptBackend,
    },
};

/// One way of conveying a CDB to a device.
#[enum_dispatch]
pub trait PtBackend {
    fn name(&self) -> &'static str;

    /// Whether `submit` requires a bound device handle.
    fn needs_device(&self) -> bool {
        true
    }

    /// Execute `io` and fill `res`. The sense buffer has already been zeroed
    /// and `res` reset by the caller.
    fn submit(
        &mut self,
        io: &mut PtIo<'_>,
        dev: Option<&DeviceHandle>,
        res: &mut PtResult,
        timeout_secs: u32,
        verbose: i32,
    ) -> ExecStatus;

    /// Drop cached device identity (NVMe Identify data, open CAM devices).
    fn clear_cache(&mut self) {}
}

/// Caller-supplied backend, used for fault injection and decode tooling.
pub struct CustomBackend(pub Box<dyn PtBackend + Send>);

impl PtBackend for CustomBackend {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn needs_device(&self) -> bool {
        self.0.needs_device()
    }

    fn submit(
        &mut self,
        io: &mut PtIo<'_>,
        dev: Option<&DeviceHandle>,
        res: &mut PtResult,
        timeout_secs: u32,
        verbose: i32,
    ) -> ExecStatus {
        self.0.submit(io, dev, res, timeout_secs, verbose)
    }

    fn clear_cache(&mut self) {
        self.0.clear_cache()
    }
}

#[enum_dispatch(PtBackend)]
pub enum Backend {
    LinuxSg(LinuxSgBackend),
    FreeBsdCam(CamBackend),
    WinSpt(SptBackend),
    Dummy(DummyBackend),
    Nvme(NvmeBackend),
    Custom(CustomBackend),
}

impl Backend {
    pub fn custom(b: impl PtBackend + Send + 'static) -> Self {
        Backend::Custom(CustomBackend(Box::new(b)))
    }

    /// Pick the backend for an opened device: the SNTL for NVMe handles
    /// (unless disabled), otherwise the platform's SCSI pass-through.
    pub fn for_device(dev: &DeviceHandle) -> Self {
        let ctx = process_context();
        if dev.kind() == DeviceKind::Nvme && ctx.nvme.sntl_enabled {
            return Backend::Nvme(NvmeBackend::for_device(dev, ctx.nvme.tur_power_check));
        }
        Self::native(ctx.spt_mode)
    }

    #[allow(unused_variables)]
    fn native(spt_mode: crate::cfg::enums::SptMode) -> Self {
        #[cfg(target_os = "linux")]
        {
            Backend::LinuxSg(LinuxSgBackend::default())
        }
        #[cfg(target_os = "freebsd")]
        {
            Backend::FreeBsdCam(CamBackend::default())
        }
        #[cfg(windows)]
        {
            Backend::WinSpt(SptBackend::new(spt_mode))
        }
        #[cfg(not(any(target_os = "linux", target_os = "freebsd", windows)))]
        {
            Backend::Dummy(DummyBackend::default())
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
