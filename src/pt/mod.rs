//! Pass-through core: sessions, device handles and the OS backends.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Page-aligned transfer buffers.
pub mod aligned;
/// Backend trait and the tagged backend sum type.
pub mod backend;
/// Device open/close and NVMe detection.
pub mod device;
/// Decode-only backend.
pub mod dummy;
/// FreeBSD CAM backend.
pub mod freebsd_cam;
/// Linux SG_IO backend.
pub mod linux_sg;
/// SCSI-to-NVMe translation backend.
pub mod nvme;
/// The pass-through session object.
pub mod session;
/// Windows SCSI_PASS_THROUGH backend.
pub mod win_spt;
