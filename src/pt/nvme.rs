// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SCSI-to-NVMe translation (SNTL).
//!
//! When the bound device is an NVMe controller or namespace, SCSI CDBs are
//! not forwarded. A handful of opcodes are answered from NVMe admin
//! commands (Identify, Get Features, NVMe-MI Send/Receive); everything else
//! completes with CHECK CONDITION, ILLEGAL REQUEST, INVALID COMMAND
//! OPERATION CODE. A 64 to 72 byte "CDB" whose first byte is not 0x7e/0x7f
//! is taken as an NVMe admin submission queue entry and passed through.
//!
//! Identify Controller and Identify Namespace data are fetched once and
//! kept until [`PtBackend::clear_cache`].

use std::fmt;

use tracing::{debug, trace};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    models::{
        sense_data::{asc, build_sense, sense_key},
        status::ScsiStatus,
    },
    pt::{
        aligned::{AlignedBuf, is_page_aligned},
        backend::PtBackend,
        device::DeviceHandle,
        session::{ExecStatus, NvmeMeta, PtIo, PtResult},
    },
    utils::{
        copy_space_padded, get_unaligned_be16, get_unaligned_be32, get_unaligned_le16,
        get_unaligned_le32, get_unaligned_le64, hex_spaced, put_unaligned_be16,
        put_unaligned_be32, put_unaligned_be64, trim_ascii,
    },
};

pub const IDENTIFY_LEN: usize = 4096;

/// Admin opcodes issued by the translator.
pub mod admin_opcode {
    pub const GET_LOG_PAGE: u8 = 0x02;
    pub const IDENTIFY: u8 = 0x06;
    pub const GET_FEATURES: u8 = 0x0a;
    pub const MI_SEND: u8 = 0x1d;
    pub const MI_RECEIVE: u8 = 0x1e;
}

pub const CNS_NAMESPACE: u32 = 0x00;
pub const CNS_CONTROLLER: u32 = 0x01;
pub const FID_POWER_MANAGEMENT: u32 = 0x02;

/// NVMe-MI tunnel dword 10: message type and SES operation group.
pub const MI_SES_CDW10: u32 = 0x0804;
pub const MI_SES_RECEIVE: u32 = 0x08;
pub const MI_SES_SEND: u32 = 0x09;

/// SCSI opcodes answered by the translator.
mod scsi_op {
    pub const TEST_UNIT_READY: u8 = 0x00;
    pub const REQUEST_SENSE: u8 = 0x03;
    pub const INQUIRY: u8 = 0x12;
    pub const RECEIVE_DIAGNOSTIC: u8 = 0x1c;
    pub const SEND_DIAGNOSTIC: u8 = 0x1d;
    pub const READ_CAPACITY_10: u8 = 0x25;
    pub const SERVICE_ACTION_IN_16: u8 = 0x9e;
    pub const REPORT_LUNS: u8 = 0xa0;
    pub const SA_READ_CAPACITY_16: u8 = 0x10;
}

pub const RAW_CMD_MIN: usize = 64;
pub const RAW_CMD_MAX: usize = 72;

const SUPPORTED_VPD: [u8; 4] = [0x00, 0x80, 0x83, 0xb1];
const T10_VENDOR: &str = "NVMe";

/// Kernel admin pass-through block (`struct nvme_passthru_cmd`, 72 bytes).
#[repr(C)]
#[derive(Debug, Default, Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct NvmePassthruCmd {
    pub opcode: u8,
    pub flags: u8,
    pub rsvd1: u16,
    pub nsid: u32,
    pub cdw2: u32,
    pub cdw3: u32,
    pub metadata: u64,
    pub addr: u64,
    pub metadata_len: u32,
    pub data_len: u32,
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
    pub timeout_ms: u32,
    pub result: u32,
}

impl NvmePassthruCmd {
    pub fn admin(opcode: u8, nsid: u32) -> Self {
        Self {
            opcode,
            nsid,
            ..Default::default()
        }
    }

    /// Read a 64-byte submission queue entry (little endian). Buffer
    /// pointers in the entry are ignored; the session buffers are used.
    pub fn from_sqe(sqe: &[u8]) -> Option<Self> {
        if sqe.len() < RAW_CMD_MIN {
            return None;
        }
        Some(Self {
            opcode: sqe[0],
            flags: sqe[1],
            nsid: get_unaligned_le32(&sqe[4..]),
            cdw2: get_unaligned_le32(&sqe[8..]),
            cdw3: get_unaligned_le32(&sqe[12..]),
            cdw10: get_unaligned_le32(&sqe[40..]),
            cdw11: get_unaligned_le32(&sqe[44..]),
            cdw12: get_unaligned_le32(&sqe[48..]),
            cdw13: get_unaligned_le32(&sqe[52..]),
            cdw14: get_unaligned_le32(&sqe[56..]),
            cdw15: get_unaligned_le32(&sqe[60..]),
            ..Default::default()
        })
    }
}

/// Data phase of one admin command.
#[derive(Debug)]
pub enum AdminData<'a> {
    None,
    In(&'a mut [u8]),
    Out(&'a [u8]),
}

/// Completion of one admin command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NvmeCompletion {
    /// Status field: SCT in bits 10:8, SC in bits 7:0, DNR/More above.
    pub status: u16,
    /// Dword 0.
    pub result: u32,
}

impl NvmeCompletion {
    pub fn is_success(&self) -> bool {
        self.status & 0x7ff == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Positive errno.
    Os(i32),
    Unsupported,
}

/// Transport for NVMe admin commands. The kernel ioctl channel is the
/// production implementation; tests supply scripted controllers.
pub trait NvmeAdminChannel {
    fn needs_device(&self) -> bool {
        true
    }

    fn admin(
        &mut self,
        dev: Option<&DeviceHandle>,
        cmd: &mut NvmePassthruCmd,
        data: AdminData<'_>,
        meta: Option<&mut NvmeMeta<'_>>,
    ) -> Result<NvmeCompletion, ChannelError>;
}

/// Cached Identify Controller data.
pub struct IdentifyController(AlignedBuf);

impl IdentifyController {
    pub fn vid(&self) -> u16 {
        get_unaligned_le16(&self.0[0..])
    }

    pub fn serial(&self) -> &[u8] {
        &self.0[4..24]
    }

    pub fn model(&self) -> &[u8] {
        &self.0[24..64]
    }

    pub fn firmware(&self) -> &[u8] {
        &self.0[64..72]
    }

    pub fn ieee_oui(&self) -> [u8; 3] {
        [self.0[75], self.0[74], self.0[73]]
    }

    pub fn version(&self) -> u32 {
        get_unaligned_le32(&self.0[80..])
    }

    /// Number of namespaces (NN).
    pub fn namespace_count(&self) -> u32 {
        get_unaligned_le32(&self.0[516..])
    }
}

impl fmt::Debug for IdentifyController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyController")
            .field("vid", &format_args!("0x{:04x}", self.vid()))
            .field("model", &trim_ascii(self.model()))
            .field("serial", &trim_ascii(self.serial()))
            .field("nn", &self.namespace_count())
            .finish()
    }
}

/// Cached Identify Namespace data.
pub struct IdentifyNamespace(AlignedBuf);

impl IdentifyNamespace {
    /// Namespace size in logical blocks.
    pub fn nsze(&self) -> u64 {
        get_unaligned_le64(&self.0[0..])
    }

    pub fn formatted_lba_index(&self) -> usize {
        (self.0[26] & 0x0f) as usize
    }

    /// Logical block size of the active LBA format.
    pub fn block_size(&self) -> u32 {
        let off = 128 + 4 * self.formatted_lba_index();
        let lbads = self.0[off + 2];
        if (9..32).contains(&lbads) {
            1 << lbads
        } else {
            512
        }
    }

    pub fn nguid(&self) -> &[u8] {
        &self.0[104..120]
    }

    pub fn eui64(&self) -> &[u8] {
        &self.0[120..128]
    }
}

impl fmt::Debug for IdentifyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyNamespace")
            .field("nsze", &self.nsze())
            .field("block_size", &self.block_size())
            .finish()
    }
}

/// Map an NVMe status field to sense key, ASC, ASCQ.
pub fn status_to_sense(status: u16) -> (u8, u8, u8) {
    let sct = (status >> 8) & 0x7;
    let sc = status & 0xff;
    match (sct, sc) {
        (0, 0x00) => (sense_key::NO_SENSE, 0, 0),
        (0, 0x01) => (sense_key::ILLEGAL_REQUEST, asc::INVALID_OPCODE, 0),
        (0, 0x02) => (sense_key::ILLEGAL_REQUEST, asc::INVALID_FIELD_IN_CDB, 0),
        (0, 0x04) => (sense_key::MEDIUM_ERROR, 0x0c, 0x00),
        (0, 0x06) => (sense_key::HARDWARE_ERROR, 0x44, 0x00),
        (0, 0x07) | (0, 0x08) => (sense_key::ABORTED_COMMAND, 0, 0),
        (0, 0x0b) => (sense_key::ILLEGAL_REQUEST, asc::LUN_NOT_SUPPORTED, 0),
        (0, 0x0c) => (sense_key::ILLEGAL_REQUEST, 0x2c, 0x00),
        (0, 0x80) => (sense_key::ILLEGAL_REQUEST, asc::LBA_OUT_OF_RANGE, 0),
        (0, 0x81) => (sense_key::MEDIUM_ERROR, 0x00, 0x00),
        (0, 0x82) => (sense_key::NOT_READY, asc::LUN_NOT_READY, 0x00),
        (2, 0x80) => (sense_key::MEDIUM_ERROR, 0x03, 0x00),
        (2, 0x81) => (sense_key::MEDIUM_ERROR, 0x11, 0x00),
        (2, 0x82) => (sense_key::MEDIUM_ERROR, asc::PROTECTION_INFO, 0x01),
        (2, 0x83) => (sense_key::MEDIUM_ERROR, asc::PROTECTION_INFO, 0x02),
        (2, 0x84) => (sense_key::MEDIUM_ERROR, asc::PROTECTION_INFO, 0x03),
        (2, 0x85) => (sense_key::MISCOMPARE, 0x1d, 0x00),
        (2, 0x86) => (sense_key::DATA_PROTECT, 0x20, 0x02),
        _ => (sense_key::HARDWARE_ERROR, 0x44, 0x00),
    }
}

/// The SNTL backend.
pub struct NvmeBackend {
    chan: Box<dyn NvmeAdminChannel + Send>,
    nsid: u32,
    tur_power_check: bool,
    id_ctrl: Option<IdentifyController>,
    id_ns: Option<IdentifyNamespace>,
}

impl fmt::Debug for NvmeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NvmeBackend")
            .field("nsid", &self.nsid)
            .field("tur_power_check", &self.tur_power_check)
            .field("id_ctrl", &self.id_ctrl)
            .field("id_ns", &self.id_ns)
            .finish()
    }
}

enum Outcome {
    /// GOOD with this payload for data-in.
    Data(Vec<u8>),
    Good,
    Check(u8, u8, u8),
    Exec(ExecStatus),
}

impl NvmeBackend {
    pub fn for_device(dev: &DeviceHandle, tur_power_check: bool) -> Self {
        Self::with_channel(Box::new(sys::KernelChannel), dev.nsid(), tur_power_check)
    }

    pub fn with_channel(
        chan: Box<dyn NvmeAdminChannel + Send>,
        nsid: u32,
        tur_power_check: bool,
    ) -> Self {
        Self {
            chan,
            nsid,
            tur_power_check,
            id_ctrl: None,
            id_ns: None,
        }
    }

    pub fn identify_controller(&self) -> Option<&IdentifyController> {
        self.id_ctrl.as_ref()
    }

    fn admin_in(
        &mut self,
        dev: Option<&DeviceHandle>,
        cmd: &mut NvmePassthruCmd,
        buf: &mut [u8],
        timeout_secs: u32,
    ) -> Result<NvmeCompletion, ChannelError> {
        cmd.data_len = buf.len() as u32;
        cmd.timeout_ms = timeout_secs.saturating_mul(1000);
        self.chan.admin(dev, cmd, AdminData::In(buf), None)
    }

    fn fetch_identify(
        &mut self,
        dev: Option<&DeviceHandle>,
        cns: u32,
        nsid: u32,
        timeout_secs: u32,
    ) -> Result<AlignedBuf, Outcome> {
        let mut buf = AlignedBuf::new(IDENTIFY_LEN).map_err(|_| Outcome::Exec(ExecStatus::OsError(libc::ENOMEM)))?;
        let mut cmd = NvmePassthruCmd::admin(admin_opcode::IDENTIFY, nsid);
        cmd.cdw10 = cns;
        match self.admin_in(dev, &mut cmd, &mut buf, timeout_secs) {
            Ok(c) if c.is_success() => Ok(buf),
            Ok(c) => {
                let (k, a, q) = status_to_sense(c.status);
                Err(Outcome::Check(k, a, q))
            },
            Err(e) => Err(channel_outcome(e)),
        }
    }

    fn controller(&mut self, dev: Option<&DeviceHandle>, timeout_secs: u32) -> Result<&IdentifyController, Outcome> {
        if self.id_ctrl.is_none() {
            let buf = self.fetch_identify(dev, CNS_CONTROLLER, 0, timeout_secs)?;
            debug!("nvme: cached identify controller");
            self.id_ctrl = Some(IdentifyController(buf));
        }
        self.id_ctrl
            .as_ref()
            .ok_or(Outcome::Exec(ExecStatus::OsError(libc::EIO)))
    }

    fn namespace(&mut self, dev: Option<&DeviceHandle>, timeout_secs: u32) -> Result<&IdentifyNamespace, Outcome> {
        if self.nsid == 0 {
            return Err(Outcome::Check(
                sense_key::ILLEGAL_REQUEST,
                asc::LUN_NOT_SUPPORTED,
                0,
            ));
        }
        if self.id_ns.is_none() {
            let buf = self.fetch_identify(dev, CNS_NAMESPACE, self.nsid, timeout_secs)?;
            self.id_ns = Some(IdentifyNamespace(buf));
        }
        self.id_ns
            .as_ref()
            .ok_or(Outcome::Exec(ExecStatus::OsError(libc::EIO)))
    }

    /// Current power state from Get Features (Power Management).
    fn power_state(&mut self, dev: Option<&DeviceHandle>, timeout_secs: u32) -> Result<u8, Outcome> {
        let mut cmd = NvmePassthruCmd::admin(admin_opcode::GET_FEATURES, 0);
        cmd.cdw10 = FID_POWER_MANAGEMENT;
        cmd.timeout_ms = timeout_secs.saturating_mul(1000);
        match self.chan.admin(dev, &mut cmd, AdminData::None, None) {
            Ok(c) if c.is_success() => Ok((c.result & 0x1f) as u8),
            Ok(c) => {
                let (k, a, q) = status_to_sense(c.status);
                Err(Outcome::Check(k, a, q))
            },
            Err(e) => Err(channel_outcome(e)),
        }
    }

    fn inquiry(&mut self, cdb: &[u8], dev: Option<&DeviceHandle>, timeout_secs: u32) -> Result<Outcome, Outcome> {
        let evpd = cdb[1] & 0x01 != 0;
        let page = cdb[2];
        if !evpd {
            if page != 0 {
                return Ok(invalid_field());
            }
            let nsid = self.nsid;
            let ic = self.controller(dev, timeout_secs)?;
            return Ok(Outcome::Data(standard_inquiry(ic, nsid)));
        }
        let payload = match page {
            0x00 => vpd_page(0x00, &SUPPORTED_VPD),
            0x80 => {
                let ic = self.controller(dev, timeout_secs)?;
                vpd_page(0x80, ic.serial())
            },
            0x83 => {
                let mut body = t10_designator(self.controller(dev, timeout_secs)?);
                if self.nsid != 0 {
                    let ns = self.namespace(dev, timeout_secs)?;
                    push_binary_designators(&mut body, ns);
                }
                vpd_page(0x83, &body)
            },
            0xb1 => {
                let mut body = [0u8; 0x3c];
                // MEDIUM ROTATION RATE: non-rotating
                put_unaligned_be16(0x0001, &mut body[0..]);
                vpd_page(0xb1, &body)
            },
            _ => return Ok(invalid_field()),
        };
        Ok(Outcome::Data(payload))
    }

    fn report_luns(&mut self, dev: Option<&DeviceHandle>, timeout_secs: u32) -> Result<Outcome, Outcome> {
        let nn = self.controller(dev, timeout_secs)?.namespace_count();
        // LUN n addresses namespace n + 1
        let count = nn.min(16384) as usize;
        let mut out = vec![0u8; 8 + 8 * count];
        put_unaligned_be32((8 * count) as u32, &mut out[0..]);
        for lun in 0..count {
            let e = &mut out[8 + 8 * lun..16 + 8 * lun];
            if lun < 256 {
                e[1] = lun as u8;
            } else {
                e[0] = 0x40 | ((lun >> 8) as u8 & 0x3f);
                e[1] = (lun & 0xff) as u8;
            }
        }
        Ok(Outcome::Data(out))
    }

    fn test_unit_ready(&mut self, dev: Option<&DeviceHandle>, timeout_secs: u32) -> Result<Outcome, Outcome> {
        if !self.tur_power_check {
            return Ok(Outcome::Good);
        }
        let ps = self.power_state(dev, timeout_secs)?;
        if ps != 0 {
            Ok(Outcome::Check(sense_key::NOT_READY, asc::LUN_NOT_READY, 0x00))
        } else {
            Ok(Outcome::Good)
        }
    }

    fn request_sense(&mut self, cdb: &[u8], dev: Option<&DeviceHandle>, timeout_secs: u32) -> Result<Outcome, Outcome> {
        let desc = cdb[1] & 0x01 != 0;
        let ps = match self.power_state(dev, timeout_secs) {
            Ok(ps) => ps,
            Err(Outcome::Exec(st)) => return Err(Outcome::Exec(st)),
            Err(_) => {
                debug!("nvme: get features (power management) failed, assuming active");
                0
            },
        };
        let asc_code = if ps != 0 {
            asc::LOW_POWER_CONDITION_ON
        } else {
            asc::NO_ADDITIONAL
        };
        let (buf, n) = build_sense(desc, sense_key::NO_SENSE, asc_code, 0);
        Ok(Outcome::Data(buf[..n].to_vec()))
    }

    fn read_capacity(&mut self, long: bool, dev: Option<&DeviceHandle>, timeout_secs: u32) -> Result<Outcome, Outcome> {
        let ns = self.namespace(dev, timeout_secs)?;
        let max_lba = ns.nsze().saturating_sub(1);
        let bs = ns.block_size();
        if long {
            let mut out = vec![0u8; 32];
            put_unaligned_be64(max_lba, &mut out[0..]);
            put_unaligned_be32(bs, &mut out[8..]);
            Ok(Outcome::Data(out))
        } else {
            let mut out = vec![0u8; 8];
            put_unaligned_be32(u32::try_from(max_lba).unwrap_or(u32::MAX), &mut out[0..]);
            put_unaligned_be32(bs, &mut out[4..]);
            Ok(Outcome::Data(out))
        }
    }

    /// SES pages through NVMe-MI Send/Receive. Buffers must be page
    /// aligned.
    fn diagnostic(
        &mut self,
        io: &mut PtIo<'_>,
        dev: Option<&DeviceHandle>,
        res: &mut PtResult,
        timeout_secs: u32,
    ) -> Result<Outcome, Outcome> {
        let op = io.cdb[0];
        let mut cmd = if op == scsi_op::SEND_DIAGNOSTIC {
            if io.cdb[1] & 0x10 == 0 {
                // self-test request without a page: nothing to tunnel
                return Ok(Outcome::Good);
            }
            let mut c = NvmePassthruCmd::admin(admin_opcode::MI_SEND, 0);
            c.cdw11 = MI_SES_SEND;
            c
        } else {
            if io.cdb[1] & 0x01 == 0 {
                return Ok(invalid_field());
            }
            let mut c = NvmePassthruCmd::admin(admin_opcode::MI_RECEIVE, 0);
            c.cdw11 = MI_SES_RECEIVE;
            c.cdw12 = io.cdb[2] as u32;
            c
        };
        cmd.cdw10 = MI_SES_CDW10;
        cmd.timeout_ms = timeout_secs.saturating_mul(1000);

        let alloc = get_unaligned_be16(&io.cdb[3..]) as usize;
        let data = match (op, io.data_in.as_deref_mut(), io.data_out) {
            (scsi_op::RECEIVE_DIAGNOSTIC, Some(d), _) => {
                if !is_page_aligned(d) {
                    return Err(Outcome::Exec(ExecStatus::BadParams));
                }
                let n = alloc.min(d.len());
                AdminData::In(&mut d[..n])
            },
            (scsi_op::SEND_DIAGNOSTIC, _, Some(d)) => {
                if !is_page_aligned(d) {
                    return Err(Outcome::Exec(ExecStatus::BadParams));
                }
                AdminData::Out(&d[..alloc.min(d.len())])
            },
            _ if alloc == 0 => AdminData::None,
            _ => return Err(Outcome::Exec(ExecStatus::BadParams)),
        };
        let moved = match &data {
            AdminData::In(d) => d.len(),
            AdminData::Out(d) => d.len(),
            AdminData::None => 0,
        };
        cmd.data_len = moved as u32;
        cmd.cdw13 = moved as u32;

        match self.chan.admin(dev, &mut cmd, data, None) {
            Ok(c) => {
                res.nvme_result = c.result;
                res.nvme_status = c.status;
                if !c.is_success() {
                    let (k, a, q) = status_to_sense(c.status);
                    return Ok(Outcome::Check(k, a, q));
                }
                if op == scsi_op::RECEIVE_DIAGNOSTIC {
                    res.resid = (io.din_len() - moved) as i64;
                } else {
                    res.dout_resid = (io.dout_len() - moved) as i64;
                }
                res.status = 0;
                res.derive_category();
                Ok(Outcome::Exec(ExecStatus::Submitted))
            },
            Err(e) => Err(channel_outcome(e)),
        }
    }

    fn raw_admin(
        &mut self,
        io: &mut PtIo<'_>,
        dev: Option<&DeviceHandle>,
        res: &mut PtResult,
        timeout_secs: u32,
        verbose: i32,
    ) -> ExecStatus {
        let Some(mut cmd) = NvmePassthruCmd::from_sqe(&io.cdb) else {
            return ExecStatus::BadParams;
        };
        cmd.timeout_ms = timeout_secs.saturating_mul(1000);
        let data = match (io.data_in.as_deref_mut(), io.data_out) {
            (Some(d), _) => {
                cmd.data_len = d.len() as u32;
                AdminData::In(d)
            },
            (None, Some(d)) => {
                cmd.data_len = d.len() as u32;
                AdminData::Out(d)
            },
            (None, None) => AdminData::None,
        };
        if verbose > 2 {
            trace!("nvme admin: [{}]", hex_spaced(cmd.as_bytes()));
        }
        match self.chan.admin(dev, &mut cmd, data, io.meta.as_mut()) {
            Ok(c) => {
                res.nvme_result = c.result;
                res.nvme_status = c.status;
                if c.is_success() {
                    res.status = 0;
                    res.derive_category();
                } else {
                    let (k, a, q) = status_to_sense(c.status);
                    check_condition(io, res, k, a, q);
                }
                ExecStatus::Submitted
            },
            Err(e) => match channel_outcome(e) {
                Outcome::Exec(st) => st,
                _ => ExecStatus::OsError(libc::EIO),
            },
        }
    }

    fn translate(
        &mut self,
        io: &mut PtIo<'_>,
        dev: Option<&DeviceHandle>,
        res: &mut PtResult,
        timeout_secs: u32,
    ) -> Result<Outcome, Outcome> {
        let cdb = io.cdb.clone();
        if cdb.len() < min_cdb_len(cdb[0]) {
            return Ok(invalid_field());
        }
        match cdb[0] {
            scsi_op::INQUIRY => self.inquiry(&cdb, dev, timeout_secs),
            scsi_op::REPORT_LUNS => self.report_luns(dev, timeout_secs),
            scsi_op::TEST_UNIT_READY => self.test_unit_ready(dev, timeout_secs),
            scsi_op::REQUEST_SENSE => self.request_sense(&cdb, dev, timeout_secs),
            scsi_op::READ_CAPACITY_10 => self.read_capacity(false, dev, timeout_secs),
            scsi_op::SERVICE_ACTION_IN_16 if cdb[1] & 0x1f == scsi_op::SA_READ_CAPACITY_16 => {
                self.read_capacity(true, dev, timeout_secs)
            },
            scsi_op::SEND_DIAGNOSTIC | scsi_op::RECEIVE_DIAGNOSTIC => {
                self.diagnostic(io, dev, res, timeout_secs)
            },
            _ => Ok(Outcome::Check(
                sense_key::ILLEGAL_REQUEST,
                asc::INVALID_OPCODE,
                0,
            )),
        }
    }
}

impl PtBackend for NvmeBackend {
    fn name(&self) -> &'static str {
        "nvme-sntl"
    }

    fn needs_device(&self) -> bool {
        self.chan.needs_device()
    }

    fn submit(
        &mut self,
        io: &mut PtIo<'_>,
        dev: Option<&DeviceHandle>,
        res: &mut PtResult,
        timeout_secs: u32,
        verbose: i32,
    ) -> ExecStatus {
        if self.nsid != 0 {
            res.nvme_nsid = Some(self.nsid);
        }
        let n = io.cdb.len();
        if (RAW_CMD_MIN..=RAW_CMD_MAX).contains(&n) && !matches!(io.cdb[0], 0x7e | 0x7f) {
            return self.raw_admin(io, dev, res, timeout_secs, verbose);
        }
        if verbose > 1 {
            debug!("nvme: translating opcode 0x{:02x}", io.cdb[0]);
        }

        let outcome = match self.translate(io, dev, res, timeout_secs) {
            Ok(o) | Err(o) => o,
        };
        match outcome {
            Outcome::Data(payload) => {
                let alloc = alloc_len(&io.cdb).unwrap_or(payload.len());
                let want = payload.len().min(alloc);
                let moved = match io.data_in.as_deref_mut() {
                    Some(d) => {
                        let n = want.min(d.len());
                        d[..n].copy_from_slice(&payload[..n]);
                        n
                    },
                    None => 0,
                };
                res.resid = (io.din_len() - moved) as i64;
                res.status = 0;
                res.derive_category();
                ExecStatus::Submitted
            },
            Outcome::Good => {
                res.resid = io.din_len() as i64;
                res.status = 0;
                res.derive_category();
                ExecStatus::Submitted
            },
            Outcome::Check(k, a, q) => {
                res.resid = io.din_len() as i64;
                check_condition(io, res, k, a, q);
                ExecStatus::Submitted
            },
            Outcome::Exec(st) => st,
        }
    }

    fn clear_cache(&mut self) {
        self.id_ctrl = None;
        self.id_ns = None;
    }
}

fn channel_outcome(e: ChannelError) -> Outcome {
    match e {
        ChannelError::Os(errno) => Outcome::Exec(ExecStatus::OsError(errno)),
        ChannelError::Unsupported => Outcome::Exec(ExecStatus::NotSupported),
    }
}

fn invalid_field() -> Outcome {
    Outcome::Check(sense_key::ILLEGAL_REQUEST, asc::INVALID_FIELD_IN_CDB, 0)
}

fn check_condition(io: &mut PtIo<'_>, res: &mut PtResult, key: u8, asc_code: u8, ascq: u8) {
    let (buf, n) = build_sense(false, key, asc_code, ascq);
    res.sense_len = io.write_sense(&buf[..n]);
    res.status = ScsiStatus::CheckCondition.into();
    res.derive_category();
}

/// Shortest CDB each translated opcode can be decoded from.
fn min_cdb_len(op: u8) -> usize {
    match op {
        scsi_op::READ_CAPACITY_10 => 10,
        scsi_op::REPORT_LUNS => 12,
        scsi_op::SERVICE_ACTION_IN_16 => 16,
        _ => 6,
    }
}

/// Allocation length field of the translated opcodes.
fn alloc_len(cdb: &[u8]) -> Option<usize> {
    let field = match *cdb.first()? {
        scsi_op::INQUIRY | scsi_op::RECEIVE_DIAGNOSTIC => get_unaligned_be16(cdb.get(3..5)?) as u32,
        scsi_op::REQUEST_SENSE => *cdb.get(4)? as u32,
        scsi_op::REPORT_LUNS => get_unaligned_be32(cdb.get(6..10)?),
        scsi_op::SERVICE_ACTION_IN_16 => get_unaligned_be32(cdb.get(10..14)?),
        _ => return None,
    };
    Some(field as usize)
}

fn vpd_page(code: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; 4 + body.len()];
    out[1] = code;
    put_unaligned_be16(body.len() as u16, &mut out[2..]);
    out[4..].copy_from_slice(body);
    out
}

fn standard_inquiry(ic: &IdentifyController, nsid: u32) -> Vec<u8> {
    let mut out = vec![0u8; 36];
    // direct access block device; unknown LU when bound to the controller
    out[0] = if nsid == 0 { 0x1f } else { 0x00 };
    out[2] = 0x07;
    out[3] = 0x12;
    out[4] = 31;
    out[7] = 0x02;
    copy_space_padded(&mut out[8..16], T10_VENDOR.as_bytes());
    out[16..32].copy_from_slice(&ic.model()[..16]);
    out[32..36].copy_from_slice(&ic.firmware()[..4]);
    out
}

fn t10_designator(ic: &IdentifyController) -> Vec<u8> {
    let mut id = vec![0u8; 8];
    copy_space_padded(&mut id, T10_VENDOR.as_bytes());
    id.extend_from_slice(trim_ascii(ic.model()).as_bytes());
    id.push(b'_');
    id.extend_from_slice(trim_ascii(ic.serial()).as_bytes());
    let mut d = vec![0x02, 0x01, 0x00, id.len() as u8];
    d.extend_from_slice(&id);
    d
}

fn push_binary_designators(out: &mut Vec<u8>, ns: &IdentifyNamespace) {
    for id in [ns.nguid(), ns.eui64()] {
        if id.iter().any(|&b| b != 0) {
            // binary code set, EUI-64 based designator, LU association
            out.extend_from_slice(&[0x01, 0x02, 0x00, id.len() as u8]);
            out.extend_from_slice(id);
        }
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::os::unix::io::AsRawFd;

    use super::*;

    /// `NVME_IOCTL_ADMIN_CMD`.
    const NVME_IOCTL_ADMIN_CMD: libc::c_ulong = 0xC048_4E41;

    #[derive(Debug, Default)]
    pub(super) struct KernelChannel;

    impl NvmeAdminChannel for KernelChannel {
        fn admin(
            &mut self,
            dev: Option<&DeviceHandle>,
            cmd: &mut NvmePassthruCmd,
            data: AdminData<'_>,
            meta: Option<&mut NvmeMeta<'_>>,
        ) -> Result<NvmeCompletion, ChannelError> {
            let Some(file) = dev.and_then(|d| d.file()) else {
                return Err(ChannelError::Os(libc::EBADF));
            };
            match data {
                AdminData::In(d) => {
                    cmd.addr = d.as_mut_ptr() as u64;
                    cmd.data_len = d.len() as u32;
                },
                AdminData::Out(d) => {
                    cmd.addr = d.as_ptr() as u64;
                    cmd.data_len = d.len() as u32;
                },
                AdminData::None => {
                    cmd.addr = 0;
                    cmd.data_len = 0;
                },
            }
            match meta {
                Some(NvmeMeta::In(m)) => {
                    cmd.metadata = m.as_mut_ptr() as u64;
                    cmd.metadata_len = m.len() as u32;
                },
                Some(NvmeMeta::Out(m)) => {
                    cmd.metadata = m.as_ptr() as u64;
                    cmd.metadata_len = m.len() as u32;
                },
                None => {},
            }
            // SAFETY: cmd is a valid nvme_passthru_cmd whose buffers are
            // borrowed for the duration of the call.
            let rc = unsafe {
                libc::ioctl(
                    file.as_raw_fd(),
                    NVME_IOCTL_ADMIN_CMD as _,
                    cmd as *mut NvmePassthruCmd,
                )
            };
            if rc < 0 {
                return Err(ChannelError::Os(
                    std::io::Error::last_os_error()
                        .raw_os_error()
                        .unwrap_or(libc::EIO),
                ));
            }
            Ok(NvmeCompletion {
                status: rc as u16,
                result: cmd.result,
            })
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use super::*;

    #[derive(Debug, Default)]
    pub(super) struct KernelChannel;

    impl NvmeAdminChannel for KernelChannel {
        fn admin(
            &mut self,
            _dev: Option<&DeviceHandle>,
            _cmd: &mut NvmePassthruCmd,
            _data: AdminData<'_>,
            _meta: Option<&mut NvmeMeta<'_>>,
        ) -> Result<NvmeCompletion, ChannelError> {
            Err(ChannelError::Unsupported)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::models::status::ResultCategory;

    #[derive(Default)]
    struct Script {
        opcodes: Vec<u8>,
        power_state: u32,
        nn: u32,
        get_features_errno: Option<i32>,
    }

    struct FakeCtrl(Arc<Mutex<Script>>);

    impl NvmeAdminChannel for FakeCtrl {
        fn needs_device(&self) -> bool {
            false
        }

        fn admin(
            &mut self,
            _dev: Option<&DeviceHandle>,
            cmd: &mut NvmePassthruCmd,
            data: AdminData<'_>,
            _meta: Option<&mut NvmeMeta<'_>>,
        ) -> Result<NvmeCompletion, ChannelError> {
            let mut s = self.0.lock().map_err(|_| ChannelError::Os(libc::EIO))?;
            s.opcodes.push(cmd.opcode);
            match (cmd.opcode, data) {
                (admin_opcode::IDENTIFY, AdminData::In(d)) if cmd.cdw10 == CNS_CONTROLLER => {
                    d[4..24].copy_from_slice(b"S123456789          ");
                    d[24..64].copy_from_slice(b"ACME FastDisk 9000 Pro                  ");
                    d[64..72].copy_from_slice(b"FW1.2.3 ");
                    d[516..520].copy_from_slice(&s.nn.to_le_bytes());
                    Ok(NvmeCompletion::default())
                },
                (admin_opcode::IDENTIFY, AdminData::In(d)) => {
                    d[0..8].copy_from_slice(&1000u64.to_le_bytes());
                    d[128 + 2] = 12;
                    Ok(NvmeCompletion::default())
                },
                (admin_opcode::GET_FEATURES, _) => match s.get_features_errno {
                    Some(errno) => Err(ChannelError::Os(errno)),
                    None => Ok(NvmeCompletion {
                        status: 0,
                        result: s.power_state,
                    }),
                },
                _ => Ok(NvmeCompletion {
                    status: 0x0001,
                    result: 0,
                }),
            }
        }
    }

    fn backend(nsid: u32) -> (NvmeBackend, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script {
            nn: 2,
            ..Default::default()
        }));
        let b = NvmeBackend::with_channel(Box::new(FakeCtrl(script.clone())), nsid, true);
        (b, script)
    }

    fn run(b: &mut NvmeBackend, cdb: &[u8], din: Option<&mut [u8]>, sense: &mut [u8]) -> PtResult {
        let mut io = PtIo {
            cdb: cdb.to_vec(),
            data_in: din,
            sense: Some(sense),
            ..Default::default()
        };
        let mut res = PtResult::default();
        assert_eq!(b.submit(&mut io, None, &mut res, 5, 0), ExecStatus::Submitted);
        res
    }

    #[test]
    fn standard_inquiry_from_cached_identify() {
        let (mut b, script) = backend(1);
        let mut sense = [0u8; 32];
        for _ in 0..2 {
            let mut din = [0u8; 36];
            let res = run(&mut b, &[0x12, 0, 0, 0, 36, 0], Some(&mut din), &mut sense);
            assert_eq!(res.category, ResultCategory::Good);
            assert_eq!(&din[8..16], b"NVMe    ");
            assert_eq!(&din[16..32], b"ACME FastDisk 90");
            assert_eq!(&din[32..36], b"FW1.");
        }
        let identifies = script
            .lock()
            .map(|s| s.opcodes.iter().filter(|&&o| o == admin_opcode::IDENTIFY).count())
            .unwrap_or(0);
        assert_eq!(identifies, 1);

        b.clear_cache();
        assert!(b.identify_controller().is_none());
    }

    #[test]
    fn device_identification_vpd() {
        let (mut b, _) = backend(0);
        let mut din = [0u8; 128];
        let mut sense = [0u8; 32];
        run(&mut b, &[0x12, 1, 0x83, 0, 128, 0], Some(&mut din), &mut sense);
        assert_eq!(din[1], 0x83);
        assert_eq!(din[5], 0x01);
        let len = din[7] as usize;
        let id = &din[8..8 + len];
        assert!(id.starts_with(b"NVMe    ACME FastDisk 9000 Pro_S123456789"));
    }

    #[test]
    fn unknown_vpd_page_is_invalid_field() {
        let (mut b, _) = backend(1);
        let mut din = [0u8; 64];
        let mut sense = [0u8; 32];
        let res = run(&mut b, &[0x12, 1, 0x89, 0, 64, 0], Some(&mut din), &mut sense);
        assert_eq!(res.category, ResultCategory::Sense);
        assert_eq!(sense[2], sense_key::ILLEGAL_REQUEST);
        assert_eq!(sense[12], asc::INVALID_FIELD_IN_CDB);
    }

    #[test]
    fn unsupported_opcode_is_invalid_op() {
        let (mut b, _) = backend(1);
        let mut sense = [0u8; 32];
        let res = run(&mut b, &[0x5a, 0, 0x3f, 0, 0, 0, 0, 0, 0xfc, 0], None, &mut sense);
        assert_eq!(res.status, 0x02);
        assert_eq!(sense[2], sense_key::ILLEGAL_REQUEST);
        assert_eq!(sense[12], asc::INVALID_OPCODE);
    }

    #[test]
    fn tur_reports_low_power_as_not_ready() {
        let (mut b, script) = backend(1);
        let mut sense = [0u8; 32];
        let res = run(&mut b, &[0; 6], None, &mut sense);
        assert_eq!(res.category, ResultCategory::Good);
        if let Ok(mut s) = script.lock() {
            s.power_state = 3;
        }
        let res = run(&mut b, &[0; 6], None, &mut sense);
        assert_eq!(res.category, ResultCategory::Sense);
        assert_eq!(sense[2], sense_key::NOT_READY);

        let mut din = [0u8; 18];
        let res = run(&mut b, &[0x03, 0, 0, 0, 18, 0], Some(&mut din), &mut sense);
        assert_eq!(res.category, ResultCategory::Good);
        assert_eq!(din[12], asc::LOW_POWER_CONDITION_ON);
    }

    #[test]
    fn short_cdbs_never_index_past_the_end() {
        let (mut b, _) = backend(1);
        let mut sense = [0u8; 32];
        let accepted: [&[u8]; 5] = [
            &[0x00, 0, 0, 0, 0, 0],
            &[0x03, 0, 0, 0, 18, 0],
            &[0x12, 0, 0, 0, 36, 0],
            &[0x1c, 1, 0, 0, 0, 0],
            &[0x1d, 0, 0, 0, 0, 0],
        ];
        for cdb in accepted {
            run(&mut b, cdb, None, &mut sense);
        }
        let too_short: [&[u8]; 5] = [
            &[0xa0, 0, 0, 0, 0, 0],
            &[0xa0, 0, 0, 0, 0, 0, 0, 0, 0, 64],
            &[0x25, 0, 0, 0, 0, 0],
            &[0x9e, 0x10, 0, 0, 0, 0, 0, 0, 0, 0],
            &[0x9e, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        ];
        for cdb in too_short {
            let mut din = [0u8; 64];
            sense.fill(0);
            let res = run(&mut b, cdb, Some(&mut din), &mut sense);
            assert_eq!(res.category, ResultCategory::Sense, "cdb {cdb:02x?}");
            assert_eq!(sense[2], sense_key::ILLEGAL_REQUEST);
            assert_eq!(sense[12], asc::INVALID_FIELD_IN_CDB);
            assert_eq!(res.resid, 64);
        }
        assert_eq!(alloc_len(&[0xa0, 0, 0, 0, 0, 0]), None);
        assert_eq!(alloc_len(&[0x9e, 0x10, 0, 0, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(alloc_len(&[0x03, 0, 0, 0]), None);
        assert_eq!(alloc_len(&[]), None);
    }

    #[test]
    fn request_sense_surfaces_os_error_from_get_features() {
        let (mut b, script) = backend(1);
        if let Ok(mut s) = script.lock() {
            s.get_features_errno = Some(libc::ENODEV);
        }
        let mut din = [0u8; 18];
        let mut io = PtIo {
            cdb: vec![0x03, 0, 0, 0, 18, 0],
            data_in: Some(&mut din),
            ..Default::default()
        };
        let mut res = PtResult::default();
        assert_eq!(
            b.submit(&mut io, None, &mut res, 5, 0),
            ExecStatus::OsError(libc::ENODEV)
        );
    }

    #[test]
    fn report_luns_lists_namespaces() {
        let (mut b, _) = backend(1);
        let mut din = [0u8; 64];
        let mut sense = [0u8; 32];
        let res = run(&mut b, &[0xa0, 0, 0, 0, 0, 0, 0, 0, 0, 64, 0, 0], Some(&mut din), &mut sense);
        assert_eq!(get_unaligned_be32(&din), 16);
        assert_eq!(din[8 + 8 + 1], 1);
        assert_eq!(res.resid, 64 - 24);
    }

    #[test]
    fn read_capacity_from_namespace() {
        let (mut b, _) = backend(1);
        let mut din = [0u8; 8];
        let mut sense = [0u8; 32];
        run(&mut b, &[0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0], Some(&mut din), &mut sense);
        assert_eq!(get_unaligned_be32(&din), 999);
        assert_eq!(get_unaligned_be32(&din[4..]), 4096);
    }

    #[test]
    fn diagnostic_needs_page_aligned_buffer() {
        let (mut b, _) = backend(1);
        let mut buf = AlignedBuf::new(8192).expect("alloc");
        let mut sense = [0u8; 32];
        let cdb = [0x1c, 0x01, 0x02, 0x00, 0x40, 0x00];

        let mut io = PtIo {
            cdb: cdb.to_vec(),
            data_in: Some(&mut buf[1..65]),
            sense: Some(&mut sense),
            ..Default::default()
        };
        let mut res = PtResult::default();
        assert_eq!(b.submit(&mut io, None, &mut res, 5, 0), ExecStatus::BadParams);

        let mut io = PtIo {
            cdb: cdb.to_vec(),
            data_in: Some(&mut buf[..64]),
            sense: Some(&mut sense),
            ..Default::default()
        };
        let mut res = PtResult::default();
        assert_eq!(b.submit(&mut io, None, &mut res, 5, 0), ExecStatus::Submitted);
    }

    #[test]
    fn raw_admin_status_maps_to_sense() {
        let (mut b, script) = backend(1);
        let mut sqe = [0u8; 64];
        sqe[0] = 0xc0;
        let mut sense = [0u8; 32];
        let res = run(&mut b, &sqe, None, &mut sense);
        assert_eq!(res.nvme_status, 0x0001);
        assert_eq!(res.nvme_nsid, Some(1));
        assert_eq!(res.category, ResultCategory::Sense);
        assert_eq!(sense[12], asc::INVALID_OPCODE);
        let last = script.lock().ok().and_then(|s| s.opcodes.last().copied());
        assert_eq!(last, Some(0xc0));
    }

    #[test]
    fn passthru_cmd_is_72_bytes() {
        assert_eq!(std::mem::size_of::<NvmePassthruCmd>(), 72);
        let mut sqe = [0u8; 64];
        sqe[0] = admin_opcode::IDENTIFY;
        sqe[40] = 0x01;
        let cmd = NvmePassthruCmd::from_sqe(&sqe).expect("sqe");
        assert_eq!(cmd.opcode, admin_opcode::IDENTIFY);
        assert_eq!(cmd.cdw10, CNS_CONTROLLER);
    }
}
