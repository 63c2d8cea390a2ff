// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Pass-through session: one CDB, at most one data direction, a lent sense
//! buffer and the result record the backend fills in.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};

use tracing::{debug, trace, warn};

use crate::{
    models::{
        error::{ErrorKind, classify},
        sense_data::SENSE_MIN_LEN,
        status::{ResultCategory, ScsiStatus, TaskAttribute, TaskManagement},
    },
    pt::{
        backend::{Backend, PtBackend},
        device::DeviceHandle,
    },
    utils::hex_spaced,
};

pub const CDB_MIN_LEN: usize = 6;
pub const CDB_MAX_LEN: usize = 260;

/// Raw value returned for [`ExecStatus::NotSupported`].
pub const EXEC_NOT_SUPPORTED: i32 = 3;

static OUTSTANDING: AtomicUsize = AtomicUsize::new(0);

/// Number of sessions constructed and not yet dropped in this process.
pub fn outstanding_sessions() -> usize {
    OUTSTANDING.load(Ordering::SeqCst)
}

/// Outcome of one `execute` call, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Command reached the device (or the translator); result fields valid.
    Submitted,
    BadParams,
    Timeout,
    /// Positive errno.
    OsError(i32),
    NotSupported,
}

impl ExecStatus {
    /// Small-integer form: 0, 1, 2, `-errno`, or a positive not-supported
    /// code.
    pub fn as_raw(self) -> i32 {
        match self {
            ExecStatus::Submitted => 0,
            ExecStatus::BadParams => 1,
            ExecStatus::Timeout => 2,
            ExecStatus::OsError(errno) => -errno,
            ExecStatus::NotSupported => EXEC_NOT_SUPPORTED,
        }
    }

    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => ExecStatus::Submitted,
            1 => ExecStatus::BadParams,
            2 => ExecStatus::Timeout,
            r if r < 0 => ExecStatus::OsError(-r),
            _ => ExecStatus::NotSupported,
        }
    }
}

bitflags::bitflags! {
    /// Advisory queueing hints.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PtFlags: u32 {
        const Q_AT_TAIL = 0x10;
        const Q_AT_HEAD = 0x20;
    }
}

impl PtFlags {
    /// Contradictory hints fall back to the default queueing.
    pub fn effective(self) -> Self {
        if self.contains(PtFlags::Q_AT_HEAD | PtFlags::Q_AT_TAIL) {
            PtFlags::empty()
        } else {
            self
        }
    }
}

/// NVMe metadata buffer with its direction.
#[derive(Debug)]
pub enum NvmeMeta<'a> {
    In(&'a mut [u8]),
    Out(&'a [u8]),
}

/// Everything the caller attaches to a session before `execute`.
#[derive(Debug, Default)]
pub struct PtIo<'a> {
    pub cdb: Vec<u8>,
    pub data_in: Option<&'a mut [u8]>,
    pub data_out: Option<&'a [u8]>,
    pub sense: Option<&'a mut [u8]>,
    pub meta: Option<NvmeMeta<'a>>,
    pub flags: PtFlags,
    pub packet_id: i32,
    pub tag: u64,
    pub task_mgmt: Option<TaskManagement>,
    pub task_attr: TaskAttribute,
    pub priority: u8,
}

impl PtIo<'_> {
    pub fn din_len(&self) -> usize {
        self.data_in.as_ref().map_or(0, |b| b.len())
    }

    pub fn dout_len(&self) -> usize {
        self.data_out.map_or(0, |b| b.len())
    }

    pub fn sense_cap(&self) -> usize {
        self.sense.as_ref().map_or(0, |b| b.len())
    }

    /// Copy `src` into the lent sense buffer; returns bytes written.
    pub fn write_sense(&mut self, src: &[u8]) -> usize {
        match self.sense.as_deref_mut() {
            Some(dst) => {
                let n = src.len().min(dst.len());
                dst[..n].copy_from_slice(&src[..n]);
                n
            },
            None => 0,
        }
    }
}

/// Result fields populated by `execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PtResult {
    pub category: ResultCategory,
    pub status: u8,
    pub sense_len: usize,
    /// Requested minus transferred, data-in.
    pub resid: i64,
    pub dout_resid: i64,
    pub req_din: usize,
    pub req_dout: usize,
    pub host_status: u16,
    pub driver_status: u16,
    pub transport_err: i32,
    pub transport_msg: Option<String>,
    pub os_err: i32,
    pub duration_ms: u64,
    pub duration_ns: Option<u64>,
    pub nvme_result: u32,
    pub nvme_status: u16,
    pub nvme_nsid: Option<u32>,
}

impl PtResult {
    /// Shared rule used by backends once their native fields are copied in:
    /// transport first, then good-like statuses, then CHECK CONDITION with
    /// sense, then any other status.
    pub fn derive_category(&mut self) {
        if self.os_err != 0 {
            self.category = ResultCategory::OsErr;
        } else if self.transport_err != 0 {
            self.category = ResultCategory::TransportErr;
        } else {
            let st = ScsiStatus::from(self.status);
            self.category = if st.is_good_like() {
                ResultCategory::Good
            } else if st == ScsiStatus::CheckCondition && self.sense_len > 0 {
                ResultCategory::Sense
            } else {
                ResultCategory::Status
            };
        }
    }

    pub fn set_transport_err(&mut self, code: i32, msg: impl Into<String>) {
        self.transport_err = code;
        self.transport_msg = Some(msg.into());
    }
}

/// Something a session can target: a real device handle, or a test double
/// that only supplies a backend.
pub trait PtTarget {
    fn handle(&self) -> Option<&DeviceHandle>;
    fn construct_backend(&self) -> Backend;
}

impl PtTarget for DeviceHandle {
    fn handle(&self) -> Option<&DeviceHandle> {
        Some(self)
    }

    fn construct_backend(&self) -> Backend {
        Backend::for_device(self)
    }
}

pub struct PtSession<'a> {
    backend: Backend,
    dev: Option<&'a DeviceHandle>,
    io: PtIo<'a>,
    res: PtResult,
    last: Option<ExecStatus>,
}

impl<'a> PtSession<'a> {
    /// Unbound session over an explicit backend.
    pub fn new(backend: Backend) -> Self {
        OUTSTANDING.fetch_add(1, Ordering::SeqCst);
        Self {
            backend,
            dev: None,
            io: PtIo::default(),
            res: PtResult::default(),
            last: None,
        }
    }

    /// Session bound to `target` with the backend it selects.
    pub fn open<T: PtTarget + ?Sized>(target: &'a T) -> Self {
        let mut s = Self::new(target.construct_backend());
        s.dev = target.handle();
        s
    }

    pub fn bind(&mut self, dev: &'a DeviceHandle) {
        self.dev = Some(dev);
    }

    pub fn device(&self) -> Option<&'a DeviceHandle> {
        self.dev
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Reset CDB, buffers, tags and results. Keeps the device binding and
    /// drops any cached device identity.
    pub fn clear(&mut self) {
        self.partial_clear();
        self.backend.clear_cache();
    }

    /// Like [`PtSession::clear`] but keeps backend caches.
    pub fn partial_clear(&mut self) {
        self.io = PtIo::default();
        self.res = PtResult::default();
        self.last = None;
    }

    pub fn set_cdb(&mut self, cdb: &[u8]) {
        self.io.cdb.clear();
        self.io.cdb.extend_from_slice(cdb);
    }

    pub fn cdb(&self) -> &[u8] {
        &self.io.cdb
    }

    pub fn cdb_len(&self) -> usize {
        self.io.cdb.len()
    }

    pub fn set_sense(&mut self, sense: &'a mut [u8]) {
        self.io.sense = Some(sense);
    }

    pub fn set_data_in(&mut self, buf: &'a mut [u8]) {
        self.io.data_in = Some(buf);
    }

    pub fn set_data_out(&mut self, buf: &'a [u8]) {
        self.io.data_out = Some(buf);
    }

    pub fn set_nvme_meta(&mut self, meta: NvmeMeta<'a>) {
        self.io.meta = Some(meta);
    }

    pub fn set_flags(&mut self, flags: PtFlags) {
        self.io.flags = flags.effective();
    }

    pub fn set_packet_id(&mut self, id: i32) {
        self.io.packet_id = id;
    }

    pub fn set_tag(&mut self, tag: u64) {
        self.io.tag = tag;
    }

    pub fn set_task_management(&mut self, tmf: TaskManagement) {
        self.io.task_mgmt = Some(tmf);
    }

    pub fn set_task_attr_priority(&mut self, attr: TaskAttribute, priority: u8) {
        self.io.task_attr = attr;
        self.io.priority = priority & 0x0f;
    }

    fn check_params(&self) -> Result<(), &'static str> {
        let n = self.io.cdb.len();
        if n == 0 {
            return Err("cdb not set");
        }
        if !(CDB_MIN_LEN..=CDB_MAX_LEN).contains(&n) {
            return Err("cdb length out of range");
        }
        if self.io.data_in.is_some() && self.io.data_out.is_some() {
            return Err("both data directions set");
        }
        if self.io.sense.is_some() && self.io.sense_cap() < SENSE_MIN_LEN {
            return Err("sense buffer too small");
        }
        if self.dev.is_none() && self.backend.needs_device() {
            return Err("session not bound to a device");
        }
        Ok(())
    }

    /// Submit the CDB through the backend and wait for completion.
    pub fn execute(&mut self, timeout_secs: u32, verbose: i32) -> ExecStatus {
        self.res = PtResult {
            req_din: self.io.din_len(),
            req_dout: self.io.dout_len(),
            ..PtResult::default()
        };

        if let Err(why) = self.check_params() {
            if verbose > 0 {
                warn!("{}: {why}", self.backend.name());
            }
            self.res.category = ResultCategory::BadParams;
            return self.finish(ExecStatus::BadParams);
        }

        if let Some(s) = self.io.sense.as_deref_mut() {
            s.fill(0);
        }
        if verbose > 0 {
            debug!(
                backend = self.backend.name(),
                "cdb: [{}] din={} dout={}",
                hex_spaced(&self.io.cdb),
                self.res.req_din,
                self.res.req_dout
            );
        }

        let start = Instant::now();
        let st = self
            .backend
            .submit(&mut self.io, self.dev, &mut self.res, timeout_secs, verbose);
        let elapsed = start.elapsed();
        self.res.duration_ms = elapsed.as_millis() as u64;
        if self.res.duration_ns.is_none() {
            self.res.duration_ns = Some(elapsed.as_nanos() as u64);
        }

        self.res.resid = self.res.resid.clamp(0, self.res.req_din as i64);
        self.res.dout_resid = self.res.dout_resid.clamp(0, self.res.req_dout as i64);
        self.res.sense_len = self.res.sense_len.min(self.io.sense_cap());

        match st {
            ExecStatus::OsError(errno) => {
                self.res.os_err = errno;
                self.res.category = ResultCategory::OsErr;
            },
            ExecStatus::Timeout => self.res.category = ResultCategory::Timeout,
            ExecStatus::BadParams => self.res.category = ResultCategory::BadParams,
            ExecStatus::Submitted | ExecStatus::NotSupported => {},
        }

        if verbose > 2 && self.res.sense_len > 0 {
            trace!("sense: [{}]", hex_spaced(self.sense_buf()));
        }
        if verbose > 3 {
            debug!(
                "{}: {} ms ({:?} ns), status=0x{:02x}, resid={}",
                self.backend.name(),
                self.res.duration_ms,
                self.res.duration_ns,
                self.res.status,
                self.res.resid
            );
        }
        self.finish(st)
    }

    /// Bind to `dev` then execute.
    pub fn execute_on(&mut self, dev: &'a DeviceHandle, timeout_secs: u32, verbose: i32) -> ExecStatus {
        self.bind(dev);
        self.execute(timeout_secs, verbose)
    }

    fn finish(&mut self, st: ExecStatus) -> ExecStatus {
        self.last = Some(st);
        st
    }

    pub fn last_exec(&self) -> Option<ExecStatus> {
        self.last
    }

    /// Classify the last execution; `BadParams` when nothing ran yet.
    pub fn classify(&self, strict: bool) -> ErrorKind {
        let exec = self.last.unwrap_or(ExecStatus::BadParams);
        classify(exec, &self.res, self.sense_buf(), strict)
    }

    pub fn result(&self) -> &PtResult {
        &self.res
    }

    pub fn result_category(&self) -> ResultCategory {
        self.res.category
    }

    /// Data-in residual.
    pub fn resid(&self) -> usize {
        self.res.resid as usize
    }

    pub fn dout_resid(&self) -> usize {
        self.res.dout_resid as usize
    }

    /// `(data_in, data_out)` lengths requested.
    pub fn req_lengths(&self) -> (usize, usize) {
        (self.res.req_din, self.res.req_dout)
    }

    /// `(data_in, data_out)` bytes actually transferred.
    pub fn actual_lengths(&self) -> (usize, usize) {
        (
            self.res.req_din - self.resid(),
            self.res.req_dout - self.dout_resid(),
        )
    }

    pub fn status_response(&self) -> u8 {
        self.res.status
    }

    pub fn sense_len(&self) -> usize {
        self.res.sense_len
    }

    /// The populated part of the lent sense buffer.
    pub fn sense_buf(&self) -> &[u8] {
        match self.io.sense.as_deref() {
            Some(s) => &s[..self.res.sense_len.min(s.len())],
            None => &[],
        }
    }

    /// Data-in bytes actually transferred.
    pub fn data_in(&self) -> &[u8] {
        let actual = self.actual_lengths().0;
        match self.io.data_in.as_deref() {
            Some(d) => &d[..actual.min(d.len())],
            None => &[],
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.res.duration_ms
    }

    pub fn duration_ns(&self) -> Option<u64> {
        self.res.duration_ns
    }

    pub fn os_err(&self) -> i32 {
        self.res.os_err
    }

    pub fn os_err_str(&self) -> Option<String> {
        (self.res.os_err != 0)
            .then(|| std::io::Error::from_raw_os_error(self.res.os_err).to_string())
    }

    pub fn transport_err(&self) -> i32 {
        self.res.transport_err
    }

    pub fn transport_err_str(&self) -> Option<&str> {
        self.res.transport_msg.as_deref()
    }

    pub fn nvme_result(&self) -> u32 {
        self.res.nvme_result
    }

    pub fn nvme_nsid(&self) -> Option<u32> {
        self.res.nvme_nsid
    }
}

impl Drop for PtSession<'_> {
    fn drop(&mut self) {
        OUTSTANDING.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for PtSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtSession")
            .field("backend", &self.backend.name())
            .field("device", &self.dev.map(|d| d.name()))
            .field("cdb", &hex_spaced(&self.io.cdb))
            .field("result", &self.res)
            .finish()
    }
}

/// Single data direction for [`PtCommand`].
#[derive(Debug, Default)]
pub enum DataDir<'a> {
    #[default]
    None,
    In(&'a mut [u8]),
    Out(&'a [u8]),
}

/// Builder over [`PtSession`] for the common one-shot case.
#[derive(Debug)]
pub struct PtCommand<'a> {
    cdb: &'a [u8],
    data: DataDir<'a>,
    sense: Option<&'a mut [u8]>,
    timeout_secs: u32,
    verbose: i32,
    flags: PtFlags,
}

impl<'a> PtCommand<'a> {
    pub fn new(cdb: &'a [u8]) -> Self {
        Self {
            cdb,
            data: DataDir::None,
            sense: None,
            timeout_secs: crate::cfg::config::DEFAULT_TIMEOUT_SECS,
            verbose: 0,
            flags: PtFlags::empty(),
        }
    }

    pub fn data(mut self, data: DataDir<'a>) -> Self {
        self.data = data;
        self
    }

    pub fn sense(mut self, sense: &'a mut [u8]) -> Self {
        self.sense = Some(sense);
        self
    }

    pub fn timeout(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn verbose(mut self, verbose: i32) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn flags(mut self, flags: PtFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Build the session, run it once and hand it back for result reads.
    pub fn run<T: PtTarget + ?Sized>(self, target: &'a T) -> (ExecStatus, PtSession<'a>) {
        let mut s = PtSession::open(target);
        s.set_cdb(self.cdb);
        match self.data {
            DataDir::None => {},
            DataDir::In(b) => s.set_data_in(b),
            DataDir::Out(b) => s.set_data_out(b),
        }
        if let Some(sense) = self.sense {
            s.set_sense(sense);
        }
        s.set_flags(self.flags);
        let st = s.execute(self.timeout_secs, self.verbose);
        (st, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pt::dummy::DummyBackend;

    fn dummy<'a>() -> PtSession<'a> {
        PtSession::new(Backend::Dummy(DummyBackend::default()))
    }

    #[test]
    fn rejects_bad_cdb_lengths() {
        let mut s = dummy();
        assert_eq!(s.execute(5, 0), ExecStatus::BadParams);
        s.set_cdb(&[0u8; 5]);
        assert_eq!(s.execute(5, 0), ExecStatus::BadParams);
        s.set_cdb(&[0u8; 261]);
        assert_eq!(s.execute(5, 0), ExecStatus::BadParams);
        assert_eq!(s.result_category(), ResultCategory::BadParams);
        assert_eq!(s.classify(false), ErrorKind::Syntax);
        s.set_cdb(&[0u8; 260]);
        assert_eq!(s.execute(5, 0), ExecStatus::Submitted);
    }

    #[test]
    fn rejects_both_directions() {
        let mut din = [0u8; 8];
        let dout = [0u8; 8];
        let mut s = dummy();
        s.set_cdb(&[0x12, 0, 0, 0, 8, 0]);
        s.set_data_in(&mut din);
        s.set_data_out(&dout);
        assert_eq!(s.execute(5, 0), ExecStatus::BadParams);
    }

    #[test]
    fn rejects_short_sense_buffer() {
        let mut sense = [0u8; 7];
        let mut s = dummy();
        s.set_cdb(&[0u8; 6]);
        s.set_sense(&mut sense);
        assert_eq!(s.execute(5, 0), ExecStatus::BadParams);
    }

    #[test]
    fn raw_exec_codes() {
        assert_eq!(ExecStatus::OsError(libc::EINTR).as_raw(), -libc::EINTR);
        assert_eq!(ExecStatus::from_raw(-5), ExecStatus::OsError(5));
        assert_eq!(ExecStatus::Timeout.as_raw(), 2);
        assert!(ExecStatus::NotSupported.as_raw() > 2);
    }

    #[test]
    fn contradictory_flags_fall_back() {
        assert_eq!(
            (PtFlags::Q_AT_HEAD | PtFlags::Q_AT_TAIL).effective(),
            PtFlags::empty()
        );
        assert_eq!(PtFlags::Q_AT_HEAD.effective(), PtFlags::Q_AT_HEAD);
    }

    #[test]
    fn derive_category_order() {
        let mut r = PtResult {
            status: 0x02,
            sense_len: 18,
            ..Default::default()
        };
        r.derive_category();
        assert_eq!(r.category, ResultCategory::Sense);
        r.set_transport_err(1, "DID_NO_CONNECT");
        r.derive_category();
        assert_eq!(r.category, ResultCategory::TransportErr);
        let mut r = PtResult {
            status: 0x02,
            ..Default::default()
        };
        r.derive_category();
        assert_eq!(r.category, ResultCategory::Status);
    }
}
