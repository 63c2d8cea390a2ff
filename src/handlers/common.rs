// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared body of every command helper: build the session, run the CDB once,
//! classify, refine, release.

use tracing::{debug, trace, warn};

use crate::{
    cfg::context::process_context,
    models::{
        error::{ErrorKind, PtError, refine},
        sense_data::{SENSE_MAX_LEN, SenseData, normalize},
    },
    pt::session::{DataDir, PtCommand, PtTarget},
    utils::hex_spaced,
};

/// Per-call knobs of a helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperOpts {
    pub timeout_secs: u32,
    pub verbose: i32,
    /// Keep NO SENSE / RECOVERED ERROR as errors.
    pub strict: bool,
}

impl Default for HelperOpts {
    fn default() -> Self {
        let ctx = process_context();
        Self {
            timeout_secs: ctx.timeout_secs,
            verbose: ctx.verbosity,
            strict: ctx.strict_sense,
        }
    }
}

impl HelperOpts {
    pub fn with_timeout(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// What one helper execution produced. The session is already gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdReply {
    pub kind: ErrorKind,
    pub status: u8,
    pub resid: usize,
    /// Data-in bytes actually transferred.
    pub actual_in: usize,
    pub sense: Vec<u8>,
    pub transport: Option<String>,
    pub os_err: i32,
}

impl CmdReply {
    pub fn sense_data(&self) -> Option<SenseData> {
        normalize(&self.sense)
    }

    fn detail(&self) -> String {
        if let Some(sd) = self.sense_data() {
            return sd.describe();
        }
        if let Some(t) = &self.transport {
            return t.clone();
        }
        if self.os_err != 0 {
            return std::io::Error::from_raw_os_error(self.os_err).to_string();
        }
        String::new()
    }

    /// `Ok(self)` for [`ErrorKind::Ok`], otherwise the kind with a readable
    /// detail (sense description, transport message or errno text).
    pub fn into_result(self) -> Result<CmdReply, PtError> {
        if self.kind.is_ok() {
            Ok(self)
        } else {
            Err(PtError::new(self.kind, self.detail()))
        }
    }
}

/// Run `cdb` once against `target`.
pub fn exec_cdb<T: PtTarget + ?Sized>(
    target: &T,
    cdb: &[u8],
    data: DataDir<'_>,
    opts: &HelperOpts,
) -> CmdReply {
    let mut sense = [0u8; SENSE_MAX_LEN];
    let (_, session) = PtCommand::new(cdb)
        .data(data)
        .sense(&mut sense)
        .timeout(opts.timeout_secs)
        .verbose(opts.verbose)
        .run(target);

    let kind = refine(session.classify(opts.strict), session.sense_buf());
    let reply = CmdReply {
        kind,
        status: session.status_response(),
        resid: session.resid(),
        actual_in: session.actual_lengths().0,
        sense: session.sense_buf().to_vec(),
        transport: session.transport_err_str().map(str::to_string),
        os_err: session.os_err(),
    };
    drop(session);

    if opts.verbose > 1 {
        debug!(
            opcode = cdb.first().copied().unwrap_or(0),
            "{:?}: status=0x{:02x} resid={}",
            reply.kind,
            reply.status,
            reply.resid
        );
    }
    if opts.verbose > 2 && !reply.sense.is_empty() {
        trace!("sense: [{}]", hex_spaced(&reply.sense));
    }
    if !reply.kind.is_ok() && opts.verbose > 0 {
        warn!("cdb [{}]: {}", hex_spaced(cdb), reply.detail());
    }
    reply
}

/// Data-in command: allocate `alloc` bytes, run, keep what arrived.
pub fn exec_in<T: PtTarget + ?Sized>(
    target: &T,
    cdb: &[u8],
    alloc: usize,
    opts: &HelperOpts,
) -> Result<Vec<u8>, PtError> {
    let mut buf = vec![0u8; alloc];
    let reply = exec_cdb(target, cdb, DataDir::In(&mut buf), opts).into_result()?;
    buf.truncate(reply.actual_in);
    if opts.verbose > 2 {
        trace!("data-in: [{}]", hex_spaced(&buf));
    }
    Ok(buf)
}

/// Non-data or data-out command whose only output is its outcome.
pub fn exec_out<T: PtTarget + ?Sized>(
    target: &T,
    cdb: &[u8],
    data: Option<&[u8]>,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    let dir = match data {
        Some(d) if !d.is_empty() => DataDir::Out(d),
        _ => DataDir::None,
    };
    exec_cdb(target, cdb, dir, opts).into_result().map(|_| ())
}

/// Response parse failure becomes [`ErrorKind::Malformed`].
pub fn malformed<T>(r: anyhow::Result<T>) -> Result<T, PtError> {
    r.map_err(|e| PtError::malformed(format!("{e:#}")))
}
