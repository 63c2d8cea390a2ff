// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use hex::FromHex;
use scsi_pt_rs::pt::{
    backend::{Backend, PtBackend},
    device::DeviceHandle,
    linux_sg::{SgCompletion, driver, translate_completion},
    session::{ExecStatus, PtIo, PtResult, PtTarget},
};

// Helper to load a hex fixture and decode it to a byte vector.
pub fn load_fixture(path: &str) -> Result<Vec<u8>> {
    let s = fs::read_to_string(path)?;
    let cleaned = s.trim().replace(|c: char| c.is_whitespace(), "");
    Ok(Vec::from_hex(&cleaned)?)
}

/// What the scripted device answers to one CDB.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub status: u8,
    pub sense: Vec<u8>,
    pub data: Vec<u8>,
    pub resid: Option<i32>,
    pub host_status: u16,
}

impl Reply {
    pub fn good(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            ..Default::default()
        }
    }

    pub fn check(sense: &[u8]) -> Self {
        Self {
            status: 0x02,
            sense: sense.to_vec(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: Vec<Reply>,
    cdbs: Vec<Vec<u8>>,
}

/// Target whose sessions talk to a scripted device instead of the OS.
#[derive(Clone, Default)]
pub struct ScriptedTarget(Arc<Mutex<Script>>);

impl ScriptedTarget {
    pub fn new(mut replies: Vec<Reply>) -> Self {
        replies.reverse();
        Self(Arc::new(Mutex::new(Script {
            replies,
            cdbs: Vec::new(),
        })))
    }

    pub fn cdbs(&self) -> Vec<Vec<u8>> {
        self.0.lock().map(|s| s.cdbs.clone()).unwrap_or_default()
    }
}

pub struct ScriptedBackend(Arc<Mutex<Script>>);

impl PtBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn needs_device(&self) -> bool {
        false
    }

    fn submit(
        &mut self,
        io: &mut PtIo<'_>,
        _dev: Option<&DeviceHandle>,
        res: &mut PtResult,
        _timeout_secs: u32,
        _verbose: i32,
    ) -> ExecStatus {
        let Ok(mut s) = self.0.lock() else {
            return ExecStatus::OsError(libc::EIO);
        };
        s.cdbs.push(io.cdb.clone());
        let r = s.replies.pop().unwrap_or_default();
        let mut n = 0;
        if let Some(din) = io.data_in.as_deref_mut() {
            n = r.data.len().min(din.len());
            din[..n].copy_from_slice(&r.data[..n]);
        }
        let sense_len = io.write_sense(&r.sense);
        let c = SgCompletion {
            status: r.status,
            sb_len_wr: sense_len as u8,
            host_status: r.host_status,
            driver_status: if sense_len > 0 { driver::DRIVER_SENSE } else { 0 },
            resid: r.resid.unwrap_or((io.din_len() - n) as i32),
            duration_ms: 0,
        };
        translate_completion(&c, res)
    }
}


impl PtTarget for ScriptedTarget {
    fn handle(&self) -> Option<&DeviceHandle> {
        None
    }

    fn construct_backend(&self) -> Backend {
        Backend::custom(ScriptedBackend(self.0.clone()))
    }
}
