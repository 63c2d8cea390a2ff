// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tracing::debug;

use crate::pt::{
    backend::PtBackend,
    device::DeviceHandle,
    session::{ExecStatus, PtIo, PtResult},
};

/// Backend for hosts without a pass-through interface. Every command
/// "succeeds" with GOOD status and moves no data.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyBackend;

impl PtBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "dummy"
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
        verbose: i32,
    ) -> ExecStatus {
        if verbose > 1 {
            debug!("dummy: dropping {} byte cdb", io.cdb.len());
        }
        res.status = 0;
        res.sense_len = 0;
        res.resid = io.din_len() as i64;
        res.dout_resid = io.dout_len() as i64;
        res.derive_category();
        ExecStatus::Submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::status::ResultCategory;

    #[test]
    fn nothing_transferred() {
        let mut din = [0u8; 36];
        let mut io = PtIo {
            cdb: vec![0x12, 0, 0, 0, 36, 0],
            data_in: Some(&mut din),
            ..Default::default()
        };
        let mut res = PtResult::default();
        let st = DummyBackend.submit(&mut io, None, &mut res, 1, 0);
        assert_eq!(st, ExecStatus::Submitted);
        assert_eq!(res.category, ResultCategory::Good);
        assert_eq!(res.resid, 36);
    }
}
