// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, Mutex};

use anyhow::Result;
use scsi_pt_rs::{
    handlers::{common::HelperOpts, inquiry::inquiry_standard},
    pt::{
        backend::Backend,
        device::DeviceHandle,
        nvme::{
            AdminData, CNS_CONTROLLER, ChannelError, NvmeAdminChannel, NvmeBackend,
            NvmeCompletion, NvmePassthruCmd, admin_opcode,
        },
        session::{NvmeMeta, PtTarget},
    },
};
use serial_test::serial;

#[derive(Default)]
struct Log {
    /// (opcode, cdw10) of every admin command.
    cmds: Vec<(u8, u32)>,
}

impl Log {
    fn identify_controller_count(&self) -> usize {
        self.cmds
            .iter()
            .filter(|&&(op, cns)| op == admin_opcode::IDENTIFY && cns == CNS_CONTROLLER)
            .count()
    }
}

struct FakeController(Arc<Mutex<Log>>);

impl NvmeAdminChannel for FakeController {
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
        let mut log = self.0.lock().map_err(|_| ChannelError::Os(libc::EIO))?;
        log.cmds.push((cmd.opcode, cmd.cdw10));
        match (cmd.opcode, data) {
            (admin_opcode::IDENTIFY, AdminData::In(d)) if cmd.cdw10 == CNS_CONTROLLER => {
                d[4..24].copy_from_slice(b"SN0000000000000042  ");
                d[24..64].copy_from_slice(b"Example NVMe SSD Controller 1TB         ");
                d[64..72].copy_from_slice(b"5B2QGXA7");
                d[516..520].copy_from_slice(&1u32.to_le_bytes());
                Ok(NvmeCompletion::default())
            },
            _ => Ok(NvmeCompletion {
                status: 0x0002,
                result: 0,
            }),
        }
    }
}

struct NvmeTarget(Arc<Mutex<Log>>);

impl PtTarget for NvmeTarget {
    fn handle(&self) -> Option<&DeviceHandle> {
        None
    }

    fn construct_backend(&self) -> Backend {
        Backend::Nvme(NvmeBackend::with_channel(
            Box::new(FakeController(self.0.clone())),
            1,
            true,
        ))
    }
}

#[test]
#[serial]
fn inquiry_is_built_from_identify_controller() -> Result<()> {
    let log = Arc::new(Mutex::new(Log::default()));
    let t = NvmeTarget(log.clone());
    let opts = HelperOpts {
        timeout_secs: 5,
        verbose: 0,
        strict: false,
    };

    let inq = inquiry_standard(&t, &opts)?;

    assert_eq!(inq.vendor_id, "NVMe");
    assert_eq!(inq.product_id, "Example NVMe SSD");
    assert_eq!(inq.product_rev, "5B2Q");
    let count = log.lock().map(|l| l.identify_controller_count()).unwrap_or(0);
    assert_eq!(count, 1);
    Ok(())
}
