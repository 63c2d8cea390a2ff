// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! ATA commands tunnelled through SAT ATA PASS-THROUGH.

use crate::{
    control_block::ata_pt::{AtaCommand, ata_cmd, ata_string, build_ata_pt12, build_ata_pt16},
    handlers::common::{HelperOpts, exec_cdb},
    models::{error::PtError, sense_data::AtaStatusReturn},
    pt::session::{DataDir, PtTarget},
};

pub const IDENTIFY_LEN: usize = 512;

/// Run `cmd` with ATA PASS-THROUGH(16), or (12) when `short_cdb` is set.
///
/// Returns the ATA status return descriptor when the device supplied one
/// (normally only with CK_COND set).
pub fn ata_pass_through<T: PtTarget + ?Sized>(
    target: &T,
    cmd: &AtaCommand,
    data: DataDir<'_>,
    short_cdb: bool,
    opts: &HelperOpts,
) -> Result<Option<AtaStatusReturn>, PtError> {
    if short_cdb && cmd.extend {
        return Err(PtError::syntax("48-bit ATA command needs the 16-byte CDB"));
    }
    let reply = if short_cdb {
        exec_cdb(target, &build_ata_pt12(cmd), data, opts)
    } else {
        exec_cdb(target, &build_ata_pt16(cmd), data, opts)
    };
    let ret = reply.sense_data().and_then(|sd| sd.ata_status_return());
    reply.into_result()?;
    Ok(ret)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtaIdentity {
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub raw: Vec<u8>,
}

pub fn identify_device<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<AtaIdentity, PtError> {
    let mut raw = vec![0u8; IDENTIFY_LEN];
    ata_pass_through(
        target,
        &AtaCommand::identify_device(),
        DataDir::In(&mut raw),
        false,
        opts,
    )?;
    Ok(AtaIdentity {
        model: ata_string(&raw, 27..47),
        serial: ata_string(&raw, 10..20),
        firmware: ata_string(&raw, 23..27),
        raw,
    })
}

/// CHECK POWER MODE; the power state comes back in the COUNT register.
pub fn check_power_mode<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<Option<u8>, PtError> {
    let cmd = AtaCommand {
        ck_cond: true,
        ..AtaCommand::non_data(ata_cmd::CHECK_POWER_MODE)
    };
    let ret = ata_pass_through(target, &cmd, DataDir::None, false, opts)?;
    Ok(ret.map(|r| r.count as u8))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::handlers::common::mock::*;

    fn opts() -> HelperOpts {
        HelperOpts {
            timeout_secs: 5,
            verbose: 0,
            strict: false,
        }
    }

    #[test]
    fn identify_strings() {
        let mut id = vec![0u8; IDENTIFY_LEN];
        id[54..62].copy_from_slice(b"ASSMNU G");
        let t = MockTarget::with(vec![good(&id)]);
        let ident = identify_device(&t, &opts()).expect("identify");
        assert!(ident.model.starts_with("SAMSUNG"));
        assert_eq!(t.cdbs()[0][0], 0x85);
        assert_eq!(t.cdbs()[0][14], 0xec);
    }

    #[test]
    fn short_cdb_rejects_48_bit() {
        let t = MockTarget::with(vec![]);
        let cmd = AtaCommand {
            extend: true,
            ..AtaCommand::non_data(ata_cmd::SMART)
        };
        assert!(ata_pass_through(&t, &cmd, DataDir::None, true, &opts()).is_err());
    }

    #[test]
    fn power_mode_from_status_return() {
        // RECOVERED ERROR, ATA PASS THROUGH INFORMATION AVAILABLE, count 0xff
        let sense = hex!("72 01 00 1d 00 00 00 0e 09 0c 00 00 00 ff 00 00 00 00 00 00 40 50");
        let t = MockTarget::with(vec![check(&sense)]);
        assert_eq!(check_power_mode(&t, &opts()).expect("power"), Some(0xff));
    }
}
