// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Additional sense code / qualifier descriptions (SPC-6 Annex D subset) and
//! sense key names.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Represents an entry in the ASC/ASCQ table.
pub struct Entry {
    code: u16,
    desc: &'static str,
}

const fn e(asc: u8, ascq: u8, desc: &'static str) -> Entry {
    Entry {
        code: ((asc as u16) << 8) | ascq as u16,
        desc,
    }
}

static ASC_ASCQ: &[Entry] = &[
    e(0x00, 0x00, "No additional sense information"),
    e(0x00, 0x01, "Filemark detected"),
    e(0x00, 0x02, "End-of-partition/medium detected"),
    e(0x00, 0x04, "Beginning-of-partition/medium detected"),
    e(0x00, 0x05, "End-of-data detected"),
    e(0x00, 0x06, "I/O process terminated"),
    e(0x00, 0x16, "Operation in progress"),
    e(0x00, 0x17, "Cleaning requested"),
    e(0x00, 0x1d, "ATA pass through information available"),
    e(0x00, 0x1e, "Conflicting SA creation request"),
    e(0x01, 0x00, "No index/sector signal"),
    e(0x02, 0x00, "No seek complete"),
    e(0x03, 0x00, "Peripheral device write fault"),
    e(0x04, 0x00, "Logical unit not ready, cause not reportable"),
    e(0x04, 0x01, "Logical unit is in process of becoming ready"),
    e(0x04, 0x02, "Logical unit not ready, initializing command required"),
    e(0x04, 0x03, "Logical unit not ready, manual intervention required"),
    e(0x04, 0x04, "Logical unit not ready, format in progress"),
    e(0x04, 0x05, "Logical unit not ready, rebuild in progress"),
    e(0x04, 0x06, "Logical unit not ready, recalculation in progress"),
    e(0x04, 0x07, "Logical unit not ready, operation in progress"),
    e(0x04, 0x08, "Logical unit not ready, long write in progress"),
    e(0x04, 0x09, "Logical unit not ready, self-test in progress"),
    e(0x04, 0x0a, "Logical unit not accessible, asymmetric access state transition"),
    e(0x04, 0x0b, "Logical unit not accessible, target port in standby state"),
    e(0x04, 0x0c, "Logical unit not accessible, target port in unavailable state"),
    e(0x04, 0x11, "Logical unit not ready, notify (enable spinup) required"),
    e(0x04, 0x1a, "Logical unit not ready, start stop unit command in progress"),
    e(0x04, 0x1b, "Logical unit not ready, sanitize in progress"),
    e(0x04, 0x1c, "Logical unit not ready, additional power use not yet granted"),
    e(0x04, 0x22, "Logical unit not ready, power cycle required"),
    e(0x05, 0x00, "Logical unit does not respond to selection"),
    e(0x06, 0x00, "No reference position found"),
    e(0x07, 0x00, "Multiple peripheral devices selected"),
    e(0x08, 0x00, "Logical unit communication failure"),
    e(0x08, 0x01, "Logical unit communication time-out"),
    e(0x08, 0x02, "Logical unit communication parity error"),
    e(0x09, 0x00, "Track following error"),
    e(0x0a, 0x00, "Error log overflow"),
    e(0x0b, 0x00, "Warning"),
    e(0x0b, 0x01, "Warning - specified temperature exceeded"),
    e(0x0b, 0x02, "Warning - enclosure degraded"),
    e(0x0c, 0x00, "Write error"),
    e(0x0c, 0x02, "Write error - auto reallocation failed"),
    e(0x0c, 0x03, "Write error - recommend reassignment"),
    e(0x0c, 0x07, "Write error - recovery needed"),
    e(0x0c, 0x08, "Write error - recovery failed"),
    e(0x10, 0x00, "Id CRC or ECC error"),
    e(0x10, 0x01, "Logical block guard check failed"),
    e(0x10, 0x02, "Logical block application tag check failed"),
    e(0x10, 0x03, "Logical block reference tag check failed"),
    e(0x10, 0x04, "Logical block protection error on recover buffered data"),
    e(0x10, 0x05, "Logical block protection method error"),
    e(0x11, 0x00, "Unrecovered read error"),
    e(0x11, 0x01, "Read retries exhausted"),
    e(0x11, 0x02, "Error too long to correct"),
    e(0x11, 0x04, "Unrecovered read error - auto reallocate failed"),
    e(0x11, 0x0b, "Unrecovered read error - recommend reassignment"),
    e(0x11, 0x0c, "Unrecovered read error - recommend rewrite the data"),
    e(0x12, 0x00, "Address mark not found for id field"),
    e(0x13, 0x00, "Address mark not found for data field"),
    e(0x14, 0x00, "Recorded entity not found"),
    e(0x14, 0x01, "Record not found"),
    e(0x15, 0x00, "Random positioning error"),
    e(0x16, 0x00, "Data synchronization mark error"),
    e(0x17, 0x00, "Recovered data with no error correction applied"),
    e(0x17, 0x01, "Recovered data with retries"),
    e(0x18, 0x00, "Recovered data with error correction applied"),
    e(0x19, 0x00, "Defect list error"),
    e(0x1a, 0x00, "Parameter list length error"),
    e(0x1b, 0x00, "Synchronous data transfer error"),
    e(0x1c, 0x00, "Defect list not found"),
    e(0x1d, 0x00, "Miscompare during verify operation"),
    e(0x1d, 0x01, "Miscompare verify of unmapped LBA"),
    e(0x1e, 0x00, "Recovered id with ECC correction"),
    e(0x20, 0x00, "Invalid command operation code"),
    e(0x20, 0x01, "Access denied - initiator pending-enrolled"),
    e(0x20, 0x02, "Access denied - no access rights"),
    e(0x20, 0x0c, "Illegal command while in write capable state"),
    e(0x21, 0x00, "Logical block address out of range"),
    e(0x21, 0x01, "Invalid element address"),
    e(0x21, 0x04, "Unaligned write command"),
    e(0x21, 0x05, "Write boundary violation"),
    e(0x21, 0x06, "Attempt to read invalid data"),
    e(0x21, 0x07, "Read boundary violation"),
    e(0x22, 0x00, "Illegal function (use 20 00, 24 00, or 26 00)"),
    e(0x24, 0x00, "Invalid field in cdb"),
    e(0x24, 0x01, "CDB decryption error"),
    e(0x24, 0x08, "Invalid xcdb"),
    e(0x25, 0x00, "Logical unit not supported"),
    e(0x26, 0x00, "Invalid field in parameter list"),
    e(0x26, 0x01, "Parameter not supported"),
    e(0x26, 0x02, "Parameter value invalid"),
    e(0x26, 0x03, "Threshold parameters not supported"),
    e(0x26, 0x04, "Invalid release of persistent reservation"),
    e(0x27, 0x00, "Write protected"),
    e(0x27, 0x01, "Hardware write protected"),
    e(0x27, 0x02, "Logical unit software write protected"),
    e(0x27, 0x07, "Space allocation failed write protect"),
    e(0x28, 0x00, "Not ready to ready change, medium may have changed"),
    e(0x28, 0x01, "Import or export element accessed"),
    e(0x29, 0x00, "Power on, reset, or bus device reset occurred"),
    e(0x29, 0x01, "Power on occurred"),
    e(0x29, 0x02, "SCSI bus reset occurred"),
    e(0x29, 0x03, "Bus device reset function occurred"),
    e(0x29, 0x04, "Device internal reset"),
    e(0x29, 0x05, "Transceiver mode changed to single-ended"),
    e(0x29, 0x06, "Transceiver mode changed to lvd"),
    e(0x29, 0x07, "I_T nexus loss occurred"),
    e(0x2a, 0x00, "Parameters changed"),
    e(0x2a, 0x01, "Mode parameters changed"),
    e(0x2a, 0x02, "Log parameters changed"),
    e(0x2a, 0x03, "Reservations preempted"),
    e(0x2a, 0x04, "Reservations released"),
    e(0x2a, 0x05, "Registrations preempted"),
    e(0x2a, 0x06, "Asymmetric access state changed"),
    e(0x2a, 0x09, "Capacity data has changed"),
    e(0x2a, 0x10, "Timestamp changed"),
    e(0x2b, 0x00, "Copy cannot execute since host cannot disconnect"),
    e(0x2c, 0x00, "Command sequence error"),
    e(0x2c, 0x07, "Previous busy status"),
    e(0x2c, 0x08, "Previous task set full status"),
    e(0x2c, 0x09, "Previous reservation conflict status"),
    e(0x2f, 0x00, "Commands cleared by another initiator"),
    e(0x2f, 0x01, "Commands cleared by power loss notification"),
    e(0x30, 0x00, "Incompatible medium installed"),
    e(0x30, 0x02, "Cannot read medium - incompatible format"),
    e(0x31, 0x00, "Medium format corrupted"),
    e(0x31, 0x01, "Format command failed"),
    e(0x31, 0x03, "Sanitize command failed"),
    e(0x32, 0x00, "No defect spare location available"),
    e(0x35, 0x00, "Enclosure services failure"),
    e(0x37, 0x00, "Rounded parameter"),
    e(0x38, 0x07, "Thin provisioning soft threshold reached"),
    e(0x39, 0x00, "Saving parameters not supported"),
    e(0x3a, 0x00, "Medium not present"),
    e(0x3a, 0x01, "Medium not present - tray closed"),
    e(0x3a, 0x02, "Medium not present - tray open"),
    e(0x3d, 0x00, "Invalid bits in identify message"),
    e(0x3e, 0x00, "Logical unit has not self-configured yet"),
    e(0x3e, 0x01, "Logical unit failure"),
    e(0x3e, 0x02, "Timeout on logical unit"),
    e(0x3e, 0x03, "Logical unit failed self-test"),
    e(0x3f, 0x00, "Target operating conditions have changed"),
    e(0x3f, 0x01, "Microcode has been changed"),
    e(0x3f, 0x02, "Changed operating definition"),
    e(0x3f, 0x03, "Inquiry data has changed"),
    e(0x3f, 0x0e, "Reported luns data has changed"),
    e(0x40, 0x00, "Ram failure"),
    e(0x41, 0x00, "Data path failure"),
    e(0x42, 0x00, "Power-on or self-test failure"),
    e(0x43, 0x00, "Message error"),
    e(0x44, 0x00, "Internal target failure"),
    e(0x45, 0x00, "Select or reselect failure"),
    e(0x46, 0x00, "Unsuccessful soft reset"),
    e(0x47, 0x00, "SCSI parity error"),
    e(0x47, 0x01, "Data phase CRC error detected"),
    e(0x48, 0x00, "Initiator detected error message received"),
    e(0x49, 0x00, "Invalid message error"),
    e(0x4a, 0x00, "Command phase error"),
    e(0x4b, 0x00, "Data phase error"),
    e(0x4b, 0x04, "Nak received"),
    e(0x4c, 0x00, "Logical unit failed self-configuration"),
    e(0x4e, 0x00, "Overlapped commands attempted"),
    e(0x51, 0x00, "Erase failure"),
    e(0x53, 0x00, "Media load or eject failed"),
    e(0x53, 0x02, "Medium removal prevented"),
    e(0x55, 0x00, "System resource failure"),
    e(0x55, 0x03, "Insufficient resources"),
    e(0x57, 0x00, "Unable to recover table-of-contents"),
    e(0x5b, 0x00, "Log exception"),
    e(0x5b, 0x01, "Threshold condition met"),
    e(0x5c, 0x00, "RPL status change"),
    e(0x5d, 0x00, "Failure prediction threshold exceeded"),
    e(0x5d, 0x10, "Hardware impending failure general hard drive failure"),
    e(0x5d, 0xff, "Failure prediction threshold exceeded (false)"),
    e(0x5e, 0x00, "Low power condition on"),
    e(0x5e, 0x01, "Idle condition activated by timer"),
    e(0x5e, 0x02, "Standby condition activated by timer"),
    e(0x5e, 0x03, "Idle condition activated by command"),
    e(0x5e, 0x04, "Standby condition activated by command"),
    e(0x5e, 0x41, "Power state change to active"),
    e(0x5e, 0x42, "Power state change to idle"),
    e(0x5e, 0x43, "Power state change to standby"),
    e(0x63, 0x00, "End of user area encountered on this track"),
    e(0x64, 0x00, "Illegal mode for this track"),
    e(0x65, 0x00, "Voltage fault"),
    e(0x67, 0x0a, "Set target port groups command failed"),
    e(0x74, 0x00, "Security error"),
    e(0x74, 0x08, "Digital signature validation failure"),
    e(0x74, 0x71, "Logical unit access not authorized"),
];

static ASC_ASCQ_MAP: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    let mut m: HashMap<u16, &'static str> = HashMap::with_capacity(ASC_ASCQ.len());
    for e in ASC_ASCQ {
        m.entry(e.code).or_insert(e.desc);
    }
    m
});

impl Entry {
    /// Looks up the description for a given ASC/ASCQ code.
    #[inline]
    pub fn lookup(asc: u8, ascq: u8) -> Option<&'static str> {
        let k = ((asc as u16) << 8) | (ascq as u16);
        ASC_ASCQ_MAP.get(&k).copied()
    }
}

/// Human-readable ASC/ASCQ, falling back to the numeric ranges SPC reserves
/// when the pair is not tabulated.
pub fn asc_ascq_to_str(asc: u8, ascq: u8) -> String {
    if let Some(s) = Entry::lookup(asc, ascq) {
        return s.to_string();
    }
    match (asc, ascq) {
        (0x40, q) if q != 0 => format!("Diagnostic failure on component 0x{q:02x}"),
        (a, _) if a >= 0x80 => format!("Vendor specific ASC 0x{a:02x}, ASCQ 0x{ascq:02x}"),
        (a, q) if q >= 0x80 => {
            format!("ASC 0x{a:02x} with vendor specific ASCQ 0x{q:02x}")
        },
        (a, q) => format!("Unknown ASC 0x{a:02x}, ASCQ 0x{q:02x}"),
    }
}

const SENSE_KEY_NAMES: [&str; 16] = [
    "No Sense",
    "Recovered Error",
    "Not Ready",
    "Medium Error",
    "Hardware Error",
    "Illegal Request",
    "Unit Attention",
    "Data Protect",
    "Blank Check",
    "Vendor Specific",
    "Copy Aborted",
    "Aborted Command",
    "Reserved",
    "Volume Overflow",
    "Miscompare",
    "Completed",
];

pub fn sense_key_to_str(key: u8) -> &'static str {
    SENSE_KEY_NAMES[(key & 0x0f) as usize]
}
