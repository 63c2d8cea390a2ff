// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Sense data decoder for both fixed (0x70/0x71) and descriptor (0x72/0x73)
//! formats (SPC-4 § 4.5).
//!
//! Every accessor takes the sense bytes actually returned by the device; a
//! truncated buffer yields "not present" for the missing fields instead of an
//! error.

use std::fmt;

use crate::{
    models::asc_ascq::{asc_ascq_to_str, sense_key_to_str},
    utils::{get_unaligned_be16, get_unaligned_be32, get_unaligned_be64},
};

/// Smallest sense buffer a caller may lend to a session.
pub const SENSE_MIN_LEN: usize = 8;
/// Fixed format sense-data with all standard fields present.
pub const FIXED_FULL_LEN: usize = 18;
/// Largest sense buffer SPC allows (additional length is one byte).
pub const SENSE_MAX_LEN: usize = 252;

pub mod sense_key {
    pub const NO_SENSE: u8 = 0x0;
    pub const RECOVERED_ERROR: u8 = 0x1;
    pub const NOT_READY: u8 = 0x2;
    pub const MEDIUM_ERROR: u8 = 0x3;
    pub const HARDWARE_ERROR: u8 = 0x4;
    pub const ILLEGAL_REQUEST: u8 = 0x5;
    pub const UNIT_ATTENTION: u8 = 0x6;
    pub const DATA_PROTECT: u8 = 0x7;
    pub const BLANK_CHECK: u8 = 0x8;
    pub const VENDOR_SPECIFIC: u8 = 0x9;
    pub const COPY_ABORTED: u8 = 0xa;
    pub const ABORTED_COMMAND: u8 = 0xb;
    pub const VOLUME_OVERFLOW: u8 = 0xd;
    pub const MISCOMPARE: u8 = 0xe;
    pub const COMPLETED: u8 = 0xf;
}

/// Descriptor types found in descriptor-format sense.
pub mod descriptor_type {
    pub const INFORMATION: u8 = 0x00;
    pub const COMMAND_SPECIFIC: u8 = 0x01;
    pub const SENSE_KEY_SPECIFIC: u8 = 0x02;
    pub const FRU: u8 = 0x03;
    pub const STREAM_COMMANDS: u8 = 0x04;
    pub const BLOCK_COMMANDS: u8 = 0x05;
    pub const ATA_STATUS_RETURN: u8 = 0x09;
    pub const PROGRESS_INDICATION: u8 = 0x0a;
}

/// Additional sense codes the library reacts to.
pub mod asc {
    pub const NO_ADDITIONAL: u8 = 0x00;
    pub const LUN_NOT_READY: u8 = 0x04;
    pub const PROTECTION_INFO: u8 = 0x10;
    pub const INVALID_OPCODE: u8 = 0x20;
    pub const LBA_OUT_OF_RANGE: u8 = 0x21;
    pub const INVALID_FIELD_IN_CDB: u8 = 0x24;
    pub const LUN_NOT_SUPPORTED: u8 = 0x25;
    pub const INVALID_FIELD_IN_PARAM_LIST: u8 = 0x26;
    pub const MEDIUM_NOT_PRESENT: u8 = 0x3a;
    pub const LOW_POWER_CONDITION_ON: u8 = 0x5e;
}

/// Sense layout selected by the response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseFormat {
    Fixed,
    Descriptor,
}

/// Condensed classification of a sense buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseCategory {
    NoSense,
    Recovered,
    NotReady,
    MediumHard,
    Hardware,
    IllegalReq,
    UnitAttention,
    DataProtect,
    AbortedCommand,
    Miscompare,
    CopyAborted,
    /// Only reached from a RESERVATION CONFLICT status, never from sense bytes.
    ResConflict,
    Protection,
    /// Sense present but unclassified (unknown response code, vendor key...).
    Sense,
}

/// One raw descriptor of descriptor-format sense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseDescriptor {
    pub desc_type: u8,
    /// Bytes following the two header bytes.
    pub body: Vec<u8>,
}

/// Decoded sense-key-specific field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseKeySpecific {
    /// ILLEGAL REQUEST: offending byte (and optionally bit) in CDB or
    /// parameter list.
    FieldPointer {
        in_cdb: bool,
        bit: Option<u8>,
        field: u16,
    },
    /// RECOVERED / MEDIUM / HARDWARE ERROR.
    ActualRetryCount(u16),
    /// NOT READY / NO SENSE, numerator over 65 536.
    Progress(u16),
    /// COPY ABORTED.
    SegmentPointer {
        segment_descriptor: bool,
        bit: Option<u8>,
        field: u16,
    },
    /// UNIT ATTENTION.
    UnitAttentionOverflow(bool),
    Raw([u8; 3]),
}

/// ATA register image returned by SAT in descriptor type 0x09.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtaStatusReturn {
    pub extend: bool,
    pub error: u8,
    pub count: u16,
    pub lba: u64,
    pub device: u8,
    pub status: u8,
}

/// Parsed view over a sense buffer.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct SenseData {
    /// Low 7 bits of byte 0.
    pub response_code: u8,
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
    pub filemark: bool,
    pub eom: bool,
    pub ili: bool,
    /// INFORMATION field plus its VALID bit.
    pub information: Option<(bool, u64)>,
    pub cmd_specific: Option<u64>,
    pub fru: Option<u8>,
    /// Sense-key-specific bytes, only when SKSV is set.
    pub sks: Option<[u8; 3]>,
    /// Descriptor format only.
    pub descriptors: Vec<SenseDescriptor>,
}

/// Format implied by byte 0, `None` for an unrecognized response code.
pub fn sense_format(buf: &[u8]) -> Option<SenseFormat> {
    let rc = *buf.first()? & 0x7f;
    match rc {
        0x70 | 0x71 => Some(SenseFormat::Fixed),
        0x72 | 0x73 => Some(SenseFormat::Descriptor),
        _ => None,
    }
}

/// End of the meaningful region: byte 7 declares the additional length.
fn declared_end(buf: &[u8]) -> usize {
    match buf.get(7) {
        Some(&add) => (8 + add as usize).min(buf.len()),
        None => buf.len(),
    }
}

/// Iterate over the descriptors of a descriptor-format buffer, stopping at
/// the first one whose length would overrun the buffer.
fn descriptors(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    let end = if sense_format(buf) == Some(SenseFormat::Descriptor) {
        declared_end(buf)
    } else {
        0
    };
    let mut off = 8usize;
    std::iter::from_fn(move || {
        if off + 2 > end {
            return None;
        }
        let len = 2 + buf[off + 1] as usize;
        if off + len > end {
            return None;
        }
        let d = &buf[off..off + len];
        off += len;
        Some(d)
    })
}

/// Parse a sense buffer. Succeeds when at least one byte is present and the
/// response code is one of 0x70..=0x73.
pub fn normalize(buf: &[u8]) -> Option<SenseData> {
    let format = sense_format(buf)?;
    let mut sd = SenseData {
        response_code: buf[0] & 0x7f,
        ..Default::default()
    };
    match format {
        SenseFormat::Fixed => {
            if let Some(&b2) = buf.get(2) {
                sd.filemark = b2 & 0x80 != 0;
                sd.eom = b2 & 0x40 != 0;
                sd.ili = b2 & 0x20 != 0;
                sd.sense_key = b2 & 0x0f;
            }
            let end = declared_end(buf).max(buf.len().min(FIXED_FULL_LEN));
            if end >= 7 {
                sd.information =
                    Some((buf[0] & 0x80 != 0, get_unaligned_be32(&buf[3..]) as u64));
            }
            if end >= 12 {
                sd.cmd_specific = Some(get_unaligned_be32(&buf[8..]) as u64);
            }
            if end >= 14 {
                sd.asc = buf[12];
                sd.ascq = buf[13];
            }
            if end >= 15 {
                sd.fru = Some(buf[14]);
            }
            if end >= 18 && buf[15] & 0x80 != 0 {
                sd.sks = Some([buf[15], buf[16], buf[17]]);
            }
        },
        SenseFormat::Descriptor => {
            if buf.len() > 1 {
                sd.sense_key = buf[1] & 0x0f;
            }
            if buf.len() > 2 {
                sd.asc = buf[2];
            }
            if buf.len() > 3 {
                sd.ascq = buf[3];
            }
            for d in descriptors(buf) {
                let body = &d[2..];
                match d[0] {
                    descriptor_type::INFORMATION if body.len() >= 10 => {
                        sd.information =
                            Some((body[0] & 0x80 != 0, get_unaligned_be64(&body[2..])));
                    },
                    descriptor_type::COMMAND_SPECIFIC if body.len() >= 10 => {
                        sd.cmd_specific = Some(get_unaligned_be64(&body[2..]));
                    },
                    descriptor_type::SENSE_KEY_SPECIFIC
                        if body.len() >= 5 && body[2] & 0x80 != 0 =>
                    {
                        sd.sks = Some([body[2], body[3], body[4]]);
                    },
                    descriptor_type::FRU if body.len() >= 2 => sd.fru = Some(body[1]),
                    descriptor_type::STREAM_COMMANDS if body.len() >= 2 => {
                        sd.filemark = body[1] & 0x80 != 0;
                        sd.eom = body[1] & 0x40 != 0;
                        sd.ili = body[1] & 0x20 != 0;
                    },
                    descriptor_type::BLOCK_COMMANDS if body.len() >= 2 => {
                        sd.ili = body[1] & 0x20 != 0;
                    },
                    _ => {},
                }
                sd.descriptors.push(SenseDescriptor {
                    desc_type: d[0],
                    body: body.to_vec(),
                });
            }
        },
    }
    Some(sd)
}

/// First descriptor of `desc_type` (header included) in descriptor-format
/// sense.
pub fn descriptor_find(buf: &[u8], desc_type: u8) -> Option<&[u8]> {
    descriptors(buf).find(|d| d[0] == desc_type)
}

/// INFORMATION field: 4 bytes at offset 3 for fixed format, the 8-byte field
/// of descriptor 0x00 for descriptor format. Returns `(valid, value)`.
pub fn info_field(buf: &[u8]) -> (bool, u64) {
    match sense_format(buf) {
        Some(SenseFormat::Fixed) if buf.len() >= 7 => {
            (buf[0] & 0x80 != 0, get_unaligned_be32(&buf[3..]) as u64)
        },
        Some(SenseFormat::Descriptor) => {
            match descriptor_find(buf, descriptor_type::INFORMATION) {
                Some(d) if d.len() >= 12 => {
                    (d[2] & 0x80 != 0, get_unaligned_be64(&d[4..]))
                },
                _ => (false, 0),
            }
        },
        _ => (false, 0),
    }
}

/// Progress indication, numerator over 65 536.
///
/// Read from the sense-key-specific bytes when SKSV is set and the sense key
/// is NOT READY or NO SENSE, or from a progress indication descriptor (0x0a)
/// in descriptor format.
pub fn progress_field(buf: &[u8]) -> Option<u16> {
    match sense_format(buf)? {
        SenseFormat::Fixed => {
            if buf.len() < FIXED_FULL_LEN {
                return None;
            }
            let sk = buf[2] & 0x0f;
            let progress_key =
                sk == sense_key::NOT_READY || sk == sense_key::NO_SENSE;
            (progress_key && buf[15] & 0x80 != 0).then(|| get_unaligned_be16(&buf[16..]))
        },
        SenseFormat::Descriptor => {
            let sk = buf.get(1)? & 0x0f;
            if sk == sense_key::NOT_READY || sk == sense_key::NO_SENSE {
                let sks = descriptor_find(buf, descriptor_type::SENSE_KEY_SPECIFIC)
                    .filter(|d| d.len() >= 7 && d[4] & 0x80 != 0);
                if let Some(d) = sks {
                    return Some(get_unaligned_be16(&d[5..]));
                }
            }
            match descriptor_find(buf, descriptor_type::PROGRESS_INDICATION) {
                Some(d) if d.len() >= 8 => Some(get_unaligned_be16(&d[6..])),
                _ => None,
            }
        },
    }
}

/// Condense a sense buffer into a category.
pub fn category(buf: &[u8]) -> SenseCategory {
    let Some(sd) = normalize(buf) else {
        return SenseCategory::Sense;
    };
    sd.category()
}

/// Build a minimal sense buffer for a synthesized CHECK CONDITION.
///
/// Returns the buffer and the number of meaningful bytes: 18 for fixed
/// format, 8 for descriptor format.
pub fn build_sense(desc: bool, key: u8, asc: u8, ascq: u8) -> ([u8; FIXED_FULL_LEN], usize) {
    let mut b = [0u8; FIXED_FULL_LEN];
    if desc {
        b[0] = 0x72;
        b[1] = key & 0x0f;
        b[2] = asc;
        b[3] = ascq;
        (b, 8)
    } else {
        b[0] = 0x70;
        b[2] = key & 0x0f;
        b[7] = 10;
        b[12] = asc;
        b[13] = ascq;
        (b, FIXED_FULL_LEN)
    }
}

impl SenseData {
    pub fn format(&self) -> SenseFormat {
        if self.response_code >= 0x72 {
            SenseFormat::Descriptor
        } else {
            SenseFormat::Fixed
        }
    }

    /// Deferred error (0x71 / 0x73) rather than current error.
    pub fn is_deferred(&self) -> bool {
        self.response_code & 0x01 != 0
    }

    pub fn category(&self) -> SenseCategory {
        use sense_key::*;
        match self.sense_key {
            NO_SENSE => SenseCategory::NoSense,
            RECOVERED_ERROR => SenseCategory::Recovered,
            NOT_READY => SenseCategory::NotReady,
            MEDIUM_ERROR | BLANK_CHECK => SenseCategory::MediumHard,
            HARDWARE_ERROR => SenseCategory::Hardware,
            ILLEGAL_REQUEST => SenseCategory::IllegalReq,
            UNIT_ATTENTION => SenseCategory::UnitAttention,
            DATA_PROTECT => SenseCategory::DataProtect,
            COPY_ABORTED => SenseCategory::CopyAborted,
            ABORTED_COMMAND if self.asc == asc::PROTECTION_INFO => {
                SenseCategory::Protection
            },
            ABORTED_COMMAND => SenseCategory::AbortedCommand,
            MISCOMPARE => SenseCategory::Miscompare,
            _ => SenseCategory::Sense,
        }
    }

    /// Progress indication carried by the sense-key-specific bytes or a
    /// progress descriptor.
    pub fn progress(&self) -> Option<u16> {
        if let Some(SenseKeySpecific::Progress(p)) = self.sense_key_specific() {
            return Some(p);
        }
        self.descriptors
            .iter()
            .find(|d| d.desc_type == descriptor_type::PROGRESS_INDICATION)
            .filter(|d| d.body.len() >= 6)
            .map(|d| get_unaligned_be16(&d.body[4..]))
    }

    /// Interpret the sense-key-specific bytes according to the sense key.
    pub fn sense_key_specific(&self) -> Option<SenseKeySpecific> {
        let sks = self.sks?;
        let field = get_unaligned_be16(&sks[1..]);
        let bit = (sks[0] & 0x08 != 0).then_some(sks[0] & 0x07);
        Some(match self.sense_key {
            sense_key::ILLEGAL_REQUEST => SenseKeySpecific::FieldPointer {
                in_cdb: sks[0] & 0x40 != 0,
                bit,
                field,
            },
            sense_key::RECOVERED_ERROR
            | sense_key::MEDIUM_ERROR
            | sense_key::HARDWARE_ERROR => SenseKeySpecific::ActualRetryCount(field),
            sense_key::NOT_READY | sense_key::NO_SENSE => SenseKeySpecific::Progress(field),
            sense_key::COPY_ABORTED => SenseKeySpecific::SegmentPointer {
                segment_descriptor: sks[0] & 0x20 != 0,
                bit,
                field,
            },
            sense_key::UNIT_ATTENTION => {
                SenseKeySpecific::UnitAttentionOverflow(sks[0] & 0x01 != 0)
            },
            _ => SenseKeySpecific::Raw(sks),
        })
    }

    /// ATA register image from descriptor 0x09 (ATA PASS-THROUGH with
    /// CK_COND set).
    pub fn ata_status_return(&self) -> Option<AtaStatusReturn> {
        let d = self
            .descriptors
            .iter()
            .find(|d| d.desc_type == descriptor_type::ATA_STATUS_RETURN)?;
        let b = &d.body;
        if b.len() < 12 {
            return None;
        }
        let extend = b[0] & 0x01 != 0;
        let (count, lba) = if extend {
            (
                u16::from_be_bytes([b[2], b[3]]),
                u64::from_be_bytes([0, 0, b[8], b[6], b[4], b[9], b[7], b[5]]),
            )
        } else {
            (b[3] as u16, u64::from_be_bytes([0, 0, 0, 0, 0, b[9], b[7], b[5]]))
        };
        Some(AtaStatusReturn {
            extend,
            error: b[1],
            count,
            lba,
            device: b[10],
            status: b[11],
        })
    }

    /// Re-serialize the decoded fields in the original format.
    pub fn pack(&self) -> Vec<u8> {
        match self.format() {
            SenseFormat::Fixed => {
                let mut b = vec![0u8; FIXED_FULL_LEN];
                b[0] = self.response_code & 0x7f;
                let mut b2 = self.sense_key & 0x0f;
                if self.filemark {
                    b2 |= 0x80;
                }
                if self.eom {
                    b2 |= 0x40;
                }
                if self.ili {
                    b2 |= 0x20;
                }
                b[2] = b2;
                if let Some((valid, info)) = self.information {
                    if valid {
                        b[0] |= 0x80;
                    }
                    b[3..7].copy_from_slice(&(info as u32).to_be_bytes());
                }
                b[7] = (FIXED_FULL_LEN - 8) as u8;
                if let Some(csi) = self.cmd_specific {
                    b[8..12].copy_from_slice(&(csi as u32).to_be_bytes());
                }
                b[12] = self.asc;
                b[13] = self.ascq;
                b[14] = self.fru.unwrap_or(0);
                if let Some(sks) = self.sks {
                    b[15..18].copy_from_slice(&sks);
                }
                b
            },
            SenseFormat::Descriptor => {
                let mut b = vec![0u8; 8];
                b[0] = self.response_code & 0x7f;
                b[1] = self.sense_key & 0x0f;
                b[2] = self.asc;
                b[3] = self.ascq;
                for d in &self.descriptors {
                    b.push(d.desc_type);
                    b.push(d.body.len() as u8);
                    b.extend_from_slice(&d.body);
                }
                b[7] = (b.len() - 8).min(u8::MAX as usize) as u8;
                b
            },
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{}{}: {} (asc=0x{:02x}, ascq=0x{:02x})",
            if self.is_deferred() { "Deferred " } else { "" },
            sense_key_to_str(self.sense_key),
            asc_ascq_to_str(self.asc, self.ascq),
            self.asc,
            self.ascq
        )
    }
}

impl fmt::Debug for SenseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenseData")
            .field(
                "response_code",
                &format_args!("{:#04x}", self.response_code),
            )
            .field("sense_key", &format_args!("{:#x}", self.sense_key))
            .field("asc", &format_args!("{:#04x}", self.asc))
            .field("ascq", &format_args!("{:#04x}", self.ascq))
            .field("filemark", &self.filemark)
            .field("eom", &self.eom)
            .field("ili", &self.ili)
            .field("information", &self.information)
            .field("cmd_specific", &self.cmd_specific)
            .field("fru", &self.fru)
            .field("sks", &self.sense_key_specific())
            .field("descriptors", &self.descriptors.len())
            .field("description", &asc_ascq_to_str(self.asc, self.ascq))
            .finish()
    }
}

impl fmt::Display for SenseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
