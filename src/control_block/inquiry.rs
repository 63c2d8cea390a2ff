// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! INQUIRY (6): CDB builder and parsers for the standard response and the
//! common VPD pages.
//!
//! CDB layout (SPC-4):
//!   [0] = 0x12 (INQUIRY)
//!   [1] = EVPD (bit 0); CMDDT obsolete
//!   [2] = Page Code (only when EVPD=1; else 0)
//!   [3..5] = Allocation Length (big-endian u16)
//!   [5] = Control

use anyhow::{Result, bail};

use crate::{
    control_block::common::opcode,
    utils::{get_unaligned_be16, trim_ascii},
};

/// Length of the mandatory part of a standard INQUIRY response.
pub const STD_INQUIRY_LEN: usize = 36;

/// Common VPD page codes (subset).
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VpdPage {
    SupportedPages = 0x00,
    UnitSerial = 0x80,
    DeviceId = 0x83,
    ExtendedInquiry = 0x86,
    AtaInformation = 0x89,
    BlockLimits = 0xB0,                // SBC
    BlockDeviceCharacteristics = 0xB1, // SBC
    LbProvisioning = 0xB2,             // SBC
    ZonedBlockDeviceCharacteristics = 0xB6, // ZBC
}

impl From<VpdPage> for u8 {
    #[inline]
    fn from(p: VpdPage) -> u8 {
        p as u8
    }
}

impl TryFrom<u8> for VpdPage {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(v: u8) -> Result<Self> {
        use VpdPage::*;
        Ok(match v {
            0x00 => SupportedPages,
            0x80 => UnitSerial,
            0x83 => DeviceId,
            0x86 => ExtendedInquiry,
            0x89 => AtaInformation,
            0xB0 => BlockLimits,
            0xB1 => BlockDeviceCharacteristics,
            0xB2 => LbProvisioning,
            0xB6 => ZonedBlockDeviceCharacteristics,
            _ => bail!("invalid vpd page: {v}"),
        })
    }
}

/// Build an INQUIRY CDB. `page` is ignored (and sent as 0) unless `evpd`.
#[inline]
pub fn build_inquiry(evpd: bool, page: u8, allocation_len: u16, control: u8) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::INQUIRY;
    cdb[1] = evpd as u8;
    cdb[2] = if evpd { page } else { 0 };
    cdb[3..5].copy_from_slice(&allocation_len.to_be_bytes());
    cdb[5] = control;
    cdb
}

/// Standard INQUIRY (EVPD=0), control 0.
#[inline]
pub fn build_inquiry_standard(allocation_len: u16) -> [u8; 6] {
    build_inquiry(false, 0, allocation_len, 0)
}

/// VPD INQUIRY (EVPD=1), control 0.
#[inline]
pub fn build_inquiry_vpd(page: VpdPage, allocation_len: u16) -> [u8; 6] {
    build_inquiry(true, page.into(), allocation_len, 0)
}

/// Parsed standard INQUIRY (EVPD=0) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquiryStandard {
    pub peripheral_qualifier: u8, // bits 7..5 of byte0
    pub device_type: u8,          // bits 4..0 of byte0
    pub rmb: bool,                // byte1 bit7
    pub version: u8,              // byte2
    pub hisup: bool,              // byte3 bit4
    pub response_data_format: u8, // byte3 low nibble
    pub additional_length: u8,    // byte4
    pub protect: bool,            // byte5 bit0
    pub cmdque: bool,             // byte7 bit1
    pub vendor_id: String,        // bytes 8..16
    pub product_id: String,       // bytes 16..32
    pub product_rev: String,      // bytes 32..36
}

impl InquiryStandard {
    pub fn device_type_str(&self) -> &'static str {
        match self.device_type {
            0x00 => "Direct-access block (disk)",
            0x01 => "Sequential-access (tape)",
            0x02 => "Printer (obsolete)",
            0x03 => "Processor",
            0x04 => "WORM",
            0x05 => "CD/DVD",
            0x06 => "Scanner (obsolete)",
            0x07 => "Optical memory",
            0x08 => "Medium changer",
            0x09 => "Communications",
            0x0C => "Storage array controller",
            0x0D => "Enclosure services",
            0x0E => "RBC",
            0x0F => "Optical card",
            0x11 => "Object-based storage",
            0x12 => "Automation/Drive Interface",
            0x14 => "Host managed zoned block",
            0x1E => "Well known logical unit",
            0x1F => "Unknown or no device type",
            _ => "Unknown/Reserved",
        }
    }

    /// Sequential-access devices are polled with REQUEST SENSE.
    pub fn is_tape(&self) -> bool {
        self.device_type == 0x01
    }
}

/// Parse a Standard INQUIRY (EVPD=0) response (minimum 36 bytes).
pub fn parse_inquiry_standard(buf: &[u8]) -> Result<InquiryStandard> {
    if buf.len() < STD_INQUIRY_LEN {
        bail!("INQUIRY buffer too short: {}", buf.len());
    }
    let b0 = buf[0];
    let b3 = buf[3];

    Ok(InquiryStandard {
        peripheral_qualifier: (b0 >> 5) & 0x07,
        device_type: b0 & 0x1F,
        rmb: (buf[1] & 0x80) != 0,
        version: buf[2],
        hisup: (b3 & 0x10) != 0,
        response_data_format: b3 & 0x0F,
        additional_length: buf[4],
        protect: (buf[5] & 0x01) != 0,
        cmdque: (buf[7] & 0x02) != 0,
        vendor_id: trim_ascii(&buf[8..16]),
        product_id: trim_ascii(&buf[16..32]),
        product_rev: trim_ascii(&buf[32..36]),
    })
}

/// Generic VPD header view: returns (page_code, payload)
fn vpd_payload(buf: &[u8]) -> Result<(u8, &[u8])> {
    if buf.len() < 4 {
        bail!("VPD buffer too short: {}", buf.len());
    }
    // byte0: PQ/DT (ignored here), byte1: page code, byte2..3: page length (BE)
    let page_code = buf[1];
    let len = get_unaligned_be16(&buf[2..]) as usize;
    if buf.len() < 4 + len {
        bail!(
            "VPD truncated: header says {} bytes, have {}",
            len,
            buf.len().saturating_sub(4)
        );
    }
    Ok((page_code, &buf[4..4 + len]))
}

fn expect_page(buf: &[u8], want: u8) -> Result<&[u8]> {
    let (pc, payload) = vpd_payload(buf)?;
    if pc != want {
        bail!("expected VPD page 0x{want:02X}, got 0x{pc:02X}");
    }
    Ok(payload)
}

/// VPD 0x00: Supported VPD Pages
pub fn parse_vpd_supported_pages(buf: &[u8]) -> Result<Vec<u8>> {
    Ok(expect_page(buf, 0x00)?.to_vec()) // each byte is a page code
}

/// VPD 0x80: Unit Serial Number (ASCII, space-padded)
pub fn parse_vpd_unit_serial(buf: &[u8]) -> Result<String> {
    Ok(trim_ascii(expect_page(buf, 0x80)?))
}

/// One Identification Descriptor of VPD 0x83.
///
/// `identifier` is the ASCII/UTF-8 text for those code sets, otherwise
/// upper-case hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdDescriptor {
    pub code_set: u8,
    pub piv: bool,
    pub association: u8,
    pub id_type: u8,
    pub identifier: String,
}

impl DeviceIdDescriptor {
    pub fn id_type_str(&self) -> &'static str {
        match self.id_type {
            0x0 => "vendor specific",
            0x1 => "T10 vendor identification",
            0x2 => "EUI-64 based",
            0x3 => "NAA",
            0x4 => "Relative target port",
            0x5 => "Target port group",
            0x6 => "Logical unit group",
            0x7 => "MD5 logical unit identifier",
            0x8 => "SCSI name string",
            0x9 => "Protocol specific port identifier",
            0xa => "UUID identifier",
            _ => "reserved",
        }
    }
}

/// VPD 0x83: Device Identification
pub fn parse_vpd_device_id(buf: &[u8]) -> Result<Vec<DeviceIdDescriptor>> {
    let p = expect_page(buf, 0x83)?;
    let mut out = Vec::new();
    let mut off = 0usize;
    while off + 4 <= p.len() {
        let b0 = p[off];
        let b1 = p[off + 1];
        // byte 2 reserved, byte 3 identifier length
        let len = p[off + 3] as usize;
        let start = off + 4;
        let end = start + len;
        if end > p.len() {
            bail!("VPD 0x83 descriptor at {off} overruns the page");
        }

        let id_bytes = &p[start..end];
        let code_set = b0 & 0x0F;
        let identifier = match code_set {
            0x02 => trim_ascii(id_bytes),
            0x03 => String::from_utf8_lossy(id_bytes)
                .trim_end_matches('\0')
                .trim()
                .to_string(),
            _ => hex::encode_upper(id_bytes),
        };

        out.push(DeviceIdDescriptor {
            code_set,
            piv: (b1 & 0x80) != 0,
            association: (b1 >> 4) & 0x03,
            id_type: b1 & 0x0F,
            identifier,
        });

        off = end;
    }
    Ok(out)
}

/// VPD 0xB1: Block Device Characteristics (subset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDeviceCharacteristics {
    /// 0 = not reported, 1 = non-rotating medium, else nominal rpm.
    pub rotation_rate: u16,
    pub product_type: u8,
    pub nominal_form_factor: u8,
}

impl BlockDeviceCharacteristics {
    pub fn is_solid_state(&self) -> bool {
        self.rotation_rate == 1
    }
}

pub fn parse_vpd_block_device_characteristics(buf: &[u8]) -> Result<BlockDeviceCharacteristics> {
    let p = expect_page(buf, 0xB1)?;
    if p.len() < 4 {
        bail!("VPD 0xB1 payload too short: {}", p.len());
    }
    Ok(BlockDeviceCharacteristics {
        rotation_rate: get_unaligned_be16(p),
        product_type: p[2],
        nominal_form_factor: p[3] & 0x0f,
    })
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn cdb_layout() {
        assert_eq!(build_inquiry_standard(96), hex!("12 00 00 00 60 00"));
        assert_eq!(
            build_inquiry_vpd(VpdPage::DeviceId, 0x200),
            hex!("12 01 83 02 00 00")
        );
        // page is dropped without EVPD
        assert_eq!(build_inquiry(false, 0x80, 36, 0)[2], 0);
    }

    #[test]
    fn parse_std_inquiry_min() {
        let mut b = [0u8; 36];
        b[2] = 0x06;
        b[3] = 0x12;
        b[4] = 31;
        b[7] = 0x02;
        b[8..16].copy_from_slice(b"LIO-ORG ");
        b[16..32].copy_from_slice(b"TCMU device     ");
        b[32..36].copy_from_slice(b"0020");
        let s = parse_inquiry_standard(&b).expect("inquiry");
        assert_eq!(s.device_type, 0x00);
        assert!(s.hisup);
        assert!(s.cmdque);
        assert_eq!(s.vendor_id, "LIO-ORG");
        assert_eq!(s.product_id, "TCMU device");
        assert_eq!(s.product_rev, "0020");
        assert!(parse_inquiry_standard(&b[..35]).is_err());
    }

    #[test]
    fn parse_vpd_supported() {
        let buf = hex!("00 00 00 03 00 80 83");
        let pages = parse_vpd_supported_pages(&buf).expect("vpd 0x00");
        assert_eq!(pages, vec![0x00, 0x80, 0x83]);
        assert!(parse_vpd_unit_serial(&buf).is_err());
    }

    #[test]
    fn parse_vpd_device_id_basic() {
        let mut payload = vec![0x02, 0x01, 0x00, 0x04];
        payload.extend_from_slice(b"ABCD");
        payload.extend_from_slice(&hex!("01 03 00 08 50 01 23 45 67 89 ab cd"));
        let mut buf = vec![0x00, 0x83, 0x00, payload.len() as u8];
        buf.extend_from_slice(&payload);
        let v = parse_vpd_device_id(&buf).expect("vpd 0x83");
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].identifier, "ABCD");
        assert_eq!(v[0].id_type_str(), "T10 vendor identification");
        assert_eq!(v[1].identifier, "500123456789ABCD");
        assert_eq!(v[1].id_type, 0x3);
    }

    #[test]
    fn truncated_vpd_rejected() {
        let buf = hex!("00 80 00 10 41 42");
        assert!(parse_vpd_unit_serial(&buf).is_err());
    }

    #[test]
    fn rotation_rate() {
        let mut buf = vec![0x00, 0xb1, 0x00, 0x3c];
        buf.extend_from_slice(&[0u8; 0x3c]);
        buf[5] = 0x01;
        let c = parse_vpd_block_device_characteristics(&buf).expect("vpd 0xb1");
        assert!(c.is_solid_state());
    }
}
