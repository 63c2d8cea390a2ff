// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::inquiry::{
        BlockDeviceCharacteristics, DeviceIdDescriptor, InquiryStandard, VpdPage,
        build_inquiry, build_inquiry_standard, parse_inquiry_standard,
        parse_vpd_block_device_characteristics, parse_vpd_device_id,
        parse_vpd_supported_pages, parse_vpd_unit_serial,
    },
    handlers::common::{HelperOpts, exec_in, malformed},
    models::error::PtError,
    pt::session::PtTarget,
    utils::get_unaligned_be16,
};

/// Allocation length of the standard INQUIRY.
pub const STD_INQUIRY_ALLOC: u16 = 96;
const VPD_FIRST_ALLOC: u16 = 252;

pub fn inquiry_standard<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<InquiryStandard, PtError> {
    let data = exec_in(
        target,
        &build_inquiry_standard(STD_INQUIRY_ALLOC),
        STD_INQUIRY_ALLOC as usize,
        opts,
    )?;
    malformed(parse_inquiry_standard(&data))
}

/// Raw VPD page. Asks again with the full length when the first answer was
/// cut short.
pub fn inquiry_vpd<T: PtTarget + ?Sized>(target: &T, page: u8, opts: &HelperOpts) -> Result<Vec<u8>, PtError> {
    let data = exec_in(
        target,
        &build_inquiry(true, page, VPD_FIRST_ALLOC, 0),
        VPD_FIRST_ALLOC as usize,
        opts,
    )?;
    if data.len() < 4 {
        return Err(PtError::malformed(format!("VPD 0x{page:02x}: only {} bytes", data.len())));
    }
    if data[1] != page {
        return Err(PtError::malformed(format!(
            "asked for VPD 0x{page:02x}, got 0x{:02x}",
            data[1]
        )));
    }
    let want = 4 + get_unaligned_be16(&data[2..]) as usize;
    if want <= data.len() || data.len() < VPD_FIRST_ALLOC as usize {
        return Ok(data);
    }
    let alloc = u16::try_from(want).unwrap_or(u16::MAX);
    exec_in(target, &build_inquiry(true, page, alloc, 0), alloc as usize, opts)
}

pub fn vpd_supported_pages<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<Vec<u8>, PtError> {
    let data = inquiry_vpd(target, VpdPage::SupportedPages.into(), opts)?;
    malformed(parse_vpd_supported_pages(&data))
}

pub fn vpd_unit_serial<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<String, PtError> {
    let data = inquiry_vpd(target, VpdPage::UnitSerial.into(), opts)?;
    malformed(parse_vpd_unit_serial(&data))
}

pub fn vpd_device_id<T: PtTarget + ?Sized>(
    target: &T,
    opts: &HelperOpts,
) -> Result<Vec<DeviceIdDescriptor>, PtError> {
    let data = inquiry_vpd(target, VpdPage::DeviceId.into(), opts)?;
    malformed(parse_vpd_device_id(&data))
}

pub fn vpd_block_device_characteristics<T: PtTarget + ?Sized>(
    target: &T,
    opts: &HelperOpts,
) -> Result<BlockDeviceCharacteristics, PtError> {
    let data = inquiry_vpd(target, VpdPage::BlockDeviceCharacteristics.into(), opts)?;
    malformed(parse_vpd_block_device_characteristics(&data))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::{handlers::common::mock::*, models::error::ErrorKind};

    fn opts() -> HelperOpts {
        HelperOpts {
            timeout_secs: 5,
            verbose: 0,
            strict: false,
        }
    }

    #[test]
    fn long_vpd_page_is_fetched_twice() {
        let mut page = vec![0x00, 0x83, 0x01, 0x04];
        page.extend(std::iter::repeat_n(0u8, 0x104));
        let t = MockTarget::with(vec![good(&page[..252]), good(&page)]);
        let data = inquiry_vpd(&t, 0x83, &opts()).expect("vpd");
        assert_eq!(data.len(), 0x108);
        let cdbs = t.cdbs();
        assert_eq!(cdbs.len(), 2);
        assert_eq!(cdbs[1], hex!("12 01 83 01 08 00").to_vec());
    }

    #[test]
    fn short_standard_inquiry_is_malformed() {
        let t = MockTarget::with(vec![good(&[0u8; 20])]);
        let err = inquiry_standard(&t, &opts()).expect_err("short");
        assert_eq!(err.kind, ErrorKind::Malformed);
    }

    #[test]
    fn wrong_page_is_malformed() {
        let t = MockTarget::with(vec![good(&hex!("00 80 00 02 41 42"))]);
        let err = vpd_supported_pages(&t, &opts()).expect_err("page mismatch");
        assert_eq!(err.kind, ErrorKind::Malformed);
    }
}
