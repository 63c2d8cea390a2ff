// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod ata_pt;
pub mod buffer;
pub mod common;
pub mod diagnostic;
pub mod format;
pub mod inquiry;
pub mod log;
pub mod long;
pub mod mode;
pub mod provisioning;
pub mod read;
pub mod read_capacity;
pub mod report_luns;
pub mod request_sense;
pub mod sanitize;
pub mod service_action;
pub mod test_unit_ready;
pub mod timestamp;
pub mod write;
pub mod zone;
