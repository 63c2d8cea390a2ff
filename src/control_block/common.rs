// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Operation codes and service actions shared by the CDB builders.

pub mod opcode {
    pub const TEST_UNIT_READY: u8 = 0x00;
    pub const REQUEST_SENSE: u8 = 0x03;
    /// FORMAT UNIT (SBC) and FORMAT MEDIUM (SSC) share the code.
    pub const FORMAT_UNIT: u8 = 0x04;
    pub const FORMAT_MEDIUM: u8 = 0x04;
    pub const INQUIRY: u8 = 0x12;
    pub const MODE_SELECT_6: u8 = 0x15;
    pub const MODE_SENSE_6: u8 = 0x1a;
    pub const RECEIVE_DIAGNOSTIC: u8 = 0x1c;
    pub const SEND_DIAGNOSTIC: u8 = 0x1d;
    pub const READ_CAPACITY_10: u8 = 0x25;
    pub const READ_10: u8 = 0x28;
    pub const WRITE_10: u8 = 0x2a;
    pub const WRITE_BUFFER: u8 = 0x3b;
    pub const READ_BUFFER_10: u8 = 0x3c;
    pub const READ_LONG_10: u8 = 0x3e;
    pub const WRITE_LONG_10: u8 = 0x3f;
    pub const LOG_SELECT: u8 = 0x4c;
    pub const LOG_SENSE: u8 = 0x4d;
    pub const SANITIZE: u8 = 0x48;
    pub const MODE_SELECT_10: u8 = 0x55;
    pub const MODE_SENSE_10: u8 = 0x5a;
    pub const VARIABLE_LENGTH: u8 = 0x7f;
    pub const ATA_PASS_THROUGH_16: u8 = 0x85;
    pub const READ_16: u8 = 0x88;
    pub const WRITE_16: u8 = 0x8a;
    pub const ZBC_OUT: u8 = 0x94;
    pub const ZBC_IN: u8 = 0x95;
    pub const READ_BUFFER_16: u8 = 0x9b;
    pub const SERVICE_ACTION_IN_16: u8 = 0x9e;
    pub const SERVICE_ACTION_OUT_16: u8 = 0x9f;
    pub const REPORT_LUNS: u8 = 0xa0;
    pub const ATA_PASS_THROUGH_12: u8 = 0xa1;
    pub const MAINTENANCE_IN: u8 = 0xa3;
    pub const MAINTENANCE_OUT: u8 = 0xa4;
}

/// SERVICE ACTION IN(16) service actions (SBC).
pub mod sai16 {
    pub const READ_CAPACITY_16: u8 = 0x10;
    pub const GET_LBA_STATUS: u8 = 0x12;
    pub const REPORT_PROVISIONING_INIT_PATTERN: u8 = 0x1d;
}

/// MAINTENANCE IN service actions (SPC).
pub mod maint_in {
    pub const REPORT_IDENTIFYING_INFO: u8 = 0x05;
    pub const REPORT_TARGET_PORT_GROUPS: u8 = 0x0a;
    pub const REPORT_SUPPORTED_OPCODES: u8 = 0x0c;
    pub const REPORT_SUPPORTED_TMFS: u8 = 0x0d;
    pub const REPORT_TIMESTAMP: u8 = 0x0f;
}

/// MAINTENANCE OUT service actions (SPC).
pub mod maint_out {
    pub const SET_IDENTIFYING_INFO: u8 = 0x06;
    pub const SET_TARGET_PORT_GROUPS: u8 = 0x0a;
    pub const SET_TIMESTAMP: u8 = 0x0f;
}
