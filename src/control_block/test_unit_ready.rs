// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::control_block::common::opcode;

/// Build a TEST UNIT READY(6) CDB.
#[inline]
pub fn build_test_unit_ready(control: u8) -> [u8; 6] {
    let mut cdb = [0u8; 6];
    cdb[0] = opcode::TEST_UNIT_READY;
    cdb[5] = control;
    cdb
}
