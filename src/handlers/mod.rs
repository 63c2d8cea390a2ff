//! This module contains the command helpers: one small routine per SCSI
//! command that builds the CDB, runs a single session and maps the outcome
//! to an error kind.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// ATA PASS-THROUGH helpers.
pub mod ata;
/// READ BUFFER / WRITE BUFFER and microcode download.
pub mod buffer;
/// READ CAPACITY, REPORT LUNS, GET LBA STATUS and opcode queries.
pub mod capacity;
/// Shared execute-classify-release body and per-call options.
pub mod common;
/// Self-test and diagnostic pages.
pub mod diagnostic;
/// Standard INQUIRY and VPD pages.
pub mod inquiry;
/// LOG SENSE / LOG SELECT.
pub mod log;
/// Block I/O, FORMAT UNIT, FORMAT MEDIUM and SANITIZE.
pub mod media;
/// MODE SENSE / MODE SELECT.
pub mod mode;
/// REPORT / SET TIMESTAMP.
pub mod timestamp;
/// TEST UNIT READY, REQUEST SENSE and progress probes.
pub mod unit;
/// Zoned block commands.
pub mod zone;
