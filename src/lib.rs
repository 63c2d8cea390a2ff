//! This crate provides a SCSI / NVMe pass-through core: sessions over the
//! OS pass-through interfaces, sense decoding, result classification and a
//! helper per SCSI command.
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Handles configuration, command-line parsing, and logging.
pub mod cfg;
/// Implements the SCSI command descriptor blocks and response parsers.
pub mod control_block;
/// Command helpers: one session per SCSI command.
pub mod handlers;
/// Status bytes, sense data and the error taxonomy.
pub mod models;
/// Pass-through sessions, device handles and OS backends.
pub mod pt;
/// Multi-command operations such as progress polling.
pub mod state_machine;
/// Provides utility functions used throughout the crate.
pub mod utils;
