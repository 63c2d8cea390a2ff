//! This module defines the data model shared by the session, the backends and
//! the command helpers: status bytes, sense data and the error taxonomy.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// ASC/ASCQ description table and sense key names.
pub mod asc_ascq;
/// Error kinds, the result classifier and exit codes.
pub mod error;
/// Fixed and descriptor format sense decoder.
pub mod sense_data;
/// SAM status byte, result category and task attributes.
pub mod status;
