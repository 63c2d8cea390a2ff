//! This module contains the blocking state machines of multi-command
//! operations.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Transition type and the state machine traits.
pub mod common;
/// Long-running FORMAT / SANITIZE with progress polling.
pub mod long_op;
