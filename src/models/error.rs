// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Library-wide error taxonomy, the pure result classifier and the process
//! exit-code mapping.

use std::fmt;

use thiserror::Error;

use crate::{
    models::{
        sense_data::{SenseCategory, asc, category, normalize, sense_key},
        status::{ResultCategory, ScsiStatus},
    },
    pt::session::{ExecStatus, PtResult},
};

/// Exit codes from 50 upwards carry an errno.
pub const OS_ERR_BASE: i32 = 50;
const OS_ERR_MAX_ERRNO: i32 = 46;

/// Closed set of outcomes a command helper can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Ok,
    Syntax,
    NotReady,
    MediumHard,
    IllegalReq,
    UnitAttention,
    DataProtect,
    InvalidOp,
    CopyAborted,
    AbortedCommand,
    Miscompare,
    FileError,
    /// Strict mode only.
    NoSense,
    /// Strict mode only.
    Recovered,
    ResConflict,
    StatusBusy,
    StatusOther,
    Timeout,
    Transport,
    NotSupported,
    Protection,
    /// Carries the positive errno.
    OsErr(i32),
    CatOther,
    Malformed,
}

impl ErrorKind {
    /// Stable process exit code.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Ok => 0,
            ErrorKind::Syntax => 1,
            ErrorKind::NotReady => 2,
            ErrorKind::MediumHard => 3,
            ErrorKind::IllegalReq => 5,
            ErrorKind::UnitAttention => 6,
            ErrorKind::DataProtect => 7,
            ErrorKind::InvalidOp => 9,
            ErrorKind::CopyAborted => 10,
            ErrorKind::AbortedCommand => 11,
            ErrorKind::Miscompare => 14,
            ErrorKind::FileError => 15,
            ErrorKind::NoSense => 20,
            ErrorKind::Recovered => 21,
            ErrorKind::ResConflict => 24,
            ErrorKind::StatusBusy => 26,
            ErrorKind::StatusOther => 28,
            ErrorKind::Timeout => 33,
            ErrorKind::Transport => 35,
            ErrorKind::NotSupported => 37,
            ErrorKind::Protection => 40,
            ErrorKind::OsErr(errno) => OS_ERR_BASE + errno.clamp(0, OS_ERR_MAX_ERRNO),
            ErrorKind::CatOther => 97,
            ErrorKind::Malformed => 98,
        }
    }

    /// Inverse of [`ErrorKind::exit_code`]; OS errors come back with the
    /// clamped errno.
    pub fn from_exit_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => ErrorKind::Ok,
            1 => ErrorKind::Syntax,
            2 => ErrorKind::NotReady,
            3 => ErrorKind::MediumHard,
            5 => ErrorKind::IllegalReq,
            6 => ErrorKind::UnitAttention,
            7 => ErrorKind::DataProtect,
            9 => ErrorKind::InvalidOp,
            10 => ErrorKind::CopyAborted,
            11 => ErrorKind::AbortedCommand,
            14 => ErrorKind::Miscompare,
            15 => ErrorKind::FileError,
            20 => ErrorKind::NoSense,
            21 => ErrorKind::Recovered,
            24 => ErrorKind::ResConflict,
            26 => ErrorKind::StatusBusy,
            28 => ErrorKind::StatusOther,
            33 => ErrorKind::Timeout,
            35 => ErrorKind::Transport,
            37 => ErrorKind::NotSupported,
            40 => ErrorKind::Protection,
            c @ 50..=96 => ErrorKind::OsErr(c - OS_ERR_BASE),
            97 => ErrorKind::CatOther,
            98 => ErrorKind::Malformed,
            _ => return None,
        })
    }

    pub fn is_ok(self) -> bool {
        self == ErrorKind::Ok
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Ok => "ok",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::NotReady => "device not ready",
            ErrorKind::MediumHard => "medium or hardware error",
            ErrorKind::IllegalReq => "illegal request",
            ErrorKind::UnitAttention => "unit attention",
            ErrorKind::DataProtect => "data protect",
            ErrorKind::InvalidOp => "invalid opcode",
            ErrorKind::CopyAborted => "copy aborted",
            ErrorKind::AbortedCommand => "aborted command",
            ErrorKind::Miscompare => "miscompare",
            ErrorKind::FileError => "file error",
            ErrorKind::NoSense => "no sense",
            ErrorKind::Recovered => "recovered error",
            ErrorKind::ResConflict => "reservation conflict",
            ErrorKind::StatusBusy => "busy",
            ErrorKind::StatusOther => "unexpected status",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport error",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::Protection => "protection information error",
            ErrorKind::OsErr(_) => "os error",
            ErrorKind::CatOther => "other sense category",
            ErrorKind::Malformed => "malformed response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::OsErr(errno) => write!(
                f,
                "os error {errno}: {}",
                std::io::Error::from_raw_os_error(*errno)
            ),
            k => f.write_str(k.name()),
        }
    }
}

impl From<SenseCategory> for ErrorKind {
    /// Direct image of a sense category, without the NO SENSE / RECOVERED
    /// collapse.
    fn from(cat: SenseCategory) -> Self {
        match cat {
            SenseCategory::NoSense => ErrorKind::NoSense,
            SenseCategory::Recovered => ErrorKind::Recovered,
            SenseCategory::NotReady => ErrorKind::NotReady,
            SenseCategory::MediumHard | SenseCategory::Hardware => ErrorKind::MediumHard,
            SenseCategory::IllegalReq => ErrorKind::IllegalReq,
            SenseCategory::UnitAttention => ErrorKind::UnitAttention,
            SenseCategory::DataProtect => ErrorKind::DataProtect,
            SenseCategory::AbortedCommand => ErrorKind::AbortedCommand,
            SenseCategory::Miscompare => ErrorKind::Miscompare,
            SenseCategory::CopyAborted => ErrorKind::CopyAborted,
            SenseCategory::ResConflict => ErrorKind::ResConflict,
            SenseCategory::Protection => ErrorKind::Protection,
            SenseCategory::Sense => ErrorKind::CatOther,
        }
    }
}

/// Error value returned by command helpers and session setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}{}", detail_suffix(.detail))]
pub struct PtError {
    pub kind: ErrorKind,
    pub detail: String,
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

impl PtError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn syntax(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, detail)
    }

    pub fn os(errno: i32, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::OsErr(errno), detail)
    }

    /// Negative errno for OS errors.
    pub fn neg_errno(&self) -> Option<i32> {
        match self.kind {
            ErrorKind::OsErr(e) => Some(-e),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl From<std::io::Error> for PtError {
    fn from(e: std::io::Error) -> Self {
        match e.raw_os_error() {
            Some(errno) => PtError::os(errno, e.to_string()),
            None => PtError::new(ErrorKind::FileError, e.to_string()),
        }
    }
}

impl From<ErrorKind> for PtError {
    fn from(kind: ErrorKind) -> Self {
        PtError::new(kind, String::new())
    }
}

/// Classify one execution.
///
/// Pure: looks only at the execution status, the result record and the
/// populated sense bytes. With `strict` unset NO SENSE and RECOVERED ERROR
/// collapse to [`ErrorKind::Ok`].
pub fn classify(exec: ExecStatus, res: &PtResult, sense: &[u8], strict: bool) -> ErrorKind {
    match exec {
        ExecStatus::OsError(errno) => return ErrorKind::OsErr(errno),
        ExecStatus::BadParams => return ErrorKind::Syntax,
        ExecStatus::Timeout => return ErrorKind::Timeout,
        ExecStatus::NotSupported => return ErrorKind::NotSupported,
        ExecStatus::Submitted => {},
    }
    match res.category {
        ResultCategory::Good => ErrorKind::Ok,
        ResultCategory::Status => match ScsiStatus::from(res.status) {
            ScsiStatus::ReservationConflict => ErrorKind::ResConflict,
            ScsiStatus::Busy | ScsiStatus::TaskSetFull => ErrorKind::StatusBusy,
            _ => ErrorKind::StatusOther,
        },
        ResultCategory::Sense => match category(sense) {
            SenseCategory::NoSense | SenseCategory::Recovered if !strict => ErrorKind::Ok,
            cat => ErrorKind::from(cat),
        },
        ResultCategory::TransportErr => ErrorKind::Transport,
        ResultCategory::OsErr => ErrorKind::OsErr(res.os_err),
        ResultCategory::BadParams => ErrorKind::Syntax,
        ResultCategory::Timeout => ErrorKind::Timeout,
    }
}

/// Refinement applied by the command helpers on top of [`classify`]:
/// ILLEGAL REQUEST with INVALID COMMAND OPERATION CODE becomes
/// [`ErrorKind::InvalidOp`].
pub fn refine(kind: ErrorKind, sense: &[u8]) -> ErrorKind {
    if kind != ErrorKind::IllegalReq {
        return kind;
    }
    match normalize(sense) {
        Some(sd)
            if sd.sense_key == sense_key::ILLEGAL_REQUEST && sd.asc == asc::INVALID_OPCODE =>
        {
            ErrorKind::InvalidOp
        },
        _ => kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::Ok,
            ErrorKind::Syntax,
            ErrorKind::NotReady,
            ErrorKind::MediumHard,
            ErrorKind::IllegalReq,
            ErrorKind::UnitAttention,
            ErrorKind::DataProtect,
            ErrorKind::InvalidOp,
            ErrorKind::CopyAborted,
            ErrorKind::AbortedCommand,
            ErrorKind::Miscompare,
            ErrorKind::FileError,
            ErrorKind::NoSense,
            ErrorKind::Recovered,
            ErrorKind::ResConflict,
            ErrorKind::StatusBusy,
            ErrorKind::StatusOther,
            ErrorKind::Timeout,
            ErrorKind::Transport,
            ErrorKind::NotSupported,
            ErrorKind::Protection,
            ErrorKind::CatOther,
            ErrorKind::Malformed,
        ];
        let mut seen = std::collections::HashSet::new();
        for k in kinds {
            assert!(seen.insert(k.exit_code()), "duplicate exit code for {k:?}");
            assert_eq!(ErrorKind::from_exit_code(k.exit_code()), Some(k));
            assert!(k.exit_code() < OS_ERR_BASE || k.exit_code() > 96);
        }
    }

    #[test]
    fn os_error_exit_codes_clamp() {
        assert_eq!(ErrorKind::OsErr(libc::EIO).exit_code(), 55);
        assert_eq!(ErrorKind::OsErr(1000).exit_code(), 96);
        assert!(ErrorKind::OsErr(libc::EINTR).exit_code() >= 48);
    }

    #[test]
    fn io_error_conversion_keeps_errno() {
        let e = PtError::from(std::io::Error::from_raw_os_error(libc::ENOENT));
        assert_eq!(e.kind, ErrorKind::OsErr(libc::ENOENT));
        assert_eq!(e.neg_errno(), Some(-libc::ENOENT));
    }
}
