// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Boolean enumeration with string serialization support
///
/// Represents yes/no values with support for various string representations
/// including "Yes"/"No", "true"/"false", and "1"/"0".
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    #[serde(
        rename = "Yes",
        alias = "yes",
        alias = "YES",
        alias = "true",
        alias = "True",
        alias = "1"
    )]
    Yes,
    #[serde(
        rename = "No",
        alias = "no",
        alias = "NO",
        alias = "false",
        alias = "False",
        alias = "0"
    )]
    No,
}
impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
        })
    }
}
impl From<bool> for YesNo {
    fn from(b: bool) -> Self {
        if b { YesNo::Yes } else { YesNo::No }
    }
}
impl YesNo {
    pub fn as_bool(self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

/// Windows SCSI_PASS_THROUGH flavour, fixed for the whole process.
///
/// `Direct` maps the caller's buffers (SPT direct), `Indirect` lets the
/// kernel bounce data through a buffer appended to the request.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SptMode {
    #[default]
    #[serde(rename = "Direct", alias = "direct", alias = "DIRECT")]
    Direct,
    #[serde(rename = "Indirect", alias = "indirect", alias = "INDIRECT")]
    Indirect,
}
impl fmt::Display for SptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SptMode::Direct => "Direct",
            SptMode::Indirect => "Indirect",
        })
    }
}

/// Command used to poll a long-running FORMAT UNIT / SANITIZE.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeKind {
    #[serde(
        rename = "TestUnitReady",
        alias = "tur",
        alias = "TUR",
        alias = "test_unit_ready"
    )]
    TestUnitReady,
    #[serde(rename = "RequestSense", alias = "request_sense", alias = "rs")]
    RequestSense,
    /// REQUEST SENSE for tape (FORMAT MEDIUM), TEST UNIT READY otherwise.
    #[default]
    #[serde(rename = "Auto", alias = "auto", alias = "AUTO")]
    Auto,
}
impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProbeKind::TestUnitReady => "TestUnitReady",
            ProbeKind::RequestSense => "RequestSense",
            ProbeKind::Auto => "Auto",
        })
    }
}
