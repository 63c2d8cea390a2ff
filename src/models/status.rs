// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

/// SAM status byte returned by the device server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScsiStatus {
    Good,
    CheckCondition,
    ConditionMet,
    Busy,
    Intermediate,
    IntermediateConditionMet,
    ReservationConflict,
    CommandTerminated,
    TaskSetFull,
    AcaActive,
    TaskAborted,
    /// Any other status codes defined in SAM-x or reserved
    Other(u8),
}

impl From<u8> for ScsiStatus {
    fn from(b: u8) -> Self {
        match b & 0xfe {
            0x00 => ScsiStatus::Good,
            0x02 => ScsiStatus::CheckCondition,
            0x04 => ScsiStatus::ConditionMet,
            0x08 => ScsiStatus::Busy,
            0x10 => ScsiStatus::Intermediate,
            0x14 => ScsiStatus::IntermediateConditionMet,
            0x18 => ScsiStatus::ReservationConflict,
            0x22 => ScsiStatus::CommandTerminated,
            0x28 => ScsiStatus::TaskSetFull,
            0x30 => ScsiStatus::AcaActive,
            0x40 => ScsiStatus::TaskAborted,
            other => ScsiStatus::Other(other),
        }
    }
}

impl From<ScsiStatus> for u8 {
    fn from(s: ScsiStatus) -> u8 {
        match s {
            ScsiStatus::Good => 0x00,
            ScsiStatus::CheckCondition => 0x02,
            ScsiStatus::ConditionMet => 0x04,
            ScsiStatus::Busy => 0x08,
            ScsiStatus::Intermediate => 0x10,
            ScsiStatus::IntermediateConditionMet => 0x14,
            ScsiStatus::ReservationConflict => 0x18,
            ScsiStatus::CommandTerminated => 0x22,
            ScsiStatus::TaskSetFull => 0x28,
            ScsiStatus::AcaActive => 0x30,
            ScsiStatus::TaskAborted => 0x40,
            ScsiStatus::Other(v) => v,
        }
    }
}

impl ScsiStatus {
    /// Statuses that complete a command without an error condition.
    pub fn is_good_like(self) -> bool {
        matches!(
            self,
            ScsiStatus::Good
                | ScsiStatus::ConditionMet
                | ScsiStatus::Intermediate
                | ScsiStatus::IntermediateConditionMet
                | ScsiStatus::CommandTerminated
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ScsiStatus::Good => "Good",
            ScsiStatus::CheckCondition => "Check Condition",
            ScsiStatus::ConditionMet => "Condition Met",
            ScsiStatus::Busy => "Busy",
            ScsiStatus::Intermediate => "Intermediate",
            ScsiStatus::IntermediateConditionMet => "Intermediate-Condition Met",
            ScsiStatus::ReservationConflict => "Reservation Conflict",
            ScsiStatus::CommandTerminated => "Command Terminated",
            ScsiStatus::TaskSetFull => "Task Set Full",
            ScsiStatus::AcaActive => "ACA Active",
            ScsiStatus::TaskAborted => "Task Aborted",
            ScsiStatus::Other(_) => "Reserved/Unknown",
        }
    }
}

impl fmt::Display for ScsiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [0x{:02x}]", self.name(), u8::from(*self))
    }
}

/// Condensed outcome of one pass-through execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultCategory {
    #[default]
    Good,
    /// Status other than GOOD or CHECK CONDITION (or CHECK CONDITION without
    /// any sense bytes).
    Status,
    /// Sense data populated and meaningful.
    Sense,
    TransportErr,
    OsErr,
    BadParams,
    Timeout,
}

impl fmt::Display for ResultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResultCategory::Good => "good",
            ResultCategory::Status => "status",
            ResultCategory::Sense => "sense",
            ResultCategory::TransportErr => "transport error",
            ResultCategory::OsErr => "os error",
            ResultCategory::BadParams => "bad parameters",
            ResultCategory::Timeout => "timeout",
        })
    }
}

/// SAM task attributes, including reserved values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskAttribute {
    Untagged,
    #[default]
    Simple,
    Ordered,
    HeadOfQueue,
    Aca,
    Reserved(u8),
}

impl From<u8> for TaskAttribute {
    fn from(value: u8) -> Self {
        match value {
            0 => TaskAttribute::Untagged,
            1 => TaskAttribute::Simple,
            2 => TaskAttribute::Ordered,
            3 => TaskAttribute::HeadOfQueue,
            4 => TaskAttribute::Aca,
            other => TaskAttribute::Reserved(other & 0x07),
        }
    }
}

impl From<TaskAttribute> for u8 {
    fn from(value: TaskAttribute) -> Self {
        match value {
            TaskAttribute::Untagged => 0,
            TaskAttribute::Simple => 1,
            TaskAttribute::Ordered => 2,
            TaskAttribute::HeadOfQueue => 3,
            TaskAttribute::Aca => 4,
            TaskAttribute::Reserved(v) => v & 0x07,
        }
    }
}

/// Task management functions a backend may be asked to issue instead of a
/// CDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskManagement {
    AbortTask,
    AbortTaskSet,
    ClearAca,
    ClearTaskSet,
    LogicalUnitReset,
    TargetReset,
    QueryTask,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_byte_mapping() {
        assert_eq!(ScsiStatus::from(0x18), ScsiStatus::ReservationConflict);
        assert_eq!(ScsiStatus::from(0x02), ScsiStatus::CheckCondition);
        assert_eq!(ScsiStatus::from(0x03), ScsiStatus::CheckCondition);
        assert_eq!(u8::from(ScsiStatus::TaskSetFull), 0x28);
        assert_eq!(ScsiStatus::from(0x7e), ScsiStatus::Other(0x7e));
        assert!(ScsiStatus::CommandTerminated.is_good_like());
        assert!(!ScsiStatus::Busy.is_good_like());
    }

    #[test]
    fn task_attribute_bits() {
        assert_eq!(u8::from(TaskAttribute::HeadOfQueue), 3);
        assert_eq!(TaskAttribute::from(6), TaskAttribute::Reserved(6));
    }
}
