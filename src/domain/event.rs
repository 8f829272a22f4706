// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event kinds dispatched to observers during reads and writes.

use crate::domain::errors::ConfigError;
use std::fmt;

/// The four points at which observers are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Before the storage lookup of a read.
    BeforeGet = 0,
    /// After the storage lookup of a read.
    AfterGet = 1,
    /// Before a write reaches storage.
    BeforeSet = 2,
    /// After a write has been committed.
    AfterSet = 3,
}

impl EventKind {
    /// Number of event kinds.
    pub const COUNT: usize = 4;

    /// All event kinds in dispatch order.
    pub const ALL: [EventKind; 4] = [
        EventKind::BeforeGet,
        EventKind::AfterGet,
        EventKind::BeforeSet,
        EventKind::AfterSet,
    ];

    /// Position of this kind in per-node observer tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Snake-case name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::BeforeGet => "before_get",
            EventKind::AfterGet => "after_get",
            EventKind::BeforeSet => "before_set",
            EventKind::AfterSet => "after_set",
        }
    }
}

impl TryFrom<u8> for EventKind {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        EventKind::ALL
            .get(value as usize)
            .copied()
            .ok_or(ConfigError::OutOfRange { value })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
