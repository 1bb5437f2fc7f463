//! Normalized file system events and the raw operation bitmask

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Raw operation bitmask reported by an event source
///
/// Several bits may be set at once; [`EventType::from_op`] picks exactly one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Op(u32);

impl Op {
    pub const CREATE: Op = Op(1 << 0);
    pub const WRITE: Op = Op(1 << 1);
    pub const REMOVE: Op = Op(1 << 2);
    pub const RENAME: Op = Op(1 << 3);
    pub const CHMOD: Op = Op(1 << 4);

    /// Mask with no bits set
    pub const fn empty() -> Self {
        Op(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Op(bits)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`
    pub const fn contains(self, other: Op) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Op {
    type Output = Op;

    fn bitor(self, rhs: Op) -> Op {
        Op(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Op {
    fn bitor_assign(&mut self, rhs: Op) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = EventType::PRIORITY
            .iter()
            .filter(|t| self.contains(t.op()))
            .map(|t| t.as_str())
            .collect::<Vec<_>>();
        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op({})", self)
    }
}

/// Type of a normalized event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

impl EventType {
    /// Resolution order when several raw bits are set
    pub const PRIORITY: [EventType; 5] = [
        EventType::Create,
        EventType::Write,
        EventType::Remove,
        EventType::Rename,
        EventType::Chmod,
    ];

    /// Map a raw bitmask to a single type; the first matching bit in
    /// [`EventType::PRIORITY`] wins
    pub fn from_op(op: Op) -> Option<EventType> {
        Self::PRIORITY.into_iter().find(|t| op.contains(t.op()))
    }

    /// The raw bit corresponding to this type
    pub fn op(self) -> Op {
        match self {
            EventType::Create => Op::CREATE,
            EventType::Write => Op::WRITE,
            EventType::Remove => Op::REMOVE,
            EventType::Rename => Op::RENAME,
            EventType::Chmod => Op::CHMOD,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Create => "CREATE",
            EventType::Write => "WRITE",
            EventType::Remove => "REMOVE",
            EventType::Rename => "RENAME",
            EventType::Chmod => "CHMOD",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized file system event
///
/// Immutable once constructed; `old_path` is only set for renames whose
/// source side was reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    old_path: Option<PathBuf>,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(event_type: EventType, path: impl Into<PathBuf>) -> Self {
        Self {
            event_type,
            path: path.into(),
            old_path: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a rename event carrying its previous path
    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            old_path: Some(from.into()),
            ..Self::new(EventType::Rename, to)
        }
    }

    pub(crate) fn with_old_path(mut self, old_path: Option<PathBuf>) -> Self {
        self.old_path = old_path;
        self
    }

    pub(crate) fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Copy of this event with a different type, used when a debounced
    /// group reports its representative type
    pub(crate) fn retyped(&self, event_type: EventType) -> Self {
        Self {
            event_type,
            ..self.clone()
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn old_path(&self) -> Option<&Path> {
        self.old_path.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// File name component, lossily decoded
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old_path {
            Some(old) => write!(
                f,
                "{} {} -> {}",
                self.event_type,
                old.display(),
                self.path.display()
            ),
            None => write!(f, "{} {}", self.event_type, self.path.display()),
        }
    }
}
