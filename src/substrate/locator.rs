//! Record locators
//!
//! Physical address of a structure inside the substrate (page + slot).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies where a hash structure's control block lives.
///
/// Assigned once at creation and never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordLocator {
    /// Page id
    pub major: u64,
    /// Slot id within the page
    pub minor: u64,
}

impl RecordLocator {
    /// Well-known root record; the catalog always lives here.
    pub const ROOT: RecordLocator = RecordLocator { major: 1, minor: 0 };

    /// No structure ever occupies the null locator.
    pub const NULL: RecordLocator = RecordLocator { major: 0, minor: 0 };

    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for RecordLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(page {}, slot {})", self.major, self.minor)
    }
}
