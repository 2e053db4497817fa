//! Core value types shared across the reader
//!
//! # Key Types
//!
//! - **`TimeRange`**: half-open query window `[start, end)` in epoch seconds
//! - **`Tier`**: explicit precedence rank of a storage retention level
//! - **`TierSeries`**: one fetch result unit (tier + series)
//! - **`PathNode`** / **`PathStats`**: index lookup results for the find and
//!   path-stats surfaces
//!
//! # Example
//!
//! ```rust
//! use graphite_reader::types::TimeRange;
//!
//! let range = TimeRange::new(1000, 4600).unwrap();
//! assert_eq!(range.duration(), 3600);
//! assert!(range.contains(1000));
//! assert!(!range.contains(4600));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::series::Series;

/// Half-open time window `[start, end)` in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start, epoch seconds
    pub start: i64,
    /// Exclusive end, epoch seconds
    pub end: i64,
}

impl TimeRange {
    /// Create a validated time range
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTimeRange`] when `start >= end`.
    pub fn new(start: i64, end: i64) -> Result<Self, InvalidTimeRange> {
        if start >= end {
            return Err(InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window length in seconds
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Whether `timestamp` falls inside the window
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Intersection with another range, if the two overlap
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(TimeRange { start, end })
        } else {
            None
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Error for degenerate time windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid time range: start {start} is not before end {end}")]
pub struct InvalidTimeRange {
    /// Offending start
    pub start: i64,
    /// Offending end
    pub end: i64,
}

/// Precedence rank of a storage retention level
///
/// Assigned by the storage collaborator, never inferred here: a greater rank
/// means higher precedence (finer resolution / more recent retention level)
/// when overlapping partials are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tier(pub u8);

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.0)
    }
}

/// One storage fetch result: a partial series together with its tier rank
#[derive(Debug, Clone)]
pub struct TierSeries {
    /// Precedence rank of the retention level this partial came from
    pub tier: Tier,
    /// The partial series
    pub series: Series,
}

impl TierSeries {
    /// Bundle a series with its tier rank
    pub fn new(tier: Tier, series: Series) -> Self {
        Self { tier, series }
    }
}

/// A node returned by the index find surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    /// Full dotted path of the node
    pub path: String,
    /// Whether the node is a leaf (has data) rather than a branch
    pub leaf: bool,
}

impl PathNode {
    /// Create a leaf node
    pub fn leaf(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            leaf: true,
        }
    }

    /// Create a branch node
    pub fn branch(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            leaf: false,
        }
    }
}

/// Cardinality summary for a pattern, as reported by the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStats {
    /// Total nodes the pattern matched
    pub total: usize,
    /// Leaf nodes among them
    pub leaves: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::new(0, 60).is_ok());
        assert!(TimeRange::new(60, 60).is_err());
        assert!(TimeRange::new(60, 0).is_err());
    }

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(100, 200).unwrap();
        assert!(range.contains(100));
        assert!(range.contains(199));
        assert!(!range.contains(200));
        assert!(!range.contains(99));
    }

    #[test]
    fn test_time_range_intersect() {
        let a = TimeRange::new(0, 100).unwrap();
        let b = TimeRange::new(50, 150).unwrap();
        let overlap = a.intersect(&b).unwrap();
        assert_eq!(overlap.start, 50);
        assert_eq!(overlap.end, 100);

        let c = TimeRange::new(100, 200).unwrap();
        assert!(a.intersect(&c).is_none());
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier(2) > Tier(1));
        assert_eq!(Tier(3).to_string(), "tier3");
    }
}
