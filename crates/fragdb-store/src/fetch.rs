//! Depth policy for descendant materialization.

use std::fmt;
use std::str::FromStr;

use crate::StoreError;

/// How many levels of descendants to fetch and emit below a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchDescendants {
    /// A fixed number of levels; `Levels(0)` omits descendants.
    Levels(u32),
    /// Every descendant, however deep.
    All,
}

impl FetchDescendants {
    pub const OMIT: FetchDescendants = FetchDescendants::Levels(0);
    pub const DIRECT: FetchDescendants = FetchDescendants::Levels(1);

    /// True when at least one more level may be descended into.
    pub fn has_next(self) -> bool {
        match self {
            FetchDescendants::All => true,
            FetchDescendants::Levels(n) => n > 0,
        }
    }

    /// The policy one level shallower, or `None` when no level remains.
    pub fn next_level(self) -> Option<FetchDescendants> {
        match self {
            FetchDescendants::All => Some(FetchDescendants::All),
            FetchDescendants::Levels(0) => None,
            FetchDescendants::Levels(n) => Some(FetchDescendants::Levels(n - 1)),
        }
    }

    /// Maximum depth, `None` when unbounded.
    pub fn depth(self) -> Option<u32> {
        match self {
            FetchDescendants::All => None,
            FetchDescendants::Levels(n) => Some(n),
        }
    }
}

impl Default for FetchDescendants {
    fn default() -> Self {
        FetchDescendants::OMIT
    }
}

impl FromStr for FetchDescendants {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" | "0" => Ok(FetchDescendants::OMIT),
            "all" | "-1" => Ok(FetchDescendants::All),
            "direct" | "1" => Ok(FetchDescendants::DIRECT),
            digits if digits.bytes().all(|b| b.is_ascii_digit()) => digits
                .parse::<u32>()
                .map(FetchDescendants::Levels)
                .map_err(|_| StoreError::InvalidFetchDescendants(s.to_string())),
            _ => Err(StoreError::InvalidFetchDescendants(s.to_string())),
        }
    }
}

impl fmt::Display for FetchDescendants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchDescendants::All => write!(f, "IncludeAllDescendants"),
            FetchDescendants::Levels(0) => write!(f, "OmitDescendants"),
            FetchDescendants::Levels(1) => write!(f, "DirectChildrenOnly"),
            FetchDescendants::Levels(n) => write!(f, "Depth={n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_options() {
        assert_eq!("".parse::<FetchDescendants>().unwrap(), FetchDescendants::OMIT);
        assert_eq!("none".parse::<FetchDescendants>().unwrap(), FetchDescendants::OMIT);
        assert_eq!("all".parse::<FetchDescendants>().unwrap(), FetchDescendants::All);
        assert_eq!("-1".parse::<FetchDescendants>().unwrap(), FetchDescendants::All);
        assert_eq!("direct".parse::<FetchDescendants>().unwrap(), FetchDescendants::DIRECT);
        assert_eq!("7".parse::<FetchDescendants>().unwrap(), FetchDescendants::Levels(7));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["-2", "ALL", "1.5", "some", "99999999999"] {
            let err = bad.parse::<FetchDescendants>().unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidFetchDescendants(ref s) if s == bad),
                "unexpected error for {bad}: {err}"
            );
        }
    }

    #[test]
    fn test_next_level_walks_down_to_none() {
        let mut fetch = FetchDescendants::Levels(2);
        assert!(fetch.has_next());
        fetch = fetch.next_level().unwrap();
        assert_eq!(fetch, FetchDescendants::DIRECT);
        fetch = fetch.next_level().unwrap();
        assert_eq!(fetch, FetchDescendants::OMIT);
        assert!(!fetch.has_next());
        assert_eq!(fetch.next_level(), None);
    }

    #[test]
    fn test_all_never_runs_out() {
        let fetch = FetchDescendants::All;
        assert!(fetch.has_next());
        assert_eq!(fetch.next_level(), Some(FetchDescendants::All));
        assert_eq!(fetch.depth(), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(FetchDescendants::OMIT.to_string(), "OmitDescendants");
        assert_eq!(FetchDescendants::DIRECT.to_string(), "DirectChildrenOnly");
        assert_eq!(FetchDescendants::All.to_string(), "IncludeAllDescendants");
        assert_eq!(FetchDescendants::Levels(3).to_string(), "Depth=3");
    }
}
