use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Lifecycle of a raw interest signal. Collectors create signals as `raw`
/// (or `analyzed` once pre-processed); the pipeline only ever advances them
/// to `dismissed` (merged into another signal) or `evaluated` (consumed by
/// an opportunity decision). Signals are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Raw,
    Analyzed,
    Dismissed,
    Evaluated,
}

impl SignalStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SignalStatus::Raw => "raw",
            SignalStatus::Analyzed => "analyzed",
            SignalStatus::Dismissed => "dismissed",
            SignalStatus::Evaluated => "evaluated",
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "raw" => Ok(SignalStatus::Raw),
            "analyzed" => Ok(SignalStatus::Analyzed),
            "dismissed" => Ok(SignalStatus::Dismissed),
            "evaluated" => Ok(SignalStatus::Evaluated),
            other => Err(CoreError::InvalidEnum {
                kind: "signal status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    Evaluated,
    Rejected,
    Approved,
}

impl OpportunityStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OpportunityStatus::Evaluated => "evaluated",
            OpportunityStatus::Rejected => "rejected",
            OpportunityStatus::Approved => "approved",
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "evaluated" => Ok(OpportunityStatus::Evaluated),
            "rejected" => Ok(OpportunityStatus::Rejected),
            "approved" => Ok(OpportunityStatus::Approved),
            other => Err(CoreError::InvalidEnum {
                kind: "opportunity status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Demand-window classification for an opportunity, derived from the
/// assessed number of days remaining before the moment passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Upcoming,
    Open,
    Closing,
    Closed,
}

impl WindowStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WindowStatus::Upcoming => "upcoming",
            WindowStatus::Open => "open",
            WindowStatus::Closing => "closing",
            WindowStatus::Closed => "closed",
        }
    }

    /// Classify from days remaining: three or fewer days means the window is
    /// closing, more than thirty means it has not opened yet, anything in
    /// between is open. Negative values are already closed.
    #[must_use]
    pub fn from_days_remaining(days: i64) -> Self {
        if days < 0 {
            WindowStatus::Closed
        } else if days <= 3 {
            WindowStatus::Closing
        } else if days > 30 {
            WindowStatus::Upcoming
        } else {
            WindowStatus::Open
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "upcoming" => Ok(WindowStatus::Upcoming),
            "open" => Ok(WindowStatus::Open),
            "closing" => Ok(WindowStatus::Closing),
            "closed" => Ok(WindowStatus::Closed),
            other => Err(CoreError::InvalidEnum {
                kind: "window status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a derived product concept: created as `derived`, advanced to
/// `validated` by the keyword gate or killed to `rejected` by either gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStatus {
    Derived,
    Validated,
    Rejected,
}

impl DerivedStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DerivedStatus::Derived => "derived",
            DerivedStatus::Validated => "validated",
            DerivedStatus::Rejected => "rejected",
        }
    }

    /// Parse the canonical storage string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEnum` for anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "derived" => Ok(DerivedStatus::Derived),
            "validated" => Ok(DerivedStatus::Validated),
            "rejected" => Ok(DerivedStatus::Rejected),
            other => Err(CoreError::InvalidEnum {
                kind: "derived product status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_status_roundtrip() {
        for s in [
            SignalStatus::Raw,
            SignalStatus::Analyzed,
            SignalStatus::Dismissed,
            SignalStatus::Evaluated,
        ] {
            assert_eq!(SignalStatus::parse(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn signal_status_rejects_unknown() {
        let err = SignalStatus::parse("archived").unwrap_err();
        assert!(err.to_string().contains("signal status"));
    }

    #[test]
    fn window_from_days_closing_at_three_or_less() {
        assert_eq!(WindowStatus::from_days_remaining(0), WindowStatus::Closing);
        assert_eq!(WindowStatus::from_days_remaining(3), WindowStatus::Closing);
    }

    #[test]
    fn window_from_days_open_between_four_and_thirty() {
        assert_eq!(WindowStatus::from_days_remaining(4), WindowStatus::Open);
        assert_eq!(WindowStatus::from_days_remaining(30), WindowStatus::Open);
    }

    #[test]
    fn window_from_days_upcoming_above_thirty() {
        assert_eq!(WindowStatus::from_days_remaining(31), WindowStatus::Upcoming);
        assert_eq!(WindowStatus::from_days_remaining(365), WindowStatus::Upcoming);
    }

    #[test]
    fn window_from_days_negative_is_closed() {
        assert_eq!(WindowStatus::from_days_remaining(-1), WindowStatus::Closed);
    }

    #[test]
    fn statuses_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&OpportunityStatus::Evaluated).unwrap(),
            "\"evaluated\""
        );
        assert_eq!(
            serde_json::to_string(&DerivedStatus::Validated).unwrap(),
            "\"validated\""
        );
        assert_eq!(
            serde_json::to_string(&WindowStatus::Upcoming).unwrap(),
            "\"upcoming\""
        );
    }
}
