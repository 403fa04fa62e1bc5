//! Which status changes the lifecycle controller accepts.

use std::str::FromStr;

use common::{OrderStatus, ParseStatusError};

use crate::error::{CafeError, Result};

/// How strictly status changes follow the order state machine.
///
/// ```text
/// pending ──► confirmed ──► completed
///    │            │
///    └────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionPolicy {
    /// Only the edges drawn above.
    #[default]
    Strict,

    /// Any known status from any status.
    Permissive,
}

impl TransitionPolicy {
    pub fn allows(&self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => matches!(
                (from, to),
                (OrderStatus::Pending, OrderStatus::Confirmed)
                    | (OrderStatus::Confirmed, OrderStatus::Completed)
                    | (
                        OrderStatus::Pending | OrderStatus::Confirmed,
                        OrderStatus::Cancelled
                    )
            ),
        }
    }

    pub fn check(&self, from: OrderStatus, to: OrderStatus) -> Result<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(CafeError::InvalidTransition { from, to })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionPolicy::Strict => "strict",
            TransitionPolicy::Permissive => "permissive",
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(TransitionPolicy::Strict),
            "permissive" => Ok(TransitionPolicy::Permissive),
            _ => Err(ParseStatusError {
                kind: "transition policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Points are earned only when an order enters `completed`.
pub fn earns_points(from: OrderStatus, to: OrderStatus) -> bool {
    to == OrderStatus::Completed && from != OrderStatus::Completed
}

/// Parses a submitted status, listing the valid ones on failure.
pub fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse().map_err(|_| {
        let valid: Vec<&str> = OrderStatus::ALL.iter().map(OrderStatus::as_str).collect();
        CafeError::Validation(format!(
            "Invalid status. Must be one of: {}",
            valid.join(", ")
        ))
    })
}

pub fn default_remarks(status: OrderStatus) -> String {
    format!("Status updated to {status}")
}
