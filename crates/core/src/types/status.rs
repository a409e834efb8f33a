//! Order lifecycle: statuses, transitions and retrieval flows.
//!
//! ```text
//!   handover:     expected ──verify──▶ verified ──collect──▶ collected
//!   single_step:  expected ──retrieve──▶ retrieved
//! ```
//!
//! Stores apply a [`Transition`] as one conditional write whose predicate
//! includes [`Transition::requires`]; nothing in this module performs I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "parcel.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Registered by the owner, parcel not yet claimed.
    #[default]
    Expected,
    /// Owner proved ownership with the one-time code; waiting at the desk.
    Verified,
    /// Handed over by security.
    Collected,
    /// Claimed by the owner in the single-step flow.
    Retrieved,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Expected,
        Self::Verified,
        Self::Collected,
        Self::Retrieved,
    ];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expected => "expected",
            Self::Verified => "verified",
            Self::Collected => "collected",
            Self::Retrieved => "retrieved",
        }
    }

    /// Whether no transition leaves this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Collected | Self::Retrieved)
    }

    /// Whether `next` is reachable from `self` in exactly one step.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        Transition::ALL
            .iter()
            .any(|t| t.requires() == self && t.produces() == next)
    }

    /// Apply a transition, returning the new status.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if the order is not in the status the
    /// transition requires.
    pub fn apply(self, transition: Transition) -> Result<Self, IllegalTransition> {
        if self == transition.requires() {
            Ok(transition.produces())
        } else {
            Err(IllegalTransition {
                from: self,
                transition,
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expected" => Ok(Self::Expected),
            "verified" => Ok(Self::Verified),
            "collected" => Ok(Self::Collected),
            "retrieved" => Ok(Self::Retrieved),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// A status change an actor can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Owner presents the one-time code: expected → verified.
    Verify,
    /// Owner presents the tracking id: expected → retrieved.
    Retrieve,
    /// Security hands the parcel over: verified → collected.
    Collect,
}

impl Transition {
    /// Every legal transition.
    pub const ALL: [Self; 3] = [Self::Verify, Self::Retrieve, Self::Collect];

    /// Status the order must currently have.
    #[must_use]
    pub const fn requires(self) -> OrderStatus {
        match self {
            Self::Verify | Self::Retrieve => OrderStatus::Expected,
            Self::Collect => OrderStatus::Verified,
        }
    }

    /// Status the order has afterwards.
    #[must_use]
    pub const fn produces(self) -> OrderStatus {
        match self {
            Self::Verify => OrderStatus::Verified,
            Self::Retrieve => OrderStatus::Retrieved,
            Self::Collect => OrderStatus::Collected,
        }
    }

    /// Timestamp column written together with the status.
    #[must_use]
    pub const fn stamp_column(self) -> &'static str {
        match self {
            Self::Verify => "verified_at",
            Self::Retrieve => "retrieved_at",
            Self::Collect => "collected_at",
        }
    }
}

/// Attempted transition from a status that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {transition:?} an order that is {from}")]
pub struct IllegalTransition {
    /// Status the order was in.
    pub from: OrderStatus,
    /// Transition that was attempted.
    pub transition: Transition,
}

/// How owners claim their parcels in a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalFlow {
    /// One-time code verification followed by a security handover.
    #[default]
    Handover,
    /// Tracking-id retrieval with no security step.
    SingleStep,
}

impl RetrievalFlow {
    /// Transition the owner triggers on `/orders/retrieve`.
    #[must_use]
    pub const fn owner_transition(self) -> Transition {
        match self {
            Self::Handover => Transition::Verify,
            Self::SingleStep => Transition::Retrieve,
        }
    }

    /// Status at which the owner's wait is over.
    #[must_use]
    pub const fn terminal_status(self) -> OrderStatus {
        match self {
            Self::Handover => OrderStatus::Collected,
            Self::SingleStep => OrderStatus::Retrieved,
        }
    }

    /// Whether orders carry a one-time code.
    #[must_use]
    pub const fn issues_otp(self) -> bool {
        matches!(self, Self::Handover)
    }
}

impl std::fmt::Display for RetrievalFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handover => f.write_str("handover"),
            Self::SingleStep => f.write_str("single_step"),
        }
    }
}

impl std::str::FromStr for RetrievalFlow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "handover" => Ok(Self::Handover),
            "single_step" => Ok(Self::SingleStep),
            _ => Err(format!(
                "invalid retrieval flow: {s} (expected handover or single_step)"
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_documented_edges_exist() {
        let allowed = [
            (OrderStatus::Expected, OrderStatus::Verified),
            (OrderStatus::Verified, OrderStatus::Collected),
            (OrderStatus::Expected, OrderStatus::Retrieved),
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_no_skipping_from_expected_to_collected() {
        let err = OrderStatus::Expected.apply(Transition::Collect).unwrap_err();
        assert_eq!(err.from, OrderStatus::Expected);
        assert_eq!(err.transition, Transition::Collect);
    }

    #[test]
    fn test_terminal_statuses_reject_everything() {
        for status in [OrderStatus::Collected, OrderStatus::Retrieved] {
            assert!(status.is_terminal());
            for transition in Transition::ALL {
                assert!(status.apply(transition).is_err());
            }
        }
    }

    #[test]
    fn test_verified_cannot_be_verified_again() {
        assert!(OrderStatus::Verified.apply(Transition::Verify).is_err());
        assert!(OrderStatus::Verified.apply(Transition::Retrieve).is_err());
    }

    #[test]
    fn test_handover_path() {
        let verified = OrderStatus::Expected.apply(Transition::Verify).unwrap();
        let collected = verified.apply(Transition::Collect).unwrap();
        assert_eq!(collected, OrderStatus::Collected);
    }

    #[test]
    fn test_flow_selects_owner_transition() {
        assert_eq!(
            RetrievalFlow::Handover.owner_transition(),
            Transition::Verify
        );
        assert_eq!(
            RetrievalFlow::SingleStep.owner_transition(),
            Transition::Retrieve
        );
        assert!(RetrievalFlow::Handover.issues_otp());
        assert!(!RetrievalFlow::SingleStep.issues_otp());
    }

    #[test]
    fn test_flow_parse() {
        assert_eq!(
            "single_step".parse::<RetrievalFlow>().unwrap(),
            RetrievalFlow::SingleStep
        );
        assert!("otp".parse::<RetrievalFlow>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Collected).unwrap();
        assert_eq!(json, "\"collected\"");
    }
}
