//! Fulfillment state machine.

use serde::{Deserialize, Serialize};

/// Progress of a single payment event through the fulfillment pipeline.
///
/// State transitions:
/// ```text
/// ReceivedEvent ─┬─► SignatureVerified ─┬─► CartResolved ─┬─► OrderCreated ─► InventoryApplied
///                └─► SignatureInvalid   └─► CartMissing    └─► PartialFailure        │
///                                                                                    ▼
///                                            Done ◄─ [NotificationSent] ◄─ [CartCleared]
/// ```
///
/// Events that are ignored, duplicated or refer to an empty cart go straight
/// to `Done` from `SignatureVerified` or `CartResolved`.
///
/// `OrderCreated` and `InventoryApplied` are reached together when the
/// fulfillment transaction commits. `CartCleared` and `NotificationSent` are
/// skipped (but `Done` is still reached) when their best-effort step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FulfillmentState {
    /// The webhook request arrived.
    #[default]
    ReceivedEvent,

    /// The signature header matched the raw body.
    SignatureVerified,

    /// The cart named in the session metadata exists.
    CartResolved,

    /// The order and its items were written.
    OrderCreated,

    /// Stock was decremented for every purchased product.
    InventoryApplied,

    /// The cart's items were deleted.
    CartCleared,

    /// The confirmation email was accepted by the mail gateway.
    NotificationSent,

    /// Processing finished (terminal state).
    Done,

    /// The signature did not verify (terminal state).
    SignatureInvalid,

    /// The session referenced an unknown cart (terminal state).
    CartMissing,

    /// The fulfillment transaction was rolled back (terminal state).
    PartialFailure,
}

impl FulfillmentState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FulfillmentState::Done
                | FulfillmentState::SignatureInvalid
                | FulfillmentState::CartMissing
                | FulfillmentState::PartialFailure
        )
    }

    /// Returns true if this state ends processing without an order.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FulfillmentState::SignatureInvalid
                | FulfillmentState::CartMissing
                | FulfillmentState::PartialFailure
        )
    }

    /// Returns true if the pipeline may move from `self` to `next`.
    pub fn can_advance_to(&self, next: FulfillmentState) -> bool {
        use FulfillmentState::*;
        matches!(
            (self, next),
            (ReceivedEvent, SignatureVerified | SignatureInvalid)
                | (SignatureVerified, CartResolved | CartMissing | Done)
                | (CartResolved, OrderCreated | PartialFailure | Done)
                | (OrderCreated, InventoryApplied)
                | (InventoryApplied, CartCleared | NotificationSent | Done)
                | (CartCleared, NotificationSent | Done)
                | (NotificationSent, Done)
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentState::ReceivedEvent => "ReceivedEvent",
            FulfillmentState::SignatureVerified => "SignatureVerified",
            FulfillmentState::CartResolved => "CartResolved",
            FulfillmentState::OrderCreated => "OrderCreated",
            FulfillmentState::InventoryApplied => "InventoryApplied",
            FulfillmentState::CartCleared => "CartCleared",
            FulfillmentState::NotificationSent => "NotificationSent",
            FulfillmentState::Done => "Done",
            FulfillmentState::SignatureInvalid => "SignatureInvalid",
            FulfillmentState::CartMissing => "CartMissing",
            FulfillmentState::PartialFailure => "PartialFailure",
        }
    }
}

impl std::fmt::Display for FulfillmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_received() {
        assert_eq!(FulfillmentState::default(), FulfillmentState::ReceivedEvent);
    }

    #[test]
    fn test_happy_path_is_connected() {
        let path = [
            FulfillmentState::ReceivedEvent,
            FulfillmentState::SignatureVerified,
            FulfillmentState::CartResolved,
            FulfillmentState::OrderCreated,
            FulfillmentState::InventoryApplied,
            FulfillmentState::CartCleared,
            FulfillmentState::NotificationSent,
            FulfillmentState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_cannot_skip_commit() {
        assert!(!FulfillmentState::CartResolved.can_advance_to(FulfillmentState::CartCleared));
        assert!(!FulfillmentState::ReceivedEvent.can_advance_to(FulfillmentState::OrderCreated));
    }

    #[test]
    fn test_terminal_states_do_not_advance() {
        for state in [
            FulfillmentState::Done,
            FulfillmentState::SignatureInvalid,
            FulfillmentState::CartMissing,
            FulfillmentState::PartialFailure,
        ] {
            assert!(state.is_terminal());
            assert!(!state.can_advance_to(FulfillmentState::Done));
        }
    }

    #[test]
    fn test_failure_states() {
        assert!(FulfillmentState::CartMissing.is_failure());
        assert!(!FulfillmentState::Done.is_failure());
        assert!(!FulfillmentState::OrderCreated.is_failure());
    }

    #[test]
    fn test_serialization() {
        let state = FulfillmentState::InventoryApplied;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: FulfillmentState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
