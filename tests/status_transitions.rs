use mobitrade_api::status::{OrderStatus, PaymentStatus};

#[test]
fn operator_transitions_are_legal() {
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
    assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Approved));
    assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Rejected));
    assert!(OrderStatus::Approved.can_transition_to(OrderStatus::Shipped));
    assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
}

#[test]
fn skipping_ahead_is_rejected() {
    // A pending order cannot jump straight to shipped.
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Approved));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
    assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
}

#[test]
fn moving_backward_is_rejected() {
    assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
    assert!(!OrderStatus::Approved.can_transition_to(OrderStatus::Paid));
    assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Approved));
    assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
}

#[test]
fn rejected_and_delivered_are_terminal() {
    assert!(OrderStatus::Rejected.is_terminal());
    assert!(OrderStatus::Delivered.is_terminal());
    assert!(OrderStatus::Rejected.successors().is_empty());
    assert!(OrderStatus::Delivered.successors().is_empty());

    for status in OrderStatus::ALL {
        assert!(!OrderStatus::Rejected.can_transition_to(status));
        assert!(!OrderStatus::Delivered.can_transition_to(status));
    }
}

#[test]
fn no_status_transitions_to_itself() {
    for status in OrderStatus::ALL {
        assert!(!status.can_transition_to(status), "{status} loops");
    }
}

#[test]
fn parse_round_trips_every_status() {
    for status in OrderStatus::ALL {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
}

#[test]
fn parse_rejects_unknown_and_lowercase_values() {
    assert_eq!(OrderStatus::parse("COMPLETED"), None);
    assert_eq!(OrderStatus::parse("paid"), None);
    assert_eq!(OrderStatus::parse(""), None);
}

#[test]
fn payment_status_strings() {
    assert_eq!(PaymentStatus::Pending.as_str(), "pending");
    assert_eq!(PaymentStatus::Paid.as_str(), "paid");
    assert_eq!(PaymentStatus::Failed.as_str(), "failed");
    assert_eq!(PaymentStatus::Expired.as_str(), "expired");
}
