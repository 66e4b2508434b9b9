//! POS order state vocabulary
//!
//! Clover reports order state as a lowercase label. The mapping is total
//! and case-sensitive: anything outside the known vocabulary maps to `None`
//! so new vendor states degrade to a logged no-op instead of a wrong guess.

use shared::models::OrderStatus;

/// Map a POS state label to the internal order status.
pub fn map_order_state(state: &str) -> Option<OrderStatus> {
    match state {
        "open" => Some(OrderStatus::Received),
        "in_progress" => Some(OrderStatus::InProgress),
        "ready" => Some(OrderStatus::Ready),
        "completed" => Some(OrderStatus::Delivered),
        "voided" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

/// Inverse mapping, used when pushing local orders to the POS.
pub fn order_state_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Received => "open",
        OrderStatus::InProgress => "in_progress",
        OrderStatus::Ready => "ready",
        OrderStatus::Delivered => "completed",
        OrderStatus::Cancelled => "voided",
    }
}
