//! Order state machine.
//!
//! Every trigger has exactly one source status and one target status. Firing a
//! trigger whose target equals the current status is a no-op; firing it from
//! any other status is rejected and leaves the order untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Order, OrderStatus, PaymentStatus};

/// Named events that move an order between statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderTrigger {
    /// Customer started checkout.
    SubmitForPayment,
    /// Payment provider confirmed the charge.
    PaymentConfirmed,
    /// Lyric generation started.
    GenerationStarted,
    /// Both lyric drafts were persisted.
    LyricsGenerated,
    /// Customer approved one of the drafts.
    LyricApproved,
    /// Audio production picked up the track.
    ProductionStarted,
    /// Audio production finished.
    ProductionCompleted,
    /// Song delivered to the customer.
    Delivered,
}

impl OrderTrigger {
    pub const ALL: [OrderTrigger; 8] = [
        OrderTrigger::SubmitForPayment,
        OrderTrigger::PaymentConfirmed,
        OrderTrigger::GenerationStarted,
        OrderTrigger::LyricsGenerated,
        OrderTrigger::LyricApproved,
        OrderTrigger::ProductionStarted,
        OrderTrigger::ProductionCompleted,
        OrderTrigger::Delivered,
    ];

    /// The only status this trigger may fire from.
    pub fn source(&self) -> OrderStatus {
        match self {
            OrderTrigger::SubmitForPayment => OrderStatus::Draft,
            OrderTrigger::PaymentConfirmed => OrderStatus::AwaitingPayment,
            OrderTrigger::GenerationStarted => OrderStatus::Paid,
            OrderTrigger::LyricsGenerated => OrderStatus::LyricsPending,
            OrderTrigger::LyricApproved => OrderStatus::LyricsGenerated,
            OrderTrigger::ProductionStarted => OrderStatus::Approved,
            OrderTrigger::ProductionCompleted => OrderStatus::MusicGenerating,
            OrderTrigger::Delivered => OrderStatus::MusicReady,
        }
    }

    /// The status this trigger moves the order into.
    pub fn target(&self) -> OrderStatus {
        match self {
            OrderTrigger::SubmitForPayment => OrderStatus::AwaitingPayment,
            OrderTrigger::PaymentConfirmed => OrderStatus::Paid,
            OrderTrigger::GenerationStarted => OrderStatus::LyricsPending,
            OrderTrigger::LyricsGenerated => OrderStatus::LyricsGenerated,
            OrderTrigger::LyricApproved => OrderStatus::Approved,
            OrderTrigger::ProductionStarted => OrderStatus::MusicGenerating,
            OrderTrigger::ProductionCompleted => OrderStatus::MusicReady,
            OrderTrigger::Delivered => OrderStatus::Completed,
        }
    }

    /// Find the trigger that leads into `status` (used by external events that
    /// carry a target status rather than a trigger name).
    pub fn for_target(status: OrderStatus) -> Option<OrderTrigger> {
        OrderTrigger::ALL
            .iter()
            .copied()
            .find(|trigger| trigger.target() == status)
    }

    /// Whether the trigger may be delivered from outside the service.
    ///
    /// `GenerationStarted`, `LyricsGenerated` and `LyricApproved` only fire
    /// together with the lyric and track writes they describe.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            OrderTrigger::SubmitForPayment
                | OrderTrigger::PaymentConfirmed
                | OrderTrigger::ProductionStarted
                | OrderTrigger::ProductionCompleted
                | OrderTrigger::Delivered
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderTrigger::SubmitForPayment => "submit_for_payment",
            OrderTrigger::PaymentConfirmed => "payment_confirmed",
            OrderTrigger::GenerationStarted => "generation_started",
            OrderTrigger::LyricsGenerated => "lyrics_generated",
            OrderTrigger::LyricApproved => "lyric_approved",
            OrderTrigger::ProductionStarted => "production_started",
            OrderTrigger::ProductionCompleted => "production_completed",
            OrderTrigger::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The order already was in the trigger's target status.
    Unchanged(OrderStatus),
    /// The order moved from one status to another.
    Changed { from: OrderStatus, to: OrderStatus },
}

impl Transition {
    pub fn is_changed(&self) -> bool {
        matches!(self, Transition::Changed { .. })
    }

    /// Status before the trigger fired.
    pub fn from(&self) -> OrderStatus {
        match self {
            Transition::Unchanged(status) => *status,
            Transition::Changed { from, .. } => *from,
        }
    }

    /// Status after the trigger fired.
    pub fn to(&self) -> OrderStatus {
        match self {
            Transition::Unchanged(status) => *status,
            Transition::Changed { to, .. } => *to,
        }
    }
}

impl OrderStatus {
    /// Compute the outcome of firing `trigger` from this status.
    ///
    /// Returns `None` when the trigger's precondition does not hold.
    pub fn apply(self, trigger: OrderTrigger) -> Option<Transition> {
        if self == trigger.target() {
            return Some(Transition::Unchanged(self));
        }
        if self == trigger.source() {
            return Some(Transition::Changed {
                from: self,
                to: trigger.target(),
            });
        }
        None
    }
}

impl Order {
    /// Apply a trigger in place, updating status-dependent fields.
    ///
    /// Returns `None` (and leaves the order unchanged) when the trigger is not
    /// allowed from the current status.
    pub fn apply_trigger(&mut self, trigger: OrderTrigger, now: DateTime<Utc>) -> Option<Transition> {
        let transition = self.status.apply(trigger)?;
        if let Transition::Changed { to, .. } = transition {
            self.status = to;
            if trigger == OrderTrigger::PaymentConfirmed {
                self.payment_status = PaymentStatus::Paid;
            }
            self.updated_at = now;
        }
        Some(transition)
    }
}
