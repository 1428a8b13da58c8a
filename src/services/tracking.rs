//! Delivery-stage derivation.
//!
//! The stage (0-4) and delay flag are derived from elapsed calendar time
//! and the terminal flags, recomputed opportunistically on every order
//! read. The order row is only written back when something changed.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::Order;

/// Fields the derivation reads.
#[derive(Debug, Clone)]
pub struct TrackingSnapshot {
    pub created_at: DateTime<Utc>,
    pub expected_delivery_date: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub is_canceled: bool,
    pub delivery_stage: i32,
    pub delay_message: bool,
}

/// New values for the derived fields, present only when they differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingUpdate {
    pub delivery_stage: i32,
    pub delay_message: bool,
}

/// Derive the stage and delay flag at `now`. Returns `None` when the
/// stored values are already correct.
///
/// Cancellation pins the stage to 0 and clears the delay flag. Otherwise
/// the creation day counts as day 1 and the stage advances monotonically:
/// delivered orders are stage 4, three or more days elapsed is stage 3,
/// exactly two days is stage 2, anything younger stays at stage 1.
pub fn derive_tracking(snapshot: &TrackingSnapshot, now: DateTime<Utc>) -> Option<TrackingUpdate> {
    if snapshot.is_canceled {
        let update = TrackingUpdate {
            delivery_stage: 0,
            delay_message: false,
        };
        if update.delivery_stage != snapshot.delivery_stage || snapshot.delay_message {
            return Some(update);
        }
        return None;
    }

    let days_passed = (now - snapshot.created_at).num_days() + 1;

    let desired_stage = if snapshot.is_delivered {
        4
    } else if days_passed >= 3 {
        3
    } else if days_passed == 2 {
        2
    } else {
        1
    };

    // Stages never regress; only an advance counts as a change.
    let delivery_stage = if snapshot.delivery_stage < desired_stage {
        desired_stage
    } else {
        snapshot.delivery_stage
    };

    let delay_message = match snapshot.expected_delivery_date {
        Some(expected) => !snapshot.is_delivered && now > expected,
        None => false,
    };

    if delivery_stage != snapshot.delivery_stage || delay_message != snapshot.delay_message {
        Some(TrackingUpdate {
            delivery_stage,
            delay_message,
        })
    } else {
        None
    }
}

impl From<&Order> for TrackingSnapshot {
    fn from(order: &Order) -> Self {
        Self {
            created_at: order.created_at,
            expected_delivery_date: order.expected_delivery_date,
            is_delivered: order.is_delivered,
            is_canceled: order.is_canceled,
            delivery_stage: order.delivery_stage,
            delay_message: order.delay_message,
        }
    }
}

/// Apply the derivation to an order and persist it when a field changed.
pub async fn sync_order_tracking(db: &PgPool, mut order: Order) -> Result<Order> {
    if let Some(update) = derive_tracking(&TrackingSnapshot::from(&order), Utc::now()) {
        sqlx::query(
            "UPDATE orders SET delivery_stage = $2, delay_message = $3, updated_at = NOW()
              WHERE id = $1",
        )
        .bind(order.id)
        .bind(update.delivery_stage)
        .bind(update.delay_message)
        .execute(db)
        .await?;

        order.delivery_stage = update.delivery_stage;
        order.delay_message = update.delay_message;
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(age_days: i64) -> TrackingSnapshot {
        TrackingSnapshot {
            created_at: Utc::now() - Duration::days(age_days),
            expected_delivery_date: None,
            is_delivered: false,
            is_canceled: false,
            delivery_stage: 1,
            delay_message: false,
        }
    }

    #[test]
    fn test_same_day_order_stays_at_stage_one() {
        assert_eq!(derive_tracking(&snapshot(0), Utc::now()), None);
    }

    #[test]
    fn test_two_day_order_advances_to_stage_two() {
        let update = derive_tracking(&snapshot(1), Utc::now()).unwrap();
        assert_eq!(update.delivery_stage, 2);
    }

    #[test]
    fn test_old_orders_reach_stage_three() {
        for age in [2, 3, 10, 100] {
            let update = derive_tracking(&snapshot(age), Utc::now()).unwrap();
            assert_eq!(update.delivery_stage, 3, "age {} days", age);
        }
    }

    #[test]
    fn test_delivered_order_is_stage_four_regardless_of_age() {
        let mut s = snapshot(0);
        s.is_delivered = true;
        let update = derive_tracking(&s, Utc::now()).unwrap();
        assert_eq!(update.delivery_stage, 4);
        assert!(!update.delay_message);
    }

    #[test]
    fn test_cancelled_order_pins_stage_zero() {
        let mut s = snapshot(30);
        s.is_canceled = true;
        s.delivery_stage = 3;
        s.delay_message = true;

        let update = derive_tracking(&s, Utc::now()).unwrap();
        assert_eq!(update.delivery_stage, 0);
        assert!(!update.delay_message);

        // Already reset: nothing to persist.
        s.delivery_stage = 0;
        s.delay_message = false;
        assert_eq!(derive_tracking(&s, Utc::now()), None);
    }

    #[test]
    fn test_stage_never_regresses() {
        let mut s = snapshot(0);
        s.delivery_stage = 3;
        assert_eq!(derive_tracking(&s, Utc::now()), None);
    }

    #[test]
    fn test_delay_flag_set_past_expected_date() {
        let mut s = snapshot(6);
        s.delivery_stage = 3;
        s.expected_delivery_date = Some(Utc::now() - Duration::days(1));

        let update = derive_tracking(&s, Utc::now()).unwrap();
        assert!(update.delay_message);
        assert_eq!(update.delivery_stage, 3);
    }

    #[test]
    fn test_delay_flag_cleared_once_delivered() {
        let mut s = snapshot(6);
        s.is_delivered = true;
        s.delivery_stage = 4;
        s.delay_message = true;
        s.expected_delivery_date = Some(Utc::now() - Duration::days(1));

        let update = derive_tracking(&s, Utc::now()).unwrap();
        assert!(!update.delay_message);
    }

    #[test]
    fn test_no_redundant_write_when_unchanged() {
        let mut s = snapshot(6);
        s.delivery_stage = 3;
        s.expected_delivery_date = Some(Utc::now() + Duration::days(1));
        assert_eq!(derive_tracking(&s, Utc::now()), None);
    }
}
