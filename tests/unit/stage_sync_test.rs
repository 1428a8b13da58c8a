//! Stage derivation table from the tracking rules.

use chrono::{Duration, Utc};

use storefront_api::services::tracking::{TrackingSnapshot, derive_tracking};

fn base(age_days: i64) -> TrackingSnapshot {
    TrackingSnapshot {
        created_at: Utc::now() - Duration::days(age_days),
        expected_delivery_date: Some(Utc::now() + Duration::days(5 - age_days)),
        is_delivered: false,
        is_canceled: false,
        delivery_stage: 1,
        delay_message: false,
    }
}

fn stage_for(snapshot: &TrackingSnapshot) -> i32 {
    derive_tracking(snapshot, Utc::now())
        .map(|u| u.delivery_stage)
        .unwrap_or(snapshot.delivery_stage)
}

#[test]
fn creation_day_counts_as_day_one() {
    assert_eq!(stage_for(&base(0)), 1);
}

#[test]
fn second_day_is_stage_two() {
    assert_eq!(stage_for(&base(1)), 2);
}

#[test]
fn three_or_more_days_is_stage_three() {
    for age in [2, 3, 7, 30] {
        assert_eq!(stage_for(&base(age)), 3, "order {} days old", age);
    }
}

#[test]
fn delivered_is_stage_four_regardless_of_age() {
    for age in [0, 1, 10] {
        let mut s = base(age);
        s.is_delivered = true;
        assert_eq!(stage_for(&s), 4, "order {} days old", age);
    }
}

#[test]
fn cancelled_is_stage_zero_regardless_of_age() {
    for age in [0, 2, 30] {
        let mut s = base(age);
        s.is_canceled = true;
        s.delivery_stage = 3;
        assert_eq!(stage_for(&s), 0, "order {} days old", age);
    }
}

#[test]
fn stage_is_monotonic_under_repeated_derivation() {
    let mut s = base(5);
    let mut last = s.delivery_stage;

    for _ in 0..4 {
        let stage = stage_for(&s);
        assert!(stage >= last);
        s.delivery_stage = stage;
        last = stage;
    }
}

#[test]
fn overdue_undelivered_order_is_flagged_delayed() {
    let mut s = base(6);
    s.delivery_stage = 3;
    s.expected_delivery_date = Some(Utc::now() - Duration::days(1));

    let update = derive_tracking(&s, Utc::now()).unwrap();
    assert!(update.delay_message);
}

#[test]
fn delay_is_cleared_on_cancellation() {
    let mut s = base(6);
    s.is_canceled = true;
    s.delay_message = true;
    s.expected_delivery_date = Some(Utc::now() - Duration::days(1));

    let update = derive_tracking(&s, Utc::now()).unwrap();
    assert!(!update.delay_message);
    assert_eq!(update.delivery_stage, 0);
}

#[test]
fn unchanged_orders_produce_no_write() {
    let mut s = base(0);
    s.expected_delivery_date = Some(Utc::now() + Duration::days(5));
    assert!(derive_tracking(&s, Utc::now()).is_none());
}
