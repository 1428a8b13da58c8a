//! Price-breakdown and cart-merge invariants.

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use storefront_api::handlers::orders::{FREE_SHIPPING_THRESHOLD, SHIPPING_FEE, price_breakdown};
use storefront_api::models::OrderItem;
use storefront_api::models::cart::{CartItem, merge_items};

fn item(price: i64, qty: i32) -> OrderItem {
    OrderItem {
        name: "item".to_string(),
        image: String::new(),
        price: Decimal::from(price),
        qty,
        product_id: Uuid::new_v4(),
    }
}

#[test]
fn single_unit_above_threshold_ships_free() {
    // 1 × ₹600: above the free-shipping threshold.
    let (items_price, shipping_price, total_price) = price_breakdown(&[item(600, 1)]);
    assert_eq!(items_price, Decimal::from(600));
    assert_eq!(shipping_price, Decimal::ZERO);
    assert_eq!(total_price, Decimal::from(600));
}

#[test]
fn single_unit_below_threshold_pays_flat_fee() {
    // 1 × ₹200: flat ₹29 fee applies.
    let (items_price, shipping_price, total_price) = price_breakdown(&[item(200, 1)]);
    assert_eq!(items_price, Decimal::from(200));
    assert_eq!(shipping_price, Decimal::from(SHIPPING_FEE));
    assert_eq!(total_price, Decimal::from(229));
}

#[test]
fn mixed_basket_total_is_sum_of_lines_plus_shipping() {
    let basket = vec![item(120, 2), item(80, 3)];
    let (items_price, shipping_price, total_price) = price_breakdown(&basket);
    assert_eq!(items_price, Decimal::from(480));
    assert_eq!(shipping_price, Decimal::from(SHIPPING_FEE));
    assert_eq!(total_price, Decimal::from(509));
}

proptest! {
    #[test]
    fn total_always_equals_items_plus_shipping(
        lines in prop::collection::vec((1i64..5_000, 1i32..10), 1..8)
    ) {
        let basket: Vec<OrderItem> = lines.iter().map(|(p, q)| item(*p, *q)).collect();
        let (items_price, shipping_price, total_price) = price_breakdown(&basket);

        prop_assert_eq!(total_price, items_price + shipping_price);

        let expected_items: Decimal = basket
            .iter()
            .map(|i| i.price * Decimal::from(i.qty))
            .sum();
        prop_assert_eq!(items_price, expected_items);
    }

    #[test]
    fn shipping_is_free_exactly_at_or_above_threshold(
        price in 1i64..2_000
    ) {
        let (_, shipping_price, _) = price_breakdown(&[item(price, 1)]);
        if price >= FREE_SHIPPING_THRESHOLD {
            prop_assert_eq!(shipping_price, Decimal::ZERO);
        } else {
            prop_assert_eq!(shipping_price, Decimal::from(SHIPPING_FEE));
        }
    }

    #[test]
    fn cart_merge_preserves_total_quantity_per_product(
        quantities in prop::collection::vec(1i32..20, 1..12)
    ) {
        // Two products interleaved across many raw lines.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw: Vec<CartItem> = quantities
            .iter()
            .enumerate()
            .map(|(idx, q)| CartItem {
                product_id: if idx % 2 == 0 { a } else { b },
                qty: *q,
            })
            .collect();

        let expected_a: i32 = raw.iter().filter(|i| i.product_id == a).map(|i| i.qty).sum();
        let expected_b: i32 = raw.iter().filter(|i| i.product_id == b).map(|i| i.qty).sum();

        let merged = merge_items(raw);

        prop_assert!(merged.len() <= 2);
        let merged_a: i32 = merged.iter().filter(|i| i.product_id == a).map(|i| i.qty).sum();
        let merged_b: i32 = merged.iter().filter(|i| i.product_id == b).map(|i| i.qty).sum();
        prop_assert_eq!(merged_a, expected_a);
        prop_assert_eq!(merged_b, expected_b);

        // No duplicates survive a merge.
        let mut ids: Vec<Uuid> = merged.iter().map(|i| i.product_id).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), merged.len());
    }
}
