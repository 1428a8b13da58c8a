//! HTML email templates.
//!
//! Every template is a pure function of the configured [`ThemeConfig`]
//! and the payload it renders; there is no shared template state.

use uuid::Uuid;

use crate::config::ThemeConfig;
use crate::models::Order;

/// Rendered subject + HTML body pair.
#[derive(Debug, Clone)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Short human-facing order reference (last six hex chars, uppercased).
pub fn order_ref(id: Uuid) -> String {
    let simple = id.simple().to_string();
    simple[simple.len() - 6..].to_uppercase()
}

fn shell(theme: &ThemeConfig, heading_color: &str, heading: &str, inner: &str) -> String {
    format!(
        r#"<div style="font-family:'Segoe UI',Roboto,Arial,sans-serif;color:#333;background:#f6f9fc;padding:30px">
  <div style="max-width:600px;margin:auto;background:#fff;border-radius:8px;box-shadow:0 2px 8px rgba(0,0,0,0.08);padding:25px">
    <h1 style="margin:0 0 20px;font-size:24px;color:{brand_color};text-align:center">{brand}</h1>
    <h2 style="color:{heading_color};text-align:center">{heading}</h2>
    {inner}
    <hr style="border:none;border-top:1px solid #ddd" />
    <p style="font-size:13px;color:#666;">Thank you for shopping with <b>{brand}</b>!</p>
  </div>
</div>"#,
        brand = theme.brand_name,
        brand_color = theme.brand_color,
        heading_color = heading_color,
        heading = heading,
        inner = inner,
    )
}

fn item_rows(order: &Order) -> String {
    order
        .items
        .iter()
        .map(|item| {
            format!(
                "<li>{} × {} — ₹{}</li>",
                item.name,
                item.qty,
                item.price * rust_decimal::Decimal::from(item.qty)
            )
        })
        .collect()
}

fn otp_block(theme: &ThemeConfig, code: &str) -> String {
    format!(
        r#"<p style="text-align:center">
      <span style="display:inline-block;background:{color};color:#fff;font-size:28px;letter-spacing:8px;padding:12px 24px;border-radius:8px;font-weight:700">{code}</span>
    </p>
    <p style="color:#666;font-size:14px;text-align:center">This code expires in 5 minutes. If you didn't request it, you can safely ignore this email.</p>"#,
        color = theme.brand_color,
        code = code,
    )
}

pub fn verify_otp_email(theme: &ThemeConfig, name: &str, code: &str) -> EmailContent {
    let inner = format!(
        "<p>Hi <b>{}</b>,</p>\n<p>Use the code below to verify your email and finish creating your {} account.</p>\n{}",
        name,
        theme.brand_name,
        otp_block(theme, code),
    );

    EmailContent {
        subject: format!("Your {} verification code", theme.brand_name),
        html: shell(theme, &theme.brand_color, "Verify Your Email", &inner),
    }
}

pub fn resend_otp_email(theme: &ThemeConfig, code: &str) -> EmailContent {
    let inner = format!(
        "<p>Here is your new verification code.</p>\n{}",
        otp_block(theme, code),
    );

    EmailContent {
        subject: format!("Your new {} verification code", theme.brand_name),
        html: shell(theme, &theme.brand_color, "New Verification Code", &inner),
    }
}

pub fn reset_password_otp_email(theme: &ThemeConfig, name: &str, code: &str) -> EmailContent {
    let inner = format!(
        "<p>Hi <b>{}</b>,</p>\n<p>We received a request to reset your password. Enter the code below to continue.</p>\n{}",
        name,
        otp_block(theme, code),
    );

    EmailContent {
        subject: format!("Reset your {} password", theme.brand_name),
        html: shell(theme, &theme.danger_color, "Password Reset", &inner),
    }
}

pub fn welcome_email(theme: &ThemeConfig, name: &str) -> EmailContent {
    let inner = format!(
        r#"<p>Hi <b>{name}</b>,</p>
    <p>Your email is verified and your account is ready. Happy shopping!</p>
    <p style="text-align:center">
      <a href="{base}" style="display:inline-block;background:{accent};color:#fff;padding:12px 32px;border-radius:6px;text-decoration:none;font-weight:600">Start Shopping</a>
    </p>"#,
        name = name,
        base = theme.base_url,
        accent = theme.accent_color,
    );

    EmailContent {
        subject: format!("Welcome to {}!", theme.brand_name),
        html: shell(theme, &theme.accent_color, "Welcome Aboard", &inner),
    }
}

pub fn order_confirmation_email(theme: &ThemeConfig, name: &str, order: &Order) -> EmailContent {
    let inner = format!(
        r#"<p>Hi <b>{name}</b>,</p>
    <p>Your order <b>#{reference}</b> has been placed.</p>
    <h3>Order Summary:</h3>
    <ul style="list-style:none;padding:0">{rows}</ul>
    <p><b>Items:</b> ₹{items_price} &nbsp; <b>Shipping:</b> ₹{shipping}</p>
    <p><b>Total:</b> ₹{total}</p>
    <p style="color:#666;font-size:14px">Expected delivery in about 5 days. You can track progress from your orders page.</p>"#,
        name = name,
        reference = order_ref(order.id),
        rows = item_rows(order),
        items_price = order.items_price,
        shipping = order.shipping_price,
        total = order.total_price,
    );

    EmailContent {
        subject: format!("Your Order #{} Is Confirmed!", order_ref(order.id)),
        html: shell(theme, &theme.brand_color, "Order Confirmed", &inner),
    }
}

pub fn order_cancelled_email(theme: &ThemeConfig, name: &str, order: &Order) -> EmailContent {
    let inner = format!(
        r#"<p>Hi <b>{name}</b>,</p>
    <p>Your order <b>#{reference}</b> has been cancelled.</p>
    <p><b>Reason:</b> {reason}</p>
    <ul style="list-style:none;padding:0">{rows}</ul>
    <p>Any reserved stock has been released. If you paid online, the refund follows your payment provider's timelines.</p>"#,
        name = name,
        reference = order_ref(order.id),
        reason = order.cancel_reason,
        rows = item_rows(order),
    );

    EmailContent {
        subject: format!("Your Order #{} Has Been Cancelled", order_ref(order.id)),
        html: shell(theme, &theme.danger_color, "Order Cancelled", &inner),
    }
}

/// Cancellation notice for the assigned delivery partner.
pub fn partner_cancellation_email(
    theme: &ThemeConfig,
    partner_name: &str,
    order: &Order,
) -> EmailContent {
    let inner = format!(
        "<p>Hi <b>{}</b>,</p>\n<p>Order <b>#{}</b> assigned to you was cancelled by the customer. No delivery is required.</p>",
        partner_name,
        order_ref(order.id),
    );

    EmailContent {
        subject: format!("Order #{} Cancelled - No Delivery Needed", order_ref(order.id)),
        html: shell(theme, &theme.danger_color, "Assigned Order Cancelled", &inner),
    }
}

pub fn order_delivered_email(theme: &ThemeConfig, name: &str, order: &Order) -> EmailContent {
    let inner = format!(
        r#"<p>Hi <b>{name}</b>,</p>
    <p>Your order <b>#{reference}</b> has been delivered successfully.</p>
    <h3>Order Summary:</h3>
    <ul style="list-style:none;padding:0">{rows}</ul>
    <p><b>Total Paid:</b> ₹{total}</p>"#,
        name = name,
        reference = order_ref(order.id),
        rows = item_rows(order),
        total = order.total_price,
    );

    EmailContent {
        subject: format!("Your Order #{} Has Been Delivered!", order_ref(order.id)),
        html: shell(
            theme,
            &theme.accent_color,
            "Order Delivered Successfully",
            &inner,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sqlx::types::Json;

    fn theme() -> ThemeConfig {
        ThemeConfig {
            brand_name: "MyStorX".to_string(),
            brand_color: "#0d6efd".to_string(),
            accent_color: "#28a745".to_string(),
            danger_color: "#dc3545".to_string(),
            base_url: "http://localhost:3000".to_string(),
        }
    }

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            items: Json(vec![crate::models::OrderItem {
                name: "Desk Lamp".to_string(),
                image: String::new(),
                price: Decimal::new(60000, 2),
                qty: 2,
                product_id: Uuid::new_v4(),
            }]),
            shipping_address: "12 Main St".to_string(),
            mobile: "9876543210".to_string(),
            payment_method: "cod".to_string(),
            items_price: Decimal::new(120000, 2),
            shipping_price: Decimal::ZERO,
            total_price: Decimal::new(120000, 2),
            is_paid: false,
            paid_at: None,
            payment_result: None,
            is_delivered: false,
            delivered_at: None,
            status: "Pending".to_string(),
            assigned_to: None,
            expected_delivery_date: None,
            delivery_stage: 1,
            delay_message: false,
            is_canceled: false,
            cancel_reason: String::new(),
            canceled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_ref_is_six_uppercase_chars() {
        let reference = order_ref(Uuid::new_v4());
        assert_eq!(reference.len(), 6);
        assert_eq!(reference, reference.to_uppercase());
    }

    #[test]
    fn test_templates_carry_theme_branding() {
        let theme = theme();
        let content = verify_otp_email(&theme, "Asha", "123456");
        assert!(content.subject.contains("MyStorX"));
        assert!(content.html.contains("123456"));
        assert!(content.html.contains(&theme.brand_color));
    }

    #[test]
    fn test_confirmation_lists_items_and_totals() {
        let order = order();
        let content = order_confirmation_email(&theme(), "Asha", &order);
        assert!(content.html.contains("Desk Lamp"));
        assert!(content.html.contains("1200.00"));
        assert!(content.subject.contains(&order_ref(order.id)));
    }

    #[test]
    fn test_cancellation_carries_reason() {
        let mut order = order();
        order.cancel_reason = "Changed my mind".to_string();
        let content = order_cancelled_email(&theme(), "Asha", &order);
        assert!(content.html.contains("Changed my mind"));
    }
}
