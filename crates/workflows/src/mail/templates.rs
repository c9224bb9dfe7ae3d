use askama::Template;
use domain::{Aggregate, Money, Order, OrderItem};

use super::{MailError, OutboundEmail};

#[derive(Template)]
#[template(path = "email/order_verification.html")]
struct OrderVerificationHtml<'a> {
    first_name: &'a str,
    order_ref: &'a str,
    items: &'a [OrderItem],
    total: Money,
    link: &'a str,
    ttl_hours: i64,
}

#[derive(Template)]
#[template(path = "email/cancellation_request.html")]
struct CancellationRequestHtml<'a> {
    first_name: &'a str,
    order_ref: &'a str,
    total: Money,
    link: &'a str,
    ttl_hours: i64,
}

/// The "Order Verification" mail with a confirmation link.
pub fn verification_email(
    to: &str,
    first_name: &str,
    order: &Order,
    link: &str,
    ttl_hours: i64,
) -> Result<OutboundEmail, MailError> {
    let order_ref = order_ref(order);
    let html_body = OrderVerificationHtml {
        first_name,
        order_ref: &order_ref,
        items: order.items(),
        total: order.total_price(),
        link,
        ttl_hours,
    }
    .render()?;

    Ok(OutboundEmail {
        to: to.to_string(),
        subject: "Order Verification".to_string(),
        html_body,
    })
}

pub fn cancellation_email(
    to: &str,
    first_name: &str,
    order: &Order,
    link: &str,
    ttl_hours: i64,
) -> Result<OutboundEmail, MailError> {
    let order_ref = order_ref(order);
    let html_body = CancellationRequestHtml {
        first_name,
        order_ref: &order_ref,
        total: order.total_price(),
        link,
        ttl_hours,
    }
    .render()?;

    Ok(OutboundEmail {
        to: to.to_string(),
        subject: "Verify order cancellation".to_string(),
        html_body,
    })
}

fn order_ref(order: &Order) -> String {
    order.id().map(|id| id.to_string()).unwrap_or_default()
}
