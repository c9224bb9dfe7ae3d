//! Joint invariant between an order's status and its payment status.

use super::{OrderError, OrderStatus, PaymentStatus};

/// Checks that `status` and `payment` may coexist.
///
/// Every status past `Verified`, except `Cancelled`, requires a confirmed
/// payment.
pub fn validate(status: OrderStatus, payment: &PaymentStatus) -> Result<(), OrderError> {
    if status.requires_confirmed_payment() && !payment.is_confirmed() {
        return Err(OrderError::InconsistentStatus {
            status,
            payment: payment.clone(),
        });
    }
    Ok(())
}
