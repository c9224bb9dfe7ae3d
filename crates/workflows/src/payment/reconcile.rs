//! Applies asynchronous gateway results to orders.

use common::AggregateId;
use domain::{Actor, ConfirmPayment, OrderService, OrderStatus, PaymentMethod};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

/// What the gateway reported for a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GatewayOutcome {
    Confirmed,
    Declined { reason: String },
}

/// A gateway redirect or webhook result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResult {
    pub method: PaymentMethod,
    pub reference: String,
    #[serde(flatten)]
    pub outcome: GatewayOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Payment recorded by this call.
    Applied { status: OrderStatus },

    /// The same confirmation was recorded earlier.
    AlreadyApplied { status: OrderStatus },

    /// The order was cancelled before the payment arrived.
    Ignored { status: OrderStatus },
}

pub struct PaymentReconciler<S: EventStore> {
    orders: OrderService<S>,
}

impl<S: EventStore + Clone> PaymentReconciler<S> {
    pub fn new(store: S) -> Self {
        Self {
            orders: OrderService::new(store),
        }
    }

    #[tracing::instrument(skip(self, result), fields(reference = %result.reference))]
    pub async fn reconcile(
        &self,
        order_id: AggregateId,
        result: GatewayResult,
    ) -> Result<ReconcileOutcome> {
        if let GatewayOutcome::Declined { reason } = result.outcome {
            tracing::warn!(%order_id, %reason, "payment declined by gateway");
            metrics::counter!("payment_declines_total").increment(1);
            return Err(WorkflowError::PaymentDeclined { reason });
        }

        let cmd = ConfirmPayment::new(
            order_id,
            result.method,
            result.reference,
            Actor::PaymentGateway,
        );
        let outcome = self.orders.confirm_payment(cmd).await?;
        let status = outcome.aggregate.status();

        Ok(if !outcome.is_noop() {
            ReconcileOutcome::Applied { status }
        } else if status == OrderStatus::Cancelled {
            ReconcileOutcome::Ignored { status }
        } else {
            ReconcileOutcome::AlreadyApplied { status }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{placed_order, shop};
    use domain::{Aggregate, CancelOrder, DomainError, OrderError, VerifyOrder};

    fn confirmed(reference: &str) -> GatewayResult {
        GatewayResult {
            method: PaymentMethod::RazorPay,
            reference: reference.to_string(),
            outcome: GatewayOutcome::Confirmed,
        }
    }

    #[tokio::test]
    async fn test_confirmation_applied_once() {
        let shop = shop().await;
        let (_, order_id) = placed_order(&shop).await;
        let reconciler = PaymentReconciler::new(shop.store.clone());

        let first = reconciler
            .reconcile(order_id, confirmed("pay_1"))
            .await
            .unwrap();
        assert_eq!(
            first,
            ReconcileOutcome::Applied {
                status: OrderStatus::Pending
            }
        );

        let replay = reconciler
            .reconcile(order_id, confirmed("pay_1"))
            .await
            .unwrap();
        assert_eq!(
            replay,
            ReconcileOutcome::AlreadyApplied {
                status: OrderStatus::Pending
            }
        );

        let order = shop.orders.get_order(order_id).await.unwrap().unwrap();
        assert!(order.is_paid());
        assert_eq!(order.version().as_i64(), 2);
    }

    #[tokio::test]
    async fn test_payment_on_verified_order_starts_fulfilment() {
        let shop = shop().await;
        let (_, order_id) = placed_order(&shop).await;
        shop.orders
            .verify(VerifyOrder::new(order_id, Actor::EmailLink))
            .await
            .unwrap();

        let outcome = PaymentReconciler::new(shop.store.clone())
            .reconcile(order_id, confirmed("pay_1"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                status: OrderStatus::InTransit
            }
        );
    }

    #[tokio::test]
    async fn test_declined_mutates_nothing() {
        let shop = shop().await;
        let (_, order_id) = placed_order(&shop).await;

        let result = PaymentReconciler::new(shop.store.clone())
            .reconcile(
                order_id,
                GatewayResult {
                    method: PaymentMethod::RazorPay,
                    reference: "pay_1".to_string(),
                    outcome: GatewayOutcome::Declined {
                        reason: "card expired".to_string(),
                    },
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::PaymentDeclined { reason }) if reason == "card expired"
        ));
        let order = shop.orders.get_order(order_id).await.unwrap().unwrap();
        assert!(!order.is_paid());
        assert_eq!(order.version().as_i64(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_order_ignores_payment() {
        let shop = shop().await;
        let (_, order_id) = placed_order(&shop).await;
        shop.orders
            .cancel(CancelOrder::new(order_id, Actor::EmailLink, None))
            .await
            .unwrap();

        let outcome = PaymentReconciler::new(shop.store.clone())
            .reconcile(order_id, confirmed("pay_1"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored {
                status: OrderStatus::Cancelled
            }
        );
    }

    #[tokio::test]
    async fn test_second_reference_rejected() {
        let shop = shop().await;
        let (_, order_id) = placed_order(&shop).await;
        let reconciler = PaymentReconciler::new(shop.store.clone());
        reconciler
            .reconcile(order_id, confirmed("pay_1"))
            .await
            .unwrap();

        let result = reconciler.reconcile(order_id, confirmed("pay_2")).await;
        assert!(matches!(
            result,
            Err(WorkflowError::Domain(DomainError::Order(
                OrderError::PaymentAlreadyConfirmed
            )))
        ));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let shop = shop().await;
        let result = PaymentReconciler::new(shop.store.clone())
            .reconcile(AggregateId::new(), confirmed("pay_1"))
            .await;
        assert!(matches!(result, Err(WorkflowError::OrderNotFound)));
    }
}
