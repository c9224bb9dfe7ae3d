//! Order service: lookups scoped to a user plus status commands.

use common::AggregateId;
use event_store::EventStore;
use serde::Serialize;

use crate::command::{CommandHandler, CommandResult, DEFAULT_COMMAND_ATTEMPTS};
use crate::customer::{Address, Customer};
use crate::error::DomainError;
use crate::value_objects::UserId;

use super::{
    AdvanceFulfillment, CancelOrder, ConfirmPayment, FulfillmentStep, Order, OrderError,
    OrderStatus, VerifyOrder,
};

/// An order together with its shipping address as it reads today.
///
/// Items are frozen at checkout; the address is resolved by reference, so
/// later edits to the address book show up here.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub shipping_address: Option<Address>,
}

/// Reads and status changes for orders.
///
/// Every write goes through [`CommandHandler::execute_with_retry`], so a
/// concurrent writer forces a fresh decision instead of a lost update.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
    customers: CommandHandler<S, Customer>,
}

impl<S: EventStore + Clone> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            customers: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    /// Loads an order by ID, or `None` if it was never placed.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    /// Loads an order owned by `user_id`.
    ///
    /// An unknown order and someone else's order fail identically.
    #[tracing::instrument(skip(self))]
    pub async fn get_order_for(
        &self,
        user_id: UserId,
        order_id: AggregateId,
    ) -> Result<Order, DomainError> {
        match self.get_order(order_id).await? {
            Some(order) if order.is_owned_by(user_id) => Ok(order),
            _ => Err(OrderError::NotPlaced.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order_detail(
        &self,
        user_id: UserId,
        order_id: AggregateId,
    ) -> Result<OrderDetail, DomainError> {
        let order = self.get_order_for(user_id, order_id).await?;
        let customer = self.customers.load(Customer::id_for(user_id)).await?;
        let shipping_address = order
            .address_id()
            .and_then(|address_id| customer.address(address_id))
            .cloned();

        Ok(OrderDetail {
            order,
            shipping_address,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, cmd: VerifyOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_with_retry(cmd.order_id, DEFAULT_COMMAND_ATTEMPTS, |order| {
                order.verify(cmd.actor.clone())
            })
            .await?;
        record_transition(cmd.order_id, &result);
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        cmd: ConfirmPayment,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_with_retry(cmd.order_id, DEFAULT_COMMAND_ATTEMPTS, |order| {
                order.confirm_payment(cmd.method, &cmd.reference, cmd.actor.clone())
            })
            .await?;

        if result.is_noop() && result.aggregate.status() == OrderStatus::Cancelled {
            tracing::info!(
                order_id = %cmd.order_id,
                reference = %cmd.reference,
                "payment confirmation ignored for cancelled order"
            );
        }
        record_transition(cmd.order_id, &result);
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, cmd: CancelOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_with_retry(cmd.order_id, DEFAULT_COMMAND_ATTEMPTS, |order| {
                order.cancel(cmd.actor.clone(), cmd.reason.clone())
            })
            .await?;
        record_transition(cmd.order_id, &result);
        Ok(result)
    }

    /// Applies a staff fulfilment step.
    #[tracing::instrument(skip(self))]
    pub async fn advance(
        &self,
        cmd: AdvanceFulfillment,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .handler
            .execute_with_retry(cmd.order_id, DEFAULT_COMMAND_ATTEMPTS, |order| {
                cmd.step.decide(order, cmd.actor.clone())
            })
            .await?;
        record_transition(cmd.order_id, &result);
        Ok(result)
    }

    // Convenience methods

    pub async fn ship(
        &self,
        order_id: AggregateId,
        tracking_number: Option<String>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.advance(AdvanceFulfillment::new(
            order_id,
            FulfillmentStep::Ship { tracking_number },
        ))
        .await
    }

    pub async fn deliver(
        &self,
        order_id: AggregateId,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.advance(AdvanceFulfillment::new(order_id, FulfillmentStep::Deliver))
            .await
    }

    pub async fn mark_returned(
        &self,
        order_id: AggregateId,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.advance(AdvanceFulfillment::new(order_id, FulfillmentStep::Return))
            .await
    }

    pub async fn refund(&self, order_id: AggregateId) -> Result<CommandResult<Order>, DomainError> {
        self.advance(AdvanceFulfillment::new(order_id, FulfillmentStep::Refund))
            .await
    }
}

fn record_transition(order_id: AggregateId, result: &CommandResult<Order>) {
    if result.is_noop() {
        return;
    }
    let status = result.aggregate.status();
    tracing::info!(%order_id, %status, version = %result.new_version, "order updated");
    metrics::counter!("order_transitions_total", "status" => status.as_str()).increment(1);
}
