//! Shared application state.

use std::sync::Arc;

use chrono::Duration;
use domain::{CartService, CheckoutService, CustomerService, OrderService, ProductCatalog};
use event_store::EventStore;
use projections::{OrderHistoryView, Projection, ProjectionProcessor, UserOrdersView};
use secrecy::SecretString;
use tokio::task::JoinHandle;
use workflows::{
    CallbackVerifier, CardCheckout, ConfirmationService, MailOutbox, Mailer, PaymentGateway,
    PaymentReconciler, TokenSigner,
};

use crate::config::Config;

/// Services and read models shared by every handler.
pub struct AppState<S: EventStore> {
    pub catalog: Arc<dyn ProductCatalog>,
    pub carts: CartService<S>,
    pub customers: CustomerService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub confirmations: ConfirmationService<S>,
    pub reconciler: PaymentReconciler<S>,
    pub callback_verifier: CallbackVerifier,
    pub cards: CardCheckout<S>,
    pub user_orders: UserOrdersView,
    pub order_history: OrderHistoryView,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
    pub fulfillment_key: Option<SecretString>,
}

/// External capabilities the state is wired to.
pub struct Capabilities {
    pub catalog: Arc<dyn ProductCatalog>,
    pub mailer: Arc<dyn Mailer>,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    /// Builds every service over `store` and starts the mail worker.
    pub fn new(
        store: S,
        config: &Config,
        capabilities: Capabilities,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (outbox, mail_worker) =
            MailOutbox::spawn(capabilities.mailer, config.mail_queue_capacity);
        let signer = TokenSigner::new(
            config.confirmation_secret.clone(),
            Duration::hours(config.confirmation_ttl_hours),
        );

        let user_orders = UserOrdersView::new();
        let order_history = OrderHistoryView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(user_orders.clone()) as Box<dyn Projection>);
        processor.register(Box::new(order_history.clone()) as Box<dyn Projection>);

        let state = Arc::new(Self {
            carts: CartService::new(store.clone(), capabilities.catalog.clone()),
            catalog: capabilities.catalog,
            customers: CustomerService::new(store.clone()),
            checkout: CheckoutService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            confirmations: ConfirmationService::new(
                store.clone(),
                signer,
                outbox,
                &config.public_base_url,
            ),
            reconciler: PaymentReconciler::new(store.clone()),
            callback_verifier: CallbackVerifier::new(config.gateway_secret.clone()),
            cards: CardCheckout::new(store, capabilities.gateway, &config.currency),
            user_orders,
            order_history,
            projection_processor: Arc::new(processor),
            fulfillment_key: config.fulfillment_key.clone(),
        });

        (state, mail_worker)
    }
}
