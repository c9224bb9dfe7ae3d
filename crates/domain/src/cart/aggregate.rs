//! Cart aggregate implementation.

use chrono::Utc;
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::value_objects::{Money, ProductId, UserId, Variant};

use super::{
    CartError, CartEvent,
    events::{CartDrainedData, CartItemAddedData, CartItemQuantityUpdatedData},
};

/// Namespace for deriving cart stream IDs from user IDs.
const CART_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_4d0e_8a55_1c7e_2f3b_9d40);

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 999;

fn check_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 || quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity { quantity });
    }
    Ok(())
}

/// One product/variant selection in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub variant: Variant,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartLine {
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        variant: Variant,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            variant,
            quantity,
            unit_price,
        }
    }

    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    fn is(&self, product_id: &ProductId, variant: &Variant) -> bool {
        &self.product_id == product_id && &self.variant == variant
    }
}

/// A user's mutable selection of products awaiting checkout.
///
/// `total` is recomputed from the lines after every applied event, so it
/// always equals the sum of line subtotals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    user_id: Option<UserId>,

    /// Lines in the order they were first added.
    lines: Vec<CartLine>,

    total: Money,

    /// Number of checkouts this cart has fed.
    drained_count: u32,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartEvent::CartOpened(data) => {
                self.id = Some(data.cart_id);
                self.user_id = Some(data.user_id);
            }
            CartEvent::CartItemAdded(data) => self.apply_item_added(data),
            CartEvent::CartItemRemoved(data) => {
                self.lines
                    .retain(|line| !line.is(&data.product_id, &data.variant));
            }
            CartEvent::CartItemQuantityUpdated(data) => self.apply_quantity_updated(data),
            CartEvent::CartDrained(_) => {
                self.lines.clear();
                self.drained_count += 1;
            }
        }
        self.total = self.lines.iter().map(CartLine::subtotal).sum();
    }
}

impl SnapshotCapable for Cart {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl Cart {
    /// Stream ID of the cart owned by `user_id`.
    pub fn id_for(user_id: UserId) -> AggregateId {
        AggregateId::derived(CART_NAMESPACE, user_id.as_uuid().as_bytes())
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &ProductId, variant: &Variant) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.is(product_id, variant))
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// A cart can be checked out only with at least one line and a
    /// positive total.
    pub fn is_checkout_eligible(&self) -> bool {
        !self.lines.is_empty() && self.total.is_positive()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn drained_count(&self) -> u32 {
        self.drained_count
    }
}

// Command methods (return events)
impl Cart {
    /// Adds `line` to the cart, opening the cart on first use.
    ///
    /// Adding a product/variant that is already present increases its
    /// quantity and keeps the price captured when it was first added.
    pub fn add_item(&self, user_id: UserId, line: CartLine) -> Result<Vec<CartEvent>, CartError> {
        check_quantity(line.quantity)?;
        if !line.unit_price.is_positive() {
            return Err(CartError::InvalidPrice {
                cents: line.unit_price.cents(),
            });
        }

        let mut events = Vec::with_capacity(2);
        if self.id.is_none() {
            events.push(CartEvent::cart_opened(Cart::id_for(user_id), user_id));
        }

        match self.line(&line.product_id, &line.variant) {
            Some(existing) => {
                let merged = existing.quantity.saturating_add(line.quantity);
                check_quantity(merged)?;
                events.push(CartEvent::quantity_updated(
                    line.product_id,
                    line.variant,
                    existing.quantity,
                    merged,
                ));
            }
            None => events.push(CartEvent::CartItemAdded(CartItemAddedData {
                product_id: line.product_id,
                product_name: line.product_name,
                variant: line.variant,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })),
        }

        Ok(events)
    }

    pub fn remove_item(
        &self,
        product_id: ProductId,
        variant: Variant,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_opened()?;
        if self.line(&product_id, &variant).is_none() {
            return Err(CartError::ItemNotFound {
                product_id,
                variant,
            });
        }
        Ok(vec![CartEvent::item_removed(product_id, variant)])
    }

    /// Sets a line's quantity. Zero removes the line; the current quantity
    /// is a no-op.
    pub fn update_item_quantity(
        &self,
        product_id: ProductId,
        variant: Variant,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_opened()?;
        let Some(existing) = self.line(&product_id, &variant) else {
            return Err(CartError::ItemNotFound {
                product_id,
                variant,
            });
        };

        if quantity == 0 {
            return Ok(vec![CartEvent::item_removed(product_id, variant)]);
        }
        check_quantity(quantity)?;
        if quantity == existing.quantity {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::quantity_updated(
            product_id,
            variant,
            existing.quantity,
            quantity,
        )])
    }

    /// Empties the cart into `order_id`. Only checkout calls this.
    pub fn drain(&self, order_id: AggregateId) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_opened()?;
        if !self.is_checkout_eligible() {
            return Err(CartError::Empty);
        }

        Ok(vec![CartEvent::CartDrained(CartDrainedData {
            order_id,
            item_count: self.lines.len(),
            total: self.total,
            drained_at: Utc::now(),
        })])
    }

    fn ensure_opened(&self) -> Result<(), CartError> {
        if self.id.is_none() {
            return Err(CartError::NotOpened);
        }
        Ok(())
    }
}

// Event application
impl Cart {
    fn apply_item_added(&mut self, data: CartItemAddedData) {
        self.lines.push(CartLine {
            product_id: data.product_id,
            product_name: data.product_name,
            variant: data.variant,
            quantity: data.quantity,
            unit_price: data.unit_price,
        });
    }

    fn apply_quantity_updated(&mut self, data: CartItemQuantityUpdatedData) {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.is(&data.product_id, &data.variant))
        {
            line.quantity = data.new_quantity;
        }
    }
}
