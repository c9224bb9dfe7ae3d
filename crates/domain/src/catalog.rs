//! Product catalog capability.
//!
//! Catalog management lives outside this crate; the cart only needs to look
//! up a product's current name, price and offered variants.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::value_objects::{Money, ProductId, Variant};

/// A sellable product as the catalog currently describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub active: bool,
    /// Offered sizes. Empty means the product is not sized.
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Offered colours. Empty means the product has a single colour.
    #[serde(default)]
    pub colors: Vec<String>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price,
            active: true,
            sizes: Vec::new(),
            colors: Vec::new(),
        }
    }

    pub fn with_sizes(mut self, sizes: &[&str]) -> Self {
        self.sizes = sizes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_colors(mut self, colors: &[&str]) -> Self {
        self.colors = colors.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Whether `variant` names only sizes and colours this product offers.
    pub fn offers(&self, variant: &Variant) -> bool {
        fn allowed(choice: &Option<String>, offered: &[String]) -> bool {
            match choice {
                Some(value) => offered.iter().any(|o| o == value),
                None => true,
            }
        }
        allowed(&variant.size, &self.sizes) && allowed(&variant.color, &self.colors)
    }
}

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: &ProductId) -> Option<Product>;

    /// Active products ordered by ID.
    async fn list_active(&self) -> Vec<Product>;
}

/// Catalog held in memory, used for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<BTreeMap<ProductId, Product>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.upsert(product).await;
        }
        catalog
    }

    pub async fn upsert(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    /// Changes a product's price. Returns false for unknown products.
    pub async fn set_price(&self, id: &ProductId, price: Money) -> bool {
        match self.products.write().await.get_mut(id) {
            Some(product) => {
                product.price = price;
                true
            }
            None => false,
        }
    }

    pub async fn deactivate(&self, id: &ProductId) -> bool {
        match self.products.write().await.get_mut(id) {
            Some(product) => {
                product.active = false;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn get_product(&self, id: &ProductId) -> Option<Product> {
        self.products.read().await.get(id).cloned()
    }

    async fn list_active(&self) -> Vec<Product> {
        self.products
            .read()
            .await
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect()
    }
}
