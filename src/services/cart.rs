use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::catalog::CatalogService;

/// One line of a cart: an item reference and a desired quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct CartLine {
    pub item_id: Uuid,
    pub quantity: i32,
}

/// A cart line enriched with current catalog data for display.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CartViewLine {
    pub item_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CartView {
    pub lines: Vec<CartViewLine>,
    pub total: Decimal,
}

/// Session-scoped carts held in process memory, keyed by customer id.
/// Contents are ephemeral: a restart empties every cart.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<DashMap<Uuid, Vec<CartLine>>>,
    catalog: CatalogService,
    event_sender: EventSender,
}

impl CartService {
    pub fn new(catalog: CatalogService, event_sender: EventSender) -> Self {
        Self {
            carts: Arc::new(DashMap::new()),
            catalog,
            event_sender,
        }
    }

    /// Adds an item to the cart. If the item is already present its
    /// quantity is replaced, not accumulated.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }
        // Adding an unknown item is rejected up front.
        let item = self.catalog.get_item(item_id).await?;
        if quantity > item.inventory {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} units available for {}",
                item.inventory, item.name
            )));
        }

        let mut entry = self.carts.entry(customer_id).or_default();
        match entry.iter_mut().find(|line| line.item_id == item_id) {
            Some(line) => line.quantity = quantity,
            None => entry.push(CartLine { item_id, quantity }),
        }
        drop(entry);

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                customer_id,
                item_id,
            })
            .await;

        self.view(customer_id).await
    }

    /// Sets the quantity of an existing cart line. A quantity of zero
    /// removes the line.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must not be negative".to_string(),
            ));
        }
        if quantity == 0 {
            return self.remove_item(customer_id, item_id).await;
        }

        let mut entry = self
            .carts
            .get_mut(&customer_id)
            .ok_or_else(|| ServiceError::NotFound("Cart is empty".to_string()))?;
        let line = entry
            .iter_mut()
            .find(|line| line.item_id == item_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not in cart", item_id)))?;
        line.quantity = quantity;
        drop(entry);

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                customer_id,
                item_id,
            })
            .await;

        self.view(customer_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let mut entry = self
            .carts
            .get_mut(&customer_id)
            .ok_or_else(|| ServiceError::NotFound("Cart is empty".to_string()))?;
        let before = entry.len();
        entry.retain(|line| line.item_id != item_id);
        if entry.len() == before {
            return Err(ServiceError::NotFound(format!(
                "Item {} not in cart",
                item_id
            )));
        }
        drop(entry);

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                customer_id,
                item_id,
            })
            .await;

        self.view(customer_id).await
    }

    /// Empties the cart. Clearing an already empty cart succeeds.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: Uuid) {
        self.carts.remove(&customer_id);
        self.event_sender
            .send_or_log(Event::CartCleared(customer_id))
            .await;
    }

    /// Returns the raw cart lines, for callers that need to snapshot the
    /// cart without catalog enrichment.
    pub fn snapshot(&self, customer_id: Uuid) -> Vec<CartLine> {
        self.carts
            .get(&customer_id)
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Builds the enriched cart view from current catalog prices. Lines
    /// whose item has since been deleted are dropped from the view.
    #[instrument(skip(self))]
    pub async fn view(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let lines = self.snapshot(customer_id);
        if lines.is_empty() {
            return Ok(CartView {
                lines: Vec::new(),
                total: Decimal::ZERO,
            });
        }

        let ids: Vec<Uuid> = lines.iter().map(|l| l.item_id).collect();
        let items = self.catalog.resolve_many(&ids).await?;
        let by_id: HashMap<Uuid, _> = items.into_iter().map(|i| (i.id, i)).collect();

        let mut view_lines = Vec::with_capacity(lines.len());
        let mut total = Decimal::ZERO;
        for line in lines {
            if let Some(item) = by_id.get(&line.item_id) {
                let subtotal = item.price * Decimal::from(line.quantity);
                total += subtotal;
                view_lines.push(CartViewLine {
                    item_id: item.id,
                    name: item.name.clone(),
                    price: item.price,
                    quantity: line.quantity,
                    subtotal,
                });
            }
        }

        Ok(CartView {
            lines: view_lines,
            total,
        })
    }
}
