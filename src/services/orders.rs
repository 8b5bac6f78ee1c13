use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{item, order, order_item, shipping_address};
use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::cart::CartLine;
use crate::services::catalog::CatalogService;
use crate::services::payments::ShippingAddressInput;

/// Everything needed to turn a paid checkout session into an order.
#[derive(Debug, Clone)]
pub struct MaterializeRequest {
    pub payment_session_id: String,
    pub customer_id: Uuid,
    pub cart: Vec<CartLine>,
    pub shipping_address: ShippingAddressInput,
    /// Total charged by the provider, in minor units (cents).
    pub amount_total_minor: i64,
    pub currency: String,
}

/// Result of materialization. `Existing` means another caller already
/// recorded the order for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Created(Uuid),
    Existing(Uuid),
}

impl MaterializeOutcome {
    pub fn order_id(&self) -> Uuid {
        match self {
            Self::Created(id) | Self::Existing(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct OrderLineDetails {
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ShippingAddressView {
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state_code: String,
    pub country_code: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct OrderDetails {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub order_price: Decimal,
    pub currency: String,
    pub order_date: chrono::DateTime<Utc>,
    pub status: OrderStatus,
    pub items: Vec<OrderLineDetails>,
    pub shipping_address: Option<ShippingAddressView>,
}

/// The order ledger: records orders exactly once per paid session and
/// serves order history.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Records the order for a paid checkout session. Exactly one order
    /// exists per session id no matter how many times this is called or
    /// from how many paths concurrently: a unique index on the session id
    /// column backs the check-then-insert, and a losing racer resolves to
    /// the winner's order.
    #[instrument(skip(self, request), fields(session_id = %request.payment_session_id))]
    pub async fn materialize(
        &self,
        request: MaterializeRequest,
    ) -> Result<MaterializeOutcome, ServiceError> {
        if request.cart.is_empty() {
            return Err(ServiceError::BadRequest(
                "Cannot record an order with no items".to_string(),
            ));
        }

        if let Some(existing) = self
            .find_by_session_id(&request.payment_session_id)
            .await?
        {
            self.event_sender
                .send_or_log(Event::OrderAlreadyMaterialized {
                    session_id: request.payment_session_id.clone(),
                    order_id: existing.id,
                })
                .await;
            return Ok(MaterializeOutcome::Existing(existing.id));
        }

        let txn = self.db.begin().await?;
        let order_id = match Self::insert_order_graph(&txn, &request).await {
            Ok(order_id) => {
                txn.commit().await?;
                order_id
            }
            Err(ServiceError::DatabaseError(db_err)) => {
                // A concurrent materialization may have won the unique
                // index race on the session id. Roll back and defer to it.
                if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    drop(txn);
                    let winner = self
                        .find_by_session_id(&request.payment_session_id)
                        .await?
                        .ok_or(ServiceError::DatabaseError(db_err))?;
                    warn!(
                        order_id = %winner.id,
                        "Lost materialization race, returning existing order"
                    );
                    self.event_sender
                        .send_or_log(Event::OrderAlreadyMaterialized {
                            session_id: request.payment_session_id.clone(),
                            order_id: winner.id,
                        })
                        .await;
                    return Ok(MaterializeOutcome::Existing(winner.id));
                }
                return Err(ServiceError::DatabaseError(db_err));
            }
            Err(other) => return Err(other),
        };

        info!(%order_id, "Order recorded for paid session");
        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        for line in &request.cart {
            self.event_sender
                .send_or_log(Event::InventoryDecremented {
                    item_id: line.item_id,
                    quantity: line.quantity,
                })
                .await;
        }
        Ok(MaterializeOutcome::Created(order_id))
    }

    async fn insert_order_graph<C: ConnectionTrait>(
        conn: &C,
        request: &MaterializeRequest,
    ) -> Result<Uuid, ServiceError> {
        let ids: Vec<Uuid> = request.cart.iter().map(|l| l.item_id).collect();
        let items = item::Entity::find()
            .filter(item::Column::Id.is_in(ids.iter().copied()))
            .all(conn)
            .await?;
        if items.len() != ids.len() {
            let found: Vec<Uuid> = items.iter().map(|i| i.id).collect();
            let missing = ids.iter().find(|id| !found.contains(id));
            return Err(ServiceError::NotFound(format!(
                "Item {} no longer exists",
                missing.map(|id| id.to_string()).unwrap_or_default()
            )));
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        // The provider reports totals in minor units.
        let order_price = Decimal::new(request.amount_total_minor, 2);

        order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(request.customer_id),
            order_price: Set(order_price),
            currency: Set(request.currency.clone()),
            order_date: Set(now),
            status: Set(OrderStatus::Completed),
            payment_session_id: Set(Some(request.payment_session_id.clone())),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        for line in &request.cart {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(line.item_id),
                quantity: Set(line.quantity),
            }
            .insert(conn)
            .await?;
        }

        Self::insert_shipping_address(conn, order_id, &request.shipping_address).await?;

        for line in &request.cart {
            CatalogService::decrement_inventory(conn, line.item_id, line.quantity).await?;
        }

        Ok(order_id)
    }

    async fn insert_shipping_address<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
        address: &ShippingAddressInput,
    ) -> Result<(), ServiceError> {
        shipping_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            address_line1: Set(address.address_line1.clone()),
            address_line2: Set(address.address_line2.clone()),
            city: Set(address.city.clone()),
            state_code: Set(address.state_code.clone()),
            country_code: Set(address.country_code.clone()),
            postal_code: Set(address.postal_code.clone()),
        }
        .insert(conn)
        .await?;
        Ok(())
    }

    /// Records an order directly, without a payment session. Prices come
    /// from the catalog at submission time, the order stays pending and
    /// inventory is not touched.
    #[instrument(skip(self, cart, shipping_address))]
    pub async fn place_order(
        &self,
        customer_id: Uuid,
        cart: Vec<CartLine>,
        shipping_address: ShippingAddressInput,
        currency: String,
    ) -> Result<Uuid, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::BadRequest(
                "Order must contain at least one item".to_string(),
            ));
        }
        if cart.iter().any(|l| l.quantity <= 0) {
            return Err(ServiceError::InvalidInput(
                "Quantities must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let ids: Vec<Uuid> = cart.iter().map(|l| l.item_id).collect();
        let items = item::Entity::find()
            .filter(item::Column::Id.is_in(ids.iter().copied()))
            .all(&txn)
            .await?;
        let by_id: HashMap<Uuid, &item::Model> = items.iter().map(|i| (i.id, i)).collect();

        let mut order_price = Decimal::ZERO;
        for line in &cart {
            let item = by_id.get(&line.item_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Item {} not found", line.item_id))
            })?;
            order_price += item.price * Decimal::from(line.quantity);
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(customer_id),
            order_price: Set(order_price),
            currency: Set(currency),
            order_date: Set(now),
            status: Set(OrderStatus::Pending),
            payment_session_id: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for line in &cart {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(line.item_id),
                quantity: Set(line.quantity),
            }
            .insert(&txn)
            .await?;
        }

        Self::insert_shipping_address(&txn, order_id, &shipping_address).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        Ok(order_id)
    }

    pub async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let found = order::Entity::find()
            .filter(order::Column::PaymentSessionId.eq(session_id))
            .one(self.db.as_ref())
            .await?;
        Ok(found)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = order::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
        self.load_details(order).await
    }

    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<OrderDetails>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::OrderDate)
            .all(self.db.as_ref())
            .await?;

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(self.load_details(order).await?);
        }
        Ok(details)
    }

    async fn load_details(&self, order: order::Model) -> Result<OrderDetails, ServiceError> {
        let lines = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .find_also_related(item::Entity)
            .all(self.db.as_ref())
            .await?;

        let items = lines
            .into_iter()
            .map(|(line, item)| OrderLineDetails {
                item_id: line.item_id,
                name: item.map(|i| i.name).unwrap_or_default(),
                quantity: line.quantity,
            })
            .collect();

        let shipping = shipping_address::Entity::find()
            .filter(shipping_address::Column::OrderId.eq(order.id))
            .one(self.db.as_ref())
            .await?
            .map(|a| ShippingAddressView {
                address_line1: a.address_line1,
                address_line2: a.address_line2,
                city: a.city,
                state_code: a.state_code,
                country_code: a.country_code,
                postal_code: a.postal_code,
            });

        Ok(OrderDetails {
            id: order.id,
            customer_id: order.customer_id,
            order_price: order.order_price,
            currency: order.currency,
            order_date: order.order_date,
            status: order.status,
            items,
            shipping_address: shipping,
        })
    }
}
