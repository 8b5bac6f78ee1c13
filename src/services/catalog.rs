use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::entities::item;
use crate::errors::ServiceError;

/// Read-side catalog queries plus the guarded inventory decrement used
/// during order materialization.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 4000))]
    pub description: String,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub inventory: i32,
    #[validate(length(min = 1, max = 255))]
    pub category: String,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<item::Model>, ServiceError> {
        let items = item::Entity::find()
            .order_by_asc(item::Column::Name)
            .all(self.db.as_ref())
            .await?;
        Ok(items)
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, id: Uuid) -> Result<item::Model, ServiceError> {
        item::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))
    }

    /// Fetches the current catalog rows for a set of item ids. Callers are
    /// responsible for detecting ids that did not resolve.
    #[instrument(skip(self, ids))]
    pub async fn resolve_many(&self, ids: &[Uuid]) -> Result<Vec<item::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let items = item::Entity::find()
            .filter(item::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.as_ref())
            .await?;
        Ok(items)
    }

    /// Case-insensitive substring search over item names.
    #[instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<item::Model>, ServiceError> {
        let items = item::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(item::Column::Name)))
                    .like(format!("%{}%", name.to_lowercase())),
            )
            .order_by_asc(item::Column::Name)
            .all(self.db.as_ref())
            .await?;
        Ok(items)
    }

    #[instrument(skip(self))]
    pub async fn find_by_category(&self, category: &str) -> Result<Vec<item::Model>, ServiceError> {
        let items = item::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(item::Column::Category)))
                    .eq(category.to_lowercase()),
            )
            .order_by_asc(item::Column::Name)
            .all(self.db.as_ref())
            .await?;
        Ok(items)
    }

    #[instrument(skip(self, request))]
    pub async fn create_item(
        &self,
        request: CreateItemRequest,
    ) -> Result<item::Model, ServiceError> {
        request.validate()?;
        if request.price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Price must not be negative".to_string(),
            ));
        }

        let now = chrono::Utc::now();
        let model = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            price: Set(request.price),
            inventory: Set(request.inventory),
            category: Set(request.category),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let saved = model.insert(self.db.as_ref()).await?;
        Ok(saved)
    }

    /// Atomically decrements inventory for one item, failing with
    /// `InsufficientStock` when fewer than `quantity` units remain. The
    /// guard lives in the UPDATE's WHERE clause so concurrent decrements
    /// can never drive inventory negative.
    pub async fn decrement_inventory<C: ConnectionTrait>(
        conn: &C,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }

        let result = item::Entity::update_many()
            .col_expr(
                item::Column::Inventory,
                Expr::col(item::Column::Inventory).sub(quantity),
            )
            .col_expr(item::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(item::Column::Id.eq(item_id))
            .filter(item::Column::Inventory.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            // Re-read to distinguish a missing item from a stock shortfall.
            let current = item::Entity::find_by_id(item_id).one(conn).await?;
            return Err(match current {
                Some(item) => ServiceError::InsufficientStock(format!(
                    "Only {} units available for {}",
                    item.inventory, item.name
                )),
                None => ServiceError::NotFound(format!("Item {} not found", item_id)),
            });
        }

        Ok(())
    }
}
