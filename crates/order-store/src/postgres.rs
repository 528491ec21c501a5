use async_trait::async_trait;
use domain::{Category, CreateOrderCommand, Order, OrderStatus, Product};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use crate::{OrderRepository, OrderStoreError};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    client_id: String,
    status: String,
    products: Json<Vec<Product>>,
    price: f64,
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderStoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| OrderStoreError::Corrupt {
                id: row.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Order {
            id: row.id,
            client_id: row.client_id,
            status,
            products: row.products.0,
            price: row.price,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: String,
    price: f64,
    category_id: String,
    category_name: String,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            category: Category {
                id: row.category_id,
                name: row.category_name,
            },
        }
    }
}

/// PostgreSQL implementation of OrderRepository.
///
/// Products are stored on the order as a JSONB snapshot taken at placement,
/// so later catalog edits never change an existing order.
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), OrderStoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Order store migrations applied");
        Ok(())
    }

    async fn load_products(&self, ids: &[String]) -> Result<Vec<Product>, OrderStoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT
                p.id, p.name, p.description, p.price,
                c.id AS category_id, c.name AS category_name
            FROM products p
            JOIN categories c ON c.id = p.category_id
            WHERE p.id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, OrderStoreError> {
    rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create(&self, command: &CreateOrderCommand) -> Result<Order, OrderStoreError> {
        let catalog = self.load_products(&command.product_ids).await?;
        let order = Order::place(command.client_id.clone(), &command.product_ids, &catalog)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, client_id, status, products, price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&order.id)
        .bind(&order.client_id)
        .bind(order.status.as_str())
        .bind(Json(&order.products))
        .bind(order.price)
        .execute(&self.pool)
        .await?;

        debug!(order_id = %order.id, client_id = %order.client_id, "Order row inserted");
        Ok(order)
    }

    async fn find_all(&self) -> Result<Vec<Order>, OrderStoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, client_id, status, products, price
            FROM orders
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        into_orders(rows)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, OrderStoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, client_id, status, products, price
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, OrderStoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, client_id, status, products, price
            FROM orders
            WHERE status = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await?;

        into_orders(rows)
    }

    async fn update_status(&self, id: &str, status: OrderStatus) -> Result<bool, OrderStoreError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, OrderStoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_by_client(&self, client_id: &str) -> Result<u64, OrderStoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
