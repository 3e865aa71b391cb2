use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, Money, OrderId, OrderItemId, ProductId, UserId};
use domain::{
    Cart, CartItem, Order, OrderItem, OrderNumber, OrderStatus, Product, Profile, User,
    plan_fulfillment,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{FulfillmentCommit, FulfillmentRequest, OversellRecord, Store},
};

const PRODUCT_COLUMNS: &str =
    "id, owner_id, name, description, price_cents, stock, available, created_at, updated_at";
const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, line_price_cents, added_at";
const ORDER_COLUMNS: &str =
    "id, owner_id, order_number, total_cents, status, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn decode_error(column: &str, source: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

fn get_u32(row: &PgRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    Ok(u32::try_from(value).map_err(|e| decode_error(column, e))?)
}

fn row_to_user(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_profile(row: &PgRow) -> Result<Profile> {
    Ok(Profile {
        owner: UserId::from_uuid(row.try_get("owner_id")?),
        name: row.try_get("name")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        owner: UserId::from_uuid(row.try_get("owner_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: get_u32(row, "stock")?,
        available: row.try_get("available")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart(row: &PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::from_uuid(row.try_get("id")?),
        owner: UserId::from_uuid(row.try_get("owner_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_item(row: &PgRow) -> Result<CartItem> {
    Ok(CartItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        cart_id: CartId::from_uuid(row.try_get("cart_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: get_u32(row, "quantity")?,
        line_price: Money::from_cents(row.try_get("line_price_cents")?),
        added_at: row.try_get("added_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status: OrderStatus = status
        .parse()
        .map_err(|e: String| decode_error("status", std::io::Error::other(e)))?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        owner: UserId::from_uuid(row.try_get("owner_id")?),
        order_number: OrderNumber::from_stored(row.try_get::<String, _>("order_number")?),
        total_price: Money::from_cents(row.try_get("total_cents")?),
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        quantity: get_u32(row, "quantity")?,
        price: Money::from_cents(row.try_get("price_cents")?),
    })
}

/// Maps unique violations on `constraint` to [`StoreError::Conflict`].
fn conflict_on(constraint: &'static str, message: String) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some(constraint)
        {
            return StoreError::Conflict(message);
        }
        StoreError::Database(e)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_user(&self, user: &User, profile: &Profile) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(conflict_on(
            "users_username_key",
            format!("username {} is already taken", user.username),
        ))?;

        sqlx::query(
            r#"
            INSERT INTO profiles (owner_id, name, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(profile.owner.as_uuid())
        .bind(&profile.name)
        .bind(&profile.content)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, email, created_at FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_profile(&self, owner: UserId) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT owner_id, name, content, created_at, updated_at FROM profiles WHERE owner_id = $1",
        )
        .bind(owner.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_profile).transpose()
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, owner_id, name, description, price_cents, stock, available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.owner.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(product.available)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on(
            "products_pkey",
            format!("product {} already exists", product.id),
        ))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn get_or_create_cart(&self, owner: UserId, now: DateTime<Utc>) -> Result<Cart> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (owner_id) DO NOTHING
            "#,
        )
        .bind(CartId::new().as_uuid())
        .bind(owner.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, owner_id, created_at, updated_at FROM carts WHERE owner_id = $1",
        )
        .bind(owner.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        row_to_cart(&row)
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT id, owner_id, created_at, updated_at FROM carts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_cart).transpose()
    }

    async fn get_cart_by_owner(&self, owner: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT id, owner_id, created_at, updated_at FROM carts WHERE owner_id = $1",
        )
        .bind(owner.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_cart).transpose()
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 ORDER BY added_at ASC, id ASC"
        ))
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_cart_item).collect()
    }

    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 AND product_id = $2"
        ))
        .bind(cart_id.as_uuid())
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_cart_item).transpose()
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_cart_item).transpose()
    }

    async fn save_cart_item(&self, item: &CartItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, line_price_cents, added_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET quantity = EXCLUDED.quantity, line_price_cents = EXCLUDED.line_price_cents
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.cart_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(i64::from(item.quantity))
        .bind(item.line_price.cents())
        .bind(item.added_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_on(
            "cart_items_cart_product_key",
            format!(
                "cart {} already holds product {}",
                item.cart_id, item.product_id
            ),
        ))?;

        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(item.cart_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_cart_item(&self, cart_id: CartId, item_id: CartItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id.as_uuid())
            .bind(cart_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_orders(&self, owner: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            "SELECT id, order_id, product_id, quantity, price_cents FROM order_items WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_order_item).collect()
    }

    async fn update_order_status(&self, order: &Order, expected: OrderStatus) -> Result<()> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4")
                .bind(order.id.as_uuid())
                .bind(order.status.as_str())
                .bind(order.updated_at)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return match self.get_order(order.id).await? {
                Some(stored) => Err(StoreError::Conflict(format!(
                    "order {} is {}, expected {}",
                    order.id, stored.status, expected
                ))),
                None => Err(StoreError::not_found("Order", order.id)),
            };
        }
        Ok(())
    }

    async fn processed_event(&self, event_id: &str) -> Result<Option<OrderId>> {
        let order_id: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT order_id FROM processed_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(order_id.flatten().map(OrderId::from_uuid))
    }

    #[tracing::instrument(skip(self, request), fields(event_id = %request.event_id, cart_id = %request.cart_id))]
    async fn commit_fulfillment(&self, request: FulfillmentRequest) -> Result<FulfillmentCommit> {
        let mut tx = self.pool.begin().await?;

        // Concurrent deliveries of the same event block here until the first
        // transaction finishes.
        let claimed = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, processed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&request.event_id)
        .bind(&request.event_type)
        .bind(request.now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            let order_id: Option<Uuid> =
                sqlx::query_scalar("SELECT order_id FROM processed_events WHERE event_id = $1")
                    .bind(&request.event_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Ok(FulfillmentCommit::AlreadyProcessed {
                order_id: order_id.map(OrderId::from_uuid),
            });
        }

        let cart_row = sqlx::query(
            "SELECT id, owner_id, created_at, updated_at FROM carts WHERE id = $1 FOR UPDATE",
        )
        .bind(request.cart_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("Cart", request.cart_id))?;
        let cart = row_to_cart(&cart_row)?;

        let lines = sqlx::query(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 ORDER BY added_at ASC, id ASC"
        ))
        .bind(cart.id.as_uuid())
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(row_to_cart_item)
        .collect::<Result<Vec<_>>>()?;

        if lines.is_empty() {
            // Dropping the transaction releases the event claim.
            return Ok(FulfillmentCommit::EmptyCart);
        }

        let mut product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id.as_uuid()).collect();
        product_ids.sort();
        product_ids.dedup();

        // Locked in id order so concurrent fulfillments cannot deadlock.
        let mut products: HashMap<ProductId, Product> = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row_to_product(row).map(|p| (p.id, p)))
        .collect::<Result<_>>()?;

        let plan = plan_fulfillment(
            cart.owner,
            request.order_number,
            &lines,
            &mut products,
            request.now,
        )?;
        let order = &plan.order;

        sqlx::query(
            r#"
            INSERT INTO orders (id, owner_id, order_number, total_cents, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.owner.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.total_price.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in &plan.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(i64::from(item.quantity))
            .bind(item.price.cents())
            .execute(&mut *tx)
            .await?;
        }

        for adjustment in &plan.adjustments {
            sqlx::query(
                "UPDATE products SET stock = $2, available = $3, updated_at = $4 WHERE id = $1",
            )
            .bind(adjustment.product_id.as_uuid())
            .bind(i64::from(adjustment.new_stock))
            .bind(adjustment.available)
            .bind(request.now)
            .execute(&mut *tx)
            .await?;

            if adjustment.is_oversold() {
                sqlx::query(
                    r#"
                    INSERT INTO inventory_oversells (order_id, product_id, shortfall, recorded_at)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(order.id.as_uuid())
                .bind(adjustment.product_id.as_uuid())
                .bind(i64::from(adjustment.shortfall()))
                .bind(request.now)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("UPDATE processed_events SET order_id = $2 WHERE event_id = $1")
            .bind(&request.event_id)
            .bind(order.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(order_id = %plan.order.id, "fulfillment committed");

        Ok(FulfillmentCommit::Committed(Box::new(plan)))
    }

    async fn list_oversells(&self) -> Result<Vec<OversellRecord>> {
        let rows = sqlx::query(
            "SELECT order_id, product_id, shortfall, recorded_at FROM inventory_oversells ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<OversellRecord> {
                Ok(OversellRecord {
                    order_id: OrderId::from_uuid(row.try_get("order_id")?),
                    product_id: ProductId::from_uuid(row.try_get("product_id")?),
                    shortfall: get_u32(row, "shortfall")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }
}
