//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::QueryAs;
use sqlx::types::Json;
use sqlx::Postgres;
use uuid::Uuid;

use super::{Page, PaymentOutcome, ProductFilter, Store};
use crate::domain::aggregates::{Coupon, FulfillmentStatus, Order, OrderItem, PaymentUpdate, Product, Review, ShippingAddress, User};
use crate::domain::stats::SalesStats;
use crate::domain::value_objects::{CouponCode, Discount};
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid, fullname: String, email: String, password_hash: String, is_admin: bool,
    has_shipping_address: bool, shipping_address: Option<Json<ShippingAddress>>, order_ids: Vec<Uuid>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id, fullname: r.fullname, email: r.email, password_hash: r.password_hash, is_admin: r.is_admin,
            has_shipping_address: r.has_shipping_address, shipping_address: r.shipping_address.map(|j| j.0),
            orders: r.order_ids, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, description: String, brand: String, category: String,
    sizes: Vec<String>, colors: Vec<String>, images: Vec<String>, price: Decimal,
    total_qty: i32, total_sold: i32, user_id: Uuid, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id, name: r.name, description: r.description, brand: r.brand, category: r.category,
            sizes: r.sizes, colors: r.colors, images: r.images, price: r.price, total_qty: r.total_qty,
            total_sold: r.total_sold, user_id: r.user_id, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow { id: Uuid, product_id: Uuid, user_id: Uuid, message: String, rating: i16, created_at: DateTime<Utc> }

impl TryFrom<ReviewRow> for Review {
    type Error = EcommerceError;
    fn try_from(r: ReviewRow) -> Result<Self> {
        let rating = u8::try_from(r.rating).map_err(|_| corrupt("review", format!("rating {}", r.rating)))?;
        Ok(Self { id: r.id, product_id: r.product_id, user_id: r.user_id, message: r.message, rating, created_at: r.created_at })
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid, code: String, discount: Decimal, start_date: DateTime<Utc>, end_date: DateTime<Utc>,
    user_id: Uuid, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = EcommerceError;
    fn try_from(r: CouponRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            code: CouponCode::new(r.code).map_err(|e| corrupt("coupon", e))?,
            discount: Discount::new(r.discount).map_err(|e| corrupt("coupon", e))?,
            start_date: r.start_date, end_date: r.end_date, user_id: r.user_id,
            created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, user_id: Uuid, order_items: Json<Vec<OrderItem>>,
    shipping_address: Json<ShippingAddress>, total_price: Decimal, currency: String,
    payment_status: String, payment_method: Option<String>, status: String, coupon_code: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = EcommerceError;
    fn try_from(r: OrderRow) -> Result<Self> {
        Ok(Self {
            id: r.id, order_number: r.order_number, user_id: r.user_id, order_items: r.order_items.0,
            shipping_address: r.shipping_address.0, total_price: r.total_price, currency: r.currency,
            payment_status: r.payment_status.into(), payment_method: r.payment_method,
            status: r.status.parse().map_err(|_| corrupt("order", format!("status {:?}", r.status)))?,
            coupon_code: r.coupon_code, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    order_count: i64, minimum_sale: Option<Decimal>, maximum_sale: Option<Decimal>,
    total_sales: Decimal, avg_sale: Option<Decimal>, sale_today: Decimal,
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> EcommerceError {
    EcommerceError::StorageError(format!("unreadable {what} row: {detail}"))
}

/// Maps a unique-constraint violation to `Conflict` with the given message.
fn unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> EcommerceError {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => EcommerceError::Conflict(message.to_string()),
        _ => err.into(),
    }
}

fn orders_from(rows: Vec<OrderRow>) -> Result<Vec<Order>> { rows.into_iter().map(Order::try_from).collect() }

/// `%`, `_` and `\` in user input match literally.
fn like_pattern(needle: &Option<String>) -> Option<String> {
    needle.as_ref().map(|n| n.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"))
}

const PRODUCT_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
      AND ($2::text IS NULL OR brand ILIKE '%' || $2 || '%')
      AND ($3::text IS NULL OR category ILIKE '%' || $3 || '%')
      AND ($4::text IS NULL OR EXISTS (SELECT 1 FROM unnest(colors) c WHERE c ILIKE '%' || $4 || '%'))
      AND ($5::text IS NULL OR EXISTS (SELECT 1 FROM unnest(sizes) s WHERE s ILIKE '%' || $5 || '%'))
      AND ($6::numeric IS NULL OR price >= $6)
      AND ($7::numeric IS NULL OR price <= $7)"#;

fn bind_filter<'q, O>(query: QueryAs<'q, Postgres, O, PgArguments>, f: &ProductFilter) -> QueryAs<'q, Postgres, O, PgArguments> {
    query
        .bind(like_pattern(&f.name)).bind(like_pattern(&f.brand)).bind(like_pattern(&f.category))
        .bind(like_pattern(&f.color)).bind(like_pattern(&f.size))
        .bind(f.price_min).bind(f.price_max)
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, fullname, email, password_hash, is_admin, has_shipping_address, shipping_address, order_ids, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
            .bind(user.id).bind(&user.fullname).bind(&user.email).bind(&user.password_hash).bind(user.is_admin)
            .bind(user.has_shipping_address).bind(user.shipping_address.as_ref().map(Json)).bind(&user.orders)
            .bind(user.created_at).bind(user.updated_at)
            .execute(&self.pool).await.map_err(unique("User already exists"))?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(&self.pool).await?;
        Ok(row.map(User::from))
    }

    async fn update_shipping_address(&self, id: Uuid, address: &ShippingAddress) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("UPDATE users SET shipping_address = $2, has_shipping_address = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id).bind(Json(address)).fetch_optional(&self.pool).await?;
        Ok(row.map(User::from))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn create_product(&self, p: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, name, description, brand, category, sizes, colors, images, price, total_qty, total_sold, user_id, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)")
            .bind(p.id).bind(&p.name).bind(&p.description).bind(&p.brand).bind(&p.category)
            .bind(&p.sizes).bind(&p.colors).bind(&p.images).bind(p.price).bind(p.total_qty).bind(p.total_sold)
            .bind(p.user_id).bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await.map_err(unique("Product already exists"))?;
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Product::from))
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE name = $1").bind(name).fetch_optional(&self.pool).await?;
        Ok(row.map(Product::from))
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)").bind(ids.to_vec()).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list_products(&self, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, u64)> {
        let list_sql = format!("SELECT * FROM products {PRODUCT_FILTER} ORDER BY created_at DESC LIMIT $8 OFFSET $9");
        let rows = bind_filter(sqlx::query_as::<_, ProductRow>(&list_sql), filter)
            .bind(i64::from(page.limit)).bind(page.offset() as i64)
            .fetch_all(&self.pool).await?;
        let count_sql = format!("SELECT COUNT(*) FROM products {PRODUCT_FILTER}");
        let (total,): (i64,) = bind_filter(sqlx::query_as(&count_sql), filter).fetch_one(&self.pool).await?;
        Ok((rows.into_iter().map(Product::from).collect(), total.max(0) as u64))
    }

    async fn update_product(&self, p: &Product) -> Result<bool> {
        let done = sqlx::query("UPDATE products SET name = $2, description = $3, brand = $4, category = $5, sizes = $6, colors = $7, images = $8, price = $9, total_qty = $10, updated_at = $11 WHERE id = $1")
            .bind(p.id).bind(&p.name).bind(&p.description).bind(&p.brand).bind(&p.category)
            .bind(&p.sizes).bind(&p.colors).bind(&p.images).bind(p.price).bind(p.total_qty).bind(p.updated_at)
            .execute(&self.pool).await.map_err(unique("Product already exists"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn create_review(&self, r: &Review) -> Result<()> {
        sqlx::query("INSERT INTO reviews (id, product_id, user_id, message, rating, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(r.id).bind(r.product_id).bind(r.user_id).bind(&r.message).bind(i16::from(r.rating)).bind(r.created_at)
            .execute(&self.pool).await
            .map_err(|err| match &err {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => EcommerceError::not_found("Product"),
                _ => unique("You have already reviewed this product")(err),
            })?;
        Ok(())
    }

    async fn list_reviews(&self, product_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>("SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at")
            .bind(product_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(Review::try_from).collect()
    }

    async fn create_coupon(&self, c: &Coupon) -> Result<()> {
        sqlx::query("INSERT INTO coupons (id, code, discount, start_date, end_date, user_id, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(c.id).bind(c.code.as_str()).bind(c.discount.percent()).bind(c.start_date).bind(c.end_date)
            .bind(c.user_id).bind(c.created_at).bind(c.updated_at)
            .execute(&self.pool).await.map_err(unique("Coupon already exists"))?;
        Ok(())
    }

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn find_coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1").bind(code.as_str()).fetch_optional(&self.pool).await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    async fn update_coupon(&self, c: &Coupon) -> Result<bool> {
        let done = sqlx::query("UPDATE coupons SET code = $2, discount = $3, start_date = $4, end_date = $5, updated_at = $6 WHERE id = $1")
            .bind(c.id).bind(c.code.as_str()).bind(c.discount.percent()).bind(c.start_date).bind(c.end_date).bind(c.updated_at)
            .execute(&self.pool).await.map_err(unique("Coupon already exists"))?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn commit_order(&self, o: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO orders (id, order_number, user_id, order_items, shipping_address, total_price, currency, payment_status, payment_method, status, coupon_code, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)")
            .bind(o.id).bind(&o.order_number).bind(o.user_id).bind(Json(&o.order_items)).bind(Json(&o.shipping_address))
            .bind(o.total_price).bind(&o.currency).bind(o.payment_status.as_str()).bind(&o.payment_method)
            .bind(o.status.to_string()).bind(&o.coupon_code).bind(o.created_at).bind(o.updated_at)
            .execute(&mut *tx).await?;

        for (product_id, qty) in o.quantities() {
            let qty = i32::try_from(qty).map_err(|_| EcommerceError::Validation(format!("Quantity for product {product_id} is too large")))?;
            // atomic increment; concurrent orders never lose a sale
            let done = sqlx::query("UPDATE products SET total_sold = total_sold + $2, updated_at = NOW() WHERE id = $1")
                .bind(product_id).bind(qty).execute(&mut *tx).await?;
            if done.rows_affected() == 0 {
                return Err(EcommerceError::Validation(format!("Product {product_id} not found")));
            }
        }

        // orders outlive their owner, so the owner is checked here rather than by a foreign key
        let linked = sqlx::query("UPDATE users SET order_ids = array_append(order_ids, $2), updated_at = NOW() WHERE id = $1")
            .bind(o.user_id).bind(o.id).execute(&mut *tx).await?;
        if linked.rows_affected() == 0 {
            return Err(EcommerceError::not_found("User"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        orders_from(sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC").fetch_all(&self.pool).await?)
    }

    async fn find_orders(&self, ids: &[Uuid]) -> Result<Vec<Order>> {
        orders_from(sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = ANY($1) ORDER BY created_at DESC").bind(ids.to_vec()).fetch_all(&self.pool).await?)
    }

    async fn update_order_status(&self, id: Uuid, status: FulfillmentStatus) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id).bind(status.to_string()).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let owner: Option<(Uuid,)> = sqlx::query_as("DELETE FROM orders WHERE id = $1 RETURNING user_id").bind(id).fetch_optional(&mut *tx).await?;
        let Some((user_id,)) = owner else { return Ok(false) };
        sqlx::query("UPDATE users SET order_ids = array_remove(order_ids, $2) WHERE id = $1").bind(user_id).bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn apply_payment(&self, event_id: &str, order_id: Uuid, update: &PaymentUpdate) -> Result<PaymentOutcome> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query("INSERT INTO processed_webhook_events (event_id, order_id) VALUES ($1, $2) ON CONFLICT (event_id) DO NOTHING")
            .bind(event_id).bind(order_id).execute(&mut *tx).await?;
        if claimed.rows_affected() == 0 {
            return Ok(PaymentOutcome::Duplicate);
        }

        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE").bind(order_id).fetch_optional(&mut *tx).await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(PaymentOutcome::OrderNotFound);
        };
        let mut order = Order::try_from(row)?;
        if order.payment_status.is_paid() {
            tx.commit().await?;
            return Ok(PaymentOutcome::AlreadyPaid);
        }

        order.apply_payment(update);
        sqlx::query("UPDATE orders SET payment_status = $2, payment_method = $3, total_price = $4, currency = $5, updated_at = $6 WHERE id = $1")
            .bind(order.id).bind(order.payment_status.as_str()).bind(&order.payment_method)
            .bind(order.total_price).bind(&order.currency).bind(order.updated_at)
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(PaymentOutcome::Applied(order))
    }

    async fn sales_stats(&self, today_start: DateTime<Utc>) -> Result<SalesStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            "SELECT COUNT(*) AS order_count, MIN(total_price) AS minimum_sale, MAX(total_price) AS maximum_sale, \
             COALESCE(SUM(total_price), 0) AS total_sales, AVG(total_price) AS avg_sale, \
             COALESCE(SUM(total_price) FILTER (WHERE created_at >= $1), 0) AS sale_today FROM orders",
        )
        .bind(today_start)
        .fetch_one(&self.pool)
        .await?;
        Ok(SalesStats {
            order_count: row.order_count,
            minimum_sale: row.minimum_sale,
            maximum_sale: row.maximum_sale,
            total_sales: row.total_sales,
            avg_sale: row.avg_sale.map(|avg| avg.normalize()),
            sale_today: row.sale_today,
        })
    }
}
