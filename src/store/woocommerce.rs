//! WooCommerce REST store
//!
//! `DataAccess` over the WooCommerce REST API (`/wp-json/wc/v3`). Aggregates
//! the API does not expose directly are computed client-side from paged
//! listings. `Limit::Unbounded` pages until the collection is exhausted.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::models::*;
use super::DataAccess;
use crate::error::{AssistantError, Result};

/// WooCommerce caps `per_page` at 100
const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone)]
pub struct WooCommerceSettings {
    pub base_url: url::Url,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct WooCommerceStore {
    settings: WooCommerceSettings,
    client: reqwest::Client,
}

impl WooCommerceStore {
    pub fn new(settings: WooCommerceSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/wp-json/wc/v3/{}",
            self.settings.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(self.endpoint(path))
            .basic_auth(
                &self.settings.consumer_key,
                Some(&self.settings.consumer_secret),
            )
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Upstream { status, body });
        }
        Ok(response)
    }

    /// Fetch a paged collection, stopping at the limit or the last page
    async fn fetch_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        limit: Limit,
    ) -> Result<Vec<T>> {
        let per_page = match limit.cap() {
            Some(0) => return Ok(Vec::new()),
            Some(n) => n.min(MAX_PER_PAGE),
            None => MAX_PER_PAGE,
        };

        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let mut query = params.to_vec();
            query.push(("per_page", per_page.to_string()));
            query.push(("page", page.to_string()));

            let response = self.get(path, &query).await?;
            let total_pages = header_number(&response, "x-wp-totalpages");
            let batch: Vec<T> = response.json().await?;
            let fetched = batch.len();
            items.extend(batch);

            if let Some(cap) = limit.cap() {
                if items.len() >= cap {
                    items.truncate(cap);
                    break;
                }
            }
            if fetched < per_page || total_pages.map_or(false, |total| page >= total) {
                break;
            }
            page += 1;
        }

        tracing::debug!(path, count = items.len(), pages = page, "Fetched WooCommerce collection");
        Ok(items)
    }

    async fn fetch_orders(&self, query: &StoreQuery) -> Result<Vec<Order>> {
        let raw: Vec<WcOrder> = self
            .fetch_pages("orders", &order_params(query), query.limit)
            .await?;
        Ok(raw.into_iter().map(Order::from).collect())
    }

    async fn fetch_products(&self, query: &StoreQuery) -> Result<Vec<Product>> {
        let mut params = vec![("status", "publish".to_string())];
        if let Some(status) = query.stock_status {
            params.push(("stock_status", status.as_str().to_string()));
        }
        let raw: Vec<WcProduct> = self.fetch_pages("products", &params, query.limit).await?;
        Ok(raw.into_iter().map(Product::from).collect())
    }
}

fn header_number(response: &reqwest::Response, name: &str) -> Option<usize> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn order_params(query: &StoreQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("orderby", "date".to_string()),
        ("order", "desc".to_string()),
    ];
    if let Some(status) = query.status {
        params.push(("status", status.as_str().to_string()));
    }
    if query.created_after.is_some() || query.created_before.is_some() {
        params.push(("dates_are_gmt", "true".to_string()));
    }
    if let Some(after) = query.created_after {
        params.push(("after", after.format("%Y-%m-%dT%H:%M:%S").to_string()));
    }
    if let Some(before) = query.created_before {
        params.push(("before", before.format("%Y-%m-%dT%H:%M:%S").to_string()));
    }
    params
}

fn parse_money(value: &str) -> Decimal {
    Decimal::from_str(value.trim()).unwrap_or(Decimal::ZERO)
}

fn parse_gmt(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S").ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct WcBilling {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct WcLineItem {
    name: String,
    quantity: u32,
    #[serde(default)]
    total: String,
}

#[derive(Debug, Deserialize)]
struct WcOrderRefund {
    id: u64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    total: String,
}

#[derive(Debug, Deserialize)]
struct WcOrder {
    id: u64,
    #[serde(default)]
    number: String,
    status: String,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    total: String,
    date_created_gmt: Option<String>,
    billing: Option<WcBilling>,
    #[serde(default)]
    line_items: Vec<WcLineItem>,
    #[serde(default)]
    refunds: Vec<WcOrderRefund>,
}

impl From<WcOrder> for Order {
    fn from(raw: WcOrder) -> Self {
        let (customer_name, customer_email) = match raw.billing {
            Some(b) => (
                format!("{} {}", b.first_name, b.last_name).trim().to_string(),
                Some(b.email).filter(|e| !e.is_empty()),
            ),
            None => (String::new(), None),
        };
        Order {
            id: raw.id,
            number: if raw.number.is_empty() {
                raw.id.to_string()
            } else {
                raw.number
            },
            status: raw.status.parse().unwrap_or(OrderStatus::Pending),
            total: parse_money(&raw.total),
            currency: raw.currency,
            customer_name,
            customer_email,
            created_at: parse_gmt(raw.date_created_gmt.as_deref()).unwrap_or_else(Utc::now),
            items: raw
                .line_items
                .into_iter()
                .map(|li| OrderItem {
                    name: li.name,
                    quantity: li.quantity,
                    total: parse_money(&li.total),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WcNamed {
    name: String,
}

/// WooCommerce sends `total_sales` as a number on some versions and a string
/// on others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WcCount {
    Number(u64),
    Text(String),
}

impl WcCount {
    fn value(&self) -> u64 {
        match self {
            WcCount::Number(n) => *n,
            WcCount::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WcProduct {
    id: u64,
    name: String,
    #[serde(default)]
    sku: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    stock_status: Option<String>,
    stock_quantity: Option<i64>,
    #[serde(default)]
    manage_stock: bool,
    total_sales: Option<WcCount>,
    #[serde(default)]
    categories: Vec<WcNamed>,
}

impl From<WcProduct> for Product {
    fn from(raw: WcProduct) -> Self {
        Product {
            id: raw.id,
            name: raw.name,
            sku: raw.sku,
            price: parse_money(&raw.price),
            stock_status: raw
                .stock_status
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(StockStatus::InStock),
            stock_quantity: if raw.manage_stock {
                raw.stock_quantity
            } else {
                None
            },
            total_sales: raw.total_sales.map(|c| c.value()).unwrap_or(0),
            categories: raw.categories.into_iter().map(|c| c.name).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WcCustomer {
    id: u64,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    date_created_gmt: Option<String>,
    // Present on legacy (v2) payloads only
    orders_count: Option<u64>,
    total_spent: Option<String>,
}

impl From<WcCustomer> for Customer {
    fn from(raw: WcCustomer) -> Self {
        let name = format!("{} {}", raw.first_name, raw.last_name).trim().to_string();
        Customer {
            id: raw.id,
            name: if name.is_empty() { raw.email.clone() } else { name },
            email: raw.email,
            orders_count: raw.orders_count.unwrap_or(0),
            total_spent: raw
                .total_spent
                .as_deref()
                .map(parse_money)
                .unwrap_or(Decimal::ZERO),
            created_at: parse_gmt(raw.date_created_gmt.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WcTerm {
    id: u64,
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct WcCoupon {
    id: u64,
    code: String,
    #[serde(default)]
    discount_type: String,
    #[serde(default)]
    amount: String,
    #[serde(default)]
    usage_count: u64,
    date_expires_gmt: Option<String>,
}

impl From<WcCoupon> for Coupon {
    fn from(raw: WcCoupon) -> Self {
        Coupon {
            id: raw.id,
            code: raw.code,
            discount_type: raw.discount_type,
            amount: parse_money(&raw.amount),
            usage_count: raw.usage_count,
            expires_at: parse_gmt(raw.date_expires_gmt.as_deref()),
        }
    }
}

// ============================================================================
// DataAccess
// ============================================================================

#[async_trait]
impl DataAccess for WooCommerceStore {
    async fn list_orders(&self, query: &StoreQuery) -> Result<Vec<Order>> {
        self.fetch_orders(query).await
    }

    async fn order_statistics(&self, query: &StoreQuery) -> Result<OrderStatistics> {
        let mut all = query.clone();
        all.limit = Limit::Unbounded;
        let orders = self.fetch_orders(&all).await?;
        Ok(OrderStatistics::from_orders(&orders))
    }

    async fn sales_by_period(
        &self,
        period: Period,
        query: &StoreQuery,
    ) -> Result<Vec<PeriodTotal>> {
        let mut all = query.clone();
        all.limit = Limit::Unbounded;
        let orders = self.fetch_orders(&all).await?;
        Ok(bucket_orders(&orders, period))
    }

    async fn top_products(&self, limit: u32) -> Result<Vec<ProductSales>> {
        let params = vec![
            ("orderby", "popularity".to_string()),
            ("order", "desc".to_string()),
        ];
        let raw: Vec<WcProduct> = self
            .fetch_pages("products", &params, Limit::Count(limit))
            .await?;
        Ok(raw
            .into_iter()
            .map(Product::from)
            .map(|p| ProductSales::from(&p))
            .collect())
    }

    async fn customer_summary(&self) -> Result<CustomerSummary> {
        let response = self
            .get(
                "customers",
                &[("role", "all".to_string()), ("per_page", "1".to_string())],
            )
            .await?;
        let total_customers = header_number(&response, "x-wp-total").unwrap_or(0) as u64;

        let paid: Vec<WcOrder> = self
            .fetch_pages(
                "orders",
                &[("status", "processing,completed".to_string())],
                Limit::Unbounded,
            )
            .await?;
        let spent: Decimal = paid.iter().map(|o| parse_money(&o.total)).sum();
        let avg_lifetime_spent = if total_customers == 0 {
            Decimal::ZERO
        } else {
            (spent / Decimal::from(total_customers)).round_dp(2)
        };

        Ok(CustomerSummary {
            total_customers,
            avg_lifetime_spent,
        })
    }

    async fn list_customers(&self, query: &StoreQuery) -> Result<Vec<Customer>> {
        let params = vec![
            ("role", "all".to_string()),
            ("orderby", "registered_date".to_string()),
            ("order", "desc".to_string()),
        ];
        let raw: Vec<WcCustomer> = self.fetch_pages("customers", &params, query.limit).await?;
        Ok(raw.into_iter().map(Customer::from).collect())
    }

    async fn list_products(&self, query: &StoreQuery) -> Result<Vec<Product>> {
        self.fetch_products(query).await
    }

    async fn list_categories(&self, query: &StoreQuery) -> Result<Vec<Category>> {
        let raw: Vec<WcTerm> = self
            .fetch_pages("products/categories", &[], query.limit)
            .await?;
        Ok(raw
            .into_iter()
            .map(|t| Category {
                id: t.id,
                name: t.name,
                slug: t.slug,
                product_count: t.count,
            })
            .collect())
    }

    async fn list_tags(&self, query: &StoreQuery) -> Result<Vec<Tag>> {
        let raw: Vec<WcTerm> = self.fetch_pages("products/tags", &[], query.limit).await?;
        Ok(raw
            .into_iter()
            .map(|t| Tag {
                id: t.id,
                name: t.name,
                slug: t.slug,
                product_count: t.count,
            })
            .collect())
    }

    async fn list_coupons(&self, query: &StoreQuery) -> Result<Vec<Coupon>> {
        let raw: Vec<WcCoupon> = self.fetch_pages("coupons", &[], query.limit).await?;
        Ok(raw.into_iter().map(Coupon::from).collect())
    }

    async fn list_refunds(&self, query: &StoreQuery) -> Result<Vec<Refund>> {
        let orders_query = query.clone().with_status(Some(OrderStatus::Refunded));
        let raw: Vec<WcOrder> = self
            .fetch_pages("orders", &order_params(&orders_query), query.limit)
            .await?;

        let refunds = raw.into_iter().flat_map(|order| {
            let created_at =
                parse_gmt(order.date_created_gmt.as_deref()).unwrap_or_else(Utc::now);
            let order_id = order.id;
            order.refunds.into_iter().map(move |r| Refund {
                id: r.id,
                order_id,
                amount: parse_money(&r.total).abs(),
                reason: r.reason,
                created_at,
            })
        });
        Ok(query.limit.apply(refunds))
    }

    async fn stock_levels(&self, query: &StoreQuery) -> Result<Vec<StockItem>> {
        let products = self.fetch_products(query).await?;
        Ok(products.iter().map(StockItem::from).collect())
    }

    async fn inventory_summary(&self) -> Result<InventorySummary> {
        let products = self.fetch_products(&StoreQuery::unbounded()).await?;
        Ok(InventorySummary::from_products(
            &products,
            InventorySummary::DEFAULT_LOW_STOCK_THRESHOLD,
        ))
    }
}
