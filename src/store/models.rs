//! Store data shapes
//!
//! Records returned by a [`DataAccess`](super::DataAccess) implementation and
//! the query shape every list operation accepts. Money is carried as
//! `Decimal` so aggregates do not drift.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Limit
// ============================================================================

/// Row cap for a list operation.
///
/// `Unbounded` is the reserved `-1` sentinel meaning "no limit clause". It is
/// distinct from "no limit specified", which callers express as
/// `Option::<Limit>::None` and resolve to a per-tool default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u32),
    Unbounded,
}

impl Limit {
    pub const UNBOUNDED_SENTINEL: i64 = -1;

    /// Interpret a raw integer; only the exact sentinel means unbounded.
    /// Other non-positive values collapse to zero rows.
    pub fn from_raw(value: i64) -> Self {
        if value == Self::UNBOUNDED_SENTINEL {
            Limit::Unbounded
        } else {
            Limit::Count(value.clamp(0, u32::MAX as i64) as u32)
        }
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            Limit::Count(n) => *n as i64,
            Limit::Unbounded => Self::UNBOUNDED_SENTINEL,
        }
    }

    /// Row cap as a `take` argument, `None` when unbounded
    pub fn cap(&self) -> Option<usize> {
        match self {
            Limit::Count(n) => Some(*n as usize),
            Limit::Unbounded => None,
        }
    }

    /// Apply the cap to an iterator
    pub fn apply<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        match self.cap() {
            Some(n) => items.take(n).collect(),
            None => items.collect(),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_raw())
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(Limit::from_raw(raw))
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// WooCommerce order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::OnHold,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
        }
    }

    /// Statuses whose totals count as revenue
    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type for parsing store enumerations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError(String);

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseEnumError {}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let value = lowered.strip_prefix("wc-").unwrap_or(&lowered);
        match value {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "on-hold" | "on hold" | "on_hold" | "onhold" => Ok(OrderStatus::OnHold),
            "completed" | "complete" => Ok(OrderStatus::Completed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(ParseEnumError(format!("Unknown order status '{}'", other))),
        }
    }
}

/// Product stock status as WooCommerce reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    OnBackorder,
}

impl StockStatus {
    pub const ALL: [StockStatus; 3] = [
        StockStatus::InStock,
        StockStatus::OutOfStock,
        StockStatus::OnBackorder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "instock",
            StockStatus::OutOfStock => "outofstock",
            StockStatus::OnBackorder => "onbackorder",
        }
    }
}

impl FromStr for StockStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "instock" => Ok(StockStatus::InStock),
            "outofstock" => Ok(StockStatus::OutOfStock),
            "onbackorder" | "backorder" => Ok(StockStatus::OnBackorder),
            other => Err(ParseEnumError(format!("Unknown stock status '{}'", other))),
        }
    }
}

/// Bucket size for time-series sales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Day, Period::Week, Period::Month, Period::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// First day of the bucket containing `date`
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => date,
            Period::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Period::Month => date.with_day(1).unwrap_or(date),
            Period::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        }
    }

    pub fn label(&self, bucket_start: NaiveDate) -> String {
        match self {
            Period::Day => bucket_start.format("%Y-%m-%d").to_string(),
            Period::Week => {
                let iso = bucket_start.iso_week();
                format!("{}-W{:02}", iso.year(), iso.week())
            }
            Period::Month => bucket_start.format("%Y-%m").to_string(),
            Period::Year => bucket_start.format("%Y").to_string(),
        }
    }
}

impl FromStr for Period {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(Period::Day),
            "week" | "weekly" => Ok(Period::Week),
            "month" | "monthly" => Ok(Period::Month),
            "year" | "yearly" | "annual" => Ok(Period::Year),
            other => Err(ParseEnumError(format!("Unknown period '{}'", other))),
        }
    }
}

// ============================================================================
// Query
// ============================================================================

/// Filters handed to the data layer.
///
/// Date bounds are already expanded to start-of-day / end-of-day instants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreQuery {
    pub limit: Limit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_status: Option<StockStatus>,
}

impl StoreQuery {
    pub fn new(limit: Limit) -> Self {
        Self {
            limit,
            status: None,
            created_after: None,
            created_before: None,
            stock_status: None,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(Limit::Unbounded)
    }

    pub fn with_status(mut self, status: Option<OrderStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_stock_status(mut self, status: Option<StockStatus>) -> Self {
        self.stock_status = status;
        self
    }

    pub fn with_created_range(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_after = after;
        self.created_before = before;
        self
    }

    /// Whether an order passes the status and date filters (the limit is
    /// applied separately).
    pub fn matches_order(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.created_after.map_or(true, |t| order.created_at >= t)
            && self.created_before.map_or(true, |t| order.created_at <= t)
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub number: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: String,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatistics {
    pub order_count: u64,
    /// Orders counted towards revenue, see [`OrderStatus::is_paid`]
    pub paid_order_count: u64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl OrderStatistics {
    /// Aggregate a set of already-filtered orders. Revenue and the average
    /// cover paid orders only; `order_count` covers all of them.
    pub fn from_orders(orders: &[Order]) -> Self {
        let paid: Vec<&Order> = orders.iter().filter(|o| o.status.is_paid()).collect();
        let paid_order_count = paid.len() as u64;
        let total_revenue: Decimal = paid.iter().map(|o| o.total).sum();
        let average_order_value = if paid_order_count == 0 {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(paid_order_count)).round_dp(2)
        };
        Self {
            order_count: orders.len() as u64,
            paid_order_count,
            total_revenue: total_revenue.round_dp(2),
            average_order_value,
            currency: orders.first().map(|o| o.currency.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotal {
    pub period: String,
    pub period_start: NaiveDate,
    pub order_count: u64,
    pub revenue: Decimal,
}

/// Bucket orders into chronologically ordered period totals
pub fn bucket_orders(orders: &[Order], period: Period) -> Vec<PeriodTotal> {
    let mut buckets: BTreeMap<NaiveDate, (u64, Decimal)> = BTreeMap::new();
    for order in orders {
        let start = period.bucket_start(order.created_at.date_naive());
        let entry = buckets.entry(start).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        if order.status.is_paid() {
            entry.1 += order.total;
        }
    }
    buckets
        .into_iter()
        .map(|(start, (count, revenue))| PeriodTotal {
            period: period.label(start),
            period_start: start,
            order_count: count,
            revenue: revenue.round_dp(2),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sku: String,
    pub price: Decimal,
    pub stock_status: StockStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub total_sales: u64,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSales {
    pub id: u64,
    pub name: String,
    pub total_sales: u64,
    pub price: Decimal,
}

impl From<&Product> for ProductSales {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            total_sales: p.total_sales,
            price: p.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub orders_count: u64,
    #[serde(default)]
    pub total_spent: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub total_customers: u64,
    pub avg_lifetime_spent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub product_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub product_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: u64,
    pub code: String,
    pub discount_type: String,
    pub amount: Decimal,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: u64,
    pub order_id: u64,
    pub amount: Decimal,
    #[serde(default)]
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub product_id: u64,
    pub name: String,
    pub sku: String,
    pub stock_status: StockStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
}

impl From<&Product> for StockItem {
    fn from(p: &Product) -> Self {
        Self {
            product_id: p.id,
            name: p.name.clone(),
            sku: p.sku.clone(),
            stock_status: p.stock_status,
            stock_quantity: p.stock_quantity,
        }
    }
}

/// Store-wide stock aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub product_count: u64,
    pub managed_product_count: u64,
    pub total_units: i64,
    pub in_stock: u64,
    pub out_of_stock: u64,
    pub on_backorder: u64,
    pub low_stock: u64,
    pub low_stock_threshold: i64,
}

impl InventorySummary {
    pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

    pub fn from_products(products: &[Product], low_stock_threshold: i64) -> Self {
        let count_status = |status: StockStatus| {
            products.iter().filter(|p| p.stock_status == status).count() as u64
        };
        let managed: Vec<i64> = products.iter().filter_map(|p| p.stock_quantity).collect();
        Self {
            product_count: products.len() as u64,
            managed_product_count: managed.len() as u64,
            total_units: managed.iter().filter(|q| **q > 0).sum(),
            in_stock: count_status(StockStatus::InStock),
            out_of_stock: count_status(StockStatus::OutOfStock),
            on_backorder: count_status(StockStatus::OnBackorder),
            low_stock: managed
                .iter()
                .filter(|q| **q > 0 && **q <= low_stock_threshold)
                .count() as u64,
            low_stock_threshold,
        }
    }
}
