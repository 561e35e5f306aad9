//! Store data access
//!
//! The assistant never talks to WooCommerce directly; it goes through the
//! [`DataAccess`] trait so the executor can be driven by the REST client in
//! production and by the in-memory store in tests.

pub mod memory;
pub mod models;
pub mod woocommerce;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::InMemoryStore;
pub use models::{
    Category, Coupon, Customer, CustomerSummary, InventorySummary, Limit, Order, OrderItem,
    OrderStatistics, OrderStatus, Period, PeriodTotal, Product, ProductSales, Refund, StockItem,
    StockStatus, StoreQuery, Tag,
};
pub use woocommerce::{WooCommerceSettings, WooCommerceStore};

/// Data-fetch operations over the fixed WooCommerce entity set.
///
/// Every list operation honours `StoreQuery::limit`, including the
/// `Limit::Unbounded` sentinel.
#[async_trait]
pub trait DataAccess: Send + Sync {
    async fn list_orders(&self, query: &StoreQuery) -> Result<Vec<Order>>;

    /// Aggregate over every order matching the status/date filters
    async fn order_statistics(&self, query: &StoreQuery) -> Result<OrderStatistics>;

    async fn sales_by_period(&self, period: Period, query: &StoreQuery)
        -> Result<Vec<PeriodTotal>>;

    /// Best sellers by units sold, highest first
    async fn top_products(&self, limit: u32) -> Result<Vec<ProductSales>>;

    async fn customer_summary(&self) -> Result<CustomerSummary>;

    async fn list_customers(&self, query: &StoreQuery) -> Result<Vec<Customer>>;

    async fn list_products(&self, query: &StoreQuery) -> Result<Vec<Product>>;

    async fn list_categories(&self, query: &StoreQuery) -> Result<Vec<Category>>;

    async fn list_tags(&self, query: &StoreQuery) -> Result<Vec<Tag>>;

    async fn list_coupons(&self, query: &StoreQuery) -> Result<Vec<Coupon>>;

    async fn list_refunds(&self, query: &StoreQuery) -> Result<Vec<Refund>>;

    /// Per-product stock, filtered by `StoreQuery::stock_status`
    async fn stock_levels(&self, query: &StoreQuery) -> Result<Vec<StockItem>>;

    async fn inventory_summary(&self) -> Result<InventorySummary>;
}
