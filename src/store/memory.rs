//! In-memory store
//!
//! Holds records in plain vectors. Used by the test-suite and by the server
//! when no WooCommerce credentials are configured.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use super::models::*;
use super::DataAccess;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    orders: Vec<Order>,
    products: Vec<Product>,
    customers: Vec<Customer>,
    categories: Vec<Category>,
    tags: Vec<Tag>,
    coupons: Vec<Coupon>,
    refunds: Vec<Refund>,
    low_stock_threshold: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            low_stock_threshold: InventorySummary::DEFAULT_LOW_STOCK_THRESHOLD,
            ..Default::default()
        }
    }

    pub fn with_orders(mut self, orders: Vec<Order>) -> Self {
        self.orders = orders;
        self
    }

    pub fn with_products(mut self, products: Vec<Product>) -> Self {
        self.products = products;
        self
    }

    pub fn with_customers(mut self, customers: Vec<Customer>) -> Self {
        self.customers = customers;
        self
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_coupons(mut self, coupons: Vec<Coupon>) -> Self {
        self.coupons = coupons;
        self
    }

    pub fn with_refunds(mut self, refunds: Vec<Refund>) -> Self {
        self.refunds = refunds;
        self
    }

    /// A small demo catalogue with a month of orders
    pub fn sample() -> Self {
        let base = Utc
            .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let products = vec![
            sample_product(1, "Hoodie", "HD-01", 45, StockStatus::InStock, Some(18), 120),
            sample_product(2, "Beanie", "BN-01", 18, StockStatus::InStock, Some(3), 95),
            sample_product(3, "T-Shirt", "TS-01", 20, StockStatus::InStock, Some(64), 310),
            sample_product(4, "Cap", "CP-01", 16, StockStatus::OutOfStock, Some(0), 42),
            sample_product(5, "Sunglasses", "SG-01", 90, StockStatus::OnBackorder, None, 12),
            sample_product(6, "Belt", "BL-01", 55, StockStatus::InStock, Some(9), 27),
        ];
        let customers = vec![
            sample_customer(1, "Jane Doe", "jane@example.com", 3, 180),
            sample_customer(2, "Sam Lee", "sam@example.com", 1, 45),
            sample_customer(3, "Ana Ruiz", "ana@example.com", 2, 110),
        ];
        let statuses = [
            OrderStatus::Completed,
            OrderStatus::Processing,
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::OnHold,
            OrderStatus::Refunded,
        ];
        let orders = (0..12u64)
            .map(|i| {
                let customer = &customers[(i % 3) as usize];
                let product = &products[(i % 6) as usize];
                let quantity = (i % 3 + 1) as u32;
                let total = product.price * Decimal::from(quantity);
                Order {
                    id: 100 + i,
                    number: (100 + i).to_string(),
                    status: statuses[(i % 6) as usize],
                    total,
                    currency: "USD".to_string(),
                    customer_name: customer.name.clone(),
                    customer_email: Some(customer.email.clone()),
                    created_at: base + Duration::days((i * 2) as i64),
                    items: vec![OrderItem {
                        name: product.name.clone(),
                        quantity,
                        total,
                    }],
                }
            })
            .collect::<Vec<_>>();
        let refunds = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Refunded)
            .map(|o| Refund {
                id: o.id + 1000,
                order_id: o.id,
                amount: o.total,
                reason: "Customer request".to_string(),
                created_at: o.created_at + Duration::days(1),
            })
            .collect();

        Self::new()
            .with_products(products)
            .with_customers(customers)
            .with_orders(orders)
            .with_refunds(refunds)
            .with_categories(vec![
                Category {
                    id: 1,
                    name: "Clothing".into(),
                    slug: "clothing".into(),
                    product_count: 3,
                },
                Category {
                    id: 2,
                    name: "Accessories".into(),
                    slug: "accessories".into(),
                    product_count: 3,
                },
            ])
            .with_tags(vec![Tag {
                id: 1,
                name: "Summer".into(),
                slug: "summer".into(),
                product_count: 2,
            }])
            .with_coupons(vec![Coupon {
                id: 1,
                code: "WELCOME10".into(),
                discount_type: "percent".into(),
                amount: Decimal::from(10),
                usage_count: 4,
                expires_at: None,
            }])
    }

    fn filtered_orders(&self, query: &StoreQuery) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| query.matches_order(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

fn sample_product(
    id: u64,
    name: &str,
    sku: &str,
    price: i64,
    stock_status: StockStatus,
    stock_quantity: Option<i64>,
    total_sales: u64,
) -> Product {
    Product {
        id,
        name: name.to_string(),
        sku: sku.to_string(),
        price: Decimal::from(price),
        stock_status,
        stock_quantity,
        total_sales,
        categories: vec![],
    }
}

fn sample_customer(id: u64, name: &str, email: &str, orders: u64, spent: i64) -> Customer {
    Customer {
        id,
        name: name.to_string(),
        email: email.to_string(),
        orders_count: orders,
        total_spent: Decimal::from(spent),
        created_at: None,
    }
}

#[async_trait]
impl DataAccess for InMemoryStore {
    async fn list_orders(&self, query: &StoreQuery) -> Result<Vec<Order>> {
        Ok(query.limit.apply(self.filtered_orders(query).into_iter()))
    }

    async fn order_statistics(&self, query: &StoreQuery) -> Result<OrderStatistics> {
        Ok(OrderStatistics::from_orders(&self.filtered_orders(query)))
    }

    async fn sales_by_period(
        &self,
        period: Period,
        query: &StoreQuery,
    ) -> Result<Vec<PeriodTotal>> {
        Ok(bucket_orders(&self.filtered_orders(query), period))
    }

    async fn top_products(&self, limit: u32) -> Result<Vec<ProductSales>> {
        let mut ranked: Vec<&Product> = self.products.iter().collect();
        ranked.sort_by(|a, b| b.total_sales.cmp(&a.total_sales));
        Ok(ranked
            .into_iter()
            .take(limit as usize)
            .map(ProductSales::from)
            .collect())
    }

    async fn customer_summary(&self) -> Result<CustomerSummary> {
        let total_customers = self.customers.len() as u64;
        let spent: Decimal = self.customers.iter().map(|c| c.total_spent).sum();
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
        Ok(query.limit.apply(self.customers.iter().cloned()))
    }

    async fn list_products(&self, query: &StoreQuery) -> Result<Vec<Product>> {
        Ok(query.limit.apply(
            self.products
                .iter()
                .filter(|p| query.stock_status.map_or(true, |s| p.stock_status == s))
                .cloned(),
        ))
    }

    async fn list_categories(&self, query: &StoreQuery) -> Result<Vec<Category>> {
        Ok(query.limit.apply(self.categories.iter().cloned()))
    }

    async fn list_tags(&self, query: &StoreQuery) -> Result<Vec<Tag>> {
        Ok(query.limit.apply(self.tags.iter().cloned()))
    }

    async fn list_coupons(&self, query: &StoreQuery) -> Result<Vec<Coupon>> {
        Ok(query.limit.apply(self.coupons.iter().cloned()))
    }

    async fn list_refunds(&self, query: &StoreQuery) -> Result<Vec<Refund>> {
        let mut refunds: Vec<Refund> = self
            .refunds
            .iter()
            .filter(|r| {
                query.created_after.map_or(true, |t| r.created_at >= t)
                    && query.created_before.map_or(true, |t| r.created_at <= t)
            })
            .cloned()
            .collect();
        refunds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(query.limit.apply(refunds.into_iter()))
    }

    async fn stock_levels(&self, query: &StoreQuery) -> Result<Vec<StockItem>> {
        Ok(query.limit.apply(
            self.products
                .iter()
                .filter(|p| query.stock_status.map_or(true, |s| p.stock_status == s))
                .map(StockItem::from),
        ))
    }

    async fn inventory_summary(&self) -> Result<InventorySummary> {
        Ok(InventorySummary::from_products(
            &self.products,
            self.low_stock_threshold,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unbounded_returns_everything() {
        let store = InMemoryStore::sample();
        let all = store.list_orders(&StoreQuery::unbounded()).await.unwrap();
        assert_eq!(all.len(), 12);

        let capped = store
            .list_orders(&StoreQuery::new(Limit::Count(5)))
            .await
            .unwrap();
        assert_eq!(capped.len(), 5);
        assert!(capped[0].created_at >= capped[4].created_at);
    }

    #[tokio::test]
    async fn test_status_filter() {
        let store = InMemoryStore::sample();
        let pending = store
            .list_orders(&StoreQuery::unbounded().with_status(Some(OrderStatus::Pending)))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|o| o.status == OrderStatus::Pending));
    }

    #[tokio::test]
    async fn test_top_products_ranked() {
        let store = InMemoryStore::sample();
        let top = store.top_products(3).await.unwrap();
        let names: Vec<_> = top.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["T-Shirt", "Hoodie", "Beanie"]);
    }

    #[tokio::test]
    async fn test_inventory_summary_counts() {
        let summary = InMemoryStore::sample().inventory_summary().await.unwrap();
        assert_eq!(summary.product_count, 6);
        assert_eq!(summary.out_of_stock, 1);
        assert_eq!(summary.on_backorder, 1);
        assert_eq!(summary.low_stock, 1);
        assert_eq!(summary.total_units, 18 + 3 + 64 + 9);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryStore::new();
        assert!(store.list_orders(&StoreQuery::unbounded()).await.unwrap().is_empty());
        let summary = store.customer_summary().await.unwrap();
        assert_eq!(summary.total_customers, 0);
    }
}
