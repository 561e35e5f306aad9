//! Rule-Based Dispatcher
//!
//! Maps a question straight to tool calls using the extractor, with no model
//! round trip. Deterministic apart from the generated call ids.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::extractor::{
    classify, extract_filters, mentions_orders, requires_data, EntityType, FilterSet, QueryType,
};
use super::tools::{ToolCall, ToolName};
use crate::store::{Limit, Period, StockStatus};

const DEFAULT_ORDER_LIMIT: i64 = 20;
const DEFAULT_TOP_PRODUCTS: i64 = 10;
const MAX_TOP_PRODUCTS: i64 = 50;
const DEFAULT_CUSTOMER_LIMIT: i64 = 10;

fn pattern(words: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", words)).expect("keyword table compiles")
}

static TOP_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| pattern(r"top|best|bestsellers?|popular|selling|most\s+sold"));

static SUMMARY_KEYWORDS: Lazy<Regex> = Lazy::new(|| pattern(r"summary|overview|total"));

/// Checked in order; "out of stock" must win over "in stock"
static STOCK_STATUS_KEYWORDS: Lazy<Vec<(StockStatus, Regex)>> = Lazy::new(|| {
    vec![
        (StockStatus::OutOfStock, pattern(r"out\s+of\s+stock|sold\s+out")),
        (StockStatus::OnBackorder, pattern(r"backorders?|on\s+backorder")),
        (StockStatus::InStock, pattern(r"in\s+stock|available")),
    ]
});

static PERIOD_KEYWORDS: Lazy<Vec<(Period, Regex)>> = Lazy::new(|| {
    vec![
        (Period::Day, pattern(r"daily|by\s+day|per\s+day|each\s+day")),
        (Period::Week, pattern(r"weekly|by\s+week|per\s+week|each\s+week")),
        (Period::Month, pattern(r"monthly|by\s+month|per\s+month|each\s+month")),
        (Period::Year, pattern(r"yearly|annual|annually|by\s+year|per\s+year")),
    ]
});

/// Tool calls answering `question`, empty when it needs no store data
pub fn classify_intent_and_get_tools(question: &str) -> Vec<ToolCall> {
    if !requires_data(question) {
        return Vec::new();
    }

    let classification = classify(question);
    let calls = if classification.entities.len() >= 2 {
        classification
            .entities
            .iter()
            .map(|entity| {
                let filters = extract_filters(question, Some(*entity));
                dispatch_entity(Some(*entity), question, classification.query_type, &filters)
            })
            .collect()
    } else {
        let entity = if mentions_orders(question) {
            Some(EntityType::Orders)
        } else {
            classification.entity_type
        };
        vec![dispatch_entity(
            entity,
            question,
            classification.query_type,
            &classification.filters,
        )]
    };

    tracing::debug!(
        question,
        tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        "Rule-based dispatch"
    );
    calls
}

fn dispatch_entity(
    entity: Option<EntityType>,
    question: &str,
    query_type: QueryType,
    filters: &FilterSet,
) -> ToolCall {
    match entity {
        Some(EntityType::Orders) => order_call(question, query_type, filters),
        Some(EntityType::Products) => product_call(question, query_type, filters),
        Some(EntityType::Customers) => customer_call(question, query_type, filters),
        Some(EntityType::Stock) => {
            let mut args = Map::new();
            if let Some(status) = stock_status(question) {
                args.insert("stock_status".into(), json!(status.as_str()));
            }
            if let Some(limit) = filters.limit {
                args.insert("limit".into(), json!(limit));
            }
            call("stock", ToolName::StockStatus, Value::Object(args))
        }
        Some(EntityType::Inventory) => call("inventory", ToolName::InventorySummary, json!({})),
        Some(
            entity @ (EntityType::Categories
            | EntityType::Tags
            | EntityType::Coupons
            | EntityType::Refunds),
        ) => call(
            entity.as_str(),
            ToolName::QueryEntities,
            entity_args(entity, query_type, filters),
        ),
        Some(EntityType::Other) | None => call(
            "fallback",
            ToolName::RecentOrders,
            json!({ "limit": DEFAULT_ORDER_LIMIT }),
        ),
    }
}

fn order_call(question: &str, query_type: QueryType, filters: &FilterSet) -> ToolCall {
    let mut args = Map::new();
    if let Some(status) = filters.status {
        args.insert("status".into(), json!(status.as_str()));
    }
    if let Some(from) = filters.date_from {
        args.insert("date_from".into(), json!(from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = filters.date_to {
        args.insert("date_to".into(), json!(to.format("%Y-%m-%d").to_string()));
    }

    match query_type {
        QueryType::Statistics => call("orders", ToolName::OrderStatistics, Value::Object(args)),
        QueryType::ByPeriod => {
            args.insert("period".into(), json!(period(question).as_str()));
            call("orders", ToolName::SalesByPeriod, Value::Object(args))
        }
        QueryType::List | QueryType::Sample => {
            let limit = filters
                .limit
                .map(|l| l.as_raw())
                .unwrap_or(DEFAULT_ORDER_LIMIT);
            args.insert("limit".into(), json!(limit));
            call("orders", ToolName::RecentOrders, Value::Object(args))
        }
    }
}

fn product_call(question: &str, query_type: QueryType, filters: &FilterSet) -> ToolCall {
    if TOP_KEYWORDS.is_match(question) {
        let limit = match filters.limit {
            Some(Limit::Unbounded) => MAX_TOP_PRODUCTS,
            Some(limit) => limit.as_raw(),
            None => DEFAULT_TOP_PRODUCTS,
        };
        return call("products", ToolName::TopProducts, json!({ "limit": limit }));
    }
    call(
        "products",
        ToolName::QueryEntities,
        entity_args(EntityType::Products, query_type, filters),
    )
}

fn customer_call(question: &str, query_type: QueryType, filters: &FilterSet) -> ToolCall {
    if query_type == QueryType::Statistics || SUMMARY_KEYWORDS.is_match(question) {
        return call("customers", ToolName::CustomerSummary, json!({}));
    }
    let limit = filters
        .limit
        .map(|l| l.as_raw())
        .unwrap_or(DEFAULT_CUSTOMER_LIMIT);
    call("customers", ToolName::Customers, json!({ "limit": limit }))
}

fn entity_args(entity: EntityType, query_type: QueryType, filters: &FilterSet) -> Value {
    let mut args = Map::new();
    args.insert("entity_type".into(), json!(entity.as_str()));
    args.insert("query_type".into(), json!(query_type.as_str()));
    if let Some(limit) = filters.limit {
        args.insert("limit".into(), json!(limit));
    }
    Value::Object(args)
}

fn stock_status(question: &str) -> Option<StockStatus> {
    STOCK_STATUS_KEYWORDS
        .iter()
        .find(|(_, re)| re.is_match(question))
        .map(|(status, _)| *status)
}

fn period(question: &str) -> Period {
    PERIOD_KEYWORDS
        .iter()
        .find(|(_, re)| re.is_match(question))
        .map(|(period, _)| *period)
        .unwrap_or_default()
}

fn call(branch: &str, tool: ToolName, arguments: Value) -> ToolCall {
    ToolCall {
        id: format!("{}_{}", branch, Uuid::new_v4().simple()),
        name: tool.as_str().to_string(),
        arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(question: &str) -> ToolCall {
        let mut calls = classify_intent_and_get_tools(question);
        assert_eq!(calls.len(), 1, "expected one call for {:?}: {:?}", question, calls);
        calls.remove(0)
    }

    #[test]
    fn test_no_data_needed() {
        assert!(classify_intent_and_get_tools("Hello, who are you?").is_empty());
    }

    #[test]
    fn test_top_products() {
        let call = single("What are my top 5 products?");
        assert_eq!(call.name, "get_top_products");
        assert_eq!(call.arguments, json!({"limit": 5}));
        assert!(call.id.starts_with("products_"));
    }

    #[test]
    fn test_best_sellers_default_limit() {
        let call = single("Show me the best selling products");
        assert_eq!(call.name, "get_top_products");
        assert_eq!(call.arguments["limit"], 10);
    }

    #[test]
    fn test_order_statistics_with_status() {
        let call = single("How many pending orders do I have?");
        assert_eq!(call.name, "get_order_statistics");
        assert_eq!(call.arguments["status"], "pending");
    }

    #[test]
    fn test_all_orders_unbounded() {
        let call = single("Show me all completed orders");
        assert_eq!(call.name, "get_recent_orders");
        assert_eq!(call.arguments["limit"], -1);
        assert_eq!(call.arguments["status"], "completed");
    }

    #[test]
    fn test_sales_by_period() {
        let call = single("Show me sales by week");
        assert_eq!(call.name, "get_sales_by_period");
        assert_eq!(call.arguments["period"], "week");
    }

    #[test]
    fn test_customers() {
        assert_eq!(single("Give me a customer overview").name, "get_customer_summary");
        let call = single("List my customers");
        assert_eq!(call.name, "get_customers");
        assert_eq!(call.arguments["limit"], 10);
    }

    #[test]
    fn test_stock_and_inventory_are_distinct() {
        let call = single("Which items are out of stock?");
        // "items" is a product synonym declared before stock
        assert_eq!(call.name, "query_entities");

        let call = single("Show stock levels that are out of stock");
        assert_eq!(call.name, "get_stock_status");
        assert_eq!(call.arguments["stock_status"], "outofstock");

        let call = single("Show me the inventory");
        assert_eq!(call.name, "get_inventory_summary");
    }

    #[test]
    fn test_other_entities_use_query_entities() {
        let call = single("List all coupons");
        assert_eq!(call.name, "query_entities");
        assert_eq!(call.arguments["entity_type"], "coupons");
        assert_eq!(call.arguments["limit"], -1);
    }

    #[test]
    fn test_fallback_recent_orders() {
        let call = single("show me the report");
        assert_eq!(call.name, "get_recent_orders");
        assert_eq!(call.arguments, json!({"limit": 20}));
        assert!(call.id.starts_with("fallback_"));
    }

    #[test]
    fn test_multiple_entities_one_call_each() {
        let calls = classify_intent_and_get_tools("Show me customers and coupons");
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["get_customers", "query_entities"]);
        assert_ne!(calls[0].id, calls[1].id);
    }

    #[test]
    fn test_deterministic_apart_from_ids() {
        let a = classify_intent_and_get_tools("top 3 products");
        let b = classify_intent_and_get_tools("top 3 products");
        assert_eq!(a[0].name, b[0].name);
        assert_eq!(a[0].arguments, b[0].arguments);
        assert_ne!(a[0].id, b[0].id);
    }
}
