//! Deterministic answer text
//!
//! Used by the rule-based backend, where no model is available to phrase the
//! answer. Every figure comes straight from the tool payloads; empty results
//! are always reported as an explicit zero.

use serde_json::Value;

use super::tools::{ToolName, ToolResult};

/// Reply for questions that need no store data
pub const NO_DATA_REPLY: &str = "I can answer questions about your store's orders, sales, \
products, customers and stock. Try asking \"What are my top 5 products?\"";

/// Render all results, one paragraph per tool call
pub fn compose_answer(results: &[ToolResult]) -> String {
    if results.is_empty() {
        return NO_DATA_REPLY.to_string();
    }
    results
        .iter()
        .map(render_result)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_result(result: &ToolResult) -> String {
    if !result.is_success() {
        let message = result.payload["error"].as_str().unwrap_or("unknown error");
        return format!("I couldn't fetch that data ({}): {}", result.tool_name, message);
    }
    if result.is_empty_result() {
        return format!("No records found: {}.", describe_empty(&result.payload));
    }

    let p = &result.payload;
    match result.tool_name.parse::<ToolName>() {
        Ok(ToolName::RecentOrders) => list(
            &format!("Here are your {} most recent orders:", count(p)),
            rows(p, "orders"),
            |o| {
                format!(
                    "#{} from {}, {}, {} {}",
                    text(o, "number"),
                    text(o, "customer_name"),
                    text(o, "status"),
                    text(o, "total"),
                    text(o, "currency"),
                )
            },
        ),
        Ok(ToolName::OrderStatistics) => {
            let money = |key: &str| match p["currency"].as_str() {
                Some(currency) => format!("{} {}", text(p, key), currency),
                None => text(p, key),
            };
            format!(
                "You have {} orders ({} paid) with total revenue of {} (average order value {}).",
                text(p, "order_count"),
                text(p, "paid_order_count"),
                money("total_revenue"),
                money("average_order_value"),
            )
        }
        Ok(ToolName::SalesByPeriod) => list("Sales by period:", rows(p, "periods"), |row| {
            format!(
                "{}: {} orders, {} revenue",
                text(row, "period"),
                text(row, "order_count"),
                text(row, "revenue"),
            )
        }),
        Ok(ToolName::TopProducts) => {
            let products = rows(p, "products");
            let header = format!("Your top {} products by units sold:", products.len());
            let lines: Vec<String> = products
                .iter()
                .enumerate()
                .map(|(i, product)| {
                    format!(
                        "{}. {} ({} sold)",
                        i + 1,
                        text(product, "name"),
                        text(product, "total_sales"),
                    )
                })
                .collect();
            format!("{}\n{}", header, lines.join("\n"))
        }
        Ok(ToolName::CustomerSummary) => format!(
            "You have {} customers with an average lifetime spend of {}.",
            text(p, "total_customers"),
            text(p, "avg_lifetime_spent"),
        ),
        Ok(ToolName::Customers) => list(
            &format!("Here are {} customers:", count(p)),
            rows(p, "customers"),
            |c| {
                format!(
                    "{} ({} orders, {} spent)",
                    text(c, "name"),
                    text(c, "orders_count"),
                    text(c, "total_spent"),
                )
            },
        ),
        Ok(ToolName::StockStatus) => list(
            &format!("Stock levels for {} products:", count(p)),
            rows(p, "products"),
            |item| {
                let quantity = match &item["stock_quantity"] {
                    Value::Null => "not tracked".to_string(),
                    other => format!("{} units", other),
                };
                format!(
                    "{}: {} ({})",
                    text(item, "name"),
                    text(item, "stock_status"),
                    quantity
                )
            },
        ),
        Ok(ToolName::InventorySummary) => format!(
            "Inventory: {} products ({} with managed stock) holding {} units. \
             {} in stock, {} out of stock, {} on backorder, {} low on stock (at or below {} units).",
            text(p, "product_count"),
            text(p, "managed_product_count"),
            text(p, "total_units"),
            text(p, "in_stock"),
            text(p, "out_of_stock"),
            text(p, "on_backorder"),
            text(p, "low_stock"),
            text(p, "low_stock_threshold"),
        ),
        Ok(ToolName::QueryEntities) => render_entities(p),
        Err(_) => p.to_string(),
    }
}

fn render_entities(p: &Value) -> String {
    if let Some(entity) = p["entity_type"].as_str() {
        return format!("You have {} {}.", count(p), entity);
    }
    for key in ["products", "categories", "tags", "coupons", "refunds"] {
        let items = rows(p, key);
        if items.is_empty() {
            continue;
        }
        return list(&format!("Here are {} {}:", items.len(), key), items, |item| {
            match key {
                "coupons" => format!(
                    "{} ({} {}, used {} times)",
                    text(item, "code"),
                    text(item, "amount"),
                    text(item, "discount_type"),
                    text(item, "usage_count"),
                ),
                "refunds" => format!(
                    "Refund of {} for order #{}",
                    text(item, "amount"),
                    text(item, "order_id"),
                ),
                _ => text(item, "name"),
            }
        });
    }
    p.to_string()
}

fn describe_empty(payload: &Value) -> String {
    let tool = payload["query"]["tool"].as_str().unwrap_or("query");
    let filters = payload["query"]["arguments"]
        .as_object()
        .map(|args| {
            args.iter()
                .filter(|(k, _)| k.as_str() != "limit")
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{} = {}", k, s),
                    other => format!("{} = {}", k, other),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let subject = match tool.parse::<ToolName>() {
        Ok(ToolName::RecentOrders | ToolName::OrderStatistics | ToolName::SalesByPeriod) => {
            "orders"
        }
        Ok(ToolName::TopProducts | ToolName::StockStatus | ToolName::InventorySummary) => {
            "products"
        }
        Ok(ToolName::CustomerSummary | ToolName::Customers) => "customers",
        Ok(ToolName::QueryEntities) => payload["query"]["arguments"]["entity_type"]
            .as_str()
            .unwrap_or("records"),
        Err(_) => "records",
    };

    if filters.is_empty() {
        format!("there are 0 {}", subject)
    } else {
        format!("there are 0 {} matching {}", subject, filters.join(", "))
    }
}

fn list(header: &str, items: Vec<&Value>, line: impl Fn(&Value) -> String) -> String {
    let lines: Vec<String> = items.into_iter().map(|item| format!("- {}", line(item))).collect();
    format!("{}\n{}", header, lines.join("\n"))
}

fn rows<'a>(payload: &'a Value, key: &str) -> Vec<&'a Value> {
    payload[key]
        .as_array()
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

fn count(payload: &Value) -> String {
    text(payload, "record_count")
}

fn text(value: &Value, key: &str) -> String {
    match &value[key] {
        Value::String(s) => s.clone(),
        Value::Null => "n/a".to_string(),
        other => other.to_string(),
    }
}
