//! Tool Executor
//!
//! Runs one typed tool request against the store and normalizes the result
//! into a JSON payload for the model (or the answer composer).

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::extractor::{EntityType, QueryType};
use super::tools::{EntityQueryArgs, OrderFilterArgs, ToolCall, ToolRequest, ToolResult};
use crate::error::{AssistantError, Result};
use crate::store::{DataAccess, Limit, StoreQuery};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct ToolExecutor {
    store: Arc<dyn DataAccess>,
}

impl ToolExecutor {
    pub fn new(store: Arc<dyn DataAccess>) -> Self {
        Self { store }
    }

    /// Validate the arguments for `tool_name` and run it
    pub async fn execute(&self, tool_name: &str, arguments: &Value) -> Result<Value> {
        let request = ToolRequest::parse(tool_name, arguments)?;
        self.run(&request).await
    }

    /// Run a call, turning recoverable failures into an error result.
    ///
    /// Anything else (auth, transport, configuration) is returned as `Err`
    /// and ends the exchange.
    pub async fn execute_call(&self, call: &ToolCall) -> Result<ToolResult> {
        match self.execute(&call.name, &call.arguments).await {
            Ok(payload) => {
                tracing::debug!(tool = %call.name, id = %call.id, "Tool call succeeded");
                Ok(ToolResult::success(call, payload))
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(tool = %call.name, id = %call.id, error = %err, "Tool call failed");
                Ok(ToolResult::error(call, &err))
            }
            Err(err) => Err(err),
        }
    }

    /// Run every call in order
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_call(call).await?);
        }
        Ok(results)
    }

    pub async fn run(&self, request: &ToolRequest) -> Result<Value> {
        let request = &applied(request);
        let store = self.store.as_ref();
        match request {
            ToolRequest::RecentOrders(args) => {
                let query = order_query(args.limit, &args.filters);
                records("orders", store.list_orders(&query).await?, request)
            }
            ToolRequest::OrderStatistics(filters) => {
                let query = order_query(Limit::Unbounded, filters);
                let stats = store.order_statistics(&query).await?;
                if stats.order_count == 0 {
                    return Ok(empty_result(request));
                }
                Ok(serde_json::to_value(stats)?)
            }
            ToolRequest::SalesByPeriod(args) => {
                let query = order_query(Limit::Unbounded, &args.filters);
                let totals = store.sales_by_period(args.period, &query).await?;
                records("periods", totals, request)
            }
            ToolRequest::TopProducts(args) => {
                records("products", store.top_products(args.limit).await?, request)
            }
            ToolRequest::CustomerSummary => {
                let summary = store.customer_summary().await?;
                if summary.total_customers == 0 {
                    return Ok(empty_result(request));
                }
                Ok(serde_json::to_value(summary)?)
            }
            ToolRequest::Customers(args) => {
                let query = StoreQuery::new(args.limit);
                records("customers", store.list_customers(&query).await?, request)
            }
            ToolRequest::StockStatus(args) => {
                let query = StoreQuery::new(args.limit).with_stock_status(args.stock_status);
                records("products", store.stock_levels(&query).await?, request)
            }
            ToolRequest::InventorySummary => {
                let summary = store.inventory_summary().await?;
                if summary.product_count == 0 {
                    return Ok(empty_result(request));
                }
                Ok(serde_json::to_value(summary)?)
            }
            ToolRequest::QueryEntities(args) => self.query_entities(args, request).await,
        }
    }

    async fn query_entities(
        &self,
        args: &EntityQueryArgs,
        request: &ToolRequest,
    ) -> Result<Value> {
        let store = self.store.as_ref();
        // a count needs every row regardless of the requested limit
        let query = if args.query_type == QueryType::Statistics {
            StoreQuery::unbounded()
        } else {
            StoreQuery::new(args.limit)
        };
        let key = args.entity_type.as_str();

        let rows = match args.entity_type {
            EntityType::Products => to_rows(store.list_products(&query).await?)?,
            EntityType::Categories => to_rows(store.list_categories(&query).await?)?,
            EntityType::Tags => to_rows(store.list_tags(&query).await?)?,
            EntityType::Coupons => to_rows(store.list_coupons(&query).await?)?,
            EntityType::Refunds => to_rows(store.list_refunds(&query).await?)?,
            other => {
                return Err(AssistantError::data_access(format!(
                    "{} cannot be queried as entities",
                    other
                )))
            }
        };

        if rows.is_empty() {
            return Ok(empty_result(request));
        }
        if args.query_type == QueryType::Statistics {
            return Ok(json!({ "entity_type": key, "record_count": rows.len() }));
        }
        let mut payload = Map::new();
        payload.insert("record_count".into(), json!(rows.len()));
        payload.insert(key.into(), Value::Array(rows));
        Ok(Value::Object(payload))
    }
}

fn to_rows<T: Serialize>(items: Vec<T>) -> Result<Vec<Value>> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).map_err(AssistantError::from))
        .collect()
}

fn records<T: Serialize>(key: &str, items: Vec<T>, request: &ToolRequest) -> Result<Value> {
    if items.is_empty() {
        return Ok(empty_result(request));
    }
    let mut payload = Map::new();
    payload.insert("record_count".into(), json!(items.len()));
    payload.insert(key.into(), serde_json::to_value(items)?);
    Ok(Value::Object(payload))
}

/// Payload standing in for an empty collection
pub fn empty_result(request: &ToolRequest) -> Value {
    json!({
        "no_records_found": true,
        "record_count": 0,
        "query": {
            "tool": request.tool_name().as_str(),
            "arguments": request.arguments(),
        },
    })
}

/// The request as it will actually run: an order date range with an
/// unparseable bound is dropped as a whole
fn applied(request: &ToolRequest) -> ToolRequest {
    let mut request = request.clone();
    match &mut request {
        ToolRequest::RecentOrders(args) => drop_bad_dates(&mut args.filters),
        ToolRequest::OrderStatistics(filters) => drop_bad_dates(filters),
        ToolRequest::SalesByPeriod(args) => drop_bad_dates(&mut args.filters),
        _ => {}
    }
    request
}

fn drop_bad_dates(filters: &mut OrderFilterArgs) {
    let parses = |date: &Option<String>| {
        date.as_deref()
            .map_or(true, |d| NaiveDate::parse_from_str(d.trim(), DATE_FORMAT).is_ok())
    };
    if !(parses(&filters.date_from) && parses(&filters.date_to)) {
        tracing::warn!(
            from = ?filters.date_from,
            to = ?filters.date_to,
            "Dropping unparseable date range"
        );
        filters.date_from = None;
        filters.date_to = None;
    }
}

fn order_query(limit: Limit, filters: &OrderFilterArgs) -> StoreQuery {
    let (after, before) = date_bounds(filters.date_from.as_deref(), filters.date_to.as_deref());
    StoreQuery::new(limit)
        .with_status(filters.status)
        .with_created_range(after, before)
}

/// Expand `YYYY-MM-DD` bounds to the first and last instant of the day.
///
/// If any given bound fails to parse the whole range is dropped.
pub fn date_bounds(
    from: Option<&str>,
    to: Option<&str>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let start = from.map(|d| day_instant(d, NaiveTime::from_hms_opt(0, 0, 0)));
    let end = to.map(|d| day_instant(d, NaiveTime::from_hms_opt(23, 59, 59)));

    if matches!(start, Some(None)) || matches!(end, Some(None)) {
        tracing::warn!(?from, ?to, "Dropping unparseable date range");
        return (None, None);
    }
    (start.flatten(), end.flatten())
}

fn day_instant(date: &str, time: Option<NaiveTime>) -> Option<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&day.and_time(time?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::Timelike;

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Arc::new(InMemoryStore::sample()))
    }

    #[test]
    fn test_date_bounds_expand_to_whole_days() {
        let (after, before) = date_bounds(Some("2024-05-01"), Some("2024-05-03"));
        let after = after.unwrap();
        let before = before.unwrap();
        assert_eq!(after.hour(), 0);
        assert_eq!(before.hour(), 23);
        assert_eq!(before.minute(), 59);
        assert_eq!(before.date_naive(), NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn test_bad_date_drops_range() {
        assert_eq!(date_bounds(Some("2024-05-01"), Some("May 3rd")), (None, None));
        assert_eq!(date_bounds(None, None), (None, None));
        assert!(date_bounds(Some("2024-05-01"), None).0.is_some());
    }

    #[tokio::test]
    async fn test_recent_orders_clamped() {
        let payload = executor()
            .execute("get_recent_orders", &json!({"limit": 500}))
            .await
            .unwrap();
        assert_eq!(payload["record_count"], 12);
        assert_eq!(payload["orders"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_date_filter_applied() {
        let payload = executor()
            .execute(
                "get_recent_orders",
                &json!({"date_from": "2024-05-01", "date_to": "2024-05-03"}),
            )
            .await
            .unwrap();
        // orders on May 1st and May 3rd
        assert_eq!(payload["record_count"], 2);
    }

    #[tokio::test]
    async fn test_empty_result_carries_marker_and_query() {
        let store = Arc::new(InMemoryStore::new());
        let payload = ToolExecutor::new(store)
            .execute("get_recent_orders", &json!({"status": "failed"}))
            .await
            .unwrap();
        assert_eq!(payload["no_records_found"], true);
        assert_eq!(payload["record_count"], 0);
        assert_eq!(payload["query"]["tool"], "get_recent_orders");
        assert_eq!(payload["query"]["arguments"]["status"], "failed");
        assert_eq!(payload["query"]["arguments"]["limit"], 20);
    }

    #[tokio::test]
    async fn test_empty_result_reports_applied_filters() {
        let store = Arc::new(InMemoryStore::new());
        let payload = ToolExecutor::new(store)
            .execute(
                "get_recent_orders",
                &json!({"status": "failed", "date_from": "last tuesday", "date_to": "2024-05-03"}),
            )
            .await
            .unwrap();
        let arguments = &payload["query"]["arguments"];
        assert_eq!(arguments["status"], "failed");
        assert!(arguments.get("date_from").is_none());
        assert!(arguments.get("date_to").is_none());
    }

    #[tokio::test]
    async fn test_statistics_revenue_from_paid_orders() {
        let payload = executor()
            .execute("get_order_statistics", &json!({}))
            .await
            .unwrap();
        // 12 sample orders, 6 completed or processing worth 194 in total
        assert_eq!(payload["order_count"], 12);
        assert_eq!(payload["paid_order_count"], 6);
        assert_eq!(payload["total_revenue"], "194");
        assert_eq!(payload["average_order_value"], "32.33");
    }

    #[tokio::test]
    async fn test_zero_count_statistics_marked_empty() {
        let payload = executor()
            .execute("get_order_statistics", &json!({"status": "failed"}))
            .await
            .unwrap();
        assert_eq!(payload["no_records_found"], true);
    }

    #[tokio::test]
    async fn test_unknown_tool_absorbed_by_execute_call() {
        let call = ToolCall {
            id: "call_x".into(),
            name: "delete_everything".into(),
            arguments: json!({}),
        };
        let result = executor().execute_call(&call).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.tool_call_id, "call_x");
        assert_eq!(result.payload["code"], "unknown_tool");
    }

    #[tokio::test]
    async fn test_query_entities_count() {
        let payload = executor()
            .execute(
                "query_entities",
                &json!({"entity_type": "products", "query_type": "statistics", "limit": 2}),
            )
            .await
            .unwrap();
        assert_eq!(payload["record_count"], 6);
        assert_eq!(payload["entity_type"], "products");
    }

    #[tokio::test]
    async fn test_stock_status_filter() {
        let payload = executor()
            .execute("get_stock_status", &json!({"stock_status": "outofstock"}))
            .await
            .unwrap();
        assert_eq!(payload["record_count"], 1);
        assert_eq!(payload["products"][0]["name"], "Cap");
    }

    #[tokio::test]
    async fn test_repeated_execution_is_identical() {
        let exec = executor();
        let args = json!({"limit": 5});
        let first = exec.execute("get_top_products", &args).await.unwrap();
        let second = exec.execute("get_top_products", &args).await.unwrap();
        assert_eq!(first, second);
    }
}
