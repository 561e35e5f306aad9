//! Tool Registry
//!
//! Fixed catalog of data operations exposed to the model's function-calling
//! mechanism, plus the typed request each tool name maps to. Arguments are
//! validated and coerced here, at the registry boundary, so the executor
//! only ever sees in-range values.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::extractor::{normalize_entity_type, EntityType, QueryType};
use super::llm_client::ToolDefinition;
use crate::error::{AssistantError, Result};
use crate::store::{Limit, OrderStatus, Period, StockStatus};

// ============================================================================
// Tool names
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    RecentOrders,
    OrderStatistics,
    SalesByPeriod,
    TopProducts,
    CustomerSummary,
    Customers,
    StockStatus,
    InventorySummary,
    QueryEntities,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::RecentOrders => "get_recent_orders",
            ToolName::OrderStatistics => "get_order_statistics",
            ToolName::SalesByPeriod => "get_sales_by_period",
            ToolName::TopProducts => "get_top_products",
            ToolName::CustomerSummary => "get_customer_summary",
            ToolName::Customers => "get_customers",
            ToolName::StockStatus => "get_stock_status",
            ToolName::InventorySummary => "get_inventory_summary",
            ToolName::QueryEntities => "query_entities",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "get_recent_orders" => Ok(ToolName::RecentOrders),
            "get_order_statistics" => Ok(ToolName::OrderStatistics),
            "get_sales_by_period" => Ok(ToolName::SalesByPeriod),
            "get_top_products" => Ok(ToolName::TopProducts),
            "get_customer_summary" => Ok(ToolName::CustomerSummary),
            "get_customers" => Ok(ToolName::Customers),
            "get_stock_status" => Ok(ToolName::StockStatus),
            "get_inventory_summary" => Ok(ToolName::InventorySummary),
            "query_entities" => Ok(ToolName::QueryEntities),
            other => Err(AssistantError::UnknownTool(other.to_string())),
        }
    }
}

// ============================================================================
// Descriptors
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Integer clamped to `[min, max]`; `-1` passes through untouched when
    /// `allow_unbounded` is set and means `max` otherwise
    Integer {
        min: i64,
        max: i64,
        default: Option<i64>,
        allow_unbounded: bool,
    },
    Enum(Vec<&'static str>),
    /// `YYYY-MM-DD`
    Date,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    fn schema(&self) -> Value {
        match &self.kind {
            ParamKind::Integer {
                min,
                max,
                default,
                allow_unbounded,
            } => {
                let description = if *allow_unbounded {
                    format!("{} Use -1 to fetch all records.", self.description)
                } else {
                    self.description.to_string()
                };
                let minimum = if *allow_unbounded {
                    Limit::UNBOUNDED_SENTINEL
                } else {
                    *min
                };
                let mut schema = json!({
                    "type": "integer",
                    "description": description,
                    "minimum": minimum,
                    "maximum": max,
                });
                if let Some(default) = default {
                    schema["default"] = json!(default);
                }
                schema
            }
            ParamKind::Enum(values) => json!({
                "type": "string",
                "description": self.description,
                "enum": values,
            }),
            ParamKind::Date => json!({
                "type": "string",
                "description": self.description,
                "format": "date",
            }),
        }
    }
}

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: ToolName,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// JSON Schema for the parameters. `properties` is always an object,
    /// also when the tool takes no parameters.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": [],
        })
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.as_str().to_string(),
            description: self.description.to_string(),
            parameters: self.parameters_schema(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

fn limit_param(max: i64, default: i64, allow_unbounded: bool) -> ParamSpec {
    ParamSpec {
        name: "limit",
        description: "Maximum number of records to return.",
        kind: ParamKind::Integer {
            min: 1,
            max,
            default: Some(default),
            allow_unbounded,
        },
    }
}

fn order_filter_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            name: "status",
            description: "Only orders with this status.",
            kind: ParamKind::Enum(OrderStatus::ALL.iter().map(|s| s.as_str()).collect()),
        },
        ParamSpec {
            name: "date_from",
            description: "Only orders created on or after this date.",
            kind: ParamKind::Date,
        },
        ParamSpec {
            name: "date_to",
            description: "Only orders created on or before this date.",
            kind: ParamKind::Date,
        },
    ]
}

const QUERYABLE_ENTITIES: [EntityType; 5] = [
    EntityType::Products,
    EntityType::Categories,
    EntityType::Tags,
    EntityType::Coupons,
    EntityType::Refunds,
];

static REGISTRY: Lazy<Vec<ToolDescriptor>> = Lazy::new(|| {
    vec![
        ToolDescriptor {
            name: ToolName::RecentOrders,
            description: "List the most recent orders, optionally filtered by status and creation date.",
            params: std::iter::once(limit_param(100, 20, true))
                .chain(order_filter_params())
                .collect(),
        },
        ToolDescriptor {
            name: ToolName::OrderStatistics,
            description: "Order count for the matching orders, with revenue and average order value over the paid (processing or completed) ones.",
            params: order_filter_params(),
        },
        ToolDescriptor {
            name: ToolName::SalesByPeriod,
            description: "Order count and revenue grouped by day, week, month or year.",
            params: std::iter::once(ParamSpec {
                name: "period",
                description: "Bucket size for the time series.",
                kind: ParamKind::Enum(Period::ALL.iter().map(|p| p.as_str()).collect()),
            })
            .chain(order_filter_params())
            .collect(),
        },
        ToolDescriptor {
            name: ToolName::TopProducts,
            description: "Best selling products ranked by units sold.",
            params: vec![limit_param(50, 10, false)],
        },
        ToolDescriptor {
            name: ToolName::CustomerSummary,
            description: "Total number of customers and their average lifetime spend.",
            params: vec![],
        },
        ToolDescriptor {
            name: ToolName::Customers,
            description: "List customers with their order count and total spend.",
            params: vec![limit_param(100, 10, true)],
        },
        ToolDescriptor {
            name: ToolName::StockStatus,
            description: "Per-product stock levels, optionally only products with a given stock status.",
            params: vec![
                ParamSpec {
                    name: "stock_status",
                    description: "Only products with this stock status.",
                    kind: ParamKind::Enum(StockStatus::ALL.iter().map(|s| s.as_str()).collect()),
                },
                limit_param(100, 20, true),
            ],
        },
        ToolDescriptor {
            name: ToolName::InventorySummary,
            description: "Store-wide inventory totals: units on hand, stock status counts and low-stock products.",
            params: vec![],
        },
        ToolDescriptor {
            name: ToolName::QueryEntities,
            description: "List or count products, categories, tags, coupons or refunds.",
            params: vec![
                ParamSpec {
                    name: "entity_type",
                    description: "Which kind of record to query.",
                    kind: ParamKind::Enum(QUERYABLE_ENTITIES.iter().map(|e| e.as_str()).collect()),
                },
                ParamSpec {
                    name: "query_type",
                    description: "list for records, statistics for a count, sample for a few examples.",
                    kind: ParamKind::Enum(vec!["list", "statistics", "sample", "by_period"]),
                },
                limit_param(100, 20, true),
            ],
        },
    ]
});

/// The full catalog, in a stable order
pub fn registry() -> &'static [ToolDescriptor] {
    &REGISTRY
}

pub fn descriptor(name: ToolName) -> Option<&'static ToolDescriptor> {
    REGISTRY.iter().find(|d| d.name == name)
}

/// Tool definitions in the shape the chat model client sends
pub fn tool_definitions() -> Vec<ToolDefinition> {
    REGISTRY.iter().map(ToolDescriptor::definition).collect()
}

/// The function-calling payload for OpenAI-compatible providers
pub fn openai_tools() -> Vec<Value> {
    REGISTRY
        .iter()
        .map(|d| d.definition().to_openai_function())
        .collect()
}

// ============================================================================
// Calls and results
// ============================================================================

/// A request to run one tool, from the dispatcher or from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
    pub payload: Value,
}

impl ToolResult {
    pub fn success(call: &ToolCall, payload: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            outcome: ToolOutcome::Success,
            payload,
        }
    }

    pub fn error(call: &ToolCall, err: &AssistantError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            outcome: ToolOutcome::Error,
            payload: json!({ "error": err.to_string(), "code": err.code() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ToolOutcome::Success
    }

    /// Whether the payload carries the explicit empty-result marker
    pub fn is_empty_result(&self) -> bool {
        self.payload
            .get("no_records_found")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Serialized payload for a `tool` conversation turn
    pub fn content(&self) -> String {
        self.payload.to_string()
    }
}

// ============================================================================
// Typed requests
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderFilterArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderListArgs {
    pub limit: Limit,
    #[serde(flatten)]
    pub filters: OrderFilterArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesByPeriodArgs {
    pub period: Period,
    #[serde(flatten)]
    pub filters: OrderFilterArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopProductsArgs {
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerListArgs {
    pub limit: Limit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_status: Option<StockStatus>,
    pub limit: Limit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityQueryArgs {
    pub entity_type: EntityType,
    pub query_type: QueryType,
    pub limit: Limit,
}

/// One variant per tool, each with its own argument struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    RecentOrders(OrderListArgs),
    OrderStatistics(OrderFilterArgs),
    SalesByPeriod(SalesByPeriodArgs),
    TopProducts(TopProductsArgs),
    CustomerSummary,
    Customers(CustomerListArgs),
    StockStatus(StockArgs),
    InventorySummary,
    QueryEntities(EntityQueryArgs),
}

/// Rows returned for a `sample` query when no limit was given
const SAMPLE_SIZE: u32 = 5;

impl ToolRequest {
    /// Validate and coerce raw arguments for the named tool.
    ///
    /// Non-object arguments count as an empty set. Out-of-range integers are
    /// clamped, unknown enum values are dropped.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self> {
        let tool: ToolName = name.parse()?;
        let desc =
            descriptor(tool).ok_or_else(|| AssistantError::UnknownTool(name.to_string()))?;
        let empty = Map::new();
        let args = Args {
            desc,
            map: arguments.as_object().unwrap_or(&empty),
        };

        let request = match tool {
            ToolName::RecentOrders => ToolRequest::RecentOrders(OrderListArgs {
                limit: args.limit(),
                filters: args.order_filters(),
            }),
            ToolName::OrderStatistics => ToolRequest::OrderStatistics(args.order_filters()),
            ToolName::SalesByPeriod => ToolRequest::SalesByPeriod(SalesByPeriodArgs {
                period: args.parsed("period").unwrap_or_default(),
                filters: args.order_filters(),
            }),
            ToolName::TopProducts => ToolRequest::TopProducts(TopProductsArgs {
                limit: args.limit().cap().unwrap_or(1) as u32,
            }),
            ToolName::CustomerSummary => ToolRequest::CustomerSummary,
            ToolName::Customers => ToolRequest::Customers(CustomerListArgs {
                limit: args.limit(),
            }),
            ToolName::StockStatus => ToolRequest::StockStatus(StockArgs {
                stock_status: args.parsed("stock_status"),
                limit: args.limit(),
            }),
            ToolName::InventorySummary => ToolRequest::InventorySummary,
            ToolName::QueryEntities => {
                let entity_type = args
                    .string("entity_type")
                    .map(normalize_entity_type)
                    .filter(|e| QUERYABLE_ENTITIES.contains(e))
                    .unwrap_or(EntityType::Products);
                let query_type = args
                    .string("query_type")
                    .and_then(parse_query_type)
                    .unwrap_or_default();
                let limit = if query_type == QueryType::Sample && !args.has("limit") {
                    Limit::Count(SAMPLE_SIZE)
                } else {
                    args.limit()
                };
                ToolRequest::QueryEntities(EntityQueryArgs {
                    entity_type,
                    query_type,
                    limit,
                })
            }
        };
        Ok(request)
    }

    pub fn tool_name(&self) -> ToolName {
        match self {
            ToolRequest::RecentOrders(_) => ToolName::RecentOrders,
            ToolRequest::OrderStatistics(_) => ToolName::OrderStatistics,
            ToolRequest::SalesByPeriod(_) => ToolName::SalesByPeriod,
            ToolRequest::TopProducts(_) => ToolName::TopProducts,
            ToolRequest::CustomerSummary => ToolName::CustomerSummary,
            ToolRequest::Customers(_) => ToolName::Customers,
            ToolRequest::StockStatus(_) => ToolName::StockStatus,
            ToolRequest::InventorySummary => ToolName::InventorySummary,
            ToolRequest::QueryEntities(_) => ToolName::QueryEntities,
        }
    }

    /// The coerced arguments, as reported back alongside empty results
    pub fn arguments(&self) -> Value {
        let value = match self {
            ToolRequest::RecentOrders(a) => serde_json::to_value(a),
            ToolRequest::OrderStatistics(a) => serde_json::to_value(a),
            ToolRequest::SalesByPeriod(a) => serde_json::to_value(a),
            ToolRequest::TopProducts(a) => serde_json::to_value(a),
            ToolRequest::Customers(a) => serde_json::to_value(a),
            ToolRequest::StockStatus(a) => serde_json::to_value(a),
            ToolRequest::QueryEntities(a) => serde_json::to_value(a),
            ToolRequest::CustomerSummary | ToolRequest::InventorySummary => Ok(json!({})),
        };
        value.unwrap_or_else(|_| json!({}))
    }
}

fn parse_query_type(value: &str) -> Option<QueryType> {
    match value.trim().to_lowercase().as_str() {
        "list" => Some(QueryType::List),
        "statistics" | "stats" | "count" => Some(QueryType::Statistics),
        "sample" => Some(QueryType::Sample),
        "by_period" => Some(QueryType::ByPeriod),
        _ => None,
    }
}

/// Argument reader bound to one descriptor
struct Args<'a> {
    desc: &'a ToolDescriptor,
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    fn has(&self, name: &str) -> bool {
        self.map.get(name).map_or(false, |v| !v.is_null())
    }

    fn string(&self, name: &str) -> Option<&'a str> {
        self.map
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn integer(&self, name: &str) -> Option<i64> {
        match self.map.get(name)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.string(name)?;
        let parsed = raw.parse().ok();
        if parsed.is_none() {
            tracing::warn!(
                tool = %self.desc.name,
                param = name,
                value = raw,
                "Dropping unrecognised argument value"
            );
        }
        parsed
    }

    /// The `limit` argument clamped to its declared range
    fn limit(&self) -> Limit {
        let Some(ParamKind::Integer {
            min,
            max,
            default,
            allow_unbounded,
        }) = self.desc.param("limit").map(|p| &p.kind)
        else {
            return Limit::Unbounded;
        };

        match self.integer("limit").or(*default) {
            Some(Limit::UNBOUNDED_SENTINEL) if *allow_unbounded => Limit::Unbounded,
            Some(Limit::UNBOUNDED_SENTINEL) => Limit::Count(*max as u32),
            Some(n) => Limit::Count(n.clamp(*min, *max) as u32),
            None => Limit::Count(*max as u32),
        }
    }

    fn order_filters(&self) -> OrderFilterArgs {
        OrderFilterArgs {
            status: self.parsed("status"),
            date_from: self.string("date_from").map(str::to_string),
            date_to: self.string("date_to").map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_round_trip() {
        for desc in registry() {
            assert_eq!(desc.name.as_str().parse::<ToolName>().unwrap(), desc.name);
        }
        assert_eq!(registry().len(), 9);
    }

    #[test]
    fn test_empty_parameters_render_as_object() {
        let schema = descriptor(ToolName::CustomerSummary).unwrap().parameters_schema();
        assert!(schema["properties"].is_object());
        assert_eq!(schema["properties"], json!({}));
        assert_eq!(schema["type"], "object");
        assert_eq!(
            serde_json::to_string(&schema["properties"]).unwrap(),
            "{}"
        );
    }

    #[test]
    fn test_openai_tools_payload() {
        let tools = openai_tools();
        assert_eq!(tools.len(), registry().len());
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "get_recent_orders");
        let inventory = tools
            .iter()
            .find(|t| t["function"]["name"] == "get_inventory_summary")
            .unwrap();
        assert_eq!(inventory["function"]["parameters"]["properties"], json!({}));
    }

    #[test]
    fn test_limit_schema_bounds() {
        let schema = descriptor(ToolName::TopProducts).unwrap().parameters_schema();
        assert_eq!(schema["properties"]["limit"]["minimum"], 1);
        assert_eq!(schema["properties"]["limit"]["maximum"], 50);

        let schema = descriptor(ToolName::RecentOrders).unwrap().parameters_schema();
        assert_eq!(schema["properties"]["limit"]["minimum"], -1);
        assert_eq!(schema["properties"]["limit"]["maximum"], 100);
        assert_eq!(
            schema["properties"]["status"]["enum"][2],
            json!("on-hold")
        );
    }

    #[test]
    fn test_unknown_tool_is_typed_error() {
        let err = ToolRequest::parse("drop_tables", &json!({})).unwrap_err();
        assert!(matches!(err, AssistantError::UnknownTool(name) if name == "drop_tables"));
    }

    #[test]
    fn test_limit_clamped_to_declared_max() {
        let request = ToolRequest::parse("get_recent_orders", &json!({"limit": 500})).unwrap();
        assert_eq!(
            request,
            ToolRequest::RecentOrders(OrderListArgs {
                limit: Limit::Count(100),
                filters: OrderFilterArgs::default(),
            })
        );

        let request = ToolRequest::parse("get_top_products", &json!({"limit": 500})).unwrap();
        assert_eq!(request, ToolRequest::TopProducts(TopProductsArgs { limit: 50 }));

        let request = ToolRequest::parse("get_customers", &json!({"limit": 0})).unwrap();
        assert_eq!(
            request,
            ToolRequest::Customers(CustomerListArgs {
                limit: Limit::Count(1)
            })
        );
    }

    #[test]
    fn test_error_result_content_is_flat() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "drop_tables".into(),
            arguments: json!({}),
        };
        let result = ToolResult::error(&call, &AssistantError::UnknownTool("drop_tables".into()));
        let content: Value = serde_json::from_str(&result.content()).unwrap();
        assert_eq!(content["code"], "unknown_tool");
        assert!(content["error"].is_string());
    }

    #[test]
    fn test_unbounded_only_where_declared() {
        let request = ToolRequest::parse("get_recent_orders", &json!({"limit": -1})).unwrap();
        assert!(matches!(
            request,
            ToolRequest::RecentOrders(OrderListArgs {
                limit: Limit::Unbounded,
                ..
            })
        ));

        let request = ToolRequest::parse("get_top_products", &json!({"limit": -1})).unwrap();
        assert_eq!(request, ToolRequest::TopProducts(TopProductsArgs { limit: 50 }));
    }

    #[test]
    fn test_defaults_and_lenient_values() {
        let request = ToolRequest::parse("get_customers", &Value::Null).unwrap();
        assert_eq!(
            request,
            ToolRequest::Customers(CustomerListArgs {
                limit: Limit::Count(10)
            })
        );

        let request = ToolRequest::parse(
            "get_recent_orders",
            &json!({"limit": "15", "status": "wc-pending", "date_from": " "}),
        )
        .unwrap();
        assert_eq!(
            request,
            ToolRequest::RecentOrders(OrderListArgs {
                limit: Limit::Count(15),
                filters: OrderFilterArgs {
                    status: Some(OrderStatus::Pending),
                    date_from: None,
                    date_to: None,
                },
            })
        );
    }

    #[test]
    fn test_invalid_enum_dropped() {
        let request =
            ToolRequest::parse("get_order_statistics", &json!({"status": "shipped"})).unwrap();
        assert_eq!(request, ToolRequest::OrderStatistics(OrderFilterArgs::default()));
    }

    #[test]
    fn test_query_entities_sample_default() {
        let request = ToolRequest::parse(
            "query_entities",
            &json!({"entity_type": "Coupons", "query_type": "sample"}),
        )
        .unwrap();
        assert_eq!(
            request,
            ToolRequest::QueryEntities(EntityQueryArgs {
                entity_type: EntityType::Coupons,
                query_type: QueryType::Sample,
                limit: Limit::Count(5),
            })
        );
    }

    #[test]
    fn test_arguments_report_coerced_values() {
        let request = ToolRequest::parse("get_recent_orders", &json!({"limit": -1})).unwrap();
        assert_eq!(request.arguments(), json!({"limit": -1}));
    }

    #[test]
    fn test_tool_result_empty_marker() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "get_recent_orders".into(),
            arguments: json!({}),
        };
        let result =
            ToolResult::success(&call, json!({"no_records_found": true, "record_count": 0}));
        assert!(result.is_empty_result());
        assert!(result.is_success());
    }
}
