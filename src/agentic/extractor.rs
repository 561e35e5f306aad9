//! Entity/Intent Extractor
//!
//! Pure functions mapping question text to an entity type, a query type and a
//! filter set. Matching is case-insensitive and whole-word. Every table here
//! is ordered and evaluated first-match-wins: the declaration order decides
//! ties, so do not reorder entries casually.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::store::{Limit, OrderStatus};

// ============================================================================
// Types
// ============================================================================

/// The store data category a question is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Orders,
    Products,
    Customers,
    Categories,
    Tags,
    Coupons,
    Refunds,
    Stock,
    Inventory,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Orders => "orders",
            EntityType::Products => "products",
            EntityType::Customers => "customers",
            EntityType::Categories => "categories",
            EntityType::Tags => "tags",
            EntityType::Coupons => "coupons",
            EntityType::Refunds => "refunds",
            EntityType::Stock => "stock",
            EntityType::Inventory => "inventory",
            EntityType::Other => "other",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape of the answer the question asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[default]
    List,
    Statistics,
    Sample,
    ByPeriod,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::List => "list",
            QueryType::Statistics => "statistics",
            QueryType::Sample => "sample",
            QueryType::ByPeriod => "by_period",
        }
    }
}

/// Filters extracted from a question.
///
/// `limit: None` means "not specified" and must stay distinct from
/// `Some(Limit::Unbounded)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}

/// Everything the extractor derives from one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub entity_type: Option<EntityType>,
    pub entities: Vec<EntityType>,
    pub query_type: QueryType,
    pub filters: FilterSet,
}

// ============================================================================
// Tables
// ============================================================================

/// Cheap gate: substrings that suggest the question needs store data
const DATA_KEYWORDS: &[&str] = &[
    "order",
    "product",
    "customer",
    "sale",
    "revenue",
    "stock",
    "inventory",
    "coupon",
    "refund",
    "categor",
    "tag",
    "buyer",
    "purchase",
    "item",
    "shopper",
    "discount",
    "income",
    "earning",
    "best seller",
    "bestseller",
    "best selling",
    "top selling",
    "show me",
    "how many",
    "how much",
    "list",
    "total",
    "average",
    "statistics",
    "report",
];

/// Entity synonyms in tie-break order
const ENTITY_SYNONYMS: &[(EntityType, &[&str])] = &[
    (
        EntityType::Orders,
        &[
            "order",
            "orders",
            "purchase",
            "purchases",
            "sale",
            "sales",
            "revenue",
            "transaction",
            "transactions",
        ],
    ),
    (
        EntityType::Products,
        &[
            "product",
            "products",
            "item",
            "items",
            "merchandise",
            "goods",
            "catalog",
            "catalogue",
        ],
    ),
    (
        EntityType::Customers,
        &[
            "customer",
            "customers",
            "buyer",
            "buyers",
            "client",
            "clients",
            "shopper",
            "shoppers",
        ],
    ),
    (
        EntityType::Categories,
        &["category", "categories", "product category", "product categories"],
    ),
    (EntityType::Tags, &["tag", "tags", "product tag", "product tags"]),
    (
        EntityType::Coupons,
        &[
            "coupon",
            "coupons",
            "discount",
            "discounts",
            "promo code",
            "promo codes",
            "voucher",
            "vouchers",
        ],
    ),
    (
        EntityType::Refunds,
        &["refund", "refunds", "chargeback", "chargebacks"],
    ),
    (
        EntityType::Stock,
        &[
            "stock",
            "stock level",
            "stock levels",
            "out of stock",
            "in stock",
            "backorder",
            "backorders",
        ],
    ),
    (
        EntityType::Inventory,
        &["inventory", "inventories", "warehouse"],
    ),
];

/// Order status keywords, first match wins
const STATUS_KEYWORDS: &[(OrderStatus, &[&str])] = &[
    (OrderStatus::Pending, &["pending", "unpaid", "awaiting payment"]),
    (OrderStatus::Processing, &["processing", "in progress"]),
    (OrderStatus::OnHold, &["on-hold", "on hold"]),
    (OrderStatus::Completed, &["completed", "fulfilled", "delivered"]),
    (OrderStatus::Cancelled, &["cancelled", "canceled"]),
    (OrderStatus::Refunded, &["refunded"]),
    (OrderStatus::Failed, &["failed"]),
];

/// Synonyms accepted by `normalize_entity_type`. "inventory" stays its own
/// type and is never folded into "stock".
const NORMALIZATION_SYNONYMS: &[(&str, EntityType)] = &[
    ("order", EntityType::Orders),
    ("orders", EntityType::Orders),
    ("sale", EntityType::Orders),
    ("sales", EntityType::Orders),
    ("product", EntityType::Products),
    ("products", EntityType::Products),
    ("item", EntityType::Products),
    ("items", EntityType::Products),
    ("customer", EntityType::Customers),
    ("customers", EntityType::Customers),
    ("client", EntityType::Customers),
    ("clients", EntityType::Customers),
    ("category", EntityType::Categories),
    ("categories", EntityType::Categories),
    ("product category", EntityType::Categories),
    ("product categories", EntityType::Categories),
    ("tag", EntityType::Tags),
    ("tags", EntityType::Tags),
    ("coupon", EntityType::Coupons),
    ("coupons", EntityType::Coupons),
    ("discount", EntityType::Coupons),
    ("discounts", EntityType::Coupons),
    ("refund", EntityType::Refunds),
    ("refunds", EntityType::Refunds),
    ("stock", EntityType::Stock),
    ("stock level", EntityType::Stock),
    ("stock levels", EntityType::Stock),
    ("stock status", EntityType::Stock),
    ("inventory", EntityType::Inventory),
];

fn word_regex(words: &[&str]) -> Regex {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("keyword table compiles")
}

static ENTITY_PATTERNS: Lazy<Vec<(EntityType, Regex)>> = Lazy::new(|| {
    ENTITY_SYNONYMS
        .iter()
        .map(|(entity, words)| (*entity, word_regex(words)))
        .collect()
});

static STATUS_PATTERNS: Lazy<Vec<(OrderStatus, Regex)>> = Lazy::new(|| {
    STATUS_KEYWORDS
        .iter()
        .map(|(status, words)| (*status, word_regex(words)))
        .collect()
});

/// Query-type rules in priority order: statistics, then time series, then
/// sampling. A question with both "total" and "monthly" is statistics.
static QUERY_RULES: Lazy<Vec<(QueryType, Regex)>> = Lazy::new(|| {
    vec![
        (
            QueryType::Statistics,
            word_regex(&[
                "total",
                "totals",
                "revenue",
                "count",
                "average",
                "avg",
                "sum",
                "how many",
                "how much",
                "number of",
                "statistics",
                "stats",
                "overall",
            ]),
        ),
        (
            QueryType::ByPeriod,
            word_regex(&[
                "by day",
                "by week",
                "by month",
                "by year",
                "per day",
                "per week",
                "per month",
                "per year",
                "daily",
                "weekly",
                "monthly",
                "yearly",
                "over time",
                "trend",
                "trends",
            ]),
        ),
        (
            QueryType::Sample,
            word_regex(&["sample", "samples", "example", "examples", "few", "some"]),
        ),
    ]
});

static CONJUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:and|or|plus|with)\b|,").expect("conjunction pattern"));

static BARE_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").expect("integer pattern"));

static UNBOUNDED_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| word_regex(&["all", "every", "entire", "complete", "full"]));

static ORDER_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| word_regex(&["order", "orders", "purchase", "purchases", "sale", "sales"]));

// ============================================================================
// Operations
// ============================================================================

/// True when the question plausibly needs store data. False positives are
/// fine; this is a gate, not a classifier.
pub fn requires_data(question: &str) -> bool {
    let lowered = question.to_lowercase();
    DATA_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// First entity type (in table order) with a whole-word synonym match
pub fn extract_entity_type(question: &str) -> Option<EntityType> {
    ENTITY_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(question))
        .map(|(entity, _)| *entity)
}

/// Every distinct matching entity type, only when the question joins them
/// with a conjunction and at least two types match. Empty otherwise.
pub fn detect_multiple_entities(question: &str) -> Vec<EntityType> {
    if !CONJUNCTION.is_match(question) {
        return Vec::new();
    }
    let found: Vec<EntityType> = ENTITY_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(question))
        .map(|(entity, _)| *entity)
        .collect();
    if found.len() >= 2 {
        found
    } else {
        Vec::new()
    }
}

/// Whether order-related words appear anywhere in the question
pub fn mentions_orders(question: &str) -> bool {
    ORDER_KEYWORDS.is_match(question)
}

pub fn extract_query_type(question: &str) -> QueryType {
    QUERY_RULES
        .iter()
        .find(|(_, re)| re.is_match(question))
        .map(|(query_type, _)| *query_type)
        .unwrap_or_default()
}

/// Extract filters relative to today's date (UTC)
pub fn extract_filters(question: &str, entity_type: Option<EntityType>) -> FilterSet {
    extract_filters_at(question, entity_type, Utc::now().date_naive())
}

/// Extract filters relative to an explicit reference date
pub fn extract_filters_at(
    question: &str,
    entity_type: Option<EntityType>,
    today: NaiveDate,
) -> FilterSet {
    let mut filters = FilterSet::default();

    if let Some(n) = BARE_INTEGER
        .captures(question)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
    {
        filters.limit = Some(Limit::from_raw(n));
    } else if UNBOUNDED_KEYWORDS.is_match(question) {
        filters.limit = Some(Limit::Unbounded);
    }

    if entity_type == Some(EntityType::Orders) || mentions_orders(question) {
        filters.status = STATUS_PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(question))
            .map(|(status, _)| *status);
    }

    if let Some((from, to)) = extract_date_range(question, today) {
        filters.date_from = Some(from);
        filters.date_to = Some(to);
    }

    filters
}

static PERIOD_PHRASES: Lazy<Vec<(RelativePeriod, Regex)>> = Lazy::new(|| {
    vec![
        (RelativePeriod::Today, word_regex(&["today"])),
        (RelativePeriod::Yesterday, word_regex(&["yesterday"])),
        (RelativePeriod::ThisWeek, word_regex(&["this week"])),
        (RelativePeriod::LastWeek, word_regex(&["last week", "previous week"])),
        (RelativePeriod::ThisMonth, word_regex(&["this month"])),
        (RelativePeriod::LastMonth, word_regex(&["last month", "previous month"])),
        (RelativePeriod::ThisYear, word_regex(&["this year"])),
        (RelativePeriod::LastYear, word_regex(&["last year", "previous year"])),
    ]
});

#[derive(Debug, Clone, Copy)]
enum RelativePeriod {
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
}

fn extract_date_range(question: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let period = PERIOD_PHRASES
        .iter()
        .find(|(_, re)| re.is_match(question))
        .map(|(p, _)| *p)?;

    let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let month_start = today.with_day(1)?;
    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;

    Some(match period {
        RelativePeriod::Today => (today, today),
        RelativePeriod::Yesterday => {
            let y = today - Duration::days(1);
            (y, y)
        }
        RelativePeriod::ThisWeek => (week_start, today),
        RelativePeriod::LastWeek => (
            week_start - Duration::days(7),
            week_start - Duration::days(1),
        ),
        RelativePeriod::ThisMonth => (month_start, today),
        RelativePeriod::LastMonth => {
            let last_day = month_start - Duration::days(1);
            (last_day.with_day(1)?, last_day)
        }
        RelativePeriod::ThisYear => (year_start, today),
        RelativePeriod::LastYear => (
            NaiveDate::from_ymd_opt(today.year() - 1, 1, 1)?,
            year_start - Duration::days(1),
        ),
    })
}

pub fn normalize_entity_type(type_str: &str) -> EntityType {
    let normalized = type_str.trim().to_lowercase();
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    NORMALIZATION_SYNONYMS
        .iter()
        .find(|(name, _)| *name == collapsed)
        .map(|(_, entity)| *entity)
        .unwrap_or(EntityType::Other)
}

/// Run every extractor over one question
pub fn classify(question: &str) -> Classification {
    let entity_type = extract_entity_type(question);
    Classification {
        entity_type,
        entities: detect_multiple_entities(question),
        query_type: extract_query_type(question),
        filters: extract_filters(question, entity_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_requires_data() {
        assert!(requires_data("Show me my latest orders"));
        assert!(requires_data("HOW MANY customers signed up?"));
        assert!(!requires_data("Hello there"));
        assert!(!requires_data("What is the capital of France?"));
    }

    #[test]
    fn test_entity_type_first_declared_wins() {
        assert_eq!(
            extract_entity_type("which products appear in recent orders"),
            Some(EntityType::Orders)
        );
        // "product" is declared before "product categories"
        assert_eq!(
            extract_entity_type("list product categories"),
            Some(EntityType::Products)
        );
        assert_eq!(
            extract_entity_type("show me all categories"),
            Some(EntityType::Categories)
        );
        assert_eq!(extract_entity_type("Any COUPONS active?"), Some(EntityType::Coupons));
        assert_eq!(extract_entity_type("good morning"), None);
    }

    #[test]
    fn test_entity_type_whole_word() {
        // "stockings" must not match "stock"
        assert_eq!(extract_entity_type("do we sell stockings"), None);
        assert_eq!(extract_entity_type("stock levels please"), Some(EntityType::Stock));
        assert_eq!(
            extract_entity_type("inventory overview"),
            Some(EntityType::Inventory)
        );
    }

    #[test]
    fn test_multiple_entities() {
        let found = detect_multiple_entities("How many completed orders and products do I have");
        assert!(found.contains(&EntityType::Orders));
        assert!(found.contains(&EntityType::Products));
    }

    #[test]
    fn test_multiple_entities_requires_conjunction_and_two_types() {
        assert!(detect_multiple_entities("orders products").is_empty());
        assert!(detect_multiple_entities("orders and more orders").is_empty());
        assert_eq!(
            detect_multiple_entities("customers, coupons"),
            vec![EntityType::Customers, EntityType::Coupons]
        );
    }

    #[test]
    fn test_filters_limit_and_status() {
        let question = "show me 15 pending orders";
        let filters = extract_filters(question, extract_entity_type(question));
        assert_eq!(filters.limit, Some(Limit::Count(15)));
        assert_eq!(filters.status, Some(OrderStatus::Pending));
        assert_eq!(extract_query_type(question), QueryType::List);
    }

    #[test]
    fn test_unbounded_sentinel_vs_unspecified() {
        let all = extract_filters("show me all orders", Some(EntityType::Orders));
        assert_eq!(all.limit, Some(Limit::Unbounded));
        assert_eq!(
            serde_json::to_value(&all).unwrap(),
            serde_json::json!({"limit": -1})
        );

        let none = extract_filters("show me orders", Some(EntityType::Orders));
        assert_eq!(none.limit, None);
        assert!(serde_json::to_value(&none).unwrap().get("limit").is_none());
    }

    #[test]
    fn test_explicit_number_beats_all_keyword() {
        let filters = extract_filters("show all 3 orders", Some(EntityType::Orders));
        assert_eq!(filters.limit, Some(Limit::Count(3)));
    }

    #[test]
    fn test_status_only_for_orders() {
        let filters = extract_filters("pending products", Some(EntityType::Products));
        assert_eq!(filters.status, None);

        let filters = extract_filters("refunded and cancelled orders", Some(EntityType::Orders));
        assert_eq!(filters.status, Some(OrderStatus::Cancelled));
    }

    #[test]
    fn test_query_type_priority() {
        assert_eq!(
            extract_query_type("what is my total revenue this month"),
            QueryType::Statistics
        );
        assert_eq!(
            extract_query_type("total sales monthly"),
            QueryType::Statistics
        );
        assert_eq!(extract_query_type("sales by month"), QueryType::ByPeriod);
        assert_eq!(extract_query_type("show me a few orders"), QueryType::Sample);
        assert_eq!(extract_query_type("list orders"), QueryType::List);
    }

    #[test]
    fn test_relative_dates() {
        let today = date(2024, 5, 15); // Wednesday
        let f = extract_filters_at("revenue this month", Some(EntityType::Orders), today);
        assert_eq!(f.date_from, Some(date(2024, 5, 1)));
        assert_eq!(f.date_to, Some(today));

        let f = extract_filters_at("orders last month", Some(EntityType::Orders), today);
        assert_eq!(f.date_from, Some(date(2024, 4, 1)));
        assert_eq!(f.date_to, Some(date(2024, 4, 30)));

        let f = extract_filters_at("orders last week", Some(EntityType::Orders), today);
        assert_eq!(f.date_from, Some(date(2024, 5, 6)));
        assert_eq!(f.date_to, Some(date(2024, 5, 12)));
    }

    #[test]
    fn test_normalize_keeps_inventory_distinct() {
        assert_eq!(normalize_entity_type("  Stock Levels "), EntityType::Stock);
        assert_eq!(normalize_entity_type("inventory"), EntityType::Inventory);
        assert_eq!(normalize_entity_type("Orders"), EntityType::Orders);
        assert_eq!(normalize_entity_type("widgets"), EntityType::Other);
    }
}
