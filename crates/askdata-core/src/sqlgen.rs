//! Deterministic query builder.
//!
//! Maps [`Constraints`] onto one of a fixed set of query templates over
//! the dataset schema (Orders, "Order Details", Products, Categories,
//! Customers). Each recognized intent fixes the aggregation, grouping,
//! and join path; the date range becomes a closed-interval filter and the
//! category an equality filter when present.
//!
//! Interpolated literals come only from fixed vocabularies (category
//! names) or [`chrono::NaiveDate`] rendering — never raw question text —
//! and the store contract is read-only.
//!
//! When neither an intent nor a metric was recognized the builder
//! declines with [`PipelineError::ConstraintsInsufficient`]: a filter
//! without an aggregate does not make a sensible query, and guessing
//! would defeat auditability.

use crate::error::PipelineError;
use crate::models::{Constraints, Intent, Metric, SqlAttempt};

/// Cost approximation used for gross-margin metrics when no explicit
/// cost field exists: cost is assumed to be 70% of unit price. This is a
/// documented domain assumption, applied uniformly to every margin
/// template.
pub const GROSS_MARGIN_COST_RATIO: f64 = 0.70;

/// Per-unit margin under the fixed cost approximation.
pub fn unit_margin(unit_price: f64) -> f64 {
    unit_price * (1.0 - GROSS_MARGIN_COST_RATIO)
}

/// The `(UnitPrice - cost) × Quantity × (1 - Discount)` margin expression.
fn margin_expr() -> String {
    format!(
        "SUM((od.UnitPrice - od.UnitPrice * {:.2}) * od.Quantity * (1 - od.Discount))",
        GROSS_MARGIN_COST_RATIO
    )
}

const REVENUE_EXPR: &str = "SUM(od.UnitPrice * od.Quantity * (1 - od.Discount))";

fn where_clause(constraints: &Constraints, with_category: bool) -> String {
    let mut predicates = Vec::new();
    if let Some(d) = &constraints.dates {
        predicates.push(format!(
            "o.OrderDate BETWEEN '{}' AND '{}'",
            d.start, d.end
        ));
    }
    if with_category {
        if let Some(cat) = &constraints.category {
            predicates.push(format!("c.CategoryName = '{}'", cat));
        }
    }
    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

const ORDERS_JOIN: &str = r#"FROM "Order Details" od JOIN Orders o ON od.OrderID = o.OrderID"#;

const CATEGORY_JOINS: &str = concat!(
    r#"FROM "Order Details" od JOIN Orders o ON od.OrderID = o.OrderID "#,
    "JOIN Products p ON od.ProductID = p.ProductID ",
    "JOIN Categories c ON p.CategoryID = c.CategoryID"
);

/// Whole-range aggregate for a bare metric, filtered by whatever the
/// constraints carry. Used when no more specific intent matched.
fn metric_fallback(metric: Metric, constraints: &Constraints) -> String {
    let needs_category = constraints.category.is_some();
    let joins = if needs_category {
        CATEGORY_JOINS
    } else {
        ORDERS_JOIN
    };
    let filter = where_clause(constraints, needs_category);
    match metric {
        Metric::Revenue => format!("SELECT {} AS revenue {}{};", REVENUE_EXPR, joins, filter),
        Metric::UnitCount => format!("SELECT SUM(od.Quantity) AS quantity {}{};", joins, filter),
        Metric::AverageOrderValue => format!(
            "SELECT CAST({} AS REAL) / COUNT(DISTINCT o.OrderID) AS aov {}{};",
            REVENUE_EXPR, joins, filter
        ),
        Metric::GrossMargin => format!("SELECT {} AS margin {}{};", margin_expr(), joins, filter),
    }
}

/// Render attempt 1 for the given constraints, or decline.
pub fn build(constraints: &Constraints) -> Result<SqlAttempt, PipelineError> {
    let sql = match constraints.intent {
        Intent::TopCategoryByQuantity => format!(
            "SELECT c.CategoryName AS category, SUM(od.Quantity) AS quantity {}{} \
             GROUP BY c.CategoryName ORDER BY quantity DESC LIMIT {};",
            CATEGORY_JOINS,
            where_clause(constraints, false),
            constraints.limit
        ),
        Intent::AverageOrderValue => format!(
            "SELECT CAST({} AS REAL) / COUNT(DISTINCT o.OrderID) AS aov {}{};",
            REVENUE_EXPR,
            ORDERS_JOIN,
            where_clause(constraints, false)
        ),
        Intent::GrossMarginByCustomer => format!(
            "SELECT cu.CompanyName AS customer, {} AS margin {} \
             JOIN Customers cu ON o.CustomerID = cu.CustomerID{} \
             GROUP BY cu.CustomerID, cu.CompanyName ORDER BY margin DESC LIMIT {};",
            margin_expr(),
            ORDERS_JOIN,
            where_clause(constraints, false),
            constraints.limit
        ),
        Intent::GrossMarginTotal => format!(
            "SELECT {} AS margin {}{};",
            margin_expr(),
            ORDERS_JOIN,
            where_clause(constraints, false)
        ),
        Intent::TopProductsByRevenue => format!(
            "SELECT p.ProductName AS product, {} AS revenue {} \
             JOIN Products p ON od.ProductID = p.ProductID{} \
             GROUP BY p.ProductID, p.ProductName ORDER BY revenue DESC LIMIT {};",
            REVENUE_EXPR,
            ORDERS_JOIN,
            where_clause(constraints, false),
            constraints.limit
        ),
        Intent::CategoryRevenue if constraints.category.is_some() => format!(
            "SELECT {} AS revenue {}{};",
            REVENUE_EXPR,
            CATEGORY_JOINS,
            where_clause(constraints, true)
        ),
        Intent::ReturnPolicy => {
            return Err(PipelineError::ConstraintsInsufficient(
                "document question; no query template applies".into(),
            ))
        }
        Intent::CategoryRevenue | Intent::Unknown => match constraints.metric {
            Some(metric) => metric_fallback(metric, constraints),
            None => {
                return Err(PipelineError::ConstraintsInsufficient(
                    "no recognized metric; a bare filter is not a sensible aggregate".into(),
                ))
            }
        },
    };

    Ok(SqlAttempt::first(sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, Intent, Metric};

    fn constraints(intent: Intent, metric: Option<Metric>) -> Constraints {
        Constraints {
            intent,
            dates: DateRange::full_year(1997),
            category: None,
            metric,
            limit: 1,
            hints: Vec::new(),
            source_chunks: Vec::new(),
        }
    }

    #[test]
    fn test_unit_margin_is_thirty_percent_of_price() {
        assert!((unit_margin(10.0) - 3.0).abs() < 1e-9);
        assert!((10.0 - unit_margin(10.0) - 7.0).abs() < 1e-9);
        for price in [0.5, 1.0, 19.99, 263.5] {
            assert!((unit_margin(price) - price * 0.3).abs() < 1e-9);
        }
    }

    #[test]
    fn test_revenue_fallback_with_year_filter() {
        let attempt = build(&constraints(Intent::Unknown, Some(Metric::Revenue))).unwrap();
        assert_eq!(attempt.attempt, 1);
        assert!(attempt.sql.contains(r#""Order Details""#));
        assert!(attempt
            .sql
            .contains("o.OrderDate BETWEEN '1997-01-01' AND '1997-12-31'"));
        assert!(attempt.sql.contains("AS revenue"));
    }

    #[test]
    fn test_margin_templates_carry_cost_constant() {
        let attempt = build(&constraints(Intent::GrossMarginTotal, Some(Metric::GrossMargin)))
            .unwrap();
        assert!(attempt.sql.contains("od.UnitPrice * 0.70"));
    }

    #[test]
    fn test_no_metric_is_insufficient() {
        let err = build(&constraints(Intent::Unknown, None)).unwrap_err();
        assert!(matches!(err, PipelineError::ConstraintsInsufficient(_)));
    }

    #[test]
    fn test_return_policy_declines() {
        let err = build(&constraints(Intent::ReturnPolicy, None)).unwrap_err();
        assert!(matches!(err, PipelineError::ConstraintsInsufficient(_)));
    }

    #[test]
    fn test_category_filter_is_equality() {
        let mut c = constraints(Intent::CategoryRevenue, Some(Metric::Revenue));
        c.category = Some("Beverages".into());
        let attempt = build(&c).unwrap();
        assert!(attempt.sql.contains("c.CategoryName = 'Beverages'"));
        assert!(attempt.sql.contains("JOIN Categories c"));
    }

    #[test]
    fn test_no_dates_omits_date_filter() {
        let mut c = constraints(Intent::Unknown, Some(Metric::Revenue));
        c.dates = None;
        let attempt = build(&c).unwrap();
        assert!(!attempt.sql.contains("BETWEEN"));
        assert!(attempt.sql.ends_with(';'));
    }

    #[test]
    fn test_top_products_respects_limit() {
        let mut c = constraints(Intent::TopProductsByRevenue, Some(Metric::Revenue));
        c.limit = 3;
        let attempt = build(&c).unwrap();
        assert!(attempt.sql.contains("LIMIT 3;"));
        assert!(attempt.sql.contains("GROUP BY p.ProductID"));
    }

    #[test]
    fn test_deterministic() {
        let c = constraints(Intent::AverageOrderValue, Some(Metric::AverageOrderValue));
        assert_eq!(build(&c).unwrap().sql, build(&c).unwrap().sql);
    }
}
