//! Constraint extraction.
//!
//! Turns a question (and, when available, retrieved chunk text) into
//! immutable [`Constraints`] for the query builder. Extraction is a
//! fixed-vocabulary lookup plus a small set of date patterns; anything
//! unrecognized is left unset rather than guessed.
//!
//! # Date precedence
//!
//! A campaign date range parsed out of a retrieved chunk wins over a bare
//! year mentioned in the question, but only when the question actually
//! names that campaign — specificity over generality. An explicit
//! `YYYY-MM-DD to YYYY-MM-DD` phrase in the question itself ranks between
//! the two.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Constraints, DateRange, Intent, Metric, ResolvedChunk};

/// Campaign names the corpus documents; referencing one makes
/// chunk-derived dates authoritative.
const CAMPAIGNS: &[&str] = &["summer beverages", "winter classics"];

/// The fixed product category vocabulary of the dataset.
const CATEGORIES: &[&str] = &[
    "Beverages",
    "Condiments",
    "Confections",
    "Dairy Products",
    "Grains/Cereals",
    "Meat/Poultry",
    "Produce",
    "Seafood",
];

static CAMPAIGN_DATES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Dates:\s*(\d{4}-\d{2}-\d{2})\s+to\s+(\d{4}-\d{2}-\d{2})").expect("dates regex")
});
static START_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"start_date:\s*(\d{4}-\d{2}-\d{2})").expect("start regex"));
static END_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"end_date:\s*(\d{4}-\d{2}-\d{2})").expect("end regex"));
static EXPLICIT_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2})\s+(?:to|through)\s+(\d{4}-\d{2}-\d{2})").expect("range regex")
});
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("year regex"));
static TOP_N_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"top\s*(\d+)").expect("top regex"));

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// A chunk-derived date range plus the line it was parsed from.
struct ChunkRange {
    range: DateRange,
    chunk_id: String,
    line: String,
}

/// Look for a campaign date range in retrieved chunks, but only for a
/// campaign the question names.
fn campaign_range(question: &str, chunks: &[ResolvedChunk]) -> Option<ChunkRange> {
    let named: Vec<&str> = CAMPAIGNS
        .iter()
        .filter(|c| question.contains(*c))
        .copied()
        .collect();
    if named.is_empty() {
        return None;
    }

    for chunk in chunks {
        let lower = chunk.text.to_lowercase();
        if !named.iter().any(|c| lower.contains(c)) {
            continue;
        }
        if let Some(caps) = CAMPAIGN_DATES_RE.captures(&chunk.text) {
            if let (Some(s), Some(e)) = (parse_date(&caps[1]), parse_date(&caps[2])) {
                return Some(ChunkRange {
                    range: DateRange::new(s, e),
                    chunk_id: chunk.chunk_id.clone(),
                    line: caps[0].to_string(),
                });
            }
        }
        // Older corpus format: separate start_date / end_date fields.
        if let (Some(sc), Some(ec)) = (
            START_DATE_RE.captures(&chunk.text),
            END_DATE_RE.captures(&chunk.text),
        ) {
            if let (Some(s), Some(e)) = (parse_date(&sc[1]), parse_date(&ec[1])) {
                return Some(ChunkRange {
                    range: DateRange::new(s, e),
                    chunk_id: chunk.chunk_id.clone(),
                    line: format!("{} {}", &sc[0], &ec[0]),
                });
            }
        }
    }
    None
}

fn question_dates(question: &str) -> Option<DateRange> {
    if let Some(caps) = EXPLICIT_RANGE_RE.captures(question) {
        if let (Some(s), Some(e)) = (parse_date(&caps[1]), parse_date(&caps[2])) {
            return Some(DateRange::new(s, e));
        }
    }
    let year: i32 = YEAR_RE.captures(question)?[1].parse().ok()?;
    DateRange::full_year(year)
}

fn extract_category(question: &str, chunks: &[ResolvedChunk]) -> (Option<String>, Option<String>) {
    for cat in CATEGORIES {
        if question.contains(&cat.to_lowercase()) {
            return (Some((*cat).to_string()), None);
        }
    }
    for chunk in chunks {
        let lower = chunk.text.to_lowercase();
        for cat in CATEGORIES {
            if lower.contains(&cat.to_lowercase()) {
                return (Some((*cat).to_string()), Some(chunk.chunk_id.clone()));
            }
        }
    }
    (None, None)
}

fn extract_metric(question: &str) -> Option<Metric> {
    if question.contains("aov") || question.contains("average order value") {
        Some(Metric::AverageOrderValue)
    } else if question.contains("revenue") {
        Some(Metric::Revenue)
    } else if question.contains("margin") || question.contains("gross") {
        Some(Metric::GrossMargin)
    } else if question.contains("quantity")
        || question.contains("sold")
        || question.contains("units")
    {
        Some(Metric::UnitCount)
    } else {
        None
    }
}

fn extract_intent(question: &str) -> Intent {
    let ranking = question.contains("top") || question.contains("highest") || question.contains("best");

    if question.contains("return window") || question.contains("return days") {
        Intent::ReturnPolicy
    } else if ranking
        && question.contains("category")
        && (question.contains("quantity") || question.contains("qty") || question.contains("sold"))
    {
        Intent::TopCategoryByQuantity
    } else if question.contains("aov") || question.contains("average order value") {
        Intent::AverageOrderValue
    } else if (question.contains("gross margin") || question.contains("margin"))
        && question.contains("customer")
    {
        Intent::GrossMarginByCustomer
    } else if question.contains("gross margin") {
        Intent::GrossMarginTotal
    } else if ranking && question.contains("product") && question.contains("revenue") {
        Intent::TopProductsByRevenue
    } else if question.contains("revenue") && question.contains("category") {
        Intent::CategoryRevenue
    } else if question.contains("best customer") || question.contains("top customer") {
        Intent::GrossMarginByCustomer
    } else {
        Intent::Unknown
    }
}

fn extract_limit(question: &str) -> usize {
    TOP_N_RE
        .captures(question)
        .and_then(|caps| caps[1].parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

/// Extract structured constraints from the question and any retrieved
/// chunks. Never fails; unrecognizable fields stay unset.
pub fn extract(question: &str, chunks: &[ResolvedChunk]) -> Constraints {
    let q = question.to_lowercase();

    let mut hints = Vec::new();
    let mut source_chunks = Vec::new();

    let dates = match campaign_range(&q, chunks) {
        Some(found) => {
            hints.push(found.line);
            source_chunks.push(found.chunk_id);
            Some(found.range)
        }
        None => question_dates(&q),
    };

    let (category, category_chunk) = extract_category(&q, chunks);
    if let Some(id) = category_chunk {
        if !source_chunks.contains(&id) {
            source_chunks.push(id);
        }
    }

    Constraints {
        intent: extract_intent(&q),
        dates,
        category,
        metric: extract_metric(&q),
        limit: extract_limit(&q),
        hints,
        source_chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> ResolvedChunk {
        ResolvedChunk {
            chunk_id: id.to_string(),
            score: 0.5,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_bare_year_maps_to_full_year() {
        let c = extract("What was total revenue in 1997?", &[]);
        let dates = c.dates.unwrap();
        assert_eq!(dates.start, NaiveDate::from_ymd_opt(1997, 1, 1).unwrap());
        assert_eq!(dates.end, NaiveDate::from_ymd_opt(1997, 12, 31).unwrap());
    }

    #[test]
    fn test_campaign_range_beats_bare_year() {
        let chunks = vec![chunk(
            "marketing_calendar::chunk0",
            "Summer Beverages campaign. Dates: 1997-06-01 to 1997-06-30.",
        )];
        let c = extract(
            "What was revenue during the Summer Beverages campaign in 1997?",
            &chunks,
        );
        let dates = c.dates.unwrap();
        assert_eq!(dates.start, NaiveDate::from_ymd_opt(1997, 6, 1).unwrap());
        assert_eq!(dates.end, NaiveDate::from_ymd_opt(1997, 6, 30).unwrap());
        assert_eq!(c.source_chunks, vec!["marketing_calendar::chunk0"]);
        assert!(!c.hints.is_empty());
    }

    #[test]
    fn test_campaign_range_ignored_when_not_named() {
        // The chunk was retrieved but the question never mentions the
        // campaign, so the bare year wins.
        let chunks = vec![chunk(
            "marketing_calendar::chunk0",
            "Summer Beverages campaign. Dates: 1997-06-01 to 1997-06-30.",
        )];
        let c = extract("What was total revenue in 1997?", &chunks);
        assert_eq!(c.dates.unwrap().start, NaiveDate::from_ymd_opt(1997, 1, 1).unwrap());
        assert!(c.source_chunks.is_empty());
    }

    #[test]
    fn test_old_start_end_date_format() {
        let chunks = vec![chunk(
            "marketing_calendar::chunk1",
            "winter classics promo. start_date: 1997-12-01 end_date: 1997-12-31",
        )];
        let c = extract("Revenue during the Winter Classics campaign?", &chunks);
        let dates = c.dates.unwrap();
        assert_eq!(dates.start, NaiveDate::from_ymd_opt(1997, 12, 1).unwrap());
        assert_eq!(dates.end, NaiveDate::from_ymd_opt(1997, 12, 31).unwrap());
    }

    #[test]
    fn test_explicit_range_in_question() {
        let c = extract("Total revenue from 1997-03-01 to 1997-03-31?", &[]);
        let dates = c.dates.unwrap();
        assert_eq!(dates.start, NaiveDate::from_ymd_opt(1997, 3, 1).unwrap());
        assert_eq!(dates.end, NaiveDate::from_ymd_opt(1997, 3, 31).unwrap());
    }

    #[test]
    fn test_metric_vocabulary() {
        assert_eq!(
            extract("total revenue in 1997", &[]).metric,
            Some(Metric::Revenue)
        );
        assert_eq!(
            extract("average order value in 1997", &[]).metric,
            Some(Metric::AverageOrderValue)
        );
        assert_eq!(
            extract("gross margin in 1997", &[]).metric,
            Some(Metric::GrossMargin)
        );
        assert_eq!(
            extract("units sold in 1997", &[]).metric,
            Some(Metric::UnitCount)
        );
    }

    #[test]
    fn test_unrecognized_metric_stays_unset() {
        let c = extract("What was the shipping speed in 1997?", &[]);
        assert_eq!(c.metric, None);
        assert_eq!(c.intent, Intent::Unknown);
    }

    #[test]
    fn test_category_lookup() {
        let c = extract("Revenue for beverages in 1997", &[]);
        assert_eq!(c.category.as_deref(), Some("Beverages"));
    }

    #[test]
    fn test_top_n_limit() {
        assert_eq!(extract("top 3 products by revenue", &[]).limit, 3);
        assert_eq!(extract("top3 products by revenue", &[]).limit, 3);
        assert_eq!(extract("total revenue in 1997", &[]).limit, 1);
    }

    #[test]
    fn test_intents() {
        assert_eq!(
            extract("which category sold the highest quantity in 1997", &[]).intent,
            Intent::TopCategoryByQuantity
        );
        assert_eq!(
            extract("top 3 products by revenue", &[]).intent,
            Intent::TopProductsByRevenue
        );
        assert_eq!(
            extract("which customer had the best gross margin", &[]).intent,
            Intent::GrossMarginByCustomer
        );
        assert_eq!(
            extract("what is the return window for beverages", &[]).intent,
            Intent::ReturnPolicy
        );
    }
}
