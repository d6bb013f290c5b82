// Query normalizer - Turns untrusted filter input into a canonical Filter
use crate::domain::filter::{year_end, year_start, Filter, MonthSelection, RawFilter};
use chrono::{Datelike, NaiveDate};

/// Result of normalizing a raw filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub filter: Filter,
    /// The requested range was reversed and `date_to` was pulled up to `date_from`.
    pub range_collapsed: bool,
}

/// Normalize raw filter input. Never fails.
///
/// Invalid dates fall back to the matching field of `previous`, then to the
/// bounds of the current year. `customer_id` survives only for entitled callers.
pub fn normalize_filters(
    raw: &RawFilter,
    previous: Option<&Filter>,
    can_filter_by_customer: bool,
    today: NaiveDate,
) -> Normalized {
    let date_from = raw
        .date_from
        .as_deref()
        .and_then(parse_iso_date)
        .or(previous.map(|p| p.date_from))
        .unwrap_or_else(|| year_start(today.year()));

    let date_to = raw
        .date_to
        .as_deref()
        .and_then(parse_iso_date)
        .or(previous.map(|p| p.date_to))
        .unwrap_or_else(|| year_end(today.year()));

    let customer_id = if can_filter_by_customer {
        raw.customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    let range_collapsed = date_from > date_to;
    let date_to = if range_collapsed { date_from } else { date_to };

    Normalized {
        filter: Filter::new(date_from, date_to, customer_id),
        range_collapsed,
    }
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Build a month selection, rejecting missing values and months outside 1..=12.
pub fn normalize_month_selection(year: Option<i32>, month: Option<u32>) -> Option<MonthSelection> {
    let (year, month) = (year?, month?);
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(MonthSelection {
        year,
        month,
        label: first_day.format("%B %Y").to_string(),
    })
}

/// Same as [`normalize_month_selection`] for string input (e.g. query params).
pub fn parse_month_selection(year: Option<&str>, month: Option<&str>) -> Option<MonthSelection> {
    let year = year?.trim().parse::<i32>().ok()?;
    let month = month?.trim().parse::<u32>().ok()?;
    normalize_month_selection(Some(year), Some(month))
}

/// Parse a `YYYY-MM` trend period.
pub fn parse_period(period: &str) -> Option<(i32, u32)> {
    let (year, month) = period.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year = year.parse::<i32>().ok()?;
    let month = month.parse::<u32>().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}
