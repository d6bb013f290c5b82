// Filter domain model - the scope applied to every analytics query
use chrono::NaiveDate;
use serde::Serialize;

/// Normalized date range plus optional customer scope.
///
/// Stored filters always satisfy `date_from <= date_to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub customer_id: Option<String>,
}

impl Filter {
    pub fn new(date_from: NaiveDate, date_to: NaiveDate, customer_id: Option<String>) -> Self {
        Self {
            date_from,
            date_to,
            customer_id,
        }
    }

    /// January 1 through December 31 of `year`.
    pub fn default_for_year(year: i32) -> Self {
        Self::new(year_start(year), year_end(year), None)
    }

    pub fn same_range(&self, other: &Filter) -> bool {
        self.date_from == other.date_from && self.date_to == other.date_to
    }

    pub fn without_customer(&self) -> Self {
        Self {
            customer_id: None,
            ..self.clone()
        }
    }
}

pub fn year_start(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub fn year_end(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Untrusted filter input as it arrives from a form or the address bar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFilter {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub customer_id: Option<String>,
}

impl RawFilter {
    pub fn new(
        date_from: impl Into<String>,
        date_to: impl Into<String>,
        customer_id: Option<&str>,
    ) -> Self {
        Self {
            date_from: Some(date_from.into()),
            date_to: Some(date_to.into()),
            customer_id: customer_id.map(str::to_string),
        }
    }
}

/// A drill-down into one month of the trend series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthSelection {
    pub year: i32,
    pub month: u32,
    pub label: String,
}

impl MonthSelection {
    pub fn matches(&self, year: i32, month: u32) -> bool {
        self.year == year && self.month == month
    }
}

/// Request parameters for the per-day breakdown of one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuery {
    pub year: i32,
    pub month: u32,
    pub customer_id: Option<String>,
}

impl DailyQuery {
    pub fn new(selection: &MonthSelection, filter: &Filter) -> Self {
        Self {
            year: selection.year,
            month: selection.month,
            customer_id: filter.customer_id.clone(),
        }
    }
}
