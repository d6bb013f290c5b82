// Locale-aware number formatting for the dashboard

/// Shown wherever a value is missing; distinct from a formatted zero.
pub const PLACEHOLDER: &str = "—";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    pub currency_symbol: String,
    pub symbol_after: bool,
    pub thousands_separator: String,
    pub decimal_separator: String,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            symbol_after: false,
            thousands_separator: ",".to_string(),
            decimal_separator: ".".to_string(),
        }
    }
}

impl NumberFormat {
    pub fn format_currency(&self, value: f64) -> String {
        if !value.is_finite() {
            return PLACEHOLDER.to_string();
        }

        let cents = (value.abs() * 100.0).round() as u64;
        let amount = format!(
            "{}{}{:02}",
            group_thousands(cents / 100, &self.thousands_separator),
            self.decimal_separator,
            cents % 100
        );
        let sign = if value < 0.0 && cents > 0 { "-" } else { "" };

        if self.symbol_after {
            format!("{}{} {}", sign, amount, self.currency_symbol)
        } else {
            format!("{}{}{}", sign, self.currency_symbol, amount)
        }
    }

    pub fn format_optional_currency(&self, value: Option<f64>) -> String {
        value.map_or_else(|| PLACEHOLDER.to_string(), |v| self.format_currency(v))
    }

    pub fn format_count(&self, value: u64) -> String {
        group_thousands(value, &self.thousands_separator)
    }
}

fn group_thousands(value: u64, separator: &str) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}
