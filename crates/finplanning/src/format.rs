/// Insert thousands separators into a whole number of dollars
fn group_thousands(dollars: u64) -> String {
    let digits = dollars.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

fn sign(value: f64) -> &'static str {
    if value < 0.0 { "-" } else { "" }
}

/// Format a currency value with cents, e.g. `$1,234.56`
pub fn format_currency(value: f64) -> String {
    let cents_total = (value.abs() * 100.0).round() as u64;
    format!(
        "{}${}.{:02}",
        sign(value),
        group_thousands(cents_total / 100),
        cents_total % 100
    )
}

/// Format a currency value rounded to whole dollars, for table columns
pub fn format_currency_short(value: f64) -> String {
    let dollars = value.abs().round() as u64;
    if dollars == 0 {
        return "$0".to_string();
    }
    format!("{}${}", sign(value), group_thousands(dollars))
}

/// Format a fraction as a percentage, e.g. `0.2965` as `29.65%`
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Format a currency value in compact form, e.g. `$2.1M`, `$450K`, `$50`
pub fn format_compact_currency(value: f64) -> String {
    let abs_value = value.abs();
    let sign = sign(value);
    if abs_value >= 1_000_000.0 {
        format!("{sign}${:.1}M", abs_value / 1_000_000.0)
    } else if abs_value >= 1_000.0 {
        format!("{sign}${:.0}K", abs_value / 1_000.0)
    } else {
        format!("{sign}${abs_value:.0}")
    }
}
