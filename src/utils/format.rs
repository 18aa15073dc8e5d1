use crate::core::aggregate::round_half_up;

/// Rounds and groups thousands: `1234.5 -> "1,235"`.
pub fn format_number(value: f64) -> String {
    let rounded = round_half_up(value);
    let negative = rounded < 0.0;
    let digits = format!("{}", rounded.abs() as u64);

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Whole-dollar currency: `1234.5 -> "$1,235"`.
pub fn format_currency(value: f64) -> String {
    let formatted = format_number(value);
    match formatted.strip_prefix('-') {
        Some(rest) => format!("-${}", rest),
        None => format!("${}", formatted),
    }
}
