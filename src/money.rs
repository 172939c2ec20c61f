/// Round an amount to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn currency_symbol(code: &str) -> &'static str {
    match code.to_ascii_uppercase().as_str() {
        "USD" | "CAD" | "AUD" | "NZD" | "SGD" | "HKD" | "MXN" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" | "CNY" => "¥",
        "INR" => "₹",
        "CHF" => "CHF ",
        "BRL" => "R$",
        "ZAR" => "R",
        _ => "",
    }
}

/// Format an amount as `$1,234.50`. Unknown currencies fall back to a code
/// suffix (`1,234.50 SEK`).
pub fn format_money(amount: f64, currency: &str) -> String {
    let rounded = round_cents(amount);
    let sign = if rounded < 0.0 { "-" } else { "" };
    let cents = (rounded.abs() * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    let body = format!("{}.{:02}", whole, cents % 100);

    let symbol = currency_symbol(currency);
    if symbol.is_empty() {
        format!("{}{} {}", sign, body, currency.to_ascii_uppercase())
    } else {
        format!("{}{}{}", sign, symbol, body)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_cents(10.006), 10.01);
        assert_eq!(round_cents(7.12345), 7.12);
    }

    #[test]
    fn formats_known_and_unknown_currencies() {
        assert_eq!(format_money(1050.0, "USD"), "$1,050.00");
        assert_eq!(format_money(1234567.5, "eur"), "€1,234,567.50");
        assert_eq!(format_money(12.3, "SEK"), "12.30 SEK");
        assert_eq!(format_money(-5.0, "GBP"), "-£5.00");
        assert_eq!(format_money(0.0, "USD"), "$0.00");
    }
}
