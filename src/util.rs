// Parsing and number formatting helpers.
//
// CSV cells arrive as text in whatever shape the export produced; these
// helpers turn them into typed values and back into display strings.
use num_format::{Locale, ToFormattedString};

/// Parse a cell into `f64`, tolerating the decorations a spreadsheet export
/// leaves behind.
///
/// - Trims whitespace.
/// - Strips a leading `£` and a trailing `%`.
/// - Strips thousands separators like `","`.
/// - Returns `None` for blank cells and anything that is not a finite number.
pub fn parse_f64_safe(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_prefix('£').unwrap_or(s);
    let s = s.strip_suffix('%').unwrap_or(s).trim();
    if s.is_empty() || s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let v = s.replace(',', "").parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_currency(n: f64) -> String {
    if n.is_sign_negative() && n != 0.0 {
        format!("-£{}", format_number(-n, 2))
    } else {
        format!("£{}", format_number(n, 2))
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// Render an optional value, showing undefined ratios as `n/a`.
pub fn format_optional(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format_number(v, decimals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("22516.48", Some(22516.48))]
    #[case(" 1,441 ", Some(1441.0))]
    #[case("£11,100.00", Some(11100.0))]
    #[case("94.90%", Some(94.9))]
    #[case("", None)]
    #[case("n/a", None)]
    #[case("NaN", None)]
    fn parses_cells(#[case] raw: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_f64_safe(raw), expected);
    }

    #[test]
    fn formats_with_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1234.5, 1), "-1,234.5");
        assert_eq!(format_number(66.0, 0), "66");
        assert_eq!(format_currency(22516.48), "£22,516.48");
        assert_eq!(format_int(9855), "9,855");
        assert_eq!(format_optional(None, 1), "n/a");
    }
}
