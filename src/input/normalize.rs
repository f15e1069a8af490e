//! Locale-aware numeric normalization for broker exports.
//!
//! Brazilian exports write `R$ 1.234,56` (dot thousands, comma decimals),
//! but the same file sometimes carries canonical `1234.56` cells. The
//! separator role is decided per value:
//!
//!   - one `,` followed by 1-3 trailing digits: decimal comma, dots are thousands
//!   - any other `,`: thousands separator, dot (if any) is the decimal point
//!   - no `,` and two or more `.`: dots are thousands separators
//!   - no `,` and at most one `.`: already canonical
//!
//! Pure function. Unparseable input yields `None`, never zero.

const CURRENCY_TOKEN: &str = "R$";

pub fn normalize(raw: &str, is_percent: bool) -> Option<f64> {
    let mut cleaned = raw.replace(CURRENCY_TOKEN, "");
    if is_percent {
        cleaned = cleaned.replace('%', "");
    }
    // char::is_whitespace covers U+00A0 as well
    let cleaned: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    canonical_separators(&cleaned)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn canonical_separators(s: &str) -> String {
    let commas = s.matches(',').count();

    if commas == 1 && has_decimal_comma(s) {
        return s.replace('.', "").replace(',', ".");
    }
    if commas > 0 {
        return s.replace(',', "");
    }
    if s.matches('.').count() > 1 {
        return s.replace('.', "");
    }
    s.to_string()
}

#[inline]
fn has_decimal_comma(s: &str) -> bool {
    s.rsplit_once(',').is_some_and(|(_, tail)| {
        (1..=3).contains(&tail.len()) && tail.bytes().all(|b| b.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brazilian_format() {
        assert_eq!(normalize("1.234,56", false), Some(1234.56));
        assert_eq!(normalize("R$ 10,50", false), Some(10.50));
        assert_eq!(normalize("R$\u{a0}1.000.000,00", false), Some(1_000_000.0));
        assert_eq!(normalize("-2,5", false), Some(-2.5));
    }

    #[test]
    fn test_percent() {
        assert_eq!(normalize("12,5%", true), Some(12.5));
        assert_eq!(normalize("-3,45 %", true), Some(-3.45));
        // without the flag the sign is not stripped
        assert_eq!(normalize("12,5%", false), None);
    }

    #[test]
    fn test_canonical_input_is_preserved() {
        assert_eq!(normalize("1234.56", false), Some(1234.56));
        assert_eq!(normalize("10", false), Some(10.0));
        assert_eq!(normalize(" 0.5 ", false), Some(0.5));
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let first = normalize("R$ 1.234,56", false).unwrap();
        let again = normalize(&first.to_string(), false).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_thousands_only_forms() {
        assert_eq!(normalize("1.234.567", false), Some(1_234_567.0));
        assert_eq!(normalize("1,234,567.5", false), Some(1_234_567.5));
        // four trailing digits cannot be a decimal comma
        assert_eq!(normalize("1,2345", false), Some(12345.0));
        assert_eq!(normalize("1,2,3,4", false), Some(1234.0));
    }

    #[test]
    fn test_unparseable_is_none() {
        assert_eq!(normalize("", false), None);
        assert_eq!(normalize("   ", false), None);
        assert_eq!(normalize("R$", false), None);
        assert_eq!(normalize("abc", false), None);
        assert_eq!(normalize("NaN", false), None);
        assert_eq!(normalize("inf", false), None);
        assert_eq!(normalize("12-34", false), None);
    }
}
