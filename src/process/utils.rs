/// Normalize a country cell into a dataset key: trim, strip outer quotes,
/// drop commas (`"Korea, South"` → `"KOREA SOUTH"`) and uppercase.
pub fn country_key(raw: &str) -> String {
    clean_str(raw).replace(',', "").trim().to_uppercase()
}

/// Cell text without surrounding whitespace or double quotes.
pub fn clean_str(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

/// Best-effort count parsing: integers first, then floats, anything else is 0.
pub fn parse_count(raw: &str) -> f64 {
    let s = clean_str(raw);
    if s.is_empty() {
        return 0.0;
    }
    if let Ok(v) = s.parse::<i64>() {
        return v as f64;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_uppercased_without_commas() {
        assert_eq!(country_key("Korea, South"), "KOREA SOUTH");
        assert_eq!(country_key("  \"US\" "), "US");
        assert_eq!(country_key("China"), "CHINA");
    }

    #[test]
    fn cells_lose_quotes_and_padding() {
        assert_eq!(clean_str(" \"Hubei\" "), "Hubei");
        assert_eq!(clean_str("\" 2018 \""), "2018");
        assert_eq!(clean_str("plain"), "plain");
    }

    #[test]
    fn malformed_counts_become_zero() {
        assert_eq!(parse_count("42"), 42.0);
        assert_eq!(parse_count(" 7.0 "), 7.0);
        assert_eq!(parse_count(""), 0.0);
        assert_eq!(parse_count("n/a"), 0.0);
        assert_eq!(parse_count("NaN"), 0.0);
    }
}
