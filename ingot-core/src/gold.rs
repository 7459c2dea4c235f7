//! Gold amount formatting. 1,000,000 gold == "1M".

/// Compact gold rendering for embeds and replies.
pub fn format_gold(n: i64) -> String {
    if n >= 1_000_000 {
        let v = n as f64 / 1_000_000.0;
        if n % 1_000_000 == 0 {
            format!("{}M", v as i64)
        } else {
            format!("{:.2}M", v)
        }
    } else if n >= 1_000 {
        let v = n as f64 / 1_000.0;
        if n % 1_000 == 0 {
            format!("{}k", v as i64)
        } else {
            format!("{:.1}k", v)
        }
    } else {
        n.to_string()
    }
}

/// Thousands-separated rendering for the exact-amount parentheticals.
pub fn format_amount(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    let first_group = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - first_group) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_gold_millions() {
        assert_eq!(format_gold(1_000_000), "1M");
        assert_eq!(format_gold(2_500_000), "2.50M");
        assert_eq!(format_gold(50_000_000), "50M");
        assert_eq!(format_gold(1_234_567), "1.23M");
    }

    #[test]
    fn test_format_gold_thousands() {
        assert_eq!(format_gold(1_000), "1k");
        assert_eq!(format_gold(1_500), "1.5k");
        assert_eq!(format_gold(999_999), "1000.0k");
    }

    #[test]
    fn test_format_gold_small() {
        assert_eq!(format_gold(0), "0");
        assert_eq!(format_gold(999), "999");
        assert_eq!(format_gold(-5), "-5");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1_000), "1,000");
        assert_eq!(format_amount(1_234_567), "1,234,567");
        assert_eq!(format_amount(-12_000), "-12,000");
    }
}
