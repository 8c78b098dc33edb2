use crate::error::UnitsError;
use crate::types::Amount;

pub const ETHER_DECIMALS: usize = 18;
pub const WEI_PER_ETHER: Amount = 1_000_000_000_000_000_000; // 1 ether = 1e18 wei

/// Parse a decimal ether string (`"1"`, `"0.25"`, `".5"`) into wei.
pub fn parse_ether(s: &str) -> Result<Amount, UnitsError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(UnitsError::Empty);
    }
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(UnitsError::Invalid(s.to_string()));
    }
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(UnitsError::Invalid(s.to_string()));
    }
    if frac.len() > ETHER_DECIMALS {
        return Err(UnitsError::TooPrecise { digits: frac.len() });
    }

    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<Amount>()
            .map_err(|_| UnitsError::Overflow)?
            .checked_mul(WEI_PER_ETHER)
            .ok_or(UnitsError::Overflow)?
    };
    let frac_wei = if frac.is_empty() {
        0
    } else {
        // right-pad to 18 digits: "25" -> 250000000000000000
        let padded = format!("{frac:0<width$}", width = ETHER_DECIMALS);
        padded
            .parse::<Amount>()
            .map_err(|_| UnitsError::Invalid(s.to_string()))?
    };
    whole_wei.checked_add(frac_wei).ok_or(UnitsError::Overflow)
}

/// Render wei as a decimal ether string, always with at least one
/// fractional digit (`"2.0"`, `"0.001"`).
pub fn format_ether(amount: Amount) -> String {
    let whole = amount / WEI_PER_ETHER;
    let frac = amount % WEI_PER_ETHER;
    let digits = format!("{frac:0width$}", width = ETHER_DECIMALS);
    let trimmed = digits.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_ether() {
        assert_eq!(parse_ether("1").unwrap(), WEI_PER_ETHER);
        assert_eq!(parse_ether("0.5").unwrap(), WEI_PER_ETHER / 2);
        assert_eq!(parse_ether(".25").unwrap(), WEI_PER_ETHER / 4);
        assert_eq!(parse_ether("3.").unwrap(), 3 * WEI_PER_ETHER);
        assert_eq!(parse_ether("0.000000000000000001").unwrap(), 1);
        assert_eq!(parse_ether(" 2 ").unwrap(), 2 * WEI_PER_ETHER);
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(parse_ether(""), Err(UnitsError::Empty));
        assert!(matches!(parse_ether("."), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_ether("-1"), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_ether("1.2.3"), Err(UnitsError::Invalid(_))));
        assert!(matches!(parse_ether("1e18"), Err(UnitsError::Invalid(_))));
        assert_eq!(
            parse_ether("0.0000000000000000001"),
            Err(UnitsError::TooPrecise { digits: 19 })
        );
        assert_eq!(
            parse_ether("999999999999999999999999999999"),
            Err(UnitsError::Overflow)
        );
    }

    #[test]
    fn formats_like_format_ether() {
        assert_eq!(format_ether(0), "0.0");
        assert_eq!(format_ether(WEI_PER_ETHER), "1.0");
        assert_eq!(format_ether(2 * WEI_PER_ETHER + WEI_PER_ETHER / 2), "2.5");
        assert_eq!(format_ether(1), "0.000000000000000001");
        assert_eq!(format_ether(parse_ether("9999.0001").unwrap()), "9999.0001");
    }
}
