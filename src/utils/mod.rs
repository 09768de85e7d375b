pub mod table;
pub mod ratelimit;

pub use table::Table;
pub use ratelimit::rate_limit_provider;

/// Round to two decimals, the precision used for every money figure
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(536.8216), 536.82);
        assert_eq!(round_cents(0.005), 0.01);
        assert_eq!(round_cents(-1.234), -1.23);
    }
}
