//! Mechanically-derived, sanitized subject names.

/// Replace any character that is not alphanumeric, hyphen, or underscore
/// with an underscore.
#[must_use]
pub fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[must_use]
pub fn ticks_raw(symbol: &str) -> String {
    format!("ticks.raw.{}", sanitize(symbol))
}

/// Subject for subscribing to every symbol's raw ticks.
#[must_use]
pub fn ticks_raw_wildcard() -> String {
    "ticks.raw.*".to_string()
}

#[must_use]
pub fn candle(symbol: &str, timeframe: &str) -> String {
    format!("candles.{}.{}", sanitize(symbol), sanitize(timeframe))
}

#[must_use]
pub fn candles_wildcard(symbol: &str) -> String {
    format!("candles.{}.*", sanitize(symbol))
}

#[must_use]
pub fn candles_all() -> String {
    "candles.>".to_string()
}

#[must_use]
pub fn indicator(symbol: &str, indicator_id: &str) -> String {
    format!("indicators.{}.{}", sanitize(symbol), sanitize(indicator_id))
}

#[must_use]
pub fn strategy_signal(symbol: &str, strategy_id: &str) -> String {
    format!(
        "strategies.signals.{}.{}",
        sanitize(symbol),
        sanitize(strategy_id)
    )
}
