/// Rounds half away from zero to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parses a decimal that may use a comma separator (`23,456`), as the Brazilian exports do.
pub(crate) fn parse_decimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".").parse::<f64>()
    } else {
        trimmed.parse::<f64>()
    };
    parsed.ok().filter(|value| value.is_finite())
}
