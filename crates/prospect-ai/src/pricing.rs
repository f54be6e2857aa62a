//! Static per-model rate table for cost estimation.
//!
//! Two tiers only: a cheap tier for known lightweight model families and a
//! quality tier for everything else, selected by substring match on the
//! model name. Rates are USD per million tokens.

use rust_decimal::Decimal;

/// Name fragments that mark a model as belonging to the cheap tier.
const LIGHTWEIGHT_MARKERS: &[&str] = &[
    "mini", "nano", "lite", "flash", "small", "tiny", "haiku", "instant", "7b", "8b", "9b",
];

const CHEAP_INPUT_PER_MILLION: Decimal = Decimal::from_parts(15, 0, 0, false, 2); // 0.15
const CHEAP_OUTPUT_PER_MILLION: Decimal = Decimal::from_parts(60, 0, 0, false, 2); // 0.60
const QUALITY_INPUT_PER_MILLION: Decimal = Decimal::from_parts(250, 0, 0, false, 2); // 2.50
const QUALITY_OUTPUT_PER_MILLION: Decimal = Decimal::from_parts(1000, 0, 0, false, 2); // 10.00

const TOKENS_PER_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Whether the model name matches a known lightweight family.
#[must_use]
pub fn is_lightweight_model(model: &str) -> bool {
    let lowered = model.to_lowercase();
    LIGHTWEIGHT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Estimated USD cost of one call from its token counts.
#[must_use]
pub fn estimate_cost(model: &str, tokens_in: i64, tokens_out: i64) -> Decimal {
    let (rate_in, rate_out) = if is_lightweight_model(model) {
        (CHEAP_INPUT_PER_MILLION, CHEAP_OUTPUT_PER_MILLION)
    } else {
        (QUALITY_INPUT_PER_MILLION, QUALITY_OUTPUT_PER_MILLION)
    };
    (Decimal::from(tokens_in.max(0)) * rate_in + Decimal::from(tokens_out.max(0)) * rate_out)
        / TOKENS_PER_MILLION
}
