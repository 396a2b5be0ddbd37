//! Statistics calculation engine.
//!
//! Derives summaries from flattened export data:
//! - Match outcome for a team (declared winner, then score fallback)
//! - Per-player, per-map, per-opponent and whole-team aggregates
//! - Map veto breakdown

pub mod aggregate;
pub mod outcome;
pub mod veto;

pub use aggregate::*;
pub use outcome::*;
pub use veto::*;

/// Parse a reported stat value.
///
/// Surrounding whitespace and a trailing `%` are ignored. Empty, non-numeric
/// and non-finite values yield `None`.
pub fn parse_stat(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a counting stat; anything unparseable counts as zero.
///
/// Fractions are truncated and the result is clamped to `0..=u32::MAX`.
pub fn parse_count(raw: &str) -> u32 {
    parse_stat(raw)
        .map(|v| v.trunc().clamp(0.0, f64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Kill/death ratio; with no deaths the ratio is the kill count.
pub fn calculate_kd(kills: u32, deaths: u32) -> f64 {
    if deaths > 0 {
        round2(kills as f64 / deaths as f64)
    } else {
        kills as f64
    }
}
