use serde::Deserialize;

/// Engine configuration, captured once at construction and passed around as
/// an immutable snapshot. No component reads settings from ambient state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Latest permitted check-in, in days from "today".
    pub max_advance_days: i64,
    /// Longest permitted stay.
    pub max_stay_nights: i64,
    /// Lifetime of a tentative hold before the sweep expires it.
    pub tentative_hold_hours: i64,
    /// Child supplement percentage when neither the room nor the room type
    /// sets one.
    pub default_child_multiplier: u32,
    /// ISO currency code stamped on every price breakdown.
    pub currency: String,
    /// Bound on the retry-until-unique reference generation loop.
    pub reference_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_advance_days: 30,
            max_stay_nights: 30,
            tentative_hold_hours: 48,
            default_child_multiplier: 50,
            currency: "EUR".into(),
            reference_attempts: 10,
        }
    }
}
