//! Metric-weight presets for weighted aggregation runs.

use std::collections::BTreeMap;

/// Weighted scoring table rating overall attacking and defensive impact,
/// not just the scoresheet. Field names follow the upstream stat naming.
pub fn impact_weights() -> BTreeMap<String, f64> {
    let table: [(&str, f64); 16] = [
        // What the player actually produced on the scoresheet.
        ("goals", 1.0),
        ("assists", 1.0),
        // Underlying quality of chances created and taken; process over outcome.
        ("npxg", 10.0),
        ("xg_assist", 10.0),
        // Actions that lead to shots but aren't the final pass or shot.
        ("gca", 8.0),
        ("sca", 3.0),
        ("shots_on_target", 2.0),
        ("shots", 1.0),
        // Moving the ball into dangerous areas.
        ("progressive_carries", 1.5),
        ("progressive_passes", 1.5),
        ("take_ons_won", 2.0),
        // Defensive contributions.
        ("tackles", 3.0),
        ("interceptions", 3.0),
        ("blocks", 2.5),
        // Negative actions.
        ("cards_yellow", -5.0),
        ("cards_red", -20.0),
    ];
    table
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRecord;

    #[test]
    fn cards_weigh_negative() {
        let weights = impact_weights();
        assert!(weights["cards_yellow"] < 0.0);
        assert!(weights["cards_red"] < weights["cards_yellow"]);
    }

    #[test]
    fn preset_applies_to_records() {
        let record = RawRecord::new()
            .with("player", "A")
            .with("goals", 1.0)
            .with("cards_yellow", 1.0);
        assert_eq!(record.weighted_value(&impact_weights()), -4.0);
    }
}
