//! Incremental leaderboard aggregation.
//!
//! Walks merged per-period records in period order, keeps one running
//! accumulator per entity, and emits one ranked, immutable [`Frame`] per
//! period. Pure: identical inputs and configuration always produce
//! identical frames, so the engine tests without any network layer.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::error::Error;
use crate::record::{Frame, FrameEntry, RawRecord};

/// How a frame's display value is derived from the accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    /// Running cumulative weighted value.
    #[default]
    Cumulative,
    /// Cumulative value normalized per `reference_unit` of exposure
    /// (e.g. per 90 minutes).
    PerExposure,
}

/// Configuration for one aggregation run.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Field name → weight. Unweighted usage gives every field weight 1
    /// via [`ChartConfig::from_fields`].
    pub fields: BTreeMap<String, f64>,

    /// Maximum entries per frame, applied after ranking.
    pub output_size: usize,

    /// Case-insensitive exact match on the position field. Empty or absent
    /// means no filtering.
    pub position_filter: Option<Vec<String>>,

    /// Case-insensitive substring match on the entity name. Empty or
    /// absent means no filtering.
    pub name_filter: Option<Vec<String>>,

    pub mode: ValueMode,

    /// Entities below this cumulative exposure are left out of a frame's
    /// ranking. Only consulted in [`ValueMode::PerExposure`].
    pub min_exposure: f64,

    /// Field holding the per-record exposure contribution.
    pub exposure_field: String,

    /// Exposure units one normalized value point refers to (90 = per
    /// ninety minutes).
    pub reference_unit: f64,

    /// Field identifying the entity.
    pub key_field: String,

    /// Field carrying the categorical position attribute.
    pub position_field: String,
}

impl ChartConfig {
    pub fn new(fields: BTreeMap<String, f64>) -> Self {
        Self {
            fields,
            output_size: 10,
            position_filter: None,
            name_filter: None,
            mode: ValueMode::Cumulative,
            min_exposure: 0.0,
            exposure_field: "minutes".to_string(),
            reference_unit: 90.0,
            key_field: "player".to_string(),
            position_field: "position".to_string(),
        }
    }

    /// Unweighted configuration: every listed field gets weight 1.
    pub fn from_fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(|n| (n.into(), 1.0)).collect())
    }

    #[must_use]
    pub fn with_output_size(mut self, size: usize) -> Self {
        self.output_size = size;
        self
    }

    #[must_use]
    pub fn with_position_filter(mut self, positions: Vec<String>) -> Self {
        self.position_filter = Some(positions);
        self
    }

    #[must_use]
    pub fn with_name_filter(mut self, names: Vec<String>) -> Self {
        self.name_filter = Some(names);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ValueMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_min_exposure(mut self, min: f64) -> Self {
        self.min_exposure = min;
        self
    }

    #[must_use]
    pub fn with_exposure_field(mut self, field: impl Into<String>) -> Self {
        self.exposure_field = field.into();
        self
    }

    #[must_use]
    pub fn with_reference_unit(mut self, unit: f64) -> Self {
        self.reference_unit = unit;
        self
    }

    /// Reject invalid configuration before any work happens.
    pub fn validate(&self) -> Result<(), Error> {
        if self.fields.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one field must be configured".into(),
            ));
        }
        for (name, weight) in &self.fields {
            if !weight.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "weight for field '{name}' must be finite"
                )));
            }
        }
        if self.output_size == 0 {
            return Err(Error::InvalidConfig("output size must be positive".into()));
        }
        if !self.min_exposure.is_finite() || self.min_exposure < 0.0 {
            return Err(Error::InvalidConfig(
                "minimum exposure must be finite and non-negative".into(),
            ));
        }
        if !self.reference_unit.is_finite() || self.reference_unit <= 0.0 {
            return Err(Error::InvalidConfig(
                "reference unit must be finite and positive".into(),
            ));
        }
        if self.exposure_field.is_empty() {
            return Err(Error::InvalidConfig("exposure field must be named".into()));
        }
        if self.key_field.is_empty() {
            return Err(Error::InvalidConfig("key field must be named".into()));
        }
        Ok(())
    }

    fn passes_filters(&self, record: &RawRecord) -> bool {
        if let Some(filter) = &self.position_filter
            && !filter.is_empty()
        {
            // An entity without position data cannot match an exact filter.
            let Some(position) = record.text(&self.position_field) else {
                return false;
            };
            if !filter.iter().any(|p| p.eq_ignore_ascii_case(position)) {
                return false;
            }
        }

        if let Some(filter) = &self.name_filter
            && !filter.is_empty()
        {
            let Some(name) = record.text(&self.key_field) else {
                return false;
            };
            let name = name.to_lowercase();
            if !filter.iter().any(|n| name.contains(&n.to_lowercase())) {
                return false;
            }
        }

        true
    }
}

/// Running state for one tracked entity. Never removed once created.
#[derive(Debug, Default)]
struct EntityAccumulator {
    /// Sum of positive per-period weighted values.
    value: f64,
    /// Sum of the exposure field over every filtered appearance.
    exposure: f64,
    /// Last-known position.
    position: Option<String>,
}

/// Fold merged per-period records into one ranked frame per period.
///
/// Periods run `1..=max` in order; a period with no data still emits a
/// frame reflecting the unchanged accumulator state. Ranking is by display
/// value descending, ties by lifetime total descending, and remaining ties
/// by entity name (the accumulator map iterates sorted).
pub fn aggregate(
    periods: &BTreeMap<u32, Vec<RawRecord>>,
    config: &ChartConfig,
) -> Result<Vec<Frame>, Error> {
    config.validate()?;

    let max_period = periods.keys().max().copied().unwrap_or(0);
    let lifetime_totals = lifetime_totals(periods, config);

    let mut entities: BTreeMap<String, EntityAccumulator> = BTreeMap::new();
    let mut frames = Vec::with_capacity(max_period as usize);

    for period in 1..=max_period {
        for record in periods.get(&period).map(Vec::as_slice).unwrap_or_default() {
            if !config.passes_filters(record) {
                continue;
            }
            let Some(name) = record.text(&config.key_field) else {
                continue;
            };

            let acc = entities.entry(name.to_string()).or_default();

            // Exposure counts for every appearance, scoring or not.
            acc.exposure += record.number(&config.exposure_field).unwrap_or(0.0);

            if let Some(position) = record.text(&config.position_field)
                && !position.is_empty()
            {
                acc.position = Some(position.to_string());
            }

            // A negative-only period does not count toward the score.
            let weighted = record.weighted_value(&config.fields);
            if weighted > 0.0 {
                acc.value += weighted;
            }
        }

        frames.push(build_frame(period, &entities, &lifetime_totals, config));
    }

    Ok(frames)
}

/// Season totals used as the tie-breaker, computed over the same
/// positive-period rule as the running value.
fn lifetime_totals(
    periods: &BTreeMap<u32, Vec<RawRecord>>,
    config: &ChartConfig,
) -> HashMap<String, f64> {
    let mut totals = HashMap::new();
    for records in periods.values() {
        for record in records {
            if !config.passes_filters(record) {
                continue;
            }
            let Some(name) = record.text(&config.key_field) else {
                continue;
            };
            let weighted = record.weighted_value(&config.fields);
            if weighted > 0.0 {
                *totals.entry(name.to_string()).or_insert(0.0) += weighted;
            }
        }
    }
    totals
}

struct Ranked<'a> {
    name: &'a str,
    display: f64,
    lifetime: f64,
    acc: &'a EntityAccumulator,
}

fn build_frame(
    period: u32,
    entities: &BTreeMap<String, EntityAccumulator>,
    lifetime_totals: &HashMap<String, f64>,
    config: &ChartConfig,
) -> Frame {
    let mut ranked: Vec<Ranked<'_>> = entities
        .iter()
        .filter(|(_, acc)| {
            config.mode != ValueMode::PerExposure || acc.exposure >= config.min_exposure
        })
        .map(|(name, acc)| {
            let display = match config.mode {
                ValueMode::Cumulative => acc.value,
                ValueMode::PerExposure => {
                    if acc.exposure > 0.0 {
                        acc.value / acc.exposure * config.reference_unit
                    } else {
                        0.0
                    }
                }
            };
            Ranked {
                name,
                display,
                lifetime: lifetime_totals.get(name.as_str()).copied().unwrap_or(0.0),
                acc,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.display
            .partial_cmp(&a.display)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.lifetime.partial_cmp(&a.lifetime).unwrap_or(Ordering::Equal))
    });
    ranked.truncate(config.output_size);

    Frame {
        period: format!("MD{period}"),
        data: ranked
            .into_iter()
            .map(|r| FrameEntry {
                name: r.name.to_string(),
                value: r.display,
                position: r.acc.position.clone(),
                exposure: (config.mode == ValueMode::PerExposure).then_some(r.acc.exposure),
                cumulative: (config.mode == ValueMode::PerExposure).then_some(r.acc.value),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> RawRecord {
        RawRecord::new().with("player", name)
    }

    fn periods(input: Vec<(u32, Vec<RawRecord>)>) -> BTreeMap<u32, Vec<RawRecord>> {
        input.into_iter().collect()
    }

    fn goals_config() -> ChartConfig {
        ChartConfig::from_fields(["goals"])
    }

    #[test]
    fn cumulative_values_accumulate_across_periods() {
        let data = periods(vec![
            (1, vec![record("A").with("goals", 2.0)]),
            (2, vec![record("A").with("goals", 1.0)]),
        ]);

        let frames = aggregate(&data, &goals_config()).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].period, "MD1");
        assert_eq!(frames[0].data.len(), 1);
        assert_eq!(frames[0].data[0].name, "A");
        assert_eq!(frames[0].data[0].value, 2.0);
        assert_eq!(frames[1].period, "MD2");
        assert_eq!(frames[1].data[0].value, 3.0);
    }

    #[test]
    fn period_gaps_emit_unchanged_frames() {
        let data = periods(vec![
            (1, vec![record("A").with("goals", 2.0)]),
            (3, vec![record("A").with("goals", 1.0)]),
        ]);

        let frames = aggregate(&data, &goals_config()).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].period, "MD2");
        assert_eq!(frames[1].data[0].value, 2.0);
        assert_eq!(frames[2].data[0].value, 3.0);
    }

    #[test]
    fn cumulative_value_is_monotonic_for_non_negative_contributions() {
        let data = periods(
            (1..=6)
                .map(|p| (p, vec![record("A").with("goals", (p % 3) as f64)]))
                .collect(),
        );

        let frames = aggregate(&data, &goals_config()).unwrap();
        let values: Vec<f64> = frames.iter().map(|f| f.data[0].value).collect();
        assert!(values.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn negative_period_counts_exposure_but_not_value() {
        let config = ChartConfig::new(BTreeMap::from([
            ("goals".to_string(), 1.0),
            ("cards_red".to_string(), -20.0),
        ]))
        .with_mode(ValueMode::PerExposure);

        let data = periods(vec![
            (
                1,
                vec![record("A").with("goals", 2.0).with("minutes", 90.0)],
            ),
            (
                2,
                vec![record("A").with("cards_red", 1.0).with("minutes", 90.0)],
            ),
        ]);

        let frames = aggregate(&data, &config).unwrap();
        let entry = &frames[1].data[0];
        assert_eq!(entry.cumulative, Some(2.0));
        assert_eq!(entry.exposure, Some(180.0));
        assert_eq!(entry.value, 1.0); // 2 over 180 minutes, per 90
    }

    #[test]
    fn min_exposure_gates_ranking_but_not_accumulation() {
        let config = goals_config()
            .with_mode(ValueMode::PerExposure)
            .with_min_exposure(180.0);

        let data = periods(vec![
            (
                1,
                vec![record("B").with("goals", 1.0).with("minutes", 90.0)],
            ),
            (
                2,
                vec![record("B").with("goals", 1.0).with("minutes", 90.0)],
            ),
        ]);

        let frames = aggregate(&data, &config).unwrap();

        assert!(frames[0].data.is_empty(), "ineligible entity must not rank");
        let entry = &frames[1].data[0];
        assert_eq!(entry.name, "B");
        assert_eq!(entry.value, 1.0); // 2 goals over 180 minutes, per 90
        assert_eq!(entry.exposure, Some(180.0));
    }

    #[test]
    fn zero_exposure_displays_zero_in_per_exposure_mode() {
        let config = goals_config().with_mode(ValueMode::PerExposure);
        let data = periods(vec![(1, vec![record("A").with("goals", 1.0)])]);

        let frames = aggregate(&data, &config).unwrap();
        assert_eq!(frames[0].data[0].value, 0.0);
    }

    #[test]
    fn ties_break_by_lifetime_total() {
        let data = periods(vec![
            (
                1,
                vec![
                    record("A").with("goals", 2.0),
                    record("Z").with("goals", 2.0),
                ],
            ),
            (2, vec![record("Z").with("goals", 3.0)]),
        ]);

        let frames = aggregate(&data, &goals_config()).unwrap();
        let names: Vec<&str> = frames[0].data.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Z", "A"]);
    }

    #[test]
    fn truncates_after_ranking() {
        let data = periods(vec![(
            1,
            vec![
                record("Low").with("goals", 1.0),
                record("Mid").with("goals", 2.0),
                record("Top").with("goals", 3.0),
            ],
        )]);

        let frames = aggregate(&data, &goals_config().with_output_size(2)).unwrap();
        let names: Vec<&str> = frames[0].data.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Top", "Mid"]);
    }

    #[test]
    fn position_filter_is_case_insensitive_exact() {
        let config = goals_config().with_position_filter(vec!["lb".into()]);
        let data = periods(vec![(
            1,
            vec![
                record("A").with("goals", 1.0).with("position", "LB"),
                record("B").with("goals", 5.0).with("position", "LB,RB"),
                record("C").with("goals", 5.0),
            ],
        )]);

        let frames = aggregate(&data, &config).unwrap();
        assert_eq!(frames[0].data.len(), 1);
        assert_eq!(frames[0].data[0].name, "A");
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        let config = goals_config().with_name_filter(vec!["sil".into()]);
        let data = periods(vec![(
            1,
            vec![
                record("Bernardo Silva").with("goals", 1.0),
                record("Rodri").with("goals", 5.0),
            ],
        )]);

        let frames = aggregate(&data, &config).unwrap();
        assert_eq!(frames[0].data.len(), 1);
        assert_eq!(frames[0].data[0].name, "Bernardo Silva");
    }

    #[test]
    fn position_is_last_known() {
        let data = periods(vec![
            (
                1,
                vec![record("A").with("goals", 1.0).with("position", "AM")],
            ),
            (
                2,
                vec![record("A").with("goals", 1.0).with("position", "FW")],
            ),
        ]);

        let frames = aggregate(&data, &goals_config()).unwrap();
        assert_eq!(frames[0].data[0].position.as_deref(), Some("AM"));
        assert_eq!(frames[1].data[0].position.as_deref(), Some("FW"));
    }

    #[test]
    fn identical_inputs_produce_identical_frames() {
        let data = periods(vec![
            (
                1,
                vec![
                    record("A").with("goals", 2.0).with("minutes", 90.0),
                    record("B").with("goals", 2.0).with("minutes", 45.0),
                ],
            ),
            (
                2,
                vec![record("B").with("goals", 1.0).with("minutes", 90.0)],
            ),
        ]);
        let config = goals_config().with_mode(ValueMode::PerExposure);

        assert_eq!(
            aggregate(&data, &config).unwrap(),
            aggregate(&data, &config).unwrap()
        );
    }

    #[test]
    fn empty_input_produces_no_frames() {
        let frames = aggregate(&BTreeMap::new(), &goals_config()).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn invalid_configurations_fail_fast() {
        let data = periods(vec![(1, vec![record("A").with("goals", 1.0)])]);

        let no_fields = ChartConfig::new(BTreeMap::new());
        assert!(matches!(
            aggregate(&data, &no_fields),
            Err(Error::InvalidConfig(_))
        ));

        let zero_output = goals_config().with_output_size(0);
        assert!(matches!(
            aggregate(&data, &zero_output),
            Err(Error::InvalidConfig(_))
        ));

        let bad_weight = ChartConfig::new(BTreeMap::from([("goals".to_string(), f64::NAN)]));
        assert!(matches!(
            aggregate(&data, &bad_weight),
            Err(Error::InvalidConfig(_))
        ));

        let bad_exposure = goals_config().with_min_exposure(-1.0);
        assert!(matches!(
            aggregate(&data, &bad_exposure),
            Err(Error::InvalidConfig(_))
        ));

        let bad_unit = goals_config().with_reference_unit(0.0);
        assert!(matches!(
            aggregate(&data, &bad_unit),
            Err(Error::InvalidConfig(_))
        ));
    }
}
