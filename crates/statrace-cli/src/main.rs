use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use statrace_client::fbref;
use statrace_client::fetcher::StealthFetcher;
use statrace_core::Error;
use statrace_core::aggregate::{ChartConfig, ValueMode, aggregate};
use statrace_core::limiter::{LimiterConfig, RateLimiter};
use statrace_core::merge::merge_sources;
use statrace_core::pipeline::HarvestService;
use statrace_core::record::{PeriodBatch, RawRecord};
use statrace_core::weights::impact_weights;

/// The big-five league season schedules.
const LEAGUES: &[(&str, &str)] = &[
    (
        "Premier League",
        "https://fbref.com/en/comps/9/schedule/Premier-League-Scores-and-Fixtures",
    ),
    (
        "La Liga",
        "https://fbref.com/en/comps/12/schedule/La-Liga-Scores-and-Fixtures",
    ),
    (
        "Bundesliga",
        "https://fbref.com/en/comps/20/schedule/Bundesliga-Scores-and-Fixtures",
    ),
    (
        "Serie A",
        "https://fbref.com/en/comps/11/schedule/Serie-A-Scores-and-Fixtures",
    ),
    (
        "Ligue 1",
        "https://fbref.com/en/comps/13/schedule/Ligue-1-Scores-and-Fixtures",
    ),
];

#[derive(Parser)]
#[command(name = "statrace", version, about = "Paced stats harvester and leaderboard builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest per-round player records for one or more leagues
    Harvest {
        /// Preset league names to harvest (defaults to all presets)
        #[arg(short, long)]
        league: Vec<String>,

        /// Custom source name; requires --url
        #[arg(long, requires = "url", conflicts_with = "league")]
        name: Option<String>,

        /// Custom season schedule URL; requires --name
        #[arg(long, requires = "name")]
        url: Option<String>,

        /// Directory for one JSON file per league
        #[arg(short, long, default_value = "data")]
        out_dir: PathBuf,

        /// Request budget inside the trailing window
        #[arg(long, default_value_t = 10)]
        max_requests: usize,

        /// Trailing window length in seconds
        #[arg(long, default_value_t = 60)]
        window_secs: u64,
    },

    /// Merge harvested files and emit ranked frames
    Chart {
        /// Harvested league JSON files
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,

        /// Field to accumulate, as `name` or `name=weight`; repeatable
        #[arg(short, long, value_parser = parse_field_spec, required_unless_present = "preset")]
        fields: Vec<(String, f64)>,

        /// Use a named weight preset instead of --fields
        #[arg(long, conflicts_with = "fields")]
        preset: Option<Preset>,

        /// Leaderboard size per frame
        #[arg(short, long, default_value_t = 10)]
        count: usize,

        /// Display value mode
        #[arg(short, long, value_enum, default_value = "cumulative")]
        mode: Mode,

        /// Minimum accumulated minutes before an entity may rank (per90 only)
        #[arg(long, default_value_t = 0.0)]
        min_exposure: f64,

        /// Positions to keep, exact match (e.g. LB,CB)
        #[arg(long, value_delimiter = ',')]
        positions: Vec<String>,

        /// Name substrings to keep
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,

        /// Field holding per-record minutes
        #[arg(long, default_value = "minutes")]
        exposure_field: String,

        /// Minutes one normalized point refers to
        #[arg(long, default_value_t = 90.0)]
        reference_unit: f64,

        /// Output path for the frame sequence
        #[arg(short, long, default_value = "frames.json")]
        out: PathBuf,

        /// Also write the final standings as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Running cumulative value
    Cumulative,
    /// Value per reference unit of exposure
    Per90,
}

impl From<Mode> for ValueMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Cumulative => ValueMode::Cumulative,
            Mode::Per90 => ValueMode::PerExposure,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// Weighted all-round impact score
    Impact,
}

fn parse_field_spec(spec: &str) -> Result<(String, f64), String> {
    match spec.split_once('=') {
        Some((name, weight)) => {
            let weight: f64 = weight
                .parse()
                .map_err(|_| format!("invalid weight in '{spec}'"))?;
            Ok((name.trim().to_string(), weight))
        }
        None => Ok((spec.trim().to_string(), 1.0)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statrace=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Harvest {
            league,
            name,
            url,
            out_dir,
            max_requests,
            window_secs,
        } => {
            let sources = resolve_sources(&league, name, url)?;
            cmd_harvest(sources, &out_dir, max_requests, window_secs).await?;
        }
        Commands::Chart {
            data,
            fields,
            preset,
            count,
            mode,
            min_exposure,
            positions,
            names,
            exposure_field,
            reference_unit,
            out,
            csv,
        } => {
            let fields = match preset {
                Some(Preset::Impact) => impact_weights(),
                None => fields.into_iter().collect(),
            };
            let mut config = ChartConfig::new(fields)
                .with_output_size(count)
                .with_mode(mode.into())
                .with_min_exposure(min_exposure)
                .with_exposure_field(exposure_field)
                .with_reference_unit(reference_unit);
            if !positions.is_empty() {
                config = config.with_position_filter(positions);
            }
            if !names.is_empty() {
                config = config.with_name_filter(names);
            }
            cmd_chart(&data, &config, &out, csv.as_deref())?;
        }
    }

    Ok(())
}

fn resolve_sources(
    leagues: &[String],
    name: Option<String>,
    url: Option<String>,
) -> Result<Vec<(String, String)>> {
    if let (Some(name), Some(url)) = (name, url) {
        return Ok(vec![(name, url)]);
    }

    if leagues.is_empty() {
        return Ok(LEAGUES
            .iter()
            .map(|(n, u)| (n.to_string(), u.to_string()))
            .collect());
    }

    leagues
        .iter()
        .map(|wanted| {
            LEAGUES
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(wanted))
                .map(|(n, u)| (n.to_string(), u.to_string()))
                .with_context(|| {
                    let known: Vec<&str> = LEAGUES.iter().map(|(n, _)| *n).collect();
                    format!("unknown league '{wanted}'; known: {}", known.join(", "))
                })
        })
        .collect()
}

async fn cmd_harvest(
    sources: Vec<(String, String)>,
    out_dir: &Path,
    max_requests: usize,
    window_secs: u64,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let limiter = Arc::new(RateLimiter::new(LimiterConfig::new(
        max_requests,
        Duration::from_secs(window_secs),
    )));
    let service = HarvestService::new(
        StealthFetcher::new()?,
        fbref::schedule_extractor()?,
        fbref::stats_extractor()?,
        limiter,
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping at the next request boundary");
            signal_token.cancel();
        }
    });

    let mut failures = 0usize;
    for (name, url) in &sources {
        tracing::info!(league = %name, "Harvesting");

        match service.harvest(name, url, &cancel).await {
            Ok(batches) => {
                let path = out_dir.join(format!("{}.json", sanitize(name)));
                write_batches(&batches, &path)?;
                tracing::info!(league = %name, rounds = batches.len(), file = %path.display(), "Saved");
            }
            Err(Error::Cancelled) => bail!("harvest interrupted"),
            // One league's failure must not sink its siblings.
            Err(e) => {
                tracing::error!(league = %name, error = %e, "Harvest failed");
                failures += 1;
            }
        }
    }

    if failures == sources.len() {
        bail!("all {} sources failed", failures);
    }
    Ok(())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn write_batches(batches: &[PeriodBatch], path: &Path) -> Result<()> {
    let by_round: BTreeMap<u32, &Vec<RawRecord>> =
        batches.iter().map(|b| (b.period, &b.records)).collect();
    let json = serde_json::to_string_pretty(&by_round)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn cmd_chart(
    data: &[PathBuf],
    config: &ChartConfig,
    out: &Path,
    csv: Option<&Path>,
) -> Result<()> {
    let mut batches: Vec<PeriodBatch> = Vec::new();
    for path in data {
        let source = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let by_round: BTreeMap<u32, Vec<RawRecord>> = serde_json::from_str(&text)
            .with_context(|| format!("invalid harvest data in {}", path.display()))?;

        tracing::info!(
            source = %source,
            rounds = by_round.len(),
            "Loaded harvest file"
        );
        batches.extend(by_round.into_iter().map(|(period, records)| PeriodBatch {
            source: source.clone(),
            period,
            records,
        }));
    }

    let merged = merge_sources(&batches, &config.key_field, |r| {
        r.weighted_value(&config.fields)
    });
    let frames = aggregate(&merged, config)?;
    tracing::info!(frames = frames.len(), "Aggregation complete");

    let json = serde_json::to_string_pretty(&frames)?;
    std::fs::write(out, json).with_context(|| format!("failed to write {}", out.display()))?;
    tracing::info!(file = %out.display(), "Frames written");

    if let Some(csv_path) = csv {
        write_final_standings(&frames, csv_path)?;
        tracing::info!(file = %csv_path.display(), "Final standings written");
    }

    Ok(())
}

/// Export the last frame as a rank table.
fn write_final_standings(frames: &[statrace_core::record::Frame], path: &Path) -> Result<()> {
    let Some(last) = frames.last() else {
        bail!("no frames to export");
    };

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(["rank", "name", "value", "position"])?;
    for (i, entry) in last.data.iter().enumerate() {
        writer.write_record([
            (i + 1).to_string(),
            entry.name.clone(),
            format!("{:.2}", entry.value),
            entry.position.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_specs_parse_with_and_without_weights() {
        assert_eq!(parse_field_spec("goals").unwrap(), ("goals".into(), 1.0));
        assert_eq!(
            parse_field_spec("cards_red=-20").unwrap(),
            ("cards_red".into(), -20.0)
        );
        assert!(parse_field_spec("goals=abc").is_err());
    }

    #[test]
    fn sanitize_keeps_filenames_tame() {
        assert_eq!(sanitize("Premier League"), "Premier_League");
        assert_eq!(sanitize("Ligue 1"), "Ligue_1");
    }

    #[test]
    fn unknown_league_is_reported() {
        let err = resolve_sources(&["Eredivisie".into()], None, None).unwrap_err();
        assert!(err.to_string().contains("unknown league"));
    }

    #[test]
    fn default_sources_are_the_presets() {
        let sources = resolve_sources(&[], None, None).unwrap();
        assert_eq!(sources.len(), LEAGUES.len());
    }
}
