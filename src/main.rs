use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use league_check::config::LeagueConfig;
use league_check::pipeline::{self, Inputs, MatchSource};
use league_check::report;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let inputs = Inputs {
        matches: parse_match_sources(&args)?,
        grades: path_arg(&args, "--grades").or_else(|| path_env("GRADES_FILE")),
        nominations: path_arg(&args, "--nominations").or_else(|| path_env("NOMINATIONS_FILE")),
    };
    if inputs.matches.is_empty() {
        return Err(anyhow!(
            "no match feeds given; pass --matches \"<Division>=<file.json>\" or set MATCH_FEEDS"
        ));
    }
    if inputs.nominations.is_none() {
        warn!("no nominations file; every nomination will be inferred from appearances");
    }

    let config_path = path_arg(&args, "--config").or_else(|| path_env("LEAGUE_CONFIG"));
    let cfg = LeagueConfig::load(config_path.as_deref())?;
    let output = pipeline::run(&inputs, cfg)?;

    print!("{}", report::render_summary(&output.ledger, &output.violations));
    for v in &output.violations {
        println!("{v}");
    }

    if let Some(path) = path_arg(&args, "--json") {
        report::write_json(&path, &output.violations)?;
        info!(path = %path.display(), "wrote violations json");
    }
    if let Some(path) = path_arg(&args, "--xlsx") {
        let exported = report::export_xlsx(&path, &output.store, &output.violations)?;
        info!(
            path = %path.display(),
            violations = exported.violations,
            nominations = exported.nominations,
            "wrote workbook"
        );
    }
    Ok(())
}

/// `--matches "SCCA Division 1=data/div1.json"`, repeatable. Falls back to
/// `MATCH_FEEDS` with the same pairs separated by `;`.
fn parse_match_sources(args: &[String]) -> Result<Vec<MatchSource>> {
    let mut raw = arg_values(args, "--matches");
    if raw.is_empty()
        && let Ok(env) = std::env::var("MATCH_FEEDS")
    {
        raw = env
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    raw.iter()
        .map(|pair| {
            let (division, path) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("expected <Division>=<file>, got {pair:?}"))?;
            Ok(MatchSource {
                division: division.trim().to_string(),
                path: PathBuf::from(path.trim()),
            })
        })
        .collect()
}

fn arg_values(args: &[String], name: &str) -> Vec<String> {
    let prefix = format!("{name}=");
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            if !value.trim().is_empty() {
                out.push(value.to_string());
            }
        } else if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            out.push(next.clone());
        }
    }
    out
}

fn path_arg(args: &[String], name: &str) -> Option<PathBuf> {
    arg_values(args, name).pop().map(PathBuf::from)
}

fn path_env(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
