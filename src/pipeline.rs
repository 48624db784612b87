use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::LeagueConfig;
use crate::error::FeedError;
use crate::feeds::{self, GradeRow};
use crate::ledger::{self, LedgerSummary};
use crate::rules::{self, Violation};
use crate::store::{EntityStore, NominationChange, RawMatch};

#[derive(Debug, Clone)]
pub struct MatchSource {
    pub division: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub matches: Vec<MatchSource>,
    pub grades: Option<PathBuf>,
    pub nominations: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunOutput {
    pub store: EntityStore,
    pub config: LeagueConfig,
    pub ledger: LedgerSummary,
    pub violations: Vec<Violation>,
}

pub fn build_store(
    divisions: &[(String, Vec<RawMatch>)],
    grades: &[GradeRow],
    nominations: &[NominationChange],
) -> Result<EntityStore, FeedError> {
    let mut store = EntityStore::new();
    // Teams must exist before nomination rows can resolve them.
    for (division, matches) in divisions {
        store.add_matches(division, matches);
    }
    for row in grades {
        if !row.code.is_empty() {
            store.associate_code(&row.code, &row.name);
        }
        store.add_grade_history(&row.name, row.records.clone());
    }
    for change in nominations {
        store.apply_nomination_change(change)?;
    }
    Ok(store)
}

pub fn evaluate_league(
    store: &mut EntityStore,
    cfg: &LeagueConfig,
) -> (LedgerSummary, Vec<Violation>) {
    let summary = ledger::materialize(store, cfg.main_team_threshold);
    let violations = rules::evaluate(store, cfg);
    (summary, violations)
}

pub fn load_inputs(
    inputs: &Inputs,
    cfg: &LeagueConfig,
) -> Result<(Vec<(String, Vec<RawMatch>)>, Vec<GradeRow>, Vec<NominationChange>)> {
    let mut divisions = Vec::with_capacity(inputs.matches.len());
    for source in &inputs.matches {
        let raw = fs::read_to_string(&source.path)
            .with_context(|| format!("read match feed {}", source.path.display()))?;
        let matches = feeds::parse_lms_matches_json(&raw)
            .with_context(|| format!("parse match feed {}", source.path.display()))?;
        info!(division = %source.division, matches = matches.len(), "loaded match feed");
        divisions.push((source.division.clone(), matches));
    }

    let grades = match &inputs.grades {
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("open grade list {}", path.display()))?;
            let rows = feeds::read_grades_csv(file, &cfg.grade_columns)
                .with_context(|| format!("parse grade list {}", path.display()))?;
            info!(players = rows.len(), "loaded grade list");
            rows
        }
        None => Vec::new(),
    };

    let nominations = match &inputs.nominations {
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("open nominations {}", path.display()))?;
            let rows = feeds::read_nominations_csv(file)
                .with_context(|| format!("parse nominations {}", path.display()))?;
            info!(changes = rows.len(), "loaded nominations");
            rows
        }
        None => Vec::new(),
    };

    Ok((divisions, grades, nominations))
}

pub fn run(inputs: &Inputs, cfg: LeagueConfig) -> Result<RunOutput> {
    let (divisions, grades, nominations) = load_inputs(inputs, &cfg)?;
    let mut store =
        build_store(&divisions, &grades, &nominations).context("apply feeds to store")?;
    let config = cfg.with_schedule_caps(&store);
    let (ledger, violations) = evaluate_league(&mut store, &config);
    Ok(RunOutput {
        store,
        config,
        ledger,
        violations,
    })
}
