use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::division::DivisionLadder;
use crate::grades::Grade;
use crate::store::{EntityStore, TeamId};

pub const GRADE_TOLERANCE: Grade = 10;
pub const MAX_NO_SUBSTITUTIONS: usize = 7;
pub const MAX_DOWNWARDS_SUBSTITUTIONS: usize = 3;
pub const MAIN_TEAM_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeColumn {
    pub column: String,
    pub effective: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueConfig {
    /// Division names, strongest first.
    pub divisions: Vec<String>,
    /// Division where playing for several teams is allowed. Defaults to the lowest.
    pub exempt_division: Option<String>,
    pub grade_tolerance: Grade,
    pub max_substitutions: usize,
    pub max_downward_substitutions: usize,
    pub main_team_threshold: usize,
    /// Upward substitution caps per target division. Missing = uncapped.
    pub max_division_substitutions: BTreeMap<String, usize>,
    pub grade_columns: Vec<GradeColumn>,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self {
            divisions: vec![
                "SCCA Division 1".to_string(),
                "SCCA Division 2".to_string(),
                "SCCA Division 3".to_string(),
            ],
            exempt_division: None,
            grade_tolerance: GRADE_TOLERANCE,
            max_substitutions: MAX_NO_SUBSTITUTIONS,
            max_downward_substitutions: MAX_DOWNWARDS_SUBSTITUTIONS,
            main_team_threshold: MAIN_TEAM_THRESHOLD,
            max_division_substitutions: BTreeMap::new(),
            grade_columns: vec![
                GradeColumn {
                    column: "Aug Standard Grade".to_string(),
                    effective: NaiveDate::from_ymd_opt(2019, 8, 1).unwrap_or_default(),
                },
                GradeColumn {
                    column: "Jan Standard Grade".to_string(),
                    effective: NaiveDate::from_ymd_opt(2020, 1, 31).unwrap_or_default(),
                },
            ],
        }
    }
}

impl LeagueConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read league config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse league config {}", path.display()))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<Grade>("GRADE_TOLERANCE") {
            self.grade_tolerance = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_NO_SUBSTITUTIONS") {
            self.max_substitutions = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_DOWNWARDS_SUBSTITUTIONS") {
            self.max_downward_substitutions = v;
        }
        if let Some(v) = env_parse::<usize>("MAIN_TEAM_THRESHOLD") {
            self.main_team_threshold = v.max(1);
        }
    }

    pub fn ladder(&self) -> DivisionLadder {
        DivisionLadder::from_strongest_first(&self.divisions)
    }

    pub fn exempt_division(&self) -> Option<&str> {
        self.exempt_division
            .as_deref()
            .or_else(|| self.divisions.last().map(String::as_str))
    }

    pub fn upward_cap(&self, division: &str) -> Option<usize> {
        self.max_division_substitutions.get(division).copied()
    }

    /// Fills missing upward caps with half the matches played by the busiest
    /// team in each division. The lowest division stays uncapped.
    pub fn with_schedule_caps(mut self, store: &EntityStore) -> Self {
        let mut played: HashMap<TeamId, usize> = HashMap::new();
        for m in store.matches() {
            *played.entry(m.home).or_insert(0) += 1;
            *played.entry(m.away).or_insert(0) += 1;
        }

        let lowest = self.divisions.last().cloned();
        for division in &self.divisions {
            if Some(division) == lowest.as_ref()
                || self.max_division_substitutions.contains_key(division)
            {
                continue;
            }
            let busiest = played
                .iter()
                .filter(|(team, _)| store.team(**team).division == *division)
                .map(|(_, n)| *n)
                .max()
                .unwrap_or(0);
            if busiest == 0 {
                continue;
            }
            debug!(division = %division, cap = busiest / 2, "derived upward cap");
            self.max_division_substitutions
                .insert(division.clone(), busiest / 2);
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse::<T>().ok())
}
