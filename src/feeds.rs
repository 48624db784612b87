use std::collections::HashSet;
use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::GradeColumn;
use crate::error::FeedError;
use crate::grades::{GradeRecord, is_unplayed_grade, parse_grade};
use crate::store::{NominationChange, RawBoard, RawMatch};

// Column layout of the LMS match endpoint.
const HEADER_HOME_TEAM: usize = 2;
const HEADER_MATCH_DATE: usize = 4;
const HEADER_AWAY_TEAM: usize = 5;
const HOME_PLAYER: usize = 2;
const HOME_GRADE: usize = 3;
const AWAY_PLAYER: usize = 5;
const AWAY_GRADE: usize = 6;

const GRADE_CODE_COLUMN: &str = "ECF Ref";
const GRADE_NAME_COLUMN: &str = "Name";

#[derive(Debug, Deserialize)]
struct LmsMatch {
    #[serde(default)]
    header: Vec<Value>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeRow {
    pub code: String,
    pub name: String,
    pub records: Vec<GradeRecord>,
}

#[derive(Debug, Deserialize)]
struct NominationRow {
    #[serde(rename = "playerCode")]
    player_code: String,
    club: String,
    #[serde(rename = "changeDate")]
    change_date: String,
    nominated: String,
}

/// Parses one division's LMS match listing into played matches, oldest first.
///
/// Fixtures where every board carries the unplayed grade are dropped, as are
/// repeat postings of the same (home, away, date).
pub fn parse_lms_matches_json(raw: &str) -> Result<Vec<RawMatch>, FeedError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let entries: Vec<LmsMatch> = serde_json::from_str(trimmed)?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(m) = parse_lms_match(index, entry)? else {
            debug!(index, "skipping unplayed fixture");
            continue;
        };
        if !seen.insert((m.home_team.clone(), m.away_team.clone(), m.date)) {
            debug!(home = %m.home_team, away = %m.away_team, date = %m.date, "duplicate posting");
            continue;
        }
        out.push(m);
    }
    out.sort_by_key(|m| m.date);
    Ok(out)
}

fn parse_lms_match(index: usize, entry: &LmsMatch) -> Result<Option<RawMatch>, FeedError> {
    let malformed = |reason: &str| FeedError::MalformedMatch {
        index,
        reason: reason.to_string(),
    };
    let header = |idx: usize| entry.header.get(idx).map(cell_text);
    let home_team = header(HEADER_HOME_TEAM).ok_or_else(|| malformed("missing home team"))?;
    let away_team = header(HEADER_AWAY_TEAM).ok_or_else(|| malformed("missing away team"))?;
    let date_raw = header(HEADER_MATCH_DATE).ok_or_else(|| malformed("missing match date"))?;
    if home_team.is_empty() || away_team.is_empty() {
        return Err(malformed("blank team name"));
    }
    let date = parse_feed_date(&date_raw)?;

    let mut home = Vec::with_capacity(entry.data.len());
    let mut away = Vec::with_capacity(entry.data.len());
    let mut played = false;
    for row in &entry.data {
        if row.len() <= AWAY_GRADE {
            return Err(malformed("short board row"));
        }
        let home_grade = cell_text(&row[HOME_GRADE]);
        let away_grade = cell_text(&row[AWAY_GRADE]);
        if !is_unplayed_grade(&home_grade) && !is_unplayed_grade(&away_grade) {
            played = true;
        }
        home.push(RawBoard {
            name: cell_text(&row[HOME_PLAYER]),
            grade: listed_grade(&home_grade)?,
        });
        away.push(RawBoard {
            name: cell_text(&row[AWAY_PLAYER]),
            grade: listed_grade(&away_grade)?,
        });
    }
    if !played {
        return Ok(None);
    }

    Ok(Some(RawMatch {
        date,
        home_team,
        away_team,
        home,
        away,
    }))
}

fn listed_grade(raw: &str) -> Result<Option<i32>, FeedError> {
    if raw.is_empty() || is_unplayed_grade(raw) {
        return Ok(None);
    }
    parse_grade(raw).map(Some)
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn parse_feed_date(raw: &str) -> Result<NaiveDate, FeedError> {
    let s = raw.trim();
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%d %b %Y", "%d-%b-%Y", "%a %d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(FeedError::InvalidDate(raw.to_string()))
}

/// Reads the grade list. Empty snapshot cells are skipped; anything else must parse.
pub fn read_grades_csv<R: Read>(
    reader: R,
    columns: &[GradeColumn],
) -> Result<Vec<GradeRow>, FeedError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let position = |column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| FeedError::MissingColumn {
                context: "grade list".to_string(),
                column: column.to_string(),
            })
    };
    let code_idx = position(GRADE_CODE_COLUMN)?;
    let name_idx = position(GRADE_NAME_COLUMN)?;
    let snapshot_idx = columns
        .iter()
        .map(|c| position(&c.column).map(|idx| (idx, c.effective)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let name = record.get(name_idx).unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }
        let mut records = Vec::with_capacity(snapshot_idx.len());
        for (idx, effective) in &snapshot_idx {
            let cell = record.get(*idx).unwrap_or_default();
            if cell.is_empty() {
                continue;
            }
            records.push(GradeRecord {
                effective: *effective,
                grade: parse_grade(cell)?,
            });
        }
        out.push(GradeRow {
            code: record.get(code_idx).unwrap_or_default().to_string(),
            name,
            records,
        });
    }
    Ok(out)
}

/// Reads nomination changes in file order; the file is expected to be chronological.
pub fn read_nominations_csv<R: Read>(reader: R) -> Result<Vec<NominationChange>, FeedError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = Vec::new();
    for row in rdr.deserialize::<NominationRow>() {
        let row = row?;
        out.push(NominationChange {
            player_code: row.player_code,
            team: row.club,
            date: parse_feed_date(&row.change_date)?,
            nominated: parse_flag(&row.nominated)?,
        });
    }
    Ok(out)
}

fn parse_flag(raw: &str) -> Result<bool, FeedError> {
    let s = raw.trim().to_ascii_lowercase();
    match s.as_str() {
        "true" | "yes" | "y" => return Ok(true),
        "false" | "no" | "n" => return Ok(false),
        _ => {}
    }
    s.parse::<i64>()
        .map(|n| n != 0)
        .map_err(|_| FeedError::InvalidFlag(raw.to_string()))
}
