use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::LeagueConfig;
use crate::division::DivisionLadder;
use crate::grades::Grade;
use crate::ledger::{SubstitutionRecord, count_cross_division_substitutions};
use crate::store::{Board, EntityStore, Match, PlayerId, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ViolationKind {
    #[serde(rename = "Player Out of Grade Order")]
    GradeOrder,
    #[serde(rename = "Player grade too high")]
    GradeTooHigh,
    #[serde(rename = "Player has made too many substitutions")]
    TooManySubstitutions,
    #[serde(rename = "Substitution in same division")]
    SameDivisionSubstitution,
    #[serde(rename = "Too many upward substitutions")]
    TooManyUpward,
    #[serde(rename = "Too many downward substitutions")]
    TooManyDownward,
    #[serde(rename = "Nominated for multiple teams in same division")]
    MultipleNominations,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 7] = [
        ViolationKind::GradeOrder,
        ViolationKind::GradeTooHigh,
        ViolationKind::TooManySubstitutions,
        ViolationKind::SameDivisionSubstitution,
        ViolationKind::TooManyUpward,
        ViolationKind::TooManyDownward,
        ViolationKind::MultipleNominations,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ViolationKind::GradeOrder => "Player Out of Grade Order",
            ViolationKind::GradeTooHigh => "Player grade too high",
            ViolationKind::TooManySubstitutions => "Player has made too many substitutions",
            ViolationKind::SameDivisionSubstitution => "Substitution in same division",
            ViolationKind::TooManyUpward => "Too many upward substitutions",
            ViolationKind::TooManyDownward => "Too many downward substitutions",
            ViolationKind::MultipleNominations => "Nominated for multiple teams in same division",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ViolationContext {
    /// `team` is the side the player turned out for.
    Match {
        home: String,
        away: String,
        date: NaiveDate,
        team: String,
    },
    Team {
        team: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub player: String,
    #[serde(flatten)]
    pub context: ViolationContext,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            ViolationContext::Match {
                home,
                away,
                date,
                team,
            } => write!(
                f,
                "{}: {} ({} in {} v {}, {})",
                self.kind, self.player, team, home, away, date
            ),
            ViolationContext::Team { team } => {
                write!(f, "{}: {} ({})", self.kind, self.player, team)
            }
        }
    }
}

fn match_violation(
    store: &EntityStore,
    kind: ViolationKind,
    player: PlayerId,
    m: &Match,
    team: TeamId,
) -> Violation {
    Violation {
        kind,
        player: store.player(player).name.clone(),
        context: ViolationContext::Match {
            home: store.team(m.home).name.clone(),
            away: store.team(m.away).name.clone(),
            date: m.date,
            team: store.team(team).name.clone(),
        },
    }
}

fn team_violation(
    store: &EntityStore,
    kind: ViolationKind,
    player: PlayerId,
    team: TeamId,
) -> Violation {
    Violation {
        kind,
        player: store.player(player).name.clone(),
        context: ViolationContext::Team {
            team: store.team(team).name.clone(),
        },
    }
}

/// Grade used for a board: the player's grade history, else the grade on the match card.
///
/// `None` for defaulted boards and ungraded players; callers skip those comparisons.
pub fn board_grade(store: &EntityStore, board: &Board, date: NaiveDate) -> Option<Grade> {
    let player = store.player(board.player);
    if player.is_placeholder() {
        return None;
    }
    player.grade_on_date(date).or(board.listed_grade)
}

/// Board indices whose grade exceeds the board above by more than `tolerance`.
///
/// Board 0 is never flagged; a missing grade on either side of a pair is not a breach.
pub fn grade_order_breaches(grades: &[Option<Grade>], tolerance: Grade) -> Vec<usize> {
    grades
        .windows(2)
        .enumerate()
        .filter_map(|(idx, pair)| match (pair[0], pair[1]) {
            (Some(above), Some(below)) if below > above.saturating_add(tolerance) => Some(idx + 1),
            _ => None,
        })
        .collect()
}

pub fn exceeds_ceiling(rostered: Option<Grade>, nominated: Option<Grade>, tolerance: Grade) -> bool {
    matches!((rostered, nominated), (Some(r), Some(n)) if r > n.saturating_add(tolerance))
}

pub fn check_grade_order(
    store: &EntityStore,
    m: &Match,
    team: TeamId,
    boards: &[Board],
    tolerance: Grade,
) -> Vec<Violation> {
    let grades: Vec<Option<Grade>> = boards
        .iter()
        .map(|b| board_grade(store, b, m.date))
        .collect();
    grade_order_breaches(&grades, tolerance)
        .into_iter()
        .map(|idx| match_violation(store, ViolationKind::GradeOrder, boards[idx].player, m, team))
        .collect()
}

pub fn check_nominated_grade(
    store: &EntityStore,
    m: &Match,
    team: TeamId,
    boards: &[Board],
    tolerance: Grade,
) -> Vec<Violation> {
    let nominated = store.nominated_roster(team, m.date);
    let mut out = Vec::new();
    for (idx, board) in boards.iter().enumerate() {
        let player = store.player(board.player);
        if player.is_placeholder() || player.nominations.is_nominated(team, m.date) {
            continue;
        }
        let Some(nominee) = nominated.get(idx) else {
            continue;
        };
        let ceiling = store.player(*nominee).grade_on_date(m.date);
        if exceeds_ceiling(board_grade(store, board, m.date), ceiling, tolerance) {
            out.push(match_violation(
                store,
                ViolationKind::GradeTooHigh,
                board.player,
                m,
                team,
            ));
        }
    }
    out
}

pub fn check_match(store: &EntityStore, m: &Match, cfg: &LeagueConfig) -> Vec<Violation> {
    let mut out = Vec::new();
    for (team, boards) in m.sides() {
        out.extend(check_grade_order(store, m, team, boards, cfg.grade_tolerance));
        out.extend(check_nominated_grade(store, m, team, boards, cfg.grade_tolerance));
    }
    out
}

fn records_by_division<'a>(
    store: &EntityStore,
    records: &'a [SubstitutionRecord],
) -> BTreeMap<String, Vec<&'a SubstitutionRecord>> {
    let mut out: BTreeMap<String, Vec<&SubstitutionRecord>> = BTreeMap::new();
    for record in records {
        out.entry(store.team(record.team).division.clone())
            .or_default()
            .push(record);
    }
    out
}

/// Substitutions per division for teams other than the ones nominated for on the
/// date of the player's last substitution there. One violation per division.
pub fn check_substitution_quota(
    store: &EntityStore,
    player_id: PlayerId,
    max_substitutions: usize,
) -> Vec<Violation> {
    let player = store.player(player_id);
    let mut out = Vec::new();
    for (division, records) in records_by_division(store, &player.substitutions) {
        let Some(as_of) = records.iter().map(|r| r.date).max() else {
            continue;
        };
        let nominated: HashSet<TeamId> = player
            .nominations
            .active_nominations(as_of, Some(division.as_str()))
            .into_iter()
            .map(|n| n.team)
            .collect();
        let mut counted = 0usize;
        for record in records {
            if nominated.contains(&record.team) {
                continue;
            }
            counted += 1;
            if counted > max_substitutions {
                let m = store.get_match(record.match_id);
                out.push(match_violation(
                    store,
                    ViolationKind::TooManySubstitutions,
                    player_id,
                    m,
                    record.team,
                ));
                break;
            }
        }
    }
    out
}

/// Flags every extra team a player substituted for within one division.
///
/// The first team substituted for is the player's own; the exempt division is skipped.
pub fn check_same_division_substitutions(
    store: &EntityStore,
    player_id: PlayerId,
    exempt_division: Option<&str>,
) -> Vec<Violation> {
    let player = store.player(player_id);
    let mut out = Vec::new();
    for (division, counts) in count_cross_division_substitutions(store, player, NaiveDate::MAX) {
        if Some(division.as_str()) == exempt_division || counts.per_team.len() < 2 {
            continue;
        }
        for team in counts.per_team.keys().filter(|t| **t != counts.first_team) {
            out.push(team_violation(
                store,
                ViolationKind::SameDivisionSubstitution,
                player_id,
                *team,
            ));
        }
    }
    out
}

/// Upward moves are capped per target division, downward moves per player.
///
/// Each substitution is measured against the player's nomination for the same
/// club on that date; without one there is no baseline and it is skipped.
pub fn check_division_movement(
    store: &EntityStore,
    player_id: PlayerId,
    cfg: &LeagueConfig,
    ladder: &DivisionLadder,
) -> Vec<Violation> {
    let player = store.player(player_id);
    let mut upward: BTreeMap<&str, usize> = BTreeMap::new();
    let mut downward = 0usize;
    let mut out = Vec::new();

    for record in &player.substitutions {
        let team = store.team(record.team);
        let Some(home) = player
            .nominations
            .active_nomination_for_club(record.date, &team.club)
        else {
            continue;
        };
        if home.team == record.team {
            continue;
        }
        let Some(direction) = ladder.compare(&team.division, &home.division) else {
            continue;
        };
        let m = store.get_match(record.match_id);
        match direction {
            std::cmp::Ordering::Greater => {
                let count = upward.entry(team.division.as_str()).or_insert(0);
                *count += 1;
                if cfg.upward_cap(&team.division).is_some_and(|cap| *count == cap + 1) {
                    out.push(match_violation(
                        store,
                        ViolationKind::TooManyUpward,
                        player_id,
                        m,
                        record.team,
                    ));
                }
            }
            std::cmp::Ordering::Less => {
                downward += 1;
                if downward == cfg.max_downward_substitutions + 1 {
                    out.push(match_violation(
                        store,
                        ViolationKind::TooManyDownward,
                        player_id,
                        m,
                        record.team,
                    ));
                }
            }
            std::cmp::Ordering::Equal => {}
        }
    }
    out
}

pub fn check_multiple_nominations(store: &EntityStore, player_id: PlayerId) -> Vec<Violation> {
    let player = store.player(player_id);
    let mut flagged: Vec<TeamId> = Vec::new();
    for interval in player.nominations.intervals() {
        let active = player
            .nominations
            .active_nominations(interval.start, Some(interval.division.as_str()));
        if active.len() < 2 {
            continue;
        }
        let Some(first) = active.iter().min_by_key(|n| n.start).map(|n| n.team) else {
            continue;
        };
        for n in active {
            if n.team != first && !flagged.contains(&n.team) {
                flagged.push(n.team);
            }
        }
    }
    flagged
        .into_iter()
        .map(|team| team_violation(store, ViolationKind::MultipleNominations, player_id, team))
        .collect()
}

pub fn check_player(
    store: &EntityStore,
    player_id: PlayerId,
    cfg: &LeagueConfig,
    ladder: &DivisionLadder,
) -> Vec<Violation> {
    if store.player(player_id).is_placeholder() {
        return Vec::new();
    }
    let mut out = check_substitution_quota(store, player_id, cfg.max_substitutions);
    out.extend(check_same_division_substitutions(
        store,
        player_id,
        cfg.exempt_division(),
    ));
    out.extend(check_division_movement(store, player_id, cfg, ladder));
    out.extend(check_multiple_nominations(store, player_id));
    out
}

/// Read-only, so matches and players are checked in parallel. Output order is
/// fixed: match rules in date order, then player rules in registration order.
pub fn evaluate(store: &EntityStore, cfg: &LeagueConfig) -> Vec<Violation> {
    let ladder = cfg.ladder();
    let mut out: Vec<Violation> = store
        .match_order()
        .par_iter()
        .flat_map_iter(|id| check_match(store, store.get_match(*id), cfg))
        .collect();
    let per_player: Vec<Violation> = (0..store.players().len())
        .into_par_iter()
        .flat_map_iter(|idx| check_player(store, PlayerId(idx), cfg, &ladder))
        .collect();
    out.extend(per_player);
    info!(violations = out.len(), "rules evaluated");
    out
}
