use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::division::club_from_team_name;
use crate::error::FeedError;
use crate::grades::{Grade, GradeHistory, GradeRecord};
use crate::ledger::SubstitutionRecord;
use crate::nomination::NominationTimeline;

/// Roster name the LMS uses for a defaulted board.
pub const PLACEHOLDER_PLAYER: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(pub usize);

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub code: Option<String>,
    pub grades: GradeHistory,
    pub nominations: NominationTimeline,
    pub substitutions: Vec<SubstitutionRecord>,
}

impl Player {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            code: None,
            grades: GradeHistory::default(),
            nominations: NominationTimeline::default(),
            substitutions: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.eq_ignore_ascii_case(PLACEHOLDER_PLAYER)
    }

    pub fn grade_on_date(&self, date: NaiveDate) -> Option<Grade> {
        self.grades.grade_on_date(date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    pub division: String,
    pub club: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub player: PlayerId,
    pub listed_grade: Option<Grade>,
}

#[derive(Debug, Clone)]
pub struct Match {
    pub id: MatchId,
    pub date: NaiveDate,
    pub home: TeamId,
    pub away: TeamId,
    pub home_boards: Vec<Board>,
    pub away_boards: Vec<Board>,
}

impl Match {
    pub fn sides(&self) -> [(TeamId, &[Board]); 2] {
        [
            (self.home, self.home_boards.as_slice()),
            (self.away, self.away_boards.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBoard {
    pub name: String,
    pub grade: Option<Grade>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMatch {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home: Vec<RawBoard>,
    pub away: Vec<RawBoard>,
}

/// One row of the nomination feed. `team` is the full team name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NominationChange {
    pub player_code: String,
    pub team: String,
    pub date: NaiveDate,
    pub nominated: bool,
}

#[derive(Debug, Default)]
pub struct EntityStore {
    players: Vec<Player>,
    player_index: HashMap<String, PlayerId>,
    codes: HashMap<String, PlayerId>,
    teams: Vec<Team>,
    team_index: HashMap<String, TeamId>,
    matches: Vec<Match>,
    // Match ids in ascending date order; ties keep insertion order.
    order: Vec<MatchId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_or_find_player(&mut self, name: &str) -> PlayerId {
        let name = name.trim();
        if let Some(id) = self.player_index.get(name) {
            return *id;
        }
        let id = PlayerId(self.players.len());
        self.players.push(Player::new(name));
        self.player_index.insert(name.to_string(), id);
        debug!(player = name, "registered player");
        id
    }

    /// First division seen for a team is authoritative.
    pub fn create_or_find_team(&mut self, name: &str, division: &str) -> TeamId {
        let name = name.trim();
        if let Some(id) = self.team_index.get(name) {
            let team = &self.teams[id.0];
            if team.division != division {
                warn!(
                    team = name,
                    kept = %team.division,
                    ignored = division,
                    "team listed under a second division"
                );
            }
            return *id;
        }
        let id = TeamId(self.teams.len());
        self.teams.push(Team {
            name: name.to_string(),
            division: division.to_string(),
            club: club_from_team_name(name),
        });
        self.team_index.insert(name.to_string(), id);
        debug!(team = name, division, "registered team");
        id
    }

    pub fn associate_code(&mut self, code: &str, name: &str) -> PlayerId {
        let id = self.create_or_find_player(name);
        let code = code.trim().to_string();
        self.players[id.0].code = Some(code.clone());
        self.codes.insert(code, id);
        id
    }

    pub fn add_grade_history(&mut self, name: &str, records: Vec<GradeRecord>) -> PlayerId {
        let id = self.create_or_find_player(name);
        self.players[id.0].grades = GradeHistory::new(records);
        id
    }

    pub fn add_match(&mut self, division_hint: &str, raw: &RawMatch) -> MatchId {
        let id = self.push_match(division_hint, raw);
        let date = self.matches[id.0].date;
        let pos = self
            .order
            .partition_point(|m| self.matches[m.0].date <= date);
        self.order.insert(pos, id);
        id
    }

    /// Inserts a batch, then restores ascending date order.
    pub fn add_matches(&mut self, division_hint: &str, raws: &[RawMatch]) -> Vec<MatchId> {
        let ids: Vec<MatchId> = raws
            .iter()
            .map(|raw| self.push_match(division_hint, raw))
            .collect();
        self.order.extend(ids.iter().copied());
        let matches = &self.matches;
        self.order.sort_by_key(|m| matches[m.0].date);
        debug!(
            division = division_hint,
            added = ids.len(),
            total = self.order.len(),
            "added matches"
        );
        ids
    }

    fn push_match(&mut self, division_hint: &str, raw: &RawMatch) -> MatchId {
        let home = self.create_or_find_team(&raw.home_team, division_hint);
        let away = self.create_or_find_team(&raw.away_team, division_hint);
        let home_boards = self.boards(&raw.home);
        let away_boards = self.boards(&raw.away);
        let id = MatchId(self.matches.len());
        self.matches.push(Match {
            id,
            date: raw.date,
            home,
            away,
            home_boards,
            away_boards,
        });
        id
    }

    fn boards(&mut self, raw: &[RawBoard]) -> Vec<Board> {
        raw.iter()
            .map(|b| Board {
                player: self.create_or_find_player(&b.name),
                listed_grade: b.grade,
            })
            .collect()
    }

    /// Applies one nomination feed row. Rows are expected in chronological order.
    pub fn apply_nomination_change(&mut self, change: &NominationChange) -> Result<bool, FeedError> {
        let player = self
            .player_by_code(&change.player_code)
            .ok_or_else(|| FeedError::UnknownPlayerCode(change.player_code.clone()))?;
        let team_name = change.team.trim();

        if !change.nominated {
            let club = match self.find_team(team_name) {
                Some(id) => self.teams[id.0].club.clone(),
                None => club_from_team_name(team_name),
            };
            return Ok(self.players[player.0]
                .nominations
                .close_for_club(&club, change.date));
        }

        let team_id = self
            .find_team(team_name)
            .ok_or_else(|| FeedError::UnknownTeam(team_name.to_string()))?;
        let team = &self.teams[team_id.0];
        Ok(self.players[player.0].nominations.open_explicit(
            team_id,
            &team.division,
            &team.club,
            change.date,
        ))
    }

    /// Players nominated for `team` on `date`, strongest first.
    ///
    /// Position `i` is the player nominated for board `i`. Unknown grades sort last.
    pub fn nominated_roster(&self, team: TeamId, date: NaiveDate) -> Vec<PlayerId> {
        let mut roster: Vec<(PlayerId, Option<Grade>)> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.nominations.is_nominated(team, date))
            .map(|(idx, p)| (PlayerId(idx), p.grade_on_date(date)))
            .collect();
        roster.sort_by(|(a_id, a_grade), (b_id, b_grade)| {
            b_grade
                .cmp(a_grade)
                .then_with(|| self.players[a_id.0].name.cmp(&self.players[b_id.0].name))
        });
        roster.into_iter().map(|(id, _)| id).collect()
    }

    pub fn find_player(&self, name: &str) -> Option<PlayerId> {
        self.player_index.get(name.trim()).copied()
    }

    pub fn player_by_code(&self, code: &str) -> Option<PlayerId> {
        self.codes.get(code.trim()).copied()
    }

    pub fn find_team(&self, name: &str) -> Option<TeamId> {
        self.team_index.get(name.trim()).copied()
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id.0]
    }

    pub fn player_mut(&mut self, id: PlayerId) -> &mut Player {
        &mut self.players[id.0]
    }

    pub fn team(&self, id: TeamId) -> &Team {
        &self.teams[id.0]
    }

    pub fn get_match(&self, id: MatchId) -> &Match {
        &self.matches[id.0]
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn matches(&self) -> impl Iterator<Item = &Match> + '_ {
        self.order.iter().map(|id| &self.matches[id.0])
    }

    pub fn match_count(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn match_order(&self) -> &[MatchId] {
        &self.order
    }

    /// Disjoint borrows for the ledger fold: players mutable, the rest shared.
    pub(crate) fn ledger_parts(&mut self) -> (&mut [Player], &[Team], &[Match], &[MatchId]) {
        (
            &mut self.players,
            &self.teams,
            &self.matches,
            &self.order,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn raw(date: NaiveDate, home: &str, away: &str, home_players: &[&str], away_players: &[&str]) -> RawMatch {
        let boards = |names: &[&str]| -> Vec<RawBoard> {
            names
                .iter()
                .map(|n| RawBoard {
                    name: n.to_string(),
                    grade: None,
                })
                .collect()
        };
        RawMatch {
            date,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home: boards(home_players),
            away: boards(away_players),
        }
    }

    #[test]
    fn players_and_teams_are_deduplicated() {
        let mut store = EntityStore::new();
        let a = store.create_or_find_player("Smith, John");
        let b = store.create_or_find_player(" Smith, John ");
        assert_eq!(a, b);
        assert_eq!(store.players().len(), 1);

        let t1 = store.create_or_find_team("Riverside A", "Division 1");
        let t2 = store.create_or_find_team("Riverside A", "Division 2");
        assert_eq!(t1, t2);
        assert_eq!(store.team(t1).division, "Division 1");
        assert_eq!(store.team(t1).club, "Riverside");
    }

    #[test]
    fn matches_are_kept_in_date_order() {
        let mut store = EntityStore::new();
        store.add_matches(
            "Division 1",
            &[
                raw(d(2020, 1, 19), "Riverside A", "Ipswich A", &["P1"], &["P2"]),
                raw(d(2020, 1, 5), "Ipswich A", "Riverside A", &["P2"], &["P1"]),
            ],
        );
        store.add_match(
            "Division 2",
            &raw(d(2020, 1, 12), "Riverside B", "Ipswich B", &["P3"], &["P4"]),
        );
        store.add_match(
            "Division 2",
            &raw(d(2020, 1, 5), "Riverside B", "Felixstowe B", &["P3"], &["P5"]),
        );

        let dates: Vec<_> = store.matches().map(|m| m.date).collect();
        assert_eq!(dates, vec![d(2020, 1, 5), d(2020, 1, 5), d(2020, 1, 12), d(2020, 1, 19)]);
        // Same-day matches keep the order they were added in.
        let first: Vec<_> = store.matches().take(2).map(|m| store.team(m.home).name.clone()).collect();
        assert_eq!(first, vec!["Ipswich A", "Riverside B"]);
        assert_eq!(store.players().len(), 5);
    }

    #[test]
    fn nomination_changes_need_known_code_and_team() {
        let mut store = EntityStore::new();
        store.add_match(
            "Division 1",
            &raw(d(2019, 9, 10), "Riverside A", "Ipswich A", &["Smith, John"], &["Jones, Ann"]),
        );
        store.associate_code("123456A", "Smith, John");

        let unknown_code = NominationChange {
            player_code: "999".to_string(),
            team: "Riverside A".to_string(),
            date: d(2019, 9, 1),
            nominated: true,
        };
        assert!(matches!(
            store.apply_nomination_change(&unknown_code),
            Err(FeedError::UnknownPlayerCode(_))
        ));

        let unknown_team = NominationChange {
            player_code: "123456A".to_string(),
            team: "Nowhere A".to_string(),
            date: d(2019, 9, 1),
            nominated: true,
        };
        assert!(matches!(
            store.apply_nomination_change(&unknown_team),
            Err(FeedError::UnknownTeam(_))
        ));

        let open = NominationChange {
            player_code: "123456A".to_string(),
            team: "Riverside A".to_string(),
            date: d(2019, 9, 1),
            nominated: true,
        };
        assert!(store.apply_nomination_change(&open).unwrap());
        let close = NominationChange {
            date: d(2019, 12, 1),
            nominated: false,
            ..open
        };
        assert!(store.apply_nomination_change(&close).unwrap());

        let john = store.find_player("Smith, John").unwrap();
        let team = store.find_team("Riverside A").unwrap();
        let timeline = &store.player(john).nominations;
        assert!(timeline.is_nominated(team, d(2019, 11, 30)));
        assert!(!timeline.is_nominated(team, d(2019, 12, 1)));
    }

    #[test]
    fn nominated_roster_orders_by_grade() {
        let mut store = EntityStore::new();
        let team = store.create_or_find_team("Riverside A", "Division 1");
        for (code, name, grade) in [("1", "Low", 120), ("2", "High", 190), ("3", "Ungraded", 0)] {
            store.associate_code(code, name);
            if grade > 0 {
                store.add_grade_history(
                    name,
                    vec![GradeRecord {
                        effective: d(2019, 8, 1),
                        grade,
                    }],
                );
            }
            store
                .apply_nomination_change(&NominationChange {
                    player_code: code.to_string(),
                    team: "Riverside A".to_string(),
                    date: d(2019, 9, 1),
                    nominated: true,
                })
                .unwrap();
        }

        let names: Vec<_> = store
            .nominated_roster(team, d(2019, 10, 1))
            .into_iter()
            .map(|id| store.player(id).name.clone())
            .collect();
        assert_eq!(names, vec!["High", "Low", "Ungraded"]);
        assert!(store.nominated_roster(team, d(2019, 8, 1)).is_empty());
    }
}
