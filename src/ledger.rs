use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::store::{EntityStore, Match, MatchId, Player, Team, TeamId};

/// An appearance for a team the player was not nominated for on that date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubstitutionRecord {
    pub date: NaiveDate,
    pub team: TeamId,
    pub match_id: MatchId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    Placeholder,
    Nominated,
    /// `inferred` is set when this appearance made the team the player's main team.
    Substitute { inferred: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub appearances: usize,
    pub substitutions: usize,
    pub inferred_nominations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DivisionSubstitutions {
    pub per_team: BTreeMap<TeamId, usize>,
    /// Team the player first substituted for in this division.
    pub first_team: TeamId,
}

impl DivisionSubstitutions {
    pub fn total(&self) -> usize {
        self.per_team.values().sum()
    }
}

/// Classifies one roster slot against the player's timeline as it stands now.
///
/// Must be called in ascending match date order: whether this appearance counts
/// as a substitution depends on nominations inferred from earlier ones.
pub fn record_appearance(
    player: &mut Player,
    team_id: TeamId,
    team: &Team,
    m: &Match,
    threshold: usize,
) -> Appearance {
    if player.is_placeholder() {
        return Appearance::Placeholder;
    }
    if player.nominations.is_nominated(team_id, m.date) {
        return Appearance::Nominated;
    }
    player.substitutions.push(SubstitutionRecord {
        date: m.date,
        team: team_id,
        match_id: m.id,
    });
    let inferred = infer_main_team(player, team_id, team, m.date, threshold);
    Appearance::Substitute { inferred }
}

fn infer_main_team(
    player: &mut Player,
    team_id: TeamId,
    team: &Team,
    date: NaiveDate,
    threshold: usize,
) -> bool {
    if threshold == 0 || player.nominations.has_active_in_division(date, &team.division) {
        return false;
    }
    // Moves inside the player's own club fall under the movement quotas instead.
    if player
        .nominations
        .active_nomination_for_club(date, &team.club)
        .is_some()
    {
        return false;
    }
    // Appearances made before the last nomination in this division ended don't count.
    let since = player
        .nominations
        .last_release_in_division(date, &team.division);
    let count = player
        .substitutions
        .iter()
        .filter(|s| s.team == team_id)
        .filter(|s| since.is_none_or(|released| s.date >= released))
        .count();
    if count < threshold {
        return false;
    }

    let interval = player
        .nominations
        .insert_inferred(team_id, &team.division, &team.club, date);
    debug!(
        player = %player.name,
        team = %team.name,
        start = %interval.start,
        end = ?interval.end,
        "inferred main team"
    );
    true
}

/// Discards previous ledger output first, so it can be re-run.
pub fn materialize(store: &mut EntityStore, threshold: usize) -> LedgerSummary {
    let (players, teams, matches, order) = store.ledger_parts();
    for player in players.iter_mut() {
        player.substitutions.clear();
        player.nominations.clear_inferred();
    }

    let mut summary = LedgerSummary::default();
    for id in order {
        let m = &matches[id.0];
        for (team_id, boards) in m.sides() {
            let team = &teams[team_id.0];
            for board in boards {
                let player = &mut players[board.player.0];
                match record_appearance(player, team_id, team, m, threshold) {
                    Appearance::Placeholder => {}
                    Appearance::Nominated => summary.appearances += 1,
                    Appearance::Substitute { inferred } => {
                        summary.appearances += 1;
                        summary.substitutions += 1;
                        if inferred {
                            summary.inferred_nominations += 1;
                        }
                    }
                }
            }
        }
    }

    info!(
        matches = order.len(),
        appearances = summary.appearances,
        substitutions = summary.substitutions,
        inferred = summary.inferred_nominations,
        "substitution ledger built"
    );
    summary
}

pub fn count_cross_division_substitutions(
    store: &EntityStore,
    player: &Player,
    as_of: NaiveDate,
) -> BTreeMap<String, DivisionSubstitutions> {
    let mut out: BTreeMap<String, DivisionSubstitutions> = BTreeMap::new();
    for record in player.substitutions.iter().filter(|s| s.date <= as_of) {
        let division = &store.team(record.team).division;
        let entry = out
            .entry(division.clone())
            .or_insert_with(|| DivisionSubstitutions {
                per_team: BTreeMap::new(),
                first_team: record.team,
            });
        *entry.per_team.entry(record.team).or_insert(0) += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NominationChange, RawBoard, RawMatch};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn board(name: &str) -> RawBoard {
        RawBoard {
            name: name.to_string(),
            grade: None,
        }
    }

    fn fixture(date: NaiveDate, home: &str, away: &str, home_player: &str) -> RawMatch {
        RawMatch {
            date,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home: vec![board(home_player)],
            away: vec![board("Opponent")],
        }
    }

    #[test]
    fn three_substitute_appearances_make_a_main_team() {
        let mut store = EntityStore::new();
        for date in [d(2020, 1, 5), d(2020, 1, 12), d(2020, 1, 19)] {
            store.add_match("Division 1", &fixture(date, "Riverside A", "Ipswich A", "P"));
        }
        let summary = materialize(&mut store, 3);

        let p = store.find_player("P").unwrap();
        let a = store.find_team("Riverside A").unwrap();
        let timeline = &store.player(p).nominations;
        assert!(timeline.is_nominated(a, d(2020, 1, 19)));
        assert!(!timeline.is_nominated(a, d(2020, 1, 4)));
        assert!(!timeline.is_nominated(a, d(2020, 1, 18)));
        assert_eq!(store.player(p).substitutions.len(), 3);
        // "Opponent" also played three times for Ipswich A.
        assert_eq!(summary.inferred_nominations, 2);
    }

    #[test]
    fn appearances_after_inference_are_not_substitutions() {
        let mut store = EntityStore::new();
        for day in [5, 12, 19, 26] {
            store.add_match("Division 1", &fixture(d(2020, 1, day), "Riverside A", "Ipswich A", "P"));
        }
        materialize(&mut store, 3);
        let p = store.find_player("P").unwrap();
        assert_eq!(store.player(p).substitutions.len(), 3);
    }

    #[test]
    fn existing_nomination_in_division_blocks_inference() {
        let mut store = EntityStore::new();
        store.create_or_find_team("Riverside B", "Division 1");
        for day in [5, 12, 19] {
            store.add_match("Division 1", &fixture(d(2020, 1, day), "Riverside A", "Ipswich A", "P"));
        }
        store.associate_code("P1", "P");
        store
            .apply_nomination_change(&NominationChange {
                player_code: "P1".to_string(),
                team: "Riverside B".to_string(),
                date: d(2019, 9, 1),
                nominated: true,
            })
            .unwrap();
        materialize(&mut store, 3);

        let p = store.find_player("P").unwrap();
        let a = store.find_team("Riverside A").unwrap();
        assert!(!store.player(p).nominations.is_nominated(a, d(2020, 1, 19)));
        assert_eq!(store.player(p).substitutions.len(), 3);
    }

    #[test]
    fn placeholder_boards_are_ignored() {
        let mut store = EntityStore::new();
        store.add_match("Division 1", &fixture(d(2020, 1, 5), "Riverside A", "Ipswich A", "Default"));
        let summary = materialize(&mut store, 3);
        let default = store.find_player("Default").unwrap();
        assert!(store.player(default).substitutions.is_empty());
        assert_eq!(summary.appearances, 1);
    }

    #[test]
    fn rerunning_the_fold_gives_the_same_ledger() {
        let mut store = EntityStore::new();
        for day in [5, 12, 19] {
            store.add_match("Division 1", &fixture(d(2020, 1, day), "Riverside A", "Ipswich A", "P"));
        }
        let first = materialize(&mut store, 3);
        let second = materialize(&mut store, 3);
        assert_eq!(first, second);
        let p = store.find_player("P").unwrap();
        assert_eq!(store.player(p).nominations.intervals().len(), 1);
    }

    #[test]
    fn cross_division_counts_remember_first_team() {
        let mut store = EntityStore::new();
        store.add_match("Division 2", &fixture(d(2020, 1, 5), "Riverside B", "Ipswich B", "P"));
        store.add_match("Division 2", &fixture(d(2020, 1, 12), "Felixstowe B", "Ipswich B", "P"));
        store.add_match("Division 1", &fixture(d(2020, 1, 19), "Riverside A", "Ipswich A", "P"));
        materialize(&mut store, 3);

        let p = store.player(store.find_player("P").unwrap());
        let counts = count_cross_division_substitutions(&store, p, d(2020, 1, 31));
        let div2 = &counts["Division 2"];
        assert_eq!(div2.total(), 2);
        assert_eq!(div2.first_team, store.find_team("Riverside B").unwrap());
        assert_eq!(counts["Division 1"].total(), 1);

        let early = count_cross_division_substitutions(&store, p, d(2020, 1, 6));
        assert_eq!(early.len(), 1);
    }
}
