use chrono::NaiveDate;
use serde::Serialize;

use crate::store::TeamId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NominationSource {
    /// From the nomination feed.
    Explicit,
    /// Inferred by the substitution ledger from repeated appearances.
    Inferred,
}

/// Half-open `[start, end)`; `end == None` means still active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NominationInterval {
    pub team: TeamId,
    pub division: String,
    pub club: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub source: NominationSource,
}

impl NominationInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && self.end.is_none_or(|end| date < end)
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// Nomination intervals for one player, ordered by start date.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NominationTimeline {
    intervals: Vec<NominationInterval>,
}

impl NominationTimeline {
    pub fn intervals(&self) -> &[NominationInterval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_nominated(&self, team: TeamId, date: NaiveDate) -> bool {
        self.intervals
            .iter()
            .any(|n| n.team == team && n.contains(date))
    }

    pub fn active_nominations(
        &self,
        date: NaiveDate,
        division: Option<&str>,
    ) -> Vec<&NominationInterval> {
        self.intervals
            .iter()
            .filter(|n| n.contains(date))
            .filter(|n| division.is_none_or(|d| n.division == d))
            .collect()
    }

    pub fn has_active_in_division(&self, date: NaiveDate, division: &str) -> bool {
        self.intervals
            .iter()
            .any(|n| n.division == division && n.contains(date))
    }

    /// Teams in one club are spread over different divisions, so at most one matches.
    pub fn active_nomination_for_club(
        &self,
        date: NaiveDate,
        club: &str,
    ) -> Option<&NominationInterval> {
        self.intervals
            .iter()
            .filter(|n| n.club == club && n.contains(date))
            .max_by_key(|n| n.start)
    }

    /// Latest end date in `division` that falls on or before `date`.
    pub fn last_release_in_division(&self, date: NaiveDate, division: &str) -> Option<NaiveDate> {
        self.intervals
            .iter()
            .filter(|n| n.division == division)
            .filter_map(|n| n.end)
            .filter(|end| *end <= date)
            .max()
    }

    /// Applies `nominated = true` from the feed. Returns false if the team was already open.
    ///
    /// Any other open nomination for the same club ends on `date`.
    pub fn open_explicit(
        &mut self,
        team: TeamId,
        division: &str,
        club: &str,
        date: NaiveDate,
    ) -> bool {
        if self.intervals.iter().any(|n| n.team == team && n.is_open()) {
            return false;
        }
        for n in self
            .intervals
            .iter_mut()
            .filter(|n| n.club == club && n.is_open())
        {
            n.end = Some(date.max(n.start));
        }
        self.insert(NominationInterval {
            team,
            division: division.to_string(),
            club: club.to_string(),
            start: date,
            end: None,
            source: NominationSource::Explicit,
        });
        true
    }

    /// Applies `nominated = false`: closes the most recent open interval for `club`.
    pub fn close_for_club(&mut self, club: &str, date: NaiveDate) -> bool {
        let latest = self
            .intervals
            .iter_mut()
            .filter(|n| n.club == club && n.is_open())
            .max_by_key(|n| n.start);
        match latest {
            Some(n) => {
                n.end = Some(date.max(n.start));
                true
            }
            None => false,
        }
    }

    /// Inserts an inferred nomination starting at `start`.
    ///
    /// Ends where the next later nomination starts, for any team in any
    /// division; open if there is none.
    pub fn insert_inferred(
        &mut self,
        team: TeamId,
        division: &str,
        club: &str,
        start: NaiveDate,
    ) -> &NominationInterval {
        let end = self
            .intervals
            .iter()
            .filter(|n| n.start > start)
            .map(|n| n.start)
            .min();
        let idx = self.insert(NominationInterval {
            team,
            division: division.to_string(),
            club: club.to_string(),
            start,
            end,
            source: NominationSource::Inferred,
        });
        &self.intervals[idx]
    }

    pub fn clear_inferred(&mut self) {
        self.intervals
            .retain(|n| n.source == NominationSource::Explicit);
    }

    fn insert(&mut self, interval: NominationInterval) -> usize {
        let idx = self
            .intervals
            .partition_point(|n| n.start <= interval.start);
        self.intervals.insert(idx, interval);
        idx
    }
}
