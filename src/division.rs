use std::cmp::Ordering;
use std::collections::HashMap;

/// Total order over the league's divisions. A higher rank is a stronger division.
#[derive(Debug, Clone, Default)]
pub struct DivisionLadder {
    ranks: HashMap<String, usize>,
    lowest: Option<String>,
}

impl DivisionLadder {
    pub fn from_strongest_first<S: AsRef<str>>(names: &[S]) -> Self {
        let top = names.len().saturating_sub(1);
        let ranks = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_ref().to_string(), top - idx))
            .collect();
        Self {
            ranks,
            lowest: names.last().map(|n| n.as_ref().to_string()),
        }
    }

    pub fn rank(&self, division: &str) -> Option<usize> {
        self.ranks.get(division).copied()
    }

    /// `Greater` means `a` is the stronger division. Unknown divisions are incomparable.
    pub fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        Some(self.rank(a)?.cmp(&self.rank(b)?))
    }

    pub fn lowest(&self) -> Option<&str> {
        self.lowest.as_deref()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Club a team belongs to: the name minus a trailing single-letter team suffix.
///
/// "Riverside A" -> "Riverside", "Bury St Edmunds E" -> "Bury St Edmunds".
/// Names without such a suffix are their own club.
pub fn club_from_team_name(team: &str) -> String {
    let trimmed = team.trim();
    if let Some((prefix, suffix)) = trimmed.rsplit_once(char::is_whitespace) {
        let mut chars = suffix.chars();
        if let (Some(c), None) = (chars.next(), chars.next())
            && c.is_ascii_alphabetic()
            && !prefix.trim().is_empty()
        {
            return prefix.trim_end().to_string();
        }
    }
    trimmed.to_string()
}
