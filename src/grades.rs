use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

pub type Grade = i32;

/// The LMS reports this grade for boards that were defaulted or not played.
pub const UNPLAYED_GRADE: &str = "000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub effective: NaiveDate,
    pub grade: Grade,
}

/// Grade snapshots for one player, kept sorted by effective date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradeHistory {
    records: Vec<GradeRecord>,
}

impl GradeHistory {
    pub fn new(mut records: Vec<GradeRecord>) -> Self {
        records.sort_by_key(|r| r.effective);
        // Two snapshots on the same day: the later row wins.
        records.reverse();
        records.dedup_by_key(|r| r.effective);
        records.reverse();
        Self { records }
    }

    pub fn records(&self) -> &[GradeRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn grade_on_date(&self, date: NaiveDate) -> Option<Grade> {
        let idx = self.records.partition_point(|r| r.effective <= date);
        idx.checked_sub(1).map(|i| self.records[i].grade)
    }
}

/// Parses grades such as `180`, `180A` or ` 095B `, keeping the leading digits.
pub fn parse_grade(raw: &str) -> Result<Grade, FeedError> {
    let trimmed = raw.trim();
    let digits: String = trimmed
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse::<Grade>()
        .map_err(|_| FeedError::InvalidGrade(raw.to_string()))
}

pub fn is_unplayed_grade(raw: &str) -> bool {
    raw.trim() == UNPLAYED_GRADE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn grade_on_date_uses_latest_effective_snapshot() {
        let history = GradeHistory::new(vec![
            GradeRecord {
                effective: d(2020, 1, 31),
                grade: 172,
            },
            GradeRecord {
                effective: d(2019, 8, 1),
                grade: 165,
            },
        ]);
        assert_eq!(history.grade_on_date(d(2019, 7, 31)), None);
        assert_eq!(history.grade_on_date(d(2019, 8, 1)), Some(165));
        assert_eq!(history.grade_on_date(d(2020, 1, 30)), Some(165));
        assert_eq!(history.grade_on_date(d(2020, 1, 31)), Some(172));
        assert_eq!(history.grade_on_date(d(2021, 5, 1)), Some(172));
    }

    #[test]
    fn same_day_snapshots_keep_the_last_one() {
        let history = GradeHistory::new(vec![
            GradeRecord {
                effective: d(2019, 8, 1),
                grade: 150,
            },
            GradeRecord {
                effective: d(2019, 8, 1),
                grade: 155,
            },
        ]);
        assert_eq!(history.records().len(), 1);
        assert_eq!(history.grade_on_date(d(2019, 9, 1)), Some(155));
    }

    #[test]
    fn parse_grade_keeps_leading_number() {
        assert_eq!(parse_grade("180A").unwrap(), 180);
        assert_eq!(parse_grade(" 095 ").unwrap(), 95);
        assert_eq!(parse_grade("(142)").unwrap(), 142);
        assert!(matches!(parse_grade("ungraded"), Err(FeedError::InvalidGrade(_))));
        assert!(parse_grade("").is_err());
    }

    #[test]
    fn unplayed_marker() {
        assert!(is_unplayed_grade("000"));
        assert!(is_unplayed_grade(" 000 "));
        assert!(!is_unplayed_grade("100"));
    }
}
