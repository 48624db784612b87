use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::{Duration, NaiveDate};
use league_check::config::LeagueConfig;
use league_check::feeds::parse_lms_matches_json;
use league_check::grades::GradeRecord;
use league_check::ledger;
use league_check::rules;
use league_check::store::{EntityStore, RawBoard, RawMatch};

const DIVISIONS: [&str; 3] = ["Division 1", "Division 2", "Division 3"];
const CLUBS: [&str; 8] = [
    "Riverside", "Ipswich", "Felixstowe", "Hadleigh", "Stowmarket", "Sudbury", "Woodbridge", "Bury",
];
const SUFFIX: [&str; 3] = ["A", "B", "C"];
const BOARDS: usize = 5;

fn player_name(club: usize, division: usize, board: usize, week: usize) -> String {
    // Every fourth week the lower boards borrow from the team below.
    let squad = if week % 4 == 0 && board >= 3 {
        (division + 1).min(DIVISIONS.len() - 1)
    } else {
        division
    };
    format!("{} {}{}", CLUBS[club], SUFFIX[squad], board)
}

fn synthetic_season(weeks: usize) -> EntityStore {
    let mut store = EntityStore::new();
    let start = NaiveDate::from_ymd_opt(2019, 9, 10).unwrap();
    for (div_idx, division) in DIVISIONS.iter().enumerate() {
        let mut raws = Vec::new();
        for week in 0..weeks {
            let date = start + Duration::days(7 * week as i64);
            for pair in 0..CLUBS.len() / 2 {
                let home = (pair + week) % CLUBS.len();
                let away = (home + CLUBS.len() / 2) % CLUBS.len();
                let side = |club: usize| -> Vec<RawBoard> {
                    (0..BOARDS)
                        .map(|board| RawBoard {
                            name: player_name(club, div_idx, board, week),
                            grade: None,
                        })
                        .collect()
                };
                raws.push(RawMatch {
                    date,
                    home_team: format!("{} {}", CLUBS[home], SUFFIX[div_idx]),
                    away_team: format!("{} {}", CLUBS[away], SUFFIX[div_idx]),
                    home: side(home),
                    away: side(away),
                });
            }
        }
        store.add_matches(division, &raws);
    }

    let names: Vec<String> = store.players().iter().map(|p| p.name.clone()).collect();
    for (idx, name) in names.iter().enumerate() {
        store.add_grade_history(
            name,
            vec![GradeRecord {
                effective: NaiveDate::from_ymd_opt(2019, 8, 1).unwrap(),
                grade: 200 - (idx % 90) as i32,
            }],
        );
    }
    store
}

fn config() -> LeagueConfig {
    LeagueConfig {
        divisions: DIVISIONS.iter().map(|d| d.to_string()).collect(),
        ..LeagueConfig::default()
    }
}

fn bench_materialize(c: &mut Criterion) {
    let mut store = synthetic_season(20);
    c.bench_function("ledger_materialize", |b| {
        b.iter(|| {
            let summary = ledger::materialize(black_box(&mut store), 3);
            black_box(summary.substitutions);
        })
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let mut store = synthetic_season(20);
    let cfg = config().with_schedule_caps(&store);
    ledger::materialize(&mut store, cfg.main_team_threshold);
    c.bench_function("rules_evaluate", |b| {
        b.iter(|| {
            let violations = rules::evaluate(black_box(&store), &cfg);
            black_box(violations.len());
        })
    });
}

fn bench_lms_parse(c: &mut Criterion) {
    c.bench_function("lms_matches_parse", |b| {
        b.iter(|| {
            let rows = parse_lms_matches_json(black_box(LMS_JSON)).unwrap();
            black_box(rows.len());
        })
    });
}

criterion_group!(perf, bench_materialize, bench_evaluate, bench_lms_parse);
criterion_main!(perf);

static LMS_JSON: &str = include_str!("../tests/fixtures/lms_division1.json");
