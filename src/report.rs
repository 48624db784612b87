use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::ledger::LedgerSummary;
use crate::nomination::NominationSource;
use crate::rules::{Violation, ViolationContext, ViolationKind};
use crate::store::EntityStore;

pub struct ExportReport {
    pub violations: usize,
    pub nominations: usize,
}

pub fn tally(violations: &[Violation]) -> BTreeMap<ViolationKind, usize> {
    let mut out = BTreeMap::new();
    for v in violations {
        *out.entry(v.kind).or_insert(0) += 1;
    }
    out
}

pub fn render_summary(ledger: &LedgerSummary, violations: &[Violation]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Appearances: {}  substitutions: {}  inferred main teams: {}",
        ledger.appearances, ledger.substitutions, ledger.inferred_nominations
    );
    let _ = writeln!(out, "Violations: {}", violations.len());
    for (kind, count) in tally(violations) {
        let _ = writeln!(out, "  {kind}: {count}");
    }
    out
}

pub fn write_json(path: &Path, violations: &[Violation]) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let json = serde_json::to_string_pretty(violations).context("serialize violations")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

pub fn export_xlsx(path: &Path, store: &EntityStore, violations: &[Violation]) -> Result<ExportReport> {
    let mut violation_rows = vec![vec![
        "Type".to_string(),
        "Player".to_string(),
        "Team".to_string(),
        "Home".to_string(),
        "Away".to_string(),
        "Date".to_string(),
    ]];
    violation_rows.extend(violations.iter().map(violation_row));

    let mut summary_rows = vec![vec!["Type".to_string(), "Count".to_string()]];
    summary_rows.extend(
        tally(violations)
            .into_iter()
            .map(|(kind, count)| vec![kind.label().to_string(), count.to_string()]),
    );

    let mut nomination_rows = vec![vec![
        "Player".to_string(),
        "Team".to_string(),
        "Division".to_string(),
        "From".to_string(),
        "Until".to_string(),
        "Source".to_string(),
    ]];
    for player in store.players() {
        for n in player.nominations.intervals() {
            nomination_rows.push(vec![
                player.name.clone(),
                store.team(n.team).name.clone(),
                n.division.clone(),
                n.start.to_string(),
                n.end.map(|d| d.to_string()).unwrap_or_default(),
                match n.source {
                    NominationSource::Explicit => "nominated".to_string(),
                    NominationSource::Inferred => "inferred".to_string(),
                },
            ]);
        }
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Violations")?;
        write_rows(sheet, &violation_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Nominations")?;
        write_rows(sheet, &nomination_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        violations: violation_rows.len().saturating_sub(1),
        nominations: nomination_rows.len().saturating_sub(1),
    })
}

fn violation_row(v: &Violation) -> Vec<String> {
    match &v.context {
        ViolationContext::Match {
            home,
            away,
            date,
            team,
        } => vec![
            v.kind.label().to_string(),
            v.player.clone(),
            team.clone(),
            home.clone(),
            away.clone(),
            date.to_string(),
        ],
        ViolationContext::Team { team } => vec![
            v.kind.label().to_string(),
            v.player.clone(),
            team.clone(),
            String::new(),
            String::new(),
            String::new(),
        ],
    }
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
