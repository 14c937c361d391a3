// src/output.rs
//
// Table, JSON and CSV rendering for the CLI.

use anyhow::{Context, Result};
use attendance_core::daily::MISSING_VALUE;
use attendance_core::{BreakdownRow, DailyRow, ReportRow};
use clap::ValueEnum;
use serde::Serialize;
use std::io::Write;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

pub enum Cell {
    Text(String),
    Number(String),
}

impl Cell {
    fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    fn number(value: impl ToString) -> Self {
        Cell::Number(value.to_string())
    }

    fn as_str(&self) -> &str {
        match self {
            Cell::Text(s) | Cell::Number(s) => s,
        }
    }
}

/// Rows the CLI knows how to lay out as columns.
pub trait Tabular: Serialize {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<Cell>;
}

impl Tabular for ReportRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Emp ID",
            "Name",
            "Present",
            "Absent",
            "Leave",
            "Week Off",
            "Remaining CL",
            "OD",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.emp_id),
            Cell::text(&self.name),
            Cell::number(self.present),
            Cell::number(self.absent),
            Cell::number(self.leave_days),
            Cell::number(self.week_off_days),
            Cell::number(self.remaining_credit),
            Cell::number(self.duty_days),
        ]
    }
}

impl Tabular for DailyRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Emp ID", "Name", "Phone", "Shift", "Week Off", "In", "Out", "Action",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.id),
            Cell::text(&self.name),
            Cell::text(&self.phone),
            Cell::text(&self.shift),
            Cell::text(&self.week_off),
            Cell::text(&self.in_time),
            Cell::text(&self.out_time),
            Cell::text(&self.action),
        ]
    }
}

impl Tabular for BreakdownRow {
    fn headers() -> &'static [&'static str] {
        &["Date", "Day", "Shift", "In Time", "Out Time", "Status"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(&self.date),
            Cell::text(&self.day),
            Cell::text(&self.shift),
            Cell::text(&self.in_time),
            Cell::text(&self.out_time),
            Cell::text(self.status.label()),
        ]
    }
}

/// Spreadsheets evaluate text cells that start with a formula character.
/// The `--` placeholder is left alone.
pub fn neutralise_formula(value: &str) -> String {
    if value == MISSING_VALUE {
        return value.to_string();
    }
    match value.chars().next() {
        Some('=' | '+' | '-' | '@') => format!("'{}", value),
        _ => value.to_string(),
    }
}

pub fn render<R: Tabular>(rows: &[R], format: OutputFormat, out: &mut impl Write) -> Result<()> {
    match format {
        OutputFormat::Table => render_table(rows, out),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows).context("Failed to write JSON output")?;
            writeln!(out)?;
            Ok(())
        }
        OutputFormat::Csv => render_csv(rows, out),
    }
}

fn render_table<R: Tabular>(rows: &[R], out: &mut impl Write) -> Result<()> {
    let headers = R::headers();
    let cells: Vec<Vec<Cell>> = rows.iter().map(Tabular::cells).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.as_str().chars().count());
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:<width$}", h, width = *w))
        .collect();
    writeln!(out, "{}", header_line.join("  ").trim_end())?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", rule.join("  "))?;

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| match cell {
                Cell::Number(s) => format!("{:>width$}", s, width = *w),
                Cell::Text(s) => format!("{:<width$}", s, width = *w),
            })
            .collect();
        writeln!(out, "{}", line.join("  ").trim_end())?;
    }
    Ok(())
}

fn render_csv<R: Tabular>(rows: &[R], out: &mut impl Write) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(R::headers())
        .context("Failed to write CSV header")?;
    for row in rows {
        let record: Vec<String> = row
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Text(s) => neutralise_formula(s),
                Cell::Number(s) => s.clone(),
            })
            .collect();
        writer
            .write_record(&record)
            .context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// `Page 2 of 5  [1] <2> [3] [4] [5]`
pub fn pager_line(page: usize, total: usize, visible: &[usize]) -> String {
    let pages: Vec<String> = visible
        .iter()
        .map(|&p| {
            if p == page {
                format!("<{}>", p)
            } else {
                format!("[{}]", p)
            }
        })
        .collect();
    format!("Page {} of {}  {}", page, total.max(1), pages.join(" "))
}
