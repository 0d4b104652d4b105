//! Final report rendering.

use replica_audit_core::{error_chain, AuditReport, Row, RowMismatch};
use std::fmt::Write;

/// Render the report as JSON.
pub fn render_json(report: &AuditReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&report.summary())
}

/// Render the report as plain text for a terminal.
pub fn render_text(report: &AuditReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_text(&mut out, report);
    out
}

fn write_text(out: &mut String, report: &AuditReport) -> std::fmt::Result {
    writeln!(out, "Table: {}", report.table)?;
    writeln!(
        out,
        "Sampled rows: OK: {}, missing: {}",
        report.sampling.checked, report.sampling.missing
    )?;
    match &report.recency {
        Some(recency) => writeln!(
            out,
            "Last {} rows: OK: {}, missing: {}",
            recency.requested, recency.checked, recency.missing
        )?,
        None => writeln!(out, "Last rows: not checked")?,
    }
    match &report.lag {
        Some(lag) => writeln!(out, "Lag: {lag}")?,
        None => writeln!(out, "Lag: not estimated")?,
    }
    writeln!(out, "Duration: {:.3}s", report.duration.as_secs_f64())?;

    match report.failure() {
        None => writeln!(out, "Result: PASSED")?,
        Some((stage, cause)) => {
            writeln!(out, "Result: FAILED while {stage:?}")?;
            writeln!(out, "Cause: {}", error_chain(cause))?;
            if let Some(mismatch) = cause.mismatch() {
                write_mismatch(out, mismatch)?;
            }
        }
    }
    Ok(())
}

fn write_mismatch(out: &mut String, mismatch: &RowMismatch) -> std::fmt::Result {
    let show = |row: &Option<Row>| match row {
        Some(row) => row.to_string(),
        None => "<no row>".to_string(),
    };
    writeln!(out, "  primary:    {}", show(&mismatch.primary))?;
    writeln!(out, "  downstream: {}", show(&mismatch.downstream))?;
    for diff in &mismatch.diffs {
        writeln!(out, "  - {diff}")?;
    }
    Ok(())
}
