use jobexec_core::outcome::{ActionReport, TaskOutcome};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    println!("{}", padded(headers.iter().copied(), &widths));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in rows {
        println!("{}", padded(row.iter().map(String::as_str), &widths));
    }
}

fn padded<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(c, &w)| format!("{c:w$}"))
        .collect::<Vec<_>>()
        .join("  ")
}

fn outcome_label(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Succeeded => "succeeded".into(),
        TaskOutcome::TimedOut { max_poll_seconds } => format!("timed out after {max_poll_seconds}s"),
        TaskOutcome::Failed {
            infrastructure: true,
            ..
        } => "error".into(),
        TaskOutcome::Failed { .. } => "failed".into(),
        TaskOutcome::Denied { .. } => "denied".into(),
    }
}

pub fn print_report(report: &ActionReport) {
    println!(
        "Action '{}': status {}, result {}",
        report.action,
        report.status(),
        report.result()
    );
    if !report.tasks.is_empty() {
        println!();
        let rows: Vec<Vec<String>> = report
            .tasks
            .iter()
            .map(|t| {
                vec![
                    t.task.clone(),
                    t.job.to_string(),
                    t.namespace.clone(),
                    outcome_label(&t.outcome),
                ]
            })
            .collect();
        print_table(&["TASK", "JOB", "NAMESPACE", "OUTCOME"], &rows);
    }
    println!();
    println!("{}", report.message());
}
