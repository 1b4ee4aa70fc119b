#![forbid(unsafe_code)]

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color as TableColor, ContentArrangement, Table};
use console::style;

use forge_core::{FeatureReport, ProtocolEpoch};
use forge_exec::{RunReport, Verdict};

fn joined<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    let values: Vec<String> = items.into_iter().map(|v| v.to_string()).collect();
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.into_iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    table
}

pub fn feature_table(report: &FeatureReport) -> Table {
    let mut table = table(vec!["Capability", "Value"]);
    table.add_row(vec!["Target".to_string(), format!("{} ({})", report.target(), report.direction())]);
    table.add_row(vec!["Versions".to_string(), joined(report.versions())]);
    for epoch in ProtocolEpoch::ALL {
        table.add_row(vec![format!("{} suites", epoch), joined(report.suites(epoch))]);
        table.add_row(vec![format!("{} groups", epoch), joined(report.groups(epoch))]);
    }
    table.add_row(vec!["Key share groups".to_string(), joined(report.key_share_groups())]);
    table.add_row(vec!["Signature schemes".to_string(), joined(report.signature_schemes())]);
    table.add_row(vec![
        "Extensions".to_string(),
        joined(report.extensions().iter().map(|e| format!("{:?}", e))),
    ]);
    table.add_row(vec![
        "Minimum key sizes".to_string(),
        joined(report.min_key_sizes().iter().map(|(k, s)| format!("{} {}", k, s))),
    ]);
    table.add_row(vec!["Record fragmentation".to_string(), report.supports_record_fragmentation().to_string()]);
    table
}

fn verdict_cell(verdict: Verdict) -> Cell {
    let color = match verdict {
        Verdict::Succeeded => TableColor::Green,
        Verdict::Failed => TableColor::Red,
        Verdict::Disabled => TableColor::Yellow,
        Verdict::Unstarted | Verdict::Running => TableColor::Grey,
    };
    Cell::new(verdict).fg(color)
}

pub fn results_table(run: &RunReport) -> Table {
    let mut table = table(vec!["Test", "Verdict", "Combinations", "Detail"]);
    for test in &run.tests {
        let detail = test
            .cause
            .clone()
            .or_else(|| test.disabled_reason.clone())
            .unwrap_or_else(|| test.description.clone());
        table.add_row(vec![
            Cell::new(&test.id),
            verdict_cell(test.verdict),
            Cell::new(test.outcomes.len()),
            Cell::new(detail),
        ]);
    }
    table
}

pub fn volume_table(run: &RunReport) -> Table {
    let mut table = table(vec!["Epoch", "Direction", "Planned", "Executed"]);
    for volume in &run.summary.volumes {
        table.add_row(vec![
            volume.epoch.to_string(),
            volume.direction.to_string(),
            volume.planned.to_string(),
            volume.executed.to_string(),
        ]);
    }
    table
}

/// One line verdict totals.
pub fn summary_line(run: &RunReport) -> String {
    let s = &run.summary;
    let elapsed = run.finished_at - run.started_at;
    let mut line = format!(
        "{} succeeded, {} failed, {} disabled in {:.1}s",
        style(s.succeeded).green().bold(),
        style(s.failed).red().bold(),
        style(s.disabled).yellow(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    if s.engine_failures > 0 {
        line.push_str(&format!(" ({} engine failures)", style(s.engine_failures).red()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{CipherSuite, Direction};

    #[test]
    fn feature_table_lists_suites() {
        let report = FeatureReport::builder("127.0.0.1:4433", Direction::Server)
            .suite(ProtocolEpoch::Modern, CipherSuite::Aes128GcmSha256)
            .build();
        let rendered = feature_table(&report).to_string();
        assert!(rendered.contains(&CipherSuite::Aes128GcmSha256.to_string()));
        assert!(rendered.contains("127.0.0.1:4433"));
    }

    #[test]
    fn empty_lists_render_as_dash() {
        assert_eq!(joined(Vec::<String>::new()), "-");
        assert_eq!(joined(["a", "b"]), "a, b");
    }
}
