//! Aggregates over the efficiency dataset, as shown on the dashboards.

use std::collections::BTreeMap;

use serde::Serialize;

use effitrack_core::{Column, EfficiencyDataset, EfficiencyRecord};

/// Totals and averages over a set of records.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    pub entries: usize,
    pub total_hours_saved: f64,
    pub total_original_hours: f64,
    pub total_lines_saved: f64,
    /// Mean of `gained / original * 100` over rows with a positive estimate.
    pub avg_efficiency_pct: f64,
    /// Percentage of rows where the AI tool was used.
    pub tool_usage_pct: f64,
}

#[derive(Default)]
struct Accumulator {
    entries: usize,
    hours_saved: f64,
    original_hours: f64,
    lines_saved: f64,
    efficiency_sum: f64,
    efficiency_rows: usize,
    tool_rows: usize,
}

impl Accumulator {
    fn add(&mut self, record: &EfficiencyRecord) {
        let gained = record.number(Column::EfficiencyGainedHours);
        let original = record.number(Column::OriginalEstimateHours);
        self.entries += 1;
        self.hours_saved += gained;
        self.original_hours += original;
        self.lines_saved += record.number(Column::LinesOfCodeSaved);
        if original > 0.0 {
            self.efficiency_sum += gained / original * 100.0;
            self.efficiency_rows += 1;
        }
        if record.flag(Column::CopilotUsed) {
            self.tool_rows += 1;
        }
    }

    fn finish(self) -> Summary {
        Summary {
            entries: self.entries,
            total_hours_saved: self.hours_saved,
            total_original_hours: self.original_hours,
            total_lines_saved: self.lines_saved,
            avg_efficiency_pct: percentage_mean(self.efficiency_sum, self.efficiency_rows),
            tool_usage_pct: percentage_mean(self.tool_rows as f64 * 100.0, self.entries),
        }
    }
}

fn percentage_mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Summarize every record in the dataset.
pub fn summarize(dataset: &EfficiencyDataset) -> Summary {
    let mut acc = Accumulator::default();
    dataset.iter().for_each(|record| acc.add(record));
    acc.finish()
}

/// One summary per team name.
pub fn by_team(dataset: &EfficiencyDataset) -> BTreeMap<String, Summary> {
    group_by(dataset, Column::TeamName)
}

/// One summary per developer name.
pub fn by_developer(dataset: &EfficiencyDataset) -> BTreeMap<String, Summary> {
    group_by(dataset, Column::DeveloperName)
}

fn group_by(dataset: &EfficiencyDataset, column: Column) -> BTreeMap<String, Summary> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for record in dataset {
        groups.entry(record.text(column)).or_default().add(record);
    }
    groups
        .into_iter()
        .map(|(name, acc)| (name, acc.finish()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(team: &str, dev: &str, original: f64, gained: f64, tool: bool) -> EfficiencyRecord {
        EfficiencyRecord::new()
            .with(Column::TeamName, team)
            .with(Column::DeveloperName, dev)
            .with(Column::OriginalEstimateHours, original)
            .with(Column::EfficiencyGainedHours, gained)
            .with(Column::LinesOfCodeSaved, 10.0)
            .with(Column::CopilotUsed, tool)
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&EfficiencyDataset::new()), Summary::default());
    }

    #[test]
    fn test_summarize() {
        let dataset: EfficiencyDataset = vec![
            record("QA", "Alice", 8.0, 2.0, true),
            record("QA", "Bob", 4.0, 2.0, false),
            record("Data", "Alice", 0.0, 1.0, true),
            record("Data", "Eve", 10.0, 0.0, true),
        ]
        .into();
        let summary = summarize(&dataset);
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.total_hours_saved, 5.0);
        assert_eq!(summary.total_original_hours, 22.0);
        assert_eq!(summary.total_lines_saved, 40.0);
        // (25 + 50 + 0) / 3; the zero-estimate row is skipped.
        assert_eq!(summary.avg_efficiency_pct, 25.0);
        assert_eq!(summary.tool_usage_pct, 75.0);

        let teams = by_team(&dataset);
        assert_eq!(teams.keys().collect::<Vec<_>>(), vec!["Data", "QA"]);
        assert_eq!(teams["QA"].avg_efficiency_pct, 37.5);
        assert_eq!(teams["QA"].tool_usage_pct, 50.0);

        let developers = by_developer(&dataset);
        assert_eq!(developers["Alice"].entries, 2);
        assert_eq!(developers["Alice"].total_hours_saved, 3.0);
    }
}
