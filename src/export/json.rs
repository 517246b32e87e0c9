use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::FacultyRecord;
use crate::stats::AggregateStatistics;

#[derive(Serialize)]
struct Document<'a> {
    generated_at: DateTime<Utc>,
    statistics: &'a AggregateStatistics,
    faculty: &'a [FacultyRecord],
}

pub fn write(path: &Path, records: &[FacultyRecord], stats: &AggregateStatistics) -> Result<()> {
    let doc = Document {
        generated_at: Utc::now(),
        statistics: stats,
        faculty: records,
    };
    let json = serde_json::to_string_pretty(&doc)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample;

    #[test]
    fn document_shape() {
        let path = std::env::temp_dir().join(format!("{}_citations.json", std::process::id()));
        let records = sample();
        let stats = crate::stats::aggregate(&records);
        write(&path, &records, &stats).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["generated_at"].is_string());
        assert_eq!(value["statistics"]["total"], 6);
        assert_eq!(value["faculty"].as_array().unwrap().len(), 2);
        assert_eq!(
            value["faculty"][0]["citations"]["international_articles"][0]["year"],
            2001
        );
        std::fs::remove_file(&path).ok();
    }
}
