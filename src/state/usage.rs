//! Rolling daily cost and token usage.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::TokenUsage;

use super::{read_json, write_json_atomic, StateError};

/// One day's aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Day key, local to UTC.
    pub date: NaiveDate,

    pub total_cost_usd: f64,

    pub input_tokens: u64,

    pub output_tokens: u64,

    pub cache_read_tokens: u64,

    pub cache_created_tokens: u64,
}

impl UsageRecord {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_cost_usd: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            cache_read_tokens: 0,
            cache_created_tokens: 0,
        }
    }
}

/// The usage file: one record per day, rolled up on each agent call.
pub struct UsageStore {
    path: PathBuf,
}

impl UsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<UsageRecord>, StateError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    /// Fold one turn's cost and tokens into today's record.
    pub fn record(&self, cost_usd: f64, usage: &TokenUsage) -> Result<(), StateError> {
        self.record_on(Utc::now().date_naive(), cost_usd, usage)
    }

    fn record_on(
        &self,
        date: NaiveDate,
        cost_usd: f64,
        usage: &TokenUsage,
    ) -> Result<(), StateError> {
        let mut records = self.load()?;
        let record = match records.iter_mut().find(|r| r.date == date) {
            Some(record) => record,
            None => {
                records.push(UsageRecord::new(date));
                records.last_mut().expect("just pushed")
            }
        };
        record.total_cost_usd += cost_usd;
        record.input_tokens += usage.input_tokens;
        record.output_tokens += usage.output_tokens;
        record.cache_read_tokens += usage.cache_read_input_tokens;
        record.cache_created_tokens += usage.cache_creation_input_tokens;
        write_json_atomic(&self.path, &records)
    }

    /// Today's spend, for the daily budget guard.
    pub fn spent_today(&self) -> Result<f64, StateError> {
        let today = Utc::now().date_naive();
        Ok(self
            .load()?
            .iter()
            .find(|r| r.date == today)
            .map(|r| r.total_cost_usd)
            .unwrap_or(0.0))
    }

    /// Lifetime totals across all days.
    pub fn totals(&self) -> Result<(f64, TokenUsage), StateError> {
        let records = self.load()?;
        let mut cost = 0.0;
        let mut usage = TokenUsage::default();
        for record in &records {
            cost += record.total_cost_usd;
            usage.input_tokens += record.input_tokens;
            usage.output_tokens += record.output_tokens;
            usage.cache_read_input_tokens += record.cache_read_tokens;
            usage.cache_creation_input_tokens += record.cache_created_tokens;
        }
        Ok((cost, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_day_rolls_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::new(dir.path().join("usage.json"));
        let day = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

        store.record_on(day, 0.10, &usage(100, 50)).unwrap();
        store.record_on(day, 0.15, &usage(200, 80)).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 1);
        assert!((records[0].total_cost_usd - 0.25).abs() < 1e-9);
        assert_eq!(records[0].input_tokens, 300);
        assert_eq!(records[0].output_tokens, 130);
    }

    #[test]
    fn test_different_days_get_separate_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::new(dir.path().join("usage.json"));
        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();

        store.record_on(monday, 0.10, &usage(10, 5)).unwrap();
        store.record_on(tuesday, 0.20, &usage(20, 10)).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_totals_sum_all_days() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::new(dir.path().join("usage.json"));
        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
        store.record_on(monday, 0.10, &usage(10, 5)).unwrap();
        store.record_on(tuesday, 0.20, &usage(20, 10)).unwrap();

        let (cost, total) = store.totals().unwrap();
        assert!((cost - 0.30).abs() < 1e-9);
        assert_eq!(total.input_tokens, 30);
    }
}
