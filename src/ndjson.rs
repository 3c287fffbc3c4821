//! NDJSON opportunity stream: one JSON line per tick that produced at
//! least one opportunity, carrying every opportunity record from that
//! tick.

use crate::model::Opportunity;
use anyhow::{Context, Result};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Serialize)]
struct TickRecord<'a> {
    opportunities: &'a [Opportunity],
}

pub struct NdjsonWriter {
    path: String,
    lock: Mutex<()>,
}

impl NdjsonWriter {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// Appends one line for this tick. No-op if `opportunities` is empty.
    pub async fn write_tick(&self, opportunities: &[Opportunity]) -> Result<()> {
        if opportunities.is_empty() {
            return Ok(());
        }

        let line = serde_json::to_string(&TickRecord { opportunities }).context("failed to serialize tick record")?;

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await.with_context(|| format!("failed to open ndjson file at {}", self.path))?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StrategyKind, Tier};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample() -> Opportunity {
        Opportunity {
            pair_key: "a1::b1".into(),
            strategy: StrategyKind::A,
            k_cost: dec!(48),
            p_cost: dec!(49),
            spread_cents: dec!(3),
            tier: Tier::Low,
            tradeable_units: 100,
            max_locked_profit_usd: dec!(3),
            detected_at: Utc::now(),
            hours_to_close: 4.0,
        }
    }

    #[tokio::test]
    async fn writes_one_line_per_nonempty_tick() {
        let dir = std::env::temp_dir().join(format!("xvenue-arb-ndjson-test-{}", uuid::Uuid::new_v4()));
        let path = dir.to_string_lossy().to_string();
        let writer = NdjsonWriter::new(path.clone());

        writer.write_tick(&[]).await.unwrap();
        assert!(!std::path::Path::new(&path).exists());

        writer.write_tick(&[sample()]).await.unwrap();
        writer.write_tick(&[sample(), sample()]).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let _ = std::fs::remove_file(&path);
    }
}
