//! SQLite-backed per-item store. An item with no `cefr_level` is unprocessed
//! and is what the next classification run picks up.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{ClassificationRequest, Label, LabelVocabulary};
use crate::util::{ensure_directory, now_utc_string};

pub struct ItemStore {
    connection: Connection,
}

/// Fields written back after an item is classified.
#[derive(Debug, Clone)]
pub struct ItemUpdate<'a> {
    pub label: Label,
    pub rationale: &'a str,
    pub grammar: &'a [String],
    pub translation: Option<&'a str>,
    pub model: &'a str,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: u64,
    pub already_present: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub counts: Vec<(Label, u64)>,
    pub unrecognized: u64,
    pub unprocessed: u64,
}

impl LabelCounts {
    pub fn count(&self, label: Label) -> u64 {
        self.counts
            .iter()
            .find(|(candidate, _)| *candidate == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn labelled_total(&self) -> u64 {
        self.counts.iter().map(|(_, count)| count).sum::<u64>() + self.unrecognized
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledJob {
    pub external_job_id: String,
    pub status: String,
    pub output_file_id: Option<String>,
    pub applied_count: u64,
    pub unparseable_count: u64,
}

impl ItemStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    /// Inserts new items; ids already in the store keep their existing row.
    pub fn import_items(&mut self, items: &[ClassificationRequest]) -> Result<ImportSummary> {
        let tx = self
            .connection
            .transaction()
            .context("failed to start import transaction")?;
        let mut summary = ImportSummary::default();
        {
            let mut statement = tx
                .prepare("INSERT OR IGNORE INTO items (item_id, text) VALUES (?1, ?2)")
                .context("failed to prepare item insert")?;
            for item in items {
                let changed = statement
                    .execute(params![item.id, item.text])
                    .with_context(|| format!("failed to insert item {}", item.id))?;
                if changed == 0 {
                    summary.already_present += 1;
                } else {
                    summary.inserted += 1;
                }
            }
        }
        tx.commit().context("failed to commit import")?;
        Ok(summary)
    }

    /// Unlabelled items in id order. `None` means no limit.
    pub fn select_unprocessed(&self, limit: Option<usize>) -> Result<Vec<ClassificationRequest>> {
        let limit = limit.map(|value| value as i64).unwrap_or(-1);
        let mut statement = self
            .connection
            .prepare(
                "SELECT item_id, text FROM items
                 WHERE cefr_level IS NULL
                 ORDER BY item_id
                 LIMIT ?1",
            )
            .context("failed to prepare unprocessed query")?;
        let rows = statement
            .query_map(params![limit], |row| {
                Ok(ClassificationRequest {
                    id: row.get(0)?,
                    text: row.get(1)?,
                })
            })
            .context("failed to query unprocessed items")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read unprocessed items")?;
        Ok(rows)
    }

    pub fn count_unprocessed(&self) -> Result<u64> {
        let count: i64 = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM items WHERE cefr_level IS NULL",
                [],
                |row| row.get(0),
            )
            .context("failed to count unprocessed items")?;
        Ok(count.max(0) as u64)
    }

    /// Returns false when no item has this id.
    pub fn record_result(&self, item_id: &str, update: &ItemUpdate<'_>) -> Result<bool> {
        record_result_on(&self.connection, item_id, update)
    }

    /// Clears every AI-derived field so all items become unprocessed again.
    pub fn reset_ratings(&self) -> Result<u64> {
        let changed = self
            .connection
            .execute(
                "UPDATE items
                 SET translation = NULL, cefr_level = NULL, cefr_value = NULL,
                     reasoning = NULL, grammar_json = NULL, ai_model = NULL, updated_at = NULL
                 WHERE cefr_level IS NOT NULL OR translation IS NOT NULL",
                [],
            )
            .context("failed to reset ratings")?;
        Ok(changed as u64)
    }

    /// Per-label counts in the fixed vocabulary order, UNKNOWN last.
    pub fn label_counts(&self) -> Result<LabelCounts> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT cefr_level, COUNT(*) FROM items
                 WHERE cefr_level IS NOT NULL
                 GROUP BY cefr_level",
            )
            .context("failed to prepare label count query")?;
        let grouped = statement
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .context("failed to query label counts")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read label counts")?;

        let mut counts: Vec<(Label, u64)> = LabelVocabulary::with_unknown()
            .labels()
            .iter()
            .map(|label| (*label, 0))
            .collect();
        let mut unrecognized = 0u64;

        for (raw, count) in grouped {
            let count = count.max(0) as u64;
            let slot = Label::parse_any(&raw)
                .and_then(|label| counts.iter().position(|(candidate, _)| *candidate == label));
            match slot {
                Some(position) => counts[position].1 += count,
                None => {
                    warn!(label = %raw, count, "stored label outside vocabulary");
                    unrecognized += count;
                }
            }
        }

        Ok(LabelCounts {
            counts,
            unrecognized,
            unprocessed: self.count_unprocessed()?,
        })
    }

    pub fn is_job_reconciled(&self, external_job_id: &str) -> Result<bool> {
        let found: Option<String> = self
            .connection
            .query_row(
                "SELECT external_job_id FROM reconciled_jobs WHERE external_job_id = ?1",
                params![external_job_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query reconciled jobs")?;
        Ok(found.is_some())
    }

    /// Writes a finished job's results and marks the job reconciled in one
    /// transaction, so a job's output is applied at most once.
    pub fn apply_job_results(
        &mut self,
        job: &ReconciledJob,
        updates: &[(String, ItemUpdate<'_>)],
    ) -> Result<u64> {
        let tx = self
            .connection
            .transaction()
            .context("failed to start reconcile transaction")?;

        let mut applied = 0u64;
        for (item_id, update) in updates {
            if record_result_on(&tx, item_id, update)? {
                applied += 1;
            } else {
                warn!(item_id = %item_id, job_id = %job.external_job_id, "output references unknown item");
            }
        }

        tx.execute(
            "INSERT INTO reconciled_jobs
               (external_job_id, status, output_file_id, applied_count, unparseable_count, reconciled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.external_job_id,
                job.status,
                job.output_file_id,
                applied as i64,
                job.unparseable_count as i64,
                now_utc_string(),
            ],
        )
        .with_context(|| format!("failed to mark job {} reconciled", job.external_job_id))?;

        tx.commit().context("failed to commit reconcile transaction")?;
        Ok(applied)
    }

    pub fn reconciled_jobs(&self) -> Result<Vec<ReconciledJob>> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT external_job_id, status, output_file_id, applied_count, unparseable_count
                 FROM reconciled_jobs ORDER BY reconciled_at, external_job_id",
            )
            .context("failed to prepare reconciled job query")?;
        let jobs = statement
            .query_map([], |row| {
                Ok(ReconciledJob {
                    external_job_id: row.get(0)?,
                    status: row.get(1)?,
                    output_file_id: row.get(2)?,
                    applied_count: row.get::<_, i64>(3)?.max(0) as u64,
                    unparseable_count: row.get::<_, i64>(4)?.max(0) as u64,
                })
            })
            .context("failed to query reconciled jobs")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read reconciled jobs")?;
        Ok(jobs)
    }
}

fn record_result_on(connection: &Connection, item_id: &str, update: &ItemUpdate<'_>) -> Result<bool> {
    let grammar_json =
        serde_json::to_string(update.grammar).context("failed to serialize grammar list")?;
    let changed = connection
        .execute(
            "UPDATE items
             SET cefr_level = ?2, cefr_value = ?3, reasoning = ?4, grammar_json = ?5,
                 translation = COALESCE(?6, translation), ai_model = ?7, updated_at = ?8
             WHERE item_id = ?1",
            params![
                item_id,
                update.label.as_str(),
                update.label.stored_rank(),
                update.rationale,
                grammar_json,
                update.translation,
                update.model,
                now_utc_string(),
            ],
        )
        .with_context(|| format!("failed to record result for {item_id}"))?;
    debug!(item_id, label = %update.label, changed, "recorded result");
    Ok(changed > 0)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS items (
              item_id TEXT PRIMARY KEY,
              text TEXT NOT NULL,
              translation TEXT,
              cefr_level TEXT,
              cefr_value INTEGER,
              reasoning TEXT,
              grammar_json TEXT,
              ai_model TEXT,
              updated_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_items_cefr_level ON items(cefr_level);

            CREATE TABLE IF NOT EXISTS reconciled_jobs (
              external_job_id TEXT PRIMARY KEY,
              status TEXT NOT NULL,
              output_file_id TEXT,
              applied_count INTEGER NOT NULL DEFAULT 0,
              unparseable_count INTEGER NOT NULL DEFAULT 0,
              reconciled_at TEXT NOT NULL
            );
            ",
        )
        .context("failed to create schema")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, text: &str) -> ClassificationRequest {
        ClassificationRequest {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn update(label: Label) -> ItemUpdate<'static> {
        ItemUpdate {
            label,
            rationale: "because",
            grammar: &[],
            translation: None,
            model: "gpt-4o-mini",
        }
    }

    fn seeded_store() -> ItemStore {
        let mut store = ItemStore::open_in_memory().expect("store");
        store
            .import_items(&[
                request("b", "Second."),
                request("a", "First."),
                request("c", "Third."),
            ])
            .expect("import");
        store
    }

    #[test]
    fn import_ignores_existing_ids() {
        let mut store = seeded_store();
        let summary = store
            .import_items(&[request("a", "Changed."), request("d", "Fourth.")])
            .expect("import");
        assert_eq!(
            summary,
            ImportSummary {
                inserted: 1,
                already_present: 1,
            }
        );
        let unprocessed = store.select_unprocessed(None).expect("select");
        assert_eq!(unprocessed[0].text, "First.");
    }

    #[test]
    fn unprocessed_selection_is_ordered_and_limited() {
        let store = seeded_store();
        store.record_result("a", &update(Label::B1)).expect("record");

        let ids: Vec<String> = store
            .select_unprocessed(Some(1))
            .expect("select")
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec!["b".to_string()]);
        assert_eq!(store.count_unprocessed().expect("count"), 2);
    }

    #[test]
    fn unknown_result_counts_as_processed_with_rank_zero() {
        let store = seeded_store();
        assert!(store.record_result("c", &update(Label::Unknown)).expect("record"));
        assert!(!store.record_result("zzz", &update(Label::A1)).expect("record"));

        let rank: i64 = store
            .connection
            .query_row("SELECT cefr_value FROM items WHERE item_id = 'c'", [], |row| {
                row.get(0)
            })
            .expect("rank");
        assert_eq!(rank, 0);

        let counts = store.label_counts().expect("counts");
        assert_eq!(counts.count(Label::Unknown), 1);
        assert_eq!(counts.unprocessed, 2);
        assert_eq!(counts.labelled_total(), 1);
        assert_eq!(counts.counts.last().map(|(label, _)| *label), Some(Label::Unknown));
    }

    #[test]
    fn reset_clears_ratings_and_keeps_text() {
        let store = seeded_store();
        store.record_result("a", &update(Label::C1)).expect("record");
        store.record_result("b", &update(Label::A2)).expect("record");

        assert_eq!(store.reset_ratings().expect("reset"), 2);
        assert_eq!(store.count_unprocessed().expect("count"), 3);
        assert_eq!(store.label_counts().expect("counts").labelled_total(), 0);
    }

    #[test]
    fn job_results_apply_once_per_job() {
        let mut store = seeded_store();
        let job = ReconciledJob {
            external_job_id: "batch_1".to_string(),
            status: "completed".to_string(),
            output_file_id: Some("file_out".to_string()),
            applied_count: 0,
            unparseable_count: 1,
        };
        let updates = vec![
            ("a".to_string(), update(Label::A1)),
            ("missing".to_string(), update(Label::B2)),
        ];

        assert!(!store.is_job_reconciled("batch_1").expect("lookup"));
        let applied = store.apply_job_results(&job, &updates).expect("apply");
        assert_eq!(applied, 1);
        assert!(store.is_job_reconciled("batch_1").expect("lookup"));
        assert!(store.apply_job_results(&job, &updates).is_err());

        let jobs = store.reconciled_jobs().expect("jobs");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].applied_count, 1);
        assert_eq!(jobs[0].unparseable_count, 1);
    }
}
