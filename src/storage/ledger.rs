//! Outcome Ledger
//!
//! Append-only newline-delimited JSON log of every action outcome. Each
//! `add` is flushed and synced before returning, so a crash loses at most the
//! in-flight action. The ledger is truncated at run start unless resuming.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use control_sweep_core::{OutcomeRecord, OutcomeStatus, RunSummary};
use tracing::{debug, info, warn};

use crate::utils::error::AppResult;

/// Append-only outcome sink for one run.
#[derive(Debug)]
pub struct OutcomeLedger {
    path: PathBuf,
    file: File,
    records: Vec<OutcomeRecord>,
    run_id: String,
    started_at: String,
}

impl OutcomeLedger {
    /// Open the ledger at `path`, truncating it unless `resume` is set.
    pub fn open(path: impl Into<PathBuf>, resume: bool) -> AppResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !resume {
            File::create(&path)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if resume {
            terminate_partial_line(&path, &mut file)?;
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        info!(path = %path.display(), resume, run_id = %run_id, "outcome ledger opened");

        Ok(Self {
            path,
            file,
            records: Vec::new(),
            run_id,
            started_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Records appended during this run, in order.
    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    /// Durably append one record.
    pub fn add(&mut self, record: OutcomeRecord) -> AppResult<()> {
        let serialized = serde_json::to_string(&record)?;
        writeln!(self.file, "{serialized}")?;
        self.file.flush()?;
        self.file.sync_data()?;
        debug!(
            action = %record.action,
            status = %record.status,
            surface = %record.surface,
            "outcome recorded"
        );
        self.records.push(record);
        Ok(())
    }

    /// Control keys already terminal in the ledger on disk.
    pub fn load_resume_keys(&self) -> AppResult<HashSet<String>> {
        let records = Self::replay(&self.path)?;
        Ok(resume_keys(&records))
    }

    /// Read every well-formed record from a ledger file. A missing file is an
    /// empty ledger; malformed lines are skipped.
    pub fn replay(path: &Path) -> AppResult<Vec<OutcomeRecord>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<OutcomeRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping malformed ledger line"
                ),
            }
        }
        Ok(records)
    }

    /// Compute and persist the run summary next to the ledger.
    pub fn finalize(&self, fatal: Option<String>) -> AppResult<RunSummary> {
        let mut summary = RunSummary::from_records(&self.records);
        summary.run_id = Some(self.run_id.clone());
        summary.started_at = Some(self.started_at.clone());
        summary.finished_at = Some(Utc::now().to_rfc3339());
        summary.fatal = fatal;

        let summary_path = summary_path(&self.path);
        fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
        info!(
            path = %summary_path.display(),
            total = summary.total,
            ok = summary.ok,
            failed = summary.failed,
            skipped = summary.skipped,
            "run summary written"
        );
        Ok(summary)
    }
}

/// A crash mid-write can leave the last line unterminated; appends must
/// start on a fresh line.
fn terminate_partial_line(path: &Path, file: &mut File) -> AppResult<()> {
    let content = fs::read(path)?;
    if content.last().is_some_and(|b| *b != b'\n') {
        debug!(path = %path.display(), "terminating partial ledger line");
        writeln!(file)?;
    }
    Ok(())
}

/// `<dir>/<stem>.summary.json` for a ledger path.
pub fn summary_path(ledger: &Path) -> PathBuf {
    let stem = ledger
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "control-sweep".to_string());
    ledger.with_file_name(format!("{stem}.summary.json"))
}

/// Keys whose latest non-auxiliary record is `ok` or `skipped`.
pub fn resume_keys(records: &[OutcomeRecord]) -> HashSet<String> {
    let mut latest: HashMap<String, OutcomeStatus> = HashMap::new();
    for record in records
        .iter()
        .filter(|r| !r.is_auxiliary() && !r.control_fingerprint.is_empty())
    {
        latest.insert(record.control_key(), record.status);
    }
    latest
        .into_iter()
        .filter(|(_, status)| status.is_terminal())
        .map(|(key, _)| key)
        .collect()
}
