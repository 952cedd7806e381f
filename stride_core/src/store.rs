//! The plan/log document store.
//!
//! Persists each user's plans and per-day logs as a single JSON document,
//! written atomically (temp file, then rename) under an exclusive file lock.
//! Writes go through all-or-nothing batches: every operation in a batch is
//! applied to an in-memory copy first, and the document is only persisted if
//! all of them succeed, so a rejected batch leaves no partial state behind.
//!
//! Reads are delivered to interested parties as full snapshots over
//! subscription channels; a subscriber always replaces its cached projection
//! wholesale instead of patching it in place.

use crate::{DayLog, DayPatch, Error, Plan, Result};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use tempfile::NamedTempFile;

/// The on-disk document holding one user's data
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    plans: HashMap<String, Plan>,
    #[serde(default)]
    days: HashMap<String, BTreeMap<NaiveDate, DayLog>>,
}

/// One operation within a write batch
#[derive(Clone, Debug)]
pub enum WriteOp {
    /// Create or replace a plan record; `created_at` is assigned here on
    /// first write and preserved on overwrite
    UpsertPlan(Plan),
    /// Rename a plan without touching its other fields
    SetPlanTitle { plan_id: String, title: String },
    /// Merge-upsert one day log; creates the log on first reference
    PatchDay { plan_id: String, patch: DayPatch },
    /// Remove one day log (absent key is not an error)
    DeleteDay { plan_id: String, date: NaiveDate },
    /// Remove a plan record and its day collection
    DeletePlan(String),
}

/// An all-or-nothing set of write operations
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A full snapshot of one plan's day collection
#[derive(Clone, Debug)]
pub struct DaySnapshot {
    pub plan_id: String,
    pub days: BTreeMap<NaiveDate, DayLog>,
}

/// A change subscription delivering full snapshots
///
/// Dropping the subscription tears it down; the store prunes the dead
/// channel on its next notification pass.
pub struct Subscription<T> {
    rx: Receiver<T>,
}

impl<T> Subscription<T> {
    /// The most recent snapshot queued on this subscription, if any
    ///
    /// Intermediate snapshots are discarded: only the latest state matters.
    pub fn latest(&self) -> Option<T> {
        let mut latest = None;
        while let Ok(snapshot) = self.rx.try_recv() {
            latest = Some(snapshot);
        }
        latest
    }
}

/// The per-user document store
pub struct PlanStore {
    path: PathBuf,
    plan_subs: RefCell<Vec<Sender<Vec<Plan>>>>,
    day_subs: RefCell<Vec<(String, Sender<DaySnapshot>)>>,
}

impl PlanStore {
    /// Open the store for one user under the given data directory
    pub fn open(data_dir: &Path, user_id: &str) -> Result<Self> {
        let dir = data_dir.join("users").join(user_id);
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join("store.json"),
            plan_subs: RefCell::new(Vec::new()),
            day_subs: RefCell::new(Vec::new()),
        })
    }

    /// Load the document with a shared lock
    ///
    /// A missing file is an empty store. A corrupt file logs a warning and
    /// degrades to an empty store rather than refusing to start.
    fn load_document(&self) -> StoreDocument {
        if !self.path.exists() {
            return StoreDocument::default();
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open store {:?}: {}. Using empty store.", self.path, e);
                return StoreDocument::default();
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock store {:?}: {}. Using empty store.", self.path, e);
            return StoreDocument::default();
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read_result = reader.read_to_string(&mut contents);
        let _ = file.unlock();
        if let Err(e) = read_result {
            tracing::warn!("Failed to read store {:?}: {}. Using empty store.", self.path, e);
            return StoreDocument::default();
        }

        match serde_json::from_str(&contents) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Failed to parse store {:?}: {}. Using empty store.", self.path, e);
                StoreDocument::default()
            }
        }
    }

    /// Atomically replace the document on disk
    fn persist_document(&self, doc: &StoreDocument) -> Result<()> {
        let temp = NamedTempFile::new_in(self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(doc)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        Ok(())
    }

    /// Commit a batch: all operations apply, or none do
    pub fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut doc = self.load_document();
        for op in &batch.ops {
            Self::apply_op(&mut doc, op)?;
        }
        self.persist_document(&doc)?;

        tracing::debug!("Committed batch of {} ops to {:?}", batch.ops.len(), self.path);
        self.notify(&doc);
        Ok(())
    }

    fn apply_op(doc: &mut StoreDocument, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::UpsertPlan(plan) => {
                if plan.race_date < plan.start_date {
                    return Err(Error::Store(format!(
                        "plan {} has an inverted date range",
                        plan.id
                    )));
                }
                let mut record = plan.clone();
                record.created_at = doc
                    .plans
                    .get(&plan.id)
                    .and_then(|existing| existing.created_at)
                    .or_else(|| Some(chrono::Utc::now()));
                doc.plans.insert(record.id.clone(), record);
            }
            WriteOp::SetPlanTitle { plan_id, title } => {
                let plan = doc
                    .plans
                    .get_mut(plan_id)
                    .ok_or_else(|| Error::Store(format!("no such plan: {}", plan_id)))?;
                plan.title = title.clone();
            }
            WriteOp::PatchDay { plan_id, patch } => {
                if !doc.plans.contains_key(plan_id) {
                    return Err(Error::Store(format!("no such plan: {}", plan_id)));
                }
                let days = doc.days.entry(plan_id.clone()).or_default();
                days.entry(patch.date)
                    .or_insert_with(|| DayLog::new(patch.date))
                    .apply(patch);
            }
            WriteOp::DeleteDay { plan_id, date } => {
                if let Some(days) = doc.days.get_mut(plan_id) {
                    days.remove(date);
                }
            }
            WriteOp::DeletePlan(plan_id) => {
                doc.plans.remove(plan_id);
                doc.days.remove(plan_id);
            }
        }
        Ok(())
    }

    /// All plans, newest first
    pub fn list_plans(&self) -> Vec<Plan> {
        Self::sorted_plans(&self.load_document())
    }

    pub fn get_plan(&self, plan_id: &str) -> Option<Plan> {
        self.load_document().plans.get(plan_id).cloned()
    }

    /// A snapshot of one plan's day collection
    pub fn days(&self, plan_id: &str) -> BTreeMap<NaiveDate, DayLog> {
        self.load_document()
            .days
            .get(plan_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Subscribe to the plan list; the current snapshot is delivered
    /// immediately
    pub fn subscribe_plans(&self) -> Subscription<Vec<Plan>> {
        let (tx, rx) = channel();
        let _ = tx.send(Self::sorted_plans(&self.load_document()));
        self.plan_subs.borrow_mut().push(tx);
        Subscription { rx }
    }

    /// Subscribe to one plan's day collection; the current snapshot is
    /// delivered immediately
    pub fn subscribe_days(&self, plan_id: &str) -> Subscription<DaySnapshot> {
        let (tx, rx) = channel();
        let _ = tx.send(DaySnapshot {
            plan_id: plan_id.to_string(),
            days: self.days(plan_id),
        });
        self.day_subs
            .borrow_mut()
            .push((plan_id.to_string(), tx));
        Subscription { rx }
    }

    /// Push fresh snapshots to every live subscriber, pruning dead channels
    fn notify(&self, doc: &StoreDocument) {
        let plans = Self::sorted_plans(doc);
        self.plan_subs
            .borrow_mut()
            .retain(|tx| tx.send(plans.clone()).is_ok());

        self.day_subs.borrow_mut().retain(|(plan_id, tx)| {
            let snapshot = DaySnapshot {
                plan_id: plan_id.clone(),
                days: doc.days.get(plan_id).cloned().unwrap_or_default(),
            };
            tx.send(snapshot).is_ok()
        });
    }

    fn sorted_plans(doc: &StoreDocument) -> Vec<Plan> {
        let mut plans: Vec<Plan> = doc.plans.values().cloned().collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        plans
    }
}
