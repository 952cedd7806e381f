//! Session context: the one place holding cross-cutting client state.
//!
//! Owns the identity, the store handle, the current plan scope and its
//! subscriptions, and the per-action in-flight flags. There are no ambient
//! globals: everything is initialized when the identity is established and
//! torn down when the scope changes.
//!
//! The cached plan list and day map are projections fed by store snapshots;
//! `refresh` replaces them wholesale with the latest snapshot and discards
//! snapshots from a previous plan scope instead of applying them.

use crate::store::{DaySnapshot, PlanStore, Subscription};
use crate::{DayLog, Error, Identity, Plan, Result};
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::rc::Rc;

/// Actions that must not overlap with themselves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Generate,
    Adjust,
    ChatTurn,
    Feedback,
}

/// Releases its action's in-flight flag on drop
pub struct OpGuard {
    op: Op,
    flags: Rc<RefCell<HashSet<Op>>>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.flags.borrow_mut().remove(&self.op);
    }
}

/// Per-session client state
pub struct SessionContext {
    identity: Identity,
    store: PlanStore,
    current_plan: Option<String>,
    plans_sub: Subscription<Vec<Plan>>,
    cached_plans: Vec<Plan>,
    days_sub: Option<Subscription<DaySnapshot>>,
    cached_days: BTreeMap<NaiveDate, DayLog>,
    in_flight: Rc<RefCell<HashSet<Op>>>,
}

impl SessionContext {
    /// Establish a session: bootstrap the identity, open its store and
    /// subscribe to the plan list
    pub fn init(data_dir: &Path) -> Result<Self> {
        let identity = Identity::load_or_create(&data_dir.join("identity.json"))?;
        let store = PlanStore::open(data_dir, &identity.user_id.to_string())?;
        let plans_sub = store.subscribe_plans();
        let cached_plans = plans_sub.latest().unwrap_or_default();

        Ok(Self {
            identity,
            store,
            current_plan: None,
            plans_sub,
            cached_plans,
            days_sub: None,
            cached_days: BTreeMap::new(),
            in_flight: Rc::new(RefCell::new(HashSet::new())),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    pub fn current_plan_id(&self) -> Option<&str> {
        self.current_plan.as_deref()
    }

    /// Switch the day-log scope to a plan
    ///
    /// The previous scope's subscription is torn down before the new one is
    /// established, so a snapshot for the old plan can never be applied after
    /// the switch.
    pub fn select_plan(&mut self, plan_id: &str) -> Result<()> {
        if self.store.get_plan(plan_id).is_none() {
            return Err(Error::Session(format!("no such plan: {}", plan_id)));
        }

        self.days_sub = None;
        self.cached_days = BTreeMap::new();

        let sub = self.store.subscribe_days(plan_id);
        if let Some(snapshot) = sub.latest() {
            self.cached_days = snapshot.days;
        }
        self.days_sub = Some(sub);
        self.current_plan = Some(plan_id.to_string());
        Ok(())
    }

    /// Drop the current plan scope
    pub fn clear_plan(&mut self) {
        self.days_sub = None;
        self.cached_days = BTreeMap::new();
        self.current_plan = None;
    }

    /// Pull the latest snapshots into the cached projections
    fn refresh(&mut self) {
        if let Some(plans) = self.plans_sub.latest() {
            self.cached_plans = plans;
        }
        if let Some(sub) = &self.days_sub {
            if let Some(snapshot) = sub.latest() {
                // A snapshot for another scope is stale by definition
                if Some(snapshot.plan_id.as_str()) == self.current_plan.as_deref() {
                    self.cached_days = snapshot.days;
                } else {
                    tracing::debug!(
                        "Discarding stale snapshot for plan {}",
                        snapshot.plan_id
                    );
                }
            }
        }
    }

    /// The plan list, newest first
    pub fn plans(&mut self) -> &[Plan] {
        self.refresh();
        &self.cached_plans
    }

    /// The current plan's day map
    pub fn days(&mut self) -> &BTreeMap<NaiveDate, DayLog> {
        self.refresh();
        &self.cached_days
    }

    /// Mark an action in flight; fails while the same action is outstanding
    pub fn begin(&self, op: Op) -> Result<OpGuard> {
        if !self.in_flight.borrow_mut().insert(op) {
            return Err(Error::Session(format!("{:?} is already in progress", op)));
        }
        Ok(OpGuard {
            op,
            flags: Rc::clone(&self.in_flight),
        })
    }
}
