//! Debounced autosave for the fields of the active day.
//!
//! Edits are grouped by (exercise, set). Each group owns at most one armed
//! debounce timer and at most one in-flight upsert. A timer that fires while
//! the group's previous upsert is still pending queues a single follow-up
//! save, issued with the group's latest values once the pending one returns.

use crate::backend::{Backend, BackendError};
use crate::errors::TrackerError;
use crate::exercises::is_valid_set;
use crate::form::{DayForm, SetRow};
use crate::models::{FieldName, GroupKey, GroupStatus, GroupView, WorkoutSetUpsert};
use crate::notice::Notices;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1200);

/// Count of upserts awaiting a response.
#[derive(Clone)]
pub struct SaveCounter {
    tx: Arc<watch::Sender<usize>>,
}

impl SaveCounter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn in_progress(&self) -> usize {
        *self.tx.borrow()
    }

    fn begin(&self) -> SaveGuard {
        self.tx.send_modify(|count| *count += 1);
        SaveGuard {
            tx: Arc::clone(&self.tx),
        }
    }

    /// Resolves once no upsert is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.tx.subscribe();
        // The sender is owned by `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Default for SaveCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the counter when the save task finishes, whatever the outcome.
struct SaveGuard {
    tx: Arc<watch::Sender<usize>>,
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.tx.send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// Raw field contents as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct GroupValues {
    reps: String,
    weight: Option<String>,
    notes: String,
}

impl GroupValues {
    fn from_row(row: &SetRow) -> Self {
        let value = |name| row.field(name).map(|field| field.value.clone());
        Self {
            reps: value(FieldName::Reps).unwrap_or_default(),
            weight: value(FieldName::Weight),
            notes: value(FieldName::Notes).unwrap_or_default(),
        }
    }

    /// Returns false when the group has no such field.
    fn set(&mut self, field: FieldName, value: String) -> bool {
        match field {
            FieldName::Reps => self.reps = value,
            FieldName::Notes => self.notes = value,
            FieldName::Weight => match self.weight.as_mut() {
                Some(weight) => *weight = value,
                None => return false,
            },
        }
        true
    }

    fn to_upsert(&self, target: &SaveTarget) -> Result<WorkoutSetUpsert, String> {
        let reps = match self.reps.trim() {
            "" => None,
            raw => Some(
                raw.parse::<i32>()
                    .map_err(|_| format!("reps must be a whole number, got '{raw}'"))?,
            ),
        };
        let weight = match self.weight.as_deref().map(str::trim) {
            None => None,
            Some("") => Some(None),
            Some(raw) => match raw.parse::<f64>() {
                Ok(weight) if weight.is_finite() => Some(Some(weight)),
                _ => return Err(format!("weight must be a number, got '{raw}'")),
            },
        };
        let notes = (!self.notes.is_empty()).then(|| self.notes.clone());

        Ok(WorkoutSetUpsert {
            user_id: target.user_id.clone(),
            date: target.date,
            exercise_id: target.key.exercise,
            set_num: target.key.set,
            reps,
            weight,
            notes,
        })
    }
}

struct PendingTimer {
    ticket: u64,
    handle: JoinHandle<()>,
}

struct EditGroup {
    values: GroupValues,
    status: GroupStatus,
    timer: Option<PendingTimer>,
    tickets: u64,
    in_flight: bool,
    queued: bool,
    last_error: Option<String>,
    /// Highest edit sequence applied per field.
    applied: HashMap<FieldName, u64>,
}

impl EditGroup {
    fn new(values: GroupValues) -> Self {
        Self {
            values,
            status: GroupStatus::Clean,
            timer: None,
            tickets: 0,
            in_flight: false,
            queued: false,
            last_error: None,
            applied: HashMap::new(),
        }
    }

    fn view(&self, key: GroupKey) -> GroupView {
        GroupView {
            exercise: key.exercise,
            set: key.set,
            status: self.status,
            error: self.last_error.clone(),
            reps: self.values.reps.clone(),
            weight: self.values.weight.clone(),
            notes: self.values.notes.clone(),
        }
    }
}

struct ActiveDay {
    id: u64,
    user_id: String,
    date: NaiveDate,
    groups: HashMap<GroupKey, EditGroup>,
}

impl ActiveDay {
    fn has_in_flight(&self) -> bool {
        self.groups.values().any(|group| group.in_flight)
    }
}

#[derive(Default)]
struct SyncState {
    day: Option<ActiveDay>,
    /// Replaced days that still have upserts in flight.
    retired: Vec<ActiveDay>,
    next_day_id: u64,
}

impl SyncState {
    fn group_mut(&mut self, day_id: u64, key: GroupKey) -> Option<&mut EditGroup> {
        self.day
            .iter_mut()
            .chain(self.retired.iter_mut())
            .find(|day| day.id == day_id)
            .and_then(|day| day.groups.get_mut(&key))
    }
}

#[derive(Debug, Clone)]
struct SaveTarget {
    day_id: u64,
    user_id: String,
    date: NaiveDate,
    key: GroupKey,
}

struct Shared {
    backend: Arc<dyn Backend>,
    debounce: Duration,
    saves: SaveCounter,
    notices: Notices,
    state: Mutex<SyncState>,
}

#[derive(Clone)]
pub struct SyncEngine {
    shared: Arc<Shared>,
}

impl SyncEngine {
    pub fn new(backend: Arc<dyn Backend>, debounce: Duration, notices: Notices) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                debounce,
                saves: SaveCounter::new(),
                notices,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    pub fn saves_in_progress(&self) -> usize {
        self.shared.saves.in_progress()
    }

    pub async fn wait_idle(&self) {
        self.shared.saves.wait_idle().await;
    }

    /// Replace the group index with one built from a freshly rendered form.
    pub async fn load_day(&self, user_id: &str, form: &DayForm) {
        let mut state = self.shared.state.lock().await;
        self.retire_current(&mut state);
        state.next_day_id += 1;
        let id = state.next_day_id;
        let groups = form
            .rows()
            .map(|(key, row)| (key, EditGroup::new(GroupValues::from_row(row))))
            .collect();
        state.day = Some(ActiveDay {
            id,
            user_id: user_id.to_string(),
            date: form.date,
            groups,
        });
        debug!(date = %form.date, "edit groups loaded");
    }

    /// Drop the group index, saving any edits still waiting on a timer.
    pub async fn clear_day(&self) {
        let mut state = self.shared.state.lock().await;
        self.retire_current(&mut state);
    }

    /// Start saves for every armed timer now instead of waiting for it.
    pub async fn flush_pending(&self) {
        let mut state = self.shared.state.lock().await;
        if let Some(day) = state.day.as_mut() {
            self.flush_day(day);
        }
    }

    pub async fn active_date(&self) -> Option<NaiveDate> {
        let state = self.shared.state.lock().await;
        state.day.as_ref().map(|day| day.date)
    }

    /// Live group state, empty unless `date` is the loaded day.
    pub async fn groups(&self, date: NaiveDate) -> Vec<GroupView> {
        let state = self.shared.state.lock().await;
        let Some(day) = state.day.as_ref().filter(|day| day.date == date) else {
            return Vec::new();
        };
        let mut views: Vec<GroupView> = day
            .groups
            .iter()
            .map(|(key, group)| group.view(*key))
            .collect();
        views.sort_by_key(|view| GroupKey::new(view.exercise, view.set));
        views
    }

    pub async fn group(&self, key: GroupKey) -> Option<GroupView> {
        let state = self.shared.state.lock().await;
        state
            .day
            .as_ref()
            .and_then(|day| day.groups.get(&key))
            .map(|group| group.view(key))
    }

    /// Record a field edit and (re)arm the group's debounce timer.
    ///
    /// Edits carrying a `seq` at or below one already applied to the same
    /// field arrived out of order and are ignored.
    pub async fn edit(
        &self,
        key: GroupKey,
        field: FieldName,
        value: String,
        seq: Option<u64>,
    ) -> Result<GroupView, TrackerError> {
        let unknown = TrackerError::UnknownGroup {
            exercise: key.exercise,
            set: key.set,
        };
        if !is_valid_set(key.set) {
            return Err(unknown);
        }

        let mut state = self.shared.state.lock().await;
        let day = state.day.as_mut().ok_or(TrackerError::NoActiveDay)?;
        let day_id = day.id;
        let group = day.groups.get_mut(&key).ok_or(unknown)?;
        if let Some(seq) = seq {
            if group.applied.get(&field).is_some_and(|last| *last >= seq) {
                debug!(exercise = %key.exercise, set = key.set, field = field.as_str(), seq, "stale edit ignored");
                return Ok(group.view(key));
            }
        }
        if !group.values.set(field, value) {
            return Err(TrackerError::FieldNotEditable {
                exercise: key.exercise,
                field,
            });
        }
        if let Some(seq) = seq {
            group.applied.insert(field, seq);
        }

        if let Some(timer) = group.timer.take() {
            timer.handle.abort();
        }
        group.tickets += 1;
        let ticket = group.tickets;
        group.status = GroupStatus::Dirty;

        let engine = self.clone();
        let delay = self.shared.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.fire(day_id, key, ticket).await;
        });
        group.timer = Some(PendingTimer { ticket, handle });
        debug!(exercise = %key.exercise, set = key.set, field = field.as_str(), "field edited");

        Ok(group.view(key))
    }

    async fn fire(&self, day_id: u64, key: GroupKey, ticket: u64) {
        let mut state = self.shared.state.lock().await;
        let Some(day) = state.day.as_mut().filter(|day| day.id == day_id) else {
            return;
        };
        let target = SaveTarget {
            day_id,
            user_id: day.user_id.clone(),
            date: day.date,
            key,
        };
        let Some(group) = day.groups.get_mut(&key) else {
            return;
        };
        if group.timer.as_ref().map(|timer| timer.ticket) != Some(ticket) {
            return;
        }
        group.timer = None;

        if group.in_flight {
            debug!(exercise = %key.exercise, set = key.set, "save queued behind in-flight upsert");
            group.queued = true;
            return;
        }
        self.start_save(target, group);
    }

    fn start_save(&self, target: SaveTarget, group: &mut EditGroup) {
        let key = target.key;
        let row = match group.values.to_upsert(&target) {
            Ok(row) => row,
            Err(message) => {
                warn!(exercise = %key.exercise, set = key.set, "not saving: {message}");
                self.shared.notices.show(format!("Save failed: {message}"));
                group.status = GroupStatus::Dirty;
                group.last_error = Some(message);
                return;
            }
        };

        group.status = GroupStatus::Saving;
        group.in_flight = true;
        group.last_error = None;
        let guard = self.shared.saves.begin();
        info!(exercise = %key.exercise, set = key.set, date = %target.date, "saving set");

        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.shared.backend.upsert(&row).await;
            engine.finish(target, result).await;
            drop(guard);
        });
    }

    async fn finish(&self, target: SaveTarget, result: Result<(), BackendError>) {
        let key = target.key;
        match &result {
            Ok(()) => info!(exercise = %key.exercise, set = key.set, date = %target.date, "saved set"),
            Err(err) => {
                warn!(exercise = %key.exercise, set = key.set, date = %target.date, "save failed: {err}");
                self.shared.notices.show(format!("Save failed: {err}"));
            }
        }

        let mut state = self.shared.state.lock().await;
        if let Some(group) = state.group_mut(target.day_id, key) {
            group.in_flight = false;
            match result {
                // A newer edit is still waiting, so the stored values are stale.
                Ok(()) if group.timer.is_some() || group.queued => {
                    group.status = GroupStatus::Dirty;
                }
                Ok(()) => group.status = GroupStatus::Saved,
                Err(err) => {
                    group.status = GroupStatus::Dirty;
                    group.last_error = Some(err.to_string());
                }
            }
            if group.queued {
                group.queued = false;
                self.start_save(target, group);
            }
        }
        state.retired.retain(ActiveDay::has_in_flight);
    }

    fn flush_day(&self, day: &mut ActiveDay) {
        for (key, group) in day.groups.iter_mut() {
            let Some(timer) = group.timer.take() else {
                continue;
            };
            timer.handle.abort();
            if group.in_flight {
                group.queued = true;
                continue;
            }
            let target = SaveTarget {
                day_id: day.id,
                user_id: day.user_id.clone(),
                date: day.date,
                key: *key,
            };
            self.start_save(target, group);
        }
    }

    fn retire_current(&self, state: &mut SyncState) {
        if let Some(mut previous) = state.day.take() {
            self.flush_day(&mut previous);
            if previous.has_in_flight() {
                state.retired.push(previous);
            }
        }
    }
}
