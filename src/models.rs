use crate::exercises::ExerciseCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One stored row of the `workouts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub user_id: String,
    pub date: NaiveDate,
    pub exercise_id: ExerciseCode,
    pub set_num: u8,
    #[serde(default)]
    pub reps: Option<i32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Write shape for an upsert keyed by `(user_id, date, exercise_id, set_num)`.
///
/// `weight` is left out of the payload for bodyweight exercises and sent as
/// `null` when a weighted exercise has its weight cleared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutSetUpsert {
    pub user_id: String,
    pub date: NaiveDate,
    pub exercise_id: ExerciseCode,
    pub set_num: u8,
    pub reps: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<Option<f64>>,
    pub notes: Option<String>,
}

impl WorkoutSetUpsert {
    pub fn key(&self) -> GroupKey {
        GroupKey {
            exercise: self.exercise_id,
            set: self.set_num,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub exercise: ExerciseCode,
    pub set: u8,
}

impl GroupKey {
    pub fn new(exercise: ExerciseCode, set: u8) -> Self {
        Self { exercise, set }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Reps,
    Weight,
    Notes,
}

impl FieldName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reps => "reps",
            Self::Weight => "weight",
            Self::Notes => "notes",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Reps => "Reps",
            Self::Weight => "Weight",
            Self::Notes => "Notes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    #[default]
    Clean,
    Dirty,
    Saving,
    Saved,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Dirty => "dirty",
            Self::Saving => "saving",
            Self::Saved => "saved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    pub fn relative_word(self) -> &'static str {
        match self {
            Self::Next => "later",
            Self::Previous => "earlier",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: UserIdentity,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds after which `access_token` is rejected.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Per-group state as exposed to the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub exercise: ExerciseCode,
    pub set: u8,
    pub status: GroupStatus,
    pub error: Option<String>,
    pub reps: String,
    pub weight: Option<String>,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub direction: Direction,
}

#[derive(Debug, Deserialize)]
pub struct FieldEditRequest {
    pub exercise: ExerciseCode,
    pub set: u8,
    pub field: FieldName,
    #[serde(default)]
    pub value: String,
    /// Client-side ordering of edits, increasing per page.
    #[serde(default)]
    pub seq: Option<u64>,
}
