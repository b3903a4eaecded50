//! Builds the form model for one calendar day.

use crate::exercises::{EXERCISES, ExerciseCode, SETS_PER_EXERCISE};
use crate::models::{FieldName, GroupKey, GroupStatus, GroupView, WorkoutSet};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayForm {
    pub date: NaiveDate,
    pub label: String,
    pub exercises: Vec<ExerciseBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseBlock {
    pub code: ExerciseCode,
    pub name: &'static str,
    pub sets: Vec<SetRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetRow {
    pub set: u8,
    pub status: GroupStatus,
    pub error: Option<String>,
    pub fields: Vec<FieldInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInput {
    pub name: FieldName,
    pub value: String,
    pub filled: bool,
}

impl FieldInput {
    fn new(name: FieldName, value: String) -> Self {
        let filled = !value.is_empty();
        Self {
            name,
            value,
            filled,
        }
    }
}

impl SetRow {
    pub fn field(&self, name: FieldName) -> Option<&FieldInput> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Human-readable day label, e.g. `Wed, May 1, 2024`.
pub fn day_label(date: NaiveDate) -> String {
    date.format("%a, %b %-d, %Y").to_string()
}

impl DayForm {
    /// Every exercise in declared order, sets 1..=3, fields reps, [weight],
    /// notes. Groups without a stored row start blank.
    pub fn build(date: NaiveDate, records: &[WorkoutSet]) -> Self {
        let exercises = EXERCISES
            .iter()
            .map(|def| {
                let sets = (1..=SETS_PER_EXERCISE)
                    .map(|set| {
                        let record = records.iter().find(|record| {
                            record.date == date
                                && record.exercise_id == def.code
                                && record.set_num == set
                        });
                        set_row(set, def.uses_weight, record)
                    })
                    .collect();
                ExerciseBlock {
                    code: def.code,
                    name: def.name,
                    sets,
                }
            })
            .collect();

        Self {
            date,
            label: day_label(date),
            exercises,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = (GroupKey, &SetRow)> {
        self.exercises.iter().flat_map(|block| {
            block
                .sets
                .iter()
                .map(move |row| (GroupKey::new(block.code, row.set), row))
        })
    }

    /// Overlay the live group state from the sync engine.
    pub fn apply_groups(&mut self, groups: &[GroupView]) {
        for block in &mut self.exercises {
            let code = block.code;
            for row in &mut block.sets {
                let Some(group) = groups
                    .iter()
                    .find(|group| group.exercise == code && group.set == row.set)
                else {
                    continue;
                };
                row.status = group.status;
                row.error = group.error.clone();
                for field in &mut row.fields {
                    let value = match field.name {
                        FieldName::Reps => Some(&group.reps),
                        FieldName::Weight => group.weight.as_ref(),
                        FieldName::Notes => Some(&group.notes),
                    };
                    if let Some(value) = value {
                        *field = FieldInput::new(field.name, value.clone());
                    }
                }
            }
        }
    }
}

fn set_row(set: u8, uses_weight: bool, record: Option<&WorkoutSet>) -> SetRow {
    let mut fields = Vec::with_capacity(3);
    let reps = record
        .and_then(|record| record.reps)
        .map(|reps| reps.to_string())
        .unwrap_or_default();
    fields.push(FieldInput::new(FieldName::Reps, reps));
    if uses_weight {
        let weight = record
            .and_then(|record| record.weight)
            .map(|weight| weight.to_string())
            .unwrap_or_default();
        fields.push(FieldInput::new(FieldName::Weight, weight));
    }
    let notes = record
        .and_then(|record| record.notes.clone())
        .unwrap_or_default();
    fields.push(FieldInput::new(FieldName::Notes, notes));

    SetRow {
        set,
        status: GroupStatus::Clean,
        error: None,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn record(exercise: ExerciseCode, set: u8) -> WorkoutSet {
        WorkoutSet {
            user_id: "u1".to_string(),
            date: date(),
            exercise_id: exercise,
            set_num: set,
            reps: Some(10),
            weight: Some(20.0),
            notes: Some("felt easy".to_string()),
        }
    }

    #[test]
    fn label_uses_calendar_components() {
        assert_eq!(day_label(date()), "Wed, May 1, 2024");
        let new_year = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(day_label(new_year), "Wed, Jan 1, 2025");
    }

    #[test]
    fn renders_every_exercise_and_set_in_order() {
        let form = DayForm::build(date(), &[]);
        let codes: Vec<&str> = form.exercises.iter().map(|b| b.code.as_str()).collect();
        assert_eq!(codes, vec!["GS", "PU", "DR", "RD", "PL"]);
        for block in &form.exercises {
            let sets: Vec<u8> = block.sets.iter().map(|row| row.set).collect();
            assert_eq!(sets, vec![1, 2, 3]);
        }
        assert_eq!(form.rows().count(), 15);
    }

    #[test]
    fn weight_field_only_for_loaded_exercises() {
        let form = DayForm::build(date(), &[]);
        let names = |code: ExerciseCode| -> Vec<FieldName> {
            form.exercises
                .iter()
                .find(|block| block.code == code)
                .unwrap()
                .sets[0]
                .fields
                .iter()
                .map(|field| field.name)
                .collect()
        };
        assert_eq!(
            names(ExerciseCode::GobletSquat),
            vec![FieldName::Reps, FieldName::Weight, FieldName::Notes]
        );
        assert_eq!(
            names(ExerciseCode::Plank),
            vec![FieldName::Reps, FieldName::Notes]
        );
    }

    #[test]
    fn prefills_matching_records_and_marks_filled() {
        let form = DayForm::build(date(), &[record(ExerciseCode::Deadlift, 2)]);
        let (_, row) = form
            .rows()
            .find(|(key, _)| *key == GroupKey::new(ExerciseCode::Deadlift, 2))
            .unwrap();
        let reps = row.field(FieldName::Reps).unwrap();
        assert_eq!(reps.value, "10");
        assert!(reps.filled);
        assert_eq!(row.field(FieldName::Weight).unwrap().value, "20");
        assert_eq!(row.field(FieldName::Notes).unwrap().value, "felt easy");

        let (_, blank) = form
            .rows()
            .find(|(key, _)| *key == GroupKey::new(ExerciseCode::Deadlift, 1))
            .unwrap();
        assert!(blank.fields.iter().all(|field| field.value.is_empty() && !field.filled));
    }

    #[test]
    fn bodyweight_rows_ignore_stored_weight() {
        let form = DayForm::build(date(), &[record(ExerciseCode::PushUp, 1)]);
        let (_, row) = form
            .rows()
            .find(|(key, _)| *key == GroupKey::new(ExerciseCode::PushUp, 1))
            .unwrap();
        assert!(row.field(FieldName::Weight).is_none());
    }

    #[test]
    fn building_twice_is_stable() {
        let records = vec![record(ExerciseCode::Row, 3)];
        assert_eq!(DayForm::build(date(), &records), DayForm::build(date(), &records));
    }

    #[test]
    fn applying_group_state_updates_values_and_filled() {
        let mut form = DayForm::build(date(), &[record(ExerciseCode::GobletSquat, 1)]);
        form.apply_groups(&[GroupView {
            exercise: ExerciseCode::GobletSquat,
            set: 1,
            status: GroupStatus::Dirty,
            error: None,
            reps: String::new(),
            weight: Some("24".to_string()),
            notes: "felt easy".to_string(),
        }]);
        let (_, row) = form.rows().next().unwrap();
        assert_eq!(row.status, GroupStatus::Dirty);
        let reps = row.field(FieldName::Reps).unwrap();
        assert!(reps.value.is_empty());
        assert!(!reps.filled);
        assert_eq!(row.field(FieldName::Weight).unwrap().value, "24");
    }
}
