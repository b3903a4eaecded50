use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Number of sets tracked for every exercise.
pub const SETS_PER_EXERCISE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExerciseCode {
    #[serde(rename = "GS")]
    GobletSquat,
    #[serde(rename = "PU")]
    PushUp,
    #[serde(rename = "DR")]
    Deadlift,
    #[serde(rename = "RD")]
    Row,
    #[serde(rename = "PL")]
    Plank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExerciseDefinition {
    pub code: ExerciseCode,
    pub name: &'static str,
    pub uses_weight: bool,
}

/// Exercises in display order.
pub const EXERCISES: [ExerciseDefinition; 5] = [
    ExerciseDefinition {
        code: ExerciseCode::GobletSquat,
        name: "Goblet Squat",
        uses_weight: true,
    },
    ExerciseDefinition {
        code: ExerciseCode::PushUp,
        name: "Push-Up",
        uses_weight: false,
    },
    ExerciseDefinition {
        code: ExerciseCode::Deadlift,
        name: "Deadlift",
        uses_weight: true,
    },
    ExerciseDefinition {
        code: ExerciseCode::Row,
        name: "Row",
        uses_weight: true,
    },
    ExerciseDefinition {
        code: ExerciseCode::Plank,
        name: "Plank",
        uses_weight: false,
    },
];

impl ExerciseCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GobletSquat => "GS",
            Self::PushUp => "PU",
            Self::Deadlift => "DR",
            Self::Row => "RD",
            Self::Plank => "PL",
        }
    }
}

impl fmt::Display for ExerciseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown exercise code '{0}'")]
pub struct UnknownExercise(pub String);

impl FromStr for ExerciseCode {
    type Err = UnknownExercise;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EXERCISES
            .iter()
            .map(|def| def.code)
            .find(|code| code.as_str() == value.trim())
            .ok_or_else(|| UnknownExercise(value.to_string()))
    }
}

pub fn is_valid_set(set: u8) -> bool {
    (1..=SETS_PER_EXERCISE).contains(&set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_each_code_once() {
        for (index, def) in EXERCISES.iter().enumerate() {
            assert_eq!(def.code as usize, index);
            assert_eq!(def.code.as_str().parse::<ExerciseCode>(), Ok(def.code));
        }
    }

    #[test]
    fn only_loaded_exercises_use_weight() {
        let weighted: Vec<&str> = EXERCISES
            .iter()
            .filter(|def| def.uses_weight)
            .map(|def| def.code.as_str())
            .collect();
        assert_eq!(weighted, vec!["GS", "DR", "RD"]);
    }

    #[test]
    fn codes_parse_and_serialize_as_short_form() {
        assert_eq!("PL".parse::<ExerciseCode>(), Ok(ExerciseCode::Plank));
        assert!("XX".parse::<ExerciseCode>().is_err());
        let json = serde_json::to_string(&ExerciseCode::Row).unwrap();
        assert_eq!(json, "\"RD\"");
    }

    #[test]
    fn set_numbers_are_one_based() {
        assert!(!is_valid_set(0));
        assert!(is_valid_set(1));
        assert!(is_valid_set(3));
        assert!(!is_valid_set(4));
    }
}
