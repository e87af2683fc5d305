//! Enums for the upsert engine
//!
//! # Serde Casing Conventions
//!
//! - `lowercase`: entity kinds and field types, matching the store table
//!   suffixes and the JSON wire format used by the admin upload handlers.

use serde::{Deserialize, Serialize};

/// The three record families handled by bulk upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Student,
    Teacher,
    Game,
}

impl EntityKind {
    /// All kinds, in registry order
    pub const ALL: [EntityKind; 3] = [EntityKind::Student, EntityKind::Teacher, EntityKind::Game];

    /// Name of the primary key field for this kind
    pub fn key_field(&self) -> &'static str {
        match self {
            EntityKind::Student => "student_id",
            EntityKind::Teacher => "teacher_id",
            EntityKind::Game => "game_id",
        }
    }

    /// Lowercase singular name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Student => "student",
            EntityKind::Teacher => "teacher",
            EntityKind::Game => "game",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" | "students" => Ok(EntityKind::Student),
            "teacher" | "teachers" => Ok(EntityKind::Teacher),
            "game" | "games" => Ok(EntityKind::Game),
            _ => Err(format!(
                "Unknown entity kind: {}. Use 'student', 'teacher' or 'game'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// Ordered list of strings (JSON array text in a cell)
    #[serde(rename = "string[]")]
    StringArray,
    /// ISO-8601 timestamp with millisecond precision, stored as a string
    Date,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::StringArray => write!(f, "string[]"),
            FieldType::Date => write!(f, "date"),
        }
    }
}

/// How a row was routed by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    /// Key was absent from the store
    Insert,
    /// Key existed and at least one business field changed
    Update,
    /// Key existed and nothing changed; timestamps were kept
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_entity_kind_from_str() {
        assert_eq!(EntityKind::from_str("game").unwrap(), EntityKind::Game);
        assert_eq!(EntityKind::from_str("Students").unwrap(), EntityKind::Student);
        assert_eq!(EntityKind::from_str(" TEACHER ").unwrap(), EntityKind::Teacher);
        assert!(EntityKind::from_str("course").is_err());
    }

    #[test]
    fn test_entity_kind_key_fields() {
        assert_eq!(EntityKind::Student.key_field(), "student_id");
        assert_eq!(EntityKind::Teacher.key_field(), "teacher_id");
        assert_eq!(EntityKind::Game.key_field(), "game_id");
    }

    #[test]
    fn test_entity_kind_serde() {
        let json = serde_json::to_string(&EntityKind::Game).unwrap();
        assert_eq!(json, "\"game\"");
        let kind: EntityKind = serde_json::from_str("\"teacher\"").unwrap();
        assert_eq!(kind, EntityKind::Teacher);
    }

    #[test]
    fn test_field_type_serde_matches_display() {
        for field_type in [
            FieldType::String,
            FieldType::Number,
            FieldType::Boolean,
            FieldType::StringArray,
            FieldType::Date,
        ] {
            let json = serde_json::to_string(&field_type).unwrap();
            assert_eq!(json, format!("\"{}\"", field_type));
            let back: FieldType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, field_type);
        }
    }
}
