//! Schema registry
//!
//! Declarative per-kind field rules. Every decision the record builder makes
//! about which fields to convert, require, preserve or timestamp is read from
//! here, so adding a column to a kind is a one-line change.

use serde::Serialize;

use crate::models::{EntityKind, FieldType};

/// Field written once at first insert
pub const CREATED_AT: &str = "created_at";
/// Touch timestamp carried by every kind
pub const UPDATED_AT: &str = "updated_at";
/// Additional touch timestamp carried by games
pub const LAST_UPDATE: &str = "last_update";
/// Click counter owned by the click-tracking path
pub const ACCUMULATED_CLICK: &str = "accumulated_click";
/// Game field whose trailing path segment must match the key
pub const SCRATCH_API: &str = "scratch_api";

/// Rules for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub description: &'static str,
}

const fn field(
    name: &'static str,
    field_type: FieldType,
    required: bool,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required,
        description,
    }
}

/// Full schema for an entity kind
#[derive(Debug, Serialize)]
pub struct EntitySchema {
    pub kind: EntityKind,
    /// Primary key field name
    pub key_field: &'static str,
    /// Key plus business fields, in column order
    pub fields: &'static [FieldSpec],
    /// Numeric counters owned by the server; seeded from the upload on insert only
    pub server_counters: &'static [&'static str],
    /// Timestamps advanced when a business field changes
    pub touch_fields: &'static [&'static str],
}

static STUDENT_FIELDS: [FieldSpec; 9] = [
    field("student_id", FieldType::String, true, "Unique student identifier"),
    field("name", FieldType::String, true, "Display name"),
    field("email", FieldType::String, false, "Contact email"),
    field("class_name", FieldType::String, false, "Class or homeroom"),
    field("teacher_id", FieldType::String, false, "Owning teacher"),
    field("grade", FieldType::Number, false, "School grade"),
    field("game_ids", FieldType::StringArray, false, "Games assigned to the student"),
    field("is_active", FieldType::Boolean, false, "Whether the account is enabled"),
    field("enrolled_at", FieldType::Date, false, "Enrollment date"),
];

static TEACHER_FIELDS: [FieldSpec; 7] = [
    field("teacher_id", FieldType::String, true, "Unique teacher identifier"),
    field("name", FieldType::String, true, "Display name"),
    field("email", FieldType::String, true, "Contact email"),
    field("department", FieldType::String, false, "Department"),
    field("class_names", FieldType::StringArray, false, "Classes taught"),
    field("phone", FieldType::String, false, "Contact phone"),
    field("is_admin", FieldType::Boolean, false, "Has admin console access"),
];

static GAME_FIELDS: [FieldSpec; 10] = [
    field("game_id", FieldType::String, true, "Scratch project identifier"),
    field("game_name", FieldType::String, true, "Title shown in the catalogue"),
    field(SCRATCH_API, FieldType::String, true, "Scratch project URL ending in game_id"),
    field("description", FieldType::String, false, "Catalogue description"),
    field("difficulty", FieldType::String, false, "Difficulty label"),
    field("subject", FieldType::String, false, "Subject area"),
    field("teacher_id", FieldType::String, false, "Teacher who published the game"),
    field("tags", FieldType::StringArray, false, "Search tags"),
    field("grade_level", FieldType::Number, false, "Target grade"),
    field("is_featured", FieldType::Boolean, false, "Pinned on the landing page"),
];

static STUDENT_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Student,
    key_field: "student_id",
    fields: &STUDENT_FIELDS,
    server_counters: &[],
    touch_fields: &[UPDATED_AT],
};

static TEACHER_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Teacher,
    key_field: "teacher_id",
    fields: &TEACHER_FIELDS,
    server_counters: &[],
    touch_fields: &[UPDATED_AT],
};

static GAME_SCHEMA: EntitySchema = EntitySchema {
    kind: EntityKind::Game,
    key_field: "game_id",
    fields: &GAME_FIELDS,
    server_counters: &[ACCUMULATED_CLICK],
    touch_fields: &[UPDATED_AT, LAST_UPDATE],
};

/// Look up the schema for a kind
pub fn schema_for(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::Student => &STUDENT_SCHEMA,
        EntityKind::Teacher => &TEACHER_SCHEMA,
        EntityKind::Game => &GAME_SCHEMA,
    }
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields an upload may overwrite on an existing record
    pub fn business_fields(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        let key = self.key_field;
        self.fields.iter().filter(move |f| f.name != key)
    }

    /// Fields that are never taken from the upload on update
    pub fn server_owned_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.server_counters
            .iter()
            .copied()
            .chain(std::iter::once(CREATED_AT))
    }

    pub fn is_server_owned(&self, name: &str) -> bool {
        self.server_owned_fields().any(|f| f == name)
    }

    /// Headers that must be present for an upload to be accepted
    pub fn required_headers(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect()
    }

    /// Whether a header names something this kind knows about
    ///
    /// Server-owned and timestamp columns are recognised (exports round-trip
    /// them) even though uploads never control them on update.
    pub fn is_known_header(&self, name: &str) -> bool {
        self.field(name).is_some()
            || self.is_server_owned(name)
            || self.touch_fields.contains(&name)
    }
}
