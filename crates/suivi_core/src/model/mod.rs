//! Domain model for the tracked construction records.
//!
//! # Responsibility
//! - Define the [`Entity`] contract every exposed record implements.
//! - Describe persisted columns and filterable fields as static metadata so
//!   repository, criteria and search code stay generic.
//!
//! # Invariants
//! - `id` is `None` until the primary store assigns it and never changes after.
//! - Relations are stored as foreign-key ids and serialized as `{"id": n}`.

use rusqlite::types::Value;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub mod annee;
pub mod fiche_suivi_ouvrage;
pub mod macon;
pub mod prefabricant;
pub mod prevision;

pub use annee::Annee;
pub use fiche_suivi_ouvrage::FicheSuiviOuvrage;
pub use macon::Macon;
pub use prefabricant::Prefabricant;
pub use prevision::Prevision;

/// Primary key assigned by the relational store.
pub type EntityId = i64;

/// Reference to a related record, serialized as `{"id": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }
}

/// Value family of a column or filter, deciding which operators apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Long,
    Integer,
    Text,
    /// ISO-8601 calendar date stored as `YYYY-MM-DD` text.
    Date,
}

impl FieldKind {
    /// Whether range comparisons are meaningful for this kind.
    pub fn is_orderable(self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// One persisted non-id column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// SQL column name.
    pub name: &'static str,
    /// JSON property name, also accepted as a sort key.
    pub field: &'static str,
    pub kind: FieldKind,
}

/// Where a filter reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    /// A column of the entity's own table.
    Column(&'static str),
    /// Ids of rows in another table pointing back at this entity.
    Inverse {
        table: &'static str,
        foreign_key: &'static str,
    },
}

/// One filterable query-string field (`{name}.{operator}=value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub target: FilterTarget,
}

impl FilterField {
    pub const fn column(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            target: FilterTarget::Column(column),
        }
    }

    pub const fn inverse(
        name: &'static str,
        table: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            kind: FieldKind::Long,
            target: FilterTarget::Inverse { table, foreign_key },
        }
    }
}

/// Contract shared by every record exposed through the resource layer.
pub trait Entity:
    Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Singular camelCase name used in alerts and problem bodies.
    const ENTITY_NAME: &'static str;
    /// Plural path segment under `/api`.
    const RESOURCE_PATH: &'static str;
    const TABLE: &'static str;
    /// Persisted columns except `id`, in bind order.
    const COLUMNS: &'static [Column];
    const FILTERS: &'static [FilterField];

    fn id(&self) -> Option<EntityId>;
    fn set_id(&mut self, id: Option<EntityId>);

    /// Values bound to [`Entity::COLUMNS`], same order.
    fn column_values(&self) -> Vec<Value>;

    /// Decodes one row selected with `id` followed by [`Entity::COLUMNS`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Checks field constraints that serde typing alone does not enforce.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Plain text fed to the search index.
    ///
    /// Defaults to every scalar value of the JSON form.
    fn search_text(&self) -> String {
        let mut parts = Vec::new();
        if let Ok(value) = serde_json::to_value(self) {
            collect_scalars(&value, &mut parts);
        }
        parts.join(" ")
    }
}

fn collect_scalars(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(text) => out.push(text.clone()),
        serde_json::Value::Number(number) => out.push(number.to_string()),
        serde_json::Value::Bool(flag) => out.push(flag.to_string()),
        serde_json::Value::Array(items) => items.iter().for_each(|item| collect_scalars(item, out)),
        serde_json::Value::Object(map) => map.values().for_each(|item| collect_scalars(item, out)),
        serde_json::Value::Null => {}
    }
}

/// Field constraint violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Blank { field: &'static str },
    Negative { field: &'static str, value: i64 },
    TooLong { field: &'static str, max: usize },
    /// Payload could not be decoded into the entity shape.
    Malformed(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank { field } => write!(f, "`{field}` must not be blank"),
            Self::Negative { field, value } => {
                write!(f, "`{field}` must be >= 0, got {value}")
            }
            Self::TooLong { field, max } => {
                write!(f, "`{field}` must be at most {max} characters")
            }
            Self::Malformed(message) => write!(f, "malformed payload: {message}"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn ensure_not_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank { field });
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(
    field: &'static str,
    value: Option<i32>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < 0 => Err(ValidationError::Negative {
            field,
            value: i64::from(v),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn ensure_max_len(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(text) if text.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        _ => Ok(()),
    }
}

pub(crate) fn ref_value(reference: Option<EntityRef>) -> Value {
    reference.map_or(Value::Null, |r| Value::Integer(r.id))
}

pub(crate) fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

pub(crate) fn opt_int(value: Option<i32>) -> Value {
    value.map_or(Value::Null, |v| Value::Integer(i64::from(v)))
}

pub(crate) fn ref_from_row(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<EntityRef>> {
    Ok(row.get::<_, Option<EntityId>>(column)?.map(EntityRef::new))
}
