//! Annee (campaign year) record.

use super::{ref_from_row, ref_value, Column, Entity, EntityId, EntityRef, FieldKind, FilterField, ValidationError};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A campaign year, optionally carrying its production forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annee {
    pub id: Option<EntityId>,
    pub libelle: String,
    /// One-to-one owner side; a forecast belongs to at most one year.
    pub prevision: Option<EntityRef>,
}

impl Annee {
    pub fn new(libelle: impl Into<String>) -> Self {
        Self {
            id: None,
            libelle: libelle.into(),
            prevision: None,
        }
    }
}

impl Entity for Annee {
    const ENTITY_NAME: &'static str = "annee";
    const RESOURCE_PATH: &'static str = "annees";
    const TABLE: &'static str = "annee";
    const COLUMNS: &'static [Column] = &[
        Column {
            name: "libelle",
            field: "libelle",
            kind: FieldKind::Text,
        },
        Column {
            name: "prevision_id",
            field: "prevision",
            kind: FieldKind::Long,
        },
    ];
    const FILTERS: &'static [FilterField] = &[
        FilterField::column("id", "id", FieldKind::Long),
        FilterField::column("libelle", "libelle", FieldKind::Text),
        FilterField::column("previsionId", "prevision_id", FieldKind::Long),
        FilterField::inverse("ficheSuiviOuvrageId", "fiche_suivi_ouvrage", "annee_id"),
    ];

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    fn column_values(&self) -> Vec<Value> {
        vec![Value::Text(self.libelle.clone()), ref_value(self.prevision)]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            libelle: row.get("libelle")?,
            prevision: ref_from_row(row, "prevision_id")?,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
