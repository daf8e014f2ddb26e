//! FicheSuiviOuvrage (precast element follow-up sheet) record.
//!
//! # Invariants
//! - `reference` is required and not blank.
//! - `nb_elements`, when present, is not negative.
//! - `annee`, `macon` and `prefabricant` point at existing rows when set.

use super::{
    ensure_non_negative, ensure_not_blank, opt_int, opt_text, ref_from_row, ref_value, Column,
    Entity, EntityId, EntityRef, FieldKind, FilterField, ValidationError,
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FicheSuiviOuvrage {
    pub id: Option<EntityId>,
    pub reference: String,
    /// Pour date of the element.
    pub date_coulage: Option<NaiveDate>,
    pub nb_elements: Option<i32>,
    pub observation: Option<String>,
    pub annee: Option<EntityRef>,
    pub macon: Option<EntityRef>,
    pub prefabricant: Option<EntityRef>,
}

impl FicheSuiviOuvrage {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            id: None,
            reference: reference.into(),
            date_coulage: None,
            nb_elements: None,
            observation: None,
            annee: None,
            macon: None,
            prefabricant: None,
        }
    }
}

impl Entity for FicheSuiviOuvrage {
    const ENTITY_NAME: &'static str = "ficheSuiviOuvrage";
    const RESOURCE_PATH: &'static str = "fiche-suivi-ouvrages";
    const TABLE: &'static str = "fiche_suivi_ouvrage";
    const COLUMNS: &'static [Column] = &[
        Column {
            name: "reference",
            field: "reference",
            kind: FieldKind::Text,
        },
        Column {
            name: "date_coulage",
            field: "dateCoulage",
            kind: FieldKind::Date,
        },
        Column {
            name: "nb_elements",
            field: "nbElements",
            kind: FieldKind::Integer,
        },
        Column {
            name: "observation",
            field: "observation",
            kind: FieldKind::Text,
        },
        Column {
            name: "annee_id",
            field: "annee",
            kind: FieldKind::Long,
        },
        Column {
            name: "macon_id",
            field: "macon",
            kind: FieldKind::Long,
        },
        Column {
            name: "prefabricant_id",
            field: "prefabricant",
            kind: FieldKind::Long,
        },
    ];
    const FILTERS: &'static [FilterField] = &[
        FilterField::column("id", "id", FieldKind::Long),
        FilterField::column("reference", "reference", FieldKind::Text),
        FilterField::column("dateCoulage", "date_coulage", FieldKind::Date),
        FilterField::column("nbElements", "nb_elements", FieldKind::Integer),
        FilterField::column("observation", "observation", FieldKind::Text),
        FilterField::column("anneeId", "annee_id", FieldKind::Long),
        FilterField::column("maconId", "macon_id", FieldKind::Long),
        FilterField::column("prefabricantId", "prefabricant_id", FieldKind::Long),
    ];

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.reference.clone()),
            self.date_coulage
                .map_or(Value::Null, |date| Value::Text(date.format("%Y-%m-%d").to_string())),
            opt_int(self.nb_elements),
            opt_text(self.observation.as_deref()),
            ref_value(self.annee),
            ref_value(self.macon),
            ref_value(self.prefabricant),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            reference: row.get("reference")?,
            date_coulage: row.get("date_coulage")?,
            nb_elements: row.get("nb_elements")?,
            observation: row.get("observation")?,
            annee: ref_from_row(row, "annee_id")?,
            macon: ref_from_row(row, "macon_id")?,
            prefabricant: ref_from_row(row, "prefabricant_id")?,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        ensure_not_blank("reference", &self.reference)?;
        ensure_non_negative("nbElements", self.nb_elements)
    }
}
