//! Prefabricant (precast manufacturer) record.

use super::{Column, Entity, EntityId, FieldKind, FilterField, ValidationError};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prefabricant {
    pub id: Option<EntityId>,
    pub libelle: String,
}

impl Prefabricant {
    pub fn new(libelle: impl Into<String>) -> Self {
        Self {
            id: None,
            libelle: libelle.into(),
        }
    }
}

impl Entity for Prefabricant {
    const ENTITY_NAME: &'static str = "prefabricant";
    const RESOURCE_PATH: &'static str = "prefabricants";
    const TABLE: &'static str = "prefabricant";
    const COLUMNS: &'static [Column] = &[Column {
        name: "libelle",
        field: "libelle",
        kind: FieldKind::Text,
    }];
    const FILTERS: &'static [FilterField] = &[
        FilterField::column("id", "id", FieldKind::Long),
        FilterField::column("libelle", "libelle", FieldKind::Text),
        FilterField::inverse("ficheSuiviOuvrageId", "fiche_suivi_ouvrage", "prefabricant_id"),
    ];

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    fn column_values(&self) -> Vec<Value> {
        vec![Value::Text(self.libelle.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            libelle: row.get("libelle")?,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
