//! Prevision (yearly production forecast) record.

use super::{
    ensure_max_len, ensure_non_negative, opt_text, Column, Entity, EntityId, FieldKind,
    FilterField, ValidationError,
};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

const COMMENTAIRE_MAX_CHARS: usize = 255;

/// Forecast owned by at most one [`super::Annee`] through `annee.prevision_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prevision {
    pub id: Option<EntityId>,
    pub nb_ouvrages: i32,
    pub commentaire: Option<String>,
}

impl Prevision {
    pub fn new(nb_ouvrages: i32) -> Self {
        Self {
            id: None,
            nb_ouvrages,
            commentaire: None,
        }
    }
}

impl Entity for Prevision {
    const ENTITY_NAME: &'static str = "prevision";
    const RESOURCE_PATH: &'static str = "previsions";
    const TABLE: &'static str = "prevision";
    const COLUMNS: &'static [Column] = &[
        Column {
            name: "nb_ouvrages",
            field: "nbOuvrages",
            kind: FieldKind::Integer,
        },
        Column {
            name: "commentaire",
            field: "commentaire",
            kind: FieldKind::Text,
        },
    ];
    const FILTERS: &'static [FilterField] = &[
        FilterField::column("id", "id", FieldKind::Long),
        FilterField::column("nbOuvrages", "nb_ouvrages", FieldKind::Integer),
        FilterField::column("commentaire", "commentaire", FieldKind::Text),
        FilterField::inverse("anneeId", "annee", "prevision_id"),
    ];

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(i64::from(self.nb_ouvrages)),
            opt_text(self.commentaire.as_deref()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            nb_ouvrages: row.get("nb_ouvrages")?,
            commentaire: row.get("commentaire")?,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        ensure_non_negative("nbOuvrages", Some(self.nb_ouvrages))?;
        ensure_max_len(
            "commentaire",
            self.commentaire.as_deref(),
            COMMENTAIRE_MAX_CHARS,
        )
    }
}
