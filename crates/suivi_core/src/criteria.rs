//! Query-string criteria filters.
//!
//! # Responsibility
//! - Turn flat `field.operator=value` pairs into a conjunction of predicates
//!   over one entity's declared [`FilterField`]s.
//! - Render those predicates as a parameterized SQL `WHERE` clause.
//!
//! # Invariants
//! - Values are always bound, never interpolated into SQL text.
//! - Inverse relations are filtered through correlated `EXISTS` subqueries.
//! - Unknown fields and operators are skipped; unparseable values are errors.

use crate::db::{fold_case, FOLD_FUNCTION};
use crate::model::{Entity, FieldKind, FilterField, FilterTarget};
use chrono::NaiveDate;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

static FILTER_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9]*)\.([A-Za-z]+)$").expect("valid filter key regex")
});

/// Keys consumed by pagination or search, never read as criteria.
const RESERVED_KEYS: &[&str] = &["page", "size", "sort", "distinct", "query"];

pub type CriteriaResult<T> = Result<T, CriteriaError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriteriaError {
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

impl Display for CriteriaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "invalid value `{value}` for `{key}`: expected {expected}"),
        }
    }
}

impl Error for CriteriaError {}

/// Filter operator named after the dot in a criteria key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Specified,
    Contains,
    DoesNotContain,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Operator {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "equals" => Some(Self::Equals),
            "notEquals" => Some(Self::NotEquals),
            "in" => Some(Self::In),
            "notIn" => Some(Self::NotIn),
            "specified" => Some(Self::Specified),
            "contains" => Some(Self::Contains),
            "doesNotContain" => Some(Self::DoesNotContain),
            "greaterThan" => Some(Self::GreaterThan),
            "greaterThanOrEqual" => Some(Self::GreaterThanOrEqual),
            "lessThan" => Some(Self::LessThan),
            "lessThanOrEqual" => Some(Self::LessThanOrEqual),
            _ => None,
        }
    }

    /// Whether this operator is defined for values of `kind`.
    pub fn supports(self, kind: FieldKind) -> bool {
        match self {
            Self::Equals | Self::NotEquals | Self::In | Self::NotIn | Self::Specified => true,
            Self::Contains | Self::DoesNotContain => kind == FieldKind::Text,
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => kind.is_orderable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Compare(&'static str, Value),
    In { values: Vec<Value>, negated: bool },
    Specified(bool),
    Like { pattern: String, negated: bool },
}

#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    field: &'static FilterField,
    condition: Condition,
}

/// Conjunction of parsed filter predicates for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    predicates: Vec<Predicate>,
}

impl Criteria {
    /// Parses criteria for `E` from raw query pairs.
    ///
    /// `in`/`notIn` values may be comma separated, repeated, or both. For
    /// other operators a repeated key keeps its last value.
    pub fn parse<E: Entity>(params: &[(String, String)]) -> CriteriaResult<Self> {
        let mut grouped: Vec<(&'static FilterField, Operator, String, Vec<String>)> = Vec::new();

        for (key, value) in params {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let Some((field, operator)) = resolve_key::<E>(key) else {
                debug!(
                    "event=criteria_parse module=criteria status=skipped entity={} key={}",
                    E::ENTITY_NAME,
                    key
                );
                continue;
            };

            let values = match operator {
                Operator::In | Operator::NotIn => value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
                _ => vec![value.clone()],
            };

            match grouped
                .iter_mut()
                .find(|(f, op, _, _)| f.name == field.name && *op == operator)
            {
                Some((_, Operator::In | Operator::NotIn, _, existing)) => existing.extend(values),
                Some((_, _, _, existing)) => *existing = values,
                None => grouped.push((field, operator, key.clone(), values)),
            }
        }

        let mut predicates = Vec::with_capacity(grouped.len());
        for (field, operator, key, values) in grouped {
            predicates.push(Predicate {
                field,
                condition: build_condition(field.kind, operator, &key, &values)?,
            });
        }

        Ok(Self { predicates })
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Renders ` WHERE ...` (or an empty string) against `table`.
    pub fn where_sql(&self, table: &str) -> (String, Vec<Value>) {
        if self.predicates.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut binds = Vec::new();
        for predicate in &self.predicates {
            clauses.push(predicate_sql(predicate, table, &mut binds));
        }
        (format!(" WHERE {}", clauses.join(" AND ")), binds)
    }
}

fn resolve_key<E: Entity>(key: &str) -> Option<(&'static FilterField, Operator)> {
    let captures = FILTER_KEY_RE.captures(key)?;
    let name = captures.get(1)?.as_str();
    let operator = Operator::parse(captures.get(2)?.as_str())?;
    let field = E::FILTERS.iter().find(|field| field.name == name)?;
    if !operator.supports(field.kind) {
        return None;
    }
    Some((field, operator))
}

fn build_condition(
    kind: FieldKind,
    operator: Operator,
    key: &str,
    values: &[String],
) -> CriteriaResult<Condition> {
    let single = || values.last().map(String::as_str).unwrap_or_default();

    let condition = match operator {
        Operator::Equals => Condition::Compare("=", parse_value(kind, key, single())?),
        Operator::NotEquals => Condition::Compare("<>", parse_value(kind, key, single())?),
        Operator::GreaterThan => Condition::Compare(">", parse_value(kind, key, single())?),
        Operator::GreaterThanOrEqual => {
            Condition::Compare(">=", parse_value(kind, key, single())?)
        }
        Operator::LessThan => Condition::Compare("<", parse_value(kind, key, single())?),
        Operator::LessThanOrEqual => Condition::Compare("<=", parse_value(kind, key, single())?),
        Operator::In | Operator::NotIn => Condition::In {
            values: values
                .iter()
                .map(|value| parse_value(kind, key, value))
                .collect::<CriteriaResult<Vec<_>>>()?,
            negated: operator == Operator::NotIn,
        },
        Operator::Specified => match single().trim().to_ascii_lowercase().as_str() {
            "true" => Condition::Specified(true),
            "false" => Condition::Specified(false),
            other => {
                return Err(CriteriaError::InvalidValue {
                    key: key.to_string(),
                    value: other.to_string(),
                    expected: "true or false",
                })
            }
        },
        Operator::Contains | Operator::DoesNotContain => Condition::Like {
            pattern: format!("%{}%", escape_like(&fold_case(single()))),
            negated: operator == Operator::DoesNotContain,
        },
    };
    Ok(condition)
}

fn parse_value(kind: FieldKind, key: &str, raw: &str) -> CriteriaResult<Value> {
    let invalid = |expected| CriteriaError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    };
    let trimmed = raw.trim();
    match kind {
        FieldKind::Long => trimmed
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid("a 64-bit integer")),
        FieldKind::Integer => trimmed
            .parse::<i32>()
            .map(|v| Value::Integer(i64::from(v)))
            .map_err(|_| invalid("a 32-bit integer")),
        FieldKind::Date => trimmed
            .parse::<NaiveDate>()
            .map(|date| Value::Text(date.format("%Y-%m-%d").to_string()))
            .map_err(|_| invalid("an ISO-8601 date (YYYY-MM-DD)")),
        FieldKind::Text => Ok(Value::Text(raw.to_string())),
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn predicate_sql(predicate: &Predicate, table: &str, binds: &mut Vec<Value>) -> String {
    match predicate.field.target {
        FilterTarget::Column(column) => {
            condition_sql(&predicate.condition, &format!("{table}.{column}"), binds)
        }
        FilterTarget::Inverse {
            table: inverse_table,
            foreign_key,
        } => {
            let correlated =
                format!("SELECT 1 FROM {inverse_table} r WHERE r.{foreign_key} = {table}.id");
            match &predicate.condition {
                Condition::Specified(true) => format!("EXISTS ({correlated})"),
                Condition::Specified(false) => format!("NOT EXISTS ({correlated})"),
                condition => {
                    let inner = condition_sql(condition, "r.id", binds);
                    format!("EXISTS ({correlated} AND {inner})")
                }
            }
        }
    }
}

fn condition_sql(condition: &Condition, expr: &str, binds: &mut Vec<Value>) -> String {
    match condition {
        Condition::Compare(op, value) => {
            binds.push(value.clone());
            format!("{expr} {op} ?")
        }
        Condition::In { values, negated } => {
            if values.is_empty() {
                // `IN ()` is not valid SQL; an empty set matches nothing.
                return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
            }
            binds.extend(values.iter().cloned());
            let placeholders = vec!["?"; values.len()].join(", ");
            let keyword = if *negated { "NOT IN" } else { "IN" };
            format!("{expr} {keyword} ({placeholders})")
        }
        Condition::Specified(true) => format!("{expr} IS NOT NULL"),
        Condition::Specified(false) => format!("{expr} IS NULL"),
        Condition::Like { pattern, negated } => {
            binds.push(Value::Text(pattern.clone()));
            let keyword = if *negated { "NOT LIKE" } else { "LIKE" };
            format!("{FOLD_FUNCTION}({expr}) {keyword} ? ESCAPE '\\'")
        }
    }
}
