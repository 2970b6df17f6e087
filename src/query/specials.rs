//! Reserved query directives (`$sort`, `$limit`, `$skip`, `$select`, `$populate`).
//!
//! [`extract_specials`] removes every directive key from a filter map, so what reaches
//! the store only contains native predicates. [`prepare_query`] then replays the
//! directives that carry a truthy value as builder calls, always in the order
//! sort, skip, limit, select, populate.

use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use std::collections::BTreeMap;

use super::builder::QueryBuilder;
use super::types::{MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, Order, PopulateSpec, Projection, SortSpec};

/// A reserved directive. Variant order is the order directives are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Special {
    Sort,
    Skip,
    Limit,
    Select,
    Populate,
}

impl Special {
    pub const ALL: [Self; 5] = [Self::Sort, Self::Skip, Self::Limit, Self::Select, Self::Populate];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Sort => "$sort",
            Self::Skip => "$skip",
            Self::Limit => "$limit",
            Self::Select => "$select",
            Self::Populate => "$populate",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

/// Directives pulled out of a filter map, keyed in application order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Specials {
    entries: BTreeMap<Special, Bson>,
}

impl Specials {
    #[must_use]
    pub fn get(&self, special: Special) -> Option<&Bson> {
        self.entries.get(&special)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Special, &Bson)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Keeps only the given directives (e.g. `get` honors select and populate only).
    #[must_use]
    pub fn only(mut self, keep: &[Special]) -> Self {
        self.entries.retain(|k, _| keep.contains(k));
        self
    }
}

/// Falsy values (null, undefined, empty string, zero, false, empty array or document)
/// count as an absent directive.
#[must_use]
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::String(s) => !s.is_empty(),
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0 && !f.is_nan(),
        Bson::Array(a) => !a.is_empty(),
        Bson::Document(d) => !d.is_empty(),
        _ => true,
    }
}

/// Removes all directive keys from `filter` and returns those with a truthy value.
pub fn extract_specials(filter: &mut BsonDocument) -> Specials {
    let mut out = Specials::default();
    for special in Special::ALL {
        if let Some(value) = filter.remove(special.key()) {
            if is_truthy(&value) {
                out.entries.insert(special, value);
            } else {
                log::debug!("ignoring falsy directive {}", special.key());
            }
        }
    }
    out
}

/// Applies the extracted directives to `query`.
///
/// # Errors
/// `Validation` when a directive value has an unusable shape (negative limit,
/// mixed inclusion/exclusion projection, non-string populate path, ...).
pub fn prepare_query<Q: QueryBuilder>(query: &mut Q, specials: &Specials) -> Result<(), DbError> {
    for (special, value) in specials.iter() {
        if !is_truthy(value) {
            continue;
        }
        match special {
            Special::Sort => {
                query.sort(parse_sort(value)?);
            }
            Special::Skip => {
                query.skip(parse_count(special, value)?);
            }
            Special::Limit => {
                query.limit(parse_count(special, value)?);
            }
            Special::Select => {
                query.select(parse_select(value)?);
            }
            Special::Populate => {
                for spec in parse_populate(value)? {
                    query.populate(spec);
                }
            }
        }
    }
    Ok(())
}

/// Extracts the directives from `filter` and applies them to `query` in one step.
///
/// # Errors
/// See [`prepare_query`].
pub fn translate<Q: QueryBuilder>(query: &mut Q, filter: &mut BsonDocument) -> Result<(), DbError> {
    let specials = extract_specials(filter);
    prepare_query(query, &specials)
}

/// `"-createdAt name"` or `{ createdAt: -1, name: 1 }`.
///
/// # Errors
/// `Validation` for unsupported value shapes or directions, or more than
/// eight sort keys.
pub fn parse_sort(value: &Bson) -> Result<Vec<SortSpec>, DbError> {
    let specs: Vec<SortSpec> = match value {
        Bson::String(s) => s
            .split_whitespace()
            .map(|tok| match tok.strip_prefix('-') {
                Some(field) => SortSpec::desc(field),
                None => SortSpec::asc(tok.strip_prefix('+').unwrap_or(tok)),
            })
            .collect(),
        Bson::Document(d) => d
            .iter()
            .map(|(field, dir)| {
                Ok(SortSpec { field: field.clone(), order: parse_direction(field, dir)? })
            })
            .collect::<Result<_, DbError>>()?,
        other => return Err(DbError::Validation(format!("invalid $sort value: {other}"))),
    };
    if specs.len() > MAX_SORT_FIELDS {
        return Err(DbError::Validation(format!(
            "$sort accepts at most {MAX_SORT_FIELDS} keys, got {}",
            specs.len()
        )));
    }
    Ok(specs)
}

fn parse_direction(field: &str, dir: &Bson) -> Result<Order, DbError> {
    let order = match dir {
        Bson::Int32(1) | Bson::Int64(1) => Order::Asc,
        Bson::Int32(-1) | Bson::Int64(-1) => Order::Desc,
        Bson::Double(f) if *f == 1.0 => Order::Asc,
        Bson::Double(f) if *f == -1.0 => Order::Desc,
        Bson::String(s) => match s.to_ascii_lowercase().as_str() {
            "1" | "asc" | "ascending" => Order::Asc,
            "-1" | "desc" | "descending" => Order::Desc,
            _ => return Err(DbError::Validation(format!("invalid sort direction for '{field}'"))),
        },
        _ => return Err(DbError::Validation(format!("invalid sort direction for '{field}'"))),
    };
    Ok(order)
}

// Largest double that still holds every integer below it exactly.
const MAX_EXACT_DOUBLE: f64 = 9_007_199_254_740_992.0;

fn parse_count(special: Special, value: &Bson) -> Result<usize, DbError> {
    let invalid = || DbError::Validation(format!("invalid {} value: {value}", special.key()));
    let n: i64 = match value {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        Bson::Double(f)
            if f.is_finite() && f.fract() == 0.0 && (0.0..=MAX_EXACT_DOUBLE).contains(f) =>
        {
            *f as i64
        }
        Bson::String(s) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    usize::try_from(n).map_err(|_| invalid())
}

/// `"name -body"` style tokens, an array of such tokens, or `{ name: 1 }`.
///
/// `_id` is always returned, so excluding only `_id` keeps every field.
///
/// # Errors
/// `Validation` when inclusion and exclusion are mixed, the shape is unsupported,
/// or more than 64 fields are named.
pub fn parse_select(value: &Bson) -> Result<Projection, DbError> {
    let mut flags: Vec<(String, bool)> = Vec::new();
    match value {
        Bson::String(s) => flags.extend(s.split_whitespace().map(select_token)),
        Bson::Array(items) => {
            for item in items {
                match item {
                    Bson::String(s) => flags.extend(s.split_whitespace().map(select_token)),
                    other => {
                        return Err(DbError::Validation(format!("invalid $select entry: {other}")));
                    }
                }
            }
        }
        Bson::Document(d) => {
            for (field, flag) in d {
                let keep = match flag {
                    Bson::Boolean(b) => *b,
                    Bson::Int32(i) => *i != 0,
                    Bson::Int64(i) => *i != 0,
                    Bson::Double(f) => *f != 0.0,
                    other => {
                        return Err(DbError::Validation(format!(
                            "invalid $select flag for '{field}': {other}"
                        )));
                    }
                };
                flags.push((field.clone(), keep));
            }
        }
        other => return Err(DbError::Validation(format!("invalid $select value: {other}"))),
    }
    let excludes_id = flags.iter().any(|(f, keep)| !keep && f == crate::document::ID_FIELD);
    let (include, exclude): (Vec<_>, Vec<_>) = flags
        .into_iter()
        .filter(|(field, _)| !field.is_empty() && field != crate::document::ID_FIELD)
        .partition(|(_, keep)| *keep);
    let names = |v: Vec<(String, bool)>| v.into_iter().map(|(f, _)| f).collect::<Vec<_>>();
    match (include.is_empty(), exclude.is_empty()) {
        (false, false) => Err(DbError::Validation(
            "$select cannot mix inclusion and exclusion".into(),
        )),
        (true, false) => Ok(Projection::Exclude(check_fields(names(exclude))?)),
        (true, true) if excludes_id => Ok(Projection::Exclude(Vec::new())),
        _ => Ok(Projection::Include(check_fields(names(include))?)),
    }
}

fn select_token(tok: &str) -> (String, bool) {
    match tok.strip_prefix('-') {
        Some(field) => (field.to_string(), false),
        None => (tok.strip_prefix('+').unwrap_or(tok).to_string(), true),
    }
}

fn check_fields(fields: Vec<String>) -> Result<Vec<String>, DbError> {
    if fields.len() > MAX_PROJECTION_FIELDS {
        return Err(DbError::Validation(format!(
            "$select accepts at most {MAX_PROJECTION_FIELDS} fields, got {}",
            fields.len()
        )));
    }
    Ok(fields)
}

/// Parses one populate path string: the first token is the field, the remaining
/// tokens are the projection applied to the related documents.
///
/// # Errors
/// `Validation` when the string has no field token or the projection is invalid.
pub fn parse_populate_path(path: &str) -> Result<PopulateSpec, DbError> {
    let mut tokens = path.split_whitespace();
    let field = tokens
        .next()
        .ok_or_else(|| DbError::Validation("empty $populate path".into()))?;
    let rest: Vec<&str> = tokens.collect();
    let mut spec = PopulateSpec::path(field);
    if !rest.is_empty() {
        spec.select = Some(parse_select(&Bson::String(rest.join(" ")))?);
    }
    Ok(spec)
}

/// A path string, or an array of path strings and `{ path, select }` documents.
///
/// # Errors
/// `Validation` for entries that are neither strings nor path documents.
pub fn parse_populate(value: &Bson) -> Result<Vec<PopulateSpec>, DbError> {
    match value {
        Bson::String(s) => Ok(vec![parse_populate_path(s)?]),
        Bson::Array(items) => items
            .iter()
            .filter(|item| is_truthy(item))
            .map(|item| match item {
                Bson::String(s) => parse_populate_path(s),
                Bson::Document(d) => parse_populate_doc(d),
                other => Err(DbError::Validation(format!("invalid $populate entry: {other}"))),
            })
            .collect(),
        Bson::Document(d) => Ok(vec![parse_populate_doc(d)?]),
        other => Err(DbError::Validation(format!("invalid $populate value: {other}"))),
    }
}

fn parse_populate_doc(d: &BsonDocument) -> Result<PopulateSpec, DbError> {
    let Some(Bson::String(path)) = d.get("path") else {
        return Err(DbError::Validation("$populate document requires a string 'path'".into()));
    };
    let mut spec = parse_populate_path(path)?;
    if let Some(select) = d.get("select").filter(|v| is_truthy(v)) {
        spec.select = Some(parse_select(select)?);
    }
    if let Some(Bson::Document(m)) = d.get("match") {
        spec.filter = Some(m.clone());
    }
    Ok(spec)
}
