use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};

use super::types::{CmpOp, Filter, MAX_IN_SET};

/// Parses a store-native filter document into a [`Filter`].
///
/// Supported: field equality, `{ field: { $eq|$ne|$gt|$gte|$lt|$lte|$in|$nin|$exists } }`
/// and top-level `$and`, `$or`, `$nor`. Any other `$`-key is a query error.
///
/// # Errors
/// `QueryError` on unknown operators or malformed operands.
pub fn parse_filter(doc: &BsonDocument) -> Result<Filter, DbError> {
    let mut parts = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        parts.push(match key.as_str() {
            "$and" => Filter::And(parse_branches(key, value)?),
            "$or" => Filter::Or(parse_branches(key, value)?),
            "$nor" => Filter::Not(Box::new(Filter::Or(parse_branches(key, value)?))),
            k if k.starts_with('$') => {
                return Err(DbError::QueryError(format!("unknown top-level operator {k}")));
            }
            path => parse_condition(path, value)?,
        });
    }
    Ok(match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    })
}

fn parse_branches(op: &str, value: &Bson) -> Result<Vec<Filter>, DbError> {
    let Bson::Array(items) = value else {
        return Err(DbError::QueryError(format!("{op} requires an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(DbError::QueryError(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn operator_doc(value: &Bson) -> Option<&BsonDocument> {
    match value {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn parse_condition(path: &str, value: &Bson) -> Result<Filter, DbError> {
    let Some(ops) = operator_doc(value) else {
        return Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: value.clone() });
    };
    let mut conds = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let path = path.to_string();
        conds.push(match op.as_str() {
            "$eq" => Filter::Cmp { path, op: CmpOp::Eq, value: operand.clone() },
            "$ne" => Filter::Not(Box::new(Filter::Cmp { path, op: CmpOp::Eq, value: operand.clone() })),
            "$gt" => Filter::Cmp { path, op: CmpOp::Gt, value: operand.clone() },
            "$gte" => Filter::Cmp { path, op: CmpOp::Gte, value: operand.clone() },
            "$lt" => Filter::Cmp { path, op: CmpOp::Lt, value: operand.clone() },
            "$lte" => Filter::Cmp { path, op: CmpOp::Lte, value: operand.clone() },
            "$in" => Filter::In { path, values: set_operand(op, operand)? },
            "$nin" => Filter::Nin { path, values: set_operand(op, operand)? },
            "$exists" => Filter::Exists { path, exists: crate::query::is_truthy(operand) },
            other => return Err(DbError::QueryError(format!("unknown operator {other}"))),
        });
    }
    Ok(if conds.len() == 1 { conds.remove(0) } else { Filter::And(conds) })
}

fn set_operand(op: &str, operand: &Bson) -> Result<Vec<Bson>, DbError> {
    match operand {
        Bson::Array(values) if values.len() > MAX_IN_SET => Err(DbError::QueryError(format!(
            "{op} accepts at most {MAX_IN_SET} values, got {}",
            values.len()
        ))),
        Bson::Array(values) => Ok(values.clone()),
        _ => Err(DbError::QueryError(format!("{op} requires an array"))),
    }
}
