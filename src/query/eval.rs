use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_PATH_DEPTH, Order, Projection, SortSpec};

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => {
            let Some(v) = get_path(doc, path) else {
                return false;
            };
            // array fields match when any element does
            if let Bson::Array(items) = v
                && !matches!(value, Bson::Array(_))
            {
                return items.iter().any(|item| cmp_matches(item, op, value));
            }
            cmp_matches(v, op, value)
        }
    }
}

fn cmp_matches(v: &Bson, op: &CmpOp, value: &Bson) -> bool {
    match op {
        CmpOp::Eq => bson_eq(v, value),
        CmpOp::Gt => compare_bson(v, value) == Ordering::Greater,
        CmpOp::Gte => compare_bson(v, value) != Ordering::Less,
        CmpOp::Lt => compare_bson(v, value) == Ordering::Less,
        CmpOp::Lte => compare_bson(v, value) != Ordering::Greater,
    }
}

/// Equality with the casts a schema-aware store applies: numbers compare by value and
/// an ObjectId equals its hex string form.
#[must_use]
pub fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::ObjectId(x), Bson::String(s)) | (Bson::String(s), Bson::ObjectId(x)) => {
            x.to_hex() == *s
        }
        _ if is_num(a) && is_num(b) => compare_bson(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let va = get_path(a, &s.field);
        let vb = get_path(b, &s.field);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if matches!(s.order, Order::Asc) { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    if let Bson::Array(items) = v {
        return items.iter().any(|item| is_in_set(item, set));
    }
    set.iter().any(|x| bson_eq(v, x))
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut segs = 0usize;
    while let Some(part) = parts.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        _ => f64::NAN,
    }
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 12,
    }
}

#[must_use]
pub fn project_fields(doc: &BsonDocument, projection: &Projection) -> BsonDocument {
    match projection {
        Projection::Include(fields) => {
            let mut out = BsonDocument::new();
            if let Some(id) = doc.get(crate::document::ID_FIELD) {
                out.insert(crate::document::ID_FIELD, id.clone());
            }
            for f in fields {
                if let Some(v) = doc.get(f) {
                    out.insert(f.clone(), v.clone());
                }
            }
            out
        }
        Projection::Exclude(fields) => {
            let mut out = doc.clone();
            for f in fields {
                out.remove(f);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse::parse_filter;
    use bson::doc;
    use bson::oid::ObjectId;

    fn matches(d: &BsonDocument, f: BsonDocument) -> bool {
        eval_filter(d, &parse_filter(&f).unwrap())
    }

    #[test]
    fn equality_and_ranges() {
        let d = doc! { "name": "x", "age": 7, "nested": { "k": 1.0 } };
        assert!(matches(&d, doc! { "name": "x" }));
        assert!(!matches(&d, doc! { "name": "y" }));
        assert!(matches(&d, doc! { "age": { "$gte": 7, "$lt": 8_i64 } }));
        assert!(matches(&d, doc! { "nested.k": 1 }));
        assert!(matches(&d, doc! { "missing": { "$exists": false } }));
        assert!(matches(&d, doc! { "name": { "$ne": "y" } }));
        assert!(matches(&d, doc! { "$or": [ { "name": "q" }, { "age": 7 } ] }));
        assert!(!matches(&d, doc! { "$nor": [ { "age": 7 } ] }));
    }

    #[test]
    fn arrays_match_on_any_element() {
        let oid = ObjectId::new();
        let d = doc! { "tags": [oid, ObjectId::new()] };
        assert!(matches(&d, doc! { "tags": oid }));
        assert!(matches(&d, doc! { "tags": oid.to_hex() }));
        assert!(matches(&d, doc! { "tags": { "$in": [oid] } }));
        assert!(matches(&d, doc! { "tags": { "$nin": [ObjectId::new()] } }));
    }

    #[test]
    fn sort_orders_mixed_numbers() {
        let a = doc! { "n": 1 };
        let b = doc! { "n": 2.5 };
        assert_eq!(compare_docs(&a, &b, &[SortSpec::asc("n")]), Ordering::Less);
        assert_eq!(compare_docs(&a, &b, &[SortSpec::desc("n")]), Ordering::Greater);
        assert_eq!(compare_docs(&a, &doc! {}, &[SortSpec::asc("n")]), Ordering::Greater);
    }

    #[test]
    fn projection_keeps_id() {
        let oid = ObjectId::new();
        let d = doc! { "_id": oid, "a": 1, "b": 2 };
        assert_eq!(
            project_fields(&d, &Projection::Include(vec!["a".into()])),
            doc! { "_id": oid, "a": 1 }
        );
        assert_eq!(
            project_fields(&d, &Projection::Exclude(vec!["a".into()])),
            doc! { "_id": oid, "b": 2 }
        );
    }
}
