use crate::types::ModelName;
use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};

use super::types::{PopulateSpec, Projection, SortSpec};

/// Mutators a query object exposes to the directive translator.
///
/// Every mutator returns the same query so calls can be chained.
pub trait QueryBuilder {
    fn sort(&mut self, spec: Vec<SortSpec>) -> &mut Self;
    fn limit(&mut self, n: usize) -> &mut Self;
    fn skip(&mut self, n: usize) -> &mut Self;
    fn select(&mut self, projection: Projection) -> &mut Self;
    fn populate(&mut self, spec: PopulateSpec) -> &mut Self;
}

/// A find query against one model, executed by [`crate::store::Store::find`].
///
/// Semantics:
/// - `filter` holds store-native predicates only.
/// - Sorting is applied before `skip`/`limit`, projection and population after.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub model: ModelName,
    pub filter: BsonDocument,
    pub sort: Vec<SortSpec>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub projection: Option<Projection>,
    pub populate: Vec<PopulateSpec>,
}

impl Query {
    #[must_use]
    pub fn find(model: &str, filter: BsonDocument) -> Self {
        Self { model: model.to_string(), filter, ..Self::default() }
    }

    /// Applies an upper bound to the result count, whether or not a limit was requested.
    pub fn cap_limit(&mut self, max: usize) -> &mut Self {
        self.limit = Some(self.limit.map_or(max, |n| n.min(max)));
        self
    }
}

impl QueryBuilder for Query {
    fn sort(&mut self, spec: Vec<SortSpec>) -> &mut Self {
        self.sort = spec;
        self
    }

    fn limit(&mut self, n: usize) -> &mut Self {
        self.limit = Some(n);
        self
    }

    fn skip(&mut self, n: usize) -> &mut Self {
        self.skip = Some(n);
        self
    }

    fn select(&mut self, projection: Projection) -> &mut Self {
        self.projection = Some(projection);
        self
    }

    fn populate(&mut self, spec: PopulateSpec) -> &mut Self {
        // a later directive for the same path wins
        self.populate.retain(|p| p.path != spec.path);
        self.populate.push(spec);
        self
    }
}
