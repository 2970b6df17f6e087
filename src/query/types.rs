use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), order: Order::Desc }
    }
}

/// Field selection. `_id` is always returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// Expansion of a referenced-array path into the documents it points at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulateSpec {
    pub path: String,
    /// Projection applied to each related document.
    pub select: Option<Projection>,
    /// Store-native filter the related documents must also satisfy.
    pub filter: Option<BsonDocument>,
}

impl PopulateSpec {
    #[must_use]
    pub fn path(path: &str) -> Self {
        Self { path: path.to_string(), ..Self::default() }
    }

    #[must_use]
    pub fn with_select(mut self, select: Projection) -> Self {
        self.select = Some(select);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: BsonDocument) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Parsed form of a store-native filter document.
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}
