// src/decode/payload.rs

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// A JSON-stat-like response as returned by the Eurostat dissemination API.
///
/// Every field is optional: a payload with a missing `dimension` or `value`
/// is skipped by the normalizer instead of failing to parse.
#[derive(Debug, Default, Deserialize)]
pub struct StatPayload {
    #[serde(default)]
    pub dimension: Option<IndexMap<String, DimensionEntry>>,
    #[serde(default)]
    pub value: Option<ValueContainer>,
    #[serde(default)]
    pub id: Option<IdList>,
    #[serde(default)]
    pub size: Option<Vec<usize>>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DimensionEntry {
    #[serde(default)]
    pub category: Option<Category>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub index: Option<CategoryIndex>,
}

/// `category.index` is either `{label: position}` or a position-ordered label list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CategoryIndex {
    Map(IndexMap<String, usize>),
    List(Vec<String>),
}

impl CategoryIndex {
    /// Normalize to `(label, position)` pairs.
    pub fn pairs(&self) -> Vec<(String, usize)> {
        match self {
            CategoryIndex::Map(m) => m.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            CategoryIndex::List(l) => l.iter().cloned().zip(0..).collect(),
        }
    }

    pub fn position_of(&self, label: &str) -> Option<usize> {
        match self {
            CategoryIndex::Map(m) => m.get(label).copied(),
            CategoryIndex::List(l) => l.iter().position(|s| s == label),
        }
    }
}

/// `id` comes in two shapes: a flat list of dimension names (the JSON-stat
/// norm), or one position tuple per value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IdList {
    Tuples(Vec<Vec<usize>>),
    Names(Vec<String>),
    Other(Value),
}

/// The flat value container: a dense array (with `null` holes) or a sparse
/// object keyed by the stringified flat index.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ValueContainer {
    Dense(Vec<Value>),
    Sparse(IndexMap<String, Value>),
}

impl ValueContainer {
    /// Number of entries physically present in the container.
    pub fn len(&self) -> usize {
        match self {
            ValueContainer::Dense(v) => v.len(),
            ValueContainer::Sparse(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric value at flat index `i`, if present and finite.
    pub fn get(&self, i: usize) -> Option<f64> {
        match self {
            ValueContainer::Dense(v) => v.get(i).and_then(as_number),
            ValueContainer::Sparse(m) => m.get(&i.to_string()).and_then(as_number),
        }
    }

    /// `(flat_index, value)` for every entry, with `None` for nulls and
    /// non-numeric entries. Sparse keys that are not integers are skipped.
    pub fn entries(&self) -> Vec<(usize, Option<f64>)> {
        match self {
            ValueContainer::Dense(v) => v.iter().map(as_number).enumerate().collect(),
            ValueContainer::Sparse(m) => m
                .iter()
                .filter_map(|(k, v)| k.trim().parse::<usize>().ok().map(|i| (i, as_number(v))))
                .collect(),
        }
    }
}

fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

impl StatPayload {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn value_count(&self) -> usize {
        self.value.as_ref().map_or(0, ValueContainer::len)
    }

    /// Declared size of the named dimension, looked up through the `id` name list.
    pub fn dimension_size(&self, name: &str) -> Option<usize> {
        match (&self.id, &self.size) {
            (Some(IdList::Names(names)), Some(sizes)) => names
                .iter()
                .position(|n| n == name)
                .and_then(|i| sizes.get(i).copied()),
            _ => None,
        }
    }
}
