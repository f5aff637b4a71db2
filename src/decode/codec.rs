// src/decode/codec.rs

use std::collections::HashMap;

/// What a dimension means to the normalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimensionRole {
    Entity,
    Time,
    Unit,
    Other,
}

impl DimensionRole {
    pub fn from_name(name: &str) -> Self {
        match name {
            "geo" => DimensionRole::Entity,
            "time" => DimensionRole::Time,
            "unit" => DimensionRole::Unit,
            _ => DimensionRole::Other,
        }
    }
}

/// One declared dimension: its name and the position → label lookup.
#[derive(Clone, Debug, Default)]
pub struct Axis {
    pub name: String,
    pub labels: HashMap<usize, String>,
}

impl Axis {
    pub fn new(name: impl Into<String>, index: &[(String, usize)]) -> Self {
        Self {
            name: name.into(),
            labels: reverse_index(index),
        }
    }

    pub fn label(&self, position: usize) -> Option<&str> {
        self.labels.get(&position).map(String::as_str)
    }
}

/// Invert a `label → position` index.
pub fn reverse_index(index: &[(String, usize)]) -> HashMap<usize, String> {
    index.iter().map(|(label, pos)| (*pos, label.clone())).collect()
}

/// Row-major strides: the last dimension varies fastest.
///
/// `stride[last] = 1` and `stride[d] = stride[d + 1] * size[d + 1]`.
pub fn strides(sizes: &[usize]) -> Vec<usize> {
    let mut out = vec![0; sizes.len()];
    let mut stride = 1usize;
    for d in (0..sizes.len()).rev() {
        out[d] = stride;
        stride = stride.saturating_mul(sizes[d]);
    }
    out
}

/// Position along each dimension for flat index `flat`:
/// `floor(flat / stride[d]) % size[d]`.
///
/// A zero-sized dimension, and every dimension whose stride it collapsed to
/// zero, yields position 0.
pub fn unravel(flat: usize, strides: &[usize], sizes: &[usize]) -> Vec<usize> {
    strides
        .iter()
        .zip(sizes)
        .map(|(&stride, &size)| {
            if size == 0 || stride == 0 {
                0
            } else {
                (flat / stride) % size
            }
        })
        .collect()
}

/// Where entity, time and (optionally) unit sit among `count` declared
/// dimensions. Entity and time fall back to the last two positions when the
/// names do not declare them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisRoles {
    pub entity: usize,
    pub time: usize,
    pub unit: Option<usize>,
}

impl AxisRoles {
    pub fn resolve<S: AsRef<str>>(names: &[S], count: usize) -> Option<Self> {
        let find = |role: DimensionRole| {
            names
                .iter()
                .take(count)
                .position(|n| DimensionRole::from_name(n.as_ref()) == role)
        };
        let unit = find(DimensionRole::Unit);
        match (find(DimensionRole::Entity), find(DimensionRole::Time)) {
            (Some(entity), Some(time)) => Some(Self { entity, time, unit }),
            _ if count >= 2 => Some(Self {
                entity: count - 2,
                time: count - 1,
                unit,
            }),
            _ => None,
        }
    }
}

/// Reverse maps plus stride arithmetic for one decoded response.
#[derive(Clone, Debug, Default)]
pub struct IndexCodec {
    pub axes: Vec<Axis>,
    pub sizes: Vec<usize>,
    pub strides: Vec<usize>,
}

impl IndexCodec {
    /// Build from declared axes and dimension sizes. Without sizes or axes the
    /// codec is empty and decodes nothing.
    pub fn new(axes: Vec<Axis>, sizes: Option<&[usize]>) -> Self {
        match sizes {
            Some(sizes) if !sizes.is_empty() && !axes.is_empty() => Self {
                strides: strides(sizes),
                sizes: sizes.to_vec(),
                axes,
            },
            _ => Self::default(),
        }
    }

    pub fn positions(&self, flat: usize) -> Vec<usize> {
        unravel(flat, &self.strides, &self.sizes)
    }

    /// Label on `axis` for flat index `flat`. `None` when the axis is empty or
    /// sits before an empty one (stride 0): no flat index addresses it.
    pub fn label(&self, flat: usize, axis: usize) -> Option<&str> {
        let stride = *self.strides.get(axis)?;
        let size = *self.sizes.get(axis)?;
        if stride == 0 || size == 0 {
            return None;
        }
        self.axes.get(axis)?.label((flat / stride) % size)
    }
}
