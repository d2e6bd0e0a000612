//! Estimate collections.
//!
//! [`Values`] is the ordered, index-addressable collection of manifold values an optimizer
//! works on. Each inserted value gets a [`VariableId`], a typed position that stays valid for
//! the lifetime of the collection: values are never removed or reordered.
//!
//! [`TangentValues`] holds one tangent vector per variable. Gradients and optimizer steps are
//! both `TangentValues`, and they flatten into a single `DVector` by concatenating the
//! per-variable tangents in insertion order.
//!
//! ```
//! use pose_fusion::core::values::{TangentValues, Values};
//! use pose_fusion::manifold::se2::{SE2, SE2Tangent};
//!
//! let mut values = Values::new();
//! let x0 = values.insert(SE2::from_xy_angle(0.0, 0.0, 0.0));
//! let x1 = values.insert(SE2::from_xy_angle(1.0, 0.0, 0.0));
//!
//! let step = TangentValues::from_vec(vec![
//!     SE2Tangent::new(0.5, 0.0, 0.0),
//!     SE2Tangent::new(0.0, 0.5, 0.0),
//! ]);
//! values.move_along(&step).unwrap();
//!
//! assert_eq!(values[x0].x(), 0.5);
//! assert_eq!(values[x1].y(), 0.5);
//! ```

use crate::core::{CoreError, CoreResult};
use crate::manifold::{LieGroup, Tangent, se2::SE2, se3::SE3};
use nalgebra::DVector;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Typed position of a variable inside a [`Values`] collection.
pub struct VariableId<G> {
    index: usize,
    _group: PhantomData<fn() -> G>,
}

impl<G> VariableId<G> {
    pub(crate) fn new(index: usize) -> Self {
        VariableId {
            index,
            _group: PhantomData,
        }
    }

    /// Position of the variable in insertion order.
    pub fn index(&self) -> usize {
        self.index
    }
}

// Manual impls: deriving would require `G: Clone + PartialEq + ...`.
impl<G> Clone for VariableId<G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G> Copy for VariableId<G> {}

impl<G> PartialEq for VariableId<G> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<G> Eq for VariableId<G> {}

impl<G> Hash for VariableId<G> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<G> fmt::Debug for VariableId<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VariableId({})", self.index)
    }
}

impl<G> fmt::Display for VariableId<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.index)
    }
}

/// Ordered collection of current estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct Values<G> {
    values: Vec<G>,
}

impl<G> Default for Values<G> {
    fn default() -> Self {
        Values { values: Vec::new() }
    }
}

impl<G: LieGroup> Values<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its stable id.
    pub fn insert(&mut self, value: G) -> VariableId<G> {
        self.values.push(value);
        VariableId::new(self.values.len() - 1)
    }

    pub fn get(&self, id: VariableId<G>) -> Option<&G> {
        self.values.get(id.index)
    }

    pub fn get_mut(&mut self, id: VariableId<G>) -> Option<&mut G> {
        self.values.get_mut(id.index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, G> {
        self.values.iter()
    }

    /// Ids of all variables, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = VariableId<G>> + '_ {
        (0..self.values.len()).map(VariableId::new)
    }

    pub fn as_slice(&self) -> &[G] {
        &self.values
    }

    /// Total tangent dimension: number of variables times the group's DOF.
    pub fn tangent_dim(&self) -> usize {
        self.values.len() * G::TangentVector::DIM
    }

    /// Retract every variable along its own tangent, returning the moved collection.
    pub fn retract(&self, along: &TangentValues<G>) -> CoreResult<Values<G>> {
        let mut moved = self.clone();
        moved.move_along(along)?;
        Ok(moved)
    }

    /// Retract every variable in place along its own tangent.
    ///
    /// Rotation parts are re-normalized by [`LieGroup::retract`].
    pub fn move_along(&mut self, along: &TangentValues<G>) -> CoreResult<()> {
        if along.len() != self.values.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "{} tangents for {} variables",
                along.len(),
                self.values.len()
            ))
            .log());
        }

        for (value, tangent) in self.values.iter_mut().zip(along.iter()) {
            *value = value.retract(tangent, None, None);
        }
        Ok(())
    }

    /// Tangent offsets of every variable of `other` as seen from `self`.
    pub fn local_coordinates(&self, other: &Values<G>) -> CoreResult<TangentValues<G>> {
        if other.len() != self.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "{} variables against {}",
                other.len(),
                self.len()
            ))
            .log());
        }

        Ok(TangentValues::from_vec(
            self.values
                .iter()
                .zip(other.iter())
                .map(|(from, to)| from.local_coordinate(to, None, None))
                .collect(),
        ))
    }
}

impl<G> Index<VariableId<G>> for Values<G> {
    type Output = G;

    fn index(&self, id: VariableId<G>) -> &G {
        &self.values[id.index]
    }
}

impl<G> IndexMut<VariableId<G>> for Values<G> {
    fn index_mut(&mut self, id: VariableId<G>) -> &mut G {
        &mut self.values[id.index]
    }
}

impl<G> From<Vec<G>> for Values<G> {
    fn from(values: Vec<G>) -> Self {
        Values { values }
    }
}

impl<G> FromIterator<G> for Values<G> {
    fn from_iter<I: IntoIterator<Item = G>>(iter: I) -> Self {
        Values {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a, G> IntoIterator for &'a Values<G> {
    type Item = &'a G;
    type IntoIter = std::slice::Iter<'a, G>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl Values<SE2> {
    /// `[x, y, angle]` per pose, in insertion order.
    pub fn to_triples(&self) -> Vec<[f64; 3]> {
        self.values.iter().map(SE2::to_xy_angle).collect()
    }

    /// The triples of [`Values::to_triples`] as a JSON array of arrays.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(&self.to_triples()).map_err(|e| {
            CoreError::InvalidInput("Failed to serialize pose triples".to_string())
                .log_with_source(e)
        })
    }
}

impl Values<SE3> {
    /// `[x, y, z, qw, qx, qy, qz]` per pose, in insertion order.
    pub fn to_rows(&self) -> Vec<[f64; 7]> {
        self.values.iter().map(SE3::coeffs).collect()
    }
}

/// One tangent vector per variable of a [`Values`] collection.
#[derive(Debug, Clone, PartialEq)]
pub struct TangentValues<G: LieGroup> {
    tangents: Vec<G::TangentVector>,
}

impl<G: LieGroup> TangentValues<G> {
    /// `len` zero tangents.
    pub fn zeros(len: usize) -> Self {
        TangentValues {
            tangents: vec![G::TangentVector::zero(); len],
        }
    }

    pub fn from_vec(tangents: Vec<G::TangentVector>) -> Self {
        TangentValues { tangents }
    }

    /// Split a flat vector into `DIM`-sized tangents.
    pub fn from_dvector(data: &DVector<f64>) -> CoreResult<Self> {
        let dim = G::TangentVector::DIM;
        if data.len() % dim != 0 {
            return Err(CoreError::DimensionMismatch(format!(
                "vector of length {} is not a multiple of tangent dimension {dim}",
                data.len()
            ))
            .log());
        }

        let tangents = data
            .as_slice()
            .chunks(dim)
            .map(|chunk| {
                G::TangentVector::from_slice(chunk).map_err(|e| {
                    CoreError::DimensionMismatch("Invalid tangent block".to_string())
                        .log_with_source(e)
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(TangentValues { tangents })
    }

    pub fn len(&self) -> usize {
        self.tangents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tangents.is_empty()
    }

    pub fn get(&self, id: VariableId<G>) -> Option<&G::TangentVector> {
        self.tangents.get(id.index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, G::TangentVector> {
        self.tangents.iter()
    }

    pub fn as_slice(&self) -> &[G::TangentVector] {
        &self.tangents
    }

    /// Every tangent multiplied by `by`.
    pub fn scaled(&self, by: f64) -> Self {
        TangentValues {
            tangents: self.tangents.iter().map(|t| t.clone() * by).collect(),
        }
    }

    /// Element-wise sum.
    pub fn add(&self, other: &Self) -> CoreResult<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise difference.
    pub fn sub(&self, other: &Self) -> CoreResult<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn squared_norm(&self) -> f64 {
        self.tangents.iter().map(|tangent| tangent.squared_norm()).sum()
    }

    pub fn norm(&self) -> f64 {
        self.squared_norm().sqrt()
    }

    /// Concatenated components, in insertion order.
    pub fn to_dvector(&self) -> DVector<f64> {
        let dim = G::TangentVector::DIM;
        let mut data = DVector::zeros(self.tangents.len() * dim);
        for (i, tangent) in self.tangents.iter().enumerate() {
            data.rows_mut(i * dim, dim).copy_from(&tangent.to_dvector());
        }
        data
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.to_dvector().iter().all(|value| value.is_finite())
    }

    fn zip_with(
        &self,
        other: &Self,
        op: impl Fn(G::TangentVector, G::TangentVector) -> G::TangentVector,
    ) -> CoreResult<Self> {
        if self.len() != other.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "{} tangents against {}",
                self.len(),
                other.len()
            ))
            .log());
        }

        Ok(TangentValues {
            tangents: self
                .tangents
                .iter()
                .zip(other.tangents.iter())
                .map(|(a, b)| op(a.clone(), b.clone()))
                .collect(),
        })
    }
}

impl<G: LieGroup> Index<VariableId<G>> for TangentValues<G> {
    type Output = G::TangentVector;

    fn index(&self, id: VariableId<G>) -> &G::TangentVector {
        &self.tangents[id.index]
    }
}
