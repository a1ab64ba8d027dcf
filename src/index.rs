//! Coordinates into arrays and the shape-changing index transformations.
//!
//! An [`Index`] holds one component per dimension plus, optionally, the
//! equivalent row-major linear index. All arithmetic wraps to the index's
//! fixed bit width ([`IndexType`]); values taken from operand data must be
//! converted explicitly with [`IndexType::from_value`] before use.

use std::ops;

use crate::math::integer;
use crate::shape::Shape;
use crate::value::Value;

/// Bit width of coordinate arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    I32,
    #[default]
    I64,
}

impl IndexType {
    pub fn bit_width(self) -> u32 {
        match self {
            IndexType::I32 => 32,
            IndexType::I64 => 64,
        }
    }

    /// Wraps `v` to this width, keeping two's complement sign.
    #[inline]
    pub fn wrap(self, v: i64) -> i64 {
        match self {
            IndexType::I32 => v as i32 as i64,
            IndexType::I64 => v,
        }
    }

    /// Raw bit pattern of `v` at this width.
    #[inline]
    pub fn bits(self, v: i64) -> u64 {
        integer::truncate(v as u64, self.bit_width())
    }

    /// Signed value of a raw bit pattern at this width.
    #[inline]
    pub fn from_bits(self, bits: u64) -> i64 {
        integer::sign_extend(bits, self.bit_width())
    }

    /// Sign-extends or truncates an integer operand value to this width.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not an integer or predicate.
    pub fn from_value(self, value: &Value) -> i64 {
        let from_width = value.element_type().bit_width();
        let bits = integer::sext_or_trunc(value.int_bits(), from_width, self.bit_width());
        self.from_bits(bits)
    }
}

/// A coordinate into an array of known rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    multidim: Vec<i64>,
    linear: Option<i64>,
    index_type: IndexType,
}

impl Index {
    pub fn new(multidim: Vec<i64>, index_type: IndexType) -> Self {
        let multidim = multidim.into_iter().map(|v| index_type.wrap(v)).collect();
        Index {
            multidim,
            linear: None,
            index_type,
        }
    }

    /// Coordinate that also carries its row-major linear position.
    pub fn with_linear(multidim: Vec<i64>, linear: i64, index_type: IndexType) -> Self {
        let mut index = Index::new(multidim, index_type);
        index.linear = Some(index_type.wrap(linear));
        index
    }

    /// The empty coordinate addressing a scalar.
    pub fn scalar(index_type: IndexType) -> Self {
        Index::new(Vec::new(), index_type)
    }

    /// De-linearizes `linear` against `dimensions` (row-major) and keeps the
    /// linear form.
    pub fn from_linear(linear: i64, dimensions: &[i64], index_type: IndexType) -> Self {
        let multidim = delinearize(linear, dimensions);
        Index::with_linear(multidim, linear, index_type)
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn len(&self) -> usize {
        self.multidim.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multidim.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.multidim
    }

    pub fn linear(&self) -> Option<i64> {
        self.linear
    }

    /// Constant of this index's width.
    pub fn constant(&self, v: i64) -> i64 {
        self.index_type.wrap(v)
    }

    /// Replaces one component. Drops the linear form.
    pub fn set(&mut self, dim: usize, v: i64) {
        self.multidim[dim] = self.index_type.wrap(v);
        self.linear = None;
    }

    pub fn push(&mut self, v: i64) {
        self.multidim.push(self.index_type.wrap(v));
        self.linear = None;
    }

    /// Inserts a component at `pos`, shifting later components right.
    pub fn insert_at(&mut self, pos: usize, v: i64) {
        self.multidim.insert(pos, self.index_type.wrap(v));
        self.linear = None;
    }

    /// Copy without the linear form.
    pub fn without_linear(&self) -> Index {
        Index::new(self.multidim.clone(), self.index_type)
    }

    /// Row-major linear position within `dimensions`.
    pub fn linearize(&self, dimensions: &[i64]) -> i64 {
        if let Some(linear) = self.linear {
            return linear;
        }
        assert_eq!(
            self.multidim.len(),
            dimensions.len(),
            "index rank {} does not match shape rank {}",
            self.multidim.len(),
            dimensions.len()
        );
        let mut linear = 0i64;
        for (&component, &extent) in self.multidim.iter().zip(dimensions) {
            linear = self
                .index_type
                .wrap(linear.wrapping_mul(extent).wrapping_add(component));
        }
        linear
    }

    /// Operand coordinate of a broadcast. `dimensions[i]` is the output
    /// dimension operand dimension `i` maps to; size-1 operand dimensions that
    /// were stretched read index 0.
    pub fn source_index_of_broadcast(
        &self,
        shape: &Shape,
        operand_shape: &Shape,
        dimensions: &[i64],
    ) -> Index {
        assert_eq!(self.len(), shape.rank(), "broadcast index rank mismatch");
        assert_eq!(
            dimensions.len(),
            operand_shape.rank(),
            "broadcast dimension mapping must cover every operand dimension"
        );
        let mut source = Index::scalar(self.index_type);
        for (i, &output_dim) in dimensions.iter().enumerate() {
            let output_dim = output_dim as usize;
            if operand_shape.dimension(i) == 1 && shape.dimension(output_dim) != 1 {
                source.push(0);
            } else {
                source.push(self.multidim[output_dim]);
            }
        }
        source
    }

    /// Operand coordinate of a strided slice: `start + stride * index`.
    pub fn source_index_of_slice(&self, starts: &[i64], strides: &[i64]) -> Index {
        assert_eq!(self.len(), starts.len(), "slice index rank mismatch");
        assert_eq!(starts.len(), strides.len(), "slice starts/strides rank mismatch");
        let multidim = self
            .multidim
            .iter()
            .zip(starts.iter().zip(strides))
            .map(|(&i, (&start, &stride))| start.wrapping_add(stride.wrapping_mul(i)))
            .collect();
        Index::new(multidim, self.index_type)
    }

    /// Operand coordinate of a reshape: linearize against the output shape,
    /// de-linearize against the operand shape. The linear form carries over.
    pub fn source_index_of_reshape(&self, output_shape: &Shape, input_shape: &Shape) -> Index {
        assert_eq!(
            output_shape.elements(),
            input_shape.elements(),
            "reshape must preserve the element count"
        );
        let linear = self.linearize(output_shape.dimensions());
        Index::from_linear(linear, input_shape.dimensions(), self.index_type)
    }

    /// Operand coordinate of a bitcast. Without layouts this is a reshape.
    pub fn source_index_of_bitcast(&self, output_shape: &Shape, input_shape: &Shape) -> Index {
        self.source_index_of_reshape(output_shape, input_shape)
    }

    /// Operand coordinate of a transpose: output dimension `i` is operand
    /// dimension `permutation[i]`.
    pub fn source_index_of_transpose(&self, permutation: &[i64]) -> Index {
        assert_eq!(self.len(), permutation.len(), "transpose index rank mismatch");
        let mut multidim = vec![0i64; permutation.len()];
        for (i, &operand_dim) in permutation.iter().enumerate() {
            multidim[operand_dim as usize] = self.multidim[i];
        }
        Index::new(multidim, self.index_type)
    }

    /// Operand coordinate of a reverse along `dimensions`.
    pub fn source_index_of_reverse(&self, shape: &Shape, dimensions: &[i64]) -> Index {
        let mut source = self.without_linear();
        for &dim in dimensions {
            let dim = dim as usize;
            source.set(dim, (shape.dimension(dim) - 1).wrapping_sub(self.multidim[dim]));
        }
        source
    }
}

impl ops::Index<usize> for Index {
    type Output = i64;

    fn index(&self, dim: usize) -> &i64 {
        &self.multidim[dim]
    }
}

/// Row-major de-linearization.
pub fn delinearize(mut linear: i64, dimensions: &[i64]) -> Vec<i64> {
    let mut multidim = vec![0i64; dimensions.len()];
    for (slot, &extent) in multidim.iter_mut().zip(dimensions).rev() {
        if extent == 0 {
            continue;
        }
        *slot = linear % extent;
        linear /= extent;
    }
    multidim
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::PrimitiveType;

    #[test]
    fn test_wrap_to_i32() {
        let index = Index::new(vec![(1i64 << 32) + 7], IndexType::I32);
        assert_eq!(index[0], 7);
        assert_eq!(IndexType::I32.wrap(0xffff_ffff), -1);
    }

    #[test]
    fn test_index_type_from_value() {
        assert_eq!(IndexType::I64.from_value(&Value::S8(-3)), -3);
        assert_eq!(IndexType::I64.from_value(&Value::U8(200)), -56);
        assert_eq!(IndexType::I32.from_value(&Value::S64(1 << 33 | 4)), 4);
    }

    #[test]
    fn test_linearize_and_delinearize() {
        let dims = [2, 3, 4];
        let index = Index::new(vec![1, 2, 3], IndexType::I64);
        assert_eq!(index.linearize(&dims), 23);
        assert_eq!(delinearize(23, &dims), vec![1, 2, 3]);
    }

    #[test]
    fn test_reverse() {
        let shape = Shape::new(PrimitiveType::F32, &[4, 3]);
        let index = Index::new(vec![1, 0], IndexType::I64);
        let source = index.source_index_of_reverse(&shape, &[0, 1]);
        assert_eq!(source.as_slice(), &[2, 2]);
    }

    #[test]
    fn test_transpose() {
        let index = Index::new(vec![5, 6, 7], IndexType::I64);
        let source = index.source_index_of_transpose(&[2, 0, 1]);
        assert_eq!(source.as_slice(), &[6, 7, 5]);
    }

    #[test]
    fn test_mutation_drops_linear() {
        let mut index = Index::with_linear(vec![0, 1], 1, IndexType::I64);
        assert_eq!(index.linear(), Some(1));
        index.set(1, 0);
        assert_eq!(index.linear(), None);
    }
}
