//! Concrete arrays: leaf inputs and evaluation results.

use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};

use crate::emitter::ElementGenerator;
use crate::index::Index;
use crate::shape::{PrimitiveType, Shape};
use crate::value::Value;

/// A shaped array of values stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    shape: Shape,
    data: ArrayD<Value>,
}

fn to_ix(dimensions: &[i64]) -> IxDyn {
    let dims: Vec<usize> = dimensions.iter().map(|&d| d as usize).collect();
    IxDyn(&dims)
}

impl Literal {
    /// Builds a literal from row-major `values`.
    ///
    /// # Panics
    ///
    /// Panics if the value count does not match the shape or a value has the
    /// wrong element type.
    pub fn new(shape: Shape, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len() as i64,
            shape.elements(),
            "{} values supplied for shape {}",
            values.len(),
            shape
        );
        if let Some(bad) = values
            .iter()
            .find(|v| v.element_type() != shape.element_type())
        {
            panic!(
                "value of type {} in literal of shape {}",
                bad.element_type(),
                shape
            );
        }
        let data = ArrayD::from_shape_vec(to_ix(shape.dimensions()), values)
            .unwrap_or_else(|e| panic!("cannot lay out literal of shape {shape}: {e}"));
        Literal { shape, data }
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        let value = value.into();
        Literal::new(Shape::scalar(value.element_type()), vec![value])
    }

    /// Rank-1 literal.
    pub fn vector<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let element_type = values
            .first()
            .map(Value::element_type)
            .unwrap_or(PrimitiveType::F32);
        let shape = Shape::new(element_type, &[values.len() as i64]);
        Literal::new(shape, values)
    }

    /// Literal of the given dimensions from row-major native values.
    pub fn from_vec<T: Into<Value>>(dimensions: &[i64], values: Vec<T>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let element_type = values
            .first()
            .map(Value::element_type)
            .unwrap_or(PrimitiveType::F32);
        Literal::new(Shape::new(element_type, dimensions), values)
    }

    /// Literal from an `ndarray` array of native values.
    pub fn from_array<T: Clone + Into<Value>>(array: &ArrayD<T>) -> Self {
        let dimensions: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
        let values: Vec<Value> = array.iter().cloned().map(Into::into).collect();
        Literal::from_vec(&dimensions, values)
    }

    /// Literal whose elements are `f(coordinate)`.
    pub fn from_fn(shape: Shape, mut f: impl FnMut(&[i64]) -> Value) -> Self {
        let values = (0..shape.elements())
            .map(|linear| f(&crate::index::delinearize(linear, shape.dimensions())))
            .collect();
        Literal::new(shape, values)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &ArrayD<Value> {
        &self.data
    }

    /// Element at a coordinate.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds.
    pub fn get(&self, coordinate: &[i64]) -> Value {
        assert_eq!(
            coordinate.len(),
            self.shape.rank(),
            "coordinate {coordinate:?} does not match shape {}",
            self.shape
        );
        let ix: Vec<usize> = coordinate
            .iter()
            .map(|&c| {
                usize::try_from(c).unwrap_or_else(|_| {
                    panic!("coordinate {coordinate:?} out of bounds for {}", self.shape)
                })
            })
            .collect();
        match self.data.get(IxDyn(&ix)) {
            Some(value) => *value,
            None => panic!("coordinate {coordinate:?} out of bounds for {}", self.shape),
        }
    }

    /// Values in row-major order.
    pub fn values(&self) -> Vec<Value> {
        self.data.iter().copied().collect()
    }

    /// Real values as `f64`, row-major. `None` if any element is complex.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        self.data.iter().map(Value::as_f64).collect()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.shape)?;
        for (i, v) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match v.as_f64() {
                Some(x) => write!(f, "{x}")?,
                None => write!(f, "{v:?}")?,
            }
        }
        write!(f, "}}")
    }
}

/// Generator that loads elements from `literal`.
pub fn literal_generator(literal: Arc<Literal>) -> ElementGenerator {
    Arc::new(move |index: &Index| Ok(literal.get(index.as_slice())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexType;

    #[test]
    fn test_row_major_layout() {
        let literal = Literal::from_vec(&[2, 3], vec![1i32, 2, 3, 4, 5, 6]);
        assert_eq!(literal.get(&[1, 0]), Value::S32(4));
        assert_eq!(literal.get(&[0, 2]), Value::S32(3));
    }

    #[test]
    fn test_literal_generator_reads_coordinates() {
        let literal = Arc::new(Literal::vector([1.5f32, 2.5]));
        let generator = literal_generator(literal);
        let value = generator(&Index::new(vec![1], IndexType::I64)).unwrap();
        assert_eq!(value, Value::F32(2.5));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_out_of_bounds_panics() {
        Literal::vector([1u32, 2]).get(&[2]);
    }

    #[test]
    fn test_from_fn() {
        let shape = Shape::new(PrimitiveType::S64, &[2, 2]);
        let literal = Literal::from_fn(shape, |c| Value::S64(c[0] * 10 + c[1]));
        assert_eq!(
            literal.values(),
            vec![Value::S64(0), Value::S64(1), Value::S64(10), Value::S64(11)]
        );
    }
}
