//! Evaluates a generator over every coordinate of a shape.
//!
//! Coordinates are visited in row-major order and carry their linear form, so
//! reshapes and the RNG see the same linear index a loop emitter would supply.

use rayon::prelude::*;

use crate::emitter::ElementGenerator;
use crate::error::Result;
use crate::index::{Index, IndexType};
use crate::literal::Literal;
use crate::shape::Shape;
use crate::value::Value;

fn check_element_type(shape: &Shape, value: &Value, linear: i64) {
    assert_eq!(
        value.element_type(),
        shape.element_type(),
        "generator produced {} at element {linear} of {shape}",
        value.element_type()
    );
}

/// Evaluates `generator` at every coordinate of `shape`, one at a time.
///
/// Stops at the first failure.
///
/// # Panics
///
/// Panics if the generator produces a value of another element type.
pub fn evaluate(shape: &Shape, generator: &ElementGenerator, index_type: IndexType) -> Result<Literal> {
    let dims = shape.dimensions();
    let mut values = Vec::with_capacity(shape.elements() as usize);
    for linear in 0..shape.elements() {
        let value = generator(&Index::from_linear(linear, dims, index_type))?;
        check_element_type(shape, &value, linear);
        values.push(value);
    }
    Ok(Literal::new(shape.clone(), values))
}

/// Parallel [`evaluate`] on the rayon pool.
///
/// When several elements fail, which failure is returned is unspecified.
pub fn par_evaluate(shape: &Shape, generator: &ElementGenerator, index_type: IndexType) -> Result<Literal> {
    let dims = shape.dimensions();
    let values = (0..shape.elements())
        .into_par_iter()
        .map(|linear| {
            let value = generator(&Index::from_linear(linear, dims, index_type))?;
            check_element_type(shape, &value, linear);
            Ok(value)
        })
        .collect::<Result<Vec<Value>>>()?;
    Ok(Literal::new(shape.clone(), values))
}
