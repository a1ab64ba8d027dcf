//! Dot, concatenate, dynamic slicing, gather, select and clamp evaluated end to end.
//!
//! Dot results are compared with `ndarray`'s matrix product.

use std::sync::Arc;

use elemental::{
    evaluate, literal_generator, DotDimensionNumbers, ElementalIrEmitter, GatherDimensionNumbers,
    HloInstruction, HloModule, HloToElementGeneratorMap, Literal, ModuleConfig, PrimitiveType,
    Shape, Value,
};
use ndarray::{array, Array2};

/// Module plus the literals bound to its parameters.
struct Graph {
    module: Arc<HloModule>,
    generators: HloToElementGeneratorMap,
}

impl Graph {
    fn new() -> Self {
        Graph {
            module: Arc::new(HloModule::new("structured_ops", ModuleConfig::default())),
            generators: HloToElementGeneratorMap::new(),
        }
    }

    fn parameter(&mut self, literal: Literal) -> Arc<HloInstruction> {
        let p = self.module.parameter(literal.shape().clone());
        self.generators
            .insert(p.id(), literal_generator(Arc::new(literal)));
        p
    }

    fn run(&self, op: &Arc<HloInstruction>) -> Literal {
        let emitter = ElementalIrEmitter::new(Arc::clone(&self.module));
        let generator = emitter.make_element_generator(op, &self.generators);
        evaluate(op.shape(), &generator, emitter.index_type()).unwrap()
    }
}

fn s32s(values: &[i32]) -> Vec<Value> {
    values.iter().copied().map(Value::S32).collect()
}

fn matmul_numbers() -> DotDimensionNumbers {
    DotDimensionNumbers {
        lhs_contracting_dimensions: vec![1],
        rhs_contracting_dimensions: vec![0],
    }
}

#[test]
fn test_dot_matches_ndarray() {
    let lhs: Array2<f64> = array![[1.0, -2.0, 3.0], [0.5, 4.0, -1.0]];
    let rhs: Array2<f64> = array![
        [2.0, 0.0, 1.0, -1.0],
        [1.0, 3.0, -2.0, 0.5],
        [0.0, 1.0, 4.0, 2.0]
    ];
    let mut graph = Graph::new();
    let l = graph.parameter(Literal::from_array(&lhs.clone().into_dyn()));
    let r = graph.parameter(Literal::from_array(&rhs.clone().into_dyn()));
    let dot = graph.module.dot(&l, &r, matmul_numbers());
    assert_eq!(dot.shape().dimensions(), &[2, 4]);

    let result = graph.run(&dot).to_f64_vec().unwrap();
    let expected: Vec<f64> = lhs.dot(&rhs).iter().copied().collect();
    assert_eq!(result, expected);
}

#[test]
fn test_dot_contracting_lhs_rows() {
    // lhs^T . rhs with lhs [3, 2] contracted along dimension 0.
    let mut graph = Graph::new();
    let l = graph.parameter(Literal::from_vec(&[3, 2], vec![1i32, 2, 3, 4, 5, 6]));
    let r = graph.parameter(Literal::from_vec(&[3, 1], vec![1i32, 1, 1]));
    let dot = graph.module.dot(
        &l,
        &r,
        DotDimensionNumbers {
            lhs_contracting_dimensions: vec![0],
            rhs_contracting_dimensions: vec![0],
        },
    );
    assert_eq!(graph.run(&dot).values(), s32s(&[9, 12]));
}

#[test]
fn test_complex_dot() {
    use num::complex::Complex;
    let mut graph = Graph::new();
    let l = graph.parameter(Literal::from_vec(
        &[1, 2],
        vec![Complex::new(1.0f32, 1.0), Complex::new(0.0, 2.0)],
    ));
    let r = graph.parameter(Literal::from_vec(
        &[2, 1],
        vec![Complex::new(2.0f32, 0.0), Complex::new(1.0, -1.0)],
    ));
    let dot = graph.module.dot(&l, &r, matmul_numbers());
    // (1+i)*2 + 2i*(1-i) = 2+2i + 2+2i
    assert_eq!(
        graph.run(&dot).values(),
        vec![Value::C64(Complex::new(4.0, 4.0))]
    );
}

#[test]
fn test_pred_dot_of_matching_lanes_is_true() {
    let mut graph = Graph::new();
    let l = graph.parameter(Literal::from_vec(&[1, 2], vec![true, true]));
    let r = graph.parameter(Literal::from_vec(&[2, 1], vec![true, true]));
    let dot = graph.module.dot(&l, &r, matmul_numbers());
    assert_eq!(graph.run(&dot).values(), vec![Value::Pred(true)]);

    let l = graph.parameter(Literal::from_vec(&[1, 2], vec![true, false]));
    let r = graph.parameter(Literal::from_vec(&[2, 1], vec![false, true]));
    let dot = graph.module.dot(&l, &r, matmul_numbers());
    assert_eq!(graph.run(&dot).values(), vec![Value::Pred(false)]);
}

#[test]
fn test_f16_dot_rounds_each_product() {
    use half::f16;
    // (1 + 2^-10)^2 rounds to 1 + 2^-9 in f16, so 3 + product lands on the
    // tie 4 + 2^-9 and rounds to even. Unrounded, it would round up.
    let one_plus_ulp = f16::from_f32(1.0 + 2.0f32.powi(-10));
    let mut graph = Graph::new();
    let l = graph.parameter(Literal::new(
        Shape::new(PrimitiveType::F16, &[1, 2]),
        vec![Value::F16(f16::from_f32(3.0)), Value::F16(one_plus_ulp)],
    ));
    let r = graph.parameter(Literal::new(
        Shape::new(PrimitiveType::F16, &[2, 1]),
        vec![Value::F16(f16::ONE), Value::F16(one_plus_ulp)],
    ));
    let dot = graph.module.dot(&l, &r, matmul_numbers());
    assert_eq!(graph.run(&dot).values(), vec![Value::F16(f16::from_f32(4.0))]);
}

#[test]
fn test_concatenate() {
    let mut graph = Graph::new();
    let a = graph.parameter(Literal::from_vec(&[2, 1], vec![1i32, 4]));
    let b = graph.parameter(Literal::from_vec(&[2, 2], vec![2i32, 3, 5, 6]));
    let concat = graph.module.concatenate(&[a, b], 1);
    assert_eq!(concat.shape().dimensions(), &[2, 3]);
    assert_eq!(graph.run(&concat).values(), s32s(&[1, 2, 3, 4, 5, 6]));
}

#[test]
fn test_concatenate_skips_empty_operand() {
    let mut graph = Graph::new();
    let a = graph.parameter(Literal::vector([1i32, 2]));
    let empty = graph.parameter(Literal::new(Shape::new(PrimitiveType::S32, &[0]), vec![]));
    let b = graph.parameter(Literal::vector([3i32]));
    let concat = graph.module.concatenate(&[a, empty, b], 0);
    assert_eq!(graph.run(&concat).values(), s32s(&[1, 2, 3]));
}

fn dynamic_slice_of_iota(start: Literal) -> Vec<Value> {
    let mut graph = Graph::new();
    let operand = graph.parameter(Literal::vector([0i32, 1, 2, 3, 4]));
    let starts = graph.parameter(start);
    let slice = graph.module.dynamic_slice(&operand, &starts, &[3]);
    graph.run(&slice).values()
}

#[test]
fn test_dynamic_slice_clamps_start() {
    assert_eq!(dynamic_slice_of_iota(Literal::vector([1i32])), s32s(&[1, 2, 3]));
    assert_eq!(dynamic_slice_of_iota(Literal::vector([3i32])), s32s(&[2, 3, 4]));
    assert_eq!(dynamic_slice_of_iota(Literal::vector([-1i32])), s32s(&[0, 1, 2]));
    // Unsigned starts never clamp to zero from above.
    assert_eq!(
        dynamic_slice_of_iota(Literal::vector([u32::MAX])),
        s32s(&[2, 3, 4])
    );
}

#[test]
fn test_dynamic_slice_2d() {
    let mut graph = Graph::new();
    let operand = graph.parameter(Literal::from_vec(&[3, 3], (0..9).collect::<Vec<i32>>()));
    let starts = graph.parameter(Literal::vector([1i64, 1]));
    let slice = graph.module.dynamic_slice(&operand, &starts, &[2, 2]);
    assert_eq!(graph.run(&slice).values(), s32s(&[4, 5, 7, 8]));
}

#[test]
fn test_dynamic_update_slice() {
    let mut graph = Graph::new();
    let operand = graph.parameter(Literal::from_vec(&[2, 3], vec![0i32; 6]));
    let update = graph.parameter(Literal::from_vec(&[1, 2], vec![7i32, 8]));
    // Column start 5 clamps to 1.
    let starts = graph.parameter(Literal::vector([1i32, 5]));
    let dus = graph.module.dynamic_update_slice(&operand, &update, &starts);
    assert_eq!(graph.run(&dus).values(), s32s(&[0, 0, 0, 0, 7, 8]));
}

#[test]
fn test_dynamic_update_slice_negative_start() {
    let mut graph = Graph::new();
    let operand = graph.parameter(Literal::vector([1.0f32, 2.0, 3.0, 4.0]));
    let update = graph.parameter(Literal::vector([-1.0f32, -2.0]));
    let starts = graph.parameter(Literal::vector([-7i32]));
    let dus = graph.module.dynamic_update_slice(&operand, &update, &starts);
    assert_eq!(
        graph.run(&dus).to_f64_vec().unwrap(),
        vec![-1.0, -2.0, 3.0, 4.0]
    );
}

fn gather_rows(row_indices: Vec<i32>) -> Literal {
    let mut graph = Graph::new();
    let operand = graph.parameter(Literal::from_vec(&[3, 3], (1..=9).collect::<Vec<i32>>()));
    let count = row_indices.len() as i64;
    let indices = graph.parameter(Literal::from_vec(&[count], row_indices));
    let gather = graph.module.gather(
        Shape::new(PrimitiveType::S32, &[count, 3]),
        &operand,
        &indices,
        GatherDimensionNumbers {
            offset_dims: vec![1],
            collapsed_slice_dims: vec![0],
            start_index_map: vec![0],
            index_vector_dim: 1,
        },
        &[1, 3],
    );
    graph.run(&gather)
}

#[test]
fn test_gather_rows() {
    assert_eq!(gather_rows(vec![0, 2]).values(), s32s(&[1, 2, 3, 7, 8, 9]));
}

#[test]
fn test_gather_clamps_out_of_range_rows() {
    assert_eq!(gather_rows(vec![5, -1]).values(), s32s(&[7, 8, 9, 1, 2, 3]));
}

#[test]
fn test_gather_windows_with_index_vectors() {
    // Each index vector [row, col] selects a 2x2 window.
    let mut graph = Graph::new();
    let operand = graph.parameter(Literal::from_vec(&[3, 3], (1..=9).collect::<Vec<i32>>()));
    let indices = graph.parameter(Literal::from_vec(&[2, 2], vec![0i32, 1, 1, 0]));
    let gather = graph.module.gather(
        Shape::new(PrimitiveType::S32, &[2, 2, 2]),
        &operand,
        &indices,
        GatherDimensionNumbers {
            offset_dims: vec![1, 2],
            collapsed_slice_dims: vec![],
            start_index_map: vec![0, 1],
            index_vector_dim: 1,
        },
        &[2, 2],
    );
    assert_eq!(
        graph.run(&gather).values(),
        s32s(&[2, 3, 5, 6, 4, 5, 7, 8])
    );
}

#[test]
fn test_select_broadcasts_scalar_predicate() {
    let mut graph = Graph::new();
    let pred = graph.parameter(Literal::vector([true, false, true]));
    let on_true = graph.parameter(Literal::vector([1i32, 2, 3]));
    let on_false = graph.parameter(Literal::scalar(-1i32));
    let select = graph
        .module
        .select(on_true.shape().clone(), &pred, &on_true, &on_false);
    assert_eq!(graph.run(&select).values(), s32s(&[1, -1, 3]));
}

#[test]
fn test_clamp() {
    let mut graph = Graph::new();
    let lo = graph.parameter(Literal::scalar(0i32));
    let x = graph.parameter(Literal::vector([-5i32, 3, 12]));
    let hi = graph.parameter(Literal::scalar(10i32));
    let clamp = graph.module.clamp(x.shape().clone(), &lo, &x, &hi);
    assert_eq!(graph.run(&clamp).values(), s32s(&[0, 3, 10]));
}

#[test]
fn test_clamp_unsigned_and_float() {
    let mut graph = Graph::new();
    let lo = graph.parameter(Literal::scalar(2u32));
    let x = graph.parameter(Literal::vector([u32::MAX, 1]));
    let hi = graph.parameter(Literal::scalar(5u32));
    let clamp = graph.module.clamp(x.shape().clone(), &lo, &x, &hi);
    assert_eq!(graph.run(&clamp).values(), vec![Value::U32(5), Value::U32(2)]);

    let mut graph = Graph::new();
    let lo = graph.parameter(Literal::scalar(-1.0f64));
    let x = graph.parameter(Literal::vector([-3.0f64, 0.25, 9.0]));
    let hi = graph.parameter(Literal::scalar(1.0f64));
    let clamp = graph.module.clamp(x.shape().clone(), &lo, &x, &hi);
    assert_eq!(
        graph.run(&clamp).to_f64_vec().unwrap(),
        vec![-1.0, 0.25, 1.0]
    );
}

#[test]
fn test_clamp_on_pred_is_unimplemented() {
    let mut graph = Graph::new();
    let lo = graph.parameter(Literal::scalar(false));
    let x = graph.parameter(Literal::vector([true]));
    let hi = graph.parameter(Literal::scalar(true));
    let clamp = graph.module.clamp(x.shape().clone(), &lo, &x, &hi);
    let emitter = ElementalIrEmitter::new(Arc::clone(&graph.module));
    let generator = emitter.make_element_generator(&clamp, &graph.generators);
    let err = evaluate(clamp.shape(), &generator, emitter.index_type()).unwrap_err();
    assert!(err.is_unimplemented());
    assert!(err.message().contains("Clamp"));
}
