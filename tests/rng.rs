//! Philox RNG: reproducibility under fixed seeds and the distribution transforms.

use std::collections::HashSet;
use std::sync::Arc;

use elemental::{
    evaluate, literal_generator, par_evaluate, ElementGenerator, ElementalIrEmitter,
    HloInstruction, HloModule, HloToElementGeneratorMap, IndexType, Literal, ModuleConfig,
    PrimitiveType, RandomDistribution, Result, Shape, Value,
};

/// Builds an RNG over `shape` with scalar parameters `a` and `b` and returns
/// its generator.
fn rng_generator(
    module: &Arc<HloModule>,
    shape: Shape,
    distribution: RandomDistribution,
    a: Value,
    b: Value,
) -> (Arc<HloInstruction>, ElementGenerator) {
    let pa = module.parameter(Shape::scalar(a.element_type()));
    let pb = module.parameter(Shape::scalar(b.element_type()));
    let rng = module.rng(shape, distribution, &pa, &pb);
    let mut generators = HloToElementGeneratorMap::new();
    generators.insert(pa.id(), literal_generator(Arc::new(Literal::scalar(a))));
    generators.insert(pb.id(), literal_generator(Arc::new(Literal::scalar(b))));
    let generator = ElementalIrEmitter::new(Arc::clone(module)).make_element_generator(&rng, &generators);
    (rng, generator)
}

fn sample(
    config: ModuleConfig,
    shape: Shape,
    distribution: RandomDistribution,
    a: Value,
    b: Value,
) -> Result<Literal> {
    let index_type = config.index_type;
    let module = Arc::new(HloModule::new("rng", config));
    let (rng, generator) = rng_generator(&module, shape, distribution, a, b);
    evaluate(rng.shape(), &generator, index_type)
}

fn f32s(literal: &Literal) -> Vec<f32> {
    literal
        .values()
        .into_iter()
        .map(|v| match v {
            Value::F32(x) => x,
            other => panic!("unexpected {other:?}"),
        })
        .collect()
}

#[test]
fn test_same_seed_same_sequence() {
    let shape = Shape::new(PrimitiveType::F32, &[4, 8]);
    let draw = || {
        sample(
            ModuleConfig::default().with_seed(1234),
            shape.clone(),
            RandomDistribution::Uniform,
            Value::F32(0.0),
            Value::F32(1.0),
        )
        .unwrap()
    };
    assert_eq!(draw(), draw());
}

#[test]
fn test_different_seeds_differ() {
    let shape = Shape::new(PrimitiveType::U32, &[16]);
    let draw = |seed| {
        sample(
            ModuleConfig::default().with_seed(seed),
            shape.clone(),
            RandomDistribution::Uniform,
            Value::U32(0),
            Value::U32(u32::MAX),
        )
        .unwrap()
    };
    assert_ne!(draw(1), draw(2));
}

#[test]
fn test_instructions_in_one_module_draw_distinct_keys() {
    let module = Arc::new(HloModule::new("rng", ModuleConfig::default().with_seed(5)));
    let shape = Shape::new(PrimitiveType::F32, &[8]);
    let (first, g1) = rng_generator(
        &module,
        shape.clone(),
        RandomDistribution::Uniform,
        Value::F32(0.0),
        Value::F32(1.0),
    );
    let (second, g2) = rng_generator(
        &module,
        shape,
        RandomDistribution::Uniform,
        Value::F32(0.0),
        Value::F32(1.0),
    );
    let a = evaluate(first.shape(), &g1, IndexType::I64).unwrap();
    let b = evaluate(second.shape(), &g2, IndexType::I64).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_generator_is_pure() {
    let module = Arc::new(HloModule::new("rng", ModuleConfig::default()));
    let (rng, generator) = rng_generator(
        &module,
        Shape::new(PrimitiveType::F64, &[3, 5]),
        RandomDistribution::Uniform,
        Value::F64(-1.0),
        Value::F64(1.0),
    );
    let first = evaluate(rng.shape(), &generator, IndexType::I64).unwrap();
    let again = evaluate(rng.shape(), &generator, IndexType::I64).unwrap();
    let parallel = par_evaluate(rng.shape(), &generator, IndexType::I64).unwrap();
    assert_eq!(first, again);
    assert_eq!(first, parallel);
}

#[test]
fn test_uniform_float_range() {
    let result = sample(
        ModuleConfig::default().with_seed(99),
        Shape::new(PrimitiveType::F32, &[1024]),
        RandomDistribution::Uniform,
        Value::F32(-2.0),
        Value::F32(3.0),
    )
    .unwrap();
    let values = f32s(&result);
    assert!(values.iter().all(|&x| (-2.0..=3.0).contains(&x)));
    let distinct: HashSet<u32> = values.iter().map(|x| x.to_bits()).collect();
    assert!(distinct.len() > 1000);
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    assert!((mean - 0.5).abs() < 0.25, "mean {mean}");
}

#[test]
fn test_uniform_f16_and_f64() {
    let halves = sample(
        ModuleConfig::default(),
        Shape::new(PrimitiveType::F16, &[64]),
        RandomDistribution::Uniform,
        Value::F16(half::f16::from_f32(1.0)),
        Value::F16(half::f16::from_f32(2.0)),
    )
    .unwrap();
    assert!(halves
        .to_f64_vec()
        .unwrap()
        .iter()
        .all(|&x| (1.0..=2.0).contains(&x)));

    let double = sample(
        ModuleConfig::default(),
        Shape::new(PrimitiveType::F64, &[64]),
        RandomDistribution::Uniform,
        Value::F64(0.0),
        Value::F64(10.0),
    )
    .unwrap();
    assert!(double
        .to_f64_vec()
        .unwrap()
        .iter()
        .all(|&x| (0.0..=10.0).contains(&x)));
}

#[test]
fn test_uniform_integer_range() {
    let result = sample(
        ModuleConfig::default().with_seed(3),
        Shape::new(PrimitiveType::S32, &[512]),
        RandomDistribution::Uniform,
        Value::S32(-3),
        Value::S32(4),
    )
    .unwrap();
    let values: HashSet<i128> = result.values().iter().map(|v| v.as_i128().unwrap()).collect();
    assert!(values.iter().all(|v| (-3..4).contains(v)));
    assert_eq!(values.len(), 7);
}

#[test]
fn test_uniform_u64() {
    let result = sample(
        ModuleConfig::default().with_index_type(IndexType::I32),
        Shape::new(PrimitiveType::U64, &[33]),
        RandomDistribution::Uniform,
        Value::U64(10),
        Value::U64(20),
    )
    .unwrap();
    assert!(result
        .values()
        .iter()
        .all(|v| matches!(v, Value::U64(x) if (10..20).contains(x))));
}

#[test]
fn test_normal_f32() {
    let result = sample(
        ModuleConfig::default().with_seed(21),
        Shape::new(PrimitiveType::F32, &[4096]),
        RandomDistribution::Normal,
        Value::F32(3.0),
        Value::F32(2.0),
    )
    .unwrap();
    let values = f32s(&result);
    assert!(values.iter().all(|x| x.is_finite()));
    let mean = values.iter().map(|&x| x as f64).sum::<f64>() / values.len() as f64;
    assert!((mean - 3.0).abs() < 0.2, "mean {mean}");
}

#[test]
fn test_normal_f64_is_unimplemented() {
    let err = sample(
        ModuleConfig::default(),
        Shape::new(PrimitiveType::F64, &[2]),
        RandomDistribution::Normal,
        Value::F64(0.0),
        Value::F64(1.0),
    )
    .unwrap_err();
    assert!(err.is_unimplemented());
}

#[test]
fn test_normal_integer_is_unimplemented() {
    let err = sample(
        ModuleConfig::default(),
        Shape::new(PrimitiveType::S32, &[2]),
        RandomDistribution::Normal,
        Value::S32(0),
        Value::S32(1),
    )
    .unwrap_err();
    assert!(err.is_unimplemented());
}

#[test]
fn test_invalid_distribution() {
    for (ty, a, b) in [
        (PrimitiveType::F32, Value::F32(0.0), Value::F32(1.0)),
        (PrimitiveType::U32, Value::U32(0), Value::U32(1)),
    ] {
        let err = sample(
            ModuleConfig::default(),
            Shape::new(ty, &[1]),
            RandomDistribution::Invalid,
            a,
            b,
        )
        .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.message().contains("unhandled distribution RNG_INVALID"));
    }
}
