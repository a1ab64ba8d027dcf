use std::sync::Arc;

use elemental::{
    evaluate, literal_generator, par_evaluate, ElementalIrEmitter, HloInstruction, HloModule,
    HloOpcode, HloToElementGeneratorMap, HostMath, Index, IndexType, Literal, ModuleConfig,
    PrimitiveType, Shape, TargetMath, Value,
};

/// Builds generators for `roots` and everything they read, parameters and
/// constants bound to their literals.
fn build_all<M: TargetMath>(
    emitter: &ElementalIrEmitter<M>,
    post_order: &[Arc<HloInstruction>],
    parameters: &[(&Arc<HloInstruction>, Literal)],
) -> HloToElementGeneratorMap {
    let mut generators = HloToElementGeneratorMap::new();
    for (param, literal) in parameters {
        generators.insert(param.id(), literal_generator(Arc::new(literal.clone())));
    }
    for hlo in post_order {
        let generator = match hlo.literal() {
            Some(literal) => literal_generator(Arc::new(literal.clone())),
            None => emitter.make_element_generator(hlo, &generators),
        };
        generators.insert(hlo.id(), generator);
    }
    generators
}

#[test]
fn test_composed_graph() {
    // out = (x * broadcast(2)) + reverse(x), x = [1, 2, 3, 4]
    let module = Arc::new(HloModule::new("graph", ModuleConfig::default()));
    let shape = Shape::new(PrimitiveType::F32, &[4]);
    let x = module.parameter(shape.clone());
    let two = module.constant(Literal::scalar(2.0f32));
    let twos = module.broadcast(shape.clone(), &two, &[]);
    let scaled = module.binary(HloOpcode::Multiply, shape.clone(), &x, &twos);
    let reversed = module.reverse(&x, &[0]);
    let out = module.binary(HloOpcode::Add, shape, &scaled, &reversed);

    let emitter = ElementalIrEmitter::new(Arc::clone(&module));
    let generators = build_all(
        &emitter,
        &[two, twos, scaled, reversed, out.clone()],
        &[(&x, Literal::vector([1.0f32, 2.0, 3.0, 4.0]))],
    );
    let result = evaluate(out.shape(), &generators[&out.id()], IndexType::I64).unwrap();
    assert_eq!(result.to_f64_vec().unwrap(), vec![6.0, 7.0, 8.0, 9.0]);
}

#[test]
fn test_par_evaluate_matches_evaluate() {
    let module = Arc::new(HloModule::new("graph", ModuleConfig::default()));
    let shape = Shape::new(PrimitiveType::S64, &[16, 16]);
    let x = module.parameter(shape.clone());
    let t = module.transpose(&x, &[1, 0]);
    let out = module.binary(HloOpcode::Subtract, shape, &x, &t);

    let emitter = ElementalIrEmitter::new(Arc::clone(&module));
    let input = Literal::from_fn(x.shape().clone(), |c| Value::S64(c[0] * 100 + c[1]));
    let generators = build_all(&emitter, &[t, out.clone()], &[(&x, input)]);
    let generator = &generators[&out.id()];
    let sequential = evaluate(out.shape(), generator, IndexType::I32).unwrap();
    let parallel = par_evaluate(out.shape(), generator, IndexType::I32).unwrap();
    assert_eq!(sequential, parallel);
    assert_eq!(sequential.get(&[3, 5]), Value::S64(305 - 503));
}

#[test]
fn test_tanh_depends_on_target_math() {
    let module = Arc::new(HloModule::new("tanh", ModuleConfig::default()));
    let x = module.parameter(Shape::new(PrimitiveType::F32, &[2]));
    let tanh = module.unary_same_shape(HloOpcode::Tanh, &x);
    let mut generators = HloToElementGeneratorMap::new();
    generators.insert(
        x.id(),
        literal_generator(Arc::new(Literal::vector([0.0f32, 1.0]))),
    );

    let base = ElementalIrEmitter::new(Arc::clone(&module)).make_element_generator(&tanh, &generators);
    let err = evaluate(tanh.shape(), &base, IndexType::I64).unwrap_err();
    assert!(err.is_unimplemented());

    let host = ElementalIrEmitter::with_math(module, HostMath).make_element_generator(&tanh, &generators);
    let result = evaluate(tanh.shape(), &host, IndexType::I64).unwrap();
    assert_eq!(result.values(), vec![Value::F32(0.0), Value::F32(1.0f32.tanh())]);
}

#[test]
fn test_non_elemental_opcodes_fail_when_invoked() {
    let module = Arc::new(HloModule::new("unhandled", ModuleConfig::default()));
    let scalar = Shape::scalar(PrimitiveType::F32);
    let x = module.parameter(Shape::new(PrimitiveType::F32, &[3]));
    let init = module.parameter(scalar.clone());
    let reduce = module.reduce(scalar.clone(), &x, &init, &[0]);
    let tuple = module.add_instruction(HloOpcode::Tuple, scalar.clone(), vec![init.clone()]);
    let constant = module.constant(Literal::scalar(1.0f32));

    let emitter = ElementalIrEmitter::new(module);
    let generators = HloToElementGeneratorMap::new();
    for (hlo, name) in [
        (&reduce, "reduce"),
        (&tuple, "tuple"),
        (&constant, "constant"),
        (&init, "parameter"),
    ] {
        // Building succeeds; only invocation fails.
        let generator = emitter.make_element_generator(hlo, &generators);
        let err = generator(&Index::scalar(IndexType::I64)).unwrap_err();
        assert!(err.is_unimplemented(), "{name}");
        assert_eq!(
            err.message(),
            format!("Unhandled opcode for elemental IR emission: {name}")
        );
    }
}

#[test]
#[should_panic(expected = "no element generator")]
fn test_missing_operand_generator_panics() {
    let module = Arc::new(HloModule::new("missing", ModuleConfig::default()));
    let x = module.parameter(Shape::new(PrimitiveType::F32, &[2]));
    let neg = module.unary_same_shape(HloOpcode::Negate, &x);
    ElementalIrEmitter::new(module).make_element_generator(&neg, &HloToElementGeneratorMap::new());
}

#[test]
fn test_operand_failure_propagates() {
    let module = Arc::new(HloModule::new("propagate", ModuleConfig::default()));
    let x = module.parameter(Shape::new(PrimitiveType::F32, &[2]));
    let tanh = module.unary_same_shape(HloOpcode::Tanh, &x);
    let neg = module.unary_same_shape(HloOpcode::Negate, &tanh);

    let emitter = ElementalIrEmitter::new(module);
    let mut generators = HloToElementGeneratorMap::new();
    generators.insert(
        x.id(),
        literal_generator(Arc::new(Literal::vector([0.5f32, 1.5]))),
    );
    generators.insert(tanh.id(), emitter.make_element_generator(&tanh, &generators));
    let generator = emitter.make_element_generator(&neg, &generators);
    let err = par_evaluate(neg.shape(), &generator, IndexType::I64).unwrap_err();
    assert!(err.is_unimplemented());
}
