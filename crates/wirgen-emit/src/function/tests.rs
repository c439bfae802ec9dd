use super::*;
use wirgen_ir::{BinaryOp, Global, LoadOp, MemArg, ModuleBuilder, UnaryOp, Value};

use crate::error::FunctionErrorKind as E;

fn sig(params: &[ValType], results: &[ValType]) -> Signature {
    Signature::new(params.to_vec(), results.to_vec())
}

fn emit_with(module: &Module, cfg: &EmitConfig, id: u32) -> std::result::Result<String, FunctionError> {
    let func = module.function(id).expect("function exists");
    gen_function(module, cfg, func)
}

fn emit(module: &Module, id: u32) -> String {
    emit_with(module, &EmitConfig::default(), id).expect("function emits")
}

fn single(params: &[ValType], results: &[ValType], body: Vec<Instr>) -> Module {
    ModuleBuilder::new()
        .function(sig(params, results), Vec::new(), body)
        .build()
}

fn error(module: &Module) -> FunctionError {
    emit_with(module, &EmitConfig::default(), 0).expect_err("function is rejected")
}

const I32: ValType = ValType::I32;

#[test]
fn test_add_is_single_expression() {
    let module = single(
        &[I32, I32],
        &[I32],
        vec![
            Instr::LocalGet(0),
            Instr::LocalGet(1),
            Instr::Binary(I32, BinaryOp::Add),
            Instr::End,
        ],
    );
    let out = emit(&module, 0);
    assert!(out.contains("pub(crate) fn f0(&mut self, mut l0: i32, mut l1: i32) -> Result<i32, Trap> {"));
    assert!(out.contains("        Ok(l0.wrapping_add(l1))\n    }\n}\n"));
    assert!(out.contains("use super::context::*;"));
    assert!(out.contains("impl Context {"));
}

#[test]
fn test_no_params_and_declared_locals() {
    let module = ModuleBuilder::new()
        .function(
            sig(&[], &[]),
            vec![ValType::I64, ValType::F64],
            vec![Instr::End],
        )
        .build();
    let out = emit(&module, 0);
    assert!(out.contains("pub(crate) fn f0(&mut self) -> Result<(), Trap> {"));
    assert!(out.contains("        let mut l0: i64 = 0i64;\n"));
    assert!(out.contains("        let mut l1: f64 = 0.0f64;\n"));
    assert!(out.contains("        Ok(())\n"));
}

#[test]
fn test_block_with_result_binds_temp() {
    let module = single(
        &[],
        &[I32],
        vec![
            Instr::Block(BlockType::Value(I32)),
            Instr::Const(Value::I32(7)),
            Instr::End,
            Instr::End,
        ],
    );
    let out = emit(&module, 0);
    assert!(out.contains("        let t0: i32 = 'b0: {\n            7i32\n        };\n        Ok(t0)\n"));
}

#[test]
fn test_loop_with_conditional_continue() {
    let module = single(
        &[I32],
        &[I32],
        vec![
            Instr::Loop(BlockType::Empty),
            Instr::LocalGet(0),
            Instr::Const(Value::I32(1)),
            Instr::Binary(I32, BinaryOp::Sub),
            Instr::LocalTee(0),
            Instr::BrIf(0),
            Instr::End,
            Instr::LocalGet(0),
            Instr::End,
        ],
    );
    let out = emit(&module, 0);
    let expected = "        'l0: loop {\n            \
                    l0 = l0.wrapping_sub(1i32);\n            \
                    if l0 != 0 {\n                \
                    continue 'l0;\n            \
                    }\n            \
                    break 'l0;\n        \
                    }\n        \
                    Ok(l0)\n";
    assert!(out.contains(expected), "{out}");
}

#[test]
fn test_if_else_with_result() {
    let module = single(
        &[I32],
        &[I32],
        vec![
            Instr::LocalGet(0),
            Instr::If(BlockType::Value(I32)),
            Instr::Const(Value::I32(1)),
            Instr::Else,
            Instr::Const(Value::I32(2)),
            Instr::End,
            Instr::End,
        ],
    );
    let out = emit(&module, 0);
    let expected = "        let t0: i32 = 'b0: {\n            \
                    if l0 != 0 {\n                \
                    break 'b0 1i32;\n            \
                    }\n            \
                    2i32\n        \
                    };\n        \
                    Ok(t0)\n";
    assert!(out.contains(expected), "{out}");
}

#[test]
fn test_comparison_condition_is_used_directly() {
    let module = single(
        &[I32, I32],
        &[],
        vec![
            Instr::LocalGet(0),
            Instr::LocalGet(1),
            Instr::Binary(I32, BinaryOp::LtU),
            Instr::If(BlockType::Empty),
            Instr::Unreachable,
            Instr::End,
            Instr::End,
        ],
    );
    let out = emit(&module, 0);
    assert!(out.contains("if (l0 as u32) < (l1 as u32) {"));
    assert!(out.contains("return Err(Trap::Unreachable);"));
}

#[test]
fn test_local_set_flushes_pending_reads() {
    let module = single(
        &[I32],
        &[I32],
        vec![
            Instr::LocalGet(0),
            Instr::Const(Value::I32(5)),
            Instr::LocalSet(0),
            Instr::LocalGet(0),
            Instr::Binary(I32, BinaryOp::Add),
            Instr::End,
        ],
    );
    let out = emit(&module, 0);
    let expected = "        let t0: i32 = l0;\n        l0 = 5i32;\n        Ok(t0.wrapping_add(l0))\n";
    assert!(out.contains(expected), "{out}");
}

#[test]
fn test_trapping_operand_evaluated_before_call() {
    let module = ModuleBuilder::new()
        .function(
            sig(&[I32, I32], &[I32]),
            Vec::new(),
            vec![
                Instr::LocalGet(0),
                Instr::LocalGet(1),
                Instr::Binary(I32, BinaryOp::DivS),
                Instr::Call(1),
                Instr::Binary(I32, BinaryOp::Add),
                Instr::End,
            ],
        )
        .function(sig(&[], &[I32]), Vec::new(), vec![Instr::Const(Value::I32(3)), Instr::End])
        .build();
    let out = emit(&module, 0);
    let expected = "        let t0: i32 = i32_div_s(l0, l1)?;\n        \
                    let t1: i32 = self.f1()?;\n        \
                    Ok(t0.wrapping_add(t1))\n";
    assert!(out.contains(expected), "{out}");
}

#[test]
fn test_drop_keeps_trapping_expression() {
    let module = ModuleBuilder::new()
        .memory(1, None)
        .function(
            sig(&[I32], &[]),
            Vec::new(),
            vec![
                Instr::LocalGet(0),
                Instr::Load(LoadOp::I32Load, MemArg::offset(4)),
                Instr::Drop,
                Instr::LocalGet(0),
                Instr::Unary(I32, UnaryOp::Clz),
                Instr::Drop,
                Instr::End,
            ],
        )
        .build();
    let out = emit(&module, 0);
    assert!(out.contains("let _ = self.mem.load_i32((l0 as u32), 4)?;"));
    assert!(!out.contains("leading_zeros"));
}

#[test]
fn test_br_table_becomes_match() {
    let module = single(
        &[I32],
        &[I32],
        vec![
            Instr::Block(BlockType::Empty),
            Instr::Block(BlockType::Empty),
            Instr::LocalGet(0),
            Instr::BrTable {
                targets: vec![0, 1],
                default: 1,
            },
            Instr::End,
            Instr::Const(Value::I32(10)),
            Instr::Return,
            Instr::End,
            Instr::Const(Value::I32(20)),
            Instr::End,
        ],
    );
    let out = emit(&module, 0);
    let expected = "                match (l0 as u32) {\n                    \
                    0 => break 'b1,\n                    \
                    1 => break 'b0,\n                    \
                    _ => break 'b0,\n                \
                    }\n            \
                    }\n            \
                    return Ok(10i32);\n        \
                    }\n        \
                    Ok(20i32)\n";
    assert!(out.contains(expected), "{out}");
}

#[test]
fn test_br_table_arity_mismatch() {
    let module = single(
        &[I32],
        &[I32],
        vec![
            Instr::Block(BlockType::Empty),
            Instr::Const(Value::I32(0)),
            Instr::LocalGet(0),
            Instr::BrTable {
                targets: vec![0],
                default: 1,
            },
            Instr::End,
            Instr::Const(Value::I32(1)),
            Instr::End,
        ],
    );
    let err = error(&module);
    assert_eq!(err.offset, 3);
    assert_eq!(err.kind, E::BranchArity);
}

#[test]
fn test_call_indirect_dispatches_on_matching_signatures() {
    let module = ModuleBuilder::new()
        .signature(sig(&[], &[I32]))
        .function(sig(&[], &[I32]), Vec::new(), vec![Instr::Const(Value::I32(1)), Instr::End])
        .function(sig(&[I32], &[I32]), Vec::new(), vec![Instr::LocalGet(0), Instr::End])
        .function(
            sig(&[I32], &[I32]),
            Vec::new(),
            vec![Instr::LocalGet(0), Instr::CallIndirect(0), Instr::End],
        )
        .table(2)
        .elements(0, vec![0, 1])
        .build();
    let out = emit(&module, 2);
    let expected = "        let t0: Option<u32> = self.table.get((l0 as u32) as usize).copied().flatten();\n        \
                    let t1: i32 = match t0 {\n            \
                    Some(0) => self.f0()?,\n            \
                    Some(_) => return Err(Trap::IndirectCallTypeMismatch),\n            \
                    None => return Err(Trap::UndefinedElement),\n        \
                    };\n        \
                    Ok(t1)\n";
    assert!(out.contains(expected), "{out}");
    assert!(!out.contains("self.f1("));

    let cfg = EmitConfig::default().with_unsafe_access(true);
    let out = emit_with(&module, &cfg, 2).expect("function emits");
    assert!(out.contains("unsafe { *self.table.get_unchecked((l0 as u32) as usize) }"));
    assert!(out.contains("_ => unsafe { std::hint::unreachable_unchecked() },"));
}

#[test]
fn test_import_call_and_global_access() {
    let module = ModuleBuilder::new()
        .import("env", "tick", sig(&[I32], &[]))
        .global(Global::mutable(Value::I32(0)))
        .function(
            sig(&[], &[]),
            Vec::new(),
            vec![
                Instr::GlobalGet(0),
                Instr::CallImport(0),
                Instr::Const(Value::I32(1)),
                Instr::GlobalSet(0),
                Instr::End,
            ],
        )
        .build();
    let out = emit(&module, 0);
    assert!(out.contains("impl<H: Imports> Context<H> {"));
    assert!(out.contains("        let t0: i32 = self.g0;\n        self.i0(t0)?;\n"));
    assert!(out.contains("self.g0 = 1i32;"));
}

#[test]
fn test_select_and_comments() {
    let module = single(
        &[I32, I32],
        &[I32],
        vec![
            Instr::LocalGet(0),
            Instr::LocalGet(1),
            Instr::LocalGet(0),
            Instr::Select,
            Instr::End,
        ],
    );
    let cfg = EmitConfig::default().with_expr_comments(true);
    let out = emit_with(&module, &cfg, 0).expect("function emits");
    assert!(out.contains("Ok((if l0 != 0 { l0 } else { l1 }))"));
    assert!(out.contains("        // @3 select\n"));
    assert!(!emit(&module, 0).contains("// @"));
}

#[test]
fn test_dead_code_is_skipped_but_validated() {
    let module = single(
        &[],
        &[],
        vec![
            Instr::Unreachable,
            Instr::Const(Value::I32(99)),
            Instr::Drop,
            Instr::End,
        ],
    );
    let out = emit(&module, 0);
    assert!(!out.contains("99i32"));
    assert!(!out.contains("Ok(())"));

    let module = single(&[], &[], vec![Instr::Return, Instr::Call(9), Instr::End]);
    let err = error(&module);
    assert_eq!((err.offset, err.kind), (1, E::UnknownFunction(9)));

    let module = single(
        &[],
        &[],
        vec![
            Instr::Unreachable,
            Instr::Block(BlockType::Empty),
            Instr::Br(2),
            Instr::End,
            Instr::End,
        ],
    );
    assert_eq!(error(&module).kind, E::BranchDepth(2));
}

#[test]
fn test_error_kinds_carry_offsets() {
    let cases: Vec<(Vec<ValType>, Vec<Instr>, usize, E)> = vec![
        (
            vec![I32],
            vec![Instr::Const(Value::I64(1)), Instr::End],
            1,
            E::TypeMismatch {
                expected: I32,
                found: ValType::I64,
            },
        ),
        (vec![], vec![Instr::Binary(I32, BinaryOp::Add), Instr::End], 0, E::StackUnderflow),
        (vec![], vec![Instr::Nop], 1, E::MissingEnd),
        (vec![], vec![Instr::End, Instr::Nop], 1, E::TrailingInstructions),
        (
            vec![],
            vec![Instr::Const(Value::I32(1)), Instr::End],
            1,
            E::UnbalancedStack {
                expected: 0,
                found: 1,
            },
        ),
        (
            vec![],
            vec![Instr::Block(BlockType::Empty), Instr::Else, Instr::End, Instr::End],
            1,
            E::ElseWithoutIf,
        ),
        (
            vec![I32],
            vec![
                Instr::Const(Value::I32(1)),
                Instr::If(BlockType::Value(I32)),
                Instr::Const(Value::I32(1)),
                Instr::End,
                Instr::End,
            ],
            3,
            E::IfWithoutElse,
        ),
        (
            vec![],
            vec![
                Instr::Const(Value::I32(0)),
                Instr::Load(LoadOp::I32Load, MemArg::default()),
                Instr::Drop,
                Instr::End,
            ],
            1,
            E::MissingMemory,
        ),
        (vec![], vec![Instr::LocalGet(3), Instr::Drop, Instr::End], 0, E::UnknownLocal(3)),
        (
            vec![],
            vec![Instr::Const(Value::f32(1.0)), Instr::Unary(ValType::F32, UnaryOp::Clz), Instr::End],
            1,
            E::InvalidOperator {
                op: "clz",
                ty: ValType::F32,
            },
        ),
        (vec![], vec![Instr::Br(1), Instr::End], 0, E::BranchDepth(1)),
    ];
    for (results, body, offset, kind) in cases {
        let module = single(&[], &results, body);
        let err = error(&module);
        assert_eq!(err.func, 0);
        assert_eq!(err.offset, offset, "{kind}");
        assert_eq!(err.kind, kind);
    }
}

#[test]
fn test_immutable_global_and_multi_value() {
    let module = ModuleBuilder::new()
        .global(Global::immutable(Value::I32(1)))
        .function(
            sig(&[], &[]),
            Vec::new(),
            vec![Instr::Const(Value::I32(2)), Instr::GlobalSet(0), Instr::End],
        )
        .build();
    assert_eq!(error(&module).kind, E::ImmutableGlobal(0));

    let module = single(&[], &[I32, I32], vec![Instr::End]);
    assert_eq!(error(&module).kind, E::MultiValue);
}
