#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use wirgen::{Module, ModuleBuilder, encode};
use wirgen_ir::{BinaryOp, BlockType, Global, Instr, LoadOp, MemArg, Signature, StoreOp, UnaryOp, ValType, Value};

const I32: ValType = ValType::I32;
const I64: ValType = ValType::I64;

fn sig(params: &[ValType], results: &[ValType]) -> Signature {
    Signature::new(params.to_vec(), results.to_vec())
}

/// Module touching every artifact kind: memory with data, a mutable global,
/// a table, an import and one export per function, plus `plus` aliasing
/// `add`.
pub fn sample_module() -> Module {
    let binop = |op| {
        vec![
            Instr::LocalGet(0),
            Instr::LocalGet(1),
            Instr::Binary(I32, op),
            Instr::End,
        ]
    };
    ModuleBuilder::new()
        .signature(sig(&[I32, I32], &[I32]))
        .memory(1, Some(2))
        .data(100, b"hello".to_vec())
        .global(Global::mutable(Value::I32(41)))
        .import("env", "double", sig(&[I32], &[I32]))
        // 0: add
        .function(sig(&[I32, I32], &[I32]), Vec::new(), binop(BinaryOp::Add))
        // 1: fac
        .function(
            sig(&[I64], &[I64]),
            vec![I64],
            vec![
                Instr::Const(Value::I64(1)),
                Instr::LocalSet(1),
                Instr::Block(BlockType::Empty),
                Instr::Loop(BlockType::Empty),
                Instr::LocalGet(0),
                Instr::Unary(I64, UnaryOp::Eqz),
                Instr::BrIf(1),
                Instr::LocalGet(1),
                Instr::LocalGet(0),
                Instr::Binary(I64, BinaryOp::Mul),
                Instr::LocalSet(1),
                Instr::LocalGet(0),
                Instr::Const(Value::I64(1)),
                Instr::Binary(I64, BinaryOp::Sub),
                Instr::LocalSet(0),
                Instr::Br(0),
                Instr::End,
                Instr::End,
                Instr::LocalGet(1),
                Instr::End,
            ],
        )
        // 2: div
        .function(sig(&[I32, I32], &[I32]), Vec::new(), binop(BinaryOp::DivS))
        // 3: store_load
        .function(
            sig(&[I32, I32], &[I32]),
            Vec::new(),
            vec![
                Instr::LocalGet(0),
                Instr::LocalGet(1),
                Instr::Store(StoreOp::I32Store, MemArg::default()),
                Instr::LocalGet(0),
                Instr::Load(LoadOp::I32Load, MemArg::default()),
                Instr::End,
            ],
        )
        // 4: bump
        .function(
            sig(&[], &[I32]),
            Vec::new(),
            vec![
                Instr::GlobalGet(0),
                Instr::Const(Value::I32(1)),
                Instr::Binary(I32, BinaryOp::Add),
                Instr::GlobalSet(0),
                Instr::GlobalGet(0),
                Instr::End,
            ],
        )
        // 5: dispatch
        .function(
            sig(&[I32, I32], &[I32]),
            Vec::new(),
            vec![
                Instr::LocalGet(0),
                Instr::LocalGet(0),
                Instr::LocalGet(1),
                Instr::CallIndirect(0),
                Instr::End,
            ],
        )
        // 6: classify
        .function(
            sig(&[I32], &[I32]),
            Vec::new(),
            vec![
                Instr::Block(BlockType::Empty),
                Instr::Block(BlockType::Empty),
                Instr::Block(BlockType::Empty),
                Instr::LocalGet(0),
                Instr::BrTable {
                    targets: vec![0, 1],
                    default: 2,
                },
                Instr::End,
                Instr::Const(Value::I32(10)),
                Instr::Return,
                Instr::End,
                Instr::Const(Value::I32(20)),
                Instr::Return,
                Instr::End,
                Instr::Const(Value::I32(30)),
                Instr::End,
            ],
        )
        // 7: max
        .function(
            sig(&[I32, I32], &[I32]),
            Vec::new(),
            vec![
                Instr::LocalGet(0),
                Instr::LocalGet(1),
                Instr::Binary(I32, BinaryOp::GtS),
                Instr::If(BlockType::Value(I32)),
                Instr::LocalGet(0),
                Instr::Else,
                Instr::LocalGet(1),
                Instr::End,
                Instr::End,
            ],
        )
        // 8: grow
        .function(
            sig(&[I32], &[I32]),
            Vec::new(),
            vec![Instr::LocalGet(0), Instr::MemoryGrow, Instr::End],
        )
        // 9: size
        .function(sig(&[], &[I32]), Vec::new(), vec![Instr::MemorySize, Instr::End])
        // 10: trap
        .function(sig(&[], &[]), Vec::new(), vec![Instr::Unreachable, Instr::End])
        // 11: byte
        .function(
            sig(&[I32], &[I32]),
            Vec::new(),
            vec![
                Instr::LocalGet(0),
                Instr::Load(LoadOp::I32Load8U, MemArg::default()),
                Instr::End,
            ],
        )
        // 12: quad
        .function(
            sig(&[I32], &[I32]),
            Vec::new(),
            vec![
                Instr::LocalGet(0),
                Instr::CallImport(0),
                Instr::CallImport(0),
                Instr::End,
            ],
        )
        // 13: sum, counting down with a back-edge and leaving with `br`
        .function(
            sig(&[I32], &[I32]),
            vec![I32],
            vec![
                Instr::Block(BlockType::Empty),
                Instr::Loop(BlockType::Empty),
                Instr::LocalGet(1),
                Instr::LocalGet(0),
                Instr::Binary(I32, BinaryOp::Add),
                Instr::LocalSet(1),
                Instr::LocalGet(0),
                Instr::Const(Value::I32(1)),
                Instr::Binary(I32, BinaryOp::Sub),
                Instr::LocalSet(0),
                Instr::LocalGet(0),
                Instr::BrIf(0),
                Instr::Br(1),
                Instr::End,
                Instr::End,
                Instr::LocalGet(1),
                Instr::End,
            ],
        )
        .table(4)
        .elements(0, vec![0, 2, 1])
        .export("add", 0)
        .export("fac", 1)
        .export("div", 2)
        .export("store_load", 3)
        .export("bump", 4)
        .export("dispatch", 5)
        .export("classify", 6)
        .export("max", 7)
        .export("grow", 8)
        .export("size", 9)
        .export("trap", 10)
        .export("byte", 11)
        .export("quad", 12)
        .export("sum", 13)
        .export("plus", 0)
        .build()
}

/// Write the encoded module to `dir/module.ir`.
pub fn write_module(dir: &Path, module: &Module) -> PathBuf {
    let path = dir.join("module.ir");
    std::fs::write(&path, encode(module)).expect("write module");
    path
}

/// Sorted `(file name, contents)` pairs of a generated directory.
pub fn read_tree(dir: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = std::fs::read_dir(dir)
        .expect("read output dir")
        .map(|entry| {
            let path = entry.expect("dir entry").path();
            let name = path
                .file_name()
                .expect("file name")
                .to_string_lossy()
                .into_owned();
            let contents = std::fs::read_to_string(&path).expect("read artifact");
            (name, contents)
        })
        .collect();
    files.sort();
    files
}

pub fn rustc_available() -> bool {
    Command::new("rustc")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

/// Compile `main.rs` in `dir` (next to the generated `wasm/` module) and
/// run it, returning its stdout.
pub fn compile_and_run(dir: &Path, main: &str) -> String {
    let source = dir.join("main.rs");
    let binary = dir.join("prog");
    std::fs::write(&source, main).expect("write main.rs");

    let build = Command::new("rustc")
        .args(["--edition", "2021", "--crate-name", "generated"])
        .arg("-o")
        .arg(&binary)
        .arg(&source)
        .output()
        .expect("spawn rustc");
    assert!(
        build.status.success(),
        "generated code failed to compile:\n{}",
        String::from_utf8_lossy(&build.stderr)
    );

    let run = Command::new(&binary).output().expect("spawn program");
    assert!(
        run.status.success(),
        "program failed:\n{}",
        String::from_utf8_lossy(&run.stderr)
    );
    String::from_utf8_lossy(&run.stdout).into_owned()
}

pub fn cargo_available() -> bool {
    Command::new("cargo")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

/// Build `dir` as a binary crate depending on `nix` (the generated module
/// goes in `dir/src/wasm`) and run it, returning its stdout. Returns `None`
/// when the dependencies cannot be fetched.
pub fn cargo_run(dir: &Path, main: &str) -> Option<String> {
    std::fs::create_dir_all(dir.join("src")).expect("create src");
    std::fs::write(
        dir.join("Cargo.toml"),
        "[package]\nname = \"generated\"\nversion = \"0.0.0\"\nedition = \"2021\"\n\n\
         [dependencies]\nnix = { version = \"0.29\", features = [\"mman\"] }\n\n[workspace]\n",
    )
    .expect("write Cargo.toml");
    std::fs::write(dir.join("src").join("main.rs"), main).expect("write main.rs");

    let fetch = Command::new("cargo")
        .arg("fetch")
        .current_dir(dir)
        .output()
        .expect("spawn cargo fetch");
    if !fetch.status.success() {
        eprintln!(
            "Skipping test: cannot fetch nix:\n{}",
            String::from_utf8_lossy(&fetch.stderr)
        );
        return None;
    }

    let run = Command::new("cargo")
        .args(["run", "--quiet", "--offline", "--target-dir"])
        .arg(dir.join("target"))
        .current_dir(dir)
        .output()
        .expect("spawn cargo run");
    assert!(
        run.status.success(),
        "generated crate failed:\n{}",
        String::from_utf8_lossy(&run.stderr)
    );
    Some(String::from_utf8_lossy(&run.stdout).into_owned())
}
