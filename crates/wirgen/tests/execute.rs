//! Compile generated code with `rustc` and run it.
//!
//! Skipped when `rustc` is not on `PATH`. The mapped-memory run builds a
//! small crate with `cargo` and is skipped when `cargo` or `nix` is missing.

mod support;

use tempfile::TempDir;
use wirgen::{EmitConfig, MemoryBackend, Project};

use support::{cargo_available, cargo_run, compile_and_run, rustc_available, sample_module};

const HOST: &str = r"
mod wasm;

use wasm::{Context, Imports, Memory, Trap};

struct Host {
    calls: u32,
}

impl Imports for Host {
    fn env_double(&mut self, _mem: &mut Memory, p0: i32) -> Result<i32, Trap> {
        self.calls += 1;
        Ok(p0.wrapping_mul(2))
    }
}
";

fn run(config: EmitConfig, body: &str) -> Option<String> {
    if !rustc_available() {
        eprintln!("Skipping test: rustc not found");
        return None;
    }
    let dir = TempDir::new().expect("tempdir");
    Project::new(dir.path().join("wasm"), config.with_package("wasm"))
        .write(&sample_module())
        .expect("generate");
    let main = format!("{HOST}\nfn main() {{\n{body}\n    println!(\"ok\");\n}}\n");
    Some(compile_and_run(dir.path(), &main))
}

#[test]
fn test_checked_module_runs() {
    let body = r#"
    let mut ctx = Context::new(Host { calls: 0 }).expect("instantiate");
    assert_eq!(ctx.add(2, 3), Ok(5));
    assert_eq!(ctx.add(i32::MAX, 1), Ok(i32::MIN));
    assert_eq!(ctx.fac(10), Ok(3_628_800));
    assert_eq!(ctx.fac(0), Ok(1));
    assert_eq!(ctx.div(7, 2), Ok(3));
    assert_eq!(ctx.div(-7, 2), Ok(-3));
    assert_eq!(ctx.div(1, 0), Err(Trap::DivisionByZero));
    assert_eq!(ctx.div(i32::MIN, -1), Err(Trap::IntegerOverflow));
    assert_eq!(ctx.store_load(8, -5), Ok(-5));
    assert_eq!(ctx.store_load(65533, 1), Err(Trap::MemoryOutOfBounds));
    assert_eq!(ctx.byte(100), Ok(i32::from(b'h')));
    assert_eq!(ctx.byte(104), Ok(i32::from(b'o')));
    assert_eq!(&ctx.memory().bytes()[100..105], b"hello");
    assert_eq!(ctx.bump(), Ok(42));
    assert_eq!(ctx.bump(), Ok(43));
    assert_eq!(ctx.dispatch(9, 0), Ok(18));
    assert_eq!(ctx.dispatch(9, 1), Ok(1));
    assert_eq!(ctx.dispatch(9, 2), Err(Trap::IndirectCallTypeMismatch));
    assert_eq!(ctx.dispatch(9, 3), Err(Trap::UndefinedElement));
    assert_eq!(ctx.dispatch(9, -1), Err(Trap::UndefinedElement));
    assert_eq!(ctx.classify(0), Ok(10));
    assert_eq!(ctx.classify(1), Ok(20));
    assert_eq!(ctx.classify(7), Ok(30));
    assert_eq!(ctx.classify(-1), Ok(30));
    assert_eq!(ctx.max(3, -4), Ok(3));
    assert_eq!(ctx.max(-4, 3), Ok(3));
    assert_eq!(ctx.size(), Ok(1));
    assert_eq!(ctx.grow(1), Ok(1));
    assert_eq!(ctx.size(), Ok(2));
    assert_eq!(ctx.store_load(65533, 1), Ok(1));
    assert_eq!(ctx.grow(1), Ok(-1));
    assert_eq!(ctx.size(), Ok(2));
    assert_eq!(ctx.trap(), Err(Trap::Unreachable));
    assert_eq!(ctx.quad(3), Ok(12));
    assert_eq!(ctx.host().calls, 2);
    assert_eq!(ctx.sum(5), Ok(15));
    assert_eq!(ctx.sum(1), Ok(1));
    assert_eq!(ctx.sum(100), Ok(5050));
    assert_eq!(Trap::DivisionByZero.to_string(), "integer divide by zero");
"#;
    if let Some(stdout) = run(EmitConfig::default(), body) {
        assert_eq!(stdout.trim(), "ok");
    }
}

#[test]
fn test_unchecked_module_runs() {
    let body = r#"
    let mut ctx = Context::new(Host { calls: 0 }).expect("instantiate");
    assert_eq!(ctx.store_load(8, 77), Ok(77));
    assert_eq!(ctx.byte(101), Ok(i32::from(b'e')));
    assert_eq!(ctx.dispatch(6, 0), Ok(12));
    assert_eq!(ctx.fac(5), Ok(120));
    assert_eq!(ctx.sum(5), Ok(15));
    assert_eq!(ctx.div(1, 0), Err(Trap::DivisionByZero));
"#;
    let config = EmitConfig::default().with_unsafe_access(true);
    if let Some(stdout) = run(config, body) {
        assert_eq!(stdout.trim(), "ok");
    }
}

#[test]
fn test_commented_module_runs() {
    let body = r#"
    let mut ctx = Context::new(Host { calls: 0 }).expect("instantiate");
    assert_eq!(ctx.classify(1), Ok(20));
    assert_eq!(ctx.max(1, 2), Ok(2));
"#;
    if let Some(stdout) = run(EmitConfig::default().with_expr_comments(true), body) {
        assert_eq!(stdout.trim(), "ok");
    }
}

#[test]
fn test_aliased_exports_agree() {
    let body = r#"
    let mut ctx = Context::new(Host { calls: 0 }).expect("instantiate");
    for (a, b) in [(2, 3), (-7, 4), (i32::MAX, 1)] {
        assert_eq!(ctx.plus(a, b), ctx.add(a, b));
    }
    assert_eq!(ctx.plus(2, 3), Ok(5));
    let targets: Vec<u32> = wasm::EXPORTS
        .iter()
        .filter(|(name, _)| *name == "add" || *name == "plus")
        .map(|&(_, func)| func)
        .collect();
    assert_eq!(targets, [0, 0]);
"#;
    if let Some(stdout) = run(EmitConfig::default(), body) {
        assert_eq!(stdout.trim(), "ok");
    }
}

#[test]
fn test_mapped_module_runs() {
    if !cargo_available() {
        eprintln!("Skipping test: cargo not found");
        return;
    }
    let dir = TempDir::new().expect("tempdir");
    let config = EmitConfig::default()
        .with_package("wasm")
        .with_memory_backend(MemoryBackend::Mapped);
    Project::new(dir.path().join("src").join("wasm"), config)
        .write(&sample_module())
        .expect("generate");
    let body = r#"
    let mut ctx = Context::new(Host { calls: 0 }).expect("instantiate");
    assert_eq!(&ctx.memory().bytes()[100..105], b"hello");
    assert_eq!(ctx.byte(100), Ok(i32::from(b'h')));
    assert_eq!(ctx.store_load(8, -5), Ok(-5));
    assert_eq!(ctx.store_load(65533, 1), Err(Trap::MemoryOutOfBounds));
    assert_eq!(ctx.size(), Ok(1));
    assert_eq!(ctx.grow(1), Ok(1));
    assert_eq!(ctx.size(), Ok(2));
    assert_eq!(ctx.store_load(65533, 1), Ok(1));
    assert_eq!(ctx.store_load(131_068, 9), Ok(9));
    assert_eq!(ctx.store_load(131_069, 9), Err(Trap::MemoryOutOfBounds));
    assert_eq!(ctx.grow(1), Ok(-1));
    assert_eq!(ctx.byte(104), Ok(i32::from(b'o')));
    assert_eq!(ctx.sum(5), Ok(15));
    assert_eq!(ctx.quad(3), Ok(12));
    drop(ctx);
"#;
    let main = format!("{HOST}\nfn main() {{\n{body}\n    println!(\"ok\");\n}}\n");
    if let Some(stdout) = cargo_run(dir.path(), &main) {
        assert_eq!(stdout.trim(), "ok");
    }
}
