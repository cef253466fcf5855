//! SSA construction integration tests.
//!
//! These tests drive the builder through the public API, both block by block (the way a
//! front end for a new control structure would) and from whole syntax trees.

use toslang::{
    ast::{AstBuilder, Operation, Symbol, SymbolId, SymbolTable},
    cfg::{BlockId, Terminator},
    ssa::{CfgBuilder, SsaInstruction, SsaOp, SsaValue, ValueKind},
    Error, Result,
};

fn symbols_with(names: &[&str]) -> (SymbolTable, Vec<SymbolId>) {
    let mut symbols = SymbolTable::new();
    let ids = names
        .iter()
        .map(|name| symbols.add_symbol(Symbol::variable(name, 1)))
        .collect();
    (symbols, ids)
}

/// Routes builder traces to the test output when `RUST_LOG` is set.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn op_of(builder: &CfgBuilder<'_>, value: SsaValue) -> Option<SsaOp> {
    builder
        .function()
        .and_then(|f| f.definition(&value))
        .map(SsaInstruction::op)
}

#[test]
fn test_ssa_read_after_write_is_memoized() -> Result<()> {
    let (symbols, vars) = symbols_with(&["x"]);
    let mut builder = CfgBuilder::new(&symbols);
    let entry = builder.begin_function("f")?;

    let value = builder.emit(SsaOp::Mov, &[SsaValue::literal(1000, 7)])?;
    builder.write_variable(vars[0], entry, value);

    assert_eq!(builder.read_variable(vars[0], entry)?, value);
    assert_eq!(builder.read_variable(vars[0], entry)?, value);
    builder.end_function()
}

#[test]
fn test_ssa_single_predecessor_never_creates_phi() -> Result<()> {
    let (symbols, vars) = symbols_with(&["x"]);
    let mut builder = CfgBuilder::new(&symbols);
    let entry = builder.begin_function("f")?;
    let value = builder.emit(SsaOp::Mov, &[SsaValue::literal(1000, 7)])?;
    builder.write_variable(vars[0], entry, value);

    let mut previous = entry;
    for _ in 0..4 {
        let next = builder.create_block()?;
        builder.add_edge(previous, next)?;
        builder.seal_block(next)?;
        previous = next;
    }

    assert_eq!(builder.read_variable(vars[0], previous)?, value);
    assert_eq!(builder.function().map(|f| f.phis().count()), Some(0));
    builder.end_function()
}

#[test]
fn test_ssa_read_without_definition_is_unknown() -> Result<()> {
    let (symbols, vars) = symbols_with(&["x"]);
    let mut builder = CfgBuilder::new(&symbols);
    let entry = builder.begin_function("f")?;

    let value = builder.read_variable(vars[0], entry)?;
    assert!(value.is_unknown());
    assert_eq!(value.kind(), ValueKind::Unknown);
    builder.end_function()
}

#[test]
fn test_ssa_diamond_phi_follows_predecessor_order() -> Result<()> {
    let (symbols, vars) = symbols_with(&["x"]);
    let x = vars[0];
    let mut builder = CfgBuilder::new(&symbols);
    let entry = builder.begin_function("f")?;
    let left = builder.create_block()?;
    let right = builder.create_block()?;
    let join = builder.create_block()?;

    // Right is wired first, so it is the join's first predecessor.
    builder.add_edge(entry, left)?;
    builder.add_edge(entry, right)?;
    builder.add_edge(right, join)?;
    builder.add_edge(left, join)?;
    for block in [left, right, join] {
        builder.seal_block(block)?;
    }

    builder.set_current_block(left);
    let from_left = builder.emit(SsaOp::Mov, &[SsaValue::literal(1000, 1)])?;
    builder.write_variable(x, left, from_left);
    builder.set_current_block(right);
    let from_right = builder.emit(SsaOp::Mov, &[SsaValue::literal(1001, 2)])?;
    builder.write_variable(x, right, from_right);

    let merged = builder.read_variable(x, join)?;
    assert_eq!(op_of(&builder, merged), Some(SsaOp::Phi));

    let function = builder.function().unwrap();
    let phi = function.definition(&merged).unwrap();
    assert_eq!(phi.block(), join);
    assert_eq!(phi.operands(), &[from_right, from_left]);
    assert!(function.users(from_left.def().unwrap()).contains(&phi.id()));

    // Removal leaves a PHI with two distinct operands alone.
    let phi_id = phi.id();
    assert_eq!(builder.try_remove_trivial_phi(phi_id)?, merged);
    builder.end_function()
}

#[test]
fn test_ssa_diamond_without_writes_folds_phi() -> Result<()> {
    let (symbols, vars) = symbols_with(&["x"]);
    let x = vars[0];
    let mut builder = CfgBuilder::new(&symbols);
    let entry = builder.begin_function("f")?;
    let value = builder.emit(SsaOp::Mov, &[SsaValue::literal(1000, 1)])?;
    builder.write_variable(x, entry, value);

    let left = builder.create_block()?;
    let right = builder.create_block()?;
    let join = builder.create_block()?;
    builder.add_edge(entry, left)?;
    builder.add_edge(entry, right)?;
    builder.add_edge(left, join)?;
    builder.add_edge(right, join)?;
    for block in [left, right, join] {
        builder.seal_block(block)?;
    }

    assert_eq!(builder.read_variable(x, join)?, value);

    let function = builder.function().unwrap();
    assert_eq!(function.phis().count(), 0);
    // The removed PHI keeps its slot as a copy of the surviving value.
    let copy = function.block(join).unwrap().instructions();
    assert_eq!(copy.len(), 1);
    assert_eq!(copy[0].op(), SsaOp::Mov);
    assert_eq!(copy[0].operands(), &[value]);
    builder.end_function()
}

#[test]
fn test_ssa_loop_header_phi_completed_on_seal() -> Result<()> {
    let (symbols, vars) = symbols_with(&["i"]);
    let i = vars[0];
    let mut builder = CfgBuilder::new(&symbols);
    let entry = builder.begin_function("f")?;
    let start = builder.emit(SsaOp::Mov, &[SsaValue::literal(1000, 0)])?;
    builder.write_variable(i, entry, start);

    let header = builder.create_block()?;
    let body = builder.create_block()?;
    builder.add_edge(entry, header)?;
    builder.add_edge(header, body)?;
    builder.seal_block(body)?;
    assert!(!builder.is_sealed(header));

    let in_header = builder.read_variable(i, header)?;
    {
        let function = builder.function().unwrap();
        let phi = function.definition(&in_header).unwrap();
        assert!(phi.is_phi());
        assert!(phi.operands().is_empty());
    }

    builder.set_current_block(body);
    let current = builder.read_variable(i, body)?;
    assert_eq!(current, in_header);
    let next = builder.emit(SsaOp::Add, &[current, SsaValue::literal(1001, 1)])?;
    builder.write_variable(i, body, next);
    builder.add_edge(body, header)?;
    builder.seal_block(header)?;

    let function = builder.function().unwrap();
    let phi = function.definition(&in_header).unwrap();
    assert!(phi.is_phi());
    assert_eq!(phi.operands(), &[start, next]);
    builder.end_function()
}

#[test]
fn test_ssa_removal_is_idempotent() -> Result<()> {
    let (symbols, vars) = symbols_with(&["x"]);
    let x = vars[0];
    let mut builder = CfgBuilder::new(&symbols);
    let entry = builder.begin_function("f")?;
    let value = builder.emit(SsaOp::Mov, &[SsaValue::literal(1000, 3)])?;
    builder.write_variable(x, entry, value);

    let header = builder.create_block()?;
    builder.add_edge(entry, header)?;
    let phi = builder.read_variable(x, header)?.def().unwrap();
    builder.add_edge(header, header)?;
    builder.seal_block(header)?;

    assert_eq!(builder.try_remove_trivial_phi(phi)?, value);
    assert_eq!(builder.try_remove_trivial_phi(phi)?, value);
    assert_eq!(builder.read_variable(x, header)?, value);
    builder.end_function()
}

#[test]
fn test_ssa_trivial_phi_removal_cascades() -> Result<()> {
    init_logging();
    let (symbols, vars) = symbols_with(&["x"]);
    let x = vars[0];
    let mut builder = CfgBuilder::new(&symbols);
    let entry = builder.begin_function("f")?;
    let value = builder.emit(SsaOp::Mov, &[SsaValue::literal(1000, 9)])?;
    builder.write_variable(x, entry, value);

    // entry -> outer -> inner, inner -> inner, inner -> outer
    let outer = builder.create_block()?;
    let inner = builder.create_block()?;
    builder.add_edge(entry, outer)?;
    builder.add_edge(outer, inner)?;
    let inner_phi = builder.read_variable(x, inner)?.def().unwrap();
    builder.add_edge(inner, inner)?;
    builder.add_edge(inner, outer)?;

    builder.seal_block(outer)?;
    builder.seal_block(inner)?;

    let function = builder.function().unwrap();
    assert_eq!(function.phis().count(), 0);
    assert_eq!(
        function.instruction(inner_phi).map(|i| i.operands().to_vec()),
        Some(vec![value])
    );
    assert_eq!(builder.read_variable(x, inner)?, value);
    assert_eq!(builder.read_variable(x, outer)?, value);
    builder.end_function()
}

#[test]
fn test_ssa_builder_errors() {
    let (symbols, _) = symbols_with(&[]);
    let mut builder = CfgBuilder::new(&symbols);
    assert!(matches!(builder.end_function(), Err(Error::SsaError { .. })));
    assert!(builder.create_block().is_err());

    builder.begin_function("f").unwrap();
    assert!(builder.begin_function("g").is_err());
    assert!(matches!(
        builder.add_edge(BlockId::new(0), BlockId::new(5)),
        Err(Error::BlockNotFound(5))
    ));
}

/// `fib(n)`: an `if` nested in a `while`, with a call in the loop body.
#[test]
fn test_ssa_whole_program() -> Result<()> {
    init_logging();
    let mut ast = AstBuilder::new();
    let fib = ast.declare_function("fib");
    let n = ast.declare_local("n", 1);
    let a = ast.declare_local("a", 2);
    let b = ast.declare_local("b", 2);
    let t = ast.declare_local("t", 3);

    let loop_cond = ast.binary(Operation::GreaterThan, ast.ident(n), ast.number(0));
    let skip_cond = ast.binary(Operation::Equal, ast.ident(a), ast.number(13));
    let skip = ast.compound(vec![ast.expr_stmt(ast.assign(a, ast.number(0)))]);
    let step = ast.compound(vec![
        ast.var_stmt(ast.var(t, Some(ast.ident(a)))),
        ast.expr_stmt(ast.assign(a, ast.ident(b))),
        ast.expr_stmt(ast.assign(
            b,
            ast.binary(Operation::Plus, ast.ident(t), ast.ident(b)),
        )),
        ast.if_stmt(skip_cond, skip),
        ast.expr_stmt(ast.assign(
            n,
            ast.binary(Operation::Minus, ast.ident(n), ast.number(1)),
        )),
    ]);
    let body = ast.compound(vec![
        ast.var_stmt(ast.var(a, Some(ast.number(0)))),
        ast.var_stmt(ast.var(b, Some(ast.number(1)))),
        ast.while_stmt(loop_cond, step),
        ast.ret(Some(ast.ident(a))),
    ]);
    let fib_decl = ast.function("fib", vec![ast.param(n)], body);
    let call = ast.call(fib, vec![ast.number(10)]);
    let main_body = ast.compound(vec![ast.ret(Some(call))]);
    let main_decl = ast.function("main", vec![], main_body);
    let (program, symbols) = ast.finish(vec![fib_decl, main_decl]);

    let module = CfgBuilder::new(&symbols).run(&program)?;

    let fib = module.get_function("fib")?;
    assert_eq!(fib.nb_arguments(), 1);
    assert!(fib.cfg().iter().all(|block| block.is_properly_terminated()));
    for block in fib.cfg() {
        assert!(block.instructions()[..block.len() - 1]
            .iter()
            .all(|inst| !inst.is_terminator()));
    }

    // n, a and b are all redefined in the loop; t is local to one iteration.
    let header = BlockId::new(1);
    assert_eq!(fib.block_phis(header).count(), 3);
    for phi in fib.phis() {
        let block = fib.block(phi.block()).unwrap();
        assert_eq!(phi.operands().len(), block.predecessors().len());
        assert!(phi.operands().iter().all(|operand| !operand.is_unknown()));
    }

    let main = module.get_function("main")?;
    let call = main
        .instructions()
        .find(|inst| inst.op() == SsaOp::Call)
        .unwrap();
    assert_eq!(call.callee(), Some("fib"));
    assert_eq!(call.operands().len(), 1);

    let printed = module.to_string();
    assert!(printed.contains("CFG for fib:"));
    assert!(printed.contains("CFG for main:"));
    assert!(printed.contains("PHI"));
    Ok(())
}
