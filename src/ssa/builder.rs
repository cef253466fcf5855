//! SSA construction from the AST.
//!
//! [`CfgBuilder`] walks a checked [`Program`] once and emits SSA instructions into basic blocks,
//! building one [`SsaFunction`] per function declaration. Variable versioning happens on the fly
//! following Braun et al., "Simple and Efficient Construction of Static Single Assignment Form":
//! no dominator tree or dominance frontier is ever computed.
//!
//! # Algorithm
//!
//! - [`CfgBuilder::write_variable`] records the definition of a variable that reaches the end of
//!   a block.
//! - [`CfgBuilder::read_variable`] returns that definition, or resolves it recursively through
//!   the block's predecessors and memoizes the answer.
//! - A block whose predecessor set may still grow (a loop header before its back edge exists) is
//!   *unsealed*. Reads there produce an operandless PHI which is completed by
//!   [`CfgBuilder::seal_block`].
//! - A block with exactly one predecessor never gets a PHI: the predecessor's value is used as is.
//! - Every other read in a sealed block creates a PHI, registers it as the variable's value to
//!   break cycles, fills one operand per predecessor and then tries to remove it again with
//!   [`CfgBuilder::try_remove_trivial_phi`].
//!
//! # Control Structures
//!
//! | Statement | Shape |
//! |-----------|-------|
//! | `if (c) { body }` | `cond -> then`, `cond -> exit`, `then_end -> exit` |
//! | `while (c) { body }` | `pre -> header`, `header -> body`, `header -> exit`, `body_end -> header` |
//!
//! The exit of an `if` is sealed once both incoming edges exist, so a variable assigned in the
//! body and read afterwards gets its join PHI through the ordinary read path. A loop header is
//! sealed only after its back edge was added.
//!
//! # Preconditions
//!
//! The builder assumes the AST went through scope checking: every identifier, declaration and
//! call is bound in the [`SymbolTable`]. An unbound node is reported as
//! [`Error::SsaError`](crate::Error::SsaError) rather than being silently skipped.
//!
//! # Example
//!
//! ```rust
//! use toslang::{ast::{AstBuilder, Operation}, ssa::CfgBuilder};
//!
//! let mut ast = AstBuilder::new();
//! let n = ast.declare_local("n", 1);
//! let cond = ast.binary(Operation::LessThan, ast.ident(n), ast.number(10));
//! let step = ast.assign(n, ast.binary(Operation::Plus, ast.ident(n), ast.number(1)));
//! let body = ast.compound(vec![
//!     ast.var_stmt(ast.var(n, Some(ast.number(0)))),
//!     ast.while_stmt(cond, ast.compound(vec![ast.expr_stmt(step)])),
//!     ast.ret(Some(ast.ident(n))),
//! ]);
//! let main = ast.function("main", vec![], body);
//! let (program, symbols) = ast.finish(vec![main]);
//!
//! let module = CfgBuilder::new(&symbols).run(&program)?;
//! let main = module.get_function("main")?;
//! assert_eq!(main.phis().count(), 1);
//! # Ok::<(), toslang::Error>(())
//! ```

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{
        CallExpr, CompoundStmt, Decl, Expr, FunctionDecl, IfStmt, NodeId, Operation, Program,
        Stmt, Symbol, SymbolId, SymbolTable, VarDecl, WhileStmt,
    },
    cfg::BlockId,
    ssa::{InstId, SsaFunction, SsaInstruction, SsaModule, SsaOp, SsaValue},
    Result,
};

/// Options controlling SSA construction.
///
/// | Option | Default |
/// |--------|---------|
/// | `remove_trivial_phis` | `true` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Remove PHIs whose operands are all the same value (or the PHI itself).
    ///
    /// Turning this off keeps every PHI the read algorithm creates, which is mostly useful to
    /// inspect the raw construction.
    pub remove_trivial_phis: bool,
}

impl BuilderOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether trivial PHIs are removed.
    #[must_use]
    pub fn with_remove_trivial_phis(mut self, enabled: bool) -> Self {
        self.remove_trivial_phis = enabled;
        self
    }
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            remove_trivial_phis: true,
        }
    }
}

/// Builds SSA-form control flow graphs from an AST.
///
/// A builder borrows the symbol table for its lifetime and can run several times; every run
/// starts from a clean state. Besides [`CfgBuilder::run`], the variable versioning primitives
/// are public so that graphs can be assembled by hand.
pub struct CfgBuilder<'a> {
    /// Symbol bindings produced by scope checking.
    symbols: &'a SymbolTable,

    /// Construction options.
    options: BuilderOptions,

    /// Next id for values and instructions.
    next_id: u32,

    /// Module under construction.
    module: SsaModule,

    /// Function under construction, with the name it will be stored under.
    function: Option<(String, SsaFunction)>,

    /// Block receiving new instructions. `None` outside of functions.
    current_block: Option<BlockId>,

    /// Reaching definition of each variable at the end of each block.
    current_var_def: FxHashMap<SymbolId, FxHashMap<BlockId, SsaValue>>,

    /// Definitions made at program level.
    global_var_def: FxHashMap<SymbolId, SsaValue>,

    /// PHIs created in unsealed blocks, waiting for their operands.
    incomplete_phis: FxHashMap<BlockId, BTreeMap<SymbolId, InstId>>,

    /// Blocks whose predecessor set is final.
    sealed_blocks: FxHashSet<BlockId>,
}

impl<'a> CfgBuilder<'a> {
    /// Creates a builder with default options.
    #[must_use]
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self::with_options(symbols, BuilderOptions::default())
    }

    /// Creates a builder with explicit options.
    #[must_use]
    pub fn with_options(symbols: &'a SymbolTable, options: BuilderOptions) -> Self {
        Self {
            symbols,
            options,
            next_id: 0,
            module: SsaModule::new(),
            function: None,
            current_block: None,
            current_var_def: FxHashMap::default(),
            global_var_def: FxHashMap::default(),
            incomplete_phis: FxHashMap::default(),
            sealed_blocks: FxHashSet::default(),
        }
    }

    /// Lowers a whole program.
    ///
    /// Function declarations become SSA functions of the returned module; initializers of
    /// program-level variables are lowered into the module's global block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SsaError`](crate::Error::SsaError) if the AST references a node the
    /// symbol table does not know or uses an operator in a position it cannot have.
    pub fn run(&mut self, program: &Program) -> Result<SsaModule> {
        self.reset();

        for decl in &program.decls {
            match decl {
                Decl::Function(func) => self.lower_function(func)?,
                Decl::Var(var) => self.lower_var_decl(var)?,
            }
        }

        Ok(std::mem::take(&mut self.module))
    }

    fn reset(&mut self) {
        self.next_id = 0;
        self.module = SsaModule::new();
        self.function = None;
        self.current_block = None;
        self.current_var_def.clear();
        self.global_var_def.clear();
        self.incomplete_phis.clear();
        self.sealed_blocks.clear();
    }

    // ============================================================================================
    // Function and block management
    // ============================================================================================

    /// Starts a new function and returns its entry block.
    ///
    /// Per-function versioning state is cleared. The entry block is sealed, since nothing can
    /// branch to it.
    ///
    /// # Errors
    ///
    /// Returns an error if a function is already under construction.
    pub fn begin_function(&mut self, name: &str) -> Result<BlockId> {
        if let Some((open, _)) = &self.function {
            return Err(ssa_error!(
                "Cannot begin function '{}' while '{}' is open",
                name,
                open
            ));
        }

        self.current_var_def.clear();
        self.incomplete_phis.clear();
        self.sealed_blocks.clear();

        let mut function = SsaFunction::new();
        let entry = function.create_block(None);
        self.function = Some((name.to_string(), function));
        self.current_block = Some(entry);
        self.seal_block(entry)?;

        log::debug!("Building SSA for function '{name}'");
        Ok(entry)
    }

    /// Finishes the open function and stores it in the module.
    ///
    /// # Errors
    ///
    /// Returns an error if no function is open or if some block was never sealed.
    pub fn end_function(&mut self) -> Result<()> {
        let Some((name, function)) = self.function.take() else {
            return Err(ssa_error!("No function under construction"));
        };
        self.current_block = None;

        if let Some(block) = self.incomplete_phis.keys().min() {
            return Err(ssa_error!(
                "Function '{}' left block {} unsealed",
                name,
                block
            ));
        }

        self.module.insert_function(&name, function);
        Ok(())
    }

    /// Returns the function under construction.
    #[must_use]
    pub fn function(&self) -> Option<&SsaFunction> {
        self.function.as_ref().map(|(_, f)| f)
    }

    fn function_mut(&mut self) -> Result<&mut SsaFunction> {
        match &mut self.function {
            Some((_, function)) => Ok(function),
            None => Err(ssa_error!("No function under construction")),
        }
    }

    /// Returns the module built so far.
    #[must_use]
    pub fn module(&self) -> &SsaModule {
        &self.module
    }

    /// Consumes the builder and returns its module.
    #[must_use]
    pub fn into_module(self) -> SsaModule {
        self.module
    }

    /// Creates an unsealed block in the open function.
    ///
    /// # Errors
    ///
    /// Returns an error if no function is open.
    pub fn create_block(&mut self) -> Result<BlockId> {
        let block = self.function_mut()?.create_block(None);
        log::trace!("Created block {block}");
        Ok(block)
    }

    /// Adds the edge `from -> to` in the open function.
    ///
    /// # Errors
    ///
    /// Returns an error if no function is open or either block is unknown.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> Result<()> {
        self.function_mut()?.add_edge(from, to)
    }

    /// Makes `block` the target of subsequently emitted instructions.
    pub fn set_current_block(&mut self, block: BlockId) {
        self.current_block = Some(block);
    }

    /// Returns the block receiving new instructions.
    #[must_use]
    pub fn current_block(&self) -> Option<BlockId> {
        self.current_block
    }

    fn current(&self) -> Result<BlockId> {
        self.current_block
            .ok_or_else(|| ssa_error!("No current block outside of a function"))
    }

    /// Returns `true` once `block` has been sealed.
    #[must_use]
    pub fn is_sealed(&self, block: BlockId) -> bool {
        self.sealed_blocks.contains(&block)
    }

    /// Declares that `block` will get no further predecessors.
    ///
    /// Every PHI created while the block was unsealed receives its operands now, in predecessor
    /// order. Sealing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if no function is open.
    pub fn seal_block(&mut self, block: BlockId) -> Result<()> {
        if self.sealed_blocks.contains(&block) {
            return Ok(());
        }

        log::trace!("Sealing block {block}");
        let pending = self.incomplete_phis.remove(&block).unwrap_or_default();
        for (variable, phi) in pending {
            self.add_phi_operands(variable, phi)?;
        }
        self.sealed_blocks.insert(block);
        Ok(())
    }

    fn fresh_id(&mut self) -> InstId {
        let id = InstId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn fresh_literal(&mut self, value: i64) -> SsaValue {
        let id = self.fresh_id();
        SsaValue::literal(id.index(), value)
    }

    /// Emits an instruction into the current block, or into the module's global block when no
    /// function is open, and returns its result value.
    ///
    /// # Errors
    ///
    /// Returns an error if the current block does not belong to the open function.
    pub fn emit(&mut self, op: SsaOp, operands: &[SsaValue]) -> Result<SsaValue> {
        match self.current_block {
            Some(block) => self.emit_into(block, op, operands),
            None => {
                let id = self.fresh_id();
                let mut inst = SsaInstruction::new(op, id, BlockId::default());
                for operand in operands {
                    inst.add_operand(*operand);
                }
                self.module.insert_global(inst);
                Ok(SsaValue::result(id))
            }
        }
    }

    fn emit_into(&mut self, block: BlockId, op: SsaOp, operands: &[SsaValue]) -> Result<SsaValue> {
        let id = self.fresh_id();
        let mut inst = SsaInstruction::new(op, id, block);
        for operand in operands {
            inst.add_operand(*operand);
        }
        self.function_mut()?.append(inst)?;
        Ok(SsaValue::result(id))
    }

    /// Appends a `BR` on `condition` (if any) to `from`, recording `targets` on the instruction.
    /// Edges are added separately.
    fn emit_branch(
        &mut self,
        from: BlockId,
        condition: Option<SsaValue>,
        targets: &[BlockId],
    ) -> Result<()> {
        let id = self.fresh_id();
        let mut inst = SsaInstruction::new(SsaOp::Br, id, from);
        if let Some(condition) = condition {
            inst.add_operand(condition);
        }
        for target in targets {
            inst.add_target(*target);
        }
        self.function_mut()?.append(inst)?;
        Ok(())
    }

    fn is_terminated(&self, block: BlockId) -> bool {
        self.function()
            .and_then(|f| f.block(block))
            .is_some_and(|b| b.is_properly_terminated())
    }

    /// Terminates `from` with an unconditional branch to `to` unless it already ends with a
    /// jump or return.
    fn branch_to(&mut self, from: BlockId, to: BlockId) -> Result<()> {
        if !self.is_terminated(from) {
            self.emit_branch(from, None, &[to])?;
            self.add_edge(from, to)?;
        }
        Ok(())
    }

    // ============================================================================================
    // Variable versioning
    // ============================================================================================

    /// Records `value` as the definition of `variable` reaching the end of `block`.
    ///
    /// Overwrites any earlier definition for the same pair.
    pub fn write_variable(&mut self, variable: SymbolId, block: BlockId, value: SsaValue) {
        self.current_var_def
            .entry(variable)
            .or_default()
            .insert(block, value);
    }

    /// Returns the definition of `variable` that reaches `block`.
    ///
    /// The answer is memoized, so two reads without an intervening write return the same value.
    ///
    /// # Errors
    ///
    /// Returns an error if no function is open or `block` does not belong to it.
    pub fn read_variable(&mut self, variable: SymbolId, block: BlockId) -> Result<SsaValue> {
        if let Some(value) = self
            .current_var_def
            .get(&variable)
            .and_then(|defs| defs.get(&block))
        {
            return Ok(*value);
        }
        self.read_variable_recursive(variable, block)
    }

    fn read_variable_recursive(&mut self, variable: SymbolId, block: BlockId) -> Result<SsaValue> {
        let value = if !self.sealed_blocks.contains(&block) {
            let phi = self.new_phi(block)?;
            self.incomplete_phis
                .entry(block)
                .or_default()
                .insert(variable, phi);
            SsaValue::result(phi)
        } else {
            let predecessors = self
                .function_mut()?
                .block(block)
                .map(|b| b.predecessors().to_vec())
                .unwrap_or_default();

            match predecessors.as_slice() {
                [] => self
                    .global_var_def
                    .get(&variable)
                    .copied()
                    .unwrap_or_else(SsaValue::unknown),
                [single] => self.read_variable(variable, *single)?,
                _ => {
                    let phi = self.new_phi(block)?;
                    self.write_variable(variable, block, SsaValue::result(phi));
                    self.add_phi_operands(variable, phi)?
                }
            }
        };

        self.write_variable(variable, block, value);
        Ok(value)
    }

    fn new_phi(&mut self, block: BlockId) -> Result<InstId> {
        let id = self.fresh_id();
        self.function_mut()?
            .insert_phi(SsaInstruction::new(SsaOp::Phi, id, block))?;
        log::trace!("Inserted PHI {id} in block {block}");
        Ok(id)
    }

    fn add_phi_operands(&mut self, variable: SymbolId, phi: InstId) -> Result<SsaValue> {
        let function = self.function_mut()?;
        let predecessors = function
            .instruction(phi)
            .and_then(|inst| function.block(inst.block()))
            .map(|b| b.predecessors().to_vec())
            .unwrap_or_default();

        for predecessor in predecessors {
            let value = self.read_variable(variable, predecessor)?;
            self.function_mut()?.add_operand(phi, value);
        }

        if self.options.remove_trivial_phis {
            self.try_remove_trivial_phi(phi)
        } else {
            Ok(SsaValue::result(phi))
        }
    }

    /// Removes `phi` if it does not merge at least two distinct values.
    ///
    /// A trivial PHI is replaced in place by a `MOV` of its single distinct operand. Every user
    /// is rewritten to use that operand instead, and users that are PHIs themselves are checked
    /// again since they may have become trivial too. A PHI with no operand other than itself
    /// resolves to the undefined value.
    ///
    /// Calling this on a PHI that was already removed returns the value it was replaced with.
    ///
    /// # Returns
    ///
    /// The value that now stands for `phi`: the PHI's own result if it was kept.
    ///
    /// # Errors
    ///
    /// Returns an error if no function is open.
    pub fn try_remove_trivial_phi(&mut self, phi: InstId) -> Result<SsaValue> {
        let Some(inst) = self.function_mut()?.instruction(phi).cloned() else {
            return Ok(SsaValue::result(phi));
        };

        if !inst.is_phi() {
            // Already replaced by a MOV of the surviving value.
            return Ok(inst
                .operands()
                .first()
                .copied()
                .unwrap_or_else(|| inst.result()));
        }

        let result = inst.result();
        let mut same: Option<SsaValue> = None;
        for operand in inst.operands() {
            if Some(*operand) == same || *operand == result {
                continue;
            }
            if same.is_some() {
                return Ok(result);
            }
            same = Some(*operand);
        }
        let same = same.unwrap_or_else(SsaValue::unknown);

        let users: Vec<InstId> = inst.users().iter().copied().filter(|u| *u != phi).collect();

        let mut replacement = SsaInstruction::new(SsaOp::Mov, phi, inst.block());
        replacement.add_operand(same);
        for user in &users {
            replacement.add_user(*user);
        }

        let function = self.function_mut()?;
        function.replace_instruction(phi, replacement);
        function.register_user(same, phi);
        for user in &users {
            if let Some(target) = function.instruction_mut(*user) {
                for operand in target.operands_mut().iter_mut() {
                    if *operand == result {
                        *operand = same;
                    }
                }
            }
            function.register_user(same, *user);
        }

        for defs in self.current_var_def.values_mut() {
            for value in defs.values_mut() {
                if *value == result {
                    *value = same;
                }
            }
        }
        log::debug!("Removed trivial PHI {phi}, replaced by {same}");

        for user in users {
            let is_phi = self
                .function()
                .and_then(|f| f.instruction(user))
                .is_some_and(SsaInstruction::is_phi);
            if is_phi {
                self.try_remove_trivial_phi(user)?;
            }
        }

        Ok(same)
    }

    // ============================================================================================
    // Declarations
    // ============================================================================================

    fn symbol(&self, node: NodeId, what: &str) -> Result<SymbolId> {
        self.symbols
            .try_get_symbol(node)
            .map(|(id, _)| id)
            .ok_or_else(|| ssa_error!("Unbound {} node {}", what, node.index()))
    }

    fn lower_function(&mut self, decl: &FunctionDecl) -> Result<()> {
        let entry = self.begin_function(&decl.name)?;

        for param in &decl.params {
            let symbol = self.symbol(param.id, "parameter")?;
            let value = SsaValue::argument(self.fresh_id().index());
            self.function_mut()?.add_argument(value);
            self.write_variable(symbol, entry, value);
        }

        self.lower_compound(&decl.body)?;
        self.end_function()
    }

    fn lower_var_decl(&mut self, decl: &VarDecl) -> Result<()> {
        if decl.is_parameter {
            return Ok(());
        }
        let Some(init) = &decl.init else {
            return Ok(());
        };

        let value = self.lower_expr(init)?;
        let symbol = self.symbol(decl.id, "variable")?;
        self.assign_variable(symbol, value)
    }

    /// Writes to a global also publish the value to the global pseudo-block, so functions
    /// lowered afterwards observe it.
    fn assign_variable(&mut self, symbol: SymbolId, value: SsaValue) -> Result<()> {
        if let Some(block) = self.current_block {
            self.write_variable(symbol, block, value);
            if !self.symbols.get(symbol).is_some_and(Symbol::is_global) {
                return Ok(());
            }
        }
        self.global_var_def.insert(symbol, value);
        Ok(())
    }

    fn read_current(&mut self, symbol: SymbolId) -> Result<SsaValue> {
        match self.current_block {
            Some(block) => self.read_variable(symbol, block),
            None => Ok(self
                .global_var_def
                .get(&symbol)
                .copied()
                .unwrap_or_else(SsaValue::unknown)),
        }
    }

    // ============================================================================================
    // Statements
    // ============================================================================================

    fn lower_compound(&mut self, compound: &CompoundStmt) -> Result<()> {
        for stmt in &compound.stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// Starts a fresh block when the current one already ended with a jump or return, so code
    /// following a `return` does not land behind the terminator.
    fn ensure_open_block(&mut self) -> Result<()> {
        let current = self.current()?;
        if self.is_terminated(current) {
            let block = self.create_block()?;
            self.seal_block(block)?;
            self.current_block = Some(block);
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.ensure_open_block()?;

        match stmt {
            Stmt::Compound(compound) => self.lower_compound(compound),
            Stmt::VarDecl(decl) => self.lower_var_decl(decl),
            Stmt::If(if_stmt) => self.lower_if(if_stmt),
            Stmt::While(while_stmt) => self.lower_while(while_stmt),
            Stmt::Return(value) => {
                let operands = match value {
                    Some(expr) => vec![self.lower_expr(expr)?],
                    None => Vec::new(),
                };
                self.emit(SsaOp::Ret, &operands)?;
                Ok(())
            }
            Stmt::Print(_) | Stmt::Scan(_) => {
                log::trace!("I/O statement left for instruction selection");
                Ok(())
            }
            Stmt::Expr(expr) => self.lower_expr(expr).map(|_| ()),
        }
    }

    fn lower_if(&mut self, stmt: &IfStmt) -> Result<()> {
        let cond = self.lower_expr(&stmt.cond)?;
        let cond_block = self.current()?;

        let then_begin = self.create_block()?;
        self.add_edge(cond_block, then_begin)?;
        self.seal_block(then_begin)?;
        self.current_block = Some(then_begin);

        self.lower_compound(&stmt.body)?;
        let then_end = self.current()?;

        let exit = self.create_block()?;
        self.emit_branch(cond_block, Some(cond), &[then_begin, exit])?;
        self.add_edge(cond_block, exit)?;
        self.branch_to(then_end, exit)?;
        self.seal_block(exit)?;
        self.current_block = Some(exit);
        Ok(())
    }

    fn lower_while(&mut self, stmt: &WhileStmt) -> Result<()> {
        let pre_header = self.current()?;
        let header = self.create_block()?;
        self.branch_to(pre_header, header)?;
        self.current_block = Some(header);

        let cond = self.lower_expr(&stmt.cond)?;
        let header_end = self.current()?;

        let body_begin = self.create_block()?;
        self.add_edge(header_end, body_begin)?;
        self.seal_block(body_begin)?;
        self.current_block = Some(body_begin);

        self.lower_compound(&stmt.body)?;
        let body_end = self.current()?;

        let exit = self.create_block()?;
        self.emit_branch(header_end, Some(cond), &[body_begin, exit])?;
        self.add_edge(header_end, exit)?;
        self.branch_to(body_end, header)?;

        self.seal_block(header)?;
        self.seal_block(exit)?;
        self.current_block = Some(exit);
        Ok(())
    }

    // ============================================================================================
    // Expressions
    // ============================================================================================

    fn lower_expr(&mut self, expr: &Expr) -> Result<SsaValue> {
        match expr {
            Expr::Bool(value) => {
                let literal = self.fresh_literal(i64::from(*value));
                self.emit(SsaOp::Mov, &[literal])
            }
            Expr::Number(value) => {
                let literal = self.fresh_literal(*value);
                self.emit(SsaOp::Mov, &[literal])
            }
            Expr::Str(text) => {
                let slot = self.module.insert_array_variable(text, text.as_bytes());
                let literal = self.fresh_literal(i64::try_from(slot).unwrap_or(i64::MAX));
                self.emit(SsaOp::Mov, &[literal])
            }
            Expr::Ident(ident) => {
                let symbol = self.symbol(ident.id, "identifier")?;
                let value = self.read_current(symbol)?;
                self.emit(SsaOp::Mov, &[value])
            }
            Expr::Binary(binary) if binary.op == Operation::Assignment => {
                let Expr::Ident(target) = binary.lhs.as_ref() else {
                    return Err(ssa_error!("Assignment target is not an identifier"));
                };
                let symbol = self.symbol(target.id, "identifier")?;
                let value = self.lower_expr(&binary.rhs)?;
                let copy = self.emit(SsaOp::Mov, &[value])?;
                self.assign_variable(symbol, copy)?;
                Ok(copy)
            }
            Expr::Binary(binary) => {
                let op = binary_op(binary.op)
                    .ok_or_else(|| ssa_error!("{:?} is not a binary operator", binary.op))?;
                let lhs = self.lower_expr(&binary.lhs)?;
                let rhs = self.lower_expr(&binary.rhs)?;
                self.emit(op, &[lhs, rhs])
            }
            Expr::Unary(unary) => {
                let op = match unary.op {
                    Operation::Not => SsaOp::Not,
                    Operation::Negate | Operation::Minus => SsaOp::Neg,
                    other => return Err(ssa_error!("{:?} is not a unary operator", other)),
                };
                let operand = self.lower_expr(&unary.operand)?;
                self.emit(op, &[operand])
            }
            Expr::Call(call) => self.lower_call(call),
        }
    }

    fn lower_call(&mut self, call: &CallExpr) -> Result<SsaValue> {
        self.symbol(call.id, "call")?;

        let mut arguments = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let value = match arg {
                Expr::Ident(ident) => {
                    let symbol = self.symbol(ident.id, "argument")?;
                    self.read_current(symbol)?
                }
                other => self.lower_expr(other)?,
            };
            arguments.push(value);
        }

        let id = self.fresh_id();
        let result = SsaValue::result(id);
        match self.current_block {
            Some(block) => {
                let mut inst = SsaInstruction::call(&call.callee, id, block);
                for argument in arguments {
                    inst.add_operand(argument);
                }
                self.function_mut()?.append(inst)?;
            }
            None => {
                let mut inst = SsaInstruction::call(&call.callee, id, BlockId::default());
                for argument in arguments {
                    inst.add_operand(argument);
                }
                self.module.insert_global(inst);
            }
        }
        Ok(result)
    }
}

/// Maps a front-end binary operator to its SSA opcode. Assignment is handled separately.
fn binary_op(op: Operation) -> Option<SsaOp> {
    Some(match op {
        Operation::AndBool | Operation::AndInt => SsaOp::And,
        Operation::Divide => SsaOp::Div,
        Operation::Equal => SsaOp::Eq,
        Operation::GreaterThan => SsaOp::Gt,
        Operation::LeftShift => SsaOp::LShift,
        Operation::LessThan => SsaOp::Lt,
        Operation::Minus => SsaOp::Sub,
        Operation::Modulo => SsaOp::Mod,
        Operation::Mult => SsaOp::Mul,
        Operation::OrBool | Operation::OrInt => SsaOp::Or,
        Operation::Plus => SsaOp::Add,
        Operation::RightShift => SsaOp::RShift,
        Operation::Xor => SsaOp::Xor,
        Operation::Assignment | Operation::Not | Operation::Negate => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;

    fn build(ast: AstBuilder, decls: Vec<Decl>) -> SsaModule {
        let (program, symbols) = ast.finish(decls);
        CfgBuilder::new(&symbols).run(&program).unwrap()
    }

    fn ops(function: &SsaFunction, block: BlockId) -> Vec<SsaOp> {
        function
            .block(block)
            .unwrap()
            .instructions()
            .iter()
            .map(SsaInstruction::op)
            .collect()
    }

    #[test]
    fn test_literal_and_return() {
        let mut ast = AstBuilder::new();
        let body = ast.compound(vec![ast.ret(Some(ast.number(42)))]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);

        let main = module.get_function("main").unwrap();
        assert_eq!(main.cfg().len(), 1);
        let entry = main.cfg().entry_block().unwrap();
        assert_eq!(ops(main, entry.id()), vec![SsaOp::Mov, SsaOp::Ret]);
        assert_eq!(entry.instructions()[0].operands()[0].literal_value(), Some(42));
        assert!(entry.is_properly_terminated());
        assert_eq!(
            entry.instructions()[1].operands(),
            &[entry.instructions()[0].result()]
        );
    }

    #[test]
    fn test_identifier_read_emits_fresh_mov() {
        let mut ast = AstBuilder::new();
        let x = ast.declare_local("x", 1);
        let sum = ast.binary(Operation::Plus, ast.ident(x), ast.ident(x));
        let body = ast.compound(vec![
            ast.var_stmt(ast.var(x, Some(ast.number(3)))),
            ast.ret(Some(sum)),
        ]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);

        let main = module.get_function("main").unwrap();
        let insts = main.cfg().entry_block().unwrap().instructions();
        // MOV 3, MOV x, MOV x, ADD, RET
        assert_eq!(insts.len(), 5);
        let init = insts[0].result();
        assert_eq!(insts[1].operands(), &[init]);
        assert_eq!(insts[2].operands(), &[init]);
        assert_ne!(insts[1].result(), insts[2].result());
        assert_eq!(insts[3].op(), SsaOp::Add);
        assert_eq!(main.users(insts[0].id()), &[insts[1].id(), insts[2].id()]);
    }

    #[test]
    fn test_parameters_are_arguments() {
        let mut ast = AstBuilder::new();
        let a = ast.declare_local("a", 1);
        let b = ast.declare_local("b", 1);
        let body = ast.compound(vec![ast.ret(Some(ast.binary(
            Operation::Minus,
            ast.ident(a),
            ast.ident(b),
        )))]);
        let params = vec![ast.param(a), ast.param(b)];
        let sub = ast.function("sub", params, body);
        let module = build(ast, vec![sub]);

        let sub = module.get_function("sub").unwrap();
        assert_eq!(sub.nb_arguments(), 2);
        let insts = sub.cfg().entry_block().unwrap().instructions();
        assert_eq!(insts[0].operands(), &[sub.arguments()[0]]);
        assert_eq!(insts[1].operands(), &[sub.arguments()[1]]);
    }

    #[test]
    fn test_if_shape_and_join_phi() {
        let mut ast = AstBuilder::new();
        let x = ast.declare_local("x", 1);
        let c = ast.declare_local("c", 1);
        let then = ast.compound(vec![ast.expr_stmt(ast.assign(x, ast.number(2)))]);
        let body = ast.compound(vec![
            ast.var_stmt(ast.var(x, Some(ast.number(1)))),
            ast.if_stmt(ast.ident(c), then),
            ast.ret(Some(ast.ident(x))),
        ]);
        let main = ast.function("main", vec![ast.param(c)], body);
        let module = build(ast, vec![main]);
        let main = module.get_function("main").unwrap();

        let cond = BlockId::new(0);
        let then_block = BlockId::new(1);
        let exit = BlockId::new(2);
        assert_eq!(main.block(cond).unwrap().successors(), &[then_block, exit]);
        assert_eq!(main.block(then_block).unwrap().successors(), &[exit]);
        assert_eq!(main.block(exit).unwrap().predecessors(), &[cond, then_block]);

        let branch = main.block(cond).unwrap().terminator().unwrap();
        assert_eq!(branch.op(), SsaOp::Br);
        assert_eq!(branch.operands().len(), 1);
        let jump = main.block(then_block).unwrap().terminator().unwrap();
        assert_eq!(jump.op(), SsaOp::Br);
        assert!(jump.operands().is_empty());
        assert_eq!(branch.targets(), &[then_block, exit]);
        assert_eq!(jump.targets(), &[exit]);
        assert_eq!(jump.to_string(), "BR B2");

        let phis: Vec<&SsaInstruction> = main.block_phis(exit).collect();
        assert_eq!(phis.len(), 1);
        assert_eq!(phis[0].operands().len(), 2);
    }

    #[test]
    fn test_if_without_assignment_needs_no_phi() {
        let mut ast = AstBuilder::new();
        let x = ast.declare_local("x", 1);
        let then = ast.compound(vec![ast.expr_stmt(ast.ident(x))]);
        let body = ast.compound(vec![
            ast.var_stmt(ast.var(x, Some(ast.number(1)))),
            ast.if_stmt(ast.boolean(true), then),
            ast.ret(Some(ast.ident(x))),
        ]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);
        let main = module.get_function("main").unwrap();

        assert_eq!(main.phis().count(), 0);
        let ret = main.block(BlockId::new(2)).unwrap().terminator().unwrap();
        assert_eq!(ret.op(), SsaOp::Ret);
    }

    #[test]
    fn test_while_shape() {
        let mut ast = AstBuilder::new();
        let i = ast.declare_local("i", 1);
        let cond = ast.binary(Operation::LessThan, ast.ident(i), ast.number(10));
        let step = ast.assign(i, ast.binary(Operation::Plus, ast.ident(i), ast.number(1)));
        let body = ast.compound(vec![
            ast.var_stmt(ast.var(i, Some(ast.number(0)))),
            ast.while_stmt(cond, ast.compound(vec![ast.expr_stmt(step)])),
            ast.ret(Some(ast.ident(i))),
        ]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);
        let main = module.get_function("main").unwrap();

        let (entry, header, body, exit) =
            (BlockId::new(0), BlockId::new(1), BlockId::new(2), BlockId::new(3));
        assert_eq!(main.block(entry).unwrap().successors(), &[header]);
        assert_eq!(main.block(header).unwrap().successors(), &[body, exit]);
        assert_eq!(main.block(body).unwrap().successors(), &[header]);
        assert_eq!(main.block(header).unwrap().predecessors(), &[entry, body]);

        let phis: Vec<&SsaInstruction> = main.block_phis(header).collect();
        assert_eq!(phis.len(), 1);
        let phi = phis[0];
        assert_eq!(phi.operands().len(), 2);
        // First operand comes from the pre-header, second from the back edge.
        assert_eq!(phi.operands()[0].def(), Some(main.block(entry).unwrap().instructions()[0].id()));
        let exit_ret = main.block(exit).unwrap().instructions();
        assert_eq!(exit_ret[0].operands(), &[phi.result()]);
    }

    #[test]
    fn test_loop_invariant_variable_has_no_phi() {
        let mut ast = AstBuilder::new();
        let x = ast.declare_local("x", 1);
        let cond = ast.binary(Operation::LessThan, ast.ident(x), ast.number(10));
        let body = ast.compound(vec![
            ast.var_stmt(ast.var(x, Some(ast.number(0)))),
            ast.while_stmt(cond, ast.compound(vec![ast.expr_stmt(ast.ident(x))])),
            ast.ret(Some(ast.ident(x))),
        ]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);
        let main = module.get_function("main").unwrap();

        assert_eq!(main.phis().count(), 0);
        let init = main.cfg().entry_block().unwrap().instructions()[0].result();
        let header_read = &main.block(BlockId::new(1)).unwrap().instructions()[1];
        assert_eq!(header_read.operands(), &[init]);
    }

    #[test]
    fn test_statements_after_return_get_own_block() {
        let mut ast = AstBuilder::new();
        let body = ast.compound(vec![ast.ret(None), ast.expr_stmt(ast.number(1))]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);
        let main = module.get_function("main").unwrap();

        assert_eq!(main.cfg().len(), 2);
        assert!(main.block(BlockId::new(0)).unwrap().is_properly_terminated());
        assert!(main.block(BlockId::new(1)).unwrap().predecessors().is_empty());
    }

    #[test]
    fn test_global_initializer_and_read() {
        let mut ast = AstBuilder::new();
        let g = ast.declare_global("g");
        let global = Decl::Var(ast.var(g, Some(ast.number(5))));
        let body = ast.compound(vec![ast.ret(Some(ast.ident(g)))]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![global, main]);

        assert_eq!(module.globals().len(), 1);
        let init = module.globals().instructions()[0].result();
        let main = module.get_function("main").unwrap();
        let read = &main.cfg().entry_block().unwrap().instructions()[0];
        assert_eq!(read.operands(), &[init]);
    }

    #[test]
    fn test_global_write_visible_to_later_functions() {
        let mut ast = AstBuilder::new();
        let g = ast.declare_global("g");
        let global = Decl::Var(ast.var(g, Some(ast.number(5))));
        let set_body = ast.compound(vec![
            ast.expr_stmt(ast.assign(g, ast.number(7))),
            ast.ret(Some(ast.ident(g))),
        ]);
        let set = ast.function("set", vec![], set_body);
        let get_body = ast.compound(vec![ast.ret(Some(ast.ident(g)))]);
        let get = ast.function("get", vec![], get_body);
        let module = build(ast, vec![global, set, get]);

        let init = module.globals().instructions()[0].result();
        let set = module.get_function("set").unwrap();
        let set_insts = set.cfg().entry_block().unwrap().instructions();
        // MOV 7, MOV (assignment), MOV g, RET
        assert_eq!(set_insts[0].operands()[0].literal_value(), Some(7));
        let written = set_insts[1].result();
        assert_eq!(set_insts[2].operands(), &[written]);

        let get = module.get_function("get").unwrap();
        let read = &get.cfg().entry_block().unwrap().instructions()[0];
        assert_eq!(read.operands(), &[written]);
        assert_ne!(read.operands(), &[init]);
    }

    #[test]
    fn test_local_write_stays_in_function() {
        let mut ast = AstBuilder::new();
        let x = ast.declare_local("x", 1);
        let first_body = ast.compound(vec![
            ast.var_stmt(ast.var(x, Some(ast.number(3)))),
            ast.ret(None),
        ]);
        let first = ast.function("first", vec![], first_body);
        let second_body = ast.compound(vec![ast.ret(Some(ast.ident(x)))]);
        let second = ast.function("second", vec![], second_body);
        let module = build(ast, vec![first, second]);

        let second = module.get_function("second").unwrap();
        let read = &second.cfg().entry_block().unwrap().instructions()[0];
        assert!(read.operands()[0].is_unknown());
    }

    #[test]
    fn test_undefined_read_is_unknown() {
        let mut ast = AstBuilder::new();
        let x = ast.declare_local("x", 1);
        let body = ast.compound(vec![ast.ret(Some(ast.ident(x)))]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);
        let main = module.get_function("main").unwrap();
        let read = &main.cfg().entry_block().unwrap().instructions()[0];
        assert!(read.operands()[0].is_unknown());
    }

    #[test]
    fn test_call_reads_arguments() {
        let mut ast = AstBuilder::new();
        let f = ast.declare_function("f");
        let x = ast.declare_local("x", 1);
        let call = ast.call(f, vec![ast.ident(x), ast.number(3)]);
        let body = ast.compound(vec![
            ast.var_stmt(ast.var(x, Some(ast.number(7)))),
            ast.ret(Some(call)),
        ]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);
        let main = module.get_function("main").unwrap();

        let insts = main.cfg().entry_block().unwrap().instructions();
        // MOV 7, MOV 3, CALL, RET
        let call = &insts[2];
        assert_eq!(call.op(), SsaOp::Call);
        assert_eq!(call.callee(), Some("f"));
        assert_eq!(call.operands(), &[insts[0].result(), insts[1].result()]);
        assert_eq!(insts[3].operands(), &[call.result()]);
    }

    #[test]
    fn test_string_literal_allocates_slot() {
        let mut ast = AstBuilder::new();
        let body = ast.compound(vec![ast.expr_stmt(ast.string("hi")), ast.ret(None)]);
        let main = ast.function("main", vec![], body);
        let module = build(ast, vec![main]);
        assert_eq!(module.array_variable(0), Some(&b"hi"[..]));
    }

    #[test]
    fn test_unbound_identifier_is_error() {
        let (program, symbols) = {
            let mut ast = AstBuilder::new();
            let body = ast.compound(vec![ast.ret(Some(Expr::Ident(crate::ast::Ident {
                id: NodeId::new(999),
                name: "ghost".to_string(),
            })))]);
            let main = ast.function("main", vec![], body);
            ast.finish(vec![main])
        };
        let result = CfgBuilder::new(&symbols).run(&program);
        assert!(matches!(result, Err(crate::Error::SsaError { .. })));
    }

    #[test]
    fn test_run_resets_state() {
        let mut ast = AstBuilder::new();
        let body = ast.compound(vec![ast.ret(Some(ast.number(1)))]);
        let main = ast.function("main", vec![], body);
        let (program, symbols) = ast.finish(vec![main]);

        let mut builder = CfgBuilder::new(&symbols);
        let first = builder.run(&program).unwrap();
        let second = builder.run(&program).unwrap();
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_manual_read_memoized() {
        let mut symbols = SymbolTable::new();
        let x = symbols.add_symbol(Symbol::variable("x", 1));
        let mut builder = CfgBuilder::new(&symbols);
        let entry = builder.begin_function("f").unwrap();
        let left = builder.create_block().unwrap();
        let right = builder.create_block().unwrap();
        let join = builder.create_block().unwrap();
        for (from, to) in [(entry, left), (entry, right), (left, join), (right, join)] {
            builder.add_edge(from, to).unwrap();
        }
        for block in [left, right, join] {
            builder.seal_block(block).unwrap();
        }
        builder.write_variable(x, left, SsaValue::literal(100, 1));
        builder.write_variable(x, right, SsaValue::literal(101, 2));

        let first = builder.read_variable(x, join).unwrap();
        let second = builder.read_variable(x, join).unwrap();
        assert_eq!(first, second);
        let phi = builder.function().unwrap().definition(&first).unwrap();
        assert!(phi.is_phi());
        assert_eq!(
            phi.operands(),
            &[SsaValue::literal(100, 1), SsaValue::literal(101, 2)]
        );
        builder.end_function().unwrap();
    }

    #[test]
    fn test_end_function_rejects_unsealed_block() {
        let mut symbols = SymbolTable::new();
        let x = symbols.add_symbol(Symbol::variable("x", 1));
        let mut builder = CfgBuilder::new(&symbols);
        let entry = builder.begin_function("f").unwrap();
        let header = builder.create_block().unwrap();
        builder.add_edge(entry, header).unwrap();
        builder.read_variable(x, header).unwrap();
        assert!(builder.end_function().is_err());
    }

    #[test]
    fn test_keep_trivial_phis_option() {
        let mut ast = AstBuilder::new();
        let x = ast.declare_local("x", 1);
        let cond = ast.binary(Operation::LessThan, ast.ident(x), ast.number(10));
        let body = ast.compound(vec![
            ast.var_stmt(ast.var(x, Some(ast.number(0)))),
            ast.while_stmt(cond, CompoundStmt::default()),
        ]);
        let main = ast.function("main", vec![], body);
        let (program, symbols) = ast.finish(vec![main]);

        let options = BuilderOptions::new().with_remove_trivial_phis(false);
        let module = CfgBuilder::with_options(&symbols, options)
            .run(&program)
            .unwrap();
        assert_eq!(module.get_function("main").unwrap().phis().count(), 1);
    }
}
