//! Abstract syntax tree consumed by the SSA builder.
//!
//! The front end (lexer, parser, scope and type checkers) lives outside this crate. What it hands
//! over is modelled here as a plain sum-type tree: a [`Program`] made of top-level [`Decl`]s,
//! function bodies made of [`Stmt`]s and [`Expr`]s. Every node that names a symbol carries a
//! [`NodeId`], which is the key the [`SymbolTable`] uses to resolve it.
//!
//! The tree is never mutated by the compiler passes in this crate.
//!
//! # Building Trees
//!
//! [`AstBuilder`] allocates node ids and binds them to symbols as nodes are created, which stands
//! in for the symbol collection pass of the front end:
//!
//! ```rust
//! use toslang::ast::{AstBuilder, Operation};
//!
//! let mut ast = AstBuilder::new();
//! let x = ast.declare_local("x", 1);
//! let init = ast.binary(Operation::Plus, ast.number(1), ast.number(2));
//! let decl = ast.var(x, Some(init));
//! let body = ast.compound(vec![ast.var_stmt(decl), ast.ret(Some(ast.ident(x)))]);
//! let main = ast.function("main", vec![], body);
//! let (program, symbols) = ast.finish(vec![main]);
//!
//! assert_eq!(program.decls.len(), 1);
//! assert_eq!(symbols.len(), 2);
//! ```

mod symbol;

use std::cell::{Cell, RefCell};

pub use symbol::{Symbol, SymbolId, SymbolKind, SymbolTable};

/// Identity of an AST node that refers to a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a node id from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Abstract operator tokens produced by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `=`
    Assignment,
    /// `&&`
    AndBool,
    /// `&`
    AndInt,
    /// `/`
    Divide,
    /// `==`
    Equal,
    /// `>`
    GreaterThan,
    /// `<<`
    LeftShift,
    /// `<`
    LessThan,
    /// `-`
    Minus,
    /// `%`
    Modulo,
    /// `*`
    Mult,
    /// `!`
    Not,
    /// `||`
    OrBool,
    /// `|`
    OrInt,
    /// `+`
    Plus,
    /// `>>`
    RightShift,
    /// `^`
    Xor,
    /// Unary `-`
    Negate,
}

/// Root of a translation unit.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Top-level declarations in source order.
    pub decls: Vec<Decl>,
}

/// A top-level declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    /// A function definition.
    Function(FunctionDecl),
    /// A global variable.
    Var(VarDecl),
}

/// A function definition.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// Node bound to the function symbol.
    pub id: NodeId,
    /// Function name, used as the module key.
    pub name: String,
    /// Formal parameters, in declaration order.
    pub params: Vec<VarDecl>,
    /// Function body.
    pub body: CompoundStmt,
}

/// A variable declaration, possibly with an initializer.
#[derive(Debug, Clone)]
pub struct VarDecl {
    /// Node bound to the variable symbol.
    pub id: NodeId,
    /// Declared name.
    pub name: String,
    /// Optional initializer.
    pub init: Option<Expr>,
    /// Whether the declaration is a formal parameter of a function.
    pub is_parameter: bool,
}

/// A braced list of statements.
#[derive(Debug, Clone, Default)]
pub struct CompoundStmt {
    /// Statements in source order.
    pub stmts: Vec<Stmt>,
}

/// `if (cond) { body }`
#[derive(Debug, Clone)]
pub struct IfStmt {
    /// Condition expression.
    pub cond: Expr,
    /// Statements executed when the condition holds.
    pub body: CompoundStmt,
}

/// `while (cond) { body }`
#[derive(Debug, Clone)]
pub struct WhileStmt {
    /// Loop condition, evaluated before each iteration.
    pub cond: Expr,
    /// Loop body.
    pub body: CompoundStmt,
}

/// A statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Nested block.
    Compound(CompoundStmt),
    /// Local variable declaration.
    VarDecl(VarDecl),
    /// Conditional.
    If(IfStmt),
    /// Loop.
    While(WhileStmt),
    /// Return with an optional value.
    Return(Option<Expr>),
    /// Output of a value.
    Print(Expr),
    /// Input into a variable.
    Scan(Expr),
    /// Expression evaluated for its side effects.
    Expr(Expr),
}

/// An identifier occurrence.
#[derive(Debug, Clone)]
pub struct Ident {
    /// Node bound to the referenced symbol.
    pub id: NodeId,
    /// Spelling in the source.
    pub name: String,
}

/// A binary operation.
#[derive(Debug, Clone)]
pub struct BinaryExpr {
    /// Operator.
    pub op: Operation,
    /// Left operand.
    pub lhs: Box<Expr>,
    /// Right operand.
    pub rhs: Box<Expr>,
}

/// A unary operation (`!` or unary `-`).
#[derive(Debug, Clone)]
pub struct UnaryExpr {
    /// Operator.
    pub op: Operation,
    /// Operand.
    pub operand: Box<Expr>,
}

/// A call to a named function.
#[derive(Debug, Clone)]
pub struct CallExpr {
    /// Node bound to the callee symbol.
    pub id: NodeId,
    /// Callee name.
    pub callee: String,
    /// Arguments in call order.
    pub args: Vec<Expr>,
}

/// An expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// `true` / `false`
    Bool(bool),
    /// Integer literal.
    Number(i64),
    /// String literal.
    Str(String),
    /// Variable reference.
    Ident(Ident),
    /// Binary operation, including assignment.
    Binary(BinaryExpr),
    /// Unary operation.
    Unary(UnaryExpr),
    /// Function call.
    Call(CallExpr),
}

/// Constructs AST nodes and records their symbol bindings.
///
/// Node ids are handed out from an interior counter so constructors can take `&self` and be
/// nested freely inside one another.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_node: Cell<usize>,
    symbols: SymbolTable,
    bindings: RefCell<Vec<(NodeId, SymbolId)>>,
}

impl AstBuilder {
    /// Creates a builder with an empty symbol table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_node(&self) -> NodeId {
        let id = self.next_node.get();
        self.next_node.set(id + 1);
        NodeId::new(id)
    }

    fn bound_node(&self, symbol: SymbolId) -> NodeId {
        let node = self.fresh_node();
        self.bindings.borrow_mut().push((node, symbol));
        node
    }

    /// Declares a variable in the global scope.
    pub fn declare_global(&mut self, name: &str) -> SymbolId {
        self.symbols.add_symbol(Symbol::variable(name, 0))
    }

    /// Declares a variable in the given (non-global) scope.
    pub fn declare_local(&mut self, name: &str, scope: usize) -> SymbolId {
        self.symbols.add_symbol(Symbol::variable(name, scope))
    }

    /// Declares a function symbol.
    pub fn declare_function(&mut self, name: &str) -> SymbolId {
        self.symbols.add_symbol(Symbol::function(name))
    }

    /// Integer literal.
    #[must_use]
    pub fn number(&self, value: i64) -> Expr {
        Expr::Number(value)
    }

    /// Boolean literal.
    #[must_use]
    pub fn boolean(&self, value: bool) -> Expr {
        Expr::Bool(value)
    }

    /// String literal.
    #[must_use]
    pub fn string(&self, value: &str) -> Expr {
        Expr::Str(value.to_string())
    }

    /// Reference to a declared variable.
    #[must_use]
    pub fn ident(&self, symbol: SymbolId) -> Expr {
        let name = self.symbol_name(symbol);
        Expr::Ident(Ident {
            id: self.bound_node(symbol),
            name,
        })
    }

    /// Binary operation.
    #[must_use]
    pub fn binary(&self, op: Operation, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(BinaryExpr {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// Assignment of `value` to the variable `target`.
    #[must_use]
    pub fn assign(&self, target: SymbolId, value: Expr) -> Expr {
        self.binary(Operation::Assignment, self.ident(target), value)
    }

    /// Unary operation.
    #[must_use]
    pub fn unary(&self, op: Operation, operand: Expr) -> Expr {
        Expr::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
        })
    }

    /// Call of a declared function.
    #[must_use]
    pub fn call(&self, callee: SymbolId, args: Vec<Expr>) -> Expr {
        Expr::Call(CallExpr {
            id: self.bound_node(callee),
            callee: self.symbol_name(callee),
            args,
        })
    }

    /// Variable declaration.
    #[must_use]
    pub fn var(&self, symbol: SymbolId, init: Option<Expr>) -> VarDecl {
        VarDecl {
            id: self.bound_node(symbol),
            name: self.symbol_name(symbol),
            init,
            is_parameter: false,
        }
    }

    /// Formal parameter declaration.
    #[must_use]
    pub fn param(&self, symbol: SymbolId) -> VarDecl {
        VarDecl {
            is_parameter: true,
            ..self.var(symbol, None)
        }
    }

    /// Wraps a declaration as a statement.
    #[must_use]
    pub fn var_stmt(&self, decl: VarDecl) -> Stmt {
        Stmt::VarDecl(decl)
    }

    /// Expression statement.
    #[must_use]
    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        Stmt::Expr(expr)
    }

    /// Return statement.
    #[must_use]
    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        Stmt::Return(value)
    }

    /// `if` statement.
    #[must_use]
    pub fn if_stmt(&self, cond: Expr, body: CompoundStmt) -> Stmt {
        Stmt::If(IfStmt { cond, body })
    }

    /// `while` statement.
    #[must_use]
    pub fn while_stmt(&self, cond: Expr, body: CompoundStmt) -> Stmt {
        Stmt::While(WhileStmt { cond, body })
    }

    /// Statement list.
    #[must_use]
    pub fn compound(&self, stmts: Vec<Stmt>) -> CompoundStmt {
        CompoundStmt { stmts }
    }

    /// Function declaration. Declares the function symbol if it is not known yet.
    pub fn function(&mut self, name: &str, params: Vec<VarDecl>, body: CompoundStmt) -> Decl {
        let symbol = match self.symbols.find_function(name) {
            Some(symbol) => symbol,
            None => self.declare_function(name),
        };

        Decl::Function(FunctionDecl {
            id: self.bound_node(symbol),
            name: name.to_string(),
            params,
            body,
        })
    }

    /// Finishes construction, returning the program and its populated symbol table.
    #[must_use]
    pub fn finish(mut self, decls: Vec<Decl>) -> (Program, SymbolTable) {
        for (node, symbol) in self.bindings.take() {
            self.symbols.bind(node, symbol);
        }
        (Program { decls }, self.symbols)
    }

    fn symbol_name(&self, symbol: SymbolId) -> String {
        self.symbols
            .get(symbol)
            .map(|s| s.name().to_string())
            .unwrap_or_default()
    }
}
