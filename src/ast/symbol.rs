//! Symbol table shared by the front end and the SSA builder.
//!
//! Symbols are stored in an arena and addressed by [`SymbolId`]. AST nodes are bound to symbols
//! by their [`NodeId`]; the SSA builder keys its variable definitions on the symbol id, so two
//! occurrences of the same variable always resolve to the same key.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::ast::NodeId;

/// Index of a symbol within its [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(usize);

impl SymbolId {
    /// Creates a symbol id from a raw index.
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

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym{}", self.0)
    }
}

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// A variable or parameter.
    Variable,
    /// A function.
    Function,
}

/// A named entity declared in some scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    scope_id: usize,
    kind: SymbolKind,
}

impl Symbol {
    /// Creates a variable symbol declared in `scope_id`. Scope 0 is the global scope.
    #[must_use]
    pub fn variable(name: &str, scope_id: usize) -> Self {
        Self {
            name: name.to_string(),
            scope_id,
            kind: SymbolKind::Variable,
        }
    }

    /// Creates a function symbol. Functions always live in the global scope.
    #[must_use]
    pub fn function(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scope_id: 0,
            kind: SymbolKind::Function,
        }
    }

    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the id of the scope the symbol was declared in.
    #[must_use]
    pub const fn scope_id(&self) -> usize {
        self.scope_id
    }

    /// Returns the symbol kind.
    #[must_use]
    pub const fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Returns `true` for symbols declared at program level.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.scope_id == 0
    }
}

/// Arena of symbols plus the node-to-symbol bindings produced by scope checking.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    bindings: FxHashMap<NodeId, SymbolId>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a symbol and returns its id.
    pub fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId::new(self.symbols.len());
        self.symbols.push(symbol);
        id
    }

    /// Binds an AST node to a symbol, replacing any earlier binding of that node.
    pub fn bind(&mut self, node: NodeId, symbol: SymbolId) {
        self.bindings.insert(node, symbol);
    }

    /// Looks up a symbol by id.
    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Resolves the symbol an AST node refers to.
    ///
    /// Returns `None` when the node was never bound, which only happens for ASTs that did
    /// not go through scope checking.
    #[must_use]
    pub fn try_get_symbol(&self, node: NodeId) -> Option<(SymbolId, &Symbol)> {
        let id = *self.bindings.get(&node)?;
        self.get(id).map(|symbol| (id, symbol))
    }

    /// Finds a function symbol by name.
    #[must_use]
    pub fn find_function(&self, name: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|s| s.kind == SymbolKind::Function && s.name == name)
            .map(SymbolId::new)
    }

    /// Returns the number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if no symbol was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
