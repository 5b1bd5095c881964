use std::collections::HashMap;
use std::fmt;

use heron_common::catalog::ColumnDef;

use crate::bind_context::BindContext;
use crate::expr::Expr;
use crate::table_ref::TableRef;

/// Index of a SELECT statement in a [`Batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub usize);

/// Index of a FROM source in a [`Batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRefId(pub usize);

/// Index of a bind scope in a [`Batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for TableRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named SELECT in a WITH clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub name: String,
    pub col_names: Option<Vec<String>>,
    pub stmt: StmtId,
}

/// One ORDER BY key: expression plus direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub expr: Expr,
    pub desc: bool,
}

impl OrderTerm {
    pub fn asc(expr: Expr) -> Self {
        OrderTerm { expr, desc: false }
    }

    pub fn desc(expr: Expr) -> Self {
        OrderTerm { expr, desc: true }
    }
}

/// Set operator joining trailing compound members to the main body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// A SELECT statement. The parser fills the syntactic fields; binding
/// and planning fill the rest in place. A statement is bound once and
/// planned once; it is never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct SelectStmt {
    pub selection: Vec<Expr>,
    pub from: Vec<TableRefId>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<Expr>,
    pub ctes: Vec<CteDef>,
    /// Trailing compound members (UNION / INTERSECT / EXCEPT).
    pub set_queries: Vec<(SetOp, StmtId)>,

    // ── Populated by binding / planning ─────────────────────────────
    pub has_agg: bool,
    pub bounded: bool,
    pub bind_context: Option<ScopeId>,
    /// Enclosing SELECT, for subqueries and CTE bodies.
    pub parent: Option<StmtId>,
    /// Embedded SELECTs discovered while planning this statement.
    pub subqueries: Vec<StmtId>,
    /// CTE refs materialized from the WITH clause, in declaration order.
    pub cte_from: Vec<TableRefId>,
    /// Inner SELECT → the FROM-subquery ref wrapping its plan.
    pub from_queries: HashMap<StmtId, TableRefId>,
}

impl SelectStmt {
    /// Selection items that compute aggregates, de-duplicated by
    /// structure, first occurrence first. Any selection item with an
    /// aggregate anywhere below it is emitted whole.
    pub fn aggregate_outputs(&self) -> Vec<Expr> {
        let mut out: Vec<Expr> = Vec::new();
        for x in &self.selection {
            if x.has_agg_func() && !out.iter().any(|e| e.kind == x.kind) {
                out.push(x.clone());
            }
        }
        out
    }
}

/// Per-batch arena owning every statement, FROM source and bind scope.
/// Ids index into it; nothing holds owning back-pointers.
#[derive(Debug, Default)]
pub struct Batch {
    stmts: Vec<SelectStmt>,
    table_refs: Vec<TableRef>,
    scopes: Vec<BindContext>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stmt(&mut self, stmt: SelectStmt) -> StmtId {
        let id = StmtId(self.stmts.len());
        self.stmts.push(stmt);
        id
    }

    pub fn add_table_ref(&mut self, table_ref: TableRef) -> TableRefId {
        let id = TableRefId(self.table_refs.len());
        self.table_refs.push(table_ref);
        id
    }

    pub(crate) fn add_scope(&mut self, scope: BindContext) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(scope);
        id
    }

    pub fn stmt(&self, id: StmtId) -> &SelectStmt {
        &self.stmts[id.0]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut SelectStmt {
        &mut self.stmts[id.0]
    }

    pub fn table_ref(&self, id: TableRefId) -> &TableRef {
        &self.table_refs[id.0]
    }

    pub fn table_ref_mut(&mut self, id: TableRefId) -> &mut TableRef {
        &mut self.table_refs[id.0]
    }

    pub fn scope(&self, id: ScopeId) -> &BindContext {
        &self.scopes[id.0]
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut BindContext {
        &mut self.scopes[id.0]
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    /// Depth of a scope: 1 for a root scope, parent depth + 1 below.
    pub fn scope_depth(&self, id: ScopeId) -> usize {
        let mut depth = 1;
        let mut cur = self.scope(id).parent;
        while let Some(p) = cur {
            depth += 1;
            cur = self.scope(p).parent;
        }
        depth
    }
}

/// A parsed statement handed to the binder. Only SELECT (and the
/// embedded SELECT of INSERT) reaches the planner; the other wrappers
/// carry a base relation plus descriptive fields for their handlers.
#[derive(Debug, Clone)]
pub enum Statement {
    Select(StmtId),
    Insert(InsertStmt),
    Copy(CopyStmt),
    CreateTable(CreateTableStmt),
    CreateIndex(CreateIndexStmt),
    Analyze(AnalyzeStmt),
}

#[derive(Debug, Clone)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
    /// INSERT ... SELECT source; bound and planned under a fresh
    /// context.
    pub source: Option<StmtId>,
}

#[derive(Debug, Clone)]
pub struct CopyStmt {
    pub table: String,
    pub path: String,
    /// true = COPY TO, false = COPY FROM.
    pub to: bool,
}

#[derive(Debug, Clone)]
pub struct CreateTableStmt {
    pub table: String,
    /// (column name, DDL type name text) as parsed.
    pub columns: Vec<(String, String)>,
    /// Filled by binding: columns with resolved types.
    pub resolved_columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone)]
pub struct CreateIndexStmt {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AnalyzeStmt {
    pub table: String,
}
