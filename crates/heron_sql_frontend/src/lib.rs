pub mod bind_context;
pub mod binder;
mod binder_expr;
mod binder_select;
pub mod expr;
pub mod stmt;
pub mod table_ref;

pub use bind_context::BindContext;
pub use binder::Binder;
pub use expr::{
    AggFunc, BinaryOp, CaseExpr, ColumnRef, Expr, ExprKind, LogicalOp, SubqueryKind, UnaryOp,
};
pub use stmt::{
    AnalyzeStmt, Batch, CopyStmt, CreateIndexStmt, CreateTableStmt, CteDef, InsertStmt, OrderTerm,
    ScopeId, SelectStmt, SetOp, Statement, StmtId, TableRefId,
};
pub use table_ref::{JoinOp, TableRef, TableSource};
