use crate::stmt::{ScopeId, StmtId, TableRefId};

/// A lexical scope created while binding one SELECT.
///
/// Owns the ordered list of FROM sources visible to the statement and
/// chains to the scope of the enclosing SELECT, if any. Aliases are
/// unique within a single scope; resolution walks the parent chain for
/// qualified references, which is what makes a reference correlated.
#[derive(Debug, Clone)]
pub struct BindContext {
    /// The statement this scope binds.
    pub stmt: StmtId,
    /// In-scope FROM sources, in declaration order.
    pub tables: Vec<TableRefId>,
    /// Scope of the enclosing SELECT; `None` for the root.
    pub parent: Option<ScopeId>,
}

impl BindContext {
    pub fn new(stmt: StmtId, parent: Option<ScopeId>) -> Self {
        BindContext {
            stmt,
            tables: Vec::new(),
            parent,
        }
    }
}
