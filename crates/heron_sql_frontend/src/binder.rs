use heron_common::catalog::{Catalog, ColumnDef};
use heron_common::config::PlannerConfig;
use heron_common::error::{SqlError, SqlResult};
use heron_common::types::parse_type_name;

use crate::bind_context::BindContext;
use crate::stmt::{Batch, ScopeId, Statement, StmtId, TableRefId};

/// Resolves names in a statement batch against the catalog, attaching
/// scopes and table refs in place. One binder serves one batch.
pub struct Binder<'a> {
    pub(crate) catalog: &'a dyn Catalog,
    pub(crate) batch: &'a mut Batch,
    pub(crate) config: PlannerConfig,
}

impl<'a> Binder<'a> {
    pub fn new(catalog: &'a dyn Catalog, batch: &'a mut Batch) -> Self {
        Binder {
            catalog,
            batch,
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(catalog: &'a dyn Catalog, batch: &'a mut Batch, config: PlannerConfig) -> Self {
        Binder {
            catalog,
            batch,
            config,
        }
    }

    /// Bind one parsed statement. SELECT statements (and the SELECT
    /// source of INSERT) get a full scope tree; the other wrappers are
    /// checked against the catalog without altering the binder state.
    pub fn bind_statement(&mut self, stmt: &mut Statement) -> SqlResult<()> {
        match stmt {
            Statement::Select(id) => {
                self.bind_select(*id, None)?;
            }
            Statement::Insert(ins) => {
                let table = self.catalog.table(&ins.table)?;
                for c in &ins.columns {
                    if table.find_column(c).is_none() {
                        return Err(SqlError::UnknownColumn(format!("{}.{c}", ins.table)));
                    }
                }
                if let Some(source) = ins.source {
                    self.bind_select(source, None)?;
                }
            }
            Statement::Copy(copy) => {
                self.catalog.table(&copy.table)?;
            }
            Statement::CreateTable(ct) => {
                let mut resolved = Vec::with_capacity(ct.columns.len());
                for (name, type_name) in &ct.columns {
                    // column names share the catalog's case-insensitive
                    // identifier rule
                    let dup = ct
                        .columns
                        .iter()
                        .filter(|(n, _)| n.eq_ignore_ascii_case(name))
                        .count()
                        > 1;
                    if dup {
                        return Err(SqlError::semantic(format!(
                            "duplicate column name {name} in table {}",
                            ct.table
                        )));
                    }
                    resolved.push(ColumnDef {
                        name: name.clone(),
                        data_type: parse_type_name(type_name)?,
                    });
                }
                ct.resolved_columns = resolved;
            }
            Statement::CreateIndex(ci) => {
                let table = self.catalog.table(&ci.table)?;
                for c in &ci.columns {
                    if table.find_column(c).is_none() {
                        return Err(SqlError::UnknownColumn(format!("{}.{c}", ci.table)));
                    }
                }
            }
            Statement::Analyze(an) => {
                self.catalog.table(&an.table)?;
            }
        }
        Ok(())
    }

    // ── Scope bookkeeping ───────────────────────────────────────────

    pub(crate) fn new_scope(
        &mut self,
        stmt: StmtId,
        parent: Option<ScopeId>,
    ) -> SqlResult<ScopeId> {
        if let Some(p) = parent {
            if self.batch.scope_depth(p) >= self.config.max_query_depth {
                return Err(SqlError::semantic(format!(
                    "query nesting exceeds {} levels",
                    self.config.max_query_depth
                )));
            }
        }
        Ok(self.batch.add_scope(BindContext::new(stmt, parent)))
    }

    /// Add a FROM source to a scope, enforcing alias uniqueness within
    /// that scope. Join lists carry no alias and are exempt.
    pub(crate) fn add_table_to_scope(
        &mut self,
        scope: ScopeId,
        table_ref: TableRefId,
    ) -> SqlResult<()> {
        let alias = self.batch.table_ref(table_ref).alias.clone();
        if !alias.is_empty() {
            let clash = self.batch.scope(scope).tables.iter().any(|t| {
                self.batch
                    .table_ref(*t)
                    .alias
                    .eq_ignore_ascii_case(&alias)
            });
            if clash {
                return Err(SqlError::DuplicateAlias(alias));
            }
        }
        self.batch.scope_mut(scope).tables.push(table_ref);
        Ok(())
    }

    /// Look a table up by alias, first in the given scope and then up
    /// the parent chain. The flag is true when the match came from an
    /// ancestor, which makes references through it correlated.
    pub(crate) fn find_table(&self, scope: ScopeId, alias: &str) -> Option<(TableRefId, bool)> {
        let mut cur = Some(scope);
        let mut via_ancestor = false;
        while let Some(s) = cur {
            for t in &self.batch.scope(s).tables {
                let t_alias = &self.batch.table_ref(*t).alias;
                if !t_alias.is_empty() && t_alias.eq_ignore_ascii_case(alias) {
                    return Some((*t, via_ancestor));
                }
            }
            cur = self.batch.scope(s).parent;
            via_ancestor = true;
        }
        None
    }

    /// Resolve a name to a CTE ref by walking the parent chain through
    /// each statement's materialized WITH list.
    pub(crate) fn lookup_cte(&self, scope: ScopeId, name: &str) -> Option<TableRefId> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            let stmt = self.batch.scope(s).stmt;
            for r in &self.batch.stmt(stmt).cte_from {
                if self.batch.table_ref(*r).alias.eq_ignore_ascii_case(name) {
                    return Some(*r);
                }
            }
            cur = self.batch.scope(s).parent;
        }
        None
    }
}
