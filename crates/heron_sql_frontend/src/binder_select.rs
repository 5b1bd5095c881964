use heron_common::error::{SqlError, SqlResult};

use crate::binder::Binder;
use crate::expr::{Expr, ExprKind};
use crate::stmt::{ScopeId, StmtId, TableRefId};
use crate::table_ref::{TableRef, TableSource};

impl<'a> Binder<'a> {
    /// Bind one SELECT under an optional enclosing scope and return
    /// the scope created for it. Binding is idempotent: an already
    /// bound statement (a CTE body shared by several FROM slots, a
    /// set-query member) returns its existing scope untouched.
    ///
    /// The clause order is fixed and observable: alias rewrite, FROM
    /// (CTEs first), selection with `*` expansion, then WHERE, GROUP
    /// BY, HAVING, ORDER BY.
    pub fn bind_select(&mut self, id: StmtId, parent: Option<ScopeId>) -> SqlResult<ScopeId> {
        if self.batch.stmt(id).bounded {
            return self
                .batch
                .stmt(id)
                .bind_context
                .ok_or_else(|| SqlError::semantic("bound statement lost its context"));
        }
        tracing::debug!(stmt = %id, "binding select");
        let scope = self.new_scope(id, parent)?;

        // 1. Replace selection aliases in GROUP BY / ORDER BY with the
        // expressions they name, so `ORDER BY alias1 + b` works when
        // the selection computes `a1 * 5 AS alias1`.
        let aliased: Vec<(String, Expr)> = self
            .batch
            .stmt(id)
            .selection
            .iter()
            .filter(|s| !matches!(s.kind, ExprKind::Star { .. }))
            .filter_map(|s| s.alias.clone().map(|a| (a, s.clone())))
            .collect();
        if !aliased.is_empty() {
            let mut group_by = std::mem::take(&mut self.batch.stmt_mut(id).group_by);
            for g in &mut group_by {
                for (name, repl) in &aliased {
                    *g = g.search_replace(name, repl);
                }
            }
            self.batch.stmt_mut(id).group_by = group_by;

            let mut order_by = std::mem::take(&mut self.batch.stmt_mut(id).order_by);
            for o in &mut order_by {
                for (name, repl) in &aliased {
                    o.expr = o.expr.search_replace(name, repl);
                }
            }
            self.batch.stmt_mut(id).order_by = order_by;
        }

        // 2. FROM. CTEs are materialized and bound first, against this
        // scope, so later CTEs and the main body can reference earlier
        // ones.
        let cte_defs = self.batch.stmt(id).ctes.clone();
        for cte in cte_defs {
            let r = self
                .batch
                .add_table_ref(TableRef::cte(cte.name.clone(), cte.stmt, cte.col_names.clone()));
            self.batch.stmt_mut(id).cte_from.push(r);
            self.bind_select(cte.stmt, Some(scope))?;
            self.batch.stmt_mut(cte.stmt).parent = Some(id);
            tracing::debug!(name = %cte.name, stmt = %cte.stmt, "materialized cte");
        }

        let from_items = self.batch.stmt(id).from.clone();
        let mut resolved = Vec::with_capacity(from_items.len());
        for t in from_items {
            resolved.push(self.bind_from_item(t, scope, id)?);
        }
        self.batch.stmt_mut(id).from = resolved;

        // 3. Selection. Bind the non-star items, then splice each `*`
        // expansion in place, preserving order.
        let mut selection = std::mem::take(&mut self.batch.stmt_mut(id).selection);
        let mut has_agg = false;
        for item in &mut selection {
            if matches!(item.kind, ExprKind::Star { .. }) {
                continue;
            }
            self.bind_expr(item, scope)?;
            if item.has_agg_func() {
                has_agg = true;
            }
        }
        let mut expanded = Vec::with_capacity(selection.len());
        for item in selection {
            match &item.kind {
                ExprKind::Star { qualifier } => {
                    expanded.extend(self.expand_star(scope, qualifier.as_deref())?);
                }
                _ => expanded.push(item),
            }
        }
        self.batch.stmt_mut(id).selection = expanded;
        self.batch.stmt_mut(id).has_agg = has_agg;

        // 4. Remaining clauses, in evaluation order.
        if let Some(mut w) = self.batch.stmt_mut(id).where_clause.take() {
            self.bind_expr(&mut w, scope)?;
            self.batch.stmt_mut(id).where_clause = Some(w);
        }
        let mut group_by = std::mem::take(&mut self.batch.stmt_mut(id).group_by);
        for g in &mut group_by {
            self.bind_expr(g, scope)?;
        }
        self.batch.stmt_mut(id).group_by = group_by;
        if let Some(mut h) = self.batch.stmt_mut(id).having.take() {
            self.bind_expr(&mut h, scope)?;
            self.batch.stmt_mut(id).having = Some(h);
        }
        let mut order_by = std::mem::take(&mut self.batch.stmt_mut(id).order_by);
        for o in &mut order_by {
            self.bind_expr(&mut o.expr, scope)?;
        }
        self.batch.stmt_mut(id).order_by = order_by;
        if let Some(mut l) = self.batch.stmt_mut(id).limit.take() {
            self.bind_expr(&mut l, scope)?;
            self.batch.stmt_mut(id).limit = Some(l);
        }

        // Trailing compound members bind as siblings of the main body.
        let members = self.batch.stmt(id).set_queries.clone();
        for (_, m) in members {
            self.bind_select(m, parent)?;
            self.batch.stmt_mut(m).parent = Some(id);
        }

        // 5. Done.
        let stmt = self.batch.stmt_mut(id);
        stmt.bounded = true;
        stmt.bind_context = Some(scope);
        Ok(scope)
    }

    /// Bind one FROM item into the scope, returning the ref that ends
    /// up in the FROM list (a base name naming no catalog relation is
    /// replaced by the CTE it resolves to).
    fn bind_from_item(
        &mut self,
        t: TableRefId,
        scope: ScopeId,
        owner: StmtId,
    ) -> SqlResult<TableRefId> {
        let source = self.batch.table_ref(t).source.clone();
        match source {
            TableSource::Base { table } => {
                if self.catalog.try_table(&table).is_some() {
                    self.add_table_to_scope(scope, t)?;
                    return Ok(t);
                }
                let alias = self.batch.table_ref(t).alias.clone();
                let Some(cte) = self.lookup_cte(scope, &alias) else {
                    return Err(SqlError::UnknownTable(table));
                };
                tracing::debug!(name = %alias, "from item resolved to cte");
                self.add_table_to_scope(scope, cte)?;
                Ok(cte)
            }
            TableSource::External { .. } => {
                self.add_table_to_scope(scope, t)?;
                Ok(t)
            }
            TableSource::FromQuery { stmt: inner, .. } => {
                self.bind_select(inner, Some(scope))?;
                self.batch.stmt_mut(inner).parent = Some(owner);
                self.add_table_to_scope(scope, t)?;
                Ok(t)
            }
            TableSource::CteQuery { .. } => {
                self.add_table_to_scope(scope, t)?;
                Ok(t)
            }
            TableSource::Join {
                tables,
                ops,
                constraints,
            } => {
                if ops.len() + 1 != tables.len() || constraints.len() != ops.len() {
                    return Err(SqlError::Parse(format!(
                        "join list arity mismatch: {} tables, {} operators, {} constraints",
                        tables.len(),
                        ops.len(),
                        constraints.len()
                    )));
                }
                let mut children = Vec::with_capacity(tables.len());
                for child in tables {
                    if matches!(
                        self.batch.table_ref(child).source,
                        TableSource::Join { .. }
                    ) {
                        return Err(SqlError::Parse("join list nested in join list".into()));
                    }
                    children.push(self.bind_from_item(child, scope, owner)?);
                }
                let mut bound = constraints;
                for c in &mut bound {
                    self.bind_expr(c, scope)?;
                }
                if let TableSource::Join {
                    tables, constraints, ..
                } = &mut self.batch.table_ref_mut(t).source
                {
                    *tables = children;
                    *constraints = bound;
                }
                Ok(t)
            }
        }
    }

    /// Expand `*` or `t.*` against the tables of the current scope.
    fn expand_star(&mut self, scope: ScopeId, qualifier: Option<&str>) -> SqlResult<Vec<Expr>> {
        match qualifier {
            Some(q) => {
                let t = self
                    .batch
                    .scope(scope)
                    .tables
                    .iter()
                    .copied()
                    .find(|t| self.batch.table_ref(*t).alias.eq_ignore_ascii_case(q))
                    .ok_or_else(|| SqlError::UnknownTable(q.to_string()))?;
                self.batch.all_column_refs(self.catalog, t)
            }
            None => {
                let tables = self.batch.scope(scope).tables.clone();
                let mut out = Vec::new();
                for t in tables {
                    out.extend(self.batch.all_column_refs(self.catalog, t)?);
                }
                Ok(out)
            }
        }
    }
}
