use heron_common::error::{SqlError, SqlResult};

use crate::binder::Binder;
use crate::expr::{ColumnRef, Expr, ExprKind};
use crate::stmt::{ScopeId, TableRefId};

impl<'a> Binder<'a> {
    /// Resolve every name in an expression against the scope.
    /// Embedded SELECTs are bound recursively with this scope as
    /// parent, which is what lets their columns resolve upward.
    pub(crate) fn bind_expr(&mut self, expr: &mut Expr, scope: ScopeId) -> SqlResult<()> {
        if expr.bounded {
            return Ok(());
        }
        match &mut expr.kind {
            ExprKind::Literal(_) | ExprKind::ExprRef { .. } => {}
            ExprKind::Column(col) => self.bind_column(col, scope)?,
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                self.bind_expr(operand, scope)?;
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.bind_expr(left, scope)?;
                self.bind_expr(right, scope)?;
            }
            ExprKind::Case(case) => {
                if let Some(op) = &mut case.operand {
                    self.bind_expr(op, scope)?;
                }
                for (when, then) in &mut case.branches {
                    self.bind_expr(when, scope)?;
                    self.bind_expr(then, scope)?;
                }
                if let Some(e) = &mut case.else_expr {
                    self.bind_expr(e, scope)?;
                }
            }
            ExprKind::Func { args, .. } | ExprKind::Agg { args, .. } => {
                for a in args {
                    self.bind_expr(a, scope)?;
                }
            }
            ExprKind::Subquery { operand, stmt, .. } => {
                if let Some(op) = operand {
                    self.bind_expr(op, scope)?;
                }
                let inner = *stmt;
                self.bind_select(inner, Some(scope))?;
                let owner = self.batch.scope(scope).stmt;
                self.batch.stmt_mut(inner).parent = Some(owner);
            }
            ExprKind::InList { operand, list, .. } => {
                self.bind_expr(operand, scope)?;
                for e in list {
                    self.bind_expr(e, scope)?;
                }
            }
            ExprKind::Star { .. } => {
                return Err(SqlError::semantic("* is only allowed in the selection list"));
            }
        }
        expr.bounded = true;
        Ok(())
    }

    /// Resolve a column reference.
    ///
    /// A qualified name looks its table up in the current scope and
    /// then up the parent chain; resolving through an ancestor makes
    /// the reference correlated. An unqualified name must have exactly
    /// one exporter among the current scope's tables.
    fn bind_column(&mut self, col: &mut ColumnRef, scope: ScopeId) -> SqlResult<()> {
        if let Some(tab) = col.tab_name.clone() {
            let Some((r, via_ancestor)) = self.find_table(scope, &tab) else {
                return Err(SqlError::UnknownTable(tab));
            };
            if self
                .batch
                .locate_column(self.catalog, r, &col.col_name)?
                .is_none()
            {
                return Err(SqlError::UnknownColumn(format!("{tab}.{}", col.col_name)));
            }
            col.tab_ref = Some(r);
            if via_ancestor {
                col.is_parameter = true;
                self.note_correlated(r, col);
                tracing::debug!(
                    table = %tab,
                    column = %col.col_name,
                    "column resolved through ancestor scope"
                );
            }
        } else {
            let tables = self.batch.scope(scope).tables.clone();
            let mut found: Option<TableRefId> = None;
            for r in tables {
                if self
                    .batch
                    .locate_column(self.catalog, r, &col.col_name)?
                    .is_some()
                {
                    if found.is_some() {
                        return Err(SqlError::AmbiguousColumn(col.col_name.clone()));
                    }
                    found = Some(r);
                }
            }
            let r = found.ok_or_else(|| SqlError::UnknownColumn(col.col_name.clone()))?;
            col.tab_ref = Some(r);
        }
        Ok(())
    }

    /// Record a correlated column on the ref that resolved it, so the
    /// planner can project the value to the statement boundary.
    /// De-duplicated per column name; the ref is fixed by the caller.
    fn note_correlated(&mut self, r: TableRefId, col: &ColumnRef) {
        let table_ref = self.batch.table_ref_mut(r);
        let already = table_ref.cols_ref_by_subq.iter().any(|e| {
            e.as_column()
                .is_some_and(|c| c.col_name.eq_ignore_ascii_case(&col.col_name))
        });
        if already {
            return;
        }
        let mut noted = col.clone();
        noted.tab_ref = Some(r);
        table_ref.cols_ref_by_subq.push(Expr {
            kind: ExprKind::Column(noted),
            output_name: Some(col.col_name.clone()),
            alias: None,
            bounded: true,
        });
    }
}
