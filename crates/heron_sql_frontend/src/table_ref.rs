use std::fmt;

use heron_common::catalog::{Catalog, ColumnDef};
use heron_common::error::{SqlError, SqlResult};

use crate::expr::{ColumnRef, Expr, ExprKind};
use crate::stmt::{Batch, StmtId, TableRefId};

/// Join operator, parsed from the lowercased token the grammar emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOp {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinOp {
    pub fn from_token(token: &str) -> SqlResult<JoinOp> {
        match token {
            "join" | "inner" | "inner join" => Ok(JoinOp::Inner),
            "left" | "left join" | "left outer join" => Ok(JoinOp::Left),
            "right" | "right join" | "right outer join" => Ok(JoinOp::Right),
            "full" | "full join" | "full outer join" => Ok(JoinOp::Full),
            "cross" | "cross join" | "," => Ok(JoinOp::Cross),
            other => Err(SqlError::NotImplemented(format!("join operator {other}"))),
        }
    }
}

impl fmt::Display for JoinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinOp::Inner => "inner",
            JoinOp::Left => "left",
            JoinOp::Right => "right",
            JoinOp::Full => "full",
            JoinOp::Cross => "cross",
        };
        write!(f, "{s}")
    }
}

/// What a FROM source is.
#[derive(Debug, Clone)]
pub enum TableSource {
    /// A catalog relation.
    Base { table: String },
    /// A filename binding layered over a relation shape, for
    /// bulk-loaded external data. Exports the supplied column list.
    External {
        table: String,
        path: String,
        columns: Vec<ColumnDef>,
    },
    /// A subquery in FROM, optionally with a column-rename list.
    FromQuery {
        stmt: StmtId,
        col_names: Option<Vec<String>>,
    },
    /// A WITH-clause SELECT bound to a name visible in the enclosing
    /// statement.
    CteQuery {
        stmt: StmtId,
        col_names: Option<Vec<String>>,
    },
    /// An n-ary join list. Sub-refs are never themselves joins;
    /// `ops` and `constraints` run parallel with one entry between
    /// each pair of neighbours.
    Join {
        tables: Vec<TableRefId>,
        ops: Vec<JoinOp>,
        constraints: Vec<Expr>,
    },
}

/// A FROM source with the first name it is referable under and the
/// columns deeper correlated scopes resolved through it.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub alias: String,
    pub source: TableSource,
    pub cols_ref_by_subq: Vec<Expr>,
}

impl TableRef {
    pub fn base(table: impl Into<String>) -> Self {
        let table = table.into();
        TableRef {
            alias: table.clone(),
            source: TableSource::Base { table },
            cols_ref_by_subq: Vec::new(),
        }
    }

    pub fn base_as(table: impl Into<String>, alias: impl Into<String>) -> Self {
        TableRef {
            alias: alias.into(),
            source: TableSource::Base { table: table.into() },
            cols_ref_by_subq: Vec::new(),
        }
    }

    pub fn external(
        table: impl Into<String>,
        path: impl Into<String>,
        columns: Vec<ColumnDef>,
    ) -> Self {
        let table = table.into();
        TableRef {
            alias: table.clone(),
            source: TableSource::External {
                table,
                path: path.into(),
                columns,
            },
            cols_ref_by_subq: Vec::new(),
        }
    }

    pub fn from_query(
        alias: impl Into<String>,
        stmt: StmtId,
        col_names: Option<Vec<String>>,
    ) -> Self {
        TableRef {
            alias: alias.into(),
            source: TableSource::FromQuery { stmt, col_names },
            cols_ref_by_subq: Vec::new(),
        }
    }

    pub fn cte(name: impl Into<String>, stmt: StmtId, col_names: Option<Vec<String>>) -> Self {
        TableRef {
            alias: name.into(),
            source: TableSource::CteQuery { stmt, col_names },
            cols_ref_by_subq: Vec::new(),
        }
    }

    /// A join list is not referable by name; it has no alias of its
    /// own.
    pub fn join(tables: Vec<TableRefId>, ops: Vec<JoinOp>, constraints: Vec<Expr>) -> Self {
        TableRef {
            alias: String::new(),
            source: TableSource::Join {
                tables,
                ops,
                constraints,
            },
            cols_ref_by_subq: Vec::new(),
        }
    }
}

/// Set `tab_ref` on every column reference in the tree.
fn retarget_columns(expr: &mut Expr, target: TableRefId) {
    if let ExprKind::Column(c) = &mut expr.kind {
        c.tab_ref = Some(target);
    }
    match &mut expr.kind {
        ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
            retarget_columns(operand, target)
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            retarget_columns(left, target);
            retarget_columns(right, target);
        }
        ExprKind::Case(case) => {
            if let Some(op) = &mut case.operand {
                retarget_columns(op, target);
            }
            for (when, then) in &mut case.branches {
                retarget_columns(when, target);
                retarget_columns(then, target);
            }
            if let Some(e) = &mut case.else_expr {
                retarget_columns(e, target);
            }
        }
        ExprKind::Func { args, .. } | ExprKind::Agg { args, .. } => {
            for a in args {
                retarget_columns(a, target);
            }
        }
        ExprKind::InList { operand, list, .. } => {
            retarget_columns(operand, target);
            for e in list {
                retarget_columns(e, target);
            }
        }
        ExprKind::Subquery { operand, .. } => {
            if let Some(op) = operand {
                retarget_columns(op, target);
            }
        }
        _ => {}
    }
}

impl Batch {
    /// The columns a FROM source exposes to its enclosing scope.
    ///
    /// Base and External sources export one bound column reference per
    /// column. Query sources export clones of the inner selection,
    /// retargeted to the outer ref; aggregate-valued items become
    /// handles so the aggregation is computed once. A rename list
    /// exports its renamed prefix. Joins concatenate their children.
    pub fn all_column_refs(
        &self,
        catalog: &dyn Catalog,
        id: TableRefId,
    ) -> SqlResult<Vec<Expr>> {
        let table_ref = self.table_ref(id);
        match &table_ref.source {
            TableSource::Base { table } => {
                let cols = catalog.table_cols(table)?;
                Ok(self.column_exports(id, &table_ref.alias, cols))
            }
            TableSource::External { columns, .. } => {
                Ok(self.column_exports(id, &table_ref.alias, columns))
            }
            TableSource::FromQuery { stmt, col_names }
            | TableSource::CteQuery { stmt, col_names } => {
                self.query_exports(id, &table_ref.alias, *stmt, col_names.as_deref())
            }
            TableSource::Join { tables, .. } => {
                let mut out = Vec::new();
                for t in tables {
                    out.extend(self.all_column_refs(catalog, *t)?);
                }
                Ok(out)
            }
        }
    }

    fn column_exports(&self, id: TableRefId, alias: &str, cols: &[ColumnDef]) -> Vec<Expr> {
        cols.iter()
            .map(|c| {
                let mut col = ColumnRef::new(Some(alias.to_string()), c.name.clone());
                col.tab_ref = Some(id);
                Expr {
                    kind: ExprKind::Column(col),
                    output_name: Some(c.name.clone()),
                    alias: None,
                    bounded: true,
                }
            })
            .collect()
    }

    fn query_exports(
        &self,
        id: TableRefId,
        alias: &str,
        stmt: StmtId,
        col_names: Option<&[String]>,
    ) -> SqlResult<Vec<Expr>> {
        let inner = self.stmt(stmt);
        if !inner.bounded {
            return Err(SqlError::semantic(format!(
                "subquery {alias} referenced before it is bound"
            )));
        }
        let mut out = Vec::new();
        for (index, item) in inner.selection.iter().enumerate() {
            if matches!(item.as_column(), Some(c) if !c.is_visible) {
                continue;
            }
            let export = if item.has_agg_func() {
                Expr {
                    kind: ExprKind::ExprRef { stmt, index },
                    output_name: item.output_name.clone(),
                    alias: None,
                    bounded: true,
                }
            } else {
                let mut cloned = item.clone();
                retarget_columns(&mut cloned, id);
                cloned.alias = None;
                cloned
            };
            out.push(export);
        }
        if let Some(names) = col_names {
            if names.len() > out.len() {
                return Err(SqlError::semantic(format!(
                    "table {alias} has {} columns available but {} column names specified",
                    out.len(),
                    names.len()
                )));
            }
            out.truncate(names.len());
            for (e, name) in out.iter_mut().zip(names) {
                e.output_name = Some(name.clone());
            }
        }
        Ok(out)
    }

    /// Find the unique exported column with the given output name.
    /// `Ok(None)` when absent; an error when two exports share it.
    /// Lookup is by output name only, so a table qualifier cannot
    /// disambiguate two exports of the same ref sharing a name.
    pub fn locate_column(
        &self,
        catalog: &dyn Catalog,
        id: TableRefId,
        name: &str,
    ) -> SqlResult<Option<Expr>> {
        let mut found: Option<Expr> = None;
        for e in self.all_column_refs(catalog, id)? {
            let matches = e
                .output_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name));
            if matches {
                if found.is_some() {
                    return Err(SqlError::AmbiguousColumn(name.to_string()));
                }
                found = Some(e);
            }
        }
        Ok(found)
    }

    /// Append to `output` a hidden clone of every column a deeper
    /// scope resolved through this ref, unless an equivalent entry is
    /// already present. The hidden entries carry correlated values to
    /// the statement boundary so consumers need not re-bind.
    pub fn add_outer_refs_to_output(&self, id: TableRefId, output: &mut Vec<Expr>) {
        for x in self.table_ref(id).cols_ref_by_subq.clone() {
            let Some(col) = x.as_column() else { continue };
            let present = output.iter().any(|e| {
                e.as_column()
                    .is_some_and(|c| c.tab_ref == col.tab_ref && c.col_name == col.col_name)
            });
            if present {
                continue;
            }
            let mut hidden = x.clone();
            if let ExprKind::Column(c) = &mut hidden.kind {
                c.is_visible = false;
                c.is_parameter = false;
            }
            output.push(hidden);
        }
    }
}
