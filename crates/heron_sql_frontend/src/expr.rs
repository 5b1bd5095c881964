use std::fmt;

use heron_common::error::{SqlError, SqlResult};
use heron_common::types::{DataType, Datum};

use crate::stmt::{StmtId, TableRefId};

/// A scalar expression node.
///
/// `output_name` is the name this expression carries when it appears as
/// a selection item; `alias` is the name outer clauses (ORDER BY,
/// GROUP BY) of the same SELECT use to refer back to it. `bounded` is
/// set once name resolution has completed.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub output_name: Option<String>,
    pub alias: Option<String>,
    pub bounded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Datum),
    Column(ColumnRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        target: DataType,
    },
    Case(CaseExpr),
    Func {
        name: String,
        args: Vec<Expr>,
    },
    Agg {
        func: AggFunc,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// An embedded SELECT. `operand` is the left-hand side of IN.
    Subquery {
        kind: SubqueryKind,
        operand: Option<Box<Expr>>,
        stmt: StmtId,
        negated: bool,
    },
    InList {
        operand: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// `*` or `t.*` in a selection list; removed during binding.
    Star {
        qualifier: Option<String>,
    },
    /// Handle to an already-computed selection item of an inner SELECT,
    /// so the value is produced once and referenced from the outside.
    ExprRef {
        stmt: StmtId,
        index: usize,
    },
}

/// A column reference. `tab_ref` is set by the binder; `is_parameter`
/// marks a reference that resolved in an enclosing scope (correlated).
/// `is_visible = false` marks an output-list entry injected only to
/// carry a correlated value to the statement boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub db_name: Option<String>,
    pub tab_name: Option<String>,
    pub col_name: String,
    pub tab_ref: Option<TableRefId>,
    pub is_parameter: bool,
    pub is_visible: bool,
}

impl ColumnRef {
    pub fn new(tab_name: Option<String>, col_name: impl Into<String>) -> Self {
        ColumnRef {
            db_name: None,
            tab_name,
            col_name: col_name.into(),
            tab_ref: None,
            is_parameter: false,
            is_visible: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryKind {
    Scalar,
    Exists,
    In,
}

/// CASE [eval] WHEN .. THEN .. [ELSE ..] END.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub operand: Option<Box<Expr>>,
    pub branches: Vec<(Expr, Expr)>,
    pub else_expr: Option<Box<Expr>>,
}

impl CaseExpr {
    /// Assemble a CASE from the flat expression list the grammar
    /// produces. With `has_else` the last element is the ELSE arm; an
    /// odd remainder means the first element is the comparison operand.
    /// The remainder after removing the operand must be a non-empty,
    /// even list of WHEN/THEN pairs.
    pub fn from_parts(mut parts: Vec<Expr>, has_else: bool) -> SqlResult<CaseExpr> {
        let else_expr = if has_else {
            let e = parts
                .pop()
                .ok_or_else(|| SqlError::Parse("CASE with ELSE but no expressions".into()))?;
            Some(Box::new(e))
        } else {
            None
        };
        let operand = if parts.len() % 2 == 1 {
            Some(Box::new(parts.remove(0)))
        } else {
            None
        };
        if parts.is_empty() {
            return Err(SqlError::Parse("CASE without WHEN/THEN pairs".into()));
        }
        let mut branches = Vec::with_capacity(parts.len() / 2);
        let mut it = parts.into_iter();
        while let (Some(when), Some(then)) = (it.next(), it.next()) {
            branches.push((when, then));
        }
        Ok(CaseExpr {
            operand,
            branches,
            else_expr,
        })
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            output_name: None,
            alias: None,
            bounded: false,
        }
    }

    // ── Constructors ────────────────────────────────────────────────

    pub fn literal(value: Datum) -> Self {
        Expr::new(ExprKind::Literal(value))
    }

    pub fn int(value: i64) -> Self {
        Expr::literal(Datum::Int(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::literal(Datum::Text(value.into()))
    }

    /// Unqualified column reference. The name doubles as the alias so
    /// ORDER BY / GROUP BY references can be matched back to selection
    /// items by `search_replace`.
    pub fn column(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut e = Expr::new(ExprKind::Column(ColumnRef::new(None, name.clone())));
        e.output_name = Some(name.clone());
        e.alias = Some(name);
        e
    }

    /// Table-qualified column reference.
    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let mut e = Expr::new(ExprKind::Column(ColumnRef::new(Some(table.into()), name.clone())));
        e.output_name = Some(name);
        e
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::new(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOp::Eq, left, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::new(ExprKind::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::new(ExprKind::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// BETWEEN is desugared at construction: `a BETWEEN b AND c`
    /// becomes `(a >= b) AND (a <= c)`.
    pub fn between(operand: Expr, low: Expr, high: Expr) -> Self {
        Expr::and(
            Expr::binary(BinaryOp::GtEq, operand.clone(), low),
            Expr::binary(BinaryOp::LtEq, operand, high),
        )
    }

    pub fn cast(operand: Expr, target: DataType) -> Self {
        Expr::new(ExprKind::Cast {
            operand: Box::new(operand),
            target,
        })
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Func {
            name: name.into(),
            args,
        })
    }

    pub fn agg(func: AggFunc, arg: Expr) -> Self {
        Expr::new(ExprKind::Agg {
            func,
            args: vec![arg],
            distinct: false,
        })
    }

    /// COUNT(*).
    pub fn count_star() -> Self {
        Expr::new(ExprKind::Agg {
            func: AggFunc::Count,
            args: Vec::new(),
            distinct: false,
        })
    }

    pub fn scalar_subquery(stmt: StmtId) -> Self {
        Expr::new(ExprKind::Subquery {
            kind: SubqueryKind::Scalar,
            operand: None,
            stmt,
            negated: false,
        })
    }

    pub fn exists(stmt: StmtId) -> Self {
        Expr::new(ExprKind::Subquery {
            kind: SubqueryKind::Exists,
            operand: None,
            stmt,
            negated: false,
        })
    }

    pub fn in_subquery(operand: Expr, stmt: StmtId) -> Self {
        Expr::new(ExprKind::Subquery {
            kind: SubqueryKind::In,
            operand: Some(Box::new(operand)),
            stmt,
            negated: false,
        })
    }

    pub fn in_list(operand: Expr, list: Vec<Expr>) -> Self {
        Expr::new(ExprKind::InList {
            operand: Box::new(operand),
            list,
            negated: false,
        })
    }

    pub fn star() -> Self {
        Expr::new(ExprKind::Star { qualifier: None })
    }

    pub fn qualified_star(table: impl Into<String>) -> Self {
        Expr::new(ExprKind::Star {
            qualifier: Some(table.into()),
        })
    }

    /// Attach the alias outer clauses of the same SELECT refer to.
    /// The alias also becomes the output name.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        self.output_name = Some(alias.clone());
        self.alias = Some(alias);
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    // ── Traversal and predicates ────────────────────────────────────

    /// Pre-order traversal over this expression and every
    /// sub-expression. `f` may inspect nodes but not reorder siblings.
    pub fn visit_each<'a, F: FnMut(&'a Expr)>(&'a self, f: &mut F) {
        f(self);
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Star { .. } | ExprKind::ExprRef { .. } => {}
            ExprKind::Column(_) => {}
            ExprKind::Unary { operand, .. } => operand.visit_each(f),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                left.visit_each(f);
                right.visit_each(f);
            }
            ExprKind::Cast { operand, .. } => operand.visit_each(f),
            ExprKind::Case(case) => {
                if let Some(op) = &case.operand {
                    op.visit_each(f);
                }
                for (when, then) in &case.branches {
                    when.visit_each(f);
                    then.visit_each(f);
                }
                if let Some(e) = &case.else_expr {
                    e.visit_each(f);
                }
            }
            ExprKind::Func { args, .. } | ExprKind::Agg { args, .. } => {
                for a in args {
                    a.visit_each(f);
                }
            }
            ExprKind::Subquery { operand, .. } => {
                if let Some(op) = operand {
                    op.visit_each(f);
                }
            }
            ExprKind::InList { operand, list, .. } => {
                operand.visit_each(f);
                for e in list {
                    e.visit_each(f);
                }
            }
        }
    }

    /// True if any node in this tree is an aggregate call. Does not
    /// look into embedded SELECTs: their aggregates belong to them.
    pub fn has_agg_func(&self) -> bool {
        let mut found = false;
        self.visit_each(&mut |e| {
            if matches!(e.kind, ExprKind::Agg { .. }) {
                found = true;
            }
        });
        found
    }

    /// True if any node in this tree embeds a SELECT.
    pub fn has_subquery(&self) -> bool {
        let mut found = false;
        self.visit_each(&mut |e| {
            if matches!(e.kind, ExprKind::Subquery { .. }) {
                found = true;
            }
        });
        found
    }

    /// The column reference payload, when this node is one.
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match &self.kind {
            ExprKind::Column(c) => Some(c),
            _ => None,
        }
    }

    /// Statement ids of every subquery embedded in this tree, in
    /// pre-order.
    pub fn subquery_stmts(&self) -> Vec<StmtId> {
        let mut out = Vec::new();
        self.visit_each(&mut |e| {
            if let ExprKind::Subquery { stmt, .. } = &e.kind {
                out.push(*stmt);
            }
        });
        out
    }

    /// Return a copy of this tree with every sub-expression whose
    /// `alias` equals `name` replaced by a deep clone of `replacement`.
    /// Shared nodes are never mutated; the tree is rebuilt bottom-up.
    pub fn search_replace(&self, name: &str, replacement: &Expr) -> Expr {
        if self.alias.as_deref() == Some(name) {
            return replacement.clone();
        }
        let mut out = self.clone();
        match &mut out.kind {
            ExprKind::Literal(_)
            | ExprKind::Column(_)
            | ExprKind::Star { .. }
            | ExprKind::ExprRef { .. } => {}
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                **operand = operand.search_replace(name, replacement);
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                **left = left.search_replace(name, replacement);
                **right = right.search_replace(name, replacement);
            }
            ExprKind::Case(case) => {
                if let Some(op) = &mut case.operand {
                    **op = op.search_replace(name, replacement);
                }
                for (when, then) in &mut case.branches {
                    *when = when.search_replace(name, replacement);
                    *then = then.search_replace(name, replacement);
                }
                if let Some(e) = &mut case.else_expr {
                    **e = e.search_replace(name, replacement);
                }
            }
            ExprKind::Func { args, .. } | ExprKind::Agg { args, .. } => {
                for a in args.iter_mut() {
                    *a = a.search_replace(name, replacement);
                }
            }
            ExprKind::Subquery { operand, .. } => {
                if let Some(op) = operand {
                    **op = op.search_replace(name, replacement);
                }
            }
            ExprKind::InList { operand, list, .. } => {
                **operand = operand.search_replace(name, replacement);
                for e in list.iter_mut() {
                    *e = e.search_replace(name, replacement);
                }
            }
        }
        out
    }
}

// ── Rendering ───────────────────────────────────────────────────────

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(v) => write!(f, "{v}"),
            ExprKind::Column(c) => {
                if let Some(t) = &c.tab_name {
                    write!(f, "{t}.{}", c.col_name)
                } else {
                    write!(f, "{}", c.col_name)
                }
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Not => write!(f, "NOT {operand}"),
                UnaryOp::IsNull => write!(f, "{operand} IS NULL"),
                UnaryOp::IsNotNull => write!(f, "{operand} IS NOT NULL"),
            },
            ExprKind::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            ExprKind::Logical { op, left, right } => {
                let op = match op {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                };
                write!(f, "({left} {op} {right})")
            }
            ExprKind::Cast { operand, target } => write!(f, "CAST({operand} AS {target})"),
            ExprKind::Case(case) => {
                write!(f, "CASE")?;
                if let Some(op) = &case.operand {
                    write!(f, " {op}")?;
                }
                for (when, then) in &case.branches {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(e) = &case.else_expr {
                    write!(f, " ELSE {e}")?;
                }
                write!(f, " END")
            }
            ExprKind::Func { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            ExprKind::Agg {
                func,
                args,
                distinct,
            } => {
                write!(f, "{func}(")?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                if args.is_empty() {
                    write!(f, "*")?;
                } else {
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                }
                write!(f, ")")
            }
            ExprKind::Subquery {
                kind,
                operand,
                stmt,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                match kind {
                    SubqueryKind::Scalar => write!(f, "subquery{stmt}"),
                    SubqueryKind::Exists => write!(f, "{not}EXISTS subquery{stmt}"),
                    SubqueryKind::In => match operand {
                        Some(op) => write!(f, "{op} {not}IN subquery{stmt}"),
                        None => write!(f, "{not}IN subquery{stmt}"),
                    },
                }
            }
            ExprKind::InList {
                operand,
                list,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{operand} {not}IN (")?;
                for (i, e) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            ExprKind::Star { qualifier } => match qualifier {
                Some(q) => write!(f, "{q}.*"),
                None => write!(f, "*"),
            },
            ExprKind::ExprRef { stmt, index } => write!(f, "ref({stmt}.{index})"),
        }
    }
}
