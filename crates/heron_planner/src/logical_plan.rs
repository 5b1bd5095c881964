//! Logical plan representation.
//!
//! `LogicalPlan` is the output of the frontend: a bound, normalized
//! relational algebra tree that downstream rewrite rules and the
//! physical planner consume. Construction lives in [`crate::planner`];
//! this module only defines the node algebra and its rendering.

use std::fmt::Write as _;

use heron_sql_frontend::expr::Expr;
use heron_sql_frontend::stmt::{Batch, OrderTerm, TableRefId};
use heron_sql_frontend::table_ref::{JoinOp, TableSource};

/// A logical relational operator. Joins are strictly binary; n-ary
/// join lists from the AST are normalized into a left-deep chain with
/// one filter on top before they get here.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Full scan of a catalog relation.
    ScanTable { table: TableRefId },

    /// Scan of a file-backed external relation.
    ScanFile { table: TableRefId },

    /// A subquery in FROM wrapping its own plan.
    FromQuery {
        table: TableRefId,
        input: Box<LogicalPlan>,
    },

    /// Binary join; the tree is left-deep with the first FROM source
    /// at the leftmost leaf.
    Join {
        op: JoinOp,
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },

    /// Selection (WHERE, or the conjoined constraints of a join list).
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },

    /// Aggregation (GROUP BY + aggregate outputs + HAVING).
    Agg {
        input: Box<LogicalPlan>,
        group_by: Vec<Expr>,
        aggs: Vec<Expr>,
        having: Option<Expr>,
    },

    /// Sort (ORDER BY).
    Order {
        input: Box<LogicalPlan>,
        keys: Vec<OrderTerm>,
    },

    /// Row-count cap (LIMIT).
    Limit {
        input: Box<LogicalPlan>,
        limit: Expr,
    },

    /// A FROM-less SELECT: produce the selection list once.
    Result { exprs: Vec<Expr> },
}

impl LogicalPlan {
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::ScanTable { .. }
            | LogicalPlan::ScanFile { .. }
            | LogicalPlan::Result { .. } => Vec::new(),
            LogicalPlan::FromQuery { input, .. }
            | LogicalPlan::Filter { input, .. }
            | LogicalPlan::Agg { input, .. }
            | LogicalPlan::Order { input, .. }
            | LogicalPlan::Limit { input, .. } => vec![input],
            LogicalPlan::Join { left, right, .. } => vec![left, right],
        }
    }

    /// Render the tree as an indented EXPLAIN-style listing. Table
    /// refs are resolved against the batch for readable names.
    pub fn explain(&self, batch: &Batch) -> String {
        let mut out = String::new();
        self.explain_into(batch, 0, &mut out);
        out
    }

    fn explain_into(&self, batch: &Batch, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        match self {
            LogicalPlan::ScanTable { table } => {
                let r = batch.table_ref(*table);
                match &r.source {
                    TableSource::Base { table: name } if !name.eq_ignore_ascii_case(&r.alias) => {
                        let _ = writeln!(out, "Scan({name} AS {})", r.alias);
                    }
                    _ => {
                        let _ = writeln!(out, "Scan({})", r.alias);
                    }
                }
            }
            LogicalPlan::ScanFile { table } => {
                let r = batch.table_ref(*table);
                match &r.source {
                    TableSource::External { path, .. } => {
                        let _ = writeln!(out, "ScanFile({} <- {path})", r.alias);
                    }
                    _ => {
                        let _ = writeln!(out, "ScanFile({})", r.alias);
                    }
                }
            }
            LogicalPlan::FromQuery { table, input } => {
                let _ = writeln!(out, "FromQuery({})", batch.table_ref(*table).alias);
                input.explain_into(batch, depth + 1, out);
            }
            LogicalPlan::Join { op, left, right } => {
                let _ = writeln!(out, "Join({op})");
                left.explain_into(batch, depth + 1, out);
                right.explain_into(batch, depth + 1, out);
            }
            LogicalPlan::Filter { input, predicate } => {
                let _ = writeln!(out, "Filter({predicate})");
                input.explain_into(batch, depth + 1, out);
            }
            LogicalPlan::Agg {
                input,
                group_by,
                aggs,
                having,
            } => {
                let group = join_exprs(group_by);
                let aggs = join_exprs(aggs);
                match having {
                    Some(h) => {
                        let _ = writeln!(out, "Agg(group=[{group}], aggs=[{aggs}], having={h})");
                    }
                    None => {
                        let _ = writeln!(out, "Agg(group=[{group}], aggs=[{aggs}])");
                    }
                }
                input.explain_into(batch, depth + 1, out);
            }
            LogicalPlan::Order { input, keys } => {
                let keys = keys
                    .iter()
                    .map(|k| {
                        if k.desc {
                            format!("{} DESC", k.expr)
                        } else {
                            k.expr.to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(out, "Order({keys})");
                input.explain_into(batch, depth + 1, out);
            }
            LogicalPlan::Limit { input, limit } => {
                let _ = writeln!(out, "Limit({limit})");
                input.explain_into(batch, depth + 1, out);
            }
            LogicalPlan::Result { exprs } => {
                let _ = writeln!(out, "Result({})", join_exprs(exprs));
            }
        }
    }
}

fn join_exprs(exprs: &[Expr]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
