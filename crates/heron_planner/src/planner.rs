use heron_common::error::{SqlError, SqlResult};
use heron_sql_frontend::expr::{Expr, ExprKind};
use heron_sql_frontend::stmt::{Batch, Statement, StmtId, TableRefId};
use heron_sql_frontend::table_ref::{JoinOp, TableSource};

use crate::logical_plan::LogicalPlan;

/// Transforms bound statements into [`LogicalPlan`] trees, one per
/// SELECT in the batch. Embedded SELECTs (FROM subqueries, WHERE and
/// HAVING and selection subqueries, compound members) get plans of
/// their own, retrievable through [`Planner::subquery_plan`].
pub struct Planner<'a> {
    batch: &'a mut Batch,
    plans: Vec<Option<LogicalPlan>>,
}

impl<'a> Planner<'a> {
    pub fn new(batch: &'a mut Batch) -> Self {
        let plans = vec![None; batch.stmt_count()];
        Planner { batch, plans }
    }

    /// The plan built for a statement, once `create_plan` has run over
    /// it or an enclosing statement.
    pub fn subquery_plan(&self, stmt: StmtId) -> Option<&LogicalPlan> {
        self.plans.get(stmt.0).and_then(|p| p.as_ref())
    }

    pub fn batch(&self) -> &Batch {
        self.batch
    }

    /// Plan a parsed statement. Only SELECT (and the SELECT source of
    /// INSERT) produces a tree.
    pub fn plan_statement(&mut self, stmt: &Statement) -> SqlResult<Option<LogicalPlan>> {
        match stmt {
            Statement::Select(id) => Ok(Some(self.create_plan(*id)?)),
            Statement::Insert(ins) => ins.source.map(|s| self.create_plan(s)).transpose(),
            _ => Ok(None),
        }
    }

    /// Build the logical tree for one bound SELECT, following SQL
    /// evaluation order: FROM, WHERE, GROUP/HAVING, ORDER, LIMIT, then
    /// subquery plans for the selection list. Planning is idempotent.
    pub fn create_plan(&mut self, id: StmtId) -> SqlResult<LogicalPlan> {
        if let Some(plan) = &self.plans[id.0] {
            return Ok(plan.clone());
        }
        if !self.batch.stmt(id).bounded {
            return Err(SqlError::semantic("statement must be bound before planning"));
        }
        tracing::debug!(stmt = %id, "planning select");

        // Project values consumed by deeper correlated scopes to this
        // statement's boundary as hidden selection items.
        let from_items = self.batch.stmt(id).from.clone();
        for r in &from_items {
            self.project_outer_refs(id, *r);
        }

        // FROM
        let mut root = self.transform_from(id, &from_items)?;

        // WHERE
        if let Some(predicate) = self.batch.stmt(id).where_clause.clone() {
            self.create_subquery_plans(id, &predicate)?;
            root = LogicalPlan::Filter {
                input: Box::new(root),
                predicate,
            };
        }

        // GROUP BY / HAVING
        let stmt = self.batch.stmt(id);
        if stmt.has_agg || !stmt.group_by.is_empty() {
            let group_by = stmt.group_by.clone();
            let mut aggs = stmt.aggregate_outputs();
            let having = stmt.having.clone();
            if let Some(h) = &having {
                // HAVING may aggregate columns the selection does not;
                // those calls are computed by the same Agg operator.
                h.visit_each(&mut |e| {
                    if matches!(e.kind, ExprKind::Agg { .. })
                        && !aggs.iter().any(|a| a.kind == e.kind)
                    {
                        aggs.push(e.clone());
                    }
                });
                self.create_subquery_plans(id, h)?;
            }
            root = LogicalPlan::Agg {
                input: Box::new(root),
                group_by,
                aggs,
                having,
            };
        }

        // ORDER BY
        let keys = self.batch.stmt(id).order_by.clone();
        if !keys.is_empty() {
            root = LogicalPlan::Order {
                input: Box::new(root),
                keys,
            };
        }

        // LIMIT
        if let Some(limit) = self.batch.stmt(id).limit.clone() {
            root = LogicalPlan::Limit {
                input: Box::new(root),
                limit,
            };
        }

        // Subqueries embedded in the selection list get their plans
        // only now; nothing above depends on them.
        for item in self.batch.stmt(id).selection.clone() {
            self.create_subquery_plans(id, &item)?;
        }

        // Trailing compound members are planned like subqueries.
        for (_, member) in self.batch.stmt(id).set_queries.clone() {
            self.create_plan(member)?;
            let stmt = self.batch.stmt_mut(id);
            if !stmt.subqueries.contains(&member) {
                stmt.subqueries.push(member);
            }
        }

        self.plans[id.0] = Some(root.clone());
        Ok(root)
    }

    /// Combine the FROM list into a single tree: none → Result, one →
    /// its subplan, several → a left-deep chain of cross joins.
    fn transform_from(&mut self, id: StmtId, from: &[TableRefId]) -> SqlResult<LogicalPlan> {
        let mut items = from.iter();
        let Some(first) = items.next() else {
            return Ok(LogicalPlan::Result {
                exprs: self.batch.stmt(id).selection.clone(),
            });
        };
        let mut root = self.transform_table_ref(id, *first)?;
        for t in items {
            root = LogicalPlan::Join {
                op: JoinOp::Cross,
                left: Box::new(root),
                right: Box::new(self.transform_table_ref(id, *t)?),
            };
        }
        Ok(root)
    }

    /// Plan one FROM source.
    fn transform_table_ref(&mut self, owner: StmtId, r: TableRefId) -> SqlResult<LogicalPlan> {
        let source = self.batch.table_ref(r).source.clone();
        match source {
            TableSource::Base { .. } => Ok(LogicalPlan::ScanTable { table: r }),
            TableSource::External { .. } => Ok(LogicalPlan::ScanFile { table: r }),
            TableSource::FromQuery { stmt, .. } | TableSource::CteQuery { stmt, .. } => {
                let input = self.create_plan(stmt)?;
                let o = self.batch.stmt_mut(owner);
                if !o.subqueries.contains(&stmt) {
                    o.subqueries.push(stmt);
                }
                o.from_queries.insert(stmt, r);
                Ok(LogicalPlan::FromQuery {
                    table: r,
                    input: Box::new(input),
                })
            }
            TableSource::Join {
                tables,
                ops,
                constraints,
            } => {
                let mut children = tables.iter();
                let first = children.next().ok_or_else(|| {
                    SqlError::Parse("join list without tables".into())
                })?;
                let mut root = self.transform_table_ref(owner, *first)?;
                for (i, t) in children.enumerate() {
                    root = LogicalPlan::Join {
                        op: ops[i],
                        left: Box::new(root),
                        right: Box::new(self.transform_table_ref(owner, *t)?),
                    };
                }
                // One filter per join list: all constraints conjoined
                // in declaration order above the chain.
                let Some(predicate) = conjoin(constraints) else {
                    return Ok(root);
                };
                self.create_subquery_plans(owner, &predicate)?;
                Ok(LogicalPlan::Filter {
                    input: Box::new(root),
                    predicate,
                })
            }
        }
    }

    /// Plan every SELECT embedded in the expression and record it on
    /// the owning statement.
    fn create_subquery_plans(&mut self, owner: StmtId, expr: &Expr) -> SqlResult<()> {
        for sub in expr.subquery_stmts() {
            self.create_plan(sub)?;
            let stmt = self.batch.stmt_mut(owner);
            if !stmt.subqueries.contains(&sub) {
                stmt.subqueries.push(sub);
            }
        }
        Ok(())
    }

    /// Append hidden selection items for columns that deeper scopes
    /// resolved through this ref (or, for a join list, its children).
    fn project_outer_refs(&mut self, owner: StmtId, r: TableRefId) {
        let join_children = match &self.batch.table_ref(r).source {
            TableSource::Join { tables, .. } => Some(tables.clone()),
            _ => None,
        };
        if let Some(children) = join_children {
            for t in children {
                self.project_outer_refs(owner, t);
            }
            return;
        }
        if self.batch.table_ref(r).cols_ref_by_subq.is_empty() {
            return;
        }
        let mut selection = std::mem::take(&mut self.batch.stmt_mut(owner).selection);
        self.batch.add_outer_refs_to_output(r, &mut selection);
        self.batch.stmt_mut(owner).selection = selection;
    }
}

/// AND together a list of predicates, in order.
fn conjoin(exprs: Vec<Expr>) -> Option<Expr> {
    let mut it = exprs.into_iter();
    let first = it.next()?;
    Some(it.fold(first, |acc, e| {
        let mut node = Expr::and(acc, e);
        node.bounded = true;
        node
    }))
}
