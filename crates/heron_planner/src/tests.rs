#[cfg(test)]
mod planner_tests {
    use heron_common::catalog::{ColumnDef, MemoryCatalog, TableDef};
    use heron_common::types::DataType;
    use heron_sql_frontend::binder::Binder;
    use heron_sql_frontend::expr::{AggFunc, BinaryOp, Expr};
    use heron_sql_frontend::stmt::{
        Batch, CteDef, InsertStmt, OrderTerm, SelectStmt, SetOp, Statement, StmtId,
    };
    use heron_sql_frontend::table_ref::{JoinOp, TableRef};

    use crate::logical_plan::LogicalPlan;
    use crate::planner::Planner;

    fn int_table(name: &str, cols: &[&str]) -> TableDef {
        TableDef {
            name: name.to_string(),
            columns: cols
                .iter()
                .map(|c| ColumnDef {
                    name: c.to_string(),
                    data_type: DataType::Int,
                })
                .collect(),
        }
    }

    fn test_catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.add_table(int_table("a", &["a1", "a2", "a3", "a4"]));
        catalog.add_table(int_table("b", &["b1", "b2"]));
        catalog.add_table(int_table("c", &["c1", "c2"]));
        catalog.add_table(int_table("m", &["i"]));
        catalog.add_table(int_table("customer", &["c_custkey", "c_name"]));
        catalog.add_table(int_table(
            "orders",
            &["o_orderkey", "o_custkey", "o_totalprice", "o_orderdate"],
        ));
        catalog.add_table(int_table("lineitem", &["l_orderkey", "l_quantity"]));
        catalog
    }

    fn bind_and_plan<'b>(
        catalog: &MemoryCatalog,
        batch: &'b mut Batch,
        id: StmtId,
    ) -> (LogicalPlan, Planner<'b>) {
        let mut binder = Binder::new(catalog, batch);
        binder.bind_select(id, None).unwrap();
        let mut planner = Planner::new(batch);
        let plan = planner.create_plan(id).unwrap();
        (plan, planner)
    }

    // ---- FROM normalization ----

    #[test]
    fn test_single_table_scan_keeps_alias() {
        // select b.a1 from a b
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let t = batch.add_table_ref(TableRef::base_as("a", "b"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::qualified_column("b", "a1")],
            from: vec![t],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(plan, LogicalPlan::ScanTable { table: t });
        assert_eq!(plan.explain(planner.batch()), "Scan(a AS b)\n");
    }

    #[test]
    fn test_from_less_select_is_result() {
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::int(1)],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(plan.explain(planner.batch()), "Result(1)\n");
    }

    #[test]
    fn test_two_from_items_cross_join() {
        // select a1, b1 from a, b
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let tb = batch.add_table_ref(TableRef::base("b"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1"), Expr::column("b1")],
            from: vec![ta, tb],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(
            plan.explain(planner.batch()),
            "Join(cross)\n  Scan(a)\n  Scan(b)\n"
        );
    }

    #[test]
    fn test_external_table_scans_file() {
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let t = batch.add_table_ref(TableRef::external(
            "ext",
            "/data/ext.csv",
            vec![ColumnDef {
                name: "x".into(),
                data_type: DataType::Int,
            }],
        ));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("x")],
            from: vec![t],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(plan, LogicalPlan::ScanFile { table: t });
        assert_eq!(
            plan.explain(planner.batch()),
            "ScanFile(ext <- /data/ext.csv)\n"
        );
    }

    // ---- Join lists ----

    #[test]
    fn test_join_list_left_deep_single_filter() {
        // from a join b on a1=b1 join c on a2=c2
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let tb = batch.add_table_ref(TableRef::base("b"));
        let tc = batch.add_table_ref(TableRef::base("c"));
        let tj = batch.add_table_ref(TableRef::join(
            vec![ta, tb, tc],
            vec![JoinOp::Inner, JoinOp::Inner],
            vec![
                Expr::eq(Expr::column("a1"), Expr::column("b1")),
                Expr::eq(Expr::column("a2"), Expr::column("c2")),
            ],
        ));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![tj],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(
            plan.explain(planner.batch()),
            "Filter((a1 = b1 AND a2 = c2))\n\
             \x20 Join(inner)\n\
             \x20   Join(inner)\n\
             \x20     Scan(a)\n\
             \x20     Scan(b)\n\
             \x20   Scan(c)\n"
        );
        // exactly one filter above a left-deep chain; joins are binary
        let LogicalPlan::Filter { input, .. } = &plan else {
            panic!("expected filter on top of join list");
        };
        let mut joins = 0;
        let mut stack = vec![input.as_ref()];
        while let Some(node) = stack.pop() {
            if matches!(node, LogicalPlan::Join { .. }) {
                joins += 1;
                assert_eq!(node.children().len(), 2);
            }
            assert!(!matches!(node, LogicalPlan::Filter { .. }));
            stack.extend(node.children());
        }
        assert_eq!(joins, 2);
    }

    #[test]
    fn test_cross_join_list_still_gets_one_filter() {
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let tb = batch.add_table_ref(TableRef::base("b"));
        let tj = batch.add_table_ref(TableRef::join(
            vec![ta, tb],
            vec![JoinOp::Cross],
            vec![Expr::int(1)],
        ));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![tj],
            ..Default::default()
        });
        let (plan, _) = bind_and_plan(&catalog, &mut batch, id);
        assert!(matches!(plan, LogicalPlan::Filter { .. }));
    }

    // ---- WHERE / GROUP / ORDER / LIMIT ----

    #[test]
    fn test_filter_wraps_from() {
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![ta],
            where_clause: Some(Expr::eq(Expr::column("a2"), Expr::int(7))),
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(
            plan.explain(planner.batch()),
            "Filter(a2 = 7)\n  Scan(a)\n"
        );
    }

    #[test]
    fn test_group_by_aggregation_shape() {
        // select i, min(i/2), 2+min(i)+max(i) from m group by i
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let tm = batch.add_table_ref(TableRef::base("m"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![
                Expr::column("i"),
                Expr::agg(
                    AggFunc::Min,
                    Expr::binary(BinaryOp::Div, Expr::column("i"), Expr::int(2)),
                ),
                Expr::binary(
                    BinaryOp::Add,
                    Expr::binary(
                        BinaryOp::Add,
                        Expr::int(2),
                        Expr::agg(AggFunc::Min, Expr::column("i")),
                    ),
                    Expr::agg(AggFunc::Max, Expr::column("i")),
                ),
            ],
            from: vec![tm],
            group_by: vec![Expr::column("i")],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(
            plan.explain(planner.batch()),
            "Agg(group=[i], aggs=[min(i / 2), 2 + min(i) + max(i)])\n  Scan(m)\n"
        );
    }

    #[test]
    fn test_aggregate_without_group_by() {
        // select count(*) from a
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::count_star()],
            from: vec![ta],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(
            plan.explain(planner.batch()),
            "Agg(group=[], aggs=[count(*)])\n  Scan(a)\n"
        );
    }

    #[test]
    fn test_order_then_limit_wrap_last() {
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![ta],
            order_by: vec![OrderTerm::desc(Expr::column("a1"))],
            limit: Some(Expr::int(10)),
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(
            plan.explain(planner.batch()),
            "Limit(10)\n  Order(a1 DESC)\n    Scan(a)\n"
        );
    }

    // ---- Subqueries ----

    #[test]
    fn test_from_query_gets_inner_plan() {
        // select a4 from (select a3, a4 from a) q(a4)
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let inner = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a3"), Expr::column("a4")],
            from: vec![ta],
            ..Default::default()
        });
        let tq = batch.add_table_ref(TableRef::from_query("q", inner, Some(vec!["a4".into()])));
        let outer = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a4")],
            from: vec![tq],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, outer);
        assert_eq!(
            plan.explain(planner.batch()),
            "FromQuery(q)\n  Scan(a)\n"
        );
        assert!(planner.subquery_plan(inner).is_some());
        let stmt = planner.batch().stmt(outer);
        assert!(stmt.subqueries.contains(&inner));
        assert_eq!(stmt.from_queries.get(&inner), Some(&tq));
    }

    #[test]
    fn test_where_subquery_planned() {
        // select a1 from a where a1 in (select b1 from b)
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let tb = batch.add_table_ref(TableRef::base("b"));
        let sub = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("b1")],
            from: vec![tb],
            ..Default::default()
        });
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![ta],
            where_clause: Some(Expr::in_subquery(Expr::column("a1"), sub)),
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert!(matches!(plan, LogicalPlan::Filter { .. }));
        assert_eq!(
            planner.subquery_plan(sub),
            Some(&LogicalPlan::ScanTable { table: tb })
        );
        assert!(planner.batch().stmt(id).subqueries.contains(&sub));
    }

    #[test]
    fn test_selection_subquery_planned_post_hoc() {
        // select (select min(b1) from b), a1 from a
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let tb = batch.add_table_ref(TableRef::base("b"));
        let sub = batch.add_stmt(SelectStmt {
            selection: vec![Expr::agg(AggFunc::Min, Expr::column("b1"))],
            from: vec![tb],
            ..Default::default()
        });
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::scalar_subquery(sub), Expr::column("a1")],
            from: vec![ta],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(plan, LogicalPlan::ScanTable { table: ta });
        let inner = planner.subquery_plan(sub).unwrap();
        assert!(matches!(inner, LogicalPlan::Agg { .. }));
    }

    #[test]
    fn test_correlated_value_projected_to_boundary() {
        // select a2 from a where exists (select b1 from b where b1 = a.a1)
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let tb = batch.add_table_ref(TableRef::base("b"));
        let sub = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("b1")],
            from: vec![tb],
            where_clause: Some(Expr::eq(
                Expr::column("b1"),
                Expr::qualified_column("a", "a1"),
            )),
            ..Default::default()
        });
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a2")],
            from: vec![ta],
            where_clause: Some(Expr::exists(sub)),
            ..Default::default()
        });
        let (_, planner) = bind_and_plan(&catalog, &mut batch, id);
        let selection = &planner.batch().stmt(id).selection;
        assert_eq!(selection.len(), 2);
        let hidden = selection[1].as_column().unwrap();
        assert_eq!(hidden.col_name, "a1");
        assert!(!hidden.is_visible);
        assert!(!hidden.is_parameter);
        // already-selected columns are not duplicated
        assert_eq!(selection[0].as_column().unwrap().col_name, "a2");
    }

    #[test]
    fn test_compound_members_planned() {
        // select a1 from a union select b1 from b
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let tb = batch.add_table_ref(TableRef::base("b"));
        let member = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("b1")],
            from: vec![tb],
            ..Default::default()
        });
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![ta],
            set_queries: vec![(SetOp::Union, member)],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(plan, LogicalPlan::ScanTable { table: ta });
        assert_eq!(
            planner.subquery_plan(member),
            Some(&LogicalPlan::ScanTable { table: tb })
        );
    }

    #[test]
    fn test_plan_is_idempotent() {
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![ta],
            ..Default::default()
        });
        let mut binder = Binder::new(&catalog, &mut batch);
        binder.bind_select(id, None).unwrap();
        let mut planner = Planner::new(&mut batch);
        let first = planner.create_plan(id).unwrap();
        let second = planner.create_plan(id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unbound_statement_is_rejected() {
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![ta],
            ..Default::default()
        });
        let mut planner = Planner::new(&mut batch);
        assert!(planner.create_plan(id).is_err());
    }

    #[test]
    fn test_insert_source_planned() {
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let tb = batch.add_table_ref(TableRef::base("b"));
        let source = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("b1")],
            from: vec![tb],
            ..Default::default()
        });
        let mut stmt = Statement::Insert(InsertStmt {
            table: "m".into(),
            columns: vec!["i".into()],
            values: vec![],
            source: Some(source),
        });
        Binder::new(&catalog, &mut batch).bind_statement(&mut stmt).unwrap();
        let mut planner = Planner::new(&mut batch);
        let plan = planner.plan_statement(&stmt).unwrap();
        assert_eq!(plan, Some(LogicalPlan::ScanTable { table: tb }));
    }

    // ---- CTE planning ----

    #[test]
    fn test_cte_planned_as_from_query() {
        // with w as (select a1 from a) select a1 from w
        let catalog = test_catalog();
        let mut batch = Batch::new();
        let ta = batch.add_table_ref(TableRef::base("a"));
        let body = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![ta],
            ..Default::default()
        });
        let tw = batch.add_table_ref(TableRef::base("w"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("a1")],
            from: vec![tw],
            ctes: vec![CteDef {
                name: "w".into(),
                col_names: None,
                stmt: body,
            }],
            ..Default::default()
        });
        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(
            plan.explain(planner.batch()),
            "FromQuery(w)\n  Scan(a)\n"
        );
        assert!(planner.subquery_plan(body).is_some());
    }

    // ---- End-to-end parity: TPC-H Q18 shape ----

    #[test]
    fn test_q18_style_logical_shape() {
        // select c_name, c_custkey, o_orderkey, o_orderdate, o_totalprice,
        //        sum(l_quantity)
        // from customer, orders, lineitem
        // where c_custkey = o_custkey and o_orderkey = l_orderkey
        //   and o_orderkey in (select l_orderkey from lineitem
        //                      group by l_orderkey
        //                      having sum(l_quantity) > 300)
        // group by c_name, c_custkey, o_orderkey, o_orderdate, o_totalprice
        // order by o_totalprice desc, o_orderdate
        // limit 100
        let catalog = test_catalog();
        let mut batch = Batch::new();

        let tl_inner = batch.add_table_ref(TableRef::base("lineitem"));
        let inner = batch.add_stmt(SelectStmt {
            selection: vec![Expr::column("l_orderkey")],
            from: vec![tl_inner],
            group_by: vec![Expr::column("l_orderkey")],
            having: Some(Expr::binary(
                BinaryOp::Gt,
                Expr::agg(AggFunc::Sum, Expr::column("l_quantity")),
                Expr::int(300),
            )),
            ..Default::default()
        });

        let tc = batch.add_table_ref(TableRef::base("customer"));
        let to = batch.add_table_ref(TableRef::base("orders"));
        let tl = batch.add_table_ref(TableRef::base("lineitem"));
        let id = batch.add_stmt(SelectStmt {
            selection: vec![
                Expr::column("c_name"),
                Expr::column("c_custkey"),
                Expr::column("o_orderkey"),
                Expr::column("o_orderdate"),
                Expr::column("o_totalprice"),
                Expr::agg(AggFunc::Sum, Expr::column("l_quantity")),
            ],
            from: vec![tc, to, tl],
            where_clause: Some(Expr::and(
                Expr::and(
                    Expr::eq(Expr::column("c_custkey"), Expr::column("o_custkey")),
                    Expr::eq(Expr::column("o_orderkey"), Expr::column("l_orderkey")),
                ),
                Expr::in_subquery(Expr::column("o_orderkey"), inner),
            )),
            group_by: vec![
                Expr::column("c_name"),
                Expr::column("c_custkey"),
                Expr::column("o_orderkey"),
                Expr::column("o_orderdate"),
                Expr::column("o_totalprice"),
            ],
            order_by: vec![
                OrderTerm::desc(Expr::column("o_totalprice")),
                OrderTerm::asc(Expr::column("o_orderdate")),
            ],
            limit: Some(Expr::int(100)),
            ..Default::default()
        });

        let (plan, planner) = bind_and_plan(&catalog, &mut batch, id);
        assert_eq!(
            plan.explain(planner.batch()),
            "Limit(100)\n\
             \x20 Order(o_totalprice DESC, o_orderdate)\n\
             \x20   Agg(group=[c_name, c_custkey, o_orderkey, o_orderdate, o_totalprice], \
             aggs=[sum(l_quantity)])\n\
             \x20     Filter(((c_custkey = o_custkey AND o_orderkey = l_orderkey) \
             AND o_orderkey IN subquery#0))\n\
             \x20       Join(cross)\n\
             \x20         Join(cross)\n\
             \x20           Scan(customer)\n\
             \x20           Scan(orders)\n\
             \x20         Scan(lineitem)\n"
        );

        // the inner subplan is fully bound and aggregated on its own
        let inner_plan = planner.subquery_plan(inner).unwrap();
        assert_eq!(
            inner_plan.explain(planner.batch()),
            "Agg(group=[l_orderkey], aggs=[sum(l_quantity)], \
             having=sum(l_quantity) > 300)\n\
             \x20 Scan(lineitem)\n"
        );
        assert!(planner.batch().stmt(id).subqueries.contains(&inner));
    }
}
