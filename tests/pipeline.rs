use bi_query_builder::{
    generate, parse_query, row, AggregateFunc, Catalog, Dimension, Executor, ExecutorConfig,
    FieldType, Filter, Metric, Operator, ParsedQuery, Row, Value, NO_QUERY,
};
use bi_query_builder::aggregate::CountSeed;

fn metric(name: &str) -> Metric {
    Metric::new(name, name, FieldType::Number)
}

fn dimension(name: &str) -> Dimension {
    Dimension::new(name, name)
}

fn region_revenue() -> Vec<Row> {
    vec![
        row([("region", Value::from("East")), ("revenue", Value::from(100))]),
        row([("region", Value::from("East")), ("revenue", Value::from(50))]),
        row([("region", Value::from("West")), ("revenue", Value::from(20))]),
    ]
}

fn run(query: &str, rows: &[Row]) -> Vec<Row> {
    Executor::new().execute(&parse_query(query), rows)
}

#[test]
fn generated_queries_parse_back_to_their_selection() {
    let filters = vec![
        Filter::new("region", Operator::Eq, "East"),
        Filter::new("quantity", Operator::Gte, "10"),
        Filter::new("product", Operator::Like, "Prod%"),
        Filter::new("note", Operator::Eq, "O'Brien"),
    ];
    let dimensions = vec![dimension("region"), dimension("product")];
    let metrics = vec![metric("revenue"), metric("profit")];

    for func in [
        AggregateFunc::Sum,
        AggregateFunc::Count,
        AggregateFunc::Avg,
        AggregateFunc::Min,
        AggregateFunc::Max,
    ] {
        let query = generate("sales", &func, &metrics, &dimensions, &filters);
        let parsed = parse_query(&query);

        assert_eq!(parsed.from, "sales");
        assert_eq!(parsed.group_by, vec!["region", "product"]);
        assert_eq!(parsed.where_clause, filters);
        let aggregations: Vec<_> = parsed
            .aggregations
            .iter()
            .map(|a| (a.func.clone(), a.field.as_str(), a.alias.as_str()))
            .collect();
        assert_eq!(
            aggregations,
            vec![(func.clone(), "revenue", "revenue"), (func.clone(), "profit", "profit")]
        );
    }
}

#[test]
fn empty_selection_is_the_sentinel_end_to_end() {
    let query = generate("sales", &AggregateFunc::Sum, &[], &[], &[]);
    assert_eq!(query, NO_QUERY);

    let parsed = parse_query(&query);
    assert_eq!(parsed, ParsedQuery::default());

    let dataset = Catalog::builtin().dataset();
    assert!(Executor::new().execute(&parsed, dataset.table("sales").unwrap()).is_empty());
    assert!(Executor::new().execute_on(&parsed, &dataset).is_empty());
}

#[test]
fn numeric_filter_keeps_matching_rows() {
    let rows = vec![
        row([("id", Value::from(1)), ("region", Value::from("East")), ("q", Value::from(5))]),
        row([("id", Value::from(2)), ("region", Value::from("West")), ("q", Value::from(15))]),
    ];
    let result = run("SELECT id, region, q FROM t WHERE q > '10'", &rows);
    assert_eq!(result, vec![rows[1].clone()]);
}

#[test]
fn like_prefix_pattern() {
    let rows = vec![
        row([("id", Value::from(1)), ("product", Value::from("Product A"))]),
        row([("id", Value::from(2)), ("product", Value::from("Service X"))]),
        row([("id", Value::from(3)), ("product", Value::from("prod-9"))]),
    ];
    let result = run("SELECT id, product FROM t WHERE product LIKE 'Prod%'", &rows);
    let ids: Vec<_> = result.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![Value::from(1), Value::from(3)]);
}

#[test]
fn grouped_sum_keeps_first_seen_order() {
    let result = run(
        "SELECT region, SUM(revenue) AS revenue FROM t GROUP BY region",
        &region_revenue(),
    );
    assert_eq!(
        result,
        vec![
            row([("region", Value::from("East")), ("revenue", Value::from(150))]),
            row([("region", Value::from("West")), ("revenue", Value::from(20))]),
        ]
    );
}

#[test]
fn grouped_avg() {
    let result = run(
        "SELECT region, AVG(revenue) AS revenue FROM t GROUP BY region",
        &region_revenue(),
    );
    assert_eq!(result[0]["revenue"], Value::from(75));
}

#[test]
fn count_seed_is_a_choice() {
    let parsed = parse_query("SELECT region, COUNT(revenue) AS revenue FROM t GROUP BY region");
    let rows = region_revenue();

    let counted = Executor::new().execute(&parsed, &rows);
    assert_eq!(counted[0]["revenue"], Value::from(2));

    let seeded_by_value = Executor::new()
        .with_config(ExecutorConfig { count_seed: CountSeed::FieldValue })
        .execute(&parsed, &rows);
    assert_eq!(seeded_by_value[0]["revenue"], Value::from(101));
}

#[test]
fn execute_is_idempotent_and_pure() {
    let rows = region_revenue();
    let before = rows.clone();
    let parsed = parse_query("SELECT region, SUM(revenue) AS revenue FROM t WHERE revenue > 10 GROUP BY region");

    let executor = Executor::new();
    let first = executor.execute(&parsed, &rows);
    let second = executor.execute(&parsed, &rows);
    assert_eq!(first, second);
    assert_eq!(rows, before);
}

#[test]
fn ungrouped_query_returns_filtered_rows_untouched() {
    let rows = region_revenue();
    let result = run(
        "SELECT region, SUM(revenue) AS total FROM t WHERE region = 'east'",
        &rows,
    );
    assert_eq!(result, rows[..2].to_vec());
    assert!(result.iter().all(|r| !r.contains_key("total")));
}

#[test]
fn builtin_catalog_through_the_whole_pipeline() {
    let catalog = Catalog::builtin();
    let dataset = catalog.dataset();
    let executor = catalog.build_executor();

    let query = generate(
        "inventory",
        &AggregateFunc::Max,
        &[metric("stock")],
        &[dimension("warehouse")],
        &[Filter::new("category", Operator::Eq, "hardware")],
    );
    let result = executor.execute_on(&parse_query(&query), &dataset);
    let stock: Vec<_> = result.iter().map(|r| (r["warehouse"].to_string(), r["stock"].clone())).collect();
    assert_eq!(
        stock,
        vec![
            ("Warehouse 1".to_string(), Value::from(120)),
            ("Warehouse 2".to_string(), Value::from(18)),
        ]
    );
}
