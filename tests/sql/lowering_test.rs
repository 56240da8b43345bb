//! Lowering of interpreted queries to SQL over the fixture model.

#[path = "../common/mod.rs"]
mod common;

use orql::compile::{compile, CompileError};
use orql::sql::{
    ConversionError, ConverterOptions, JoinType, SecondaryTableJoinPolicy, SqlAst, SqlStatement,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

fn lower(query: &str) -> SqlAst {
    lower_with(query, SecondaryTableJoinPolicy::Outer)
}

fn lower_with(query: &str, policy: SecondaryTableJoinPolicy) -> SqlAst {
    let options = ConverterOptions {
        secondary_table_join: policy,
    };
    compile(query, &common::model(), &options).expect("query compiles")
}

fn single_sql(query: &str) -> String {
    let statements = lower(query).sql_statements();
    assert_eq!(statements.len(), 1, "expected one statement: {:?}", statements);
    let sql = statements.into_iter().next().unwrap_or_default();
    assert_valid(&sql);
    sql
}

fn assert_valid(sql: &str) {
    if let Err(e) = Parser::parse_sql(&GenericDialect {}, sql) {
        panic!("invalid SQL: {}\nSQL: {}", e, sql);
    }
}

// ============================================================================
// Table groups
// ============================================================================

#[test]
fn test_single_table_select() {
    let sql = single_sql("select a.name from Account a where a.balance > 100 order by a.name desc");
    insta::assert_snapshot!(sql, @r#"SELECT "a_0"."name" FROM "accounts" AS "a_0" WHERE "a_0"."balance" > 100 ORDER BY "a_0"."name" DESC"#);
}

#[test]
fn test_subtype_spans_three_tables() {
    let sql = single_sql("select s.rate from SavingsAccount s");
    assert!(sql.contains("FROM \"accounts\" AS \"s_0\""), "SQL: {}", sql);
    assert!(
        sql.contains(
            "INNER JOIN \"savings_accounts\" AS \"s_1\" ON \"s_0\".\"id\" = \"s_1\".\"account_id\""
        ),
        "SQL: {}",
        sql
    );
    assert!(
        sql.contains(
            "LEFT OUTER JOIN \"savings_notes\" AS \"s_2\" ON \"s_0\".\"id\" = \"s_2\".\"account_id\""
        ),
        "SQL: {}",
        sql
    );
    assert!(sql.starts_with("SELECT \"s_1\".\"rate\" FROM"), "SQL: {}", sql);
}

#[test]
fn test_secondary_join_policies() {
    let join_types = |policy| {
        let ast = lower_with("from SavingsAccount s", policy);
        match &ast.statements[0] {
            SqlStatement::Select(select) => select.spaces[0]
                .root
                .secondary
                .iter()
                .map(|join| join.join_type)
                .collect::<Vec<_>>(),
            other => panic!("expected select, got {:?}", other),
        }
    };

    // savings_accounts identifies the subtype and is inner joined under
    // every policy
    assert_eq!(
        join_types(SecondaryTableJoinPolicy::Outer),
        vec![JoinType::Inner, JoinType::Left]
    );
    assert_eq!(
        join_types(SecondaryTableJoinPolicy::Inner),
        vec![JoinType::Inner, JoinType::Inner]
    );
    assert_eq!(
        join_types(SecondaryTableJoinPolicy::Mapped),
        vec![JoinType::Inner, JoinType::Left]
    );
}

#[test]
fn test_left_join_to_multi_table_entity_stays_outer() {
    let ast = lower_with(
        "select o.id from Order o left join o.savings s",
        SecondaryTableJoinPolicy::Inner,
    );
    let sql = ast.sql_statements().remove(0);
    assert_eq!(
        sql,
        "SELECT \"o_0\".\"id\" FROM \"orders\" AS \"o_0\" \
         LEFT OUTER JOIN \"accounts\" AS \"s_0\" ON \"o_0\".\"savings_id\" = \"s_0\".\"id\" \
         LEFT OUTER JOIN \"savings_accounts\" AS \"s_1\" ON \"s_0\".\"id\" = \"s_1\".\"account_id\" \
         LEFT OUTER JOIN \"savings_notes\" AS \"s_2\" ON \"s_0\".\"id\" = \"s_2\".\"account_id\""
    );
    assert_valid(&sql);
}

#[test]
fn test_derived_table_is_inlined() {
    let sql = single_sql("select r.name from Region r");
    assert_eq!(
        sql,
        "SELECT \"r_0\".\"name\" FROM (select id, name from regions where active = 1) AS \"r_0\""
    );
}

// ============================================================================
// Joins
// ============================================================================

#[test]
fn test_explicit_attribute_joins() {
    let sql = single_sql("select i.price from Order o join o.items i left join o.customer c");
    assert!(
        sql.contains("INNER JOIN \"line_items\" AS \"i_0\" ON \"o_0\".\"id\" = \"i_0\".\"order_id\""),
        "SQL: {}",
        sql
    );
    assert!(
        sql.contains(
            "LEFT OUTER JOIN \"customers\" AS \"c_0\" ON \"o_0\".\"customer_id\" = \"c_0\".\"id\""
        ),
        "SQL: {}",
        sql
    );
}

#[test]
fn test_entity_join_uses_its_predicate() {
    let sql = single_sql("select f.name from Account a join Fund f on f.owner = a.owner");
    assert!(
        sql.contains("INNER JOIN \"funds\" AS \"f_0\" ON \"f_0\".\"owner_id\" = \"a_0\".\"owner_id\""),
        "SQL: {}",
        sql
    );
}

#[test]
fn test_implicit_join_shared_between_clauses() {
    let sql = single_sql("select o.customer.name from Order o where o.customer.id = 7");
    assert_eq!(sql.matches("JOIN \"customers\"").count(), 1, "SQL: {}", sql);
    assert!(
        sql.contains(
            "INNER JOIN \"customers\" AS \"o.customer_0\" ON \"o_0\".\"customer_id\" = \"o.customer_0\".\"id\""
        ),
        "SQL: {}",
        sql
    );
    assert!(sql.ends_with("WHERE \"o.customer_0\".\"id\" = 7"), "SQL: {}", sql);
}

#[test]
fn test_index_access_constrains_index_column() {
    let sql = single_sql("select o.total from Order o where o.items[0].id = 1234");
    assert!(
        sql.contains(
            "INNER JOIN \"line_items\" AS \"o.items[0]_0\" ON \"o_0\".\"id\" = \"o.items[0]_0\".\"order_id\" \
             AND \"o.items[0]_0\".\"position\" = 0"
        ),
        "SQL: {}",
        sql
    );
    assert!(sql.ends_with("WHERE \"o.items[0]_0\".\"id\" = 1234"), "SQL: {}", sql);
}

#[test]
fn test_two_index_accesses_join_twice() {
    let sql = single_sql("from Order o where o.items[0].quantity > o.items[1].quantity");
    assert!(sql.contains("AS \"o.items[0]_0\""), "SQL: {}", sql);
    assert!(sql.contains("AS \"o.items[1]_0\""), "SQL: {}", sql);
}

#[test]
fn test_separate_spaces_cross_join() {
    let sql = single_sql("select o.id, c.id from Order o, Customer c");
    assert!(
        sql.starts_with(
            "SELECT \"o_0\".\"id\", \"c_0\".\"id\" FROM \"orders\" AS \"o_0\" CROSS JOIN \"customers\" AS \"c_0\""
        ),
        "SQL: {}",
        sql
    );
}

#[test]
fn test_member_of_becomes_sub_select() {
    let sql = single_sql("from Order o where :tag member of o.tags");
    assert!(
        sql.ends_with(
            "WHERE ? IN (SELECT \"o.tags_0\".\"id\" FROM \"tags\" AS \"o.tags_0\" \
             WHERE \"o.tags_0\".\"order_id\" = \"o_0\".\"id\")"
        ),
        "SQL: {}",
        sql
    );
}

#[test]
fn test_sub_query_keeps_its_own_from_clause() {
    let sql = single_sql(
        "select a.name from Account a where a.id in (select f.id from Fund f where f.name = 'x')",
    );
    assert!(
        sql.contains(
            "\"a_0\".\"id\" IN (SELECT \"f_0\".\"id\" FROM \"funds\" AS \"f_0\" \
             WHERE \"f_0\".\"name\" = 'x')"
        ),
        "SQL: {}",
        sql
    );
}

// ============================================================================
// Polymorphism
// ============================================================================

#[test]
fn test_polymorphic_query_yields_statement_per_implementor() {
    let ast = lower("select x.name from com.example.Auditable x where x.createdBy = :user");
    let statements = ast.sql_statements();
    assert_eq!(
        statements,
        vec![
            "SELECT \"x_0\".\"name\" FROM \"accounts\" AS \"x_0\" WHERE \"x_0\".\"created_by\" = ?",
            "SELECT \"x_0\".\"name\" FROM \"funds\" AS \"x_0\" WHERE \"x_0\".\"created_by\" = ?",
        ]
    );
    statements.iter().for_each(|sql| assert_valid(sql));
}

// ============================================================================
// Update / delete
// ============================================================================

#[test]
fn test_update_single_table() {
    let sql = single_sql("update Order o set o.total = o.total * 2 where o.id = :id");
    assert_eq!(
        sql,
        "UPDATE \"orders\" SET \"total\" = \"orders\".\"total\" * 2 WHERE \"orders\".\"id\" = ?"
    );
}

#[test]
fn test_delete_with_unqualified_attribute() {
    let sql = single_sql("delete from Tag where label like 'tmp%'");
    assert_eq!(sql, "DELETE FROM \"tags\" WHERE \"tags\".\"label\" LIKE 'tmp%'");
}

#[test]
fn test_update_spanning_tables_unsupported() {
    let result = compile(
        "update SavingsAccount s set s.rate = 0.5",
        &common::model(),
        &ConverterOptions::default(),
    );
    assert!(
        matches!(
            result,
            Err(CompileError::Conversion(ConversionError::Unsupported(_)))
        ),
        "got {:?}",
        result
    );
}

#[test]
fn test_delete_needing_join_unsupported() {
    let result = compile(
        "delete from Order o where o.customer.name = 'x'",
        &common::model(),
        &ConverterOptions::default(),
    );
    assert!(
        matches!(
            result,
            Err(CompileError::Conversion(ConversionError::Unsupported(_)))
        ),
        "got {:?}",
        result
    );
}
