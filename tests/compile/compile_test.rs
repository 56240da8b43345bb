//! End-to-end compilation against a model loaded from disk.

use std::path::PathBuf;

use orql::compile::{compile, CompileError};
use orql::config::Settings;
use orql::metadata::{InMemoryMetadata, MetadataError, MetadataProvider};
use orql::semantic::SemanticErrorKind;
use orql::sql::{ConversionError, ConverterOptions, SecondaryTableJoinPolicy};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn shop() -> InMemoryMetadata {
    InMemoryMetadata::load(&fixture("shop.toml")).expect("shop model loads")
}

fn compile_one(query: &str, options: &ConverterOptions) -> String {
    let ast = compile(query, &shop(), options).expect("query compiles");
    assert_eq!(ast.statements.len(), 1);
    ast.sql_statements().remove(0)
}

#[test]
fn test_model_file_loads() {
    let metadata = shop();
    let mut names: Vec<&str> = metadata.entities().map(|e| e.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["Customer", "GiftOrder", "Order", "OrderLine"]);

    let shape = metadata.table_shape("GiftOrder").expect("gift orders are mapped");
    let tables: Vec<&str> = shape.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tables, vec!["orders", "gift_orders", "gift_wrapping"]);
}

#[test]
fn test_unknown_model_format_rejected() {
    let result = InMemoryMetadata::load(&fixture("shop.yaml"));
    assert!(result.is_err());
}

#[test]
fn test_end_to_end_select() {
    let sql = compile_one(
        "select l.sku, l.quantity from Order o join o.lines l \
         where o.customer.name = :name and o.placed > :since order by l.quantity desc",
        &ConverterOptions::default(),
    );
    assert_eq!(
        sql,
        "SELECT \"l_0\".\"sku\", \"l_0\".\"quantity\" FROM \"orders\" AS \"o_0\" \
         INNER JOIN \"order_lines\" AS \"l_0\" ON \"o_0\".\"id\" = \"l_0\".\"order_id\" \
         INNER JOIN \"customers\" AS \"o.customer_0\" ON \"o_0\".\"customer_id\" = \"o.customer_0\".\"id\" \
         WHERE \"o.customer_0\".\"name\" = ? AND \"o_0\".\"placed\" > ? \
         ORDER BY \"l_0\".\"quantity\" DESC"
    );
}

#[test]
fn test_aggregate_select() {
    let sql = compile_one(
        "select count(*), max(l.quantity) from OrderLine l",
        &ConverterOptions::default(),
    );
    assert_eq!(
        sql,
        "SELECT COUNT(*), MAX(\"l_0\".\"quantity\") FROM \"order_lines\" AS \"l_0\""
    );
}

#[test]
fn test_settings_choose_secondary_join_policy() {
    let settings = Settings::from_toml_str("[sql]\nsecondary_table_join = \"mapped\"").unwrap();
    let options = settings.converter_options();
    assert_eq!(options.secondary_table_join, SecondaryTableJoinPolicy::Mapped);

    let sql = compile_one("select g.message from GiftOrder g", &options);
    assert!(
        sql.contains("INNER JOIN \"gift_orders\" AS \"g_1\""),
        "SQL: {}",
        sql
    );
    assert!(
        sql.contains("LEFT OUTER JOIN \"gift_wrapping\" AS \"g_2\""),
        "SQL: {}",
        sql
    );

    let outer = compile_one("select g.message from GiftOrder g", &ConverterOptions::default());
    // The subtype table is never outer joined: a plain order is not a gift order
    assert!(outer.contains("INNER JOIN \"gift_orders\" AS \"g_1\""), "SQL: {}", outer);
    assert!(outer.contains("LEFT OUTER JOIN \"gift_wrapping\" AS \"g_2\""), "SQL: {}", outer);
}

#[test]
fn test_syntax_error_reports_diagnostics() {
    let err = compile(
        "from Order o where",
        &shop(),
        &ConverterOptions::default(),
    )
    .unwrap_err();
    let CompileError::Syntax(diagnostics) = &err else {
        panic!("expected syntax error, got {:?}", err);
    };
    assert!(!diagnostics.is_empty());
    assert!(err.to_string().starts_with("Syntax error: "));
}

#[test]
fn test_semantic_error_family() {
    let err = compile(
        "from Order o where o.lines.sku = 'x'",
        &shop(),
        &ConverterOptions::default(),
    )
    .unwrap_err();
    match &err {
        CompileError::Semantic(e) => assert_eq!(e.kind(), SemanticErrorKind::IllegalOperatorUse),
        other => panic!("expected semantic error, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Semantic error: "));
}

#[test]
fn test_conversion_error_family() {
    let err = compile(
        "delete from GiftOrder g where g.message is null",
        &shop(),
        &ConverterOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Conversion(ConversionError::Unsupported(_))
    ));
    assert!(err.to_string().starts_with("Conversion error: "));
}

#[test]
fn test_invalid_model_rejected() {
    let result = InMemoryMetadata::from_model(
        orql::metadata::ModelFile::from_toml_str(
            r#"
[[entity]]
name = "Order"
table = "orders"

[[entity.attribute]]
name = "customer"
type = "Client"
"#,
        )
        .unwrap(),
    );
    assert!(matches!(result, Err(MetadataError::UnknownEntity { .. })));
}
