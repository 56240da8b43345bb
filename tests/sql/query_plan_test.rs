//! Query plans: SQL text plus the parameter bound at each placeholder.

#[path = "../common/mod.rs"]
mod common;

use orql::compile::compile;
use orql::metadata::{BasicType, TypeDescriptor};
use orql::semantic::tree::ParameterKind;
use orql::sql::{ConverterOptions, QueryPlan};

fn plans(query: &str) -> Vec<QueryPlan> {
    compile(query, &common::model(), &ConverterOptions::default())
        .expect("query compiles")
        .query_plans()
}

fn binder_names(plan: &QueryPlan) -> Vec<String> {
    plan.binders.iter().map(|b| b.parameter.to_string()).collect()
}

#[test]
fn test_binders_follow_placeholder_order() {
    let plans = plans(
        "select a.name from Account a where a.name = ?1 and a.balance between :lo and :hi",
    );
    let plan = &plans[0];

    assert_eq!(plan.sql.matches('?').count(), 3);
    assert_eq!(binder_names(plan), vec!["?1", ":lo", ":hi"]);
    let positions: Vec<usize> = plan.binders.iter().map(|b| b.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[test]
fn test_placeholders_are_anonymous() {
    let plans = plans("from Account a where a.id = :id");
    assert!(plans[0].sql.ends_with("WHERE \"a_0\".\"id\" = ?"));
    assert!(!plans[0].sql.contains(":id"));
}

#[test]
fn test_repeated_parameter_binds_each_occurrence() {
    let plans = plans("from Account a where a.id = :id or a.id > :id");
    assert_eq!(binder_names(&plans[0]), vec![":id", ":id"]);
    assert_eq!(plans[0].binders[1].position, 2);
}

#[test]
fn test_binder_carries_inferred_type() {
    let plans = plans("from Order o where o.items[:i].quantity = :qty");
    let plan = &plans[0];
    assert_eq!(binder_names(plan), vec![":i", ":qty"]);
    assert_eq!(plan.binders[0].ty, Some(TypeDescriptor::basic(BasicType::Integer)));
    assert_eq!(plan.binders[1].ty, Some(TypeDescriptor::basic(BasicType::Integer)));
}

#[test]
fn test_unresolved_parameter_has_no_type() {
    let plans = plans("select :label from Account a");
    assert_eq!(plans[0].binders.len(), 1);
    assert_eq!(plans[0].binders[0].ty, None);
}

#[test]
fn test_polymorphic_plans_each_bind() {
    let plans = plans("from com.example.Auditable x where x.createdBy = :user");
    assert_eq!(plans.len(), 2);
    for plan in &plans {
        assert_eq!(binder_names(plan), vec![":user"]);
        assert_eq!(plan.binders[0].position, 1);
    }
}

#[test]
fn test_parameter_bindings_are_distinct() {
    let ast = compile(
        "from com.example.Auditable x where x.createdBy = :user or x.name = :user or x.name = :name",
        &common::model(),
        &ConverterOptions::default(),
    )
    .unwrap();
    let kinds: Vec<ParameterKind> = ast
        .parameter_bindings()
        .into_iter()
        .map(|p| p.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ParameterKind::Named("user".into()),
            ParameterKind::Named("name".into()),
        ]
    );
}

#[test]
fn test_plan_serializes_to_json() {
    let plans = plans("update Customer c set c.name = :name where c.id = :id");
    let json = serde_json::to_value(&plans).unwrap();

    assert_eq!(
        json[0]["sql"],
        "UPDATE \"customers\" SET \"name\" = ? WHERE \"customers\".\"id\" = ?"
    );
    assert_eq!(json[0]["binders"][0]["parameter"], ":name");
    assert_eq!(json[0]["binders"][0]["position"], 1);
    assert_eq!(json[0]["binders"][1]["parameter"], ":id");
    assert_eq!(json[0]["binders"][1]["position"], 2);
}
