//! Parameter type inference.

#[path = "../common/mod.rs"]
mod common;

use orql::compile::{interpret, CompileError};
use orql::metadata::{BasicType, TypeDescriptor};
use orql::semantic::tree::{ParameterKind, ParameterType};
use orql::semantic::SemanticErrorKind;

/// Parameter kinds and types, distinct, in first-occurrence order.
fn parameters(query: &str) -> Vec<(String, ParameterType)> {
    let statement = interpret(query, &common::model()).expect("query interprets");
    statement
        .parameters()
        .into_iter()
        .map(|p| (p.kind.to_string(), p.ty.clone()))
        .collect()
}

fn basic(ty: BasicType) -> ParameterType {
    ParameterType::Resolved(TypeDescriptor::basic(ty))
}

#[test]
fn test_comparison_takes_other_side() {
    assert_eq!(
        parameters("from Account a where a.id = :id"),
        vec![(":id".to_string(), basic(BasicType::Long))]
    );
    assert_eq!(
        parameters("from Account a where :name <> a.name"),
        vec![(":name".to_string(), basic(BasicType::String))]
    );
}

#[test]
fn test_like_and_between() {
    assert_eq!(
        parameters("from Account a where a.name like :pattern and a.balance between :lo and :hi"),
        vec![
            (":pattern".to_string(), basic(BasicType::String)),
            (":lo".to_string(), basic(BasicType::Decimal)),
            (":hi".to_string(), basic(BasicType::Decimal)),
        ]
    );
}

#[test]
fn test_in_list_and_sub_query() {
    assert_eq!(
        parameters("from Account a where a.id in (:first, 2, 3)"),
        vec![(":first".to_string(), basic(BasicType::Long))]
    );
    assert_eq!(
        parameters("from Account a where :owner in (select c.id from Customer c)"),
        vec![(":owner".to_string(), basic(BasicType::Long))]
    );
}

#[test]
fn test_member_of_takes_element_type() {
    assert_eq!(
        parameters("from Order o where :item member of o.items"),
        vec![(
            ":item".to_string(),
            ParameterType::Resolved(TypeDescriptor::entity("LineItem"))
        )]
    );
}

#[test]
fn test_index_takes_index_type() {
    assert_eq!(
        parameters("from Order o where o.items[:i].quantity = 1"),
        vec![(":i".to_string(), basic(BasicType::Integer))]
    );
}

#[test]
fn test_arithmetic_operand() {
    assert_eq!(
        parameters("from Account a where a.balance + :delta > 100"),
        vec![(":delta".to_string(), basic(BasicType::Decimal))]
    );
}

#[test]
fn test_update_assignment_takes_target_type() {
    assert_eq!(
        parameters("update Account a set a.name = :name where a.id = :id"),
        vec![
            (":name".to_string(), basic(BasicType::String)),
            (":id".to_string(), basic(BasicType::Long)),
        ]
    );
}

#[test]
fn test_type_propagates_to_every_occurrence() {
    let statement = interpret(
        "from Account a where :id is null or a.id = :id",
        &common::model(),
    )
    .unwrap();

    let mut occurrences = Vec::new();
    statement.visit_expressions(&mut |expr| {
        if let orql::semantic::tree::Expression::Parameter(p) = expr {
            occurrences.push(p.ty.clone());
        }
    });
    assert_eq!(occurrences.len(), 2);
    assert!(occurrences.iter().all(|ty| *ty == basic(BasicType::Long)));
}

#[test]
fn test_untyped_parameter_stays_unresolved() {
    assert_eq!(
        parameters("select :tag from Account a"),
        vec![(":tag".to_string(), ParameterType::Unresolved)]
    );
}

#[test]
fn test_bare_positional_parameters_numbered_by_occurrence() {
    let statement = interpret(
        "from Account a where a.id = ? and a.name = ?",
        &common::model(),
    )
    .unwrap();
    let kinds: Vec<ParameterKind> = statement
        .parameters()
        .into_iter()
        .map(|p| p.kind.clone())
        .collect();
    assert_eq!(
        kinds,
        vec![ParameterKind::Positional(1), ParameterKind::Positional(2)]
    );
}

#[test]
fn test_bare_and_ordinal_positional_parameters_cannot_mix() {
    for query in [
        "from Account a where a.id = ? and a.balance = ?1",
        "from Account a where a.id = ?1 and a.balance = ?",
    ] {
        match interpret(query, &common::model()) {
            Err(CompileError::Semantic(e)) => {
                assert_eq!(e.kind(), SemanticErrorKind::IllegalOperatorUse, "{}", query)
            }
            other => panic!("expected semantic error for '{}', got {:?}", query, other),
        }
    }
}
