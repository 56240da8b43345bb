//! Semantic analysis over the fixture model: alias registration, path
//! resolution and the errors raised while building the tree.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use orql::compile::{interpret, CompileError};
use orql::metadata::{BasicType, TypeDescriptor};
use orql::semantic::from_clause::FromElementOrigin;
use orql::semantic::split;
use orql::semantic::tree::{Expression, JoinKind, Predicate, SortOrder, Statement};
use orql::semantic::SemanticErrorKind;

fn select(query: &str) -> orql::semantic::tree::SelectStatement {
    match interpret(query, &common::model()).expect("query interprets") {
        Statement::Select(select) => select,
        other => panic!("expected select, got {:?}", other),
    }
}

fn semantic_error(query: &str) -> SemanticErrorKind {
    match interpret(query, &common::model()) {
        Err(CompileError::Semantic(e)) => e.kind(),
        other => panic!("expected semantic error for '{}', got {:?}", query, other),
    }
}

// ============================================================================
// Aliases and from-elements
// ============================================================================

#[test]
fn test_generated_aliases_follow_document_order() {
    let select = select("from Account, Fund f, Customer");
    let roots: Vec<(&str, bool)> = select
        .query
        .from_clause
        .spaces
        .iter()
        .map(|space| (space.root.alias.as_str(), space.root.alias_generated))
        .collect();
    assert_eq!(
        roots,
        vec![("<gen:0>", true), ("f", false), ("<gen:1>", true)]
    );
}

#[test]
fn test_attribute_join_records_its_origin() {
    let select = select("from Order o join o.items i left join o.customer c");
    let joins = &select.query.from_clause.spaces[0].joins;
    assert_eq!(joins.len(), 2);

    assert_eq!(joins[0].kind, JoinKind::Inner);
    assert_eq!(joins[0].target.entity.name(), "LineItem");
    assert_eq!(
        joins[0].target.origin,
        FromElementOrigin::AttributeJoin {
            lhs_alias: "o".to_string(),
            attribute_path: vec!["items".to_string()],
            collection: true,
        }
    );

    assert_eq!(joins[1].kind, JoinKind::LeftOuter);
    assert_eq!(joins[1].target.entity.name(), "Customer");
    assert!(matches!(
        joins[1].target.origin,
        FromElementOrigin::AttributeJoin {
            collection: false,
            ..
        }
    ));
}

#[test]
fn test_entity_join_keeps_predicate() {
    let select = select("from Account a join Fund f on f.owner = a.owner");
    let join = &select.query.from_clause.spaces[0].joins[0];
    assert_eq!(join.target.origin, FromElementOrigin::EntityJoin);
    assert!(matches!(join.predicate, Some(Predicate::Comparison { .. })));
}

#[test]
fn test_missing_select_clause_selects_space_roots() {
    let select = select("from Account a, Fund f");
    let selected: Vec<&str> = select
        .query
        .select_clause
        .selections
        .iter()
        .map(|s| match &s.expression {
            Expression::FromElement { alias, .. } => alias.as_str(),
            other => panic!("expected from-element, got {:?}", other),
        })
        .collect();
    assert_eq!(selected, vec!["a", "f"]);
}

#[test]
fn test_duplicate_alias_rejected() {
    assert_eq!(
        semantic_error("from Account a, Fund a"),
        SemanticErrorKind::DuplicateAlias
    );
}

#[test]
fn test_sub_query_cannot_reuse_outer_alias() {
    assert_eq!(
        semantic_error("from Account a where a.id in (select a.id from Fund a)"),
        SemanticErrorKind::DuplicateAlias
    );
}

#[test]
fn test_unknown_entity() {
    assert_eq!(semantic_error("from Ledger l"), SemanticErrorKind::UnresolvedType);
}

#[test]
fn test_cross_join_with_predicate_rejected() {
    assert_eq!(
        semantic_error("from Account a cross join Fund f on f.id = a.id"),
        SemanticErrorKind::IllegalOperatorUse
    );
}

#[test]
fn test_cross_join_through_association_rejected() {
    assert_eq!(
        semantic_error("from Order o cross join o.items i"),
        SemanticErrorKind::IllegalOperatorUse
    );
}

#[test]
fn test_sub_query_alias_not_visible_outside() {
    assert_eq!(
        semantic_error("from Order o where o.id in (select l.id from LineItem l) and l.quantity = 1"),
        SemanticErrorKind::UnresolvedAttribute
    );
    assert_eq!(
        semantic_error(
            "from Order o where o.id in (select l.id from LineItem l) \
             and o.id in (select t.id from Tag t where t.id = l.id)"
        ),
        SemanticErrorKind::UnresolvedAttribute
    );
}

#[test]
fn test_sub_query_sees_outer_alias() {
    let select = select("from Order o where o.id in (select l.id from LineItem l where l.id = o.id)");
    assert!(matches!(
        select.query.where_clause,
        Some(Predicate::InSubQuery { .. })
    ));
}

#[test]
fn test_keyword_named_entity_in_delete() {
    match interpret("delete Order o where o.id = 1", &common::model()).expect("delete interprets") {
        Statement::Delete(delete) => assert_eq!(delete.target.entity.name(), "Order"),
        other => panic!("expected delete, got {:?}", other),
    }
}

// ============================================================================
// Path resolution
// ============================================================================

#[test]
fn test_dereference_path_types() {
    let select = select("select o.customer.name from Order o");
    let Expression::Attribute(attribute) = &select.query.select_clause.selections[0].expression
    else {
        panic!("expected attribute reference");
    };

    assert_eq!(attribute.source_alias, "o");
    assert_eq!(attribute.dotted(), "o.customer.name");
    assert_eq!(attribute.segments.len(), 2);
    assert_eq!(attribute.segments[0].ty, TypeDescriptor::entity("Customer"));
    assert_eq!(attribute.ty, TypeDescriptor::basic(BasicType::String));
}

#[test]
fn test_index_access_yields_element_type() {
    let select = select("from Order o where o.items[0].quantity > 2");
    let Some(Predicate::Comparison { left, .. }) = &select.query.where_clause else {
        panic!("expected comparison");
    };
    let Expression::Attribute(attribute) = left else {
        panic!("expected attribute reference");
    };

    let items = &attribute.segments[0];
    assert!(items.index.is_some());
    assert!(items.attribute_ty.is_plural());
    assert_eq!(items.ty, TypeDescriptor::entity("LineItem"));
    assert_eq!(attribute.ty, TypeDescriptor::basic(BasicType::Integer));
}

#[test]
fn test_unqualified_attribute_resolves_to_unique_owner() {
    let select = select("from Account a, Order o where balance > 10");
    let Some(Predicate::Comparison { left, .. }) = &select.query.where_clause else {
        panic!("expected comparison");
    };
    match left {
        Expression::Attribute(attribute) => assert_eq!(attribute.source_alias, "a"),
        other => panic!("expected attribute reference, got {:?}", other),
    }
}

#[test]
fn test_unqualified_attribute_ambiguous() {
    assert_eq!(
        semantic_error("from Account a, Fund f where name = 'x'"),
        SemanticErrorKind::AmbiguousAttribute
    );
}

#[test]
fn test_unknown_attribute() {
    assert_eq!(
        semantic_error("from Account a where a.colour = 'red'"),
        SemanticErrorKind::UnresolvedAttribute
    );
    assert_eq!(
        semantic_error("from Account a where colour = 'red'"),
        SemanticErrorKind::UnresolvedAttribute
    );
}

#[test]
fn test_index_on_unindexed_collection() {
    assert_eq!(
        semantic_error("from Order o where o.tags[0].label = 'x'"),
        SemanticErrorKind::IllegalOperatorUse
    );
}

#[test]
fn test_dereference_through_collection_without_index() {
    assert_eq!(
        semantic_error("from Order o where o.items.quantity = 1"),
        SemanticErrorKind::IllegalOperatorUse
    );
}

#[test]
fn test_member_of_requires_collection() {
    assert_eq!(
        semantic_error("from Order o where :c member of o.customer"),
        SemanticErrorKind::IllegalOperatorUse
    );
}

#[test]
fn test_arithmetic_on_strings_rejected() {
    assert_eq!(
        semantic_error("from Account a where a.name + 1 > 2"),
        SemanticErrorKind::IllegalOperatorUse
    );
}

#[test]
fn test_unknown_function_rejected() {
    assert_eq!(
        semantic_error("select median(a.balance) from Account a"),
        SemanticErrorKind::IllegalOperatorUse
    );
}

#[test]
fn test_order_by_directions() {
    let select = select("from Account a order by a.name desc, a.id");
    let orders: Vec<SortOrder> = select
        .order_by
        .sort_specs
        .iter()
        .map(|s| s.order)
        .collect();
    assert_eq!(orders, vec![SortOrder::Descending, SortOrder::Ascending]);
}

// ============================================================================
// Update / delete
// ============================================================================

#[test]
fn test_update_assignments() {
    let statement =
        interpret("update Account a set a.name = 'x', a.balance = 0", &common::model()).unwrap();
    let Statement::Update(update) = statement else {
        panic!("expected update");
    };
    let targets: Vec<String> = update
        .assignments
        .iter()
        .map(|a| a.target.dotted())
        .collect();
    assert_eq!(targets, vec!["a.name", "a.balance"]);
}

#[test]
fn test_update_cannot_assign_association() {
    assert_eq!(
        semantic_error("update Account a set a.owner = null"),
        SemanticErrorKind::IllegalOperatorUse
    );
}

#[test]
fn test_delete_with_generated_alias() {
    let statement = interpret("delete from Account where id = 3", &common::model()).unwrap();
    let root = statement.root_element().expect("delete has a target");
    assert_eq!(root.alias, "<gen:0>");
    assert!(root.alias_generated);
}

// ============================================================================
// Polymorphism
// ============================================================================

#[test]
fn test_polymorphic_root_exposes_common_attributes_only() {
    let statement = interpret(
        "from com.example.Auditable x where x.createdBy = 'ops'",
        &common::model(),
    )
    .unwrap();
    assert!(statement
        .root_element()
        .is_some_and(|root| root.entity.is_polymorphic()));

    assert_eq!(
        semantic_error("from com.example.Auditable x where x.balance > 0"),
        SemanticErrorKind::UnresolvedAttribute
    );
}

#[test]
fn test_split_narrows_each_implementor() {
    let statement = Arc::new(
        interpret(
            "select x.name from com.example.Auditable x where x.createdBy = :user",
            &common::model(),
        )
        .unwrap(),
    );
    let trees = split(Arc::clone(&statement));

    let roots: Vec<&str> = trees
        .iter()
        .filter_map(|tree| tree.root_element())
        .map(|root| root.entity.name())
        .collect();
    assert_eq!(roots, vec!["Account", "Fund"]);
    assert!(trees
        .iter()
        .all(|tree| tree.root_element().is_some_and(|r| !r.entity.is_polymorphic())));
}

#[test]
fn test_split_is_identity_for_concrete_root() {
    let statement = Arc::new(interpret("from Account a", &common::model()).unwrap());
    let trees = split(Arc::clone(&statement));
    assert_eq!(trees.len(), 1);
    assert!(Arc::ptr_eq(&trees[0], &statement));
}
