//! Query splitting for polymorphic root references.
//!
//! A statement whose root from-element names a type satisfied by several
//! unrelated mapped hierarchies (an interface, say) cannot be lowered to a
//! single SQL statement. [`split`] produces one statement per implementor,
//! with the root narrowed to that implementor.

use std::sync::Arc;

use crate::metadata::{EntityReference, EntityType};

use super::tree::{AttributeReference, Expression, Statement};

/// Split a statement over its root's implementors.
///
/// A non-polymorphic root yields the input `Arc` itself as the only element
/// (`Arc::ptr_eq` holds). Otherwise the result has one statement per
/// implementor, in the implementor order of the polymorphic reference.
pub fn split(statement: Arc<Statement>) -> Vec<Arc<Statement>> {
    let (alias, implementors) = match statement.root_element() {
        Some(root) => match &root.entity {
            EntityReference::Polymorphic(poly) => (root.alias.clone(), poly.implementors.clone()),
            EntityReference::Concrete(_) => return vec![statement],
        },
        None => return vec![statement],
    };

    tracing::debug!(
        alias = %alias,
        implementors = implementors.len(),
        "splitting polymorphic statement"
    );

    implementors
        .into_iter()
        .map(|implementor| Arc::new(narrow(&statement, &alias, implementor)))
        .collect()
}

fn narrow(statement: &Statement, alias: &str, implementor: Arc<EntityType>) -> Statement {
    let mut narrowed = statement.clone();

    narrowed.visit_expressions_mut(&mut |expr| match expr {
        Expression::Attribute(attribute) if attribute.source_alias == alias => {
            retarget(attribute, &implementor);
        }
        Expression::FromElement { alias: a, ty } if *a == alias => {
            *ty = implementor.type_descriptor();
        }
        _ => {}
    });

    if let Statement::Update(update) = &mut narrowed {
        for assignment in &mut update.assignments {
            retarget(&mut assignment.target, &implementor);
        }
    }

    if let Some(root) = narrowed.root_element_mut() {
        root.entity = EntityReference::Concrete(implementor);
    }
    narrowed
}

/// Re-resolve the first segment of a root-alias path against `implementor`.
///
/// The polymorphic reference only exposes attributes common to every
/// implementor with identical types, so later segments are unchanged.
fn retarget(attribute: &mut AttributeReference, implementor: &EntityType) {
    attribute.source_type = implementor.type_descriptor();
    if let Some(first) = attribute.segments.first_mut() {
        if let Some(ty) = implementor.attribute(&first.attribute) {
            first.attribute_ty = ty.clone();
            if first.index.is_none() {
                first.ty = ty.clone();
            }
        }
    }
    if let Some(last) = attribute.segments.last() {
        attribute.ty = last.ty.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityDefinition, InMemoryMetadata};
    use crate::compile::interpret;

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::builder()
            .entity(
                EntityDefinition::new("Account")
                    .class("com.example.Account")
                    .implements("com.example.Auditable")
                    .table("accounts")
                    .attribute("id", "long")
                    .attribute("createdBy", "string"),
            )
            .entity(
                EntityDefinition::new("Fund")
                    .class("com.example.Fund")
                    .implements("com.example.Auditable")
                    .table("funds")
                    .attribute("id", "long")
                    .attribute("createdBy", "string"),
            )
            .build()
            .expect("valid model")
    }

    #[test]
    fn test_concrete_root_is_identity() {
        let metadata = metadata();
        let statement = Arc::new(interpret("from Account a where a.id = 1", &metadata).expect("interprets"));
        let result = split(Arc::clone(&statement));
        assert_eq!(result.len(), 1);
        assert!(Arc::ptr_eq(&result[0], &statement));
    }

    #[test]
    fn test_polymorphic_root_splits_in_order() {
        let metadata = metadata();
        let statement = interpret(
            "from com.example.Auditable x where x.createdBy = :user",
            &metadata,
        )
        .expect("interprets");
        let result = split(Arc::new(statement));

        let names: Vec<&str> = result
            .iter()
            .map(|s| s.root_element().map(|r| r.entity.name()).unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["Account", "Fund"]);

        // Predicate structure is kept, references are narrowed
        for (statement, expected) in result.iter().zip(["Account", "Fund"]) {
            let mut sources = Vec::new();
            statement.visit_expressions(&mut |expr| {
                if let Expression::Attribute(attr) = expr {
                    sources.push(attr.source_type.to_string());
                }
            });
            assert_eq!(sources, vec![expected.to_string()]);
            assert_eq!(statement.parameters().len(), 1);
        }
    }
}
