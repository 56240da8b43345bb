//! Phase 1: the from-clause indexer.
//!
//! Walks the parse tree once, in document order, and registers every
//! from-clause, space and from-element in the [`FromClauseIndex`] held by the
//! [`ParsingContext`]. Nothing outside from-clauses is resolved here; the
//! query builder does that on its own walk afterwards.
//!
//! [`FromClauseIndex`]: super::from_clause::FromClauseIndex

use crate::metadata::{EntityReference, TypeDescriptor};
use crate::parse::{self, Spanned};

use super::context::ParsingContext;
use super::error::{SemanticError, SemanticResult};
use super::from_clause::{FromClauseId, FromElement, FromElementOrigin};

/// Index every from-clause of `statement` into `context`.
pub fn index_statement(statement: &parse::Statement, context: &mut ParsingContext<'_>) -> SemanticResult<()> {
    let mut indexer = FromClauseIndexer { context };
    match statement {
        parse::Statement::Select(select) => {
            indexer.index_query_spec(&select.query, None)?;
        }
        parse::Statement::Update(update) => {
            let clause = indexer.index_dml_target(&update.target)?;
            if let Some(predicate) = &update.where_clause {
                indexer.index_predicate(predicate, clause)?;
            }
        }
        parse::Statement::Delete(delete) => {
            let clause = indexer.index_dml_target(&delete.target)?;
            if let Some(predicate) = &delete.where_clause {
                indexer.index_predicate(predicate, clause)?;
            }
        }
    }

    tracing::debug!(
        elements = indexer.context.from_clause_index().element_count(),
        "from-clause indexing complete"
    );
    Ok(())
}

struct FromClauseIndexer<'a, 'm> {
    context: &'a mut ParsingContext<'m>,
}

impl FromClauseIndexer<'_, '_> {
    fn index_query_spec(
        &mut self,
        spec: &Spanned<parse::QuerySpec>,
        parent: Option<FromClauseId>,
    ) -> SemanticResult<FromClauseId> {
        let clause = self
            .context
            .from_clause_index_mut()
            .create_clause(parent, spec.from.span.clone());

        for space in &spec.from.spaces {
            let space_index = self.context.from_clause_index_mut().add_space(clause)?;

            let root = &space.root;
            let entity = self.resolve_entity(&root.entity_name.value)?;
            self.register(
                root.alias.as_ref(),
                entity,
                FromElementOrigin::Root,
                clause,
                space_index,
                root.span.clone(),
            )?;

            for join in &space.joins {
                self.index_join(join, clause, space_index)?;
                if let Some(predicate) = &join.predicate {
                    self.index_predicate(predicate, clause)?;
                }
            }
        }

        if let Some(predicate) = &spec.where_clause {
            self.index_predicate(predicate, clause)?;
        }
        Ok(clause)
    }

    /// Update and delete targets form a single-element root clause.
    fn index_dml_target(&mut self, target: &Spanned<parse::RootRef>) -> SemanticResult<FromClauseId> {
        let index = self.context.from_clause_index_mut();
        let clause = index.create_clause(None, target.span.clone());
        let space = index.add_space(clause)?;
        let entity = self.resolve_entity(&target.entity_name.value)?;
        self.register(
            target.alias.as_ref(),
            entity,
            FromElementOrigin::Root,
            clause,
            space,
            target.span.clone(),
        )?;
        Ok(clause)
    }

    fn index_join(
        &mut self,
        join: &Spanned<parse::Join>,
        clause: FromClauseId,
        space: usize,
    ) -> SemanticResult<()> {
        let path = &join.target.value;
        if !path.is_simple() {
            return Err(SemanticError::illegal(format!(
                "index operator in join path '{}'",
                path.dotted()
            )));
        }

        let lhs = path
            .parts
            .first()
            .filter(|_| path.parts.len() > 1)
            .and_then(|first| {
                self.context
                    .from_clause_index()
                    .find_visible_alias(clause, &first.name.value)
            })
            .cloned();

        let (entity, origin) = match lhs {
            Some(lhs) => {
                let attribute_path: Vec<String> =
                    path.parts[1..].iter().map(|p| p.name.value.clone()).collect();
                let (entity, collection) = self.resolve_association(&lhs.entity, &attribute_path)?;
                (
                    entity,
                    FromElementOrigin::AttributeJoin {
                        lhs_alias: lhs.alias,
                        attribute_path,
                        collection,
                    },
                )
            }
            None => (self.resolve_entity(&path.dotted())?, FromElementOrigin::EntityJoin),
        };

        self.register(join.alias.as_ref(), entity, origin, clause, space, join.span.clone())?;
        Ok(())
    }

    /// Follow an association path from `owner`: intermediate segments must be
    /// to-one associations, the last a to-one association or a collection of
    /// entities. Returns the target entity and whether the last hop is plural.
    fn resolve_association(
        &self,
        owner: &EntityReference,
        attribute_path: &[String],
    ) -> SemanticResult<(EntityReference, bool)> {
        let mut current = owner.clone();
        let mut collection = false;

        for (position, attribute) in attribute_path.iter().enumerate() {
            let ty = current
                .attribute(attribute)
                .ok_or_else(|| SemanticError::unresolved_attribute(attribute, Some(current.name())))?
                .clone();
            let last = position + 1 == attribute_path.len();

            let target_name = match &ty {
                TypeDescriptor::Entity { name } => name.clone(),
                TypeDescriptor::Collection { collection: c } if last => {
                    collection = true;
                    c.element.entity_name().map(str::to_string).ok_or_else(|| {
                        SemanticError::illegal(format!(
                            "cannot join collection of basic values '{}'",
                            attribute
                        ))
                    })?
                }
                TypeDescriptor::Collection { .. } => {
                    return Err(SemanticError::illegal(format!(
                        "cannot dereference plural attribute '{}' in a join path",
                        attribute
                    )))
                }
                TypeDescriptor::Basic { .. } => {
                    return Err(SemanticError::illegal(format!(
                        "cannot join basic attribute '{}'",
                        attribute
                    )))
                }
            };
            current = self.resolve_entity(&target_name)?;
        }

        Ok((current, collection))
    }

    /// Only sub-queries matter inside predicates.
    fn index_predicate(&mut self, predicate: &Spanned<parse::Predicate>, clause: FromClauseId) -> SemanticResult<()> {
        match &predicate.value {
            parse::Predicate::And(left, right) | parse::Predicate::Or(left, right) => {
                self.index_predicate(left, clause)?;
                self.index_predicate(right, clause)
            }
            parse::Predicate::Not(inner) => self.index_predicate(inner, clause),
            parse::Predicate::InSubQuery { sub_query, .. } => {
                self.index_query_spec(sub_query, Some(clause))?;
                Ok(())
            }
            parse::Predicate::Comparison { .. }
            | parse::Predicate::InList { .. }
            | parse::Predicate::MemberOf { .. }
            | parse::Predicate::IsNull { .. }
            | parse::Predicate::Like { .. }
            | parse::Predicate::Between { .. } => Ok(()),
        }
    }

    fn resolve_entity(&self, name: &str) -> SemanticResult<EntityReference> {
        self.context
            .metadata()
            .resolve_entity_reference(name)
            .ok_or_else(|| SemanticError::UnresolvedType(name.to_string()))
    }

    fn register(
        &mut self,
        alias: Option<&Spanned<String>>,
        entity: EntityReference,
        origin: FromElementOrigin,
        clause: FromClauseId,
        space: usize,
        span: parse::Span,
    ) -> SemanticResult<()> {
        let (alias, alias_generated) = match alias {
            Some(alias) => (alias.value.clone(), false),
            None => (self.context.alias_generator().next_alias(), true),
        };
        let element = FromElement {
            alias,
            alias_generated,
            entity,
            origin,
            clause,
            space,
        };
        self.context.from_clause_index_mut().register(element, span)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityDefinition, InMemoryMetadata};

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::builder()
            .entity(
                EntityDefinition::new("Customer")
                    .table("customers")
                    .attribute("id", "long")
                    .attribute("name", "string"),
            )
            .entity(
                EntityDefinition::new("LineItem")
                    .table("line_items")
                    .attribute("id", "long")
                    .attribute("sku", "string"),
            )
            .entity(
                EntityDefinition::new("Order")
                    .table("orders")
                    .attribute("id", "long")
                    .attribute("customer", "Customer")
                    .collection("items", "list<LineItem>", "order_id", Some("position")),
            )
            .build()
            .expect("valid model")
    }

    fn index(source: &str, metadata: &InMemoryMetadata) -> SemanticResult<Vec<(String, bool, String)>> {
        let statement = parse::parse(source).into_result().expect("query parses");
        let mut context = ParsingContext::new(metadata);
        index_statement(&statement, &mut context)?;
        Ok(context
            .from_clause_index()
            .elements()
            .map(|e| (e.alias.clone(), e.alias_generated, e.entity.name().to_string()))
            .collect())
    }

    #[test]
    fn test_generated_aliases_in_document_order() {
        let metadata = metadata();
        let elements = index("from Order join Customer where id in (from LineItem)", &metadata)
            .expect("indexes");
        assert_eq!(
            elements,
            vec![
                ("<gen:0>".to_string(), true, "Order".to_string()),
                ("<gen:1>".to_string(), true, "Customer".to_string()),
                ("<gen:2>".to_string(), true, "LineItem".to_string()),
            ]
        );
    }

    #[test]
    fn test_attribute_join_origin() {
        let metadata = metadata();
        let statement = parse::parse("select o from Order o join o.items i left join o.customer c")
            .into_result()
            .expect("parses");
        let mut context = ParsingContext::new(&metadata);
        index_statement(&statement, &mut context).expect("indexes");

        let index = context.from_clause_index();
        let items = index.find_by_alias("i").expect("i registered");
        assert_eq!(items.entity.name(), "LineItem");
        assert_eq!(
            items.origin,
            FromElementOrigin::AttributeJoin {
                lhs_alias: "o".into(),
                attribute_path: vec!["items".into()],
                collection: true,
            }
        );

        let customer = index.find_by_alias("c").expect("c registered");
        assert!(matches!(
            customer.origin,
            FromElementOrigin::AttributeJoin { collection: false, .. }
        ));
        assert_eq!(customer.space, items.space);
    }

    #[test]
    fn test_sub_query_clause_is_child() {
        let metadata = metadata();
        let statement = parse::parse("from Order o where o.id in (select l.id from LineItem l)")
            .into_result()
            .expect("parses");
        let mut context = ParsingContext::new(&metadata);
        index_statement(&statement, &mut context).expect("indexes");

        let index = context.from_clause_index();
        let outer = index.find_by_alias("o").expect("o").clause;
        let inner = index.find_by_alias("l").expect("l").clause;
        assert_eq!(index.clause(inner).and_then(|c| c.parent), Some(outer));
        assert_eq!(index.clause(outer).map(|c| c.children.clone()), Some(vec![inner]));
    }

    #[test]
    fn test_duplicate_alias_in_sub_query() {
        let metadata = metadata();
        let err = index("from Order o where o.id in (select o.id from LineItem o)", &metadata)
            .expect_err("alias reused");
        assert_eq!(err, SemanticError::DuplicateAlias { alias: "o".into() });
    }

    #[test]
    fn test_unknown_entity() {
        let metadata = metadata();
        let err = index("from Invoice i", &metadata).expect_err("unknown entity");
        assert_eq!(err, SemanticError::UnresolvedType("Invoice".into()));
    }

    #[test]
    fn test_join_through_basic_attribute() {
        let metadata = metadata();
        let err = index("from Customer c join c.name n", &metadata).expect_err("basic join");
        assert!(matches!(err, SemanticError::IllegalOperatorUse(_)));

        let err = index("from Order o join o.missing m", &metadata).expect_err("unknown attribute");
        assert!(matches!(err, SemanticError::UnresolvedAttribute { .. }));
    }

    #[test]
    fn test_update_target_registered() {
        let metadata = metadata();
        let elements = index("update Customer set name = 'x'", &metadata).expect("indexes");
        assert_eq!(elements, vec![("<gen:0>".to_string(), true, "Customer".to_string())]);
    }
}
