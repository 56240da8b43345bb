//! The From-Clause Index: every from-clause and from-element of a statement.
//!
//! Built by the from-clause indexer before any expression is resolved, then
//! read by the query builder. Clauses and elements live in arenas and are
//! addressed by [`FromClauseId`] / [`FromElementId`]; each also remembers the
//! span of the parse node it was created for, which is how the builder finds
//! them again on its own walk.

use std::collections::HashMap;

use crate::metadata::{EntityReference, TypeDescriptor};
use crate::parse::Span;

use super::error::{SemanticError, SemanticResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FromClauseId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FromElementId(usize);

/// How a from-element entered the from-clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FromElementOrigin {
    /// First item of a from-clause space.
    Root,
    /// `join SomeEntity e [on ...]`
    EntityJoin,
    /// `join lhs.path e`: navigates an association of `lhs_alias`.
    AttributeJoin {
        lhs_alias: String,
        attribute_path: Vec<String>,
        collection: bool,
    },
}

/// A single registered from-element. Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct FromElement {
    pub alias: String,
    pub alias_generated: bool,
    pub entity: EntityReference,
    pub origin: FromElementOrigin,
    pub clause: FromClauseId,
    /// Index of the space within its clause.
    pub space: usize,
}

impl FromElement {
    pub fn type_descriptor(&self) -> TypeDescriptor {
        self.entity.type_descriptor()
    }

    pub fn exposes(&self, attribute: &str) -> bool {
        self.entity.attribute(attribute).is_some()
    }
}

/// One from-clause scope: the root query's or a sub-query's.
#[derive(Debug, Clone, Default)]
pub struct FromClauseScope {
    pub parent: Option<FromClauseId>,
    pub children: Vec<FromClauseId>,
    /// Element ids per comma-separated space, in document order.
    pub spaces: Vec<Vec<FromElementId>>,
}

#[derive(Debug, Default)]
pub struct FromClauseIndex {
    clauses: Vec<FromClauseScope>,
    elements: Vec<FromElement>,
    by_alias: HashMap<String, FromElementId>,
    clause_by_span: HashMap<Span, FromClauseId>,
    element_by_span: HashMap<Span, FromElementId>,
}

impl FromClauseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new clause scope for the from-clause parsed at `span`.
    pub fn create_clause(&mut self, parent: Option<FromClauseId>, span: Span) -> FromClauseId {
        let id = FromClauseId(self.clauses.len());
        self.clauses.push(FromClauseScope {
            parent,
            ..Default::default()
        });
        if let Some(parent) = parent.and_then(|p| self.clauses.get_mut(p.0)) {
            parent.children.push(id);
        }
        self.clause_by_span.insert(span, id);
        id
    }

    /// Open a new space in `clause`; returns its index.
    pub fn add_space(&mut self, clause: FromClauseId) -> SemanticResult<usize> {
        let scope = self.scope_mut(clause)?;
        scope.spaces.push(Vec::new());
        Ok(scope.spaces.len() - 1)
    }

    /// Register a from-element created for the parse node at `span`.
    ///
    /// Aliases are unique across the whole statement, nested scopes
    /// included.
    pub fn register(&mut self, element: FromElement, span: Span) -> SemanticResult<FromElementId> {
        if self.by_alias.contains_key(&element.alias) {
            return Err(SemanticError::DuplicateAlias {
                alias: element.alias,
            });
        }

        let id = FromElementId(self.elements.len());
        let space = self
            .scope_mut(element.clause)?
            .spaces
            .get_mut(element.space)
            .ok_or_else(|| {
                SemanticError::ParsingContextMisuse(format!(
                    "space {} does not exist in its clause",
                    element.space
                ))
            })?;
        space.push(id);

        tracing::trace!(alias = %element.alias, entity = element.entity.name(), "registered from-element");
        self.by_alias.insert(element.alias.clone(), id);
        self.element_by_span.insert(span, id);
        self.elements.push(element);
        Ok(id)
    }

    pub fn clause(&self, id: FromClauseId) -> Option<&FromClauseScope> {
        self.clauses.get(id.0)
    }

    pub fn element(&self, id: FromElementId) -> Option<&FromElement> {
        self.elements.get(id.0)
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<&FromElement> {
        self.by_alias.get(alias).and_then(|id| self.element(*id))
    }

    /// An alias lookup that only sees elements of `clause` and its enclosing
    /// clauses. Aliases of sibling or nested sub-queries are not visible.
    pub fn find_visible_alias(&self, clause: FromClauseId, alias: &str) -> Option<&FromElement> {
        let element = self.find_by_alias(alias)?;
        let mut current = Some(clause);
        while let Some(id) = current {
            if id == element.clause {
                return Some(element);
            }
            current = self.clause(id).and_then(|scope| scope.parent);
        }
        None
    }

    pub fn clause_for_span(&self, span: &Span) -> Option<FromClauseId> {
        self.clause_by_span.get(span).copied()
    }

    pub fn element_for_span(&self, span: &Span) -> Option<&FromElement> {
        self.element_by_span
            .get(span)
            .and_then(|id| self.element(*id))
    }

    /// Elements of `clause` in document order.
    pub fn elements_of(&self, clause: FromClauseId) -> impl Iterator<Item = &FromElement> {
        self.clause(clause)
            .into_iter()
            .flat_map(|scope| scope.spaces.iter().flatten())
            .filter_map(|id| self.element(*id))
    }

    /// Find the from-element exposing an unqualified attribute.
    ///
    /// Searches `clause` first, then each enclosing clause. More than one
    /// exposing element in the first scope that has any is ambiguous.
    pub fn find_exposing(
        &self,
        clause: FromClauseId,
        attribute: &str,
    ) -> SemanticResult<Option<&FromElement>> {
        let mut current = Some(clause);
        while let Some(id) = current {
            let exposing: Vec<&FromElement> = self
                .elements_of(id)
                .filter(|e| e.exposes(attribute))
                .collect();
            match exposing.as_slice() {
                [] => current = self.clause(id).and_then(|scope| scope.parent),
                [single] => return Ok(Some(single)),
                many => {
                    return Err(SemanticError::AmbiguousAttribute {
                        attribute: attribute.to_string(),
                        aliases: many.iter().map(|e| e.alias.clone()).collect(),
                    })
                }
            }
        }
        Ok(None)
    }

    /// All elements in registration (document) order.
    pub fn elements(&self) -> impl Iterator<Item = &FromElement> {
        self.elements.iter()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    fn scope_mut(&mut self, clause: FromClauseId) -> SemanticResult<&mut FromClauseScope> {
        self.clauses.get_mut(clause.0).ok_or_else(|| {
            SemanticError::ParsingContextMisuse(format!("unknown from-clause {:?}", clause))
        })
    }
}
