//! Phase 2: the semantic query builder.
//!
//! Walks the same parse tree the indexer walked and builds the
//! [`tree::Statement`] bottom-up: leaf expressions first, then the predicates
//! and selections containing them. From-elements come from the index (looked
//! up by the span of the parse node that created them); attribute paths are
//! resolved against the index and the metadata provider.

use crate::metadata::{BasicType, TypeDescriptor};
use crate::parse::{self, Spanned};

use super::context::ParsingContext;
use super::error::{SemanticError, SemanticResult};
use super::from_clause::{FromClauseId, FromElement};
use super::tree::{self, Expression, Function, Parameter, ParameterKind, ParameterType};

/// Build the semantic tree for a statement already indexed into `context`.
pub fn build_statement(statement: &parse::Statement, context: &ParsingContext<'_>) -> SemanticResult<tree::Statement> {
    let mut builder = SemanticQueryBuilder {
        context,
        next_position: 0,
        ordinal_seen: false,
    };
    let statement = builder.build(statement)?;
    tracing::debug!(parameters = statement.parameters().len(), "semantic tree built");
    Ok(statement)
}

struct SemanticQueryBuilder<'a, 'm> {
    context: &'a ParsingContext<'m>,
    /// Last position handed to a bare `?`.
    next_position: u32,
    /// An explicit `?N` was built. Bare `?` and `?N` cannot be mixed.
    ordinal_seen: bool,
}

impl SemanticQueryBuilder<'_, '_> {
    fn build(&mut self, statement: &parse::Statement) -> SemanticResult<tree::Statement> {
        match statement {
            parse::Statement::Select(select) => {
                let mut builder = tree::SelectStatementBuilder::new();
                builder.apply_query_spec(self.build_query_spec(&select.query)?)?;
                let sort_specs = select
                    .order_by
                    .iter()
                    .map(|sort| {
                        let clause = self.clause_for(&select.query.from.span)?;
                        Ok(tree::SortSpecification {
                            expression: self.build_expression(&sort.expr, clause)?,
                            order: sort.order.unwrap_or(tree::SortOrder::Ascending),
                        })
                    })
                    .collect::<SemanticResult<Vec<_>>>()?;
                builder.apply_order_by(tree::OrderByClause { sort_specs })?;
                Ok(tree::Statement::Select(builder.build()?))
            }
            parse::Statement::Update(update) => {
                let clause = self.clause_for(&update.target.span)?;
                let target = self.node_for(&update.target.span)?;
                let assignments = update
                    .assignments
                    .iter()
                    .map(|assignment| self.build_assignment(assignment, &target, clause))
                    .collect::<SemanticResult<Vec<_>>>()?;
                let where_clause = self.build_optional_predicate(update.where_clause.as_ref(), clause)?;
                Ok(tree::Statement::Update(tree::UpdateStatement {
                    target,
                    assignments,
                    where_clause,
                }))
            }
            parse::Statement::Delete(delete) => {
                let clause = self.clause_for(&delete.target.span)?;
                let target = self.node_for(&delete.target.span)?;
                let where_clause = self.build_optional_predicate(delete.where_clause.as_ref(), clause)?;
                Ok(tree::Statement::Delete(tree::DeleteStatement { target, where_clause }))
            }
        }
    }

    fn build_query_spec(&mut self, spec: &Spanned<parse::QuerySpec>) -> SemanticResult<tree::QuerySpec> {
        let clause = self.clause_for(&spec.from.span)?;

        let select_clause = match &spec.select {
            Some(select) => tree::SelectClause {
                distinct: select.distinct,
                selections: select
                    .selections
                    .iter()
                    .map(|selection| {
                        Ok(tree::Selection {
                            expression: self.build_expression(&selection.expr, clause)?,
                            alias: selection.alias.as_ref().map(|a| a.value.clone()),
                        })
                    })
                    .collect::<SemanticResult<Vec<_>>>()?,
            },
            None => tree::SelectClause::default(),
        };

        let mut spaces = Vec::with_capacity(spec.from.spaces.len());
        for space in &spec.from.spaces {
            let root = self.node_for(&space.root.span)?;
            let mut joins = Vec::with_capacity(space.joins.len());
            for join in &space.joins {
                let target = self.node_for(&join.span)?;
                let predicate = self.build_optional_predicate(join.predicate.as_ref(), clause)?;
                joins.push(tree::QualifiedJoin::new(join.kind, join.fetch, target, predicate)?);
            }
            spaces.push(tree::FromElementSpace { root, joins });
        }

        // Without a select clause every space's root is selected
        let select_clause = if spec.select.is_none() {
            tree::SelectClause {
                distinct: false,
                selections: spaces
                    .iter()
                    .map(|space| tree::Selection {
                        expression: Expression::FromElement {
                            alias: space.root.alias.clone(),
                            ty: space.root.type_descriptor(),
                        },
                        alias: None,
                    })
                    .collect(),
            }
        } else {
            select_clause
        };

        let where_clause = self.build_optional_predicate(spec.where_clause.as_ref(), clause)?;

        Ok(tree::QuerySpec {
            from_clause: tree::FromClause { spaces },
            select_clause,
            where_clause,
        })
    }

    fn build_assignment(
        &mut self,
        assignment: &Spanned<parse::Assignment>,
        target: &tree::FromElementNode,
        clause: FromClauseId,
    ) -> SemanticResult<tree::Assignment> {
        let attribute = match self.resolve_path(&assignment.target, clause)? {
            Expression::Attribute(attribute)
                if attribute.source_alias == target.alias
                    && attribute.segments.len() == 1
                    && attribute.ty.as_basic().is_some() =>
            {
                attribute
            }
            _ => {
                return Err(SemanticError::illegal(format!(
                    "update can only assign basic attributes of '{}', not '{}'",
                    target.entity.name(),
                    assignment.target.dotted()
                )))
            }
        };
        let value = self.build_expression(&assignment.value.value, clause)?;
        Ok(tree::Assignment {
            target: attribute,
            value,
        })
    }

    // ------------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------------

    fn build_optional_predicate(
        &mut self,
        predicate: Option<&Spanned<parse::Predicate>>,
        clause: FromClauseId,
    ) -> SemanticResult<Option<tree::Predicate>> {
        predicate.map(|p| self.build_predicate(p, clause)).transpose()
    }

    fn build_predicate(
        &mut self,
        predicate: &Spanned<parse::Predicate>,
        clause: FromClauseId,
    ) -> SemanticResult<tree::Predicate> {
        Ok(match &predicate.value {
            parse::Predicate::And(left, right) => tree::Predicate::And(
                Box::new(self.build_predicate(left, clause)?),
                Box::new(self.build_predicate(right, clause)?),
            ),
            parse::Predicate::Or(left, right) => tree::Predicate::Or(
                Box::new(self.build_predicate(left, clause)?),
                Box::new(self.build_predicate(right, clause)?),
            ),
            parse::Predicate::Not(inner) => tree::Predicate::Not(Box::new(self.build_predicate(inner, clause)?)),
            parse::Predicate::Comparison { op, left, right } => tree::Predicate::Comparison {
                op: *op,
                left: self.build_expression(left, clause)?,
                right: self.build_expression(right, clause)?,
            },
            parse::Predicate::InList { test, values, negated } => tree::Predicate::InList {
                test: self.build_expression(test, clause)?,
                values: values
                    .iter()
                    .map(|v| self.build_expression(v, clause))
                    .collect::<SemanticResult<Vec<_>>>()?,
                negated: *negated,
            },
            parse::Predicate::InSubQuery {
                test,
                sub_query,
                negated,
            } => tree::Predicate::InSubQuery {
                test: self.build_expression(test, clause)?,
                sub_query: Box::new(self.build_query_spec(sub_query)?),
                negated: *negated,
            },
            parse::Predicate::MemberOf {
                element,
                collection,
                negated,
            } => {
                let element = self.build_expression(element, clause)?;
                let collection = match self.resolve_path(collection, clause)? {
                    Expression::Attribute(attribute) if attribute.ty.is_plural() => attribute,
                    _ => {
                        return Err(SemanticError::illegal(format!(
                            "'{}' is not a collection",
                            collection.dotted()
                        )))
                    }
                };
                tree::Predicate::MemberOf {
                    element,
                    collection: Expression::Attribute(collection),
                    negated: *negated,
                }
            }
            parse::Predicate::IsNull { expr, negated } => tree::Predicate::IsNull {
                expr: self.build_expression(expr, clause)?,
                negated: *negated,
            },
            parse::Predicate::Like { expr, pattern, negated } => tree::Predicate::Like {
                expr: self.build_expression(expr, clause)?,
                pattern: self.build_expression(pattern, clause)?,
                negated: *negated,
            },
            parse::Predicate::Between {
                expr,
                low,
                high,
                negated,
            } => tree::Predicate::Between {
                expr: self.build_expression(expr, clause)?,
                low: self.build_expression(low, clause)?,
                high: self.build_expression(high, clause)?,
                negated: *negated,
            },
        })
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn build_expression(&mut self, expr: &Spanned<parse::Expr>, clause: FromClauseId) -> SemanticResult<Expression> {
        match &expr.value {
            parse::Expr::Path(path) => self.resolve_path(path, clause),
            parse::Expr::Literal(literal) => Ok(Expression::Literal(match literal {
                parse::Literal::Integer(v) => tree::LiteralValue::Integer(*v),
                parse::Literal::Decimal(v) => tree::LiteralValue::Decimal(*v),
                parse::Literal::String(v) => tree::LiteralValue::String(v.clone()),
                parse::Literal::Boolean(v) => tree::LiteralValue::Boolean(*v),
                parse::Literal::Null => tree::LiteralValue::Null,
            })),
            parse::Expr::NamedParameter(name) => Ok(parameter(ParameterKind::Named(name.clone()))),
            parse::Expr::PositionalParameter(Some(position)) => {
                if self.next_position > 0 {
                    return Err(mixed_positional_parameters());
                }
                self.ordinal_seen = true;
                Ok(parameter(ParameterKind::Positional(*position)))
            }
            parse::Expr::PositionalParameter(None) => {
                if self.ordinal_seen {
                    return Err(mixed_positional_parameters());
                }
                self.next_position += 1;
                Ok(parameter(ParameterKind::Positional(self.next_position)))
            }
            parse::Expr::Arithmetic { op, left, right } => {
                let left = self.build_expression(left, clause)?;
                let right = self.build_expression(right, clause)?;
                let ty = arithmetic_type(&left, &right)?;
                Ok(Expression::Arithmetic {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                    ty,
                })
            }
            parse::Expr::Negate(inner) => {
                let inner = self.build_expression(inner, clause)?;
                numeric_operand(&inner, "negation")?;
                Ok(Expression::Negated(Box::new(inner)))
            }
            parse::Expr::Function {
                name,
                distinct,
                argument,
            } => {
                let function = Function::from_name(&name.value)
                    .ok_or_else(|| SemanticError::illegal(format!("unknown function '{}'", name.value)))?;
                let argument = match argument {
                    Some(argument) => Some(self.build_expression(argument, clause)?),
                    None if function == Function::Count => None,
                    None => {
                        return Err(SemanticError::illegal(format!(
                            "'*' is only allowed in count, not {}",
                            name.value
                        )))
                    }
                };
                let ty = function_type(function, argument.as_ref())?;
                Ok(Expression::Function {
                    function,
                    distinct: *distinct,
                    argument: argument.map(Box::new),
                    ty,
                })
            }
        }
    }

    /// Resolve an identifier path.
    ///
    /// The first segment is an alias when one is registered under that name
    /// in `clause` or an enclosing clause; otherwise it is an unqualified
    /// attribute of the unique from-element in scope exposing it. Later segments are attribute lookups on the type
    /// the previous segment resolved to.
    fn resolve_path(&mut self, path: &parse::Path, clause: FromClauseId) -> SemanticResult<Expression> {
        let context = self.context;
        let index = context.from_clause_index();
        let first = path
            .parts
            .first()
            .ok_or_else(|| SemanticError::ParsingContextMisuse("empty attribute path".to_string()))?;

        let (source, remaining) = match index.find_visible_alias(clause, &first.name.value) {
            Some(element) => {
                if first.index.is_some() {
                    return Err(SemanticError::illegal(format!(
                        "index operator applied to alias '{}'",
                        element.alias
                    )));
                }
                (element, &path.parts[1..])
            }
            None => match index.find_exposing(clause, &first.name.value)? {
                Some(element) => (element, &path.parts[..]),
                None => return Err(SemanticError::unresolved_attribute(&first.name.value, None)),
            },
        };

        if remaining.is_empty() {
            return Ok(Expression::FromElement {
                alias: source.alias.clone(),
                ty: source.type_descriptor(),
            });
        }
        self.resolve_attribute_path(source, remaining, clause)
    }

    fn resolve_attribute_path(
        &mut self,
        source: &FromElement,
        parts: &[parse::PathPart],
        clause: FromClauseId,
    ) -> SemanticResult<Expression> {
        let mut segments: Vec<tree::PathSegment> = Vec::with_capacity(parts.len());
        let mut current = source.type_descriptor();

        for (position, part) in parts.iter().enumerate() {
            let attribute = &part.name.value;
            let attribute_ty = if position == 0 {
                source.entity.attribute(attribute).cloned()
            } else {
                self.attribute_of(&current, attribute)?
            }
            .ok_or_else(|| SemanticError::unresolved_attribute(attribute, Some(&current.to_string())))?;

            let (index, ty) = match &part.index {
                Some(index_expr) => {
                    let collection = attribute_ty
                        .as_collection()
                        .filter(|c| c.index.is_some())
                        .ok_or_else(|| {
                            SemanticError::illegal(format!(
                                "index operator applied to '{}' of type {}, which is not an indexed collection",
                                attribute, attribute_ty
                            ))
                        })?;
                    let element_ty = (*collection.element).clone();
                    let index = self.build_expression(index_expr, clause)?;
                    (Some(Box::new(index)), element_ty)
                }
                None => (None, attribute_ty.clone()),
            };

            segments.push(tree::PathSegment {
                attribute: attribute.clone(),
                attribute_ty: attribute_ty.clone(),
                index,
                ty: ty.clone(),
            });
            current = ty;
        }

        Ok(Expression::Attribute(tree::AttributeReference {
            source_alias: source.alias.clone(),
            source_type: source.type_descriptor(),
            segments,
            ty: current,
        }))
    }

    /// Look up `attribute` on a non-root segment type.
    fn attribute_of(&self, owner: &TypeDescriptor, attribute: &str) -> SemanticResult<Option<TypeDescriptor>> {
        match owner {
            TypeDescriptor::Entity { name } => {
                let entity = self
                    .context
                    .metadata()
                    .resolve_entity_reference(name)
                    .ok_or_else(|| SemanticError::UnresolvedType(name.clone()))?;
                Ok(entity.attribute(attribute).cloned())
            }
            TypeDescriptor::Collection { .. } => Err(SemanticError::illegal(format!(
                "cannot dereference '{}' through plural type {} without an index",
                attribute, owner
            ))),
            TypeDescriptor::Basic { .. } => Ok(None),
        }
    }

    fn clause_for(&self, span: &parse::Span) -> SemanticResult<FromClauseId> {
        self.context
            .from_clause_index()
            .clause_for_span(span)
            .ok_or_else(|| SemanticError::ParsingContextMisuse(format!("no from-clause indexed at {:?}", span)))
    }

    fn node_for(&self, span: &parse::Span) -> SemanticResult<tree::FromElementNode> {
        self.context
            .from_clause_index()
            .element_for_span(span)
            .map(tree::FromElementNode::from)
            .ok_or_else(|| SemanticError::ParsingContextMisuse(format!("no from-element indexed at {:?}", span)))
    }
}

impl From<&FromElement> for tree::FromElementNode {
    fn from(element: &FromElement) -> Self {
        tree::FromElementNode {
            alias: element.alias.clone(),
            alias_generated: element.alias_generated,
            entity: element.entity.clone(),
            origin: element.origin.clone(),
        }
    }
}

fn mixed_positional_parameters() -> SemanticError {
    SemanticError::illegal("'?' and '?N' parameters cannot be mixed in one statement")
}

fn parameter(kind: ParameterKind) -> Expression {
    Expression::Parameter(Parameter {
        kind,
        ty: ParameterType::Unresolved,
    })
}

/// A known operand type must be numeric.
fn numeric_operand(expr: &Expression, operator: &str) -> SemanticResult<Option<BasicType>> {
    match expr.ty() {
        None => Ok(None),
        Some(ty) => match ty.as_basic() {
            Some(basic) if basic.is_numeric() => Ok(Some(basic)),
            _ => Err(SemanticError::illegal(format!("{} applied to non-numeric type {}", operator, ty))),
        },
    }
}

fn arithmetic_type(left: &Expression, right: &Expression) -> SemanticResult<Option<BasicType>> {
    let left = numeric_operand(left, "arithmetic")?;
    let right = numeric_operand(right, "arithmetic")?;
    Ok(match (left, right) {
        (Some(l), Some(r)) => Some(wider(l, r)),
        (known, None) | (None, known) => known,
    })
}

fn wider(left: BasicType, right: BasicType) -> BasicType {
    let rank = |ty: BasicType| match ty {
        BasicType::Integer => 0,
        BasicType::Long => 1,
        BasicType::Decimal => 2,
        _ => 3,
    };
    if rank(left) >= rank(right) {
        left
    } else {
        right
    }
}

fn function_type(function: Function, argument: Option<&Expression>) -> SemanticResult<Option<TypeDescriptor>> {
    let argument_ty = argument.and_then(Expression::ty);
    Ok(match function {
        Function::Count => Some(TypeDescriptor::basic(BasicType::Long)),
        Function::Avg => {
            if let Some(argument) = argument {
                numeric_operand(argument, "avg")?;
            }
            Some(TypeDescriptor::basic(BasicType::Double))
        }
        Function::Sum | Function::Abs => {
            if let Some(argument) = argument {
                numeric_operand(argument, function.sql_name())?;
            }
            argument_ty
        }
        Function::Min | Function::Max => argument_ty,
        Function::Upper | Function::Lower => Some(TypeDescriptor::basic(BasicType::String)),
        Function::Length => Some(TypeDescriptor::basic(BasicType::Integer)),
    })
}
