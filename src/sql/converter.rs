//! Lowering of semantic trees to the SQL AST.
//!
//! Every from-element becomes a [`TableGroup`] named after its alias. Paths
//! that dereference a to-one association or index into a collection add
//! inner-joined groups to the space owning the path's root alias:
//!
//! - `o.customer.name` joins a group aliased `o.customer` (shared by every
//!   path through the same association)
//! - `o.items[0].id` joins a fresh group per index access, constrained on
//!   the collection's index column
//!
//! Polymorphic statements are split first; the result holds one SQL
//! statement per implementor.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metadata::{EntityReference, MappedTable, MetadataProvider, TableShape};
use crate::semantic::from_clause::FromElementOrigin;
use crate::semantic::splitter::split;
use crate::semantic::tree::{
    ArithmeticOp, AttributeReference, ComparisonOp, DeleteStatement, Expression,
    FromElementNode, Function, JoinKind, LiteralValue, OrderByClause, PathSegment, Predicate,
    QualifiedJoin, QuerySpec, Selection, SortOrder, Statement, UpdateStatement,
};

use super::ast::{
    ColumnBinding, SqlAst, SqlSelect, SqlStatement, TableGroup, TableGroupJoin, TableSpace,
    TableSpecification, TableSpecificationJoin,
};
use super::dml::{Delete, Update};
use super::error::{ConversionError, ConversionResult};
use super::expr::{
    conjunction, count_star, lit_bool, lit_float, lit_int, lit_null, lit_str, table_col,
    BinaryOperator, Expr, ExprExt,
};
use super::query::{JoinType, OrderByExpr, Query, SelectExpr};

// ============================================================================
// Options
// ============================================================================

/// Join type used for the secondary tables of a group.
///
/// Identifying tables (the primary tables of the entity and its ancestors)
/// are always inner joined; a row missing from one of them is not an
/// instance of the queried type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecondaryTableJoinPolicy {
    /// Always LEFT OUTER, so rows of the base type are never dropped.
    #[default]
    Outer,
    Inner,
    /// LEFT OUTER only for tables flagged optional in the model.
    Mapped,
}

impl SecondaryTableJoinPolicy {
    pub fn join_type(self, table: &MappedTable) -> JoinType {
        if table.identifying {
            return JoinType::Inner;
        }
        match self {
            SecondaryTableJoinPolicy::Outer => JoinType::Left,
            SecondaryTableJoinPolicy::Inner => JoinType::Inner,
            SecondaryTableJoinPolicy::Mapped if table.optional => JoinType::Left,
            SecondaryTableJoinPolicy::Mapped => JoinType::Inner,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterOptions {
    pub secondary_table_join: SecondaryTableJoinPolicy,
}

// ============================================================================
// Entry point
// ============================================================================

/// Lower a semantic statement to SQL.
pub fn convert(
    statement: &Statement,
    metadata: &dyn MetadataProvider,
    options: &ConverterOptions,
) -> ConversionResult<SqlAst> {
    let trees = split(Arc::new(statement.clone()));
    let mut statements = Vec::with_capacity(trees.len());
    for tree in &trees {
        let mut converter = SqlConverter::new(metadata, options);
        statements.push(converter.statement(tree)?);
    }

    tracing::debug!(
        statements = statements.len(),
        policy = ?options.secondary_table_join,
        "lowered statement to SQL AST"
    );
    Ok(SqlAst { statements })
}

/// Groups visible in one query level.
#[derive(Debug, Default)]
struct Scope {
    spaces: Vec<TableSpace>,
    /// alias → (index of the owning space, group)
    groups: HashMap<String, (usize, TableGroup)>,
}

struct SqlConverter<'a> {
    metadata: &'a dyn MetadataProvider,
    options: &'a ConverterOptions,
    scopes: Vec<Scope>,
    index_joins: usize,
}

impl<'a> SqlConverter<'a> {
    fn new(metadata: &'a dyn MetadataProvider, options: &'a ConverterOptions) -> Self {
        Self {
            metadata,
            options,
            scopes: Vec::new(),
            index_joins: 0,
        }
    }

    fn statement(&mut self, statement: &Statement) -> ConversionResult<SqlStatement> {
        match statement {
            Statement::Select(select) => self
                .select(&select.query, Some(&select.order_by), true)
                .map(SqlStatement::Select),
            Statement::Update(update) => self.update(update).map(SqlStatement::Update),
            Statement::Delete(delete) => self.delete(delete).map(SqlStatement::Delete),
        }
    }

    // ------------------------------------------------------------------
    // Scopes and groups
    // ------------------------------------------------------------------

    fn scope_mut(&mut self) -> ConversionResult<&mut Scope> {
        self.scopes
            .last_mut()
            .ok_or_else(|| ConversionError::unsupported("expression outside of a query scope"))
    }

    fn group(&self, alias: &str) -> ConversionResult<&TableGroup> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.groups.get(alias))
            .map(|(_, group)| group)
            .ok_or_else(|| ConversionError::UnknownAlias(alias.to_string()))
    }

    /// (scope index, space index) of the group registered under `alias`.
    fn locate(&self, alias: &str) -> Option<(usize, usize)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, scope)| scope.groups.get(alias).map(|(space, _)| (i, *space)))
    }

    /// Append an implicit join to the space that owns `owner_alias`.
    fn attach(&mut self, owner_alias: &str, join: TableGroupJoin) -> ConversionResult<()> {
        let (scope, space) = self
            .locate(owner_alias)
            .ok_or_else(|| ConversionError::UnknownAlias(owner_alias.to_string()))?;
        let scope = &mut self.scopes[scope];
        scope
            .groups
            .insert(join.group.alias.clone(), (space, join.group.clone()));
        if let Some(space) = scope.spaces.get_mut(space) {
            space.joins.push(join);
        }
        Ok(())
    }

    fn shape(&self, entity: &str) -> ConversionResult<&'a TableShape> {
        self.metadata
            .table_shape(entity)
            .ok_or_else(|| ConversionError::MissingTableShape(entity.to_string()))
    }

    fn element_group(&self, node: &FromElementNode) -> ConversionResult<TableGroup> {
        match &node.entity {
            EntityReference::Concrete(entity) => self.table_group(&node.alias, &entity.name),
            EntityReference::Polymorphic(poly) => Err(ConversionError::unsupported(format!(
                "polymorphic reference '{}' ({}) is only supported as the query root",
                poly.name, node.alias
            ))),
        }
    }

    fn table_group(&self, alias: &str, entity: &str) -> ConversionResult<TableGroup> {
        let shape = self.shape(entity)?;
        let root_table = shape
            .root()
            .ok_or_else(|| ConversionError::MissingTableShape(entity.to_string()))?;
        let root = TableSpecification::new(root_table.name.as_str(), TableGroup::table_alias(alias, 0));

        let mut secondary = Vec::with_capacity(shape.secondary_tables().len());
        for (i, table) in shape.secondary_tables().iter().enumerate() {
            let spec = TableSpecification::new(table.name.as_str(), TableGroup::table_alias(alias, i + 1));
            let on = table_col(&root.alias, &root_table.key_column)
                .eq(table_col(&spec.alias, &table.key_column));
            let join_type = self.options.secondary_table_join.join_type(table);
            secondary.push(TableSpecificationJoin::new(join_type, spec, Some(on))?);
        }

        let columns = shape
            .tables
            .iter()
            .enumerate()
            .flat_map(|(i, table)| {
                table.columns.iter().map(move |column| ColumnBinding {
                    attribute: column.attribute.clone(),
                    table_alias: TableGroup::table_alias(alias, i),
                    column: column.column.clone(),
                })
            })
            .collect();

        Ok(TableGroup {
            alias: alias.to_string(),
            entity: entity.to_string(),
            root,
            key_column: root_table.key_column.clone(),
            secondary,
            columns,
        })
    }

    // ------------------------------------------------------------------
    // Select
    // ------------------------------------------------------------------

    fn select(
        &mut self,
        spec: &QuerySpec,
        order_by: Option<&OrderByClause>,
        top_level: bool,
    ) -> ConversionResult<SqlSelect> {
        self.scopes.push(Scope::default());
        let result = self.select_in_scope(spec, order_by, top_level);
        let scope = self.scopes.pop();

        let mut select = result?;
        select.spaces = scope.map(|s| s.spaces).unwrap_or_default();
        Ok(select)
    }

    fn select_in_scope(
        &mut self,
        spec: &QuerySpec,
        order_by: Option<&OrderByClause>,
        top_level: bool,
    ) -> ConversionResult<SqlSelect> {
        for space in &spec.from_clause.spaces {
            let root = self.element_group(&space.root)?;
            let scope = self.scope_mut()?;
            let index = scope.spaces.len();
            scope.groups.insert(root.alias.clone(), (index, root.clone()));
            scope.spaces.push(TableSpace::new(root));

            for join in &space.joins {
                self.qualified_join(index, join)?;
            }
        }

        let mut selections = Vec::new();
        for selection in &spec.select_clause.selections {
            selections.extend(self.selection(selection, top_level)?);
        }

        let where_clause = match &spec.where_clause {
            Some(predicate) => Some(self.predicate(predicate)?),
            None => None,
        };

        let mut sorts = Vec::new();
        if let Some(clause) = order_by {
            for sort in &clause.sort_specs {
                let expr = self.expression(&sort.expression)?;
                sorts.push(match sort.order {
                    SortOrder::Ascending => OrderByExpr::asc(expr),
                    SortOrder::Descending => OrderByExpr::desc(expr),
                });
            }
        }

        Ok(SqlSelect {
            distinct: spec.select_clause.distinct,
            selections,
            spaces: Vec::new(),
            where_clause,
            order_by: sorts,
        })
    }

    fn qualified_join(&mut self, space_index: usize, join: &QualifiedJoin) -> ConversionResult<()> {
        let target = self.element_group(&join.target)?;
        let association = match &join.target.origin {
            FromElementOrigin::AttributeJoin {
                lhs_alias,
                attribute_path,
                collection,
            } => Some(self.association_predicate(lhs_alias, attribute_path, *collection, &target)?),
            FromElementOrigin::Root | FromElementOrigin::EntityJoin => None,
        };

        // The target must be visible to its own join predicate
        let scope = self.scope_mut()?;
        scope
            .groups
            .insert(target.alias.clone(), (space_index, target.clone()));
        let before = scope.spaces.get(space_index).map_or(0, |s| s.joins.len());

        let user = match &join.predicate {
            Some(predicate) => Some(self.predicate(predicate)?),
            None => None,
        };
        let predicate = conjunction(association.into_iter().chain(user));

        let join_type = match (join.kind, &predicate) {
            (JoinKind::Cross, _) => JoinType::Cross,
            (JoinKind::Inner, None) => JoinType::Cross,
            (JoinKind::Inner, Some(_)) => JoinType::Inner,
            (JoinKind::LeftOuter, _) => JoinType::Left,
        };
        let predicate = match (join_type, predicate) {
            (JoinType::Left, None) => Some(lit_bool(true)),
            (_, predicate) => predicate,
        };

        tracing::trace!(alias = %target.alias, ?join_type, "group join");
        let group_join = TableGroupJoin::new(join_type, target, predicate)?;

        // Implicit joins raised by the predicate go after the join they hang off
        let scope = self.scope_mut()?;
        if let Some(space) = scope.spaces.get_mut(space_index) {
            let implicit: Vec<TableGroupJoin> = space.joins.drain(before..).collect();
            space.joins.push(group_join);
            space.joins.extend(implicit);
        }
        Ok(())
    }

    /// The join condition implied by `lhs.a.b target`.
    fn association_predicate(
        &mut self,
        lhs_alias: &str,
        path: &[String],
        collection: bool,
        target: &TableGroup,
    ) -> ConversionResult<Expr> {
        let (last, init) = path
            .split_last()
            .ok_or_else(|| ConversionError::unsupported(format!("empty join path from '{}'", lhs_alias)))?;

        let mut owner = lhs_alias.to_string();
        for attribute in init {
            owner = self.to_one_join(&owner, attribute)?;
        }

        let owner_group = self.group(&owner)?;
        if collection {
            let mapping = self
                .shape(&owner_group.entity)?
                .collection(last)
                .ok_or_else(|| ConversionError::unmapped(&owner_group.entity, last))?;
            Ok(owner_group
                .key()
                .eq(table_col(&target.root.alias, &mapping.foreign_key_column)))
        } else {
            let foreign_key = owner_group
                .column(last)
                .ok_or_else(|| ConversionError::unmapped(&owner_group.entity, last))?;
            Ok(foreign_key.eq(target.key()))
        }
    }

    /// Group for `owner.attribute` where `attribute` is a to-one association,
    /// joined on first use.
    fn to_one_join(&mut self, owner_alias: &str, attribute: &str) -> ConversionResult<String> {
        let alias = format!("{}.{}", owner_alias, attribute);
        if self.locate(&alias).is_some() {
            return Ok(alias);
        }

        let owner = self.group(owner_alias)?;
        let target_entity = self
            .metadata
            .entity_type(&owner.entity)
            .and_then(|entity| {
                entity
                    .attribute(attribute)
                    .and_then(|ty| ty.entity_name().map(str::to_string))
            })
            .ok_or_else(|| ConversionError::unmapped(&owner.entity, attribute))?;
        let foreign_key = owner
            .column(attribute)
            .ok_or_else(|| ConversionError::unmapped(&owner.entity, attribute))?;

        let group = self.table_group(&alias, &target_entity)?;
        let predicate = foreign_key.eq(group.key());
        tracing::trace!(alias = %alias, "implicit join");
        self.attach(
            owner_alias,
            TableGroupJoin::new(JoinType::Inner, group, Some(predicate))?,
        )?;
        Ok(alias)
    }

    /// Group for the element selected by `owner.attribute[index]`.
    fn index_join(&mut self, owner_alias: &str, segment: &PathSegment) -> ConversionResult<String> {
        let index = segment.index.as_deref().ok_or_else(|| {
            ConversionError::unsupported(format!("'{}' is not an index access", segment.attribute))
        })?;
        let index_value = self.expression(index)?;

        let element = segment
            .attribute_ty
            .as_collection()
            .and_then(|c| c.element.entity_name())
            .ok_or_else(|| {
                ConversionError::unsupported(format!(
                    "'{}' is not a collection of entities",
                    segment.attribute
                ))
            })?;
        let alias = format!("{}.{}[{}]", owner_alias, segment.attribute, self.index_joins);
        self.index_joins += 1;

        let owner = self.group(owner_alias)?;
        let mapping = self
            .shape(&owner.entity)?
            .collection(&segment.attribute)
            .ok_or_else(|| ConversionError::unmapped(&owner.entity, &segment.attribute))?;
        let index_column = mapping.index_column.as_deref().ok_or_else(|| {
            ConversionError::unsupported(format!(
                "collection '{}.{}' has no index column",
                owner.entity, segment.attribute
            ))
        })?;
        let owner_key = owner.key();

        let group = self.table_group(&alias, element)?;
        let predicate = owner_key
            .eq(table_col(&group.root.alias, &mapping.foreign_key_column))
            .and(table_col(&group.root.alias, index_column).eq(index_value));
        tracing::trace!(alias = %alias, "index join");
        self.attach(
            owner_alias,
            TableGroupJoin::new(JoinType::Inner, group, Some(predicate))?,
        )?;
        Ok(alias)
    }

    /// Join every segment but the last; returns the alias owning the last one.
    fn navigate<'t>(
        &mut self,
        attribute: &'t AttributeReference,
    ) -> ConversionResult<(String, &'t PathSegment)> {
        let (last, init) = attribute.segments.split_last().ok_or_else(|| {
            ConversionError::unsupported(format!("empty path on '{}'", attribute.source_alias))
        })?;

        let mut current = attribute.source_alias.clone();
        for segment in init {
            current = if segment.index.is_some() {
                self.index_join(&current, segment)?
            } else {
                self.to_one_join(&current, &segment.attribute)?
            };
        }
        Ok((current, last))
    }

    fn selection(&mut self, selection: &Selection, top_level: bool) -> ConversionResult<Vec<SelectExpr>> {
        if top_level {
            let entity_alias = match &selection.expression {
                Expression::FromElement { alias, .. } => Some(alias.clone()),
                Expression::Attribute(attribute) if attribute.ty.entity_name().is_some() => {
                    let (owner, last) = self.navigate(attribute)?;
                    Some(if last.index.is_some() {
                        self.index_join(&owner, last)?
                    } else {
                        self.to_one_join(&owner, &last.attribute)?
                    })
                }
                _ => None,
            };
            if let Some(alias) = entity_alias {
                let group = self.group(&alias)?;
                return Ok(group.all_columns().into_iter().map(SelectExpr::new).collect());
            }
        }

        let select = SelectExpr::new(self.expression(&selection.expression)?);
        Ok(vec![match &selection.alias {
            Some(alias) => select.with_alias(alias),
            None => select,
        }])
    }

    // ------------------------------------------------------------------
    // Expressions and predicates
    // ------------------------------------------------------------------

    fn expression(&mut self, expression: &Expression) -> ConversionResult<Expr> {
        match expression {
            Expression::Attribute(attribute) => self.attribute_value(attribute),
            Expression::FromElement { alias, .. } => Ok(self.group(alias)?.key()),
            Expression::Literal(literal) => literal_expr(literal),
            Expression::Parameter(parameter) => Ok(Expr::Parameter(parameter.clone())),
            Expression::Arithmetic {
                op, left, right, ..
            } => {
                let left = self.expression(left)?;
                Ok(left.binary(arithmetic_operator(*op), self.expression(right)?))
            }
            Expression::Negated(inner) => Ok(Expr::Negate(Box::new(self.expression(inner)?))),
            Expression::Function {
                function,
                distinct,
                argument,
                ..
            } => match argument {
                Some(argument) => Ok(Expr::Function {
                    name: function.sql_name().to_string(),
                    args: vec![self.expression(argument)?],
                    distinct: *distinct,
                }),
                None if *function == Function::Count => Ok(count_star()),
                None => Err(ConversionError::unsupported(format!(
                    "{} requires an argument",
                    function.sql_name()
                ))),
            },
        }
    }

    fn attribute_value(&mut self, attribute: &AttributeReference) -> ConversionResult<Expr> {
        let (owner, last) = self.navigate(attribute)?;
        if last.index.is_some() {
            let element = self.index_join(&owner, last)?;
            return Ok(self.group(&element)?.key());
        }
        if last.attribute_ty.is_plural() {
            return Err(ConversionError::unsupported(format!(
                "collection-valued path '{}' cannot be used as a value",
                attribute.dotted()
            )));
        }

        let group = self.group(&owner)?;
        group
            .column(&last.attribute)
            .ok_or_else(|| ConversionError::unmapped(&group.entity, &last.attribute))
    }

    fn predicate(&mut self, predicate: &Predicate) -> ConversionResult<Expr> {
        match predicate {
            Predicate::And(left, right) => {
                let left = self.predicate(left)?;
                Ok(left.and(self.predicate(right)?))
            }
            Predicate::Or(left, right) => {
                let left = self.predicate(left)?;
                Ok(left.or(self.predicate(right)?))
            }
            Predicate::Not(inner) => Ok(self.predicate(inner)?.not()),
            Predicate::Comparison { op, left, right } => {
                let left = self.expression(left)?;
                Ok(left.binary(comparison_operator(*op), self.expression(right)?))
            }
            Predicate::InList {
                test,
                values,
                negated,
            } => {
                let test = self.expression(test)?;
                let mut list = Vec::with_capacity(values.len());
                for value in values {
                    list.push(self.expression(value)?);
                }
                Ok(Expr::InList {
                    expr: Box::new(test),
                    values: list,
                    negated: *negated,
                })
            }
            Predicate::InSubQuery {
                test,
                sub_query,
                negated,
            } => {
                let test = self.expression(test)?;
                let subquery = self.select(sub_query, None, false)?.to_query();
                Ok(test.in_subquery(subquery, *negated))
            }
            Predicate::MemberOf {
                element,
                collection,
                negated,
            } => self.member_of(element, collection, *negated),
            Predicate::IsNull { expr, negated } => Ok(Expr::IsNull {
                expr: Box::new(self.expression(expr)?),
                negated: *negated,
            }),
            Predicate::Like {
                expr,
                pattern,
                negated,
            } => {
                let expr = self.expression(expr)?;
                let pattern = self.expression(pattern)?;
                Ok(Expr::Like {
                    expr: Box::new(expr),
                    pattern: Box::new(pattern),
                    negated: *negated,
                })
            }
            Predicate::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let expr = self.expression(expr)?;
                let low = self.expression(low)?;
                let high = self.expression(high)?;
                Ok(Expr::Between {
                    expr: Box::new(expr),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated: *negated,
                })
            }
        }
    }

    /// `x member of o.items` → `x IN (SELECT key FROM items WHERE fk = o.key)`
    fn member_of(
        &mut self,
        element: &Expression,
        collection: &Expression,
        negated: bool,
    ) -> ConversionResult<Expr> {
        let Expression::Attribute(attribute) = collection else {
            return Err(ConversionError::unsupported("member of requires a collection path"));
        };
        let test = self.expression(element)?;
        let (owner, last) = self.navigate(attribute)?;

        let element_entity = last
            .attribute_ty
            .as_collection()
            .and_then(|c| c.element.entity_name())
            .ok_or_else(|| {
                ConversionError::unsupported(format!("'{}' is not a collection", attribute.dotted()))
            })?;
        let owner_group = self.group(&owner)?;
        let mapping = self
            .shape(&owner_group.entity)?
            .collection(&last.attribute)
            .ok_or_else(|| ConversionError::unmapped(&owner_group.entity, &last.attribute))?;
        let owner_key = owner_group.key();

        let element_table = self
            .shape(element_entity)?
            .root()
            .ok_or_else(|| ConversionError::MissingTableShape(element_entity.to_string()))?;
        let table = TableSpecification::new(
            element_table.name.as_str(),
            TableGroup::table_alias(&format!("{}.{}", owner, last.attribute), 0),
        );
        let subquery = Query::new()
            .select(vec![table_col(&table.alias, &element_table.key_column)])
            .from(table.table_ref())
            .filter(table_col(&table.alias, &mapping.foreign_key_column).eq(owner_key));

        Ok(test.in_subquery(subquery, negated))
    }

    // ------------------------------------------------------------------
    // Update / delete
    // ------------------------------------------------------------------

    /// Open a scope holding only the target table. Columns are qualified by
    /// the table name itself, since bulk statements carry no alias.
    fn open_dml_scope(&mut self, target: &FromElementNode, verb: &str) -> ConversionResult<String> {
        let entity = match &target.entity {
            EntityReference::Concrete(entity) => entity.name.clone(),
            EntityReference::Polymorphic(poly) => {
                return Err(ConversionError::unsupported(format!(
                    "{} of polymorphic reference '{}'",
                    verb, poly.name
                )))
            }
        };
        let shape = self.shape(&entity)?;
        let table = match shape.tables.as_slice() {
            [table] => table,
            tables => {
                return Err(ConversionError::unsupported(format!(
                    "{} of '{}' which spans {} tables",
                    verb,
                    entity,
                    tables.len()
                )))
            }
        };
        if table.is_derived() {
            return Err(ConversionError::unsupported(format!(
                "{} of '{}' which is mapped to a derived table",
                verb, entity
            )));
        }

        let group = TableGroup {
            alias: target.alias.clone(),
            entity,
            root: TableSpecification::new(table.name.as_str(), table.name.as_str()),
            key_column: table.key_column.clone(),
            secondary: Vec::new(),
            columns: table
                .columns
                .iter()
                .map(|column| ColumnBinding {
                    attribute: column.attribute.clone(),
                    table_alias: table.name.clone(),
                    column: column.column.clone(),
                })
                .collect(),
        };

        let mut scope = Scope::default();
        scope.groups.insert(group.alias.clone(), (0, group.clone()));
        scope.spaces.push(TableSpace::new(group));
        self.scopes.push(scope);
        Ok(table.name.clone())
    }

    fn close_dml_scope(&mut self, verb: &str) -> ConversionResult<()> {
        let scope = self.scopes.pop();
        let joined = scope
            .iter()
            .flat_map(|s| &s.spaces)
            .any(|space| !space.joins.is_empty());
        if joined {
            return Err(ConversionError::unsupported(format!(
                "{} cannot navigate associations of its target",
                verb
            )));
        }
        Ok(())
    }

    fn update(&mut self, update: &UpdateStatement) -> ConversionResult<Update> {
        let table = self.open_dml_scope(&update.target, "update")?;
        let result = self.update_in_scope(table, update);
        let closed = self.close_dml_scope("update");
        let sql = result?;
        closed?;
        Ok(sql)
    }

    fn update_in_scope(&mut self, table: String, update: &UpdateStatement) -> ConversionResult<Update> {
        let mut sql = Update::table(table);
        for assignment in &update.assignments {
            let target = &assignment.target;
            let attribute = target
                .segments
                .first()
                .map(|segment| segment.attribute.as_str())
                .ok_or_else(|| ConversionError::unsupported("update assignment without a target"))?;
            let group = self.group(&target.source_alias)?;
            let column = group
                .columns
                .iter()
                .find(|c| c.attribute == attribute)
                .map(|c| c.column.clone())
                .ok_or_else(|| ConversionError::unmapped(&group.entity, attribute))?;

            let value = self.expression(&assignment.value)?;
            sql = sql.set(column, value);
        }
        if let Some(predicate) = &update.where_clause {
            sql = sql.filter(self.predicate(predicate)?);
        }
        Ok(sql)
    }

    fn delete(&mut self, delete: &DeleteStatement) -> ConversionResult<Delete> {
        let table = self.open_dml_scope(&delete.target, "delete")?;
        let result = match &delete.where_clause {
            Some(predicate) => self
                .predicate(predicate)
                .map(|filter| Delete::from(table.as_str()).filter(filter)),
            None => Ok(Delete::from(table.as_str())),
        };
        let closed = self.close_dml_scope("delete");
        let sql = result?;
        closed?;
        Ok(sql)
    }
}

fn literal_expr(literal: &LiteralValue) -> ConversionResult<Expr> {
    match literal {
        LiteralValue::Integer(value) => Ok(lit_int(*value)),
        LiteralValue::Decimal(value) if value.is_finite() => Ok(lit_float(*value)),
        LiteralValue::Decimal(value) => Err(ConversionError::unsupported(format!(
            "numeric literal {} has no SQL form",
            value
        ))),
        LiteralValue::String(value) => Ok(lit_str(value)),
        LiteralValue::Boolean(value) => Ok(lit_bool(*value)),
        LiteralValue::Null => Ok(lit_null()),
    }
}

fn arithmetic_operator(op: ArithmeticOp) -> BinaryOperator {
    match op {
        ArithmeticOp::Add => BinaryOperator::Plus,
        ArithmeticOp::Subtract => BinaryOperator::Minus,
        ArithmeticOp::Multiply => BinaryOperator::Mul,
        ArithmeticOp::Divide => BinaryOperator::Div,
        ArithmeticOp::Modulo => BinaryOperator::Mod,
    }
}

fn comparison_operator(op: ComparisonOp) -> BinaryOperator {
    match op {
        ComparisonOp::Eq => BinaryOperator::Eq,
        ComparisonOp::Ne => BinaryOperator::Ne,
        ComparisonOp::Lt => BinaryOperator::Lt,
        ComparisonOp::Le => BinaryOperator::Lte,
        ComparisonOp::Gt => BinaryOperator::Gt,
        ComparisonOp::Ge => BinaryOperator::Gte,
    }
}
