//! The semantic query tree.
//!
//! Output of the query builder: every identifier resolved against the
//! from-clause index and the domain model. The tree is self-contained
//! (expressions reference from-elements by alias, not by index id), so it
//! can be cloned and narrowed by the splitter and lowered to SQL on its own.

use crate::metadata::{BasicType, EntityReference, TypeDescriptor};
pub use crate::parse::{ArithmeticOp, ComparisonOp, JoinKind, SortOrder};

use super::error::{SemanticError, SemanticResult};
use super::from_clause::FromElementOrigin;

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    /// The root from-element: the first space's root of a select, or the
    /// target of an update/delete.
    pub fn root_element(&self) -> Option<&FromElementNode> {
        match self {
            Statement::Select(select) => select
                .query
                .from_clause
                .spaces
                .first()
                .map(|space| &space.root),
            Statement::Update(update) => Some(&update.target),
            Statement::Delete(delete) => Some(&delete.target),
        }
    }

    pub fn root_element_mut(&mut self) -> Option<&mut FromElementNode> {
        match self {
            Statement::Select(select) => select
                .query
                .from_clause
                .spaces
                .first_mut()
                .map(|space| &mut space.root),
            Statement::Update(update) => Some(&mut update.target),
            Statement::Delete(delete) => Some(&mut delete.target),
        }
    }

    /// Distinct parameters in first-occurrence order.
    pub fn parameters(&self) -> Vec<&Parameter> {
        let mut found: Vec<&Parameter> = Vec::new();
        self.visit_expressions(&mut |expr| {
            if let Expression::Parameter(param) = expr {
                if !found.iter().any(|p| p.kind == param.kind) {
                    found.push(param);
                }
            }
        });
        found
    }

    /// Visit every expression in document order, sub-queries included.
    pub fn visit_expressions<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        match self {
            Statement::Select(select) => {
                select.query.visit_expressions(f);
                for spec in &select.order_by.sort_specs {
                    spec.expression.visit(f);
                }
            }
            Statement::Update(update) => {
                for assignment in &update.assignments {
                    assignment.value.visit(f);
                }
                if let Some(predicate) = &update.where_clause {
                    predicate.visit_expressions(f);
                }
            }
            Statement::Delete(delete) => {
                if let Some(predicate) = &delete.where_clause {
                    predicate.visit_expressions(f);
                }
            }
        }
    }

    /// Visit every expression mutably, in document order.
    pub fn visit_expressions_mut(&mut self, f: &mut impl FnMut(&mut Expression)) {
        match self {
            Statement::Select(select) => {
                select.query.visit_expressions_mut(f);
                for spec in &mut select.order_by.sort_specs {
                    spec.expression.visit_mut(f);
                }
            }
            Statement::Update(update) => {
                for assignment in &mut update.assignments {
                    assignment.value.visit_mut(f);
                }
                if let Some(predicate) = &mut update.where_clause {
                    predicate.visit_expressions_mut(f);
                }
            }
            Statement::Delete(delete) => {
                if let Some(predicate) = &mut delete.where_clause {
                    predicate.visit_expressions_mut(f);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub query: QuerySpec,
    pub order_by: OrderByClause,
}

/// Assembles a [`SelectStatement`] from exactly one query spec and exactly
/// one order-by clause.
#[derive(Debug, Default)]
pub struct SelectStatementBuilder {
    query: Option<QuerySpec>,
    order_by: Option<OrderByClause>,
}

impl SelectStatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_query_spec(&mut self, query: QuerySpec) -> SemanticResult<()> {
        if self.query.is_some() {
            return Err(SemanticError::ParsingContextMisuse(
                "query spec applied to a select statement twice".to_string(),
            ));
        }
        self.query = Some(query);
        Ok(())
    }

    pub fn apply_order_by(&mut self, order_by: OrderByClause) -> SemanticResult<()> {
        if self.order_by.is_some() {
            return Err(SemanticError::ParsingContextMisuse(
                "order-by clause applied to a select statement twice".to_string(),
            ));
        }
        self.order_by = Some(order_by);
        Ok(())
    }

    pub fn build(self) -> SemanticResult<SelectStatement> {
        let query = self.query.ok_or_else(|| {
            SemanticError::ParsingContextMisuse("select statement has no query spec".to_string())
        })?;
        Ok(SelectStatement {
            query,
            order_by: self.order_by.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub target: FromElementNode,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: AttributeReference,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub target: FromElementNode,
    pub where_clause: Option<Predicate>,
}

// ============================================================================
// Query spec
// ============================================================================

/// Shared by root queries and sub-queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub from_clause: FromClause,
    pub select_clause: SelectClause,
    pub where_clause: Option<Predicate>,
}

impl QuerySpec {
    pub fn visit_expressions<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        for selection in &self.select_clause.selections {
            selection.expression.visit(f);
        }
        for space in &self.from_clause.spaces {
            for join in &space.joins {
                if let Some(predicate) = &join.predicate {
                    predicate.visit_expressions(f);
                }
            }
        }
        if let Some(predicate) = &self.where_clause {
            predicate.visit_expressions(f);
        }
    }

    pub fn visit_expressions_mut(&mut self, f: &mut impl FnMut(&mut Expression)) {
        for selection in &mut self.select_clause.selections {
            selection.expression.visit_mut(f);
        }
        for space in &mut self.from_clause.spaces {
            for join in &mut space.joins {
                if let Some(predicate) = &mut join.predicate {
                    predicate.visit_expressions_mut(f);
                }
            }
        }
        if let Some(predicate) = &mut self.where_clause {
            predicate.visit_expressions_mut(f);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub expression: Expression,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderByClause {
    pub sort_specs: Vec<SortSpecification>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpecification {
    pub expression: Expression,
    pub order: SortOrder,
}

// ============================================================================
// From clause
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FromClause {
    pub spaces: Vec<FromElementSpace>,
}

impl FromClause {
    /// Every from-element of this clause in document order.
    pub fn elements(&self) -> impl Iterator<Item = &FromElementNode> {
        self.spaces
            .iter()
            .flat_map(|space| std::iter::once(&space.root).chain(space.joins.iter().map(|j| &j.target)))
    }
}

/// A root from-element and the joins hanging off it.
#[derive(Debug, Clone, PartialEq)]
pub struct FromElementSpace {
    pub root: FromElementNode,
    pub joins: Vec<QualifiedJoin>,
}

/// A from-element as it appears in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FromElementNode {
    pub alias: String,
    pub alias_generated: bool,
    pub entity: EntityReference,
    pub origin: FromElementOrigin,
}

impl FromElementNode {
    pub fn type_descriptor(&self) -> TypeDescriptor {
        self.entity.type_descriptor()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedJoin {
    pub kind: JoinKind,
    pub fetch: bool,
    pub target: FromElementNode,
    pub predicate: Option<Predicate>,
}

impl QualifiedJoin {
    /// A cross join cannot carry a join predicate, explicit or implied by
    /// joining through an association path.
    pub fn new(
        kind: JoinKind,
        fetch: bool,
        target: FromElementNode,
        predicate: Option<Predicate>,
    ) -> SemanticResult<Self> {
        if kind == JoinKind::Cross && predicate.is_some() {
            return Err(SemanticError::illegal(format!(
                "cross join to '{}' cannot have a join predicate",
                target.alias
            )));
        }
        if kind == JoinKind::Cross {
            if let FromElementOrigin::AttributeJoin { lhs_alias, attribute_path, .. } = &target.origin {
                return Err(SemanticError::illegal(format!(
                    "cross join cannot navigate '{}.{}'; use an inner or left join",
                    lhs_alias,
                    attribute_path.join(".")
                )));
            }
        }
        Ok(Self {
            kind,
            fetch,
            target,
            predicate,
        })
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Attribute(AttributeReference),
    /// A bare alias: the from-element itself.
    FromElement { alias: String, ty: TypeDescriptor },
    Literal(LiteralValue),
    Parameter(Parameter),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
        ty: Option<BasicType>,
    },
    Negated(Box<Expression>),
    Function {
        function: Function,
        distinct: bool,
        argument: Option<Box<Expression>>,
        ty: Option<TypeDescriptor>,
    },
}

impl Expression {
    /// The expression's type, when known.
    pub fn ty(&self) -> Option<TypeDescriptor> {
        match self {
            Expression::Attribute(attr) => Some(attr.ty.clone()),
            Expression::FromElement { ty, .. } => Some(ty.clone()),
            Expression::Literal(lit) => lit.ty().map(TypeDescriptor::basic),
            Expression::Parameter(param) => match &param.ty {
                ParameterType::Resolved(ty) => Some(ty.clone()),
                ParameterType::Unresolved => None,
            },
            Expression::Arithmetic { ty, .. } => ty.map(TypeDescriptor::basic),
            Expression::Negated(inner) => inner.ty(),
            Expression::Function { ty, .. } => ty.clone(),
        }
    }

    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        f(self);
        match self {
            Expression::Attribute(attr) => {
                for segment in &attr.segments {
                    if let Some(index) = &segment.index {
                        index.visit(f);
                    }
                }
            }
            Expression::Arithmetic { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expression::Negated(inner) => inner.visit(f),
            Expression::Function { argument, .. } => {
                if let Some(argument) = argument {
                    argument.visit(f);
                }
            }
            Expression::FromElement { .. } | Expression::Literal(_) | Expression::Parameter(_) => {}
        }
    }

    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Expression)) {
        f(self);
        match self {
            Expression::Attribute(attr) => {
                for segment in &mut attr.segments {
                    if let Some(index) = &mut segment.index {
                        index.visit_mut(f);
                    }
                }
            }
            Expression::Arithmetic { left, right, .. } => {
                left.visit_mut(f);
                right.visit_mut(f);
            }
            Expression::Negated(inner) => inner.visit_mut(f),
            Expression::Function { argument, .. } => {
                if let Some(argument) = argument {
                    argument.visit_mut(f);
                }
            }
            Expression::FromElement { .. } | Expression::Literal(_) | Expression::Parameter(_) => {}
        }
    }
}

/// A resolved attribute path rooted at a from-element.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeReference {
    /// Alias of the from-element the path starts at.
    pub source_alias: String,
    /// Type of that from-element.
    pub source_type: TypeDescriptor,
    pub segments: Vec<PathSegment>,
    /// Type of the whole path.
    pub ty: TypeDescriptor,
}

impl AttributeReference {
    /// `alias.a.b[]` form, for messages and implicit-join naming.
    pub fn dotted(&self) -> String {
        let mut out = self.source_alias.clone();
        for segment in &self.segments {
            out.push('.');
            out.push_str(&segment.attribute);
            if segment.index.is_some() {
                out.push_str("[]");
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub attribute: String,
    /// Declared type of the attribute.
    pub attribute_ty: TypeDescriptor,
    /// Index expression of an indexed-collection access.
    pub index: Option<Box<Expression>>,
    /// Type after this segment (the element type when indexed).
    pub ty: TypeDescriptor,
}

impl PathSegment {
    /// Key type of an indexed access: integer for lists, the key type for maps.
    pub fn index_type(&self) -> Option<&TypeDescriptor> {
        self.index.as_ref()?;
        self.attribute_ty.as_collection()?.index.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Integer(i64),
    Decimal(f64),
    String(String),
    Boolean(bool),
    Null,
}

impl LiteralValue {
    pub fn ty(&self) -> Option<BasicType> {
        match self {
            LiteralValue::Integer(v) if i32::try_from(*v).is_ok() => Some(BasicType::Integer),
            LiteralValue::Integer(_) => Some(BasicType::Long),
            LiteralValue::Decimal(_) => Some(BasicType::Double),
            LiteralValue::String(_) => Some(BasicType::String),
            LiteralValue::Boolean(_) => Some(BasicType::Boolean),
            LiteralValue::Null => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Named(String),
    /// `?N`; a bare `?` is numbered by occurrence.
    Positional(u32),
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterKind::Named(name) => write!(f, ":{}", name),
            ParameterKind::Positional(n) => write!(f, "?{}", n),
        }
    }
}

/// The type of a parameter, possibly supplied by a later binding pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    Unresolved,
    Resolved(TypeDescriptor),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub kind: ParameterKind,
    pub ty: ParameterType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Upper,
    Lower,
    Length,
    Abs,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "count" => Some(Function::Count),
            "sum" => Some(Function::Sum),
            "avg" => Some(Function::Avg),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            "upper" => Some(Function::Upper),
            "lower" => Some(Function::Lower),
            "length" => Some(Function::Length),
            "abs" => Some(Function::Abs),
            _ => None,
        }
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            Function::Count => "COUNT",
            Function::Sum => "SUM",
            Function::Avg => "AVG",
            Function::Min => "MIN",
            Function::Max => "MAX",
            Function::Upper => "UPPER",
            Function::Lower => "LOWER",
            Function::Length => "LENGTH",
            Function::Abs => "ABS",
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Function::Count | Function::Sum | Function::Avg | Function::Min | Function::Max
        )
    }
}

// ============================================================================
// Predicates
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Comparison {
        op: ComparisonOp,
        left: Expression,
        right: Expression,
    },
    InList {
        test: Expression,
        values: Vec<Expression>,
        negated: bool,
    },
    InSubQuery {
        test: Expression,
        sub_query: Box<QuerySpec>,
        negated: bool,
    },
    /// `collection` is always an [`Expression::Attribute`] of plural type.
    MemberOf {
        element: Expression,
        collection: Expression,
        negated: bool,
    },
    IsNull {
        expr: Expression,
        negated: bool,
    },
    Like {
        expr: Expression,
        pattern: Expression,
        negated: bool,
    },
    Between {
        expr: Expression,
        low: Expression,
        high: Expression,
        negated: bool,
    },
}

impl Predicate {
    pub fn visit_expressions<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        match self {
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.visit_expressions(f);
                r.visit_expressions(f);
            }
            Predicate::Not(inner) => inner.visit_expressions(f),
            Predicate::Comparison { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Predicate::InList { test, values, .. } => {
                test.visit(f);
                for value in values {
                    value.visit(f);
                }
            }
            Predicate::InSubQuery { test, sub_query, .. } => {
                test.visit(f);
                sub_query.visit_expressions(f);
            }
            Predicate::MemberOf {
                element, collection, ..
            } => {
                element.visit(f);
                collection.visit(f);
            }
            Predicate::IsNull { expr, .. } => expr.visit(f),
            Predicate::Like { expr, pattern, .. } => {
                expr.visit(f);
                pattern.visit(f);
            }
            Predicate::Between { expr, low, high, .. } => {
                expr.visit(f);
                low.visit(f);
                high.visit(f);
            }
        }
    }

    pub fn visit_expressions_mut(&mut self, f: &mut impl FnMut(&mut Expression)) {
        match self {
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.visit_expressions_mut(f);
                r.visit_expressions_mut(f);
            }
            Predicate::Not(inner) => inner.visit_expressions_mut(f),
            Predicate::Comparison { left, right, .. } => {
                left.visit_mut(f);
                right.visit_mut(f);
            }
            Predicate::InList { test, values, .. } => {
                test.visit_mut(f);
                for value in values {
                    value.visit_mut(f);
                }
            }
            Predicate::InSubQuery { test, sub_query, .. } => {
                test.visit_mut(f);
                sub_query.visit_expressions_mut(f);
            }
            Predicate::MemberOf {
                element, collection, ..
            } => {
                element.visit_mut(f);
                collection.visit_mut(f);
            }
            Predicate::IsNull { expr, .. } => expr.visit_mut(f),
            Predicate::Like { expr, pattern, .. } => {
                expr.visit_mut(f);
                pattern.visit_mut(f);
            }
            Predicate::Between { expr, low, high, .. } => {
                expr.visit_mut(f);
                low.visit_mut(f);
                high.visit_mut(f);
            }
        }
    }

    /// Visit predicates mutably, children before parents.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Predicate)) {
        match self {
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.visit_mut(f);
                r.visit_mut(f);
            }
            Predicate::Not(inner) => inner.visit_mut(f),
            Predicate::InSubQuery { sub_query, .. } => {
                if let Some(predicate) = &mut sub_query.where_clause {
                    predicate.visit_mut(f);
                }
            }
            _ => {}
        }
        f(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityType, TypeDescriptor};
    use std::sync::Arc;

    fn node(alias: &str) -> FromElementNode {
        FromElementNode {
            alias: alias.to_string(),
            alias_generated: false,
            entity: EntityReference::Concrete(Arc::new(EntityType {
                name: "Account".into(),
                class_name: None,
                super_type: None,
                implements: vec![],
                attributes: vec![],
            })),
            origin: FromElementOrigin::Root,
        }
    }

    fn query(alias: &str) -> QuerySpec {
        QuerySpec {
            from_clause: FromClause {
                spaces: vec![FromElementSpace {
                    root: node(alias),
                    joins: vec![],
                }],
            },
            select_clause: SelectClause::default(),
            where_clause: None,
        }
    }

    fn param(name: &str) -> Expression {
        Expression::Parameter(Parameter {
            kind: ParameterKind::Named(name.to_string()),
            ty: ParameterType::Unresolved,
        })
    }

    #[test]
    fn test_select_builder_accepts_one_of_each() {
        let mut builder = SelectStatementBuilder::new();
        builder.apply_query_spec(query("a")).expect("first query spec");
        builder
            .apply_order_by(OrderByClause::default())
            .expect("first order by");

        let err = builder
            .apply_query_spec(query("b"))
            .expect_err("second query spec must fail");
        assert!(err.is_internal());
        let err = builder
            .apply_order_by(OrderByClause::default())
            .expect_err("second order by must fail");
        assert!(err.is_internal());

        let select = builder.build().expect("build");
        assert_eq!(select.query.from_clause.spaces[0].root.alias, "a");
    }

    #[test]
    fn test_select_builder_requires_query_spec() {
        let err = SelectStatementBuilder::new()
            .build()
            .expect_err("missing query spec");
        assert!(matches!(err, SemanticError::ParsingContextMisuse(_)));
    }

    #[test]
    fn test_cross_join_rejects_predicate() {
        let predicate = Predicate::IsNull {
            expr: param("p"),
            negated: false,
        };
        let err = QualifiedJoin::new(JoinKind::Cross, false, node("b"), Some(predicate.clone()))
            .expect_err("cross join with predicate");
        assert!(matches!(err, SemanticError::IllegalOperatorUse(_)));

        assert!(QualifiedJoin::new(JoinKind::Cross, false, node("b"), None).is_ok());
        assert!(QualifiedJoin::new(JoinKind::Inner, false, node("b"), Some(predicate)).is_ok());
    }

    #[test]
    fn test_cross_join_rejects_association_path() {
        let mut target = node("i");
        target.origin = FromElementOrigin::AttributeJoin {
            lhs_alias: "o".into(),
            attribute_path: vec!["items".into()],
            collection: true,
        };
        let err = QualifiedJoin::new(JoinKind::Cross, false, target.clone(), None)
            .expect_err("cross join through a path");
        assert!(matches!(err, SemanticError::IllegalOperatorUse(_)));

        assert!(QualifiedJoin::new(JoinKind::Inner, false, target, None).is_ok());
    }

    #[test]
    fn test_parameters_distinct_in_order() {
        let mut spec = query("a");
        spec.where_clause = Some(Predicate::And(
            Box::new(Predicate::Comparison {
                op: ComparisonOp::Eq,
                left: param("y"),
                right: param("x"),
            }),
            Box::new(Predicate::Comparison {
                op: ComparisonOp::Eq,
                left: param("y"),
                right: Expression::Literal(LiteralValue::Integer(1)),
            }),
        ));
        let statement = Statement::Select(SelectStatement {
            query: spec,
            order_by: OrderByClause::default(),
        });

        let names: Vec<String> = statement
            .parameters()
            .iter()
            .map(|p| p.kind.to_string())
            .collect();
        assert_eq!(names, vec![":y", ":x"]);
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(LiteralValue::Integer(5).ty(), Some(BasicType::Integer));
        assert_eq!(LiteralValue::Integer(5_000_000_000).ty(), Some(BasicType::Long));
        assert_eq!(LiteralValue::Null.ty(), None);
        assert_eq!(
            Expression::Literal(LiteralValue::String("x".into())).ty(),
            Some(TypeDescriptor::basic(BasicType::String))
        );
    }

    #[test]
    fn test_function_names() {
        assert_eq!(Function::from_name("COUNT"), Some(Function::Count));
        assert_eq!(Function::from_name("frobnicate"), None);
        assert!(Function::Sum.is_aggregate());
        assert!(!Function::Upper.is_aggregate());
    }
}
