//! Deferred parameter typing.
//!
//! The builder records every parameter as [`ParameterType::Unresolved`].
//! This pass gives a parameter the type of the expression it is compared
//! with, tested against or assigned to. A parameter with no typed
//! counterpart stays unresolved; that is a valid outcome, not an error.
//!
//! Once any occurrence of a parameter is typed, every other occurrence of
//! the same parameter gets that type too.

use std::collections::HashMap;

use crate::metadata::{BasicType, TypeDescriptor};

use super::tree::{Expression, ParameterKind, ParameterType, Predicate, QuerySpec, Statement};

/// Resolve parameter types in place.
pub fn infer_parameter_types(statement: &mut Statement) {
    match statement {
        Statement::Select(select) => infer_query_spec(&mut select.query),
        Statement::Update(update) => {
            for assignment in &mut update.assignments {
                let target = assignment.target.ty.clone();
                resolve_against(&mut assignment.value, Some(target));
                infer_expression(&mut assignment.value);
            }
            if let Some(predicate) = &mut update.where_clause {
                infer_predicate(predicate);
            }
        }
        Statement::Delete(delete) => {
            if let Some(predicate) = &mut delete.where_clause {
                infer_predicate(predicate);
            }
        }
    }

    propagate_by_kind(statement);
}

fn infer_query_spec(spec: &mut QuerySpec) {
    for selection in &mut spec.select_clause.selections {
        infer_expression(&mut selection.expression);
    }
    for space in &mut spec.from_clause.spaces {
        for join in &mut space.joins {
            if let Some(predicate) = &mut join.predicate {
                infer_predicate(predicate);
            }
        }
    }
    if let Some(predicate) = &mut spec.where_clause {
        infer_predicate(predicate);
    }
}

fn infer_predicate(predicate: &mut Predicate) {
    match predicate {
        Predicate::And(left, right) | Predicate::Or(left, right) => {
            infer_predicate(left);
            infer_predicate(right);
        }
        Predicate::Not(inner) => infer_predicate(inner),
        Predicate::Comparison { left, right, .. } => {
            infer_expression(left);
            infer_expression(right);
            resolve_pair(left, right);
        }
        Predicate::InList { test, values, .. } => {
            infer_expression(test);
            for value in values.iter_mut() {
                infer_expression(value);
            }
            let counterpart = test
                .ty()
                .or_else(|| values.iter().find_map(Expression::ty));
            resolve_against(test, counterpart.clone());
            for value in values.iter_mut() {
                resolve_against(value, counterpart.clone());
            }
        }
        Predicate::InSubQuery { test, sub_query, .. } => {
            infer_query_spec(sub_query);
            infer_expression(test);
            let selected = match sub_query.select_clause.selections.as_slice() {
                [single] => single.expression.ty(),
                _ => None,
            };
            resolve_against(test, selected);
        }
        Predicate::MemberOf {
            element, collection, ..
        } => {
            let element_ty = collection
                .ty()
                .and_then(|ty| ty.as_collection().map(|c| (*c.element).clone()));
            resolve_against(element, element_ty);
            infer_expression(element);
        }
        Predicate::IsNull { expr, .. } => infer_expression(expr),
        Predicate::Like { expr, pattern, .. } => {
            infer_expression(expr);
            infer_expression(pattern);
            let string = Some(TypeDescriptor::basic(BasicType::String));
            resolve_against(expr, string.clone());
            resolve_against(pattern, string);
        }
        Predicate::Between { expr, low, high, .. } => {
            infer_expression(expr);
            infer_expression(low);
            infer_expression(high);
            let counterpart = expr.ty().or_else(|| low.ty()).or_else(|| high.ty());
            resolve_against(expr, counterpart.clone());
            resolve_against(low, counterpart.clone());
            resolve_against(high, counterpart);
        }
    }
}

/// Arithmetic operands and index expressions inside an expression.
fn infer_expression(expr: &mut Expression) {
    match expr {
        Expression::Arithmetic { left, right, ty, .. } => {
            infer_expression(left);
            infer_expression(right);
            let numeric = ty.map(TypeDescriptor::basic);
            resolve_against(left, numeric.clone());
            resolve_against(right, numeric);
        }
        Expression::Negated(inner) => infer_expression(inner),
        Expression::Function { argument, .. } => {
            if let Some(argument) = argument {
                infer_expression(argument);
            }
        }
        Expression::Attribute(attribute) => {
            for segment in &mut attribute.segments {
                let index_ty = segment.index_type().cloned();
                if let Some(index) = &mut segment.index {
                    infer_expression(index);
                    resolve_against(index, index_ty);
                }
            }
        }
        Expression::FromElement { .. } | Expression::Literal(_) | Expression::Parameter(_) => {}
    }
}

fn resolve_pair(left: &mut Expression, right: &mut Expression) {
    let left_ty = left.ty();
    let right_ty = right.ty();
    resolve_against(left, right_ty);
    resolve_against(right, left_ty);
}

/// Give `expr` the type `counterpart` if it is an unresolved parameter.
fn resolve_against(expr: &mut Expression, counterpart: Option<TypeDescriptor>) {
    if let (Expression::Parameter(param), Some(ty)) = (expr, counterpart) {
        if param.ty == ParameterType::Unresolved {
            tracing::trace!(parameter = %param.kind, ty = %ty, "parameter type inferred");
            param.ty = ParameterType::Resolved(ty);
        }
    }
}

fn propagate_by_kind(statement: &mut Statement) {
    let mut known: HashMap<ParameterKind, TypeDescriptor> = HashMap::new();
    statement.visit_expressions(&mut |expr| {
        if let Expression::Parameter(param) = expr {
            if let ParameterType::Resolved(ty) = &param.ty {
                known.entry(param.kind.clone()).or_insert_with(|| ty.clone());
            }
        }
    });
    if known.is_empty() {
        return;
    }
    statement.visit_expressions_mut(&mut |expr| {
        if let Expression::Parameter(param) = expr {
            if param.ty == ParameterType::Unresolved {
                if let Some(ty) = known.get(&param.kind) {
                    param.ty = ParameterType::Resolved(ty.clone());
                }
            }
        }
    });
}
