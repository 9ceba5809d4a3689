//! Default-namespace qualification of compiled expressions

use crate::xpath::ast::{Axis, Expr, NodeTest, Step};

/// Give every unprefixed element name test the `prefix`, at any depth:
/// nested paths, predicates, filter expressions and function arguments.
/// Name tests on the attribute and namespace axes are left alone.
pub fn qualify_default_namespace(expr: &mut Expr, prefix: &str) {
    match expr {
        Expr::Binary { left, right, .. } | Expr::Union(left, right) => {
            qualify_default_namespace(left, prefix);
            qualify_default_namespace(right, prefix);
        }
        Expr::Negate(inner) => qualify_default_namespace(inner, prefix),
        Expr::Path(path) => qualify_steps(&mut path.steps, prefix),
        Expr::Filter {
            primary,
            predicates,
        } => {
            qualify_default_namespace(primary, prefix);
            for predicate in predicates {
                qualify_default_namespace(predicate, prefix);
            }
        }
        Expr::PathFrom { filter, steps } => {
            qualify_default_namespace(filter, prefix);
            qualify_steps(steps, prefix);
        }
        Expr::Function { args, .. } => {
            for arg in args {
                qualify_default_namespace(arg, prefix);
            }
        }
        Expr::Literal(_) | Expr::Number(_) | Expr::Variable(_) => {}
    }
}

fn qualify_steps(steps: &mut [Step], prefix: &str) {
    for step in steps {
        if !matches!(step.axis, Axis::Attribute | Axis::Namespace) {
            if let NodeTest::Name {
                prefix: name_prefix @ None,
                ..
            } = &mut step.test
            {
                *name_prefix = Some(prefix.to_string());
            }
        }
        for predicate in &mut step.predicates {
            qualify_default_namespace(predicate, prefix);
        }
    }
}
