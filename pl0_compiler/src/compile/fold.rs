//! Constant expression folding.
//!
//! Folding runs on the decorated tree, after name resolution has replaced
//! constant references with their values. A pure integer subtree is
//! rewritten to a single literal in place, so the code generator only ever
//! sees the folded form. The folder uses the exact arithmetic of the
//! virtual machine — wrapping operations and division truncating toward
//! zero — so a folded expression and its unfolded original compute the
//! same value.
use pl0::error::{Diagnostic, Phase};

use crate::ast::{BinOp, Cond, Expr, NameTarget, RelOp, UnaryOp};

/// Fold `expr` and every foldable subtree of it, in place.
///
/// Returns the value when the whole expression folded. A divisor that
/// folds to zero is reported as a semantic error and poisons the
/// enclosing tree, which is left unfolded.
pub(crate) fn fold_expr(expr: &mut Expr, diagnostics: &mut Vec<Diagnostic>) -> Option<i64> {
    let folded = match expr {
        Expr::Num { value, .. } => return Some(*value),
        Expr::Name(name) => match name.target {
            Some(NameTarget::Const(value)) => Some(value),
            _ => None,
        },
        Expr::Unary { op, expr: inner, .. } => {
            match (*op, fold_expr(inner, diagnostics)) {
                (UnaryOp::Plus, Some(value)) => Some(value),
                (UnaryOp::Minus, Some(value)) => Some(value.wrapping_neg()),
                (_, None) => None,
            }
        }
        Expr::Binary { op, lhs, rhs, line } => {
            let lhs = fold_expr(lhs, diagnostics);
            let rhs = fold_expr(rhs, diagnostics);

            if *op == BinOp::Div && rhs == Some(0) {
                diagnostics.push(Diagnostic::error(Phase::Semantic, *line, "division by zero"));
                None
            } else {
                match (lhs, rhs) {
                    (Some(lhs), Some(rhs)) => Some(match op {
                        BinOp::Add => lhs.wrapping_add(rhs),
                        BinOp::Sub => lhs.wrapping_sub(rhs),
                        BinOp::Mul => lhs.wrapping_mul(rhs),
                        BinOp::Div => lhs.wrapping_div(rhs),
                    }),
                    _ => None,
                }
            }
        }
    };

    if let Some(value) = folded {
        let line = expr.line();
        *expr = Expr::Num { value, line };
    }
    folded
}

/// Fold both sides of a condition and compute its truth when possible.
///
/// Conditions keep their shape — only their operand expressions are
/// rewritten — but a statically-known truth value is returned so the
/// analyzer can flag dead branches and trivial infinite loops.
pub(crate) fn fold_cond(cond: &mut Cond, diagnostics: &mut Vec<Diagnostic>) -> Option<bool> {
    match cond {
        Cond::Odd { expr, .. } => fold_expr(expr, diagnostics).map(|value| value % 2 != 0),
        Cond::Rel { op, lhs, rhs, .. } => {
            let lhs = fold_expr(lhs, diagnostics);
            let rhs = fold_expr(rhs, diagnostics);
            match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => Some(match op {
                    RelOp::Eq => lhs == rhs,
                    RelOp::Ne => lhs != rhs,
                    RelOp::Lt => lhs < rhs,
                    RelOp::Le => lhs <= rhs,
                    RelOp::Gt => lhs > rhs,
                    RelOp::Ge => lhs >= rhs,
                }),
                _ => None,
            }
        }
    }
}
