//! Contract of the external expression engine.
//!
//! Expression parsing and evaluation live outside this workspace. Columns with
//! an `expression` compile their text once through an `ExpressionEngine` and
//! evaluate the compiled tree against each row. Engines must not keep hidden
//! state beyond a compile cache keyed by the source text.

use crate::error::Result;
use crate::row::RowRef;
use crate::value::Value;
use alloc::rc::Rc;

/// A compiled expression tree.
pub trait Expression {
    /// Evaluates the expression against a fresh row context.
    fn evaluate(&self, row: &RowRef<'_>) -> Value;
}

/// Compiles expression source text.
pub trait ExpressionEngine {
    /// Compiles `text`, failing with `Error::Expression` on invalid input.
    fn compile(&self, text: &str) -> Result<Rc<dyn Expression>>;
}
