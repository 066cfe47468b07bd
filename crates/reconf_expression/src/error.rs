//! Error types for expression parsing.

use thiserror::Error;

/// Result type for expression parsing.
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Why an expression was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The expression is empty or blank.
    #[error("Incorrect trigger expression. Expression cannot be empty.")]
    Empty,

    /// Parsing stopped at a position that cannot be understood.
    #[error("Incorrect trigger expression. Check expression part starting from \"{fragment}\".")]
    Syntax {
        /// Byte offset of the offending part.
        position: usize,
        /// Remainder of the expression from that offset.
        fragment: String,
    },

    /// The expression ends where an operand or closing bracket is required.
    #[error("Incorrect trigger expression. Unexpected end of expression.")]
    UnexpectedEnd,

    /// Parentheses are nested deeper than the parser allows.
    #[error("Incorrect trigger expression. Nesting is deeper than {max} levels.")]
    TooDeep {
        /// The nesting limit.
        max: usize,
    },

    /// The expression does not reference any item.
    #[error("Trigger expression must contain at least one host:key reference.")]
    NoFunctionMacro,
}

impl ExpressionError {
    /// Creates a syntax error pointing at `position` inside `text`.
    pub(crate) fn at(text: &str, position: usize) -> Self {
        match text.get(position..) {
            Some(rest) if !rest.is_empty() => Self::Syntax {
                position,
                fragment: rest.to_string(),
            },
            _ => Self::UnexpectedEnd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_quotes_the_remainder() {
        let err = ExpressionError::at("{a:b.last()}=1 ?", 15);
        assert_eq!(
            err.to_string(),
            "Incorrect trigger expression. Check expression part starting from \"?\"."
        );
    }

    #[test]
    fn error_at_end_of_text() {
        assert_eq!(ExpressionError::at("1+", 2), ExpressionError::UnexpectedEnd);
    }
}
