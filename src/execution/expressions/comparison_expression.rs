use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::common::exception::{JoinError, Result};
use crate::execution::expressions::join_predicate::JoinPredicate;
use crate::storage::table::tuple::Tuple;
use crate::types_db::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonType {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Compares one outer column with one inner column.
///
/// Comparisons involving NULL are never true. Comparing values of different
/// types is a predicate error.
#[derive(Debug, Clone)]
pub struct ComparisonExpression {
    outer_column: usize,
    inner_column: usize,
    comp_type: ComparisonType,
}

impl ComparisonExpression {
    pub fn new(outer_column: usize, inner_column: usize, comp_type: ComparisonType) -> Self {
        Self {
            outer_column,
            inner_column,
            comp_type,
        }
    }

    pub fn get_outer_column(&self) -> usize {
        self.outer_column
    }

    pub fn get_inner_column(&self) -> usize {
        self.inner_column
    }

    pub fn get_comp_type(&self) -> ComparisonType {
        self.comp_type
    }

    fn perform_comparison(&self, lhs: &Value, rhs: &Value) -> Result<bool> {
        if lhs.is_null() || rhs.is_null() {
            return Ok(false);
        }
        if std::mem::discriminant(lhs) != std::mem::discriminant(rhs) {
            return Err(JoinError::Predicate(format!(
                "cannot compare {} with {}",
                lhs, rhs
            )));
        }
        let ordering = lhs.cmp(rhs);
        Ok(match self.comp_type {
            ComparisonType::Equal => ordering == Ordering::Equal,
            ComparisonType::NotEqual => ordering != Ordering::Equal,
            ComparisonType::LessThan => ordering == Ordering::Less,
            ComparisonType::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonType::GreaterThan => ordering == Ordering::Greater,
            ComparisonType::GreaterThanOrEqual => ordering != Ordering::Less,
        })
    }
}

impl JoinPredicate for ComparisonExpression {
    fn evaluate(&self, outer: &Tuple, inner: &Tuple) -> Result<bool> {
        let lhs = outer.get_value(self.outer_column)?;
        let rhs = inner.get_value(self.inner_column)?;
        self.perform_comparison(lhs, rhs)
    }
}

impl Display for ComparisonExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self.comp_type {
            ComparisonType::Equal => "=",
            ComparisonType::NotEqual => "!=",
            ComparisonType::LessThan => "<",
            ComparisonType::LessThanOrEqual => "<=",
            ComparisonType::GreaterThan => ">",
            ComparisonType::GreaterThanOrEqual => ">=",
        };
        write!(f, "outer.#{} {} inner.#{}", self.outer_column, op, self.inner_column)
    }
}
