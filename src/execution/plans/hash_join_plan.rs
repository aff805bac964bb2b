use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::common::exception::Result;
use crate::container::skew_table::SkewHint;
use crate::execution::expressions::join_keys::JoinKeys;
use crate::execution::expressions::join_predicate::JoinPredicate;
use crate::storage::table::tuple::Tuple;

/// Average bytes assumed per column when the plan carries no width estimate.
const DEFAULT_COLUMN_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

impl JoinType {
    /// Unmatched outer rows are emitted (null-extended, or bare for anti joins).
    pub fn fills_outer(self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full | JoinType::Anti)
    }

    /// Unmatched inner rows are emitted null-extended.
    pub fn fills_inner(self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }

    /// Output rows carry only the outer columns.
    pub fn outer_columns_only(self) -> bool {
        matches!(self, JoinType::Semi | JoinType::Anti)
    }
}

impl Display for JoinType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinType::Inner => "Inner",
            JoinType::Left => "Left",
            JoinType::Right => "Right",
            JoinType::Full => "Full",
            JoinType::Semi => "Semi",
            JoinType::Anti => "Anti",
        };
        write!(f, "{}", name)
    }
}

/// Everything the join engines need to know about one hash join.
///
/// The outer input is the probe side and the inner input the build side.
/// Matching rows must have equal keys and pass the join predicate; the
/// filter is applied afterwards to every emitted row, including
/// null-extended ones, and does not affect which rows count as matched.
#[derive(Clone)]
pub struct HashJoinPlan {
    join_type: JoinType,
    keys: JoinKeys,
    join_predicate: Option<Arc<dyn JoinPredicate>>,
    filter: Option<Arc<dyn JoinPredicate>>,
    outer_width: usize,
    inner_width: usize,
    inner_unique: bool,
    estimated_inner_rows: usize,
    inner_row_width: usize,
    skew_hint: Option<SkewHint>,
}

impl HashJoinPlan {
    pub fn new(join_type: JoinType, keys: JoinKeys, outer_width: usize, inner_width: usize) -> Self {
        Self {
            join_type,
            keys,
            join_predicate: None,
            filter: None,
            outer_width,
            inner_width,
            inner_unique: false,
            estimated_inner_rows: 0,
            inner_row_width: inner_width * DEFAULT_COLUMN_WIDTH,
            skew_hint: None,
        }
    }

    pub fn with_join_predicate(mut self, predicate: Arc<dyn JoinPredicate>) -> Self {
        self.join_predicate = Some(predicate);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn JoinPredicate>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Declares that every outer row matches at most one inner row.
    pub fn with_inner_unique(mut self, inner_unique: bool) -> Self {
        self.inner_unique = inner_unique;
        self
    }

    /// Size estimate of the inner input, used to size the hash table.
    pub fn with_estimates(mut self, rows: usize, row_width: usize) -> Self {
        self.estimated_inner_rows = rows;
        self.inner_row_width = row_width;
        self
    }

    pub fn with_skew_hint(mut self, hint: SkewHint) -> Self {
        self.skew_hint = Some(hint);
        self
    }

    pub fn get_join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn get_keys(&self) -> &JoinKeys {
        &self.keys
    }

    pub fn get_outer_width(&self) -> usize {
        self.outer_width
    }

    pub fn get_inner_width(&self) -> usize {
        self.inner_width
    }

    pub fn get_output_width(&self) -> usize {
        if self.join_type.outer_columns_only() {
            self.outer_width
        } else {
            self.outer_width + self.inner_width
        }
    }

    pub fn get_estimated_inner_rows(&self) -> usize {
        self.estimated_inner_rows
    }

    pub fn get_inner_row_width(&self) -> usize {
        self.inner_row_width
    }

    pub fn get_skew_hint(&self) -> Option<&SkewHint> {
        self.skew_hint.as_ref()
    }

    pub fn is_inner_unique(&self) -> bool {
        self.inner_unique
    }

    /// An outer row is done after its first match.
    pub fn single_match(&self) -> bool {
        self.inner_unique || matches!(self.join_type, JoinType::Semi | JoinType::Anti)
    }

    /// Key equality followed by the join predicate.
    pub fn matches(&self, outer: &Tuple, inner: &Tuple) -> Result<bool> {
        if !self.keys.keys_equal(outer, inner)? {
            return Ok(false);
        }
        match &self.join_predicate {
            Some(predicate) => predicate.evaluate(outer, inner),
            None => Ok(true),
        }
    }

    pub fn passes_filter(&self, outer: &Tuple, inner: &Tuple) -> Result<bool> {
        match &self.filter {
            Some(filter) => filter.evaluate(outer, inner),
            None => Ok(true),
        }
    }

    /// Output row for a matched pair, if it passes the filter. Joined rows
    /// carry the inner columns first, then the outer columns.
    pub fn project_match(&self, outer: &Tuple, inner: &Tuple) -> Result<Option<Tuple>> {
        if !self.passes_filter(outer, inner)? {
            return Ok(None);
        }
        if self.join_type.outer_columns_only() {
            Ok(Some(outer.clone()))
        } else {
            Ok(Some(inner.combine(outer)))
        }
    }

    /// Output row for an outer row without a match, if it passes the filter.
    pub fn project_outer_unmatched(&self, outer: &Tuple) -> Result<Option<Tuple>> {
        let nulls = Tuple::null(self.inner_width);
        if !self.passes_filter(outer, &nulls)? {
            return Ok(None);
        }
        if self.join_type.outer_columns_only() {
            Ok(Some(outer.clone()))
        } else {
            Ok(Some(nulls.combine(outer)))
        }
    }

    /// Output row for an inner row without a match, if it passes the filter.
    pub fn project_inner_unmatched(&self, inner: &Tuple) -> Result<Option<Tuple>> {
        let nulls = Tuple::null(self.outer_width);
        if !self.passes_filter(&nulls, inner)? {
            return Ok(None);
        }
        Ok(Some(inner.combine(&nulls)))
    }
}

impl Debug for HashJoinPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashJoinPlan")
            .field("join_type", &self.join_type)
            .field("keys", &self.keys)
            .field("has_join_predicate", &self.join_predicate.is_some())
            .field("has_filter", &self.filter.is_some())
            .field("outer_width", &self.outer_width)
            .field("inner_width", &self.inner_width)
            .field("inner_unique", &self.inner_unique)
            .field("estimated_inner_rows", &self.estimated_inner_rows)
            .finish()
    }
}

impl Display for HashJoinPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HashJoin {{ type={}, outer_keys={:?}, inner_keys={:?} }}",
            self.join_type,
            self.keys.outer_columns(),
            self.keys.inner_columns()
        )
    }
}
