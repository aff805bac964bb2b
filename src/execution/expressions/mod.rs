pub mod comparison_expression;
pub mod join_keys;
pub mod join_predicate;
