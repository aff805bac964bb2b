pub mod executors;
pub mod expressions;
pub mod plans;
