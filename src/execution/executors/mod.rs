pub mod abstract_executor;
pub mod hash_join_executor;
pub mod input_adapter;
pub mod parallel_hash_join_executor;
pub mod symmetric_hash_join_executor;
pub mod values_executor;
