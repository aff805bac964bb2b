pub mod bucket_store;
pub mod hash_function;
pub mod hash_join_table;
pub mod skew_table;
