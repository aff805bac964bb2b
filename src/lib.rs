pub mod common;
pub mod concurrency;
pub mod container;
pub mod execution;
pub mod storage;
pub mod types_db;
