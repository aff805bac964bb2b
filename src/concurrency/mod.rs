pub mod barrier;
pub mod parallel_hash_join_state;
