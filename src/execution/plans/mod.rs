pub mod hash_join_plan;
