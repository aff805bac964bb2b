pub mod batch_file;
pub mod batch_spill_manager;
