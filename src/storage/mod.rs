pub mod file_lock;
pub mod log;
pub mod kv;
pub mod records;
