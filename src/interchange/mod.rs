pub mod import;
pub mod export;

pub use import::{read_import, read_import_file};
pub use export::{write_export, write_export_file};
