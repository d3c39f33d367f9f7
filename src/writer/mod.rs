pub mod progress;
pub mod bulk_loader;
