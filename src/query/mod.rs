pub mod engine;
pub mod sampler;
pub mod random_cache;
