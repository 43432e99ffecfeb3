pub mod artifact;
pub mod config;
pub mod identity;
pub mod lock;
pub mod model;
pub mod pacing;
pub mod paths;
pub mod pipeline;
pub mod report;
pub mod summarize;
#[cfg(test)]
pub mod testing;
pub mod thread;
