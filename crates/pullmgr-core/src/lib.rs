pub mod config;
pub mod logging;

pub mod context;
pub mod entry;
pub mod lister;
pub mod manifest;
pub mod metrics;
pub mod monitor;
pub mod priority;
pub mod queue;
pub mod scheduler;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
