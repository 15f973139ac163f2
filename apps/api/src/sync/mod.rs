// Data synchronization: repository, change feed and per-user mirrors.

pub mod changes;
pub mod handlers;
pub mod repository;
pub mod session;

#[cfg(test)]
pub mod memory;
