//! Credentials store implementations.

mod environment;
mod file;
mod memory;

pub use environment::EnvironmentProvider;
pub use file::FileCredentialsProvider;
pub use memory::SimpleCredentialsProvider;
