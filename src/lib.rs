//! Campus assistant client core.
//!
//! Resolves who the user is (signed-in profile, guest or anonymous), gates
//! views on that role, keeps the answering endpoint configured locally and runs
//! the question/answer chat loop against it.

pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use frameworks::config::AppConfig;
pub use frameworks::context::{AppContext, assemble, bootstrap, launch};
