pub mod json_store;
pub mod repository;

pub use repository::{open, UserRepository};
