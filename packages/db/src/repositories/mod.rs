//! Repository implementations for database operations.

mod alpha_repo;

pub use alpha_repo::AlphaRepository;
