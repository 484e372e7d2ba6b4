//! Shared test infrastructure.


/// Mock translation and memory backends.
pub mod mocks;
