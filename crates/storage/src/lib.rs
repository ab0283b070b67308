//! Storage abstraction and implementations for the mission board.
//!
//! This crate provides a whole-document store trait with a JSON file
//! implementation and an in-memory one.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{BoardStore, StorageError, Result};
pub use json_storage::JsonBoardStore;
pub use memory::MemoryBoardStore;
