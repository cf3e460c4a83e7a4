/// State management module
///
/// This module handles all persistent inventory state, including:
/// - Shared data structures (data.rs)
/// - The record store contract every backend implements (store.rs)
/// - The embedded SQLite catalog (library.rs)
/// - The hosted, network-backed variant (remote.rs)

pub mod data;
pub mod library;
pub mod remote;
pub mod store;

pub use data::{Container, Photo, PhotoMeta};
pub use library::SqliteStore;
pub use remote::{RemoteApi, RemoteError, RemoteStore};
pub use store::RecordStore;
