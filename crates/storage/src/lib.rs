#![forbid(unsafe_code)]

pub mod document;
pub mod repository;
pub mod sqlite;

pub use document::{LocalProgressStore, PROGRESS_KEY, RemoteRecord};
pub use repository::{
    InMemoryLocalStore, InMemoryRemoteStore, LocalStore, RemoteCounterField, RemoteSetField,
    RemoteStore, Storage, StorageError,
};
