#![forbid(unsafe_code)]

pub mod azure;
pub mod cache;
pub mod http;
pub mod local;
pub mod store;
mod xlsx;

pub use azure::BlobStore;
pub use cache::CachedStore;
pub use http::HttpStore;
pub use local::LocalStore;
pub use store::{BankStore, InMemoryStore, StoreError, layout, open_store};
