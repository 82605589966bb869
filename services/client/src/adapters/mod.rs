pub mod remote;
pub mod store;

pub use remote::HttpBackendClient;
pub use store::SqliteDocumentStore;
