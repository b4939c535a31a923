//! Vector-store clients for knowledge collections.
//!
//! `LanceStore` serves an embedded LanceDB directory, `QdrantStore` talks to a
//! Qdrant server over REST. `DefaultConnector` picks one from the backend URL.
//! `CollectionWriter` is the ingestion side for LanceDB.

pub mod connector;
pub mod lance_store;
pub mod qdrant;
pub mod schema;
pub mod table;
pub mod writer;

pub use connector::DefaultConnector;
pub use lance_store::LanceStore;
pub use qdrant::QdrantStore;
pub use writer::CollectionWriter;
