pub mod client;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod value;

use crate::config::CollectionKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use client::{Collection, FirestoreClient};
pub use error::{PersistenceError, PersistenceResult};
pub use gateway::{shared_gateway, StoreGateway};

/// A document type stored in exactly one logical collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const KIND: CollectionKind;
}
