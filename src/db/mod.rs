pub mod json_store;
pub mod mongo;

use crate::models::{itinerary::Itinerary, route::SavedRoute};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::{env, error::Error, fmt, path::PathBuf, sync::Arc};

const DEFAULT_DATA_DIR: &str = "./data";
const DATABASE_NAME: &str = "TripCurator";

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(mongodb::error::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "Storage I/O error: {}", err),
            StoreError::Serialization(err) => write!(f, "Storage serialization error: {}", err),
            StoreError::Database(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Database(err)
    }
}

/// A record that can be stored by id.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    fn id(&self) -> &str;
}

impl Document for SavedRoute {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for Itinerary {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
pub trait DocumentStore<T: Document>: Send + Sync {
    async fn list(&self) -> Result<Vec<T>, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<T>, StoreError>;
    async fn upsert(&self, doc: T) -> Result<(), StoreError>;
    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

/// Persistence for saved routes and itineraries.
#[derive(Clone)]
pub struct Stores {
    pub routes: Arc<dyn DocumentStore<SavedRoute>>,
    pub itineraries: Arc<dyn DocumentStore<Itinerary>>,
}

impl Stores {
    pub fn json(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            routes: Arc::new(json_store::JsonFileStore::new(
                data_dir.join("saved_routes.json"),
            )),
            itineraries: Arc::new(json_store::JsonFileStore::new(
                data_dir.join("itineraries.json"),
            )),
        }
    }

    /// MongoDB when `MONGODB_URI` is set, otherwise JSON files under `DATA_DIR`.
    pub async fn from_env() -> Result<Self, StoreError> {
        match env::var("MONGODB_URI") {
            Ok(uri) if !uri.trim().is_empty() => {
                let client = mongo::create_mongo_client(&uri).await?;
                let db = client.database(DATABASE_NAME);
                log::info!("Using MongoDB persistence ({})", DATABASE_NAME);
                Ok(Self {
                    routes: Arc::new(mongo::MongoStore::new(db.collection("SavedRoutes"))),
                    itineraries: Arc::new(mongo::MongoStore::new(db.collection("Itineraries"))),
                })
            }
            _ => {
                let data_dir =
                    env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
                log::info!("Using JSON file persistence under {}", data_dir);
                Ok(Self::json(data_dir))
            }
        }
    }
}
