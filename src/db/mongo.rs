use super::{Document, DocumentStore, StoreError};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection,
};
use std::sync::Arc;
use std::time::Duration;

pub async fn create_mongo_client(uri: &str) -> Result<Arc<Client>, mongodb::error::Error> {
    log::info!("Connecting to MongoDB");

    let mut client_options = ClientOptions::parse(uri).await?;

    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    let client = Client::with_options(client_options)?;

    match client
        .database("TripCurator")
        .run_command(doc! {"ping": 1})
        .await
    {
        Ok(_) => log::info!("Connected to MongoDB and verified with ping command"),
        Err(e) => log::warn!(
            "Connected to MongoDB but ping failed, persistence may be impaired: {}",
            e
        ),
    }

    Ok(Arc::new(client))
}

/// Documents keyed by their own `id` field.
pub struct MongoStore<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T: Document> MongoStore<T> {
    pub fn new(collection: Collection<T>) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl<T: Document> DocumentStore<T> for MongoStore<T> {
    async fn list(&self) -> Result<Vec<T>, StoreError> {
        let cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.collection.find_one(doc! { "id": id }).await?)
    }

    async fn upsert(&self, doc: T) -> Result<(), StoreError> {
        let id = doc.id().to_string();
        self.collection
            .replace_one(doc! { "id": id }, &doc)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = self.collection.delete_one(doc! { "id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
