use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::info;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoPartyDocument, party_filter, user_filter, user_from_document},
};
use crate::dao::{
    lobby_store::LobbyStore,
    models::{PartyEntity, PartyKindEntity, UserEntity, UserStatsEntity},
    storage::StorageResult,
};

const PARTY_COLLECTION_NAME: &str = "parties";
const USER_COLLECTION_NAME: &str = "users";

/// MongoDB-backed [`LobbyStore`].
#[derive(Clone)]
pub struct MongoLobbyStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoLobbyStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        info!(
            database = %store.inner.config.database_name,
            "connected to MongoDB lobby store"
        );
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.parties().await;

        let code_index = IndexModel::builder()
            .keys(doc! {"code": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("party_code_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        collection
            .create_index(code_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTY_COLLECTION_NAME,
                index: "code",
                source,
            })?;

        let ttl_index = IndexModel::builder()
            .keys(doc! {"createdAt": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("party_ttl_idx".to_owned()))
                    .expire_after(Some(self.inner.config.party_ttl))
                    .build(),
            )
            .build();
        collection
            .create_index(ttl_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTY_COLLECTION_NAME,
                index: "createdAt",
                source,
            })?;

        Ok(())
    }

    async fn parties(&self) -> Collection<MongoPartyDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPartyDocument>(PARTY_COLLECTION_NAME)
    }

    async fn users(&self) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(USER_COLLECTION_NAME)
    }

    async fn find_party_matching(&self, filter: Document) -> MongoResult<Option<PartyEntity>> {
        let collection = self.parties().await;
        let document = collection
            .find_one(filter)
            .sort(doc! {"createdAt": 1})
            .await
            .map_err(|source| MongoDaoError::LoadParties { source })?;
        Ok(document.map(Into::into))
    }

    async fn list_parties_matching(&self, filter: Document) -> MongoResult<Vec<PartyEntity>> {
        let collection = self.parties().await;
        let documents: Vec<MongoPartyDocument> = collection
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::LoadParties { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadParties { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_party(&self, party: PartyEntity) -> MongoResult<()> {
        let code = party.code.clone();
        let document: MongoPartyDocument = party.into();
        let collection = self.parties().await;
        collection
            .replace_one(party_filter(&code), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveParty { code, source })?;
        Ok(())
    }

    async fn delete_party(&self, code: String) -> MongoResult<bool> {
        let collection = self.parties().await;
        let result = collection
            .delete_one(party_filter(&code))
            .await
            .map_err(|source| MongoDaoError::DeleteParty { code, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn find_user(&self, id: String) -> MongoResult<Option<UserEntity>> {
        let collection = self.users().await;
        let document = collection
            .find_one(user_filter(&id))
            .await
            .map_err(|source| MongoDaoError::LoadUser { id, source })?;
        Ok(document.as_ref().and_then(user_from_document))
    }

    async fn update_user(&self, id: String, update: Document) -> MongoResult<()> {
        let collection = self.users().await;
        collection
            .update_one(user_filter(&id), update)
            .await
            .map_err(|source| MongoDaoError::UpdateUser { id, source })?;
        Ok(())
    }
}

impl LobbyStore for MongoLobbyStore {
    fn find_party(&self, code: String) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_party_matching(party_filter(&code))
                .await
                .map_err(Into::into)
        })
    }

    fn find_party_by_member(
        &self,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_party_matching(doc! {"members.id": member_id})
                .await
                .map_err(Into::into)
        })
    }

    fn find_open_public_party(
        &self,
        capacity: usize,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let capacity = capacity as i64;
            let filter = doc! {
                "type": "public",
                "$expr": { "$lt": [ { "$size": "$members" }, capacity ] },
            };
            let party = store.find_party_matching(filter).await?;
            Ok(party.filter(|party| party.kind == PartyKindEntity::Public))
        })
    }

    fn list_parties_with_member(
        &self,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_parties_matching(doc! {"members.id": member_id})
                .await
                .map_err(Into::into)
        })
    }

    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_party(party).await.map_err(Into::into) })
    }

    fn delete_party(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_party(code).await.map_err(Into::into) })
    }

    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(id).await.map_err(Into::into) })
    }

    fn update_user_stats(
        &self,
        id: String,
        stats: UserStatsEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let update = doc! {
                "$set": {
                    "elo": stats.rating,
                    "xp": i64::from(stats.xp),
                    "gamesPlayed": i64::from(stats.games_played),
                }
            };
            store.update_user(id, update).await.map_err(Into::into)
        })
    }

    fn set_current_party(
        &self,
        id: String,
        code: Option<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let value = code.map_or(Bson::Null, Bson::String);
            let update = doc! { "$set": { "currentParty": value } };
            store.update_user(id, update).await.map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
