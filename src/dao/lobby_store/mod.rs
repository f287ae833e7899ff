pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{PartyEntity, UserEntity, UserStatsEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

pub use memory::MemoryStore;

/// Abstraction over the persistence layer for parties and the account records the lobby reads.
///
/// Party operations are the lobby's own; user operations are the narrow slice of the
/// authentication collaborator's interface the lobby depends on.
pub trait LobbyStore: Send + Sync {
    fn find_party(&self, code: String) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>>;
    fn find_party_by_member(
        &self,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>>;
    /// Any public party whose member count is strictly below `capacity`.
    fn find_open_public_party(
        &self,
        capacity: usize,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>>;
    fn list_parties_with_member(
        &self,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>>;
    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_party(&self, code: String) -> BoxFuture<'static, StorageResult<bool>>;
    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn update_user_stats(
        &self,
        id: String,
        stats: UserStatsEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn set_current_party(
        &self,
        id: String,
        code: Option<String>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
