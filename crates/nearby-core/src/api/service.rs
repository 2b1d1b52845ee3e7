use async_trait::async_trait;

use crate::models::NearbyFriends;

use super::RemoteCallFailure;

/// The remote operations the friend visibility cache depends on.
///
/// `ApiClient` talks to the real cloud functions; tests substitute scripted
/// implementations.
#[async_trait]
pub trait FriendService: Send + Sync {
    /// Fetch the current best and nearby friends for the signed-in user
    async fn fetch_nearby_friends(&self) -> Result<NearbyFriends, RemoteCallFailure>;

    /// Ask the server to recompute the user's friend graph
    async fn trigger_friend_sync(&self) -> Result<(), RemoteCallFailure>;
}
