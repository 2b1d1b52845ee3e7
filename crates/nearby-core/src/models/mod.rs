//! Data models for friend visibility.
//!
//! - `FriendRecord`: a friend with their last-known position
//! - `NearbyFriends`: the decoded result of the nearby-friends cloud function
//! - `FriendResponse`, `NearbyFriendsResponse`: wire shapes returned by the server

pub mod friend;

pub use friend::{FriendRecord, FriendResponse, LocationResponse, NearbyFriends, NearbyFriendsResponse};
