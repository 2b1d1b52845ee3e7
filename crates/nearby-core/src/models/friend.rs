use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::utils::format_time_ago;

/// Horizontal accuracy reported for friends without a known location.
/// Negative accuracy marks the coordinates as invalid.
const UNKNOWN_ACCURACY: f64 = -1.0;

/// A friend and their last-known position.
///
/// Produced by decoding a server response and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FriendRecord {
    pub id: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    pub observed_at: DateTime<Utc>,
}

impl FriendRecord {
    /// Whether the coordinates can be trusted
    pub fn has_valid_location(&self) -> bool {
        self.accuracy >= 0.0
    }

    /// Short description of how long ago the friend was seen, e.g. "5m ago"
    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        format_time_ago(self.observed_at, now)
    }
}

/// Location attached to a friend on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct LocationResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    /// Seconds since the unix epoch
    pub timestamp: f64,
}

/// A friend as returned by the cloud function
#[derive(Debug, Clone, Deserialize)]
pub struct FriendResponse {
    #[serde(rename = "fbId", alias = "fbID")]
    pub fb_id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<LocationResponse>,
}

impl FriendResponse {
    pub fn to_friend(&self) -> FriendRecord {
        let (latitude, longitude, accuracy, observed_at) = match self.location {
            Some(ref loc) => (
                loc.latitude,
                loc.longitude,
                loc.accuracy,
                timestamp_to_datetime(loc.timestamp),
            ),
            None => (0.0, 0.0, UNKNOWN_ACCURACY, DateTime::<Utc>::UNIX_EPOCH),
        };

        FriendRecord {
            id: self.fb_id.clone(),
            display_name: self.name.clone(),
            latitude,
            longitude,
            accuracy,
            observed_at,
        }
    }
}

/// Convert fractional unix seconds to a UTC timestamp, clamping garbage to the epoch
fn timestamp_to_datetime(timestamp: f64) -> DateTime<Utc> {
    if !timestamp.is_finite() {
        return DateTime::<Utc>::UNIX_EPOCH;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999)).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Result payload of the `nearbyFriends` cloud function
#[derive(Debug, Clone, Deserialize)]
pub struct NearbyFriendsResponse {
    #[serde(rename = "bestFriends", default)]
    pub best_friends: Vec<FriendResponse>,
    #[serde(rename = "nearbyFriends", default)]
    pub nearby_friends: Vec<FriendResponse>,
}

impl NearbyFriendsResponse {
    pub fn to_nearby_friends(&self) -> NearbyFriends {
        NearbyFriends {
            best_friends: self.best_friends.iter().map(|f| f.to_friend()).collect(),
            nearby_friends: self.nearby_friends.iter().map(|f| f.to_friend()).collect(),
        }
    }
}

/// Friend lists returned by a successful fetch, in server order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NearbyFriends {
    pub best_friends: Vec<FriendRecord>,
    pub nearby_friends: Vec<FriendRecord>,
}
