//! Plain-text rendering of the visible friend list.

use chrono::{DateTime, Utc};

use nearby_core::utils::{format_coordinate, truncate_string};
use nearby_core::{FriendRecord, VisibilitySnapshot};

/// Width of the name column
const NAME_WIDTH: usize = 24;

const NO_FRIENDS_NEARBY: &str = "No friends are nearby.";

fn render_friend(friend: &FriendRecord, now: DateTime<Utc>) -> String {
    let name = truncate_string(&friend.display_name, NAME_WIDTH);
    if friend.has_valid_location() {
        format!(
            "  {:<width$}  {}  ±{:.0}m  {}",
            name,
            format_coordinate(friend.latitude, friend.longitude),
            friend.accuracy,
            friend.age_display(now),
            width = NAME_WIDTH
        )
    } else {
        format!("  {:<width$}  location unknown", name, width = NAME_WIDTH)
    }
}

/// Render the snapshot as lines of text
pub fn render_snapshot(snapshot: &VisibilitySnapshot, now: DateTime<Utc>) -> Vec<String> {
    let (Some(nearby), Some(best)) = (snapshot.nearby(), snapshot.best()) else {
        return vec!["Loading friends...".to_string()];
    };

    let mut lines = vec![format!("Nearby ({}):", nearby.len())];
    if nearby.is_empty() {
        lines.push(format!("  {}", NO_FRIENDS_NEARBY));
    } else {
        lines.extend(nearby.iter().map(|f| render_friend(f, now)));
    }

    if !best.is_empty() {
        lines.push(format!("Best friends ({}):", best.len()));
        lines.extend(best.iter().map(|f| render_friend(f, now)));
    }

    lines.push(format!("Updated {}", snapshot.age_display(now)));
    lines
}
