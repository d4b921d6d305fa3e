/// Label model
///
/// Labels are owned by a single user and attached to tasks by ID. A task may
/// carry label IDs whose label has since been deleted; those are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Color used when none is given
pub const DEFAULT_LABEL_COLOR: &str = "#9E9E9E";

/// A user-defined label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Unique label ID
    pub id: Uuid,

    /// Owner
    pub user_id: String,

    /// Display name
    pub name: String,

    /// Display color (hex RGB)
    pub color: String,

    /// When the label was created (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Label {
    /// Creates a label, falling back to the default color
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            color: color.unwrap_or_else(|| DEFAULT_LABEL_COLOR.to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Checks a `#RRGGBB` color string
pub fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}
