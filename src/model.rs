//! Row types for the `entries` and `categories` collections.
//!
//! These mirror the backend's row schemas. Ids are kept as strings on the
//! client side; the backend may hand out integer keys, which are accepted and
//! converted on the way in.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EntryId = String;
pub type CategoryId = String;

// ============================================================================
// Status
// ============================================================================

/// Workflow status of an entry. Each status occupies one bit so that a set of
/// hidden statuses can be expressed as a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    New = 1,
    Waiting = 2,
    Urgent = 4,
    Done = 8,
}

impl Status {
    /// All statuses in display order.
    pub const ALL: [Status; 4] = [Status::New, Status::Waiting, Status::Urgent, Status::Done];

    pub fn bits(self) -> i32 {
        self as i32
    }

    /// Map a raw status column value to a known status.
    ///
    /// Rows written by other clients may carry combined or unknown bits;
    /// those yield `None` and are rendered as unknown.
    pub fn from_bits(bits: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.bits() == bits)
    }

    /// Parse a status name (case-insensitive).
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "waiting" => Some(Self::Waiting),
            "urgent" => Some(Self::Urgent),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Waiting => "waiting",
            Self::Urgent => "urgent",
            Self::Done => "done",
        }
    }

    /// Single-column glyph for list rendering.
    pub fn icon(self) -> &'static str {
        match self {
            Self::New => "+",
            Self::Waiting => "~",
            Self::Urgent => "!",
            Self::Done => "x",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Rows
// ============================================================================

/// A task or note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(deserialize_with = "id_serde::required")]
    pub id: EntryId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub label: String,
    /// Markdown body shown on the detail page.
    #[serde(default)]
    pub text: Option<String>,
    /// Raw status bits. See [`Status`].
    pub status: i32,
    #[serde(default, deserialize_with = "id_serde::optional")]
    pub category: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn status_kind(&self) -> Option<Status> {
        Status::from_bits(self.status)
    }

    /// Time of the last mutation, falling back to creation time for rows
    /// that were never updated.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.modified_at.unwrap_or(self.created_at)
    }
}

/// A node in the category forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "id_serde::required")]
    pub id: CategoryId,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "id_serde::optional")]
    pub parent: Option<CategoryId>,
}

impl Category {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("Untitled")
    }
}

// ============================================================================
// Insert / update payloads
// ============================================================================

/// Payload for inserting an entry. The backend fills in id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEntry {
    pub label: String,
    pub status: i32,
    pub category: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl NewEntry {
    /// A fresh entry in `category`, starting out as [`Status::New`].
    pub fn new(label: impl Into<String>, category: Option<CategoryId>) -> Self {
        Self {
            label: label.into(),
            status: Status::New.bits(),
            category,
            text: None,
        }
    }
}

/// Partial update of one entry. Only `Some` fields are sent.
///
/// `text` and `category` are doubly optional: `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryPatch {
    #[serde(skip)]
    pub id: EntryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<CategoryId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl EntryPatch {
    pub fn new(id: impl Into<EntryId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn text(mut self, text: Option<String>) -> Self {
        self.text = Some(text);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status.bits());
        self
    }

    pub fn category(mut self, category: Option<CategoryId>) -> Self {
        self.category = Some(category);
        self
    }

    /// True when no column would change (timestamps excluded).
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.text.is_none() && self.status.is_none() && self.category.is_none()
    }
}

/// Payload for inserting a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCategory {
    pub label: String,
    pub parent: Option<CategoryId>,
}

/// Partial update of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryPatch {
    #[serde(skip)]
    pub id: CategoryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Option<CategoryId>>,
}

// ============================================================================
// Serde helpers
// ============================================================================

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept both text and integer primary keys.
mod id_serde {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    impl From<RawId> for String {
        fn from(raw: RawId) -> Self {
            match raw {
                RawId::Text(s) => s,
                RawId::Int(n) => n.to_string(),
            }
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        RawId::deserialize(deserializer).map(String::from)
    }

    pub fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
    }
}
