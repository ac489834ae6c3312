use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Store-assigned row ids (BIGSERIAL in Postgres)
pub type Id = i64;

/// Identity of an actor as issued by the identity provider (JWT `sub`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Reference to a stored binary asset (content hash). Produced by the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AssetRef(pub String);

impl AssetRef {
    pub fn as_str(&self) -> &str { &self.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Community,
    Moderator,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

// Shared as_str / FromStr / Display plumbing for the lowercase text enums.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self { $($ty::$variant => $text),+ }
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(ParseEnumError { kind: $kind, value: s.to_string() }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }
    };
}

text_enum!(Role, "role", { Community => "community", Moderator => "moderator" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Health,
    Education,
    Transport,
    Security,
    Labor,
    Environment,
    Other,
}

text_enum!(Category, "category", {
    Health => "health",
    Education => "education",
    Transport => "transport",
    Security => "security",
    Labor => "labor",
    Environment => "environment",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Light,
    Medium,
    Severe,
}

text_enum!(Severity, "severity", { Light => "light", Medium => "medium", Severe => "severe" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
    Resolved,
}

text_enum!(Status, "status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Resolved => "resolved",
});

impl Status {
    /// Approved and resolved problems are part of the public feed.
    pub fn is_public(&self) -> bool { matches!(self, Status::Approved | Status::Resolved) }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Solution record written when a problem is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Resolution {
    pub description: String,
    pub link: Option<String>,
    pub after_image: Option<AssetRef>,
    pub resolved_by: ActorId,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: Id,
    pub owner: ActorId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub severity: Severity,
    pub affected: BTreeSet<String>,
    pub impact: BTreeSet<String>,
    pub location: Option<GeoPoint>,
    pub address: Option<String>,
    pub image: Option<AssetRef>,
    pub status: Status,
    /// Last recorded solution. Survives a re-open until the next resolve overwrites it.
    pub solution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
}

impl Problem {
    /// Effective resolution payload: present iff the problem is resolved.
    pub fn resolution(&self) -> Option<&Resolution> {
        match self.status {
            Status::Resolved => self.solution.as_ref(),
            _ => None,
        }
    }
}

/// Validated creation payload handed to the store.
#[derive(Debug, Clone)]
pub struct ProblemDraft {
    pub owner: ActorId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub severity: Severity,
    pub affected: BTreeSet<String>,
    pub impact: BTreeSet<String>,
    pub location: Option<GeoPoint>,
    pub address: Option<String>,
    pub image: Option<AssetRef>,
}

/// Client payload for reporting a problem.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewProblem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub affected: Vec<String>,
    #[serde(default)]
    pub impact: Vec<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub image: Option<AssetRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: Id,
    pub problem_id: Id,
    pub author: ActorId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Comment as listed in a thread, joined with its author's profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentView {
    pub id: Id,
    pub problem_id: Id,
    pub author: ActorId,
    pub author_name: Option<String>,
    pub author_role: Role,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub fn new(c: Comment, author_name: Option<String>, author_role: Role) -> Self {
        Self {
            id: c.id,
            problem_id: c.problem_id,
            author: c.author,
            author_name,
            author_role,
            body: c.body,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub problem_id: Id,
    pub author: ActorId,
    pub body: String,
}

/// Read model returned to clients: the problem plus derived engagement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProblemView {
    pub id: Id,
    pub owner: ActorId,
    pub owner_name: Option<String>,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub severity: Severity,
    pub affected: Vec<String>,
    pub impact: Vec<String>,
    pub location: Option<GeoPoint>,
    pub address: Option<String>,
    pub image: Option<AssetRef>,
    pub status: Status,
    pub resolution: Option<Resolution>,
    pub like_count: u64,
    pub created_at: DateTime<Utc>,
}

impl ProblemView {
    pub fn new(p: Problem, like_count: u64) -> Self {
        let resolution = p.resolution().cloned();
        Self {
            id: p.id,
            owner: p.owner,
            owner_name: None,
            title: p.title,
            description: p.description,
            category: p.category,
            severity: p.severity,
            affected: p.affected.into_iter().collect(),
            impact: p.impact.into_iter().collect(),
            location: p.location,
            address: p.address,
            image: p.image,
            status: p.status,
            resolution,
            like_count,
            created_at: p.created_at,
        }
    }

    pub fn with_owner_name(mut self, name: Option<String>) -> Self {
        self.owner_name = name;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LikeState {
    pub liked: bool,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProblemStats {
    pub total: u64,
    pub by_status: BTreeMap<Status, u64>,
    pub by_category: BTreeMap<Category, u64>,
}
