//! The caller of an engine operation.
//!
//! Every engine call receives the acting [`Actor`] explicitly; nothing in the
//! engine reads an ambient "current user".

use crate::error::{EngineError, EngineResult};
use crate::models::{ActorId, Problem, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Member { id: ActorId, role: Role },
}

/// What an actor may do to one particular problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub can_moderate: bool,
    pub is_owner: bool,
}

impl Actor {
    pub fn member(id: impl Into<String>, role: Role) -> Self {
        Actor::Member { id: ActorId::new(id), role }
    }

    pub fn community(id: impl Into<String>) -> Self { Self::member(id, Role::Community) }

    pub fn moderator(id: impl Into<String>) -> Self { Self::member(id, Role::Moderator) }

    pub fn id(&self) -> Option<&ActorId> {
        match self {
            Actor::Anonymous => None,
            Actor::Member { id, .. } => Some(id),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Actor::Anonymous => None,
            Actor::Member { role, .. } => Some(*role),
        }
    }

    pub fn is_authenticated(&self) -> bool { matches!(self, Actor::Member { .. }) }

    pub fn can_moderate(&self) -> bool { self.role() == Some(Role::Moderator) }

    pub fn owns(&self, problem: &Problem) -> bool {
        self.id().is_some_and(|id| *id == problem.owner)
    }

    pub fn capabilities_for(&self, problem: &Problem) -> Capabilities {
        Capabilities { can_moderate: self.can_moderate(), is_owner: self.owns(problem) }
    }

    /// Identity of an authenticated actor, or `Authentication` for anonymous callers.
    pub fn require_member(&self) -> EngineResult<&ActorId> {
        self.id().ok_or(EngineError::Authentication)
    }

    pub fn require_moderator(&self) -> EngineResult<&ActorId> {
        let id = self.require_member()?;
        if !self.can_moderate() {
            return Err(EngineError::Authorization);
        }
        Ok(id)
    }
}
