//! Report status state machine.
//!
//! ```text
//!   Pending ──(moderator)──▶ Approved | Rejected
//!      ▲                          │
//!      └──────(moderator)─────────┘
//!   any non-Resolved ──(owner | moderator, resolve)──▶ Resolved
//!   Resolved ──(moderator re-open)──▶ Pending
//! ```

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::actor::Actor;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{Category, Id, NewProblem, Problem, ProblemDraft, ProblemView, Severity, Status};
use crate::repo::{ProblemRepo, RepoError};
use crate::resolution::{self, SolutionInput};
use crate::storage;
use crate::visibility;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

/// Targets a moderator may set directly. `Resolved` is reachable only through `resolve`.
pub fn is_moderation_target(target: Status) -> bool {
    matches!(target, Status::Pending | Status::Approved | Status::Rejected)
}

/// Whether `from -> to` is a legal `set_status` move (role checks aside).
pub fn moderation_allowed(from: Status, to: Status) -> bool {
    match (from, to) {
        (_, Status::Resolved) => false,
        (Status::Resolved, Status::Pending) => true, // re-open
        (Status::Resolved, _) => false,
        _ => true,
    }
}

fn required_text(field: &str, value: &str, max: usize) -> EngineResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(EngineError::Validation(format!("{field} exceeds {max} characters")));
    }
    Ok(value.to_string())
}

fn tag_set(tags: Vec<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

impl Engine {
    /// Report a new problem. The caller becomes its owner; status starts at `Pending`.
    pub async fn create_problem(&self, actor: &Actor, new: NewProblem) -> EngineResult<Problem> {
        let owner = actor.require_member()?.clone();
        let title = required_text("title", &new.title, MAX_TITLE_CHARS)?;
        let description = required_text("description", &new.description, MAX_DESCRIPTION_CHARS)?;
        if let Some(loc) = new.location {
            if !(-90.0..=90.0).contains(&loc.latitude) || !(-180.0..=180.0).contains(&loc.longitude) {
                return Err(EngineError::Validation("coordinates out of range".into()));
            }
        }
        if let Some(image) = &new.image {
            if !storage::is_valid_ref(image) {
                return Err(EngineError::Validation("image is not a stored asset reference".into()));
            }
        }
        let draft = ProblemDraft {
            owner,
            title,
            description,
            category: new.category.unwrap_or(Category::Other),
            severity: new.severity.unwrap_or(Severity::Medium),
            affected: tag_set(new.affected),
            impact: tag_set(new.impact),
            location: new.location,
            address: new.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            image: new.image,
        };
        let problem = self.repo.create_problem(draft).await?;
        info!(problem_id = problem.id, owner = %problem.owner, "problem reported");
        metrics::increment_counter!("ideahub_problems_created_total");
        Ok(problem)
    }

    /// Detail read. Hidden problems look missing, except to moderators.
    pub async fn get_problem(&self, actor: &Actor, id: Id) -> EngineResult<ProblemView> {
        let problem = self.readable_problem(actor, id).await?;
        self.view(problem).await
    }

    /// Problem the actor may read or engage with.
    pub(crate) async fn readable_problem(&self, actor: &Actor, id: Id) -> EngineResult<Problem> {
        let problem = self.repo.get_problem(id).await?;
        if actor.can_moderate() || visibility::is_visible(&problem, actor) {
            Ok(problem)
        } else {
            Err(EngineError::NotFound)
        }
    }

    /// Moderator status change among Pending, Approved and Rejected.
    pub async fn set_status(&self, id: Id, target: Status, actor: &Actor) -> EngineResult<Problem> {
        let moderator = actor.require_member()?;
        if !actor.can_moderate() || !is_moderation_target(target) {
            warn!(problem_id = id, actor = %moderator, target = %target, "status change refused");
            return Err(EngineError::Authorization);
        }
        let current = self.repo.get_problem(id).await?;
        if !moderation_allowed(current.status, target) {
            return Err(EngineError::Conflict(format!(
                "cannot move a {} problem to {}",
                current.status, target
            )));
        }
        let updated = self.repo.update_status(id, target).await.map_err(|e| match e {
            RepoError::Conflict => EngineError::Conflict(format!("cannot move a resolved problem to {target}")),
            other => other.into(),
        })?;
        info!(problem_id = id, actor = %moderator, from = %current.status, to = %target, "status changed");
        metrics::increment_counter!("ideahub_status_changes_total", "to" => target.as_str());
        Ok(updated)
    }

    /// Terminal transition with its solution payload, written as one unit.
    pub async fn resolve(&self, id: Id, actor: &Actor, solution: SolutionInput) -> EngineResult<Problem> {
        let checked = resolution::check(solution)?;
        let by = actor.require_member()?;
        let problem = self.repo.get_problem(id).await?;
        let caps = actor.capabilities_for(&problem);
        if !(caps.is_owner || caps.can_moderate) {
            warn!(problem_id = id, actor = %by, "resolve refused");
            return Err(EngineError::Authorization);
        }
        if problem.status == Status::Resolved {
            return Err(EngineError::Conflict("problem is already resolved".into()));
        }
        let resolved = self.repo.resolve_problem(id, checked.stamp(by)).await.map_err(|e| match e {
            RepoError::Conflict => EngineError::Conflict("problem is already resolved".into()),
            other => other.into(),
        })?;
        info!(problem_id = id, actor = %by, "problem resolved");
        metrics::increment_counter!("ideahub_problems_resolved_total");
        Ok(resolved)
    }

    /// Hard delete by owner or moderator; comments and likes go with it.
    pub async fn delete_problem(&self, id: Id, actor: &Actor) -> EngineResult<()> {
        let by = actor.require_member()?;
        let problem = self.repo.get_problem(id).await?;
        let caps = actor.capabilities_for(&problem);
        if !(caps.is_owner || caps.can_moderate) {
            warn!(problem_id = id, actor = %by, "delete refused");
            return Err(EngineError::Authorization);
        }
        self.repo.delete_problem(id).await?;
        info!(problem_id = id, actor = %by, "problem deleted");
        metrics::increment_counter!("ideahub_problems_deleted_total");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_only_reopens_to_pending() {
        assert!(moderation_allowed(Status::Resolved, Status::Pending));
        assert!(!moderation_allowed(Status::Resolved, Status::Approved));
        assert!(!moderation_allowed(Status::Resolved, Status::Rejected));
    }

    #[test]
    fn pre_resolution_states_are_any_to_any() {
        let pre = [Status::Pending, Status::Approved, Status::Rejected];
        for from in pre {
            for to in pre {
                assert!(moderation_allowed(from, to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn resolved_is_never_a_moderation_target() {
        assert!(!is_moderation_target(Status::Resolved));
        for from in Status::ALL {
            assert!(!moderation_allowed(*from, Status::Resolved));
        }
    }

    #[test]
    fn tags_are_normalised_as_a_set() {
        let tags = tag_set(vec!["Family".into(), " family ".into(), "".into(), "neighbors".into()]);
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["family", "neighbors"]);
    }
}
