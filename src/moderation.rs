//! Moderator desk: the unfiltered review queue, dashboard counts and role assignment.

use tracing::info;

use crate::actor::Actor;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{ActorId, Category, ProblemStats, ProblemView, Role, Status};
use crate::repo::{ProblemRepo, ProfileRepo};

pub const MAX_DISPLAY_NAME_CHARS: usize = 100;

impl Engine {
    /// Every problem regardless of visibility, newest first, optionally one status only.
    pub async fn moderation_queue(&self, actor: &Actor, status: Option<Status>) -> EngineResult<Vec<ProblemView>> {
        actor.require_moderator()?;
        let mut out = Vec::new();
        for problem in self.repo.list_problems().await? {
            if status.is_some_and(|s| s != problem.status) {
                continue;
            }
            out.push(self.view(problem).await?);
        }
        Ok(out)
    }

    pub async fn statistics(&self, actor: &Actor) -> EngineResult<ProblemStats> {
        actor.require_moderator()?;
        let problems = self.repo.list_problems().await?;
        let mut stats = ProblemStats::default();
        for s in Status::ALL {
            stats.by_status.insert(*s, 0);
        }
        for c in Category::ALL {
            stats.by_category.insert(*c, 0);
        }
        for p in &problems {
            stats.total += 1;
            *stats.by_status.entry(p.status).or_default() += 1;
            *stats.by_category.entry(p.category).or_default() += 1;
        }
        Ok(stats)
    }

    pub async fn assign_role(&self, actor: &Actor, subject: &ActorId, role: Role) -> EngineResult<()> {
        let by = actor.require_moderator()?;
        self.repo.set_role(subject, role).await?;
        info!(actor = %by, subject = %subject, role = %role, "role assigned");
        Ok(())
    }

    /// Identity context: stored role, else bootstrap moderator list, else community.
    pub async fn role_of(&self, subject: &ActorId) -> EngineResult<Role> {
        if let Some(role) = self.repo.role_of(subject).await? {
            return Ok(role);
        }
        if self.bootstrap_moderators.iter().any(|m| m == subject.as_str()) {
            return Ok(Role::Moderator);
        }
        Ok(Role::Community)
    }

    /// Sets the caller's own display name, shown next to their reports and comments.
    pub async fn set_display_name(&self, actor: &Actor, name: &str) -> EngineResult<String> {
        let who = actor.require_member()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("display name is required".into()));
        }
        if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err(EngineError::Validation(format!(
                "display name exceeds {MAX_DISPLAY_NAME_CHARS} characters"
            )));
        }
        self.repo.set_display_name(who, name).await?;
        info!(actor = %who, "display name updated");
        Ok(name.to_string())
    }

    pub async fn display_name(&self, subject: &ActorId) -> EngineResult<Option<String>> {
        Ok(self.repo.display_name(subject).await?)
    }
}
