//! Who may see which problem.
//!
//! Public feed: approved and resolved problems. Owners additionally see their own
//! pending and rejected submissions. Moderators get nothing extra here; their
//! unrestricted view is the moderation desk.

use serde::Deserialize;
use tracing::debug;
use utoipa::IntoParams;

use crate::actor::Actor;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::models::{Category, Problem, ProblemView, Severity};
use crate::repo::ProblemRepo;

pub fn is_visible(problem: &Problem, actor: &Actor) -> bool {
    problem.status.is_public() || actor.owns(problem)
}

/// Search and facets. Applied after visibility, so they only ever narrow the set.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProblemFilter {
    /// Case-insensitive substring over title and description.
    #[serde(default, rename = "q")]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl ProblemFilter {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn matches(&self, problem: &Problem) -> bool {
        if self.category.is_some_and(|c| c != problem.category) {
            return false;
        }
        if self.severity.is_some_and(|s| s != problem.severity) {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                problem.title.to_lowercase().contains(&term)
                    || problem.description.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

/// Visibility first, then the filter; input order is preserved.
pub fn filter<'a, I>(actor: &'a Actor, problems: I, f: &'a ProblemFilter) -> impl Iterator<Item = Problem> + 'a
where
    I: IntoIterator<Item = Problem>,
    I::IntoIter: 'a,
{
    problems
        .into_iter()
        .filter(move |p| is_visible(p, actor))
        .filter(move |p| f.matches(p))
}

impl Engine {
    /// The feed an actor (possibly anonymous) may browse, newest first.
    pub async fn list_problems(&self, actor: &Actor, f: &ProblemFilter) -> EngineResult<Vec<ProblemView>> {
        let all = self.repo.list_problems().await?;
        let total = all.len();
        let mut out = Vec::new();
        for problem in filter(actor, all, f) {
            out.push(self.view(problem).await?);
        }
        debug!(total, visible = out.len(), "listed problems");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorId, Status};
    use chrono::Utc;

    fn problem(owner: &str, status: Status) -> Problem {
        Problem {
            id: 1,
            owner: ActorId::new(owner),
            title: "Broken streetlight".into(),
            description: "Dark corner near the SCHOOL".into(),
            category: Category::Security,
            severity: Severity::Medium,
            affected: Default::default(),
            impact: Default::default(),
            location: None,
            address: None,
            image: None,
            status,
            solution: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_visible_to_owner_only() {
        let p = problem("alice", Status::Pending);
        assert!(is_visible(&p, &Actor::community("alice")));
        assert!(!is_visible(&p, &Actor::community("bob")));
        assert!(!is_visible(&p, &Actor::moderator("mod")));
        assert!(!is_visible(&p, &Actor::Anonymous));
    }

    #[test]
    fn public_statuses_visible_to_everyone() {
        for status in [Status::Approved, Status::Resolved] {
            let p = problem("alice", status);
            assert!(is_visible(&p, &Actor::Anonymous));
            assert!(is_visible(&p, &Actor::community("bob")));
        }
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let p = problem("alice", Status::Approved);
        assert!(ProblemFilter::default().search("STREETLIGHT").matches(&p));
        assert!(ProblemFilter::default().search("school").matches(&p));
        assert!(!ProblemFilter::default().search("pothole").matches(&p));
        assert!(ProblemFilter::default().search("   ").matches(&p));
    }

    #[test]
    fn facets_are_exact() {
        let p = problem("alice", Status::Approved);
        assert!(ProblemFilter::default().category(Category::Security).matches(&p));
        assert!(!ProblemFilter::default().category(Category::Health).matches(&p));
        assert!(!ProblemFilter::default().severity(Severity::Severe).matches(&p));
    }

    #[test]
    fn filter_never_widens_visibility() {
        let hidden = problem("alice", Status::Rejected);
        let f = ProblemFilter::default().search("streetlight");
        let seen: Vec<_> = filter(&Actor::community("bob"), vec![hidden], &f).collect();
        assert!(seen.is_empty());
    }
}
