//! Stateless handle over the report store.
//!
//! The workflow operations live in [`crate::lifecycle`], [`crate::visibility`],
//! [`crate::engagement`] and [`crate::moderation`], each as an `impl Engine` block.
//! An `Engine` holds the shared store and the configured bootstrap moderators only,
//! so cloning it per request is cheap and no state survives between calls.

use std::sync::Arc;

use crate::error::EngineResult;
use crate::models::{Problem, ProblemView};
use crate::repo::{LikeRepo, ProfileRepo, Repo};

#[derive(Clone)]
pub struct Engine {
    pub(crate) repo: Arc<dyn Repo>,
    pub(crate) bootstrap_moderators: Arc<Vec<String>>,
}

impl Engine {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo, bootstrap_moderators: Arc::new(Vec::new()) }
    }

    /// Actor ids treated as moderators until a stored role says otherwise.
    pub fn with_bootstrap_moderators(mut self, ids: Vec<String>) -> Self {
        self.bootstrap_moderators = Arc::new(ids);
        self
    }

    pub fn repo(&self) -> &Arc<dyn Repo> { &self.repo }

    /// Read model with derived like count and the owner's display name.
    pub async fn view(&self, problem: Problem) -> EngineResult<ProblemView> {
        let likes = self.repo.count_likes(problem.id).await?;
        let owner_name = self.repo.display_name(&problem.owner).await?;
        Ok(ProblemView::new(problem, likes).with_owner_name(owner_name))
    }
}
