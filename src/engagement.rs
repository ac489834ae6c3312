//! Likes and discussion threads attached to a problem.
//!
//! The like count is never stored: it is the cardinality of the like set, read after
//! every write. Per-(problem, actor) serialization comes from the store's uniqueness
//! constraint; a rejected duplicate insert means another request already liked.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::actor::Actor;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::models::{ActorId, Comment, CommentView, Id, LikeState, NewComment, Role};
use crate::repo::{CommentRepo, LikeRepo, ProfileRepo, RepoError};

pub const MAX_COMMENT_CHARS: usize = 2000;

impl Engine {
    /// Flip the actor's like on a problem and return the resulting state.
    pub async fn toggle_like(&self, id: Id, actor: &Actor) -> EngineResult<LikeState> {
        let who = actor.require_member()?;
        self.readable_problem(actor, id).await?;

        let liked = if self.repo.has_liked(id, who).await? {
            // a concurrent toggle may have removed it first; the outcome is the same
            self.repo.delete_like(id, who).await?;
            false
        } else {
            match self.repo.insert_like(id, who).await {
                Ok(()) => true,
                Err(RepoError::Conflict) => {
                    debug!(problem_id = id, actor = %who, "duplicate like insert, already liked");
                    true
                }
                Err(e) => return Err(e.into()),
            }
        };
        let count = self.repo.count_likes(id).await?;
        info!(problem_id = id, actor = %who, liked, count, "like toggled");
        metrics::increment_counter!("ideahub_like_toggles_total", "liked" => if liked { "true" } else { "false" });
        Ok(LikeState { liked, count })
    }

    /// Current like count and whether this actor is among the supporters.
    pub async fn like_state(&self, id: Id, actor: &Actor) -> EngineResult<LikeState> {
        self.readable_problem(actor, id).await?;
        let liked = match actor.id() {
            Some(who) => self.repo.has_liked(id, who).await?,
            None => false,
        };
        let count = self.repo.count_likes(id).await?;
        Ok(LikeState { liked, count })
    }

    pub async fn post_comment(&self, id: Id, actor: &Actor, text: &str) -> EngineResult<Comment> {
        let author = actor.require_member()?;
        let body = text.trim();
        if body.is_empty() {
            return Err(EngineError::Validation("comment text is empty".into()));
        }
        if body.chars().count() > MAX_COMMENT_CHARS {
            return Err(EngineError::Validation(format!("comment exceeds {MAX_COMMENT_CHARS} characters")));
        }
        self.readable_problem(actor, id).await?;
        let comment = self
            .repo
            .create_comment(NewComment { problem_id: id, author: author.clone(), body: body.to_string() })
            .await?;
        info!(problem_id = id, comment_id = comment.id, author = %author, "comment posted");
        metrics::increment_counter!("ideahub_comments_posted_total");
        Ok(comment)
    }

    /// Only the author may delete a comment.
    pub async fn delete_comment(&self, comment_id: Id, actor: &Actor) -> EngineResult<()> {
        let who = actor.require_member()?;
        let comment = self.repo.get_comment(comment_id).await?;
        if comment.author != *who {
            warn!(comment_id, actor = %who, "comment delete refused");
            return Err(EngineError::Authorization);
        }
        self.repo.delete_comment(comment_id).await?;
        info!(comment_id, actor = %who, "comment deleted");
        Ok(())
    }

    /// Thread of a problem, oldest first, each comment with its author's name and role.
    pub async fn list_comments(&self, id: Id, actor: &Actor) -> EngineResult<Vec<CommentView>> {
        self.readable_problem(actor, id).await?;
        let comments = self.repo.list_comments(id).await?;
        let mut authors: HashMap<ActorId, (Option<String>, Role)> = HashMap::new();
        let mut out = Vec::with_capacity(comments.len());
        for c in comments {
            let (name, role) = match authors.get(&c.author) {
                Some(known) => known.clone(),
                None => {
                    let known = (self.repo.display_name(&c.author).await?, self.role_of(&c.author).await?);
                    authors.insert(c.author.clone(), known.clone());
                    known
                }
            };
            out.push(CommentView::new(c, name, role));
        }
        Ok(out)
    }
}
