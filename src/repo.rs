use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::models::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait ProblemRepo: Send + Sync {
    async fn create_problem(&self, draft: ProblemDraft) -> RepoResult<Problem>;
    async fn get_problem(&self, id: Id) -> RepoResult<Problem>;
    /// All problems, newest first.
    async fn list_problems(&self) -> RepoResult<Vec<Problem>>;
    /// `Conflict` when the problem is resolved at write time and `status` is not `Pending`.
    async fn update_status(&self, id: Id, status: Status) -> RepoResult<Problem>;
    /// Sets status `Resolved` and the solution in one write.
    /// `Conflict` when the problem is already resolved at write time.
    async fn resolve_problem(&self, id: Id, resolution: Resolution) -> RepoResult<Problem>;
    /// Hard delete; comments and likes of the problem go in the same transaction.
    async fn delete_problem(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Oldest first.
    async fn list_comments(&self, problem_id: Id) -> RepoResult<Vec<Comment>>;
    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    async fn delete_comment(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait LikeRepo: Send + Sync {
    /// `Conflict` when the (problem, actor) pair already exists.
    async fn insert_like(&self, problem_id: Id, actor: &ActorId) -> RepoResult<()>;
    /// Returns whether a row was removed.
    async fn delete_like(&self, problem_id: Id, actor: &ActorId) -> RepoResult<bool>;
    async fn has_liked(&self, problem_id: Id, actor: &ActorId) -> RepoResult<bool>;
    async fn count_likes(&self, problem_id: Id) -> RepoResult<u64>;
}

/// Stored role and display name of an actor. Either may be unset.
#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn role_of(&self, actor: &ActorId) -> RepoResult<Option<Role>>;
    async fn set_role(&self, actor: &ActorId, role: Role) -> RepoResult<()>;
    async fn display_name(&self, actor: &ActorId) -> RepoResult<Option<String>>;
    async fn set_display_name(&self, actor: &ActorId, name: &str) -> RepoResult<()>;
}

pub trait Repo: ProblemRepo + CommentRepo + LikeRepo + ProfileRepo {}

impl<T> Repo for T where T: ProblemRepo + CommentRepo + LikeRepo + ProfileRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};
    use tracing::{info, warn};

    const SNAPSHOT_FILE: &str = "state.json";

    #[derive(Default, Clone, Serialize, Deserialize)]
    struct StoredProfile {
        role: Option<Role>,
        display_name: Option<String>,
    }

    #[derive(Default, Clone, Serialize, Deserialize)]
    struct State {
        problems: HashMap<Id, Problem>,
        comments: HashMap<Id, Comment>,
        likes: BTreeSet<(Id, ActorId)>,
        profiles: HashMap<ActorId, StoredProfile>,
        next_id: Id,
    }

    impl State {
        fn next_id(&mut self) -> Id {
            self.next_id += 1;
            self.next_id
        }
    }

    /// Lock-guarded in-memory store, optionally snapshotted to JSON.
    ///
    /// Every mutation runs under one write lock and the snapshot is written before
    /// the lock is released. When the snapshot cannot be written the in-memory state
    /// is rolled back, so a failed call leaves nothing behind.
    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        fn data_dir() -> PathBuf {
            std::env::var("IDEAHUB_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"))
        }

        // A missing snapshot means a fresh store; an unreadable one is an error
        // rather than an empty start that would overwrite it on the next write.
        fn load_state_from(path: &Path) -> RepoResult<State> {
            if !path.exists() {
                info!(path = %path.display(), "no snapshot, starting empty");
                return Ok(State::default());
            }
            let bytes = std::fs::read(path)
                .map_err(|e| RepoError::Internal(format!("snapshot read '{}': {e}", path.display())))?;
            let state = serde_json::from_slice::<State>(&bytes)
                .map_err(|e| RepoError::Internal(format!("snapshot parse '{}': {e}", path.display())))?;
            info!(path = %path.display(), problems = state.problems.len(), "loaded snapshot");
            Ok(state)
        }

        /// Snapshot-backed store under `$IDEAHUB_DATA_DIR` (default `data/`).
        pub fn new() -> RepoResult<Self> {
            let mut path = Self::data_dir();
            path.push(SNAPSHOT_FILE);
            Self::with_snapshot(path)
        }

        pub fn with_snapshot(path: impl Into<PathBuf>) -> RepoResult<Self> {
            let path = path.into();
            let state = Self::load_state_from(&path)?;
            Ok(Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)) })
        }

        /// Store without persistence.
        pub fn ephemeral() -> Self {
            Self { state: Arc::new(RwLock::new(State::default())), snapshot_path: None }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        /// Applies `f` under the write lock and persists the result before unlocking.
        /// Either both the change and its snapshot land, or neither does.
        fn mutate<T>(&self, f: impl FnOnce(&mut State) -> RepoResult<T>) -> RepoResult<T> {
            let mut s = self.write()?;
            let Some(path) = self.snapshot_path.as_deref() else { return f(&mut *s) };
            let before = State::clone(&s);
            let out = match f(&mut *s) {
                Ok(out) => out,
                Err(e) => {
                    *s = before;
                    return Err(e);
                }
            };
            if let Err(e) = write_snapshot(path, &*s) {
                warn!(path = %path.display(), error = %e, "snapshot write failed, rolling back");
                *s = before;
                return Err(e);
            }
            Ok(out)
        }
    }

    // Written to a sibling temp file and renamed into place, so readers never
    // observe a partial snapshot.
    fn write_snapshot(path: &Path, state: &State) -> RepoResult<()> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| RepoError::Internal(format!("snapshot encode: {e}")))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| RepoError::Internal(format!("snapshot dir: {e}")))?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)
            .map_err(|e| RepoError::Internal(format!("snapshot write '{}': {e}", tmp.display())))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| RepoError::Internal(format!("snapshot rename '{}': {e}", path.display())))
    }

    #[async_trait]
    impl ProblemRepo for InMemRepo {
        async fn create_problem(&self, draft: ProblemDraft) -> RepoResult<Problem> {
            self.mutate(|s| {
                let id = s.next_id();
                let problem = Problem {
                    id,
                    owner: draft.owner,
                    title: draft.title,
                    description: draft.description,
                    category: draft.category,
                    severity: draft.severity,
                    affected: draft.affected,
                    impact: draft.impact,
                    location: draft.location,
                    address: draft.address,
                    image: draft.image,
                    status: Status::Pending,
                    solution: None,
                    created_at: Utc::now(),
                };
                s.problems.insert(id, problem.clone());
                Ok(problem)
            })
        }

        async fn get_problem(&self, id: Id) -> RepoResult<Problem> {
            let s = self.read()?;
            s.problems.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_problems(&self) -> RepoResult<Vec<Problem>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.problems.values().cloned().collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))); // latest first
            Ok(v)
        }

        async fn update_status(&self, id: Id, status: Status) -> RepoResult<Problem> {
            self.mutate(|s| {
                let problem = s.problems.get_mut(&id).ok_or(RepoError::NotFound)?;
                if problem.status == Status::Resolved && status != Status::Pending {
                    return Err(RepoError::Conflict);
                }
                problem.status = status;
                Ok(problem.clone())
            })
        }

        async fn resolve_problem(&self, id: Id, resolution: Resolution) -> RepoResult<Problem> {
            self.mutate(|s| {
                let problem = s.problems.get_mut(&id).ok_or(RepoError::NotFound)?;
                if problem.status == Status::Resolved {
                    return Err(RepoError::Conflict);
                }
                problem.status = Status::Resolved;
                problem.solution = Some(resolution);
                Ok(problem.clone())
            })
        }

        async fn delete_problem(&self, id: Id) -> RepoResult<()> {
            self.mutate(|s| {
                s.problems.remove(&id).ok_or(RepoError::NotFound)?;
                s.comments.retain(|_, c| c.problem_id != id);
                s.likes.retain(|(pid, _)| *pid != id);
                Ok(())
            })
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn list_comments(&self, problem_id: Id) -> RepoResult<Vec<Comment>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.comments
                .values()
                .filter(|c| c.problem_id == problem_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))); // ascending
            Ok(v)
        }

        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            self.mutate(|s| {
                if !s.problems.contains_key(&new.problem_id) { return Err(RepoError::NotFound); }
                let id = s.next_id();
                let comment = Comment {
                    id,
                    problem_id: new.problem_id,
                    author: new.author,
                    body: new.body,
                    created_at: Utc::now(),
                };
                s.comments.insert(id, comment.clone());
                Ok(comment)
            })
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            let s = self.read()?;
            s.comments.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn delete_comment(&self, id: Id) -> RepoResult<()> {
            self.mutate(|s| s.comments.remove(&id).map(|_| ()).ok_or(RepoError::NotFound))
        }
    }

    #[async_trait]
    impl LikeRepo for InMemRepo {
        async fn insert_like(&self, problem_id: Id, actor: &ActorId) -> RepoResult<()> {
            self.mutate(|s| {
                if !s.problems.contains_key(&problem_id) { return Err(RepoError::NotFound); }
                if !s.likes.insert((problem_id, actor.clone())) {
                    return Err(RepoError::Conflict);
                }
                Ok(())
            })
        }

        async fn delete_like(&self, problem_id: Id, actor: &ActorId) -> RepoResult<bool> {
            let key = (problem_id, actor.clone());
            if !self.read()?.likes.contains(&key) {
                return Ok(false);
            }
            self.mutate(|s| Ok(s.likes.remove(&key)))
        }

        async fn has_liked(&self, problem_id: Id, actor: &ActorId) -> RepoResult<bool> {
            let s = self.read()?;
            Ok(s.likes.contains(&(problem_id, actor.clone())))
        }

        async fn count_likes(&self, problem_id: Id) -> RepoResult<u64> {
            let s = self.read()?;
            Ok(s.likes.iter().filter(|(pid, _)| *pid == problem_id).count() as u64)
        }
    }

    #[async_trait]
    impl ProfileRepo for InMemRepo {
        async fn role_of(&self, actor: &ActorId) -> RepoResult<Option<Role>> {
            let s = self.read()?;
            Ok(s.profiles.get(actor).and_then(|p| p.role))
        }

        async fn set_role(&self, actor: &ActorId, role: Role) -> RepoResult<()> {
            self.mutate(|s| {
                s.profiles.entry(actor.clone()).or_default().role = Some(role);
                Ok(())
            })
        }

        async fn display_name(&self, actor: &ActorId) -> RepoResult<Option<String>> {
            let s = self.read()?;
            Ok(s.profiles.get(actor).and_then(|p| p.display_name.clone()))
        }

        async fn set_display_name(&self, actor: &ActorId, name: &str) -> RepoResult<()> {
            self.mutate(|s| {
                s.profiles.entry(actor.clone()).or_default().display_name = Some(name.to_string());
                Ok(())
            })
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use chrono::DateTime;
    use sqlx::{Pool, Postgres};

    const UNIQUE_VIOLATION: &str = "23505";
    const FOREIGN_KEY_VIOLATION: &str = "23503";

    const PROBLEM_COLUMNS: &str = "id, owner_id, title, description, category, severity, affected, impact, \
        latitude, longitude, address, image_ref, status, solution_description, solution_link, \
        solution_image, resolved_by, resolved_at, created_at";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
        pub fn pool(&self) -> &Pool<Postgres> { &self.pool }
    }

    fn db_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(ref d) => match d.code().as_deref() {
                Some(UNIQUE_VIOLATION) => RepoError::Conflict,
                Some(FOREIGN_KEY_VIOLATION) => RepoError::NotFound,
                _ => RepoError::Internal(e.to_string()),
            },
            other => RepoError::Internal(other.to_string()),
        }
    }

    fn parse<T: std::str::FromStr>(value: &str) -> RepoResult<T>
    where
        T::Err: std::fmt::Display,
    {
        value.parse().map_err(|e: T::Err| RepoError::Internal(e.to_string()))
    }

    #[derive(sqlx::FromRow)]
    struct ProblemRow {
        id: Id,
        owner_id: String,
        title: String,
        description: String,
        category: String,
        severity: String,
        affected: Vec<String>,
        impact: Vec<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        address: Option<String>,
        image_ref: Option<String>,
        status: String,
        solution_description: Option<String>,
        solution_link: Option<String>,
        solution_image: Option<String>,
        resolved_by: Option<String>,
        resolved_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    }

    impl TryFrom<ProblemRow> for Problem {
        type Error = RepoError;

        fn try_from(r: ProblemRow) -> RepoResult<Self> {
            let location = match (r.latitude, r.longitude) {
                (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
                _ => None,
            };
            let solution = match (r.solution_description, r.resolved_by, r.resolved_at) {
                (Some(description), Some(by), Some(at)) => Some(Resolution {
                    description,
                    link: r.solution_link,
                    after_image: r.solution_image.map(AssetRef),
                    resolved_by: ActorId(by),
                    resolved_at: at,
                }),
                _ => None,
            };
            Ok(Problem {
                id: r.id,
                owner: ActorId(r.owner_id),
                title: r.title,
                description: r.description,
                category: parse(&r.category)?,
                severity: parse(&r.severity)?,
                affected: r.affected.into_iter().collect(),
                impact: r.impact.into_iter().collect(),
                location,
                address: r.address,
                image: r.image_ref.map(AssetRef),
                status: parse(&r.status)?,
                solution,
                created_at: r.created_at,
            })
        }
    }

    #[derive(sqlx::FromRow)]
    struct CommentRow {
        id: Id,
        problem_id: Id,
        author_id: String,
        body: String,
        created_at: DateTime<Utc>,
    }

    impl From<CommentRow> for Comment {
        fn from(r: CommentRow) -> Self {
            Comment { id: r.id, problem_id: r.problem_id, author: ActorId(r.author_id), body: r.body, created_at: r.created_at }
        }
    }

    #[async_trait]
    impl ProblemRepo for PgRepo {
        async fn create_problem(&self, d: ProblemDraft) -> RepoResult<Problem> {
            let sql = format!(
                "INSERT INTO problems (owner_id, title, description, category, severity, affected, impact, \
                 latitude, longitude, address, image_ref, status) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,'pending') RETURNING {PROBLEM_COLUMNS}"
            );
            let row = sqlx::query_as::<_, ProblemRow>(&sql)
                .bind(d.owner.as_str())
                .bind(&d.title)
                .bind(&d.description)
                .bind(d.category.as_str())
                .bind(d.severity.as_str())
                .bind(d.affected.into_iter().collect::<Vec<_>>())
                .bind(d.impact.into_iter().collect::<Vec<_>>())
                .bind(d.location.map(|l| l.latitude))
                .bind(d.location.map(|l| l.longitude))
                .bind(d.address.as_deref())
                .bind(d.image.as_ref().map(AssetRef::as_str))
                .fetch_one(&self.pool).await.map_err(db_err)?;
            row.try_into()
        }

        async fn get_problem(&self, id: Id) -> RepoResult<Problem> {
            let sql = format!("SELECT {PROBLEM_COLUMNS} FROM problems WHERE id = $1");
            let row = sqlx::query_as::<_, ProblemRow>(&sql)
                .bind(id)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            row.try_into()
        }

        async fn list_problems(&self) -> RepoResult<Vec<Problem>> {
            let sql = format!("SELECT {PROBLEM_COLUMNS} FROM problems ORDER BY created_at DESC, id DESC");
            let rows = sqlx::query_as::<_, ProblemRow>(&sql)
                .fetch_all(&self.pool).await.map_err(db_err)?;
            rows.into_iter().map(Problem::try_from).collect()
        }

        async fn update_status(&self, id: Id, status: Status) -> RepoResult<Problem> {
            // a resolved row only moves back to pending, even if it was resolved after the caller's read
            let sql = format!(
                "UPDATE problems SET status = $2 \
                 WHERE id = $1 AND (status <> 'resolved' OR $2 = 'pending') RETURNING {PROBLEM_COLUMNS}"
            );
            let row = sqlx::query_as::<_, ProblemRow>(&sql)
                .bind(id)
                .bind(status.as_str())
                .fetch_optional(&self.pool).await.map_err(db_err)?;
            match row {
                Some(row) => row.try_into(),
                None => match self.get_problem(id).await {
                    Ok(_) => Err(RepoError::Conflict),
                    Err(e) => Err(e),
                },
            }
        }

        async fn resolve_problem(&self, id: Id, res: Resolution) -> RepoResult<Problem> {
            // single conditional UPDATE: status and payload commit together or not at all
            let sql = format!(
                "UPDATE problems SET status = 'resolved', solution_description = $2, solution_link = $3, \
                 solution_image = $4, resolved_by = $5, resolved_at = $6 \
                 WHERE id = $1 AND status <> 'resolved' RETURNING {PROBLEM_COLUMNS}"
            );
            let row = sqlx::query_as::<_, ProblemRow>(&sql)
                .bind(id)
                .bind(&res.description)
                .bind(res.link.as_deref())
                .bind(res.after_image.as_ref().map(AssetRef::as_str))
                .bind(res.resolved_by.as_str())
                .bind(res.resolved_at)
                .fetch_optional(&self.pool).await.map_err(db_err)?;
            match row {
                Some(row) => row.try_into(),
                // distinguish a missing row from one that is already resolved
                None => match self.get_problem(id).await {
                    Ok(_) => Err(RepoError::Conflict),
                    Err(e) => Err(e),
                },
            }
        }

        async fn delete_problem(&self, id: Id) -> RepoResult<()> {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            sqlx::query("DELETE FROM likes WHERE problem_id = $1")
                .bind(id).execute(&mut *tx).await.map_err(db_err)?;
            sqlx::query("DELETE FROM comments WHERE problem_id = $1")
                .bind(id).execute(&mut *tx).await.map_err(db_err)?;
            let done = sqlx::query("DELETE FROM problems WHERE id = $1")
                .bind(id).execute(&mut *tx).await.map_err(db_err)?;
            if done.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                return Err(RepoError::NotFound);
            }
            tx.commit().await.map_err(db_err)
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn list_comments(&self, problem_id: Id) -> RepoResult<Vec<Comment>> {
            let rows = sqlx::query_as::<_, CommentRow>(
                "SELECT id, problem_id, author_id, body, created_at FROM comments \
                 WHERE problem_id = $1 ORDER BY created_at ASC, id ASC",
            )
            .bind(problem_id)
            .fetch_all(&self.pool).await.map_err(db_err)?;
            Ok(rows.into_iter().map(Comment::from).collect())
        }

        async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
            let row = sqlx::query_as::<_, CommentRow>(
                "INSERT INTO comments (problem_id, author_id, body) VALUES ($1,$2,$3) \
                 RETURNING id, problem_id, author_id, body, created_at",
            )
            .bind(new.problem_id)
            .bind(new.author.as_str())
            .bind(&new.body)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            let row = sqlx::query_as::<_, CommentRow>(
                "SELECT id, problem_id, author_id, body, created_at FROM comments WHERE id = $1",
            )
            .bind(id)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn delete_comment(&self, id: Id) -> RepoResult<()> {
            let done = sqlx::query("DELETE FROM comments WHERE id = $1")
                .bind(id).execute(&self.pool).await.map_err(db_err)?;
            if done.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl LikeRepo for PgRepo {
        async fn insert_like(&self, problem_id: Id, actor: &ActorId) -> RepoResult<()> {
            sqlx::query("INSERT INTO likes (problem_id, actor_id) VALUES ($1,$2)")
                .bind(problem_id)
                .bind(actor.as_str())
                .execute(&self.pool).await.map_err(db_err)?;
            Ok(())
        }

        async fn delete_like(&self, problem_id: Id, actor: &ActorId) -> RepoResult<bool> {
            let done = sqlx::query("DELETE FROM likes WHERE problem_id = $1 AND actor_id = $2")
                .bind(problem_id)
                .bind(actor.as_str())
                .execute(&self.pool).await.map_err(db_err)?;
            Ok(done.rows_affected() > 0)
        }

        async fn has_liked(&self, problem_id: Id, actor: &ActorId) -> RepoResult<bool> {
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM likes WHERE problem_id = $1 AND actor_id = $2)")
                .bind(problem_id)
                .bind(actor.as_str())
                .fetch_one(&self.pool).await.map_err(db_err)
        }

        async fn count_likes(&self, problem_id: Id) -> RepoResult<u64> {
            let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE problem_id = $1")
                .bind(problem_id)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(n.max(0) as u64)
        }
    }

    #[async_trait]
    impl ProfileRepo for PgRepo {
        async fn role_of(&self, actor: &ActorId) -> RepoResult<Option<Role>> {
            let role = sqlx::query_scalar::<_, Option<String>>("SELECT role FROM profiles WHERE actor_id = $1")
                .bind(actor.as_str())
                .fetch_optional(&self.pool).await.map_err(db_err)?;
            role.flatten().as_deref().map(parse::<Role>).transpose()
        }

        async fn set_role(&self, actor: &ActorId, role: Role) -> RepoResult<()> {
            sqlx::query(
                "INSERT INTO profiles (actor_id, role) VALUES ($1,$2) \
                 ON CONFLICT (actor_id) DO UPDATE SET role = EXCLUDED.role",
            )
            .bind(actor.as_str())
            .bind(role.as_str())
            .execute(&self.pool).await.map_err(db_err)?;
            Ok(())
        }

        async fn display_name(&self, actor: &ActorId) -> RepoResult<Option<String>> {
            let name = sqlx::query_scalar::<_, Option<String>>("SELECT display_name FROM profiles WHERE actor_id = $1")
                .bind(actor.as_str())
                .fetch_optional(&self.pool).await.map_err(db_err)?;
            Ok(name.flatten())
        }

        async fn set_display_name(&self, actor: &ActorId, name: &str) -> RepoResult<()> {
            sqlx::query(
                "INSERT INTO profiles (actor_id, display_name) VALUES ($1,$2) \
                 ON CONFLICT (actor_id) DO UPDATE SET display_name = EXCLUDED.display_name",
            )
            .bind(actor.as_str())
            .bind(name)
            .execute(&self.pool).await.map_err(db_err)?;
            Ok(())
        }
    }
}
