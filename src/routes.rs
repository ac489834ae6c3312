use std::sync::Arc;
use actix_web::{web, HttpResponse};
use actix_multipart::Multipart;
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::actor::Actor;
use crate::auth::Auth;
use crate::engine::Engine;
use crate::error::ApiError;
use crate::models::*;
use crate::rate_limit::{Action, RateLimiterFacade};
use crate::resolution::SolutionInput;
use crate::storage::{AssetStore, AssetStoreError};
use crate::visibility::ProblemFilter;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/problems")
                    .route(web::get().to(list_problems))
                    .route(web::post().to(create_problem)),
            )
            .service(
                web::resource("/problems/{id}")
                    .route(web::get().to(get_problem))
                    .route(web::delete().to(delete_problem)),
            )
            .service(web::resource("/problems/{id}/status").route(web::put().to(set_status)))
            .service(web::resource("/problems/{id}/resolve").route(web::post().to(resolve_problem)))
            .service(
                web::resource("/problems/{id}/like")
                    .route(web::get().to(like_state))
                    .route(web::post().to(toggle_like)),
            )
            .service(
                web::resource("/problems/{id}/comments")
                    .route(web::get().to(list_comments))
                    .route(web::post().to(post_comment)),
            )
            .service(web::resource("/comments/{id}").route(web::delete().to(delete_comment)))
            .service(web::resource("/assets").route(web::post().to(upload_asset)))
            .service(web::resource("/admin/problems").route(web::get().to(moderation_queue)))
            .service(web::resource("/admin/stats").route(web::get().to(statistics)))
            .service(web::resource("/admin/roles").route(web::post().to(assign_role)))
            .service(web::resource("/profile").route(web::put().to(update_profile)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me))),
    );
    // public fetch route (no /api/v1 prefix so <img src="/assets/{ref}"> works)
    cfg.route("/assets/{reference}", web::get().to(get_asset));
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub assets: Arc<dyn AssetStore>,
    pub rate_limiter: Option<RateLimiterFacade>,
}

impl AppState {
    pub fn new(engine: Engine, assets: Arc<dyn AssetStore>) -> Self {
        Self { engine, assets, rate_limiter: None }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiterFacade) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_bootstrap_moderators(mut self, ids: Vec<String>) -> Self {
        self.engine = self.engine.with_bootstrap_moderators(ids);
        self
    }

    /// Resolve the request's identity into an explicit actor (anonymous without a token).
    pub async fn actor(&self, auth: Option<Auth>) -> Result<Actor, ApiError> {
        let Some(Auth(claims)) = auth else { return Ok(Actor::Anonymous) };
        let id = claims.actor_id();
        let role = self.engine.role_of(&id).await?;
        Ok(Actor::Member { id, role })
    }

    fn limit(&self, actor: &Actor, action: Action) -> Result<(), ApiError> {
        match (&self.rate_limiter, actor.id()) {
            (Some(rl), Some(id)) if !rl.allow(action, id.as_str()) => Err(ApiError::TooManyRequests),
            _ => Ok(()),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/problems",
    params(ProblemFilter),
    responses(
        (status = 200, description = "Problems visible to the caller, newest first", body = [ProblemView])
    )
)]
pub async fn list_problems(auth: Option<Auth>, data: web::Data<AppState>, query: web::Query<ProblemFilter>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(auth).await?;
    let problems = data.engine.list_problems(&actor, &query).await?;
    Ok(HttpResponse::Ok().json(problems))
}

#[utoipa::path(
    post,
    path = "/api/v1/problems",
    request_body = NewProblem,
    responses(
        (status = 201, description = "Problem reported (pending review)", body = ProblemView),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_problem(auth: Auth, data: web::Data<AppState>, payload: web::Json<NewProblem>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    data.limit(&actor, Action::Report)?;
    let problem = data.engine.create_problem(&actor, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(data.engine.view(problem).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/problems/{id}",
    params(("id" = i64, Path, description = "Problem id")),
    responses(
        (status = 200, description = "Problem", body = ProblemView),
        (status = 404, description = "Problem not found or not visible")
    )
)]
pub async fn get_problem(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(auth).await?;
    let view = data.engine.get_problem(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    delete,
    path = "/api/v1/problems/{id}",
    params(("id" = i64, Path, description = "Problem id")),
    responses(
        (status = 204, description = "Deleted with its comments and likes"),
        (status = 403, description = "Forbidden - owner or moderator only"),
        (status = 404, description = "Problem not found")
    )
)]
pub async fn delete_problem(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    data.engine.delete_problem(path.into_inner(), &actor).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status: Status,
}

#[utoipa::path(
    put,
    path = "/api/v1/problems/{id}/status",
    request_body = StatusChange,
    params(("id" = i64, Path, description = "Problem id")),
    responses(
        (status = 200, description = "Status changed", body = ProblemView),
        (status = 403, description = "Forbidden - moderators only"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn set_status(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<StatusChange>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    let problem = data.engine.set_status(path.into_inner(), payload.status, &actor).await?;
    Ok(HttpResponse::Ok().json(data.engine.view(problem).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/problems/{id}/resolve",
    request_body = SolutionInput,
    params(("id" = i64, Path, description = "Problem id")),
    responses(
        (status = 200, description = "Problem resolved", body = ProblemView),
        (status = 400, description = "Missing solution description"),
        (status = 403, description = "Forbidden - owner or moderator only"),
        (status = 409, description = "Already resolved")
    )
)]
pub async fn resolve_problem(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<SolutionInput>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    let problem = data.engine.resolve(path.into_inner(), &actor, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(data.engine.view(problem).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/problems/{id}/like",
    params(("id" = i64, Path, description = "Problem id")),
    responses((status = 200, description = "Like count and caller's like", body = LikeState))
)]
pub async fn like_state(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(auth).await?;
    let state = data.engine.like_state(path.into_inner(), &actor).await?;
    Ok(HttpResponse::Ok().json(state))
}

#[utoipa::path(
    post,
    path = "/api/v1/problems/{id}/like",
    params(("id" = i64, Path, description = "Problem id")),
    responses(
        (status = 200, description = "Like toggled", body = LikeState),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn toggle_like(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(auth).await?;
    data.limit(&actor, Action::Like)?;
    let state = data.engine.toggle_like(path.into_inner(), &actor).await?;
    Ok(HttpResponse::Ok().json(state))
}

#[utoipa::path(
    get,
    path = "/api/v1/problems/{id}/comments",
    params(("id" = i64, Path, description = "Problem id")),
    responses(
        (status = 200, description = "Comments, oldest first, with author name and role", body = [CommentView]),
        (status = 404, description = "Problem not found")
    )
)]
pub async fn list_comments(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(auth).await?;
    let comments = data.engine.list_comments(path.into_inner(), &actor).await?;
    Ok(HttpResponse::Ok().json(comments))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub text: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/problems/{id}/comments",
    request_body = CommentRequest,
    params(("id" = i64, Path, description = "Problem id")),
    responses(
        (status = 201, description = "Comment posted", body = Comment),
        (status = 400, description = "Empty comment"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn post_comment(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>, payload: web::Json<CommentRequest>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(auth).await?;
    data.limit(&actor, Action::Comment)?;
    let comment = data.engine.post_comment(path.into_inner(), &actor, &payload.text).await?;
    Ok(HttpResponse::Created().json(comment))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Forbidden - author only"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    data.engine.delete_comment(path.into_inner(), &actor).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- Moderator desk -----------------------------------
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueueQuery {
    pub status: Option<Status>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/problems",
    params(QueueQuery),
    responses(
        (status = 200, description = "All problems, newest first", body = [ProblemView]),
        (status = 403, description = "Forbidden - moderators only")
    )
)]
pub async fn moderation_queue(auth: Auth, data: web::Data<AppState>, query: web::Query<QueueQuery>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    let problems = data.engine.moderation_queue(&actor, query.status).await?;
    Ok(HttpResponse::Ok().json(problems))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    responses(
        (status = 200, description = "Counts by status and category", body = ProblemStats),
        (status = 403, description = "Forbidden - moderators only")
    )
)]
pub async fn statistics(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    Ok(HttpResponse::Ok().json(data.engine.statistics(&actor).await?))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleAssignment {
    pub subject: String,
    pub role: Role,
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/roles",
    request_body = RoleAssignment,
    responses(
        (status = 200, description = "Role updated", body = RoleAssignment),
        (status = 403, description = "Forbidden - moderators only")
    )
)]
pub async fn assign_role(auth: Auth, data: web::Data<AppState>, payload: web::Json<RoleAssignment>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(ApiError::BadRequest("subject is required".into()));
    }
    data.engine.assign_role(&actor, &ActorId::new(subject), payload.role).await?;
    Ok(HttpResponse::Ok().json(RoleAssignment { subject: subject.to_string(), role: payload.role }))
}
// ------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub id: ActorId,
    pub role: Role,
    pub display_name: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current actor", body = MeResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    match data.actor(Some(auth)).await? {
        Actor::Member { id, role } => {
            let display_name = data.engine.display_name(&id).await?;
            Ok(HttpResponse::Ok().json(MeResponse { id, role, display_name }))
        }
        Actor::Anonymous => Err(ApiError::Unauthorized),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub display_name: String,
}

#[utoipa::path(
    put,
    path = "/api/v1/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Display name saved", body = MeResponse),
        (status = 400, description = "Blank or too long name"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_profile(auth: Auth, data: web::Data<AppState>, payload: web::Json<ProfileUpdate>) -> Result<HttpResponse, ApiError> {
    let actor = data.actor(Some(auth)).await?;
    let display_name = data.engine.set_display_name(&actor, &payload.display_name).await?;
    match actor {
        Actor::Member { id, role } => Ok(HttpResponse::Ok().json(MeResponse { id, role, display_name: Some(display_name) })),
        Actor::Anonymous => Err(ApiError::Unauthorized),
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssetUploadResponse {
    pub reference: AssetRef,
    pub url: String,
    pub mime: String,
    pub size: usize,
    pub duplicate: bool, // true when upload was a duplicate (idempotent)
}

pub const ASSET_SIZE_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

#[utoipa::path(
    post,
    path = "/api/v1/assets",
    responses(
        (status = 201, description = "Asset stored (new)", body = AssetUploadResponse),
        (status = 200, description = "Asset already existed (idempotent)", body = AssetUploadResponse),
        (status = 415, description = "Unsupported media type"),
        (status = 413, description = "Payload too large"),
    )
)]
pub async fn upload_asset(auth: Auth, data: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse, ApiError> {
    use actix_web::http::StatusCode;
    let actor = data.actor(Some(auth)).await?;
    data.limit(&actor, Action::Upload)?;
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        tracing::warn!(error = %e, "multipart error");
        ApiError::BadRequest("malformed multipart body".into())
    })? {
        if field.content_disposition().get_name() != Some("file") { continue; }
        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            tracing::warn!(error = %e, "stream read error");
            ApiError::BadRequest("malformed multipart body".into())
        })? {
            if bytes.len() + chunk.len() > ASSET_SIZE_LIMIT { return Ok(HttpResponse::build(StatusCode::PAYLOAD_TOO_LARGE).finish()); }
            bytes.extend_from_slice(&chunk);
        }
        let stored = match data.assets.upload(&bytes).await {
            Ok(s) => s,
            Err(AssetStoreError::Unsupported(_)) => return Ok(HttpResponse::UnsupportedMediaType().finish()),
            Err(e) => { tracing::error!(error = %e, "asset store upload error"); return Err(ApiError::Internal); }
        };
        let status = if stored.duplicate { StatusCode::OK } else { StatusCode::CREATED };
        let url = data.assets.public_url(&stored.reference);
        let resp = AssetUploadResponse { reference: stored.reference, url, mime: stored.mime, size: stored.size, duplicate: stored.duplicate };
        return Ok(HttpResponse::build(status).json(resp));
    }
    Err(ApiError::BadRequest("missing 'file' field".into()))
}

// serve stored asset by reference
pub async fn get_asset(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let reference = AssetRef(path.into_inner());
    match data.assets.load(&reference).await {
        Ok((bytes, mime)) => Ok(HttpResponse::Ok().insert_header(("Content-Type", mime)).body(bytes)),
        Err(AssetStoreError::NotFound) => Err(ApiError::NotFound),
        Err(e) => { tracing::error!(error = %e, "asset store load error"); Err(ApiError::Internal) }
    }
}
