use crate::models::{
    ActorId, AssetRef, Category, Comment, CommentView, GeoPoint, LikeState, NewProblem, ProblemStats, ProblemView, Resolution,
    Role, Severity, Status,
};
use crate::resolution::SolutionInput;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_problems,
        crate::routes::create_problem,
        crate::routes::get_problem,
        crate::routes::delete_problem,
        crate::routes::set_status,
        crate::routes::resolve_problem,
        crate::routes::like_state,
        crate::routes::toggle_like,
        crate::routes::list_comments,
        crate::routes::post_comment,
        crate::routes::delete_comment,
        crate::routes::moderation_queue,
        crate::routes::statistics,
        crate::routes::assign_role,
        crate::routes::auth_me,
        crate::routes::update_profile,
        crate::routes::upload_asset,
    ),
    components(schemas(
        ActorId, AssetRef, Category, Severity, Status, Role, GeoPoint,
        NewProblem, ProblemView, Resolution, SolutionInput, Comment, CommentView, LikeState, ProblemStats,
        crate::routes::StatusChange, crate::routes::CommentRequest, crate::routes::RoleAssignment,
        crate::routes::MeResponse, crate::routes::ProfileUpdate, crate::routes::AssetUploadResponse
    )),
    tags(
        (name = "problems", description = "Problem reports and their lifecycle"),
        (name = "engagement", description = "Likes and comments"),
        (name = "admin", description = "Moderator desk"),
    )
)]
pub struct ApiDoc;
