#![cfg(feature = "postgres-store")]

use std::sync::Arc;

use ideahub::models::{ActorId, NewProblem, Status};
use ideahub::repo::pg::PgRepo;
use ideahub::repo::{LikeRepo, ProblemRepo, ProfileRepo, RepoError};
use ideahub::resolution::SolutionInput;
use ideahub::{Actor, Engine, EngineError};
use sqlx::postgres::PgPoolOptions;

async fn pg_repo() -> Option<PgRepo> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await
        .ok()?;
    sqlx::migrate!("./migrations").run(&pool).await.ok()?;
    Some(PgRepo::new(pool))
}

fn report(title: &str) -> NewProblem {
    NewProblem { title: title.into(), description: "pg test".into(), affected: vec!["families".into()], ..Default::default() }
}

#[tokio::test]
#[serial_test::serial]
async fn pg_resolve_is_conditional_and_delete_cascades() {
    let Some(repo) = pg_repo().await else { eprintln!("skip: no DATABASE_URL"); return; };
    let repo = Arc::new(repo);
    let e = Engine::new(repo.clone());
    let owner = Actor::community(format!("pg-owner-{}", uuid::Uuid::new_v4()));
    let m = Actor::moderator("pg-mod");

    let p = e.create_problem(&owner, report("Pg pothole")).await.unwrap();
    assert_eq!(p.status, Status::Pending);
    assert!(p.affected.contains("families"));

    e.set_status(p.id, Status::Approved, &m).await.unwrap();
    let liked = e.toggle_like(p.id, &Actor::community("pg-liker")).await.unwrap();
    assert_eq!(liked.count, 1);
    // duplicate insert surfaces as a store conflict
    assert!(repo.insert_like(p.id, &ActorId::new("pg-liker")).await.is_err());
    e.post_comment(p.id, &owner, "still there").await.unwrap();

    let done = e.resolve(p.id, &owner, SolutionInput::new("Filled").with_link("https://example.org/p")).await.unwrap();
    assert_eq!(done.resolution().unwrap().link.as_deref(), Some("https://example.org/p"));
    assert!(matches!(e.resolve(p.id, &m, SolutionInput::new("again")).await, Err(EngineError::Conflict(_))));
    assert_eq!(repo.update_status(p.id, Status::Approved).await.unwrap_err(), RepoError::Conflict);

    // a name-only profile leaves the role unset
    repo.set_display_name(owner.id().unwrap(), "Pg Owner").await.unwrap();
    assert_eq!(repo.role_of(owner.id().unwrap()).await.unwrap(), None);
    assert_eq!(e.get_problem(&owner, p.id).await.unwrap().owner_name.as_deref(), Some("Pg Owner"));

    let reopened = e.set_status(p.id, Status::Pending, &m).await.unwrap();
    assert!(reopened.resolution().is_none());
    assert_eq!(reopened.solution.unwrap().description, "Filled");

    e.delete_problem(p.id, &owner).await.unwrap();
    assert_eq!(repo.count_likes(p.id).await.unwrap(), 0);
    assert!(matches!(repo.get_problem(p.id).await, Err(RepoError::NotFound)));
}
