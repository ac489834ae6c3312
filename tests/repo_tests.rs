#![cfg(feature = "inmem-store")]

use std::collections::BTreeSet;

use chrono::Utc;
use ideahub::{
    models::{ActorId, Category, NewComment, ProblemDraft, Resolution, Role, Severity, Status},
    repo::{inmem::InMemRepo, RepoError},
};
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use ideahub::repo::{CommentRepo, LikeRepo, ProblemRepo, ProfileRepo};

/// Helper that returns a fresh, empty repository for every test run.
fn repo() -> InMemRepo {
    // isolate state: do **not** persist to the default file path
    InMemRepo::ephemeral()
}

fn draft(owner: &str, title: &str) -> ProblemDraft {
    ProblemDraft {
        owner: ActorId::new(owner),
        title: title.into(),
        description: "details".into(),
        category: Category::Transport,
        severity: Severity::Severe,
        affected: BTreeSet::from(["commuters".to_string()]),
        impact: BTreeSet::new(),
        location: None,
        address: None,
        image: None,
    }
}

fn solution(by: &str) -> Resolution {
    Resolution {
        description: "Patched".into(),
        link: None,
        after_image: None,
        resolved_by: ActorId::new(by),
        resolved_at: Utc::now(),
    }
}

#[tokio::test]
async fn problems_start_pending_and_list_newest_first() {
    let r = repo();
    assert!(r.list_problems().await.unwrap().is_empty());

    let a = r.create_problem(draft("alice", "first")).await.unwrap();
    let b = r.create_problem(draft("bob", "second")).await.unwrap();
    assert_eq!(a.status, Status::Pending);
    assert!(a.solution.is_none());
    assert_ne!(a.id, b.id);

    let ids: Vec<_> = r.list_problems().await.unwrap().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);

    assert!(matches!(r.get_problem(9999).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn resolve_writes_status_and_solution_once() {
    let r = repo();
    let p = r.create_problem(draft("alice", "pothole")).await.unwrap();

    let resolved = r.resolve_problem(p.id, solution("alice")).await.unwrap();
    assert_eq!(resolved.status, Status::Resolved);
    assert_eq!(resolved.solution.as_ref().map(|s| s.description.as_str()), Some("Patched"));

    // second resolve is rejected by the store itself
    let err = r.resolve_problem(p.id, solution("mod")).await.unwrap_err();
    assert_eq!(err, RepoError::Conflict);
    let stored = r.get_problem(p.id).await.unwrap();
    assert_eq!(stored.solution.unwrap().resolved_by, ActorId::new("alice"));

    assert!(matches!(r.resolve_problem(404, solution("alice")).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn likes_are_unique_per_actor() {
    let r = repo();
    let p = r.create_problem(draft("alice", "noise")).await.unwrap();
    let bob = ActorId::new("bob");

    r.insert_like(p.id, &bob).await.unwrap();
    assert_eq!(r.insert_like(p.id, &bob).await.unwrap_err(), RepoError::Conflict);
    r.insert_like(p.id, &ActorId::new("carol")).await.unwrap();
    assert_eq!(r.count_likes(p.id).await.unwrap(), 2);
    assert!(r.has_liked(p.id, &bob).await.unwrap());

    assert!(r.delete_like(p.id, &bob).await.unwrap());
    assert!(!r.delete_like(p.id, &bob).await.unwrap());
    assert_eq!(r.count_likes(p.id).await.unwrap(), 1);

    assert_eq!(r.insert_like(777, &bob).await.unwrap_err(), RepoError::NotFound);
}

#[tokio::test]
async fn comments_are_ascending_and_require_a_problem() {
    let r = repo();
    let p = r.create_problem(draft("alice", "flooding")).await.unwrap();
    for body in ["one", "two", "three"] {
        r.create_comment(NewComment { problem_id: p.id, author: ActorId::new("bob"), body: body.into() })
            .await
            .unwrap();
    }
    let bodies: Vec<_> = r.list_comments(p.id).await.unwrap().into_iter().map(|c| c.body).collect();
    assert_eq!(bodies, vec!["one", "two", "three"]);

    let orphan = NewComment { problem_id: 12345, author: ActorId::new("bob"), body: "x".into() };
    assert_eq!(r.create_comment(orphan).await.unwrap_err(), RepoError::NotFound);
}

#[tokio::test]
async fn delete_cascades_comments_and_likes() {
    let r = repo();
    let p = r.create_problem(draft("alice", "trash")).await.unwrap();
    let keep = r.create_problem(draft("alice", "other")).await.unwrap();
    let c = r
        .create_comment(NewComment { problem_id: p.id, author: ActorId::new("bob"), body: "+1".into() })
        .await
        .unwrap();
    r.insert_like(p.id, &ActorId::new("bob")).await.unwrap();
    r.insert_like(keep.id, &ActorId::new("bob")).await.unwrap();

    r.delete_problem(p.id).await.unwrap();

    assert!(matches!(r.get_problem(p.id).await, Err(RepoError::NotFound)));
    assert!(matches!(r.get_comment(c.id).await, Err(RepoError::NotFound)));
    assert_eq!(r.count_likes(p.id).await.unwrap(), 0);
    assert_eq!(r.count_likes(keep.id).await.unwrap(), 1);
    assert_eq!(r.delete_problem(p.id).await.unwrap_err(), RepoError::NotFound);
}

#[tokio::test]
async fn roles_default_to_none_until_set() {
    let r = repo();
    let who = ActorId::new("dana");
    assert_eq!(r.role_of(&who).await.unwrap(), None);
    r.set_role(&who, Role::Moderator).await.unwrap();
    assert_eq!(r.role_of(&who).await.unwrap(), Some(Role::Moderator));
    r.set_role(&who, Role::Community).await.unwrap();
    assert_eq!(r.role_of(&who).await.unwrap(), Some(Role::Community));
}

#[tokio::test]
async fn display_name_does_not_invent_a_role() {
    let r = repo();
    let who = ActorId::new("erin");
    assert_eq!(r.display_name(&who).await.unwrap(), None);
    r.set_display_name(&who, "Erin Q.").await.unwrap();
    assert_eq!(r.display_name(&who).await.unwrap().as_deref(), Some("Erin Q."));
    assert_eq!(r.role_of(&who).await.unwrap(), None);

    r.set_role(&who, Role::Moderator).await.unwrap();
    assert_eq!(r.display_name(&who).await.unwrap().as_deref(), Some("Erin Q."));
}

#[tokio::test]
async fn status_update_never_leaves_resolved_except_to_pending() {
    let r = repo();
    let p = r.create_problem(draft("alice", "race")).await.unwrap();
    r.resolve_problem(p.id, solution("alice")).await.unwrap();

    // a moderator decision computed from an earlier read lands after the resolve
    assert_eq!(r.update_status(p.id, Status::Approved).await.unwrap_err(), RepoError::Conflict);
    assert_eq!(r.update_status(p.id, Status::Rejected).await.unwrap_err(), RepoError::Conflict);
    assert_eq!(r.get_problem(p.id).await.unwrap().status, Status::Resolved);

    assert_eq!(r.update_status(p.id, Status::Pending).await.unwrap().status, Status::Pending);
    assert_eq!(r.update_status(p.id, Status::Approved).await.unwrap().status, Status::Approved);
    assert_eq!(r.update_status(404, Status::Approved).await.unwrap_err(), RepoError::NotFound);
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let id = {
        let r = InMemRepo::with_snapshot(&path).unwrap();
        let p = r.create_problem(draft("alice", "persisted")).await.unwrap();
        r.insert_like(p.id, &ActorId::new("bob")).await.unwrap();
        r.resolve_problem(p.id, solution("alice")).await.unwrap();
        p.id
    };

    let reopened = InMemRepo::with_snapshot(&path).unwrap();
    let p = reopened.get_problem(id).await.unwrap();
    assert_eq!(p.title, "persisted");
    assert_eq!(p.status, Status::Resolved);
    assert_eq!(reopened.count_likes(id).await.unwrap(), 1);

    // ids keep increasing after a reload
    let next = reopened.create_problem(draft("bob", "after reload")).await.unwrap();
    assert!(next.id > id);
}

#[tokio::test]
async fn failed_snapshot_write_rolls_the_change_back() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let r = InMemRepo::with_snapshot(data.join("state.json")).unwrap();
    let p = r.create_problem(draft("alice", "kept")).await.unwrap();

    // replace the data directory with a plain file so every snapshot write fails
    std::fs::remove_dir_all(&data).unwrap();
    std::fs::write(&data, b"not a directory").unwrap();

    assert!(matches!(r.create_problem(draft("bob", "lost")).await, Err(RepoError::Internal(_))));
    assert_eq!(r.list_problems().await.unwrap().len(), 1);

    assert!(matches!(r.resolve_problem(p.id, solution("alice")).await, Err(RepoError::Internal(_))));
    let still = r.get_problem(p.id).await.unwrap();
    assert_eq!(still.status, Status::Pending);
    assert!(still.solution.is_none());

    assert!(matches!(r.insert_like(p.id, &ActorId::new("bob")).await, Err(RepoError::Internal(_))));
    assert_eq!(r.count_likes(p.id).await.unwrap(), 0);

    // once the directory is back, a retry succeeds instead of conflicting
    std::fs::remove_file(&data).unwrap();
    let resolved = r.resolve_problem(p.id, solution("alice")).await.unwrap();
    assert_eq!(resolved.status, Status::Resolved);
    let next = r.create_problem(draft("bob", "retried")).await.unwrap();
    assert_eq!(next.id, p.id + 1);
}

#[tokio::test]
async fn unwritable_snapshot_path_fails_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain");
    std::fs::write(&file, b"x").unwrap();

    let r = InMemRepo::with_snapshot(file.join("state.json")).unwrap();
    assert!(matches!(r.create_problem(draft("alice", "nowhere")).await, Err(RepoError::Internal(_))));
    assert!(r.list_problems().await.unwrap().is_empty());
    let dana = ActorId::new("dana");
    assert!(matches!(r.set_role(&dana, Role::Moderator).await, Err(RepoError::Internal(_))));
    assert_eq!(r.role_of(&dana).await.unwrap(), None);
}

#[test]
fn corrupt_snapshot_refuses_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{\"problems\": [trunc").unwrap();

    assert!(matches!(InMemRepo::with_snapshot(&path), Err(RepoError::Internal(_))));
    // the file is left alone for inspection
    assert_eq!(std::fs::read(&path).unwrap(), b"{\"problems\": [trunc");
}
