//! Content-hash gating of GitHub uploads, driven through an in-memory store

mod common;

use common::{binding, FakeBackend, FakeGithub, StoreCall};
use klum_controller::constants::LAST_UPLOAD_HASH_ANNOTATION;
use klum_controller::controller::reconciler::{delete_binding, upload_binding, ReconcilerError};
use klum_controller::crd::{AuthInfo, Kubeconfig, KubeconfigSpec, NamedAuthInfo};
use klum_controller::github::sync::{content_hash, render};
use klum_controller::github::{SecretScope, SyncEngine, SyncError, SyncOutcome};
use std::collections::BTreeMap;
use std::time::Duration;

fn kubeconfig(token: &str) -> Kubeconfig {
    Kubeconfig::new(
        "alice",
        KubeconfigSpec {
            auth_infos: vec![NamedAuthInfo {
                name: "alice".into(),
                auth_info: AuthInfo { token: token.into() },
            }],
            current_context: "default".into(),
            ..Default::default()
        },
    )
}

fn engine(github: &FakeGithub) -> SyncEngine<FakeGithub> {
    SyncEngine::new(github.clone(), Duration::ZERO)
}

fn repo_scope() -> SecretScope {
    SecretScope::Repository {
        owner: "acme".into(),
        repository: "infra".into(),
    }
}

#[tokio::test]
async fn test_first_upload_seals_rendered_kubeconfig() {
    let github = FakeGithub::default();
    let kc = kubeconfig("abc");

    let outcome = engine(&github).upload(&binding(""), &kc).await.unwrap();
    let expected = render(&kc.spec).unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Uploaded {
            hash: content_hash(&expected)
        }
    );

    let puts = github.puts();
    assert_eq!(puts.len(), 1);
    let StoreCall::Put {
        scope,
        name,
        encrypted_value,
    } = &puts[0]
    else {
        panic!("expected a put");
    };
    assert_eq!(scope, &repo_scope());
    assert_eq!(name, "KUBECONFIG");
    assert_eq!(github.open(encrypted_value), expected);
}

#[tokio::test]
async fn test_recorded_hash_skips_upload() {
    let github = FakeGithub::default();
    let kc = kubeconfig("abc");
    let mut bound = binding("");
    bound.metadata.annotations = Some(BTreeMap::from([(
        LAST_UPLOAD_HASH_ANNOTATION.to_string(),
        content_hash(&render(&kc.spec).unwrap()),
    )]));

    let outcome = engine(&github).upload(&bound, &kc).await.unwrap();
    assert_eq!(outcome, SyncOutcome::UpToDate);
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_changed_token_uploads_again() {
    let github = FakeGithub::default();
    let engine = engine(&github);
    let mut bound = binding("");

    let SyncOutcome::Uploaded { hash: first } =
        engine.upload(&bound, &kubeconfig("abc")).await.unwrap()
    else {
        panic!("first upload skipped");
    };
    bound.metadata.annotations = Some(BTreeMap::from([(
        LAST_UPLOAD_HASH_ANNOTATION.to_string(),
        first.clone(),
    )]));

    let SyncOutcome::Uploaded { hash: second } =
        engine.upload(&bound, &kubeconfig("rotated")).await.unwrap()
    else {
        panic!("rotated token was not uploaded");
    };
    assert_ne!(first, second);
    assert_eq!(github.puts().len(), 2);
}

#[tokio::test]
async fn test_failed_put_reports_error() {
    let github = FakeGithub::default();
    github.set_fail_put(true);

    let err = engine(&github)
        .upload(&binding(""), &kubeconfig("abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Api { status: 500, .. }));
    assert!(github.puts().is_empty());

    // no hash was recorded, so the retry uploads in full
    github.set_fail_put(false);
    let outcome = engine(&github)
        .upload(&binding(""), &kubeconfig("abc"))
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::Uploaded { .. }));
    assert_eq!(github.puts().len(), 1);
}

#[tokio::test]
async fn test_incomplete_destination_fails_before_network() {
    let github = FakeGithub::default();
    let mut bound = binding("");
    bound.spec.github.secret_name = String::new();

    let err = engine(&github)
        .upload(&bound, &kubeconfig("abc"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidDestination(_)));
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_environment_scope() {
    let github = FakeGithub::default();
    engine(&github)
        .upload(&binding("production"), &kubeconfig("abc"))
        .await
        .unwrap();

    let env_scope = SecretScope::Environment {
        repository_id: 42,
        environment: "production".into(),
    };
    let calls = github.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1], StoreCall::PublicKey(env_scope.clone()));
    assert!(matches!(
        &calls[2],
        StoreCall::Put { scope, name, .. } if *scope == env_scope && name == "KUBECONFIG"
    ));
}

#[tokio::test]
async fn test_delete_targets_upload_scope() {
    let github = FakeGithub::default();
    engine(&github).delete(&binding("")).await.unwrap();

    assert_eq!(
        github.calls().last(),
        Some(&StoreCall::Delete {
            scope: repo_scope(),
            name: "KUBECONFIG".into(),
        })
    );
}

#[tokio::test]
async fn test_delete_with_invalid_destination_lets_binding_go() {
    let github = FakeGithub::default();
    let mut bound = binding("");
    bound.spec.github.repository = String::new();

    delete_binding(&engine(&github), &bound).await.unwrap();
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_failed_github_delete_blocks_cleanup() {
    let github = FakeGithub::default();
    github.set_fail_delete(true);

    let err = delete_binding(&engine(&github), &binding("")).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcilerError::Sync(SyncError::Api { status: 502, .. })
    ));

    github.set_fail_delete(false);
    delete_binding(&engine(&github), &binding("")).await.unwrap();
    assert!(github
        .calls()
        .iter()
        .any(|call| matches!(call, StoreCall::Delete { .. })));
}

#[tokio::test]
async fn test_binding_without_kubeconfig_waits() {
    let github = FakeGithub::default();
    let backend = FakeBackend::default();

    let outcome = upload_binding(&backend, &engine(&github), &binding(""))
        .await
        .unwrap();
    assert_eq!(outcome, None);
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_binding_uploads_existing_kubeconfig() {
    let github = FakeGithub::default();
    let backend = FakeBackend::default();
    backend
        .kubeconfigs
        .lock()
        .unwrap()
        .insert("alice".into(), kubeconfig("abc"));

    let outcome = upload_binding(&backend, &engine(&github), &binding(""))
        .await
        .unwrap();
    assert!(matches!(outcome, Some(SyncOutcome::Uploaded { .. })));
    assert_eq!(github.puts().len(), 1);
}
