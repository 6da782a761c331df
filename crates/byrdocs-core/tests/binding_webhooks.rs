//! Installation webhooks feeding repository binding.

mod common;

use byrdocs_core::{PublishError, WebhookOutcome};
use byrdocs_remote::webhook::sign;
use tempfile::TempDir;

use common::{harness, FakeGitHub, LOGIN};

const SECRET: &str = "hook-secret";

fn installation_event(action: &str) -> String {
    format!(
        r#"{{"action":"{}","installation":{{"id":5,"account":{{"login":"{}","type":"User"}}}},"repositories":[{{"name":"byrdocs-archive","full_name":"{}/byrdocs-archive"}}]}}"#,
        action, LOGIN, LOGIN
    )
}

fn deliver(h: &common::Harness, event: &str, body: &str) -> Result<WebhookOutcome, PublishError> {
    let signature = sign(SECRET, body.as_bytes()).unwrap();
    h.engine
        .handle_webhook(event, body.as_bytes(), Some(&signature))
}

#[test]
fn test_installation_makes_fork_bindable() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), &[], FakeGitHub::default());
    let user = h.engine.login_with_token("gho_test").unwrap().github_user_id;

    let before = h.engine.binding_overview(user).unwrap();
    assert_eq!(before.candidates.len(), 1);
    assert_eq!(before.candidates[0].installation_id, None);

    deliver(&h, "installation", &installation_event("created")).unwrap();
    let overview = h.engine.binding_overview(user).unwrap();
    assert_eq!(overview.candidates[0].name, "byrdocs-archive");
    assert_eq!(overview.candidates[0].installation_id, Some(5));

    let bound = h.engine.bind(user, 5).unwrap();
    assert!(bound.is_ready());
    assert_eq!(
        h.engine.binding_overview(user).unwrap().current.map(|b| b.installation_id),
        Some(5)
    );
}

#[test]
fn test_suspended_installation_blocks_publishing() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), &[], FakeGitHub::default());
    let user = h.engine.login_with_token("gho_test").unwrap().github_user_id;

    deliver(&h, "installation", &installation_event("created")).unwrap();
    h.engine.bind(user, 5).unwrap();
    deliver(&h, "installation", &installation_event("suspend")).unwrap();

    let current = h.engine.current_binding(user).unwrap().unwrap();
    assert!(current.is_suspended);
    assert!(matches!(
        h.engine.bind(user, 5),
        Err(PublishError::InstallationUnavailable { .. })
    ));
}

#[test]
fn test_deleting_installation_unbinds_users() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), &[], FakeGitHub::default());
    let user = h.engine.login_with_token("gho_test").unwrap().github_user_id;

    deliver(&h, "installation", &installation_event("created")).unwrap();
    h.engine.bind(user, 5).unwrap();
    deliver(&h, "installation", &installation_event("deleted")).unwrap();

    assert!(h.engine.current_binding(user).unwrap().is_none());
    // Redelivery of the same event is harmless.
    deliver(&h, "installation", &installation_event("deleted")).unwrap();
}

#[test]
fn test_tampered_delivery_is_rejected() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), &[], FakeGitHub::default());
    let body = installation_event("created");
    let signature = sign(SECRET, body.as_bytes()).unwrap();
    let tampered = body.replace(LOGIN, "mallory");

    let err = h
        .engine
        .handle_webhook("installation", tampered.as_bytes(), Some(&signature))
        .unwrap_err();
    assert!(matches!(err, PublishError::InvalidSignature));
}
