//! GitHub App webhook handling.
//!
//! Deliveries keep the `GitHubInstallation` table in sync with where the app
//! is installed. The signature is verified before the body is even parsed.
//!
//! Suspend, unsuspend and delete target a row that may already be gone (a
//! redelivery, or an install that predates the store). Those writes are
//! best-effort: a missing row is logged and treated as success.

use byrdocs_db::{AccountType, AccountStore, DbResult, GitHubInstallation};
use byrdocs_remote::webhook::{InstallationPayload, InstallationRepositoriesPayload, RepositoryInfo};
use byrdocs_remote::{parse_event, verify_signature, RemoteError, WebhookEvent};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{PublishError, PublishResult};

/// What a delivery did to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum WebhookOutcome {
    Applied {
        event: String,
        action: String,
        installation_id: u64,
    },
    Ignored {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
}

/// Verify, parse and apply one delivery.
pub fn handle_webhook<S: AccountStore + ?Sized>(
    store: &S,
    secret: Option<&str>,
    event: &str,
    body: &[u8],
    signature: Option<&str>,
) -> PublishResult<WebhookOutcome> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(PublishError::WebhookSecretMissing)?;
    verify_signature(secret, body, signature).map_err(|e| match e {
        RemoteError::InvalidSignature => PublishError::InvalidSignature,
        other => PublishError::Remote(other),
    })?;

    let parsed = parse_event(event, body)?;
    apply_webhook(store, event, parsed)
}

/// Apply an already verified event.
pub fn apply_webhook<S: AccountStore + ?Sized>(
    store: &S,
    event: &str,
    parsed: WebhookEvent,
) -> PublishResult<WebhookOutcome> {
    let outcome = match parsed {
        WebhookEvent::Installation(payload) => apply_installation(store, event, payload)?,
        WebhookEvent::InstallationRepositories(payload) => {
            apply_repositories(store, event, payload)?
        }
        WebhookEvent::Ignored(name) => WebhookOutcome::Ignored {
            event: name,
            action: None,
        },
    };
    debug!("Webhook {}: {:?}", event, outcome);
    Ok(outcome)
}

fn single_repository(repos: &[RepositoryInfo]) -> Option<String> {
    match repos {
        [only] => Some(only.name.clone()),
        _ => None,
    }
}

/// Treat `NotFound` as done.
fn best_effort(what: &str, result: DbResult<()>) -> PublishResult<()> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!("Ignoring {} on missing row: {}", what, e);
            Ok(())
        }
        other => Ok(other?),
    }
}

fn apply_installation<S: AccountStore + ?Sized>(
    store: &S,
    event: &str,
    payload: InstallationPayload,
) -> PublishResult<WebhookOutcome> {
    let id = payload.installation.id;
    match payload.action.as_str() {
        "created" => {
            let account_type = payload
                .installation
                .account
                .kind
                .parse::<AccountType>()
                .unwrap_or_default();
            store.upsert_installation(GitHubInstallation {
                installation_id: id,
                account_login: payload.installation.account.login.clone(),
                account_type,
                repository_name: single_repository(&payload.repositories),
                is_suspended: false,
            })?;
            info!(
                "Installation {} created on {}",
                id, payload.installation.account.login
            );
        }
        "deleted" => {
            let unbound = store.delete_bindings_for_installation(id)?;
            best_effort("delete", store.delete_installation(id))?;
            info!("Installation {} deleted, {} bindings removed", id, unbound);
        }
        "suspend" => best_effort("suspend", store.set_installation_suspended(id, true))?,
        "unsuspend" => best_effort("unsuspend", store.set_installation_suspended(id, false))?,
        _ => {
            return Ok(WebhookOutcome::Ignored {
                event: event.to_string(),
                action: Some(payload.action.clone()),
            })
        }
    }
    Ok(WebhookOutcome::Applied {
        event: event.to_string(),
        action: payload.action,
        installation_id: id,
    })
}

fn apply_repositories<S: AccountStore + ?Sized>(
    store: &S,
    event: &str,
    payload: InstallationRepositoriesPayload,
) -> PublishResult<WebhookOutcome> {
    let id = payload.installation.id;
    let existing = store.get_installation(id)?;

    let repository_name = match payload.action.as_str() {
        "added" => single_repository(&payload.repositories_added),
        "removed" => {
            let current = existing.as_ref().and_then(|i| i.repository_name.clone());
            current.filter(|name| {
                !payload
                    .repositories_removed
                    .iter()
                    .any(|r| &r.name == name)
            })
        }
        _ => {
            return Ok(WebhookOutcome::Ignored {
                event: event.to_string(),
                action: Some(payload.action.clone()),
            })
        }
    };

    match existing {
        Some(_) => store.set_installation_repository(id, repository_name)?,
        None => store.upsert_installation(GitHubInstallation {
            installation_id: id,
            account_login: payload.installation.account.login.clone(),
            account_type: payload
                .installation
                .account
                .kind
                .parse::<AccountType>()
                .unwrap_or_default(),
            repository_name,
            is_suspended: false,
        })?,
    }

    Ok(WebhookOutcome::Applied {
        event: event.to_string(),
        action: payload.action,
        installation_id: id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byrdocs_db::{MemoryStore, RepositoryBinding, UserId};
    use byrdocs_remote::webhook::sign;
    use chrono::Utc;

    const SECRET: &str = "hook-secret";

    fn installation_body(action: &str, repos: &[&str]) -> String {
        let repos: Vec<String> = repos
            .iter()
            .map(|r| format!(r#"{{"name":"{}","full_name":"octo/{}"}}"#, r, r))
            .collect();
        format!(
            r#"{{"action":"{}","installation":{{"id":10,"account":{{"login":"octo","type":"User"}}}},"repositories":[{}]}}"#,
            action,
            repos.join(",")
        )
    }

    fn deliver(store: &MemoryStore, event: &str, body: &str) -> PublishResult<WebhookOutcome> {
        let signature = sign(SECRET, body.as_bytes()).unwrap();
        handle_webhook(store, Some(SECRET), event, body.as_bytes(), Some(&signature))
    }

    #[test]
    fn test_rejects_bad_or_missing_signature() {
        let store = MemoryStore::new();
        let body = installation_body("created", &["archive"]);
        let err = handle_webhook(&store, Some(SECRET), "installation", body.as_bytes(), None)
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidSignature));

        let forged = sign("other", body.as_bytes()).unwrap();
        let err = handle_webhook(
            &store,
            Some(SECRET),
            "installation",
            body.as_bytes(),
            Some(&forged),
        )
        .unwrap_err();
        assert!(err.is_auth());
        assert!(store.list_installations().unwrap().is_empty());
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let store = MemoryStore::new();
        assert!(matches!(
            handle_webhook(&store, None, "installation", b"{}", Some("sha256=00")),
            Err(PublishError::WebhookSecretMissing)
        ));
    }

    #[test]
    fn test_installation_lifecycle() {
        let store = MemoryStore::new();
        deliver(&store, "installation", &installation_body("created", &["archive"])).unwrap();
        let row = store.get_installation(10).unwrap().unwrap();
        assert_eq!(row.repository_name.as_deref(), Some("archive"));
        assert_eq!(row.account_type, AccountType::User);

        deliver(&store, "installation", &installation_body("suspend", &[])).unwrap();
        assert!(store.get_installation(10).unwrap().unwrap().is_suspended);
        deliver(&store, "installation", &installation_body("unsuspend", &[])).unwrap();
        assert!(!store.get_installation(10).unwrap().unwrap().is_suspended);

        store
            .create_binding(RepositoryBinding {
                user_id: UserId(1),
                installation_id: 10,
                created_at: Utc::now(),
            })
            .unwrap();
        deliver(&store, "installation", &installation_body("deleted", &[])).unwrap();
        assert!(store.get_installation(10).unwrap().is_none());
        assert!(store.get_binding(UserId(1)).unwrap().is_none());
    }

    #[test]
    fn test_cleanups_on_missing_rows_are_swallowed() {
        let store = MemoryStore::new();
        for action in ["suspend", "unsuspend", "deleted"] {
            let outcome = deliver(&store, "installation", &installation_body(action, &[])).unwrap();
            assert!(matches!(outcome, WebhookOutcome::Applied { .. }));
        }
    }

    #[test]
    fn test_multiple_repositories_leave_name_unset() {
        let store = MemoryStore::new();
        deliver(&store, "installation", &installation_body("created", &["a", "b"])).unwrap();
        assert!(store.get_installation(10).unwrap().unwrap().repository_name.is_none());
    }

    #[test]
    fn test_repository_added_then_removed() {
        let store = MemoryStore::new();
        deliver(&store, "installation", &installation_body("created", &[])).unwrap();

        let added = r#"{"action":"added","installation":{"id":10,"account":{"login":"octo","type":"User"}},"repositories_added":[{"name":"archive"}],"repositories_removed":[]}"#;
        deliver(&store, "installation_repositories", added).unwrap();
        assert_eq!(
            store.get_installation(10).unwrap().unwrap().repository_name.as_deref(),
            Some("archive")
        );

        let removed = r#"{"action":"removed","installation":{"id":10,"account":{"login":"octo","type":"User"}},"repositories_added":[],"repositories_removed":[{"name":"archive"}]}"#;
        deliver(&store, "installation_repositories", removed).unwrap();
        assert!(store.get_installation(10).unwrap().unwrap().repository_name.is_none());
    }

    #[test]
    fn test_unrelated_events_are_ignored() {
        let store = MemoryStore::new();
        let outcome = deliver(&store, "push", "{}").unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event: "push".to_string(),
                action: None
            }
        );
    }
}
