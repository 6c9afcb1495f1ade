use std::io::Read;
use std::path::Path;

use adtune_application::SecretStore;
use adtune_core::{ApiCredentials, AppError, AppResult};
use adtune_domain::{SecretVersion, StageLabel};
use tracing::info;
use uuid::Uuid;

/// Reads credential JSON from `path`, or from stdin when no path is given.
pub fn read_credentials(path: Option<&Path>) -> AppResult<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|error| {
            AppError::Validation(format!(
                "failed to read credentials file '{}': {error}",
                path.display()
            ))
        }),
        None => {
            let mut json = String::new();
            std::io::stdin()
                .read_to_string(&mut json)
                .map_err(|error| {
                    AppError::Validation(format!("failed to read credentials from stdin: {error}"))
                })?;
            Ok(json)
        }
    }
}

/// Stores credential JSON as the first `AWSCURRENT` version of a secret.
///
/// Later versions only arrive through rotation, so importing into a secret
/// that already has versions is a conflict.
pub async fn import_current(
    store: &dyn SecretStore,
    secret_id: &str,
    credentials_json: &str,
) -> AppResult<SecretVersion> {
    let credentials: ApiCredentials = serde_json::from_str(credentials_json)
        .map_err(|error| AppError::Validation(format!("invalid credential JSON: {error}")))?;

    let version_id = Uuid::new_v4().to_string();
    let stored = store
        .put_secret_version(secret_id, version_id.as_str(), StageLabel::Current, credentials)
        .await?;
    info!(
        secret_id,
        version_id = stored.version_id().as_str(),
        "credential imported as AWSCURRENT"
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use adtune_application::SecretStore;
    use adtune_core::AppError;
    use adtune_domain::StageLabel;
    use adtune_infrastructure::InMemorySecretStore;

    use super::import_current;

    const CREDENTIALS: &str = r#"{
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "client_id": "client",
        "client_secret": "client-secret"
    }"#;

    #[tokio::test]
    async fn import_seeds_the_current_version() {
        let store = InMemorySecretStore::new();

        let imported = import_current(&store, "ads/linkedin", CREDENTIALS).await;
        assert!(imported.is_ok());
        let imported = imported.unwrap_or_else(|_| unreachable!());
        assert!(imported.has_stage(StageLabel::Current));

        let current = store.get_secret("ads/linkedin", StageLabel::Current).await;
        assert!(matches!(
            current,
            Ok(Some(version))
                if version.version_id() == imported.version_id()
                    && version.credentials().refresh_token() == Some("refresh-1")
        ));
    }

    #[tokio::test]
    async fn second_import_is_a_conflict() {
        let store = InMemorySecretStore::new();
        assert!(import_current(&store, "ads/linkedin", CREDENTIALS).await.is_ok());

        let again = import_current(&store, "ads/linkedin", CREDENTIALS).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(store.versions("ads/linkedin").await.len(), 1);
    }

    #[tokio::test]
    async fn malformed_or_empty_credentials_are_rejected() {
        let store = InMemorySecretStore::new();

        let malformed = import_current(&store, "ads/linkedin", "{\"refresh_token\":").await;
        assert!(matches!(malformed, Err(AppError::Validation(_))));
        let blank = import_current(&store, "ads/linkedin", r#"{"access_token":" "}"#).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));
        assert!(store.versions("ads/linkedin").await.is_empty());
    }
}
