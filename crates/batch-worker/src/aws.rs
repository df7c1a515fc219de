//! Shared AWS SDK configuration loading

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;

use crate::storage::config::StaticCredentials;

/// Load the SDK configuration for `region`.
///
/// Static credentials win when present; otherwise the default provider chain
/// (environment, profile, container/instance role) is used.
pub async fn load_sdk_config(region: &str, credentials: Option<&StaticCredentials>) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    if let Some(creds) = credentials {
        loader = loader.credentials_provider(Credentials::new(
            &creds.access_key,
            &creds.secret_key,
            creds.session_token.clone(),
            None,
            "batch-worker",
        ));
    }

    loader.load().await
}
