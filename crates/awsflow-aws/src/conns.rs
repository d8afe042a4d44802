//! Provider configuration and the shared SDK client

use crate::error::{AwsError, Result};
use crate::tags::Tags;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Provider-level settings shared by every adapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Falls back to the SDK's default chain (AWS_REGION, profile) when unset
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub profile: Option<String>,

    /// Overrides every service endpoint (e.g., a local emulator)
    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Tags applied to every taggable resource
    #[serde(default)]
    pub default_tags: Tags,
}

/// Loaded SDK configuration plus provider-level settings
#[derive(Clone, Debug)]
pub struct AwsClient {
    sdk_config: Arc<SdkConfig>,
    region: String,
    default_tags: Tags,
}

impl AwsClient {
    /// Loads credentials and region through the SDK default chain
    pub async fn load(config: &AwsConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(attempts) = config.max_attempts {
            loader = loader.retry_config(RetryConfig::standard().with_max_attempts(attempts));
        }

        let sdk_config = loader.load().await;
        Self::with_sdk_config(sdk_config, config.default_tags.clone())
    }

    /// Wraps an already-built SDK configuration
    pub fn with_sdk_config(sdk_config: SdkConfig, default_tags: Tags) -> Result<Self> {
        let region = sdk_config
            .region()
            .map(|r| r.as_ref().to_string())
            .ok_or(AwsError::MissingRegion)?;

        debug!("AWS client configured for region {}", region);

        Ok(Self {
            sdk_config: Arc::new(sdk_config),
            region,
            default_tags,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn default_tags(&self) -> &Tags {
        &self.default_tags
    }

    pub fn ecr(&self) -> aws_sdk_ecr::Client {
        aws_sdk_ecr::Client::new(&self.sdk_config)
    }

    pub fn eks(&self) -> aws_sdk_eks::Client {
        aws_sdk_eks::Client::new(&self.sdk_config)
    }

    pub fn route53resolver(&self) -> aws_sdk_route53resolver::Client {
        aws_sdk_route53resolver::Client::new(&self.sdk_config)
    }
}
