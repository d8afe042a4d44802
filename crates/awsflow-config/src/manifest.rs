//! awsflow.yaml のモデル
//!
//! ```yaml
//! provider:
//!   region: us-west-2
//!   default_tags:
//!     Team: platform
//! resources:
//!   - type: aws_ecr_pull_through_cache_rule
//!     name: public
//!     config:
//!       ecr_repository_prefix: ecr-public
//!       upstream_registry_url: public.ecr.aws
//! data:
//!   - type: aws_route53_resolver_rules
//!     name: forward
//!     config:
//!       rule_type: FORWARD
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// プロバイダ共通の設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub default_tags: BTreeMap<String, String>,
}

/// リソースまたはデータソース 1 件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl BlockConfig {
    /// `TYPE.NAME`
    pub fn address(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub resources: Vec<BlockConfig>,
    #[serde(default)]
    pub data: Vec<BlockConfig>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Manifest =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: Manifest =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: "<inline>".into(),
                source,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// 名前の形式とアドレスの一意性を確認する
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for (kind, block) in self
            .resources
            .iter()
            .map(|b| ("resource", b))
            .chain(self.data.iter().map(|b| ("data", b)))
        {
            if !is_identifier(&block.type_name) || !is_identifier(&block.name) {
                return Err(ConfigError::InvalidBlock(format!(
                    "{} {:?}: type と name は英数字、'_'、'-' のみ使用できます",
                    kind,
                    block.address()
                )));
            }
            if !seen.insert((kind, block.address())) {
                return Err(ConfigError::DuplicateAddress(block.address()));
            }
        }

        Ok(())
    }

    pub fn resource(&self, address: &str) -> Option<&BlockConfig> {
        self.resources.iter().find(|b| b.address() == address)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// `TYPE.NAME` を分解する
pub fn parse_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once('.') {
        Some((type_name, name)) if is_identifier(type_name) && is_identifier(name) => {
            Ok((type_name, name))
        }
        _ => Err(ConfigError::InvalidAddress(address.to_string())),
    }
}
