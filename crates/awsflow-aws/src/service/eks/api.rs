//! EKS operations used by the cluster adapter
//!
//! [`Cluster`] and the request structs are plain mirrors of the SDK
//! shapes, so the adapter's expand/flatten logic can be tested against
//! a fake [`EksApi`].

use crate::errs::classify;
use crate::error::{AwsError, Result};
use crate::tags::Tags;
use async_trait::async_trait;
use aws_sdk_eks::types as sdk;
use aws_smithy_types::date_time::Format;
use std::collections::HashMap;

pub const CLUSTER_NOT_FOUND: &str = "ResourceNotFoundException";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VpcConfig {
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub endpoint_private_access: bool,
    pub endpoint_public_access: bool,
    pub public_access_cidrs: Vec<String>,
    pub cluster_security_group_id: Option<String>,
    pub vpc_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KubernetesNetworkConfig {
    pub ip_family: Option<String>,
    pub service_ipv4_cidr: Option<String>,
    pub service_ipv6_cidr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncryptionConfig {
    pub resources: Vec<String>,
    pub key_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutpostConfig {
    pub outpost_arns: Vec<String>,
    pub control_plane_instance_type: String,
    pub placement_group_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessConfig {
    pub authentication_mode: Option<String>,
    pub bootstrap_cluster_creator_admin_permissions: Option<bool>,
}

/// A cluster as `DescribeCluster` reports it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cluster {
    pub name: String,
    pub arn: Option<String>,
    pub id: Option<String>,
    /// RFC 3339
    pub created_at: Option<String>,
    pub version: Option<String>,
    pub endpoint: Option<String>,
    pub role_arn: Option<String>,
    pub platform_version: Option<String>,
    pub status: Option<String>,
    pub certificate_authority_data: Option<String>,
    pub oidc_issuer: Option<String>,
    pub enabled_log_types: Vec<String>,
    pub tags: Tags,
    pub vpc_config: Option<VpcConfig>,
    pub kubernetes_network_config: Option<KubernetesNetworkConfig>,
    pub encryption_config: Option<EncryptionConfig>,
    pub outpost_config: Option<OutpostConfig>,
    pub access_config: Option<AccessConfig>,
    pub support_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateClusterRequest {
    pub name: String,
    pub role_arn: String,
    pub version: Option<String>,
    pub bootstrap_self_managed_addons: Option<bool>,
    pub vpc_config: VpcConfig,
    pub kubernetes_network_config: Option<KubernetesNetworkConfig>,
    pub encryption_config: Option<EncryptionConfig>,
    pub outpost_config: Option<OutpostConfig>,
    pub access_config: Option<AccessConfig>,
    pub support_type: Option<String>,
    pub enabled_log_types: Vec<String>,
    pub tags: Tags,
}

/// Log types to switch on and off
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggingUpdate {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
}

/// One `UpdateClusterConfig` call; unset parts are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateClusterConfigRequest {
    pub name: String,
    pub logging: Option<LoggingUpdate>,
    pub vpc_config: Option<VpcConfig>,
    pub authentication_mode: Option<String>,
    pub support_type: Option<String>,
}

#[async_trait]
pub trait EksApi: Send + Sync {
    async fn create_cluster(&self, request: CreateClusterRequest) -> Result<Cluster>;

    /// Fails with [`AwsError::NotFound`] for `ResourceNotFoundException`
    async fn describe_cluster(&self, name: &str) -> Result<Cluster>;

    /// Returns the update ID
    async fn update_cluster_version(&self, name: &str, version: &str) -> Result<String>;

    /// Returns the update ID
    async fn update_cluster_config(&self, request: UpdateClusterConfigRequest) -> Result<String>;

    async fn tag_resource(&self, arn: &str, tags: Tags) -> Result<()>;

    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<()>;

    async fn delete_cluster(&self, name: &str) -> Result<()>;
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

fn logging(enable: &[String], disable: &[String]) -> sdk::Logging {
    let setup = |types: &[String], enabled: bool| {
        sdk::LogSetup::builder()
            .set_types(Some(types.iter().map(|t| sdk::LogType::from(t.as_str())).collect()))
            .enabled(enabled)
            .build()
    };

    let mut builder = sdk::Logging::builder();
    if !enable.is_empty() {
        builder = builder.cluster_logging(setup(enable, true));
    }
    if !disable.is_empty() {
        builder = builder.cluster_logging(setup(disable, false));
    }
    builder.build()
}

fn vpc_config_request(vpc: &VpcConfig, with_subnets: bool) -> sdk::VpcConfigRequest {
    let builder = sdk::VpcConfigRequest::builder()
        .set_security_group_ids(non_empty(&vpc.security_group_ids))
        .endpoint_private_access(vpc.endpoint_private_access)
        .endpoint_public_access(vpc.endpoint_public_access)
        .set_public_access_cidrs(non_empty(&vpc.public_access_cidrs));

    if with_subnets {
        builder.set_subnet_ids(Some(vpc.subnet_ids.clone())).build()
    } else {
        builder.build()
    }
}

fn from_sdk_cluster(cluster: &sdk::Cluster) -> Cluster {
    let owned = |s: Option<&str>| s.map(str::to_string);

    let vpc_config = cluster.resources_vpc_config().map(|vpc| VpcConfig {
        subnet_ids: vpc.subnet_ids().to_vec(),
        security_group_ids: vpc.security_group_ids().to_vec(),
        endpoint_private_access: vpc.endpoint_private_access(),
        endpoint_public_access: vpc.endpoint_public_access(),
        public_access_cidrs: vpc.public_access_cidrs().to_vec(),
        cluster_security_group_id: owned(vpc.cluster_security_group_id()),
        vpc_id: owned(vpc.vpc_id()),
    });

    let kubernetes_network_config =
        cluster
            .kubernetes_network_config()
            .map(|net| KubernetesNetworkConfig {
                ip_family: net.ip_family().map(|f| f.as_str().to_string()),
                service_ipv4_cidr: owned(net.service_ipv4_cidr()),
                service_ipv6_cidr: owned(net.service_ipv6_cidr()),
            });

    let encryption_config = cluster.encryption_config().first().map(|enc| EncryptionConfig {
        resources: enc.resources().to_vec(),
        key_arn: owned(enc.provider().and_then(|p| p.key_arn())),
    });

    let outpost_config = cluster.outpost_config().map(|outpost| OutpostConfig {
        outpost_arns: outpost.outpost_arns().to_vec(),
        control_plane_instance_type: outpost.control_plane_instance_type().to_string(),
        placement_group_name: owned(
            outpost
                .control_plane_placement()
                .and_then(|p| p.group_name()),
        ),
    });

    let access_config = cluster.access_config().map(|access| AccessConfig {
        authentication_mode: access.authentication_mode().map(|m| m.as_str().to_string()),
        bootstrap_cluster_creator_admin_permissions: access
            .bootstrap_cluster_creator_admin_permissions(),
    });

    let enabled_log_types = cluster
        .logging()
        .map(|logging| {
            logging
                .cluster_logging()
                .iter()
                .filter(|setup| setup.enabled() == Some(true))
                .flat_map(|setup| setup.types().iter().map(|t| t.as_str().to_string()))
                .collect()
        })
        .unwrap_or_default();

    Cluster {
        name: cluster.name().unwrap_or_default().to_string(),
        arn: owned(cluster.arn()),
        id: owned(cluster.id()),
        created_at: cluster
            .created_at()
            .and_then(|t| t.fmt(Format::DateTime).ok()),
        version: owned(cluster.version()),
        endpoint: owned(cluster.endpoint()),
        role_arn: owned(cluster.role_arn()),
        platform_version: owned(cluster.platform_version()),
        status: cluster.status().map(|s| s.as_str().to_string()),
        certificate_authority_data: owned(cluster.certificate_authority().and_then(|c| c.data())),
        oidc_issuer: owned(
            cluster
                .identity()
                .and_then(|i| i.oidc())
                .and_then(|o| o.issuer()),
        ),
        enabled_log_types,
        tags: cluster
            .tags()
            .map(|tags| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default(),
        vpc_config,
        kubernetes_network_config,
        encryption_config,
        outpost_config,
        access_config,
        support_type: cluster
            .upgrade_policy()
            .and_then(|p| p.support_type())
            .map(|s| s.as_str().to_string()),
    }
}

fn update_id(update: Option<&sdk::Update>) -> Result<String> {
    update
        .and_then(|u| u.id())
        .map(str::to_string)
        .ok_or_else(|| AwsError::InvalidResponse("update response carries no update ID".to_string()))
}

#[async_trait]
impl EksApi for aws_sdk_eks::Client {
    async fn create_cluster(&self, request: CreateClusterRequest) -> Result<Cluster> {
        let network = request.kubernetes_network_config.as_ref().map(|net| {
            sdk::KubernetesNetworkConfigRequest::builder()
                .set_ip_family(net.ip_family.as_deref().map(sdk::IpFamily::from))
                .set_service_ipv4_cidr(net.service_ipv4_cidr.clone())
                .build()
        });

        let encryption = request.encryption_config.as_ref().map(|enc| {
            vec![
                sdk::EncryptionConfig::builder()
                    .set_resources(Some(enc.resources.clone()))
                    .provider(
                        sdk::Provider::builder()
                            .set_key_arn(enc.key_arn.clone())
                            .build(),
                    )
                    .build(),
            ]
        });

        let outpost = request
            .outpost_config
            .as_ref()
            .map(|outpost| {
                sdk::OutpostConfigRequest::builder()
                    .set_outpost_arns(Some(outpost.outpost_arns.clone()))
                    .control_plane_instance_type(&outpost.control_plane_instance_type)
                    .set_control_plane_placement(outpost.placement_group_name.as_ref().map(
                        |group| {
                            sdk::ControlPlanePlacementRequest::builder()
                                .group_name(group)
                                .build()
                        },
                    ))
                    .build()
                    .map_err(|e| AwsError::InvalidRequest(e.to_string()))
            })
            .transpose()?;

        let access = request.access_config.as_ref().map(|access| {
            sdk::CreateAccessConfigRequest::builder()
                .set_authentication_mode(
                    access
                        .authentication_mode
                        .as_deref()
                        .map(sdk::AuthenticationMode::from),
                )
                .set_bootstrap_cluster_creator_admin_permissions(
                    access.bootstrap_cluster_creator_admin_permissions,
                )
                .build()
        });

        let upgrade_policy = request.support_type.as_deref().map(|support| {
            sdk::UpgradePolicyRequest::builder()
                .support_type(sdk::SupportType::from(support))
                .build()
        });

        let tags: Option<HashMap<String, String>> =
            (!request.tags.is_empty()).then(|| request.tags.clone().into_iter().collect());

        let output = self
            .create_cluster()
            .name(&request.name)
            .role_arn(&request.role_arn)
            .set_version(request.version.clone())
            .set_bootstrap_self_managed_addons(request.bootstrap_self_managed_addons)
            .resources_vpc_config(vpc_config_request(&request.vpc_config, true))
            .set_kubernetes_network_config(network)
            .set_encryption_config(encryption)
            .set_outpost_config(outpost)
            .set_access_config(access)
            .set_upgrade_policy(upgrade_policy)
            .logging(logging(&request.enabled_log_types, &[]))
            .set_tags(tags)
            .send()
            .await
            .map_err(|e| classify(e, &[]))?;

        output
            .cluster()
            .map(from_sdk_cluster)
            .ok_or_else(|| AwsError::InvalidResponse("CreateCluster returned no cluster".to_string()))
    }

    async fn describe_cluster(&self, name: &str) -> Result<Cluster> {
        let output = self
            .describe_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| classify(e, &[CLUSTER_NOT_FOUND]))?;

        output.cluster().map(from_sdk_cluster).ok_or_else(|| {
            AwsError::NotFound(format!("{}: cluster {} not found", CLUSTER_NOT_FOUND, name))
        })
    }

    async fn update_cluster_version(&self, name: &str, version: &str) -> Result<String> {
        let output = self
            .update_cluster_version()
            .name(name)
            .version(version)
            .send()
            .await
            .map_err(|e| classify(e, &[CLUSTER_NOT_FOUND]))?;

        update_id(output.update())
    }

    async fn update_cluster_config(&self, request: UpdateClusterConfigRequest) -> Result<String> {
        let access = request.authentication_mode.as_deref().map(|mode| {
            sdk::UpdateAccessConfigRequest::builder()
                .authentication_mode(sdk::AuthenticationMode::from(mode))
                .build()
        });

        let upgrade_policy = request.support_type.as_deref().map(|support| {
            sdk::UpgradePolicyRequest::builder()
                .support_type(sdk::SupportType::from(support))
                .build()
        });

        let output = self
            .update_cluster_config()
            .name(&request.name)
            .set_logging(
                request
                    .logging
                    .as_ref()
                    .map(|l| logging(&l.enable, &l.disable)),
            )
            .set_resources_vpc_config(
                request
                    .vpc_config
                    .as_ref()
                    .map(|vpc| vpc_config_request(vpc, false)),
            )
            .set_access_config(access)
            .set_upgrade_policy(upgrade_policy)
            .send()
            .await
            .map_err(|e| classify(e, &[CLUSTER_NOT_FOUND]))?;

        update_id(output.update())
    }

    async fn tag_resource(&self, arn: &str, tags: Tags) -> Result<()> {
        self.tag_resource()
            .resource_arn(arn)
            .set_tags(Some(tags.into_iter().collect()))
            .send()
            .await
            .map_err(|e| classify(e, &[CLUSTER_NOT_FOUND]))?;
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<()> {
        self.untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(keys))
            .send()
            .await
            .map_err(|e| classify(e, &[CLUSTER_NOT_FOUND]))?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.delete_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| classify(e, &[CLUSTER_NOT_FOUND]))?;
        Ok(())
    }
}
