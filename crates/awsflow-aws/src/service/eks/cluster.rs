//! aws_eks_cluster
//!
//! Create and every in-place update leave the cluster in a transitional
//! status; the adapter polls `DescribeCluster` until it is `ACTIVE`
//! again (or gone, after delete) within the operation's timeout.

use super::api::{
    AccessConfig, Cluster, CreateClusterRequest, EksApi, EncryptionConfig,
    KubernetesNetworkConfig, LoggingUpdate, OutpostConfig, UpdateClusterConfigRequest, VpcConfig,
};
use crate::tags::{self, TAGS, TAGS_ALL, Tags};
use async_trait::async_trait;
use awsflow_cloud::value::non_empty;
use awsflow_cloud::{
    Attribute, AttributeKind, Block, CloudError, OperationContext, ResourceAdapter, Result,
    RetryConfig, Schema, State, StateExt, Timeouts, Validator, WaitStatus, wait_until,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const TYPE_NAME: &str = "aws_eks_cluster";

pub const LOG_TYPES: &[&str] = &["api", "audit", "authenticator", "controllerManager", "scheduler"];

const CLUSTER_NAME_PATTERN: &str = r"^[0-9A-Za-z][0-9A-Za-z_-]*$";

pub struct ClusterResource {
    conn: Arc<dyn EksApi>,
    default_tags: Tags,
    retry: RetryConfig,
}

impl ClusterResource {
    pub fn new(conn: Arc<dyn EksApi>, default_tags: Tags) -> Self {
        Self {
            conn,
            default_tags,
            retry: RetryConfig::default(),
        }
    }

    /// Overrides the status polling backoff
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn wait_active(&self, ctx: &OperationContext, name: &str, operation: &str) -> Result<Cluster> {
        let conn = &self.conn;
        let what = format!("EKS Cluster ({}) {}", name, operation);

        wait_until(&what, &self.retry, ctx.remaining(), move || async move {
            let cluster = conn
                .describe_cluster(name)
                .await
                .map_err(|e| e.into_cloud(format!("reading EKS Cluster ({})", name)))?;
            let status = cluster.status.clone().unwrap_or_default();
            Ok(match status.as_str() {
                "ACTIVE" => WaitStatus::Ready(cluster),
                "FAILED" => WaitStatus::Failed(status),
                _ => WaitStatus::Pending(status),
            })
        })
        .await
    }

    async fn wait_deleted(&self, ctx: &OperationContext, name: &str) -> Result<()> {
        let conn = &self.conn;
        let what = format!("EKS Cluster ({}) delete", name);

        wait_until(&what, &self.retry, ctx.remaining(), move || async move {
            match conn.describe_cluster(name).await {
                Err(e) if e.is_not_found() => Ok(WaitStatus::Ready(())),
                Err(e) => Err(e.into_cloud(format!("reading EKS Cluster ({})", name))),
                Ok(cluster) => {
                    let status = cluster.status.unwrap_or_default();
                    if status == "FAILED" {
                        Ok(WaitStatus::Failed(status))
                    } else {
                        Ok(WaitStatus::Pending(status))
                    }
                }
            }
        })
        .await
    }
}

fn name_of(state: &State) -> Result<&str> {
    non_empty(state, "name")
        .or_else(|| non_empty(state, "id"))
        .ok_or_else(|| CloudError::InvalidConfig("name is not set".to_string()))
}

fn opt(block: &State, key: &str) -> Option<String> {
    non_empty(block, key).map(str::to_string)
}

fn string_set(state: Option<&State>, key: &str) -> BTreeSet<String> {
    state
        .map(|s| s.get_string_list(key).into_iter().collect())
        .unwrap_or_default()
}

fn expand_vpc_config(block: &State) -> VpcConfig {
    VpcConfig {
        subnet_ids: block.get_string_list("subnet_ids"),
        security_group_ids: block.get_string_list("security_group_ids"),
        endpoint_private_access: block.get_bool("endpoint_private_access").unwrap_or(false),
        endpoint_public_access: block.get_bool("endpoint_public_access").unwrap_or(true),
        public_access_cidrs: block.get_string_list("public_access_cidrs"),
        cluster_security_group_id: None,
        vpc_id: None,
    }
}

fn expand_create(planned: &State, default_tags: &Tags) -> Result<CreateClusterRequest> {
    let name = name_of(planned)?;
    let role_arn = non_empty(planned, "role_arn")
        .ok_or_else(|| CloudError::InvalidConfig("role_arn is not set".to_string()))?;
    let vpc = planned
        .get_block("vpc_config")
        .ok_or_else(|| CloudError::InvalidConfig("vpc_config block is required".to_string()))?;

    Ok(CreateClusterRequest {
        name: name.to_string(),
        role_arn: role_arn.to_string(),
        version: opt(planned, "version"),
        bootstrap_self_managed_addons: planned.get_bool("bootstrap_self_managed_addons"),
        vpc_config: expand_vpc_config(vpc),
        kubernetes_network_config: planned.get_block("kubernetes_network_config").map(|b| {
            KubernetesNetworkConfig {
                ip_family: opt(b, "ip_family"),
                service_ipv4_cidr: opt(b, "service_ipv4_cidr"),
                service_ipv6_cidr: None,
            }
        }),
        encryption_config: planned.get_block("encryption_config").map(|b| EncryptionConfig {
            resources: b.get_string_list("resources"),
            key_arn: b.get_block("provider").and_then(|p| opt(p, "key_arn")),
        }),
        outpost_config: planned.get_block("outpost_config").map(|b| OutpostConfig {
            outpost_arns: b.get_string_list("outpost_arns"),
            control_plane_instance_type: b
                .get_str("control_plane_instance_type")
                .unwrap_or_default()
                .to_string(),
            placement_group_name: b
                .get_block("control_plane_placement")
                .and_then(|p| opt(p, "group_name")),
        }),
        access_config: planned.get_block("access_config").map(|b| AccessConfig {
            authentication_mode: opt(b, "authentication_mode"),
            bootstrap_cluster_creator_admin_permissions: b
                .get_bool("bootstrap_cluster_creator_admin_permissions"),
        }),
        support_type: planned
            .get_block("upgrade_policy")
            .and_then(|b| opt(b, "support_type")),
        enabled_log_types: planned.get_string_list("enabled_cluster_log_types"),
        tags: tags::merge(default_tags, &planned.get_string_map(TAGS)),
    })
}

/// `UpdateClusterConfig` accepts one kind of change per call
fn config_updates(name: &str, prior: &State, planned: &State) -> Vec<UpdateClusterConfigRequest> {
    let mut updates = Vec::new();
    let request = || UpdateClusterConfigRequest {
        name: name.to_string(),
        ..Default::default()
    };

    let old_logs = string_set(Some(prior), "enabled_cluster_log_types");
    let new_logs = string_set(Some(planned), "enabled_cluster_log_types");
    if old_logs != new_logs {
        let disable = LOG_TYPES
            .iter()
            .filter(|t| !new_logs.contains(**t))
            .map(|t| t.to_string())
            .collect();
        updates.push(UpdateClusterConfigRequest {
            logging: Some(LoggingUpdate {
                enable: new_logs.into_iter().collect(),
                disable,
            }),
            ..request()
        });
    }

    let old_vpc = prior.get_block("vpc_config");
    let new_vpc = planned.get_block("vpc_config");
    if let Some(new_vpc) = new_vpc {
        let endpoint_changed = ["endpoint_private_access", "endpoint_public_access"]
            .iter()
            .any(|key| old_vpc.and_then(|v| v.get_bool(key)) != new_vpc.get_bool(key));
        let cidrs_changed = string_set(old_vpc, "public_access_cidrs")
            != string_set(Some(new_vpc), "public_access_cidrs");

        if endpoint_changed || cidrs_changed {
            let mut vpc = expand_vpc_config(new_vpc);
            vpc.subnet_ids.clear();
            vpc.security_group_ids.clear();
            updates.push(UpdateClusterConfigRequest {
                vpc_config: Some(vpc),
                ..request()
            });
        }
    }

    let block_str = |state: &State, block: &str, key: &str| {
        state.get_block(block).and_then(|b| opt(b, key))
    };

    let new_mode = block_str(planned, "access_config", "authentication_mode");
    if new_mode.is_some() && new_mode != block_str(prior, "access_config", "authentication_mode") {
        updates.push(UpdateClusterConfigRequest {
            authentication_mode: new_mode,
            ..request()
        });
    }

    let new_support = block_str(planned, "upgrade_policy", "support_type");
    if new_support.is_some() && new_support != block_str(prior, "upgrade_policy", "support_type") {
        updates.push(UpdateClusterConfigRequest {
            support_type: new_support,
            ..request()
        });
    }

    updates
}

fn flatten(cluster: &Cluster, state: &mut State, default_tags: &Tags) {
    state.set_value("id", cluster.name.as_str());
    state.set_value("name", cluster.name.as_str());
    state.set_opt_str("arn", cluster.arn.as_deref());
    state.set_opt_str("cluster_id", cluster.id.as_deref());
    state.set_opt_str("created_at", cluster.created_at.as_deref());
    state.set_opt_str("endpoint", cluster.endpoint.as_deref());
    state.set_opt_str("platform_version", cluster.platform_version.as_deref());
    state.set_opt_str("role_arn", cluster.role_arn.as_deref());
    state.set_opt_str("status", cluster.status.as_deref());
    state.set_opt_str("version", cluster.version.as_deref());
    state.set_string_list("enabled_cluster_log_types", &cluster.enabled_log_types);

    // not part of the describe response; the service default is true
    if !state.is_set("bootstrap_self_managed_addons") {
        state.set_value("bootstrap_self_managed_addons", true);
    }

    let mut certificate = State::new();
    certificate.set_opt_str("data", cluster.certificate_authority_data.as_deref());
    state.set_block("certificate_authority", Some(certificate));

    let mut oidc = State::new();
    oidc.set_opt_str("issuer", cluster.oidc_issuer.as_deref());
    let mut identity = State::new();
    identity.set_block("oidc", Some(oidc));
    state.set_block("identity", Some(identity));

    let vpc_config = cluster.vpc_config.as_ref().map(|vpc| {
        let mut block = State::new();
        block.set_string_list("subnet_ids", &vpc.subnet_ids);
        block.set_string_list("security_group_ids", &vpc.security_group_ids);
        block.set_value("endpoint_private_access", vpc.endpoint_private_access);
        block.set_value("endpoint_public_access", vpc.endpoint_public_access);
        block.set_string_list("public_access_cidrs", &vpc.public_access_cidrs);
        block.set_opt_str("cluster_security_group_id", vpc.cluster_security_group_id.as_deref());
        block.set_opt_str("vpc_id", vpc.vpc_id.as_deref());
        block
    });
    state.set_block("vpc_config", vpc_config);

    let network = cluster.kubernetes_network_config.as_ref().map(|net| {
        let mut block = State::new();
        block.set_opt_str("ip_family", net.ip_family.as_deref());
        block.set_opt_str("service_ipv4_cidr", net.service_ipv4_cidr.as_deref());
        block.set_opt_str("service_ipv6_cidr", net.service_ipv6_cidr.as_deref());
        block
    });
    state.set_block("kubernetes_network_config", network);

    let encryption = cluster.encryption_config.as_ref().map(|enc| {
        let mut provider = State::new();
        provider.set_opt_str("key_arn", enc.key_arn.as_deref());
        let mut block = State::new();
        block.set_string_list("resources", &enc.resources);
        block.set_block("provider", Some(provider));
        block
    });
    state.set_block("encryption_config", encryption);

    let outpost = cluster.outpost_config.as_ref().map(|outpost| {
        let mut block = State::new();
        block.set_string_list("outpost_arns", &outpost.outpost_arns);
        block.set_value(
            "control_plane_instance_type",
            outpost.control_plane_instance_type.as_str(),
        );
        let placement = outpost.placement_group_name.as_deref().map(|group| {
            let mut placement = State::new();
            placement.set_value("group_name", group);
            placement
        });
        block.set_block("control_plane_placement", placement);
        block
    });
    state.set_block("outpost_config", outpost);

    let prior_bootstrap = state
        .get_block("access_config")
        .and_then(|b| b.get_bool("bootstrap_cluster_creator_admin_permissions"));
    let access = cluster.access_config.as_ref().map(|access| {
        let mut block = State::new();
        block.set_opt_str("authentication_mode", access.authentication_mode.as_deref());
        match access
            .bootstrap_cluster_creator_admin_permissions
            .or(prior_bootstrap)
        {
            Some(flag) => block.set_value("bootstrap_cluster_creator_admin_permissions", flag),
            None => block.set_opt_str("bootstrap_cluster_creator_admin_permissions", None),
        }
        block
    });
    state.set_block("access_config", access);

    let upgrade_policy = cluster.support_type.as_deref().map(|support| {
        let mut block = State::new();
        block.set_value("support_type", support);
        block
    });
    state.set_block("upgrade_policy", upgrade_policy);

    tags::set_remote_tags(state, &cluster.tags, default_tags);
}

#[async_trait]
impl ResourceAdapter for ClusterResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        let string = || Attribute::optional(AttributeKind::String);

        Schema::new(0)
            .describe("Manages an EKS Cluster.")
            .attribute("id", Attribute::id())
            .attribute(
                "arn",
                Attribute::computed(AttributeKind::String).use_state_for_unknown(),
            )
            .attribute(
                "bootstrap_self_managed_addons",
                Attribute::optional(AttributeKind::Bool)
                    .default_value(true)
                    .requires_replace(),
            )
            .attribute(
                "cluster_id",
                Attribute::computed(AttributeKind::String).use_state_for_unknown(),
            )
            .attribute(
                "created_at",
                Attribute::computed(AttributeKind::String).use_state_for_unknown(),
            )
            .attribute(
                "enabled_cluster_log_types",
                Attribute::optional(AttributeKind::SetOfString)
                    .validator(Validator::Each(Box::new(Validator::one_of(LOG_TYPES)))),
            )
            .attribute(
                "endpoint",
                Attribute::computed(AttributeKind::String).use_state_for_unknown(),
            )
            .attribute(
                "name",
                Attribute::required(AttributeKind::String)
                    .requires_replace()
                    .validator(Validator::All(vec![
                        Validator::StringLenBetween(1, 100),
                        Validator::regex_matches(
                            CLUSTER_NAME_PATTERN,
                            "must start with an alphanumeric character and contain only alphanumerics, hyphens and underscores",
                        ),
                    ])),
            )
            .attribute("platform_version", Attribute::computed(AttributeKind::String))
            .attribute(
                "role_arn",
                Attribute::required(AttributeKind::String)
                    .requires_replace()
                    .validator(Validator::ValidArn),
            )
            .attribute("status", Attribute::computed(AttributeKind::String))
            .attribute(TAGS, tags::tags_attribute())
            .attribute(TAGS_ALL, tags::tags_all_attribute())
            .attribute("version", Attribute::optional_computed(AttributeKind::String))
            .block(
                "access_config",
                Block::new()
                    .attribute(
                        "authentication_mode",
                        Attribute::optional_computed(AttributeKind::String).validator(
                            Validator::one_of(&["CONFIG_MAP", "API", "API_AND_CONFIG_MAP"]),
                        ),
                    )
                    .attribute(
                        "bootstrap_cluster_creator_admin_permissions",
                        Attribute::optional_computed(AttributeKind::Bool).requires_replace(),
                    ),
            )
            .block(
                "certificate_authority",
                Block::new().attribute("data", Attribute::computed(AttributeKind::String)),
            )
            .block(
                "encryption_config",
                Block::new()
                    .conflicts_with("outpost_config")
                    .attribute(
                        "resources",
                        Attribute::required(AttributeKind::SetOfString)
                            .requires_replace()
                            .validator(Validator::Each(Box::new(Validator::one_of(&["secrets"])))),
                    )
                    .block(
                        "provider",
                        Block::new().attribute(
                            "key_arn",
                            Attribute::required(AttributeKind::String).requires_replace(),
                        ),
                    ),
            )
            .block(
                "identity",
                Block::new().block(
                    "oidc",
                    Block::new().attribute("issuer", Attribute::computed(AttributeKind::String)),
                ),
            )
            .block(
                "kubernetes_network_config",
                Block::new()
                    .conflicts_with("outpost_config")
                    .attribute(
                        "ip_family",
                        Attribute::optional_computed(AttributeKind::String)
                            .requires_replace()
                            .validator(Validator::one_of(&["ipv4", "ipv6"])),
                    )
                    .attribute(
                        "service_ipv4_cidr",
                        Attribute::optional_computed(AttributeKind::String).requires_replace(),
                    )
                    .attribute("service_ipv6_cidr", Attribute::computed(AttributeKind::String)),
            )
            .block(
                "outpost_config",
                Block::new()
                    .attribute(
                        "control_plane_instance_type",
                        Attribute::optional_computed(AttributeKind::String)
                            .use_state_for_unknown()
                            .requires_replace(),
                    )
                    .attribute(
                        "outpost_arns",
                        Attribute::required(AttributeKind::SetOfString).requires_replace(),
                    )
                    .block(
                        "control_plane_placement",
                        Block::new().attribute("group_name", string().requires_replace()),
                    ),
            )
            .block(
                "upgrade_policy",
                Block::new().attribute(
                    "support_type",
                    Attribute::optional_computed(AttributeKind::String)
                        .validator(Validator::one_of(&["STANDARD", "EXTENDED"])),
                ),
            )
            .block(
                "vpc_config",
                Block::new()
                    .attribute(
                        "subnet_ids",
                        Attribute::required(AttributeKind::SetOfString)
                            .requires_replace()
                            .validator(Validator::ListSizeAtLeast(1)),
                    )
                    .attribute(
                        "security_group_ids",
                        Attribute::optional(AttributeKind::SetOfString).requires_replace(),
                    )
                    .attribute(
                        "endpoint_private_access",
                        Attribute::optional(AttributeKind::Bool).default_value(false),
                    )
                    .attribute(
                        "endpoint_public_access",
                        Attribute::optional(AttributeKind::Bool).default_value(true),
                    )
                    .attribute(
                        "public_access_cidrs",
                        Attribute::optional_computed(AttributeKind::SetOfString),
                    )
                    .attribute(
                        "cluster_security_group_id",
                        Attribute::computed(AttributeKind::String),
                    )
                    .attribute("vpc_id", Attribute::computed(AttributeKind::String)),
            )
            .with_timeouts(Timeouts {
                create: Some(Duration::from_secs(30 * 60)),
                read: None,
                update: Some(Duration::from_secs(60 * 60)),
                delete: Some(Duration::from_secs(15 * 60)),
            })
    }

    async fn create(&self, ctx: &OperationContext, planned: &State) -> Result<State> {
        let request = expand_create(planned, &self.default_tags)?;
        let name = request.name.clone();

        debug!("Creating EKS Cluster: {}", name);
        let created = self
            .conn
            .create_cluster(request)
            .await
            .map_err(|e| e.into_cloud(format!("creating EKS Cluster ({})", name)))?;

        self.wait_active(ctx, &name, "create").await?;
        info!("EKS Cluster created: {}", name);

        let mut state = planned.clone();
        state.set_value("id", name.as_str());
        state.set_opt_str("arn", created.arn.as_deref());
        Ok(state)
    }

    async fn read(&self, _ctx: &OperationContext, state: &State) -> Result<State> {
        let name = name_of(state)?;

        let cluster = self
            .conn
            .describe_cluster(name)
            .await
            .map_err(|e| e.into_cloud(format!("reading EKS Cluster ({})", name)))?;

        let mut refreshed = state.clone();
        flatten(&cluster, &mut refreshed, &self.default_tags);
        Ok(refreshed)
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        prior: &State,
        planned: &State,
    ) -> Result<State> {
        let name = name_of(prior)?;

        if let Some(version) = non_empty(planned, "version") {
            if prior.get_str("version") != Some(version) {
                debug!("Updating EKS Cluster ({}) version to {}", name, version);
                self.conn
                    .update_cluster_version(name, version)
                    .await
                    .map_err(|e| e.into_cloud(format!("updating EKS Cluster ({}) version", name)))?;
                self.wait_active(ctx, name, "version update").await?;
            }
        }

        for request in config_updates(name, prior, planned) {
            debug!("Updating EKS Cluster ({}) config: {:?}", name, request);
            self.conn
                .update_cluster_config(request)
                .await
                .map_err(|e| e.into_cloud(format!("updating EKS Cluster ({}) config", name)))?;
            self.wait_active(ctx, name, "config update").await?;
        }

        let old_tags = prior.get_string_map(TAGS_ALL);
        let new_tags = tags::merge(&self.default_tags, &planned.get_string_map(TAGS));
        let (upsert, removed) = tags::diff(&old_tags, &new_tags);
        if !upsert.is_empty() || !removed.is_empty() {
            let arn = non_empty(prior, "arn").ok_or_else(|| {
                CloudError::StateError(format!("EKS Cluster ({}) has no arn in state", name))
            })?;
            let context = format!("updating EKS Cluster ({}) tags", name);
            if !removed.is_empty() {
                self.conn
                    .untag_resource(arn, removed)
                    .await
                    .map_err(|e| e.into_cloud(context.clone()))?;
            }
            if !upsert.is_empty() {
                self.conn
                    .tag_resource(arn, upsert)
                    .await
                    .map_err(|e| e.into_cloud(context.clone()))?;
            }
        }

        let mut state = planned.clone();
        state.set_value("id", name);
        Ok(state)
    }

    async fn delete(&self, ctx: &OperationContext, state: &State) -> Result<()> {
        let name = name_of(state)?;

        info!("Deleting EKS Cluster: {}", name);
        self.conn
            .delete_cluster(name)
            .await
            .map_err(|e| e.into_cloud(format!("deleting EKS Cluster ({})", name)))?;

        self.wait_deleted(ctx, name).await
    }

    fn import_attribute(&self) -> &str {
        "name"
    }

    fn modify_plan(&self, planned: &mut State) {
        tags::plan_tags_all(planned, &self.default_tags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AwsError;
    use crate::provider::FrameworkProvider;
    use awsflow_cloud::{ActionType, ProviderServer, ReadOutcome, state, validate_config};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory EKS: each describe moves a transitional cluster one step on
    #[derive(Default)]
    struct FakeEks {
        clusters: Mutex<HashMap<String, Cluster>>,
        calls: Mutex<Vec<String>>,
        fail_create: bool,
    }

    impl FakeEks {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn set_status(&self, name: &str, status: &str) {
            if let Some(cluster) = self.clusters.lock().unwrap().get_mut(name) {
                cluster.status = Some(status.to_string());
            }
        }
    }

    fn not_found(name: &str) -> AwsError {
        AwsError::NotFound(format!(
            "ResourceNotFoundException: No cluster found for name: {}",
            name
        ))
    }

    #[async_trait]
    impl EksApi for FakeEks {
        async fn create_cluster(
            &self,
            request: CreateClusterRequest,
        ) -> crate::error::Result<Cluster> {
            self.record(format!("create_cluster:{}", request.name));

            let mut vpc = request.vpc_config.clone();
            vpc.cluster_security_group_id = Some("sg-0cluster".to_string());
            vpc.vpc_id = Some("vpc-0demo".to_string());
            if vpc.public_access_cidrs.is_empty() {
                vpc.public_access_cidrs = vec!["0.0.0.0/0".to_string()];
            }

            let authentication_mode = request
                .access_config
                .as_ref()
                .and_then(|a| a.authentication_mode.clone())
                .unwrap_or_else(|| "CONFIG_MAP".to_string());

            let cluster = Cluster {
                name: request.name.clone(),
                arn: Some(format!(
                    "arn:aws:eks:us-west-2:123456789012:cluster/{}",
                    request.name
                )),
                id: None,
                created_at: Some("2026-10-19T09:00:00Z".to_string()),
                version: Some(request.version.clone().unwrap_or_else(|| "1.31".to_string())),
                endpoint: Some("https://0123456789ABCDEF.gr7.us-west-2.eks.amazonaws.com".to_string()),
                role_arn: Some(request.role_arn.clone()),
                platform_version: Some("eks.12".to_string()),
                status: Some(if self.fail_create { "FAILED" } else { "CREATING" }.to_string()),
                certificate_authority_data: Some("LS0tLS1CRUdJTg==".to_string()),
                oidc_issuer: Some(
                    "https://oidc.eks.us-west-2.amazonaws.com/id/0123456789ABCDEF".to_string(),
                ),
                enabled_log_types: request.enabled_log_types.clone(),
                tags: request.tags.clone(),
                vpc_config: Some(vpc),
                kubernetes_network_config: Some(KubernetesNetworkConfig {
                    ip_family: Some("ipv4".to_string()),
                    service_ipv4_cidr: Some("172.20.0.0/16".to_string()),
                    service_ipv6_cidr: None,
                }),
                encryption_config: request.encryption_config.clone(),
                outpost_config: None,
                access_config: Some(AccessConfig {
                    authentication_mode: Some(authentication_mode),
                    bootstrap_cluster_creator_admin_permissions: Some(true),
                }),
                support_type: Some(
                    request
                        .support_type
                        .clone()
                        .unwrap_or_else(|| "EXTENDED".to_string()),
                ),
            };

            self.clusters
                .lock()
                .unwrap()
                .insert(request.name.clone(), cluster.clone());
            Ok(cluster)
        }

        async fn describe_cluster(&self, name: &str) -> crate::error::Result<Cluster> {
            self.record(format!("describe_cluster:{}", name));

            let mut clusters = self.clusters.lock().unwrap();
            let snapshot = clusters.get(name).cloned().ok_or_else(|| not_found(name))?;
            match snapshot.status.as_deref() {
                Some("CREATING" | "UPDATING") => {
                    if let Some(cluster) = clusters.get_mut(name) {
                        cluster.status = Some("ACTIVE".to_string());
                    }
                }
                Some("DELETING") => {
                    clusters.remove(name);
                }
                _ => {}
            }
            Ok(snapshot)
        }

        async fn update_cluster_version(
            &self,
            name: &str,
            version: &str,
        ) -> crate::error::Result<String> {
            self.record(format!("update_cluster_version:{}", version));

            let mut clusters = self.clusters.lock().unwrap();
            let cluster = clusters.get_mut(name).ok_or_else(|| not_found(name))?;
            cluster.version = Some(version.to_string());
            cluster.status = Some("UPDATING".to_string());
            Ok("update-version".to_string())
        }

        async fn update_cluster_config(
            &self,
            request: UpdateClusterConfigRequest,
        ) -> crate::error::Result<String> {
            let mut clusters = self.clusters.lock().unwrap();
            let cluster = clusters
                .get_mut(&request.name)
                .ok_or_else(|| not_found(&request.name))?;

            let kind = if let Some(logging) = &request.logging {
                cluster.enabled_log_types = logging.enable.clone();
                "logging"
            } else if let Some(vpc) = &request.vpc_config {
                if let Some(current) = cluster.vpc_config.as_mut() {
                    current.endpoint_private_access = vpc.endpoint_private_access;
                    current.endpoint_public_access = vpc.endpoint_public_access;
                }
                "vpc"
            } else if let Some(mode) = &request.authentication_mode {
                if let Some(access) = cluster.access_config.as_mut() {
                    access.authentication_mode = Some(mode.clone());
                }
                "access"
            } else {
                cluster.support_type = request.support_type.clone();
                "upgrade_policy"
            };
            cluster.status = Some("UPDATING".to_string());
            drop(clusters);

            self.record(format!("update_cluster_config:{}", kind));
            Ok(format!("update-{}", kind))
        }

        async fn tag_resource(&self, arn: &str, tags: Tags) -> crate::error::Result<()> {
            let keys: Vec<&str> = tags.keys().map(String::as_str).collect();
            self.record(format!("tag_resource:{}", keys.join(",")));

            let mut clusters = self.clusters.lock().unwrap();
            if let Some(cluster) = clusters
                .values_mut()
                .find(|c| c.arn.as_deref() == Some(arn))
            {
                cluster.tags.extend(tags);
            }
            Ok(())
        }

        async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> crate::error::Result<()> {
            self.record(format!("untag_resource:{}", keys.join(",")));

            let mut clusters = self.clusters.lock().unwrap();
            if let Some(cluster) = clusters
                .values_mut()
                .find(|c| c.arn.as_deref() == Some(arn))
            {
                cluster.tags.retain(|k, _| !keys.contains(k));
            }
            Ok(())
        }

        async fn delete_cluster(&self, name: &str) -> crate::error::Result<()> {
            self.record(format!("delete_cluster:{}", name));

            let mut clusters = self.clusters.lock().unwrap();
            let cluster = clusters.get_mut(name).ok_or_else(|| not_found(name))?;
            cluster.status = Some("DELETING".to_string());
            Ok(())
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    fn default_tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn server_for(fake: &Arc<FakeEks>, defaults: &[(&str, &str)]) -> ProviderServer {
        let provider =
            FrameworkProvider::with_api(fake.clone(), default_tags(defaults)).with_retry(fast());
        ProviderServer::new(Arc::new(provider)).unwrap()
    }

    fn config() -> State {
        state! {
            "name" => "demo",
            "role_arn" => "arn:aws:iam::123456789012:role/eks-cluster",
            "vpc_config" => { "subnet_ids": ["subnet-a", "subnet-b"] },
            "tags" => { "Name": "demo" },
        }
    }

    const ADDRESS: &str = "aws_eks_cluster.demo";

    async fn create(server: &ProviderServer, config: &State) -> State {
        let action = server
            .plan_resource(TYPE_NAME, ADDRESS, None, Some(config))
            .unwrap();
        assert_eq!(action.action_type, ActionType::Create);
        server
            .create_resource(TYPE_NAME, action.planned_state.as_ref().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_waits_for_active_and_reads_back() {
        let fake = Arc::new(FakeEks::default());
        let server = server_for(&fake, &[("Team", "platform")]);

        let state = create(&server, &config()).await;

        assert_eq!(
            fake.calls(),
            vec![
                "create_cluster:demo",
                "describe_cluster:demo",
                "describe_cluster:demo",
                "describe_cluster:demo",
            ]
        );
        assert_eq!(state.get_str("id"), Some("demo"));
        assert_eq!(state.get_str("status"), Some("ACTIVE"));
        assert_eq!(
            state.get_str("arn"),
            Some("arn:aws:eks:us-west-2:123456789012:cluster/demo")
        );
        assert_eq!(state.get_str("version"), Some("1.31"));
        assert_eq!(state.get_bool("bootstrap_self_managed_addons"), Some(true));
        assert_eq!(
            state.get_block("certificate_authority").unwrap().get_str("data"),
            Some("LS0tLS1CRUdJTg==")
        );
        assert_eq!(
            state
                .get_block("identity")
                .and_then(|i| i.get_block("oidc"))
                .and_then(|o| o.get_str("issuer")),
            Some("https://oidc.eks.us-west-2.amazonaws.com/id/0123456789ABCDEF")
        );

        let vpc = state.get_block("vpc_config").unwrap();
        assert_eq!(vpc.get_str("vpc_id"), Some("vpc-0demo"));
        assert_eq!(vpc.get_bool("endpoint_public_access"), Some(true));
        assert_eq!(vpc.get_bool("endpoint_private_access"), Some(false));

        assert_eq!(state.get_string_map(TAGS), default_tags(&[("Name", "demo")]));
        assert_eq!(
            state.get_string_map(TAGS_ALL),
            default_tags(&[("Name", "demo"), ("Team", "platform")])
        );
    }

    #[tokio::test]
    async fn test_create_failed_status_is_error() {
        let fake = Arc::new(FakeEks {
            fail_create: true,
            ..Default::default()
        });
        let server = server_for(&fake, &[]);

        let planned = server
            .plan_resource(TYPE_NAME, ADDRESS, None, Some(&config()))
            .unwrap()
            .planned_state
            .unwrap();
        let err = server.create_resource(TYPE_NAME, &planned).await.unwrap_err();

        assert!(err.to_string().contains("unexpected state 'FAILED'"));
    }

    #[tokio::test]
    async fn test_plan_after_create_is_noop_until_default_tags_change() {
        let fake = Arc::new(FakeEks::default());
        let server = server_for(&fake, &[("Team", "platform")]);
        let prior = create(&server, &config()).await;

        let action = server
            .plan_resource(TYPE_NAME, ADDRESS, Some(&prior), Some(&config()))
            .unwrap();
        assert_eq!(action.action_type, ActionType::NoOp, "{:?}", action.changed);

        let server = server_for(&fake, &[("Team", "platform"), ("Owner", "infra")]);
        let action = server
            .plan_resource(TYPE_NAME, ADDRESS, Some(&prior), Some(&config()))
            .unwrap();
        assert_eq!(action.action_type, ActionType::Update);
        assert_eq!(action.changed, vec!["tags_all".to_string()]);
    }

    #[tokio::test]
    async fn test_update_version_logging_and_tags() {
        let fake = Arc::new(FakeEks::default());
        let server = server_for(&fake, &[("Team", "platform")]);
        let prior = create(&server, &config()).await;

        let mut config = config();
        config.set_value("version", "1.32");
        config.set_string_list(
            "enabled_cluster_log_types",
            &["api".to_string(), "audit".to_string()],
        );
        config.set_string_map(
            TAGS,
            &default_tags(&[("Name", "demo"), ("Env", "prod")]),
        );

        let action = server
            .plan_resource(TYPE_NAME, ADDRESS, Some(&prior), Some(&config))
            .unwrap();
        assert_eq!(action.action_type, ActionType::Update);

        let state = server
            .update_resource(TYPE_NAME, &prior, action.planned_state.as_ref().unwrap())
            .await
            .unwrap();

        let calls = fake.calls();
        assert!(calls.contains(&"update_cluster_version:1.32".to_string()));
        assert!(calls.contains(&"update_cluster_config:logging".to_string()));
        assert!(calls.contains(&"tag_resource:Env".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("untag_resource")));

        assert_eq!(state.get_str("version"), Some("1.32"));
        assert_eq!(
            state.get_string_list("enabled_cluster_log_types"),
            vec!["api", "audit"]
        );
        assert_eq!(
            state.get_string_map(TAGS_ALL),
            default_tags(&[("Env", "prod"), ("Name", "demo"), ("Team", "platform")])
        );
    }

    #[tokio::test]
    async fn test_read_missing_cluster_removes_from_state() {
        let fake = Arc::new(FakeEks::default());
        let server = server_for(&fake, &[]);
        let state = create(&server, &config()).await;

        fake.clusters.lock().unwrap().clear();

        let outcome = server.read_resource(TYPE_NAME, &state).await.unwrap();
        assert_eq!(outcome, ReadOutcome::Removed);
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let fake = Arc::new(FakeEks::default());
        let server = server_for(&fake, &[]);
        let state = create(&server, &config()).await;

        server.delete_resource(TYPE_NAME, &state).await.unwrap();
        assert!(fake.clusters.lock().unwrap().is_empty());
        assert!(fake.calls().contains(&"delete_cluster:demo".to_string()));

        // already gone
        server.delete_resource(TYPE_NAME, &state).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_failed_status_is_error() {
        let fake = Arc::new(FakeEks::default());
        let server = server_for(&fake, &[]);
        create(&server, &config()).await;

        let resource = ClusterResource::new(fake.clone(), Tags::new()).with_retry(fast());
        fake.set_status("demo", "FAILED");
        let err = resource
            .wait_deleted(&OperationContext::default(), "demo")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unexpected state 'FAILED'"));
    }

    #[tokio::test]
    async fn test_import_by_name() {
        let fake = Arc::new(FakeEks::default());
        let server = server_for(&fake, &[]);
        create(&server, &config()).await;

        let state = server.import_resource(TYPE_NAME, "demo").await.unwrap();
        assert_eq!(state.get_str("name"), Some("demo"));
        assert_eq!(state.get_str("role_arn"), Some("arn:aws:iam::123456789012:role/eks-cluster"));
        assert_eq!(state.get_bool("bootstrap_self_managed_addons"), Some(true));

        let err = server.import_resource(TYPE_NAME, "other").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_replacement_fields() {
        let resource = ClusterResource::new(Arc::new(FakeEks::default()), Tags::new());
        let schema = resource.schema();
        let prior = state! {
            "id" => "demo",
            "name" => "demo",
            "role_arn" => "arn:aws:iam::123456789012:role/eks-cluster",
            "bootstrap_self_managed_addons" => true,
            "vpc_config" => {
                "subnet_ids": ["subnet-a", "subnet-b"],
                "endpoint_private_access": false,
                "endpoint_public_access": true,
            },
            "tags" => { "Name": "demo" },
        };

        let mut renamed = config();
        renamed.set_value("name", "demo-2");
        let action = awsflow_cloud::plan_resource(&schema, ADDRESS, TYPE_NAME, Some(&prior), Some(&renamed));
        assert_eq!(action.action_type, ActionType::Replace);
        assert_eq!(action.requires_replace, vec!["name"]);

        // subnet order is irrelevant, membership is not
        let mut reordered = config();
        reordered.insert(
            "vpc_config".to_string(),
            serde_json::json!({ "subnet_ids": ["subnet-b", "subnet-a"] }),
        );
        let action = awsflow_cloud::plan_resource(&schema, ADDRESS, TYPE_NAME, Some(&prior), Some(&reordered));
        assert_eq!(action.action_type, ActionType::NoOp);

        let mut moved = config();
        moved.insert(
            "vpc_config".to_string(),
            serde_json::json!({ "subnet_ids": ["subnet-c"] }),
        );
        let action = awsflow_cloud::plan_resource(&schema, ADDRESS, TYPE_NAME, Some(&prior), Some(&moved));
        assert_eq!(action.requires_replace, vec!["vpc_config.subnet_ids"]);
    }

    #[test]
    fn test_outpost_instance_type_keeps_prior_value() {
        let resource = ClusterResource::new(Arc::new(FakeEks::default()), Tags::new());
        let schema = resource.schema();
        let outpost = "arn:aws:outposts:us-west-2:123456789012:outpost/op-1";
        let prior = state! {
            "id" => "demo",
            "name" => "demo",
            "role_arn" => "arn:aws:iam::123456789012:role/eks-cluster",
            "bootstrap_self_managed_addons" => true,
            "vpc_config" => {
                "subnet_ids": ["subnet-a", "subnet-b"],
                "endpoint_private_access": false,
                "endpoint_public_access": true,
            },
            "outpost_config" => {
                "control_plane_instance_type": "m5.large",
                "outpost_arns": [outpost],
            },
            "tags" => { "Name": "demo" },
        };

        let mut unset = config();
        unset.insert(
            "outpost_config".to_string(),
            serde_json::json!({ "outpost_arns": [outpost] }),
        );
        let action = awsflow_cloud::plan_resource(&schema, ADDRESS, TYPE_NAME, Some(&prior), Some(&unset));
        assert_eq!(action.action_type, ActionType::NoOp);
        let planned = action.planned_state.unwrap();
        assert_eq!(
            planned["outpost_config"]["control_plane_instance_type"],
            "m5.large"
        );

        let mut resized = config();
        resized.insert(
            "outpost_config".to_string(),
            serde_json::json!({ "control_plane_instance_type": "m5.xlarge", "outpost_arns": [outpost] }),
        );
        let action = awsflow_cloud::plan_resource(&schema, ADDRESS, TYPE_NAME, Some(&prior), Some(&resized));
        assert_eq!(action.action_type, ActionType::Replace);
        assert_eq!(action.requires_replace, vec!["outpost_config.control_plane_instance_type"]);
    }

    #[test]
    fn test_config_updates_one_change_per_call() {
        let prior = state! {
            "enabled_cluster_log_types" => ["api"],
            "vpc_config" => { "endpoint_private_access": false, "endpoint_public_access": true },
            "access_config" => { "authentication_mode": "CONFIG_MAP" },
            "upgrade_policy" => { "support_type": "EXTENDED" },
        };
        let planned = state! {
            "enabled_cluster_log_types" => ["api", "scheduler"],
            "vpc_config" => {
                "subnet_ids": ["subnet-a"],
                "endpoint_private_access": true,
                "endpoint_public_access": true,
            },
            "access_config" => { "authentication_mode": "API_AND_CONFIG_MAP" },
            "upgrade_policy" => { "support_type": "EXTENDED" },
        };

        let updates = config_updates("demo", &prior, &planned);
        assert_eq!(updates.len(), 3);

        let logging = updates[0].logging.as_ref().unwrap();
        assert_eq!(logging.enable, vec!["api", "scheduler"]);
        assert_eq!(logging.disable, vec!["audit", "authenticator", "controllerManager"]);
        assert!(updates[0].vpc_config.is_none());

        let vpc = updates[1].vpc_config.as_ref().unwrap();
        assert!(vpc.endpoint_private_access);
        assert!(vpc.subnet_ids.is_empty());

        assert_eq!(updates[2].authentication_mode.as_deref(), Some("API_AND_CONFIG_MAP"));
        assert!(updates.iter().all(|u| u.support_type.is_none()));
    }

    #[test]
    fn test_schema_validation() {
        let schema = ClusterResource::new(Arc::new(FakeEks::default()), Tags::new()).schema();
        assert!(validate_config(&schema, &config()).is_empty());

        let mut bad_name = config();
        bad_name.set_value("name", "-demo");
        assert!(validate_config(&schema, &bad_name).has_errors());

        let mut bad_logs = config();
        bad_logs.set_string_list("enabled_cluster_log_types", &["kubelet".to_string()]);
        assert!(validate_config(&schema, &bad_logs).has_errors());

        let mut bad_role = config();
        bad_role.set_value("role_arn", "eks-cluster");
        assert!(validate_config(&schema, &bad_role).has_errors());

        let mut conflicting = config();
        conflicting.insert(
            "encryption_config".to_string(),
            serde_json::json!({ "resources": ["secrets"], "provider": { "key_arn": "arn:aws:kms:us-west-2:123456789012:key/1" } }),
        );
        assert!(validate_config(&schema, &conflicting).is_empty());
        conflicting.insert(
            "outpost_config".to_string(),
            serde_json::json!({ "control_plane_instance_type": "m5.large", "outpost_arns": ["arn:aws:outposts:us-west-2:123456789012:outpost/op-1"] }),
        );
        let diags = validate_config(&schema, &conflicting);
        assert!(diags.has_errors());
        assert!(diags.to_string().contains("cannot be specified"));

        let mut empty_subnets = config();
        empty_subnets.insert("vpc_config".to_string(), serde_json::json!({ "subnet_ids": [] }));
        assert!(validate_config(&schema, &empty_subnets).has_errors());
    }
}
