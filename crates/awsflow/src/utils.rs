use anyhow::Context;
use awsflow_aws::{AwsConfig, provider_server_factory};
use awsflow_cloud::{
    Action, ActionType, Diagnostics, GlobalState, Plan, ProviderServer, ReadOutcome, Severity,
    State, StateManager,
};
use awsflow_config::{ConfigError, Manifest, ProviderSettings, find_manifest_file};
use colored::Colorize;
use serde_json::Value;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// 読み込んだマニフェストと、その state の置き場所
pub struct Workspace {
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
    pub state: StateManager,
}

/// マニフェストを読み込む (`-f` 指定がなければ探索する)
pub fn load_workspace(file: Option<&Path>) -> anyhow::Result<Workspace> {
    let manifest_path = match file {
        Some(path) => path.to_path_buf(),
        None => find_manifest_file()?,
    };
    let manifest = Manifest::load(&manifest_path)?;
    tracing::info!("マニフェストを読み込みました: {}", manifest_path.display());

    let root = project_root(&manifest_path);
    Ok(Workspace {
        state: StateManager::new(&root),
        manifest_path,
        manifest,
    })
}

/// state を置くディレクトリ
///
/// `.awsflow/` 内のマニフェストはその親をプロジェクトルートとする。
pub fn project_root(manifest_path: &Path) -> PathBuf {
    let parent = match manifest_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if parent.file_name().is_some_and(|name| name == ".awsflow") {
        if let Some(grandparent) = parent.parent() {
            return grandparent.to_path_buf();
        }
    }
    parent
}

/// マニフェストがあればその provider 設定、なければ既定値
pub fn provider_settings(file: Option<&Path>) -> anyhow::Result<ProviderSettings> {
    let path = match file {
        Some(path) => path.to_path_buf(),
        None => match find_manifest_file() {
            Ok(path) => path,
            Err(ConfigError::ManifestNotFound) => return Ok(ProviderSettings::default()),
            Err(e) => return Err(e.into()),
        },
    };
    Ok(Manifest::load(&path)?.provider)
}

pub fn aws_config(settings: &ProviderSettings) -> AwsConfig {
    AwsConfig {
        region: settings.region.clone(),
        profile: settings.profile.clone(),
        endpoint_url: settings.endpoint_url.clone(),
        max_attempts: settings.max_attempts,
        default_tags: settings.default_tags.clone(),
    }
}

pub async fn build_server(settings: &ProviderSettings) -> anyhow::Result<ProviderServer> {
    provider_server_factory(&aws_config(settings))
        .await
        .context("AWS プロバイダの初期化に失敗しました")
}

/// 全ブロックの設定をスキーマで検証する
///
/// 未知の型もブロック単位の診断として返す。
pub fn validate_blocks(server: &ProviderServer, manifest: &Manifest) -> Vec<(String, Diagnostics)> {
    let resources = manifest.resources.iter().map(|block| {
        let result = server.validate_resource_config(&block.type_name, &block.config);
        (block.address(), result)
    });
    let data = manifest.data.iter().map(|block| {
        let result = server.validate_data_source_config(&block.type_name, &block.config);
        (data_address(&block.address()), result)
    });

    resources
        .chain(data)
        .map(|(address, result)| {
            let diagnostics = result.unwrap_or_else(|e| {
                let mut diagnostics = Diagnostics::new();
                diagnostics.error(None, e.to_string(), "");
                diagnostics
            });
            (address, diagnostics)
        })
        .collect()
}

/// 診断を表示し、エラーがあれば失敗を返す
pub fn check_blocks(server: &ProviderServer, manifest: &Manifest) -> anyhow::Result<()> {
    let mut failed = 0;
    for (address, diagnostics) in validate_blocks(server, manifest) {
        for diagnostic in diagnostics.iter() {
            let line = format!("{}: {}", address, diagnostic);
            if diagnostic.severity == Severity::Error {
                eprintln!("  {} {}", "✗".red(), line);
            } else {
                eprintln!("  {} {}", "⚠".yellow(), line);
            }
        }
        if diagnostics.has_errors() {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{}個のブロックに設定エラーがあります", failed);
    }
    Ok(())
}

pub fn data_address(address: &str) -> String {
    format!("data.{}", address)
}

/// state にあってマニフェストから消えたリソースのアドレス
pub fn orphaned_addresses<'a>(manifest: &Manifest, state: &'a GlobalState) -> Vec<&'a str> {
    state
        .resources
        .keys()
        .filter(|address| manifest.resource(address).is_none())
        .map(String::as_str)
        .collect()
}

/// refresh で各リソースに起きたこと
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refreshed {
    Updated,
    Removed,
}

/// state の全リソースをリモートから読み直す
///
/// リモートから消えたリソースは state から外す。
pub async fn refresh_state(
    server: &ProviderServer,
    state: &mut GlobalState,
) -> anyhow::Result<Vec<(String, Refreshed)>> {
    let records: Vec<(String, String, State)> = state
        .resources
        .iter()
        .map(|(address, r)| (address.clone(), r.resource_type.clone(), r.attributes.clone()))
        .collect();

    let mut outcomes = Vec::with_capacity(records.len());
    for (address, resource_type, attributes) in records {
        let outcome = server
            .read_resource(&resource_type, &attributes)
            .await
            .with_context(|| format!("{} の読み取りに失敗しました", address))?;
        match outcome {
            ReadOutcome::Found(current) => {
                state.record(&address, &resource_type, current);
                outcomes.push((address, Refreshed::Updated));
            }
            ReadOutcome::Removed => {
                state.remove_resource(&address);
                outcomes.push((address, Refreshed::Removed));
            }
        }
    }
    Ok(outcomes)
}

/// ブロックごとの計画を組み立てる
///
/// データソースの読み取り、マニフェストのリソース、削除されたブロックの順。
pub fn build_plan(
    server: &ProviderServer,
    manifest: &Manifest,
    state: &GlobalState,
) -> anyhow::Result<Plan> {
    let mut actions = Vec::new();

    for block in &manifest.data {
        let address = data_address(&block.address());
        actions.push(server.plan_data_source(&block.type_name, &address, &block.config)?);
    }

    for block in &manifest.resources {
        let address = block.address();
        let prior = state.get_resource(&address).map(|r| &r.attributes);
        actions.push(server.plan_resource(&block.type_name, &address, prior, Some(&block.config))?);
    }

    for address in orphaned_addresses(manifest, state) {
        if let Some(record) = state.get_resource(address) {
            actions.push(server.plan_resource(
                &record.resource_type,
                address,
                Some(&record.attributes),
                None,
            )?);
        }
    }

    Ok(Plan::new(actions))
}

pub fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        print_action(action);
    }
    println!();
    if plan.has_changes {
        println!("{} {}", "Plan:".bold(), plan.summary());
    } else {
        println!("{}", "変更はありません。リモートは設定と一致しています。".green());
    }
}

pub fn print_action(action: &Action) {
    let symbol = match action.action_type {
        ActionType::Create => "+".green(),
        ActionType::Update => "~".yellow(),
        ActionType::Replace => "-/+".magenta(),
        ActionType::Delete => "-".red(),
        ActionType::Read => "<=".cyan(),
        ActionType::NoOp => return,
    };
    println!("  {} {}", symbol.bold(), action.description());

    match action.action_type {
        ActionType::Create => {
            if let Some(planned) = &action.planned_state {
                for (key, value) in planned.iter().filter(|(_, v)| !v.is_null()) {
                    println!("      {} = {}", key, render_value(value));
                }
            }
        }
        ActionType::Update | ActionType::Replace => {
            for path in &action.changed {
                let before = action.prior_state.as_ref().and_then(|s| lookup(s, path));
                let after = action.planned_state.as_ref().and_then(|s| lookup(s, path));
                let marker = if action.requires_replace.contains(path) {
                    " # forces replacement".red().to_string()
                } else {
                    String::new()
                };
                println!(
                    "      {}: {} → {}{}",
                    path,
                    before.map(render_value).unwrap_or_else(|| "(unset)".to_string()),
                    after
                        .map(render_value)
                        .unwrap_or_else(|| "(known after apply)".to_string()),
                    marker
                );
            }
        }
        _ => {}
    }
}

/// `vpc_config.subnet_ids` のようなパスで値を引く
pub fn lookup<'a>(state: &'a State, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = state.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

/// `yes` が入力されたときだけ続行する
pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} ({}): ", prompt, "yes で続行".bold());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest() -> Manifest {
        Manifest::from_yaml(
            r#"
provider:
  region: us-west-2
  max_attempts: 5
  default_tags:
    team: platform
resources:
  - type: aws_eks_cluster
    name: main
    config:
      name: main
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_project_root() {
        assert_eq!(
            project_root(Path::new("/work/app/awsflow.yaml")),
            PathBuf::from("/work/app")
        );
        assert_eq!(
            project_root(Path::new("/work/app/.awsflow/awsflow.yaml")),
            PathBuf::from("/work/app")
        );
        assert_eq!(project_root(Path::new("awsflow.yaml")), PathBuf::from("."));
    }

    /// AWSFLOW_CONFIG_PATH のマニフェストから provider 設定を読むことを確認
    #[test]
    fn test_provider_settings_from_env_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infra.yaml");
        std::fs::write(&path, "provider:\n  region: eu-west-1\n  profile: ops\n").unwrap();

        let settings = temp_env::with_var(awsflow_config::CONFIG_PATH_ENV, Some(&path), || {
            provider_settings(None)
        })
        .unwrap();
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.profile.as_deref(), Some("ops"));
    }

    #[test]
    fn test_aws_config_from_settings() {
        let config = aws_config(&manifest().provider);
        assert_eq!(config.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.max_attempts, Some(5));
        assert_eq!(config.default_tags.get("team").map(String::as_str), Some("platform"));
        assert!(config.profile.is_none());
    }

    #[test]
    fn test_orphaned_addresses() {
        let mut state = GlobalState::new();
        let mut attributes = State::new();
        attributes.insert("id".to_string(), json!("main"));
        state.record("aws_eks_cluster.main", "aws_eks_cluster", attributes.clone());
        state.record("aws_eks_cluster.old", "aws_eks_cluster", attributes);

        assert_eq!(orphaned_addresses(&manifest(), &state), vec!["aws_eks_cluster.old"]);
    }

    #[test]
    fn test_lookup_nested_path() {
        let state: State = json!({
            "name": "main",
            "vpc_config": { "subnet_ids": ["subnet-1"], "endpoint_public_access": null }
        })
        .as_object()
        .unwrap()
        .clone();

        assert_eq!(lookup(&state, "name"), Some(&json!("main")));
        assert_eq!(lookup(&state, "vpc_config.subnet_ids"), Some(&json!(["subnet-1"])));
        assert_eq!(lookup(&state, "vpc_config.endpoint_public_access"), None);
        assert_eq!(lookup(&state, "name.inner"), None);
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("1.30")), "\"1.30\"");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!(["a"])), "[\"a\"]");
    }
}
