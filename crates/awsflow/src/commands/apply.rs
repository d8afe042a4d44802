use crate::utils;
use awsflow_cloud::{
    Action, ActionType, ApplyResult, GlobalState, Plan, ProviderServer, State, StateManager,
};
use colored::Colorize;
use std::path::Path;
use std::time::Instant;

pub async fn handle(
    file: Option<&Path>,
    auto_approve: bool,
    skip_refresh: bool,
) -> anyhow::Result<()> {
    let workspace = utils::load_workspace(file)?;
    let server = utils::build_server(&workspace.manifest.provider).await?;
    utils::check_blocks(&server, &workspace.manifest)?;

    let lock = workspace.state.acquire_lock().await?;
    let mut state = workspace.state.load().await?;
    if !skip_refresh {
        utils::refresh_state(&server, &mut state).await?;
        workspace.state.save(&state).await?;
    }
    let plan = utils::build_plan(&server, &workspace.manifest, &state)?;

    println!("{}", "実行計画:".bold());
    utils::print_plan(&plan);

    let has_reads = !plan.actions_by_type(ActionType::Read).is_empty();
    if !plan.has_changes && !has_reads {
        lock.release().await?;
        return Ok(());
    }
    if plan.has_changes && !auto_approve && !utils::confirm("\nこの計画を適用しますか?")? {
        println!("{}", "適用を中止しました".yellow());
        lock.release().await?;
        return Ok(());
    }

    let result = run_plan(&server, &workspace.state, &mut state, &plan).await;
    lock.release().await?;
    report(&result)
}

/// 計画のアクションを順に実行し、成功するたびに state を保存する
///
/// 最初の失敗で残りのアクションは実行しない。
pub async fn run_plan(
    server: &ProviderServer,
    manager: &StateManager,
    state: &mut GlobalState,
    plan: &Plan,
) -> ApplyResult {
    let started = Instant::now();
    let mut result = ApplyResult::new();

    for action in &plan.actions {
        if action.action_type == ActionType::NoOp {
            continue;
        }
        println!("{} {}...", "→".blue(), action.description());

        let outcome = match execute(server, state, action).await {
            Ok(message) => manager.save(state).await.map(|_| message).map_err(Into::into),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(message) => {
                println!("  {} {}", "✓".green(), message);
                result.add_success(action.address.clone(), message);
            }
            Err(e) => {
                eprintln!("  {} {}: {:#}", "✗".red(), action.address, e);
                result.add_failure(action.address.clone(), format!("{:#}", e));
                break;
            }
        }
    }

    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}

async fn execute(
    server: &ProviderServer,
    state: &mut GlobalState,
    action: &Action,
) -> anyhow::Result<String> {
    let type_name = action.resource_type.as_str();
    let empty = State::new();
    let prior = action.prior_state.as_ref().unwrap_or(&empty);
    let planned = action.planned_state.as_ref().unwrap_or(&empty);

    match action.action_type {
        ActionType::Create => {
            let created = server.create_resource(type_name, planned).await?;
            let id = id_of(&created);
            state.record(&action.address, type_name, created);
            Ok(format!("作成しました (id: {})", id))
        }
        ActionType::Update => {
            let updated = server.update_resource(type_name, prior, planned).await?;
            state.record(&action.address, type_name, updated);
            Ok(format!("更新しました ({})", action.changed.join(", ")))
        }
        ActionType::Replace => {
            server.delete_resource(type_name, prior).await?;
            state.remove_resource(&action.address);
            let created = server.create_resource(type_name, planned).await?;
            let id = id_of(&created);
            state.record(&action.address, type_name, created);
            Ok(format!("置き換えました (id: {})", id))
        }
        ActionType::Delete => {
            server.delete_resource(type_name, prior).await?;
            state.remove_resource(&action.address);
            Ok("削除しました".to_string())
        }
        ActionType::Read => {
            let values = server.read_data_source(type_name, planned).await?;
            for (key, value) in values.iter().filter(|(k, _)| !planned.contains_key(k.as_str())) {
                println!("      {} = {}", key, utils::render_value(value));
            }
            Ok("読み取りました".to_string())
        }
        ActionType::NoOp => Ok(String::new()),
    }
}

fn id_of(state: &State) -> String {
    state
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or("-")
        .to_string()
}

/// 実行結果のサマリーを表示し、失敗があればエラーを返す
pub fn report(result: &ApplyResult) -> anyhow::Result<()> {
    println!();
    let seconds = result.duration_ms as f64 / 1000.0;
    if result.is_success() {
        println!(
            "{} {}件のアクションを適用しました ({:.1}s)",
            "✓".green().bold(),
            result.succeeded.len(),
            seconds
        );
        return Ok(());
    }

    for failure in &result.failed {
        eprintln!(
            "{} {}: {}",
            "✗".red().bold(),
            failure.address,
            failure.error.as_deref().unwrap_or("")
        );
    }
    anyhow::bail!(
        "適用に失敗しました ({}件成功、{}件失敗)",
        result.succeeded.len(),
        result.failed.len()
    )
}
