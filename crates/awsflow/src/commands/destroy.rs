use super::apply;
use crate::utils;
use awsflow_cloud::Plan;
use colored::Colorize;
use std::path::Path;

/// state にある全リソースを削除する
pub async fn handle(file: Option<&Path>, auto_approve: bool) -> anyhow::Result<()> {
    let workspace = utils::load_workspace(file)?;
    let server = utils::build_server(&workspace.manifest.provider).await?;

    let lock = workspace.state.acquire_lock().await?;
    let mut state = workspace.state.load().await?;
    if state.resources.is_empty() {
        println!("{}", "state にリソースがありません".yellow());
        lock.release().await?;
        return Ok(());
    }

    // 作成と逆の順序で削除する
    let mut records: Vec<_> = state.resources.iter().collect();
    records.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));

    let mut actions = Vec::new();
    for (address, record) in records {
        actions.push(server.plan_resource(
            &record.resource_type,
            address,
            Some(&record.attributes),
            None,
        )?);
    }
    let plan = Plan::new(actions);

    println!("{}", "削除計画:".bold());
    utils::print_plan(&plan);

    if !auto_approve && !utils::confirm("\nこれらのリソースをすべて削除しますか?")? {
        println!("{}", "削除を中止しました".yellow());
        lock.release().await?;
        return Ok(());
    }

    let result = apply::run_plan(&server, &workspace.state, &mut state, &plan).await;
    lock.release().await?;
    apply::report(&result)
}
