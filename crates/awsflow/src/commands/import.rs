use crate::utils;
use awsflow_config::parse_address;
use colored::Colorize;
use std::path::Path;

/// 既存のリモートオブジェクトをマニフェストのブロックに結びつける
pub async fn handle(file: Option<&Path>, address: &str, id: &str) -> anyhow::Result<()> {
    let (type_name, _) = parse_address(address)?;

    let workspace = utils::load_workspace(file)?;
    if workspace.manifest.resource(address).is_none() {
        anyhow::bail!(
            "{} はマニフェストにありません。先に resources にブロックを追加してください",
            address
        );
    }

    let server = utils::build_server(&workspace.manifest.provider).await?;
    let lock = workspace.state.acquire_lock().await?;
    let mut state = workspace.state.load().await?;

    if let Some(existing) = state.get_resource(address) {
        anyhow::bail!(
            "{} は既に state で管理されています (id: {})",
            address,
            existing.id
        );
    }

    println!("{} {} を {} として取り込み中...", "→".blue(), id.cyan(), address);
    let imported = server.import_resource(type_name, id).await?;
    state.record(address, type_name, imported);
    workspace.state.save(&state).await?;
    lock.release().await?;

    println!("{} {} を取り込みました", "✓".green().bold(), address);
    println!("  `awsflow plan` で設定との差分を確認してください");
    Ok(())
}
