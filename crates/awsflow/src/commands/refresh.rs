use crate::utils::{self, Refreshed};
use colored::Colorize;
use std::path::Path;

pub async fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    let workspace = utils::load_workspace(file)?;
    let server = utils::build_server(&workspace.manifest.provider).await?;

    let lock = workspace.state.acquire_lock().await?;
    let mut state = workspace.state.load().await?;
    let outcomes = utils::refresh_state(&server, &mut state).await?;
    workspace.state.save(&state).await?;
    lock.release().await?;

    let mut removed = 0;
    for (address, outcome) in &outcomes {
        match outcome {
            Refreshed::Updated => println!("  {} {}", "✓".green(), address),
            Refreshed::Removed => {
                removed += 1;
                println!(
                    "  {} {} (リモートに存在しないため state から削除)",
                    "-".red(),
                    address
                );
            }
        }
    }

    tracing::info!("refresh 完了: {} 件", outcomes.len());
    println!();
    println!(
        "{} {}件を更新、{}件を state から削除しました",
        "✓".green().bold(),
        outcomes.len() - removed,
        removed
    );
    Ok(())
}
