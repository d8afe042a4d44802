use crate::utils;
use colored::Colorize;
use std::path::Path;

/// マニフェストと state を比較して計画を表示する
///
/// state は読み直すが保存はしない。
pub async fn handle(file: Option<&Path>, skip_refresh: bool) -> anyhow::Result<()> {
    let workspace = utils::load_workspace(file)?;
    let server = utils::build_server(&workspace.manifest.provider).await?;
    utils::check_blocks(&server, &workspace.manifest)?;

    let mut state = workspace.state.load().await?;
    if !skip_refresh {
        utils::refresh_state(&server, &mut state).await?;
    }
    let plan = utils::build_plan(&server, &workspace.manifest, &state)?;

    println!("{}", "実行計画:".bold());
    utils::print_plan(&plan);
    Ok(())
}
