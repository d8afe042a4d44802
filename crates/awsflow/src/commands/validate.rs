use crate::utils;
use colored::Colorize;
use std::path::Path;

pub async fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());

    let workspace = utils::load_workspace(file)?;
    println!(
        "マニフェスト: {}",
        workspace.manifest_path.display().to_string().cyan()
    );

    let server = utils::build_server(&workspace.manifest.provider).await?;
    utils::check_blocks(&server, &workspace.manifest)?;

    let manifest = &workspace.manifest;
    println!("{}", "✓ 設定は正常です！".green().bold());
    println!();
    println!("サマリー:");
    println!("  リソース: {}個", manifest.resources.len());
    for block in &manifest.resources {
        let provider = server.provider_of(&block.type_name).unwrap_or("?");
        println!("    - {} ({})", block.address().cyan(), provider);
    }
    println!("  データソース: {}個", manifest.data.len());
    for block in &manifest.data {
        let provider = server.provider_of(&block.type_name).unwrap_or("?");
        println!(
            "    - {} ({})",
            utils::data_address(&block.address()).cyan(),
            provider
        );
    }

    Ok(())
}
