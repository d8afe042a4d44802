use crate::utils;
use std::path::Path;

/// スキーマを JSON で出力する
///
/// マニフェストがなくても動く。リージョンは環境変数から解決される。
pub async fn handle(file: Option<&Path>, type_name: Option<String>) -> anyhow::Result<()> {
    let settings = utils::provider_settings(file)?;
    let server = utils::build_server(&settings).await?;
    let schemas = server.schemas();

    let output = match type_name {
        Some(name) => {
            let schema = schemas
                .resources
                .get(&name)
                .or_else(|| schemas.data_sources.get(&name))
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "未知の型です: {}\n利用可能な型: {}",
                        name,
                        server
                            .resource_types()
                            .into_iter()
                            .chain(server.data_source_types())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })?;
            serde_json::to_string_pretty(schema)?
        }
        None => serde_json::to_string_pretty(&schemas)?,
    };

    println!("{}", output);
    Ok(())
}
