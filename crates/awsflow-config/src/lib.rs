pub mod error;
pub mod manifest;

pub use error::*;
pub use manifest::{BlockConfig, Manifest, ProviderSettings, parse_address};

use std::path::PathBuf;

/// マニフェストのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "AWSFLOW_CONFIG_PATH";

const CANDIDATES: [&str; 3] = ["awsflow.local.yaml", "awsflow.yaml", ".awsflow.yaml"];

/// グローバルマニフェストのパス (~/.config/awsflow/awsflow.yaml)
pub fn global_manifest_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("awsflow").join("awsflow.yaml"))
}

/// プロジェクトのマニフェストを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 AWSFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: awsflow.local.yaml, awsflow.yaml, .awsflow.yaml
/// 3. ./.awsflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/awsflow/awsflow.yaml (グローバル設定)
pub fn find_manifest_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".awsflow");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(global) = global_manifest_path() {
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ManifestNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    /// `dir` をカレントディレクトリにして `f` を実行する
    fn in_dir<T>(dir: &std::path::Path, f: impl FnOnce() -> T) -> T {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, f);
        std::env::set_current_dir(original_dir).unwrap();
        result
    }

    #[test]
    #[serial]
    fn test_find_manifest_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("awsflow.yaml"), "resources: []").unwrap();

        let result = in_dir(temp_dir.path(), find_manifest_file).unwrap();
        assert!(result.ends_with("awsflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_manifest_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("awsflow.yaml"), "# shared").unwrap();
        fs::write(temp_dir.path().join("awsflow.local.yaml"), "# local").unwrap();
        fs::write(temp_dir.path().join(".awsflow.yaml"), "# hidden").unwrap();

        // awsflow.local.yaml が優先される
        let result = in_dir(temp_dir.path(), find_manifest_file).unwrap();
        assert!(result.ends_with("awsflow.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_manifest_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".awsflow");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("awsflow.yaml"), "# in project dir").unwrap();

        let result = in_dir(temp_dir.path(), find_manifest_file).unwrap();
        assert!(result.ends_with(".awsflow/awsflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_manifest_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "# custom").unwrap();

        let result = temp_env::with_var(CONFIG_PATH_ENV, Some(&config_path), find_manifest_file);
        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    #[serial]
    fn test_find_manifest_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();

        // グローバル設定が存在する環境ではスキップ
        if global_manifest_path().is_some_and(|p| p.exists()) {
            return;
        }

        let result = in_dir(temp_dir.path(), find_manifest_file);
        assert!(matches!(result, Err(ConfigError::ManifestNotFound)));
    }
}
