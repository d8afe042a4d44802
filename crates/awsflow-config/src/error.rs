use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "マニフェストが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: awsflow.local.yaml, awsflow.yaml, .awsflow.yaml\n\
        - ./.awsflow/ ディレクトリ\n\
        - ~/.config/awsflow/awsflow.yaml\n\
        または AWSFLOW_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ManifestNotFound,

    #[error("{path}: YAML の解析に失敗しました: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("ブロック {0} が重複しています")]
    DuplicateAddress(String),

    #[error("不正なブロック: {0}")]
    InvalidBlock(String),

    #[error("不正なアドレス {0:?}: TYPE.NAME 形式で指定してください")]
    InvalidAddress(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
