mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "awsflow")]
#[command(about = "宣言したとおりに、AWS が揃う。", long_about = None)]
struct Cli {
    /// マニフェストのパス (省略時は AWSFLOW_CONFIG_PATH、カレントディレクトリの順に探索)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// バージョン情報を表示
    Version,
    /// リソース/データソースのスキーマを JSON で表示
    Schema {
        /// 型名 (例: aws_eks_cluster)。省略時は全型
        type_name: Option<String>,
    },
    /// マニフェストと各ブロックの設定を検証
    Validate,
    /// 変更内容を表示 (リモートへの変更は行わない)
    Plan {
        /// state をリモートから読み直さずに計画する
        #[arg(long)]
        skip_refresh: bool,
    },
    /// 変更を適用
    Apply {
        /// 確認プロンプトを省略
        #[arg(long)]
        auto_approve: bool,
        /// state をリモートから読み直さずに計画する
        #[arg(long)]
        skip_refresh: bool,
    },
    /// state のリソースをリモートの内容で更新
    Refresh,
    /// 既存のリモートオブジェクトを state に取り込む
    Import {
        /// リソースアドレス (TYPE.NAME)
        address: String,
        /// リモートオブジェクトの識別子
        id: String,
    },
    /// state にある全リソースを削除
    Destroy {
        /// 確認プロンプトを省略
        #[arg(long)]
        auto_approve: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout は schema の JSON 出力に使うので、ログは stderr へ
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let file = cli.file.as_deref();
    match cli.command {
        Commands::Version => commands::version::handle(),
        Commands::Schema { type_name } => commands::schema::handle(file, type_name).await,
        Commands::Validate => commands::validate::handle(file).await,
        Commands::Plan { skip_refresh } => commands::plan::handle(file, skip_refresh).await,
        Commands::Apply {
            auto_approve,
            skip_refresh,
        } => commands::apply::handle(file, auto_approve, skip_refresh).await,
        Commands::Refresh => commands::refresh::handle(file).await,
        Commands::Import { address, id } => commands::import::handle(file, &address, &id).await,
        Commands::Destroy { auto_approve } => commands::destroy::handle(file, auto_approve).await,
    }
}
