#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const VALID_MANIFEST: &str = r#"
provider:
  region: us-west-2
resources:
  - type: aws_ecr_pull_through_cache_rule
    name: hub
    config:
      ecr_repository_prefix: ecr-public
      upstream_registry_url: public.ecr.aws
data:
  - type: aws_route53_resolver_rules
    name: system
    config:
      rule_type: SYSTEM
"#;

/// AWS の設定やグローバルマニフェストに影響されないコマンド
fn awsflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("awsflow").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("AWSFLOW_CONFIG_PATH")
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("AWS_REGION", "us-west-2")
        .env("AWS_ACCESS_KEY_ID", "test")
        .env("AWS_SECRET_ACCESS_KEY", "test")
        .env("AWS_EC2_METADATA_DISABLED", "true");
    cmd
}

fn project(manifest: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("awsflow.yaml"), manifest).unwrap();
    dir
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    awsflow(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("宣言したとおりに"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("destroy"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    awsflow(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("awsflow"));
}

/// applyコマンドのヘルプに --auto-approve があることを確認
#[test]
fn test_apply_help() {
    let dir = tempfile::tempdir().unwrap();
    awsflow(&dir)
        .args(["apply", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--auto-approve"))
        .stdout(predicate::str::contains("--skip-refresh"));
}

/// マニフェストなしでもスキーマを出力できることを確認
#[test]
fn test_schema_single_type() {
    let dir = tempfile::tempdir().unwrap();
    awsflow(&dir)
        .args(["schema", "aws_eks_cluster"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vpc_config"))
        .stdout(predicate::str::contains("role_arn"));
}

#[test]
fn test_schema_all_types() {
    let dir = tempfile::tempdir().unwrap();
    awsflow(&dir)
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("aws_ecr_pull_through_cache_rule"))
        .stdout(predicate::str::contains("aws_route53_resolver_rules"));
}

#[test]
fn test_schema_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    awsflow(&dir)
        .args(["schema", "aws_s3_bucket"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("未知の型です: aws_s3_bucket"));
}

#[test]
fn test_validate_valid_manifest() {
    let dir = project(VALID_MANIFEST);
    awsflow(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("設定は正常です"))
        .stdout(predicate::str::contains("aws_ecr_pull_through_cache_rule.hub"))
        .stdout(predicate::str::contains("aws/classic"));
}

/// -f で指定したマニフェストを使うことを確認
#[test]
fn test_validate_with_file_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("infra.yaml");
    fs::write(&path, VALID_MANIFEST).unwrap();

    awsflow(&dir)
        .args(["validate", "-f"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_validate_reports_invalid_attribute() {
    let dir = project(
        r#"
resources:
  - type: aws_ecr_pull_through_cache_rule
    name: hub
    config:
      ecr_repository_prefix: "x"
      upstream_registry_url: public.ecr.aws
"#,
    );
    awsflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ecr_repository_prefix"))
        .stderr(predicate::str::contains("設定エラー"));
}

#[test]
fn test_validate_reports_unknown_type() {
    let dir = project(
        r#"
resources:
  - type: aws_s3_bucket
    name: logs
"#,
    );
    awsflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown resource type: aws_s3_bucket"));
}

#[test]
fn test_validate_duplicate_address() {
    let dir = project(
        r#"
resources:
  - type: aws_eks_cluster
    name: main
  - type: aws_eks_cluster
    name: main
"#,
    );
    awsflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("aws_eks_cluster.main が重複しています"));
}

#[test]
fn test_plan_without_manifest() {
    let dir = tempfile::tempdir().unwrap();
    awsflow(&dir)
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("マニフェストが見つかりません"));
}

/// state が空なら全リソースが作成予定になることを確認
#[test]
fn test_plan_from_empty_state() {
    let dir = project(VALID_MANIFEST);
    awsflow(&dir)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "aws_ecr_pull_through_cache_rule.hub will be created",
        ))
        .stdout(predicate::str::contains(
            "data.aws_route53_resolver_rules.system will be read",
        ))
        .stdout(predicate::str::contains("1 to create"));

    assert!(!dir.path().join(".awsflow").join("state.json").exists());
}

/// マニフェストから消えたブロックは削除予定になることを確認
#[test]
fn test_plan_deletes_removed_block() {
    let dir = project(VALID_MANIFEST);
    let state_dir = dir.path().join(".awsflow");
    fs::create_dir_all(&state_dir).unwrap();
    fs::write(
        state_dir.join("state.json"),
        r#"{
  "version": 1,
  "updated_at": "2026-01-01T00:00:00Z",
  "resources": {
    "aws_eks_cluster.old": {
      "id": "old",
      "resource_type": "aws_eks_cluster",
      "attributes": { "id": "old", "name": "old" },
      "created_at": "2026-01-01T00:00:00Z",
      "updated_at": "2026-01-01T00:00:00Z"
    }
  }
}"#,
    )
    .unwrap();

    awsflow(&dir)
        .args(["plan", "--skip-refresh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aws_eks_cluster.old will be destroyed"))
        .stdout(predicate::str::contains("1 to delete"));
}

#[test]
fn test_import_invalid_address() {
    let dir = project(VALID_MANIFEST);
    awsflow(&dir)
        .args(["import", "not-an-address", "some-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TYPE.NAME"));
}

#[test]
fn test_import_requires_block_in_manifest() {
    let dir = project(VALID_MANIFEST);
    awsflow(&dir)
        .args(["import", "aws_eks_cluster.main", "main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("マニフェストにありません"));
}

#[test]
fn test_destroy_with_empty_state() {
    let dir = project(VALID_MANIFEST);
    awsflow(&dir)
        .args(["destroy", "--auto-approve"])
        .assert()
        .success()
        .stdout(predicate::str::contains("state にリソースがありません"));
}
