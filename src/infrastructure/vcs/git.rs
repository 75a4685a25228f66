//! 로컬 git 명령 실행기.
//! 호스트 API가 diff를 주지 못할 때의 폴백 경로를 담당한다.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::process::Command;

pub struct LocalGit;

impl LocalGit {
    pub fn new() -> Self {
        Self
    }

    /// 두 브랜치 사이의 unified diff를 구한다.
    pub async fn branch_diff(&self, base_branch: &str, compare_branch: &str) -> Result<String> {
        self.run(&["diff", &format!("{base_branch}..{compare_branch}")])
            .await
            .with_context(|| {
                format!("failed to get diff between {base_branch} and {compare_branch}")
            })
    }

    /// 현재 체크아웃된 브랜치 이름을 구한다.
    pub async fn current_branch(&self) -> Result<String> {
        let out = self
            .run(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .context("failed to get current branch")?;
        Ok(out.trim().to_string())
    }

    /// 원격 추적 브랜치를 최신으로 당겨 diff 기준을 맞춘다. 실패해도 치명적이지 않다.
    pub async fn fetch_origin(&self, branch: &str) -> Result<()> {
        self.run(&["fetch", "origin", branch]).await?;
        Ok(())
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to spawn git {}", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            bail!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                if stderr.is_empty() {
                    "no stderr output"
                } else {
                    stderr.as_str()
                }
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
