//! PR 호스트 연동 계층.
//! Codeup OpenAPI와 로컬 git을 하나의 게이트웨이로 묶는다.

pub mod git;
pub mod yunxiao;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::application::ports::PullRequestGateway;
use crate::domain::review::{CommentRecord, PullRequestRef};

use git::LocalGit;
use yunxiao::{ChangeTreeResponse, YunXiaoClient};

/// Codeup API를 우선 쓰고, diff 계열은 로컬 git으로 폴백하는 게이트웨이.
pub struct CodeupGateway {
    api: YunXiaoClient,
    git: LocalGit,
}

impl CodeupGateway {
    pub fn new(api: YunXiaoClient) -> Self {
        Self {
            api,
            git: LocalGit::new(),
        }
    }
}

#[async_trait]
impl PullRequestGateway for CodeupGateway {
    async fn find_pull_request_by_branches(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Option<PullRequestRef>> {
        let prs = self.api.list_change_requests(Some("opened")).await?;
        Ok(prs
            .into_iter()
            .find(|pr| pr.source_branch == source && pr.target_branch == target))
    }

    async fn get_pull_request(&self, local_id: u64) -> Result<PullRequestRef> {
        let prs = self.api.list_change_requests(Some("opened")).await?;
        prs.into_iter()
            .find(|pr| pr.local_id == local_id)
            .with_context(|| format!("change request with local id {local_id} not found"))
    }

    async fn current_branch(&self) -> Result<String> {
        self.git.current_branch().await
    }

    async fn fetch_branch_diff(&self, target: &str, source: &str) -> Result<String> {
        // 원격 최신화는 실패해도 진행한다(오프라인/얕은 클론 환경).
        for branch in [target, source] {
            if let Err(err) = self.git.fetch_origin(branch).await {
                debug!(branch, error = %format!("{err:#}"), "git fetch skipped");
            }
        }

        match self.git.branch_diff(target, source).await {
            Ok(diff) => Ok(diff),
            Err(git_err) => {
                // 로컬 git이 없는 환경에서는 브랜치 존재 확인 후 API 오류로 승격한다.
                warn!(error = %format!("{git_err:#}"), "local git diff failed");
                self.api.get_branch(source).await?;
                Err(git_err)
            }
        }
    }

    async fn fetch_patch_set_diff(
        &self,
        local_id: u64,
        from_patch_set_id: &str,
        to_patch_set_id: &str,
    ) -> Result<String> {
        let tree = self
            .api
            .get_change_tree(local_id, from_patch_set_id, to_patch_set_id)
            .await?;
        Ok(format_change_tree(&tree))
    }

    async fn list_comments(&self, local_id: u64) -> Result<Vec<CommentRecord>> {
        self.api.list_comments(local_id).await
    }

    async fn create_global_comment(
        &self,
        local_id: u64,
        content: &str,
        patch_set_id: &str,
    ) -> Result<String> {
        self.api
            .create_global_comment(local_id, content, patch_set_id)
            .await
    }

    async fn create_inline_comment(
        &self,
        local_id: u64,
        content: &str,
        file_path: &str,
        line_number: u32,
        from_patch_set_id: &str,
        to_patch_set_id: &str,
    ) -> Result<String> {
        self.api
            .create_inline_comment(
                local_id,
                content,
                file_path,
                line_number,
                from_patch_set_id,
                to_patch_set_id,
            )
            .await
    }

    async fn update_comment(&self, local_id: u64, comment_id: &str, content: &str) -> Result<()> {
        self.api.update_comment(local_id, comment_id, content).await
    }

    async fn update_description(
        &self,
        local_id: u64,
        title: &str,
        description: &str,
    ) -> Result<bool> {
        self.api
            .update_change_request(local_id, title, description)
            .await?;
        Ok(true)
    }
}

/// changeTree 응답을 유사 diff 텍스트로 변환한다.
/// API가 본문 diff를 주지 않는 경우 모델에 전달할 최소한의 변경 요약이 된다.
pub fn format_change_tree(tree: &ChangeTreeResponse) -> String {
    let mut lines = Vec::new();

    for item in &tree.changed_tree_items {
        let file_path = item
            .new_path
            .as_deref()
            .or(item.old_path.as_deref())
            .unwrap_or("(unknown)");

        lines.push(format!("--- a/{file_path}"));
        lines.push(format!("+++ b/{file_path}"));
        lines.push(format!("@@ +{},-{} @@", item.add_lines, item.del_lines));

        if item.new_file {
            lines.push(format!("New file: {file_path}"));
        } else if item.deleted_file {
            lines.push(format!("Deleted file: {file_path}"));
        } else if item.renamed_file {
            lines.push(format!(
                "Renamed: {} -> {}",
                item.old_path.as_deref().unwrap_or("(unknown)"),
                file_path
            ));
        }
    }

    lines.join("\n")
}
