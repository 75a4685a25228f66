//! YunXiao Codeup OpenAPI 연동 구현.

use anyhow::{Context, Result};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

use crate::domain::review::{CommentRecord, PullRequestRef, RelatedPatchSet};

pub struct YunXiaoClient {
    client: Client,
    domain: String,
    organization_id: String,
    repository_id: String,
    token: Option<String>,
}

impl YunXiaoClient {
    /// Codeup 조직/저장소 대상 클라이언트를 생성한다.
    pub fn new(
        domain: String,
        organization_id: String,
        repository_id: String,
        token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            domain,
            organization_id,
            repository_id,
            token,
        }
    }

    fn change_requests_endpoint(&self) -> String {
        format!(
            "https://{}/oapi/v1/codeup/organizations/{}/changeRequests",
            self.domain, self.organization_id
        )
    }

    fn repository_endpoint(&self, rest: &str) -> String {
        format!(
            "https://{}/oapi/v1/codeup/organizations/{}/repositories/{}{}",
            self.domain, self.organization_id, self.repository_id, rest
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        // 공통 헤더/인증 적용. Codeup은 bearer 대신 전용 토큰 헤더를 쓴다.
        let req = self
            .client
            .request(method, url)
            .header("User-Agent", "yunpilot")
            .header("Content-Type", "application/json");

        if let Some(token) = &self.token {
            req.header("x-yunxiao-token", token)
        } else {
            req
        }
    }

    async fn execute(&self, req: RequestBuilder, what: &str) -> Result<String> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("yunxiao: failed to {what}"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("yunxiao: failed to read {what} body"))?;

        if !status.is_success() {
            anyhow::bail!("yunxiao: failed to {what} ({status}): {body}");
        }
        Ok(body)
    }

    /// 저장소의 change request 목록을 조회한다.
    pub async fn list_change_requests(&self, state: Option<&str>) -> Result<Vec<PullRequestRef>> {
        let mut req = self
            .request(Method::GET, self.change_requests_endpoint())
            .query(&[
                ("page", "1"),
                ("perPage", "50"),
                ("projectIds", self.repository_id.as_str()),
            ]);
        if let Some(state) = state {
            req = req.query(&[("state", state)]);
        }

        let body = self.execute(req, "list change requests").await?;
        let items: Vec<ChangeRequestResponse> =
            serde_json::from_str(&body).context("yunxiao: invalid change request list JSON")?;
        Ok(items.into_iter().map(ChangeRequestResponse::into_ref).collect())
    }

    /// 두 patch set 사이의 변경 트리를 조회한다.
    pub async fn get_change_tree(
        &self,
        local_id: u64,
        from_patch_set_id: &str,
        to_patch_set_id: &str,
    ) -> Result<ChangeTreeResponse> {
        let req = self
            .request(
                Method::GET,
                self.repository_endpoint(&format!("/changeRequests/{local_id}/diffs/changeTree")),
            )
            .query(&[
                ("fromPatchSetId", from_patch_set_id),
                ("toPatchSetId", to_patch_set_id),
            ]);

        let body = self.execute(req, "fetch change tree").await?;
        serde_json::from_str(&body).context("yunxiao: invalid change tree JSON")
    }

    /// 브랜치 메타데이터를 조회한다. 존재 확인 용도.
    pub async fn get_branch(&self, branch_name: &str) -> Result<serde_json::Value> {
        let encoded = utf8_percent_encode(branch_name, NON_ALPHANUMERIC).to_string();
        let req = self.request(
            Method::GET,
            self.repository_endpoint(&format!("/branches/{encoded}")),
        );
        let body = self.execute(req, "fetch branch info").await?;
        serde_json::from_str(&body).context("yunxiao: invalid branch JSON")
    }

    /// change request의 코멘트 목록을 조회한다.
    pub async fn list_comments(&self, local_id: u64) -> Result<Vec<CommentRecord>> {
        let req = self.request(
            Method::GET,
            self.repository_endpoint(&format!("/changeRequests/{local_id}/comments")),
        );

        let body = self.execute(req, "list comments").await?;
        let comments: Vec<CommentResponse> =
            serde_json::from_str(&body).context("yunxiao: invalid comments JSON")?;

        Ok(comments
            .into_iter()
            .map(|c| CommentRecord {
                id: c.comment_biz_id,
                content: c.content,
                related_patchset: c.related_patchset.map(|p| RelatedPatchSet {
                    version_no: p.version_no,
                    patch_set_id: p.patch_set_biz_id,
                }),
            })
            .collect())
    }

    /// 글로벌 코멘트를 생성하고 comment_biz_id를 돌려준다.
    pub async fn create_global_comment(
        &self,
        local_id: u64,
        content: &str,
        patch_set_id: &str,
    ) -> Result<String> {
        let req = self
            .request(
                Method::POST,
                self.repository_endpoint(&format!("/changeRequests/{local_id}/comments")),
            )
            .json(&json!({
                "comment_type": "GLOBAL_COMMENT",
                "content": content,
                "patchset_biz_id": patch_set_id,
                "resolved": false,
                "draft": false,
            }));

        let body = self.execute(req, "create global comment").await?;
        let created: CreatedCommentResponse =
            serde_json::from_str(&body).context("yunxiao: invalid create-comment JSON")?;
        Ok(created.comment_biz_id)
    }

    /// 파일/라인에 앵커된 인라인 코멘트를 생성한다.
    pub async fn create_inline_comment(
        &self,
        local_id: u64,
        content: &str,
        file_path: &str,
        line_number: u32,
        from_patch_set_id: &str,
        to_patch_set_id: &str,
    ) -> Result<String> {
        let req = self
            .request(
                Method::POST,
                self.repository_endpoint(&format!("/changeRequests/{local_id}/comments")),
            )
            .json(&json!({
                "comment_type": "INLINE_COMMENT",
                "content": content,
                "file_path": file_path,
                "line_number": line_number,
                "from_patchset_biz_id": from_patch_set_id,
                "to_patchset_biz_id": to_patch_set_id,
                "patchset_biz_id": to_patch_set_id,
                "resolved": false,
                "draft": false,
            }));

        let body = self.execute(req, "create inline comment").await?;
        let created: CreatedCommentResponse =
            serde_json::from_str(&body).context("yunxiao: invalid create-comment JSON")?;
        Ok(created.comment_biz_id)
    }

    /// 코멘트 본문을 갱신한다.
    pub async fn update_comment(
        &self,
        local_id: u64,
        comment_biz_id: &str,
        content: &str,
    ) -> Result<()> {
        let req = self
            .request(
                Method::PUT,
                self.repository_endpoint(&format!(
                    "/changeRequests/{local_id}/comments/{comment_biz_id}"
                )),
            )
            .json(&json!({ "content": content }));

        self.execute(req, "update comment").await?;
        Ok(())
    }

    /// change request의 제목/설명을 갱신한다.
    pub async fn update_change_request(
        &self,
        local_id: u64,
        title: &str,
        description: &str,
    ) -> Result<()> {
        let req = self
            .request(
                Method::PUT,
                self.repository_endpoint(&format!("/changeRequests/{local_id}")),
            )
            .json(&json!({ "title": title, "description": description }));

        self.execute(req, "update change request").await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeRequestResponse {
    local_id: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    source_branch: String,
    target_branch: String,
    #[serde(default)]
    from_patch_set_id: Option<String>,
    #[serde(default)]
    to_patch_set_id: Option<String>,
}

impl ChangeRequestResponse {
    fn into_ref(self) -> PullRequestRef {
        PullRequestRef {
            local_id: self.local_id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            source_branch: self.source_branch,
            target_branch: self.target_branch,
            from_patch_set_id: self.from_patch_set_id.unwrap_or_default(),
            to_patch_set_id: self.to_patch_set_id.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    comment_biz_id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    related_patchset: Option<RelatedPatchSetResponse>,
}

#[derive(Debug, Deserialize)]
struct RelatedPatchSetResponse {
    version_no: u32,
    patch_set_biz_id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedCommentResponse {
    comment_biz_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTreeResponse {
    #[serde(default)]
    pub changed_tree_items: Vec<ChangedTreeItem>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangedTreeItem {
    #[serde(default)]
    pub new_path: Option<String>,
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub add_lines: u32,
    #[serde(default)]
    pub del_lines: u32,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
}
