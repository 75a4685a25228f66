//! 애플리케이션 계층이 의존하는 포트(추상 인터페이스) 모음.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::review::{
    CommentRecord, PullRequestRef, ReviewMode, ReviewResult, Suggestion,
};
use crate::infrastructure::config::Config;

/// 설정 로딩/점검을 담당하는 저장소 포트.
pub trait ConfigRepository: Send + Sync {
    fn load(&self) -> Result<Config>;
    fn inspect_pretty_json(&self) -> Result<String>;
}

/// 코멘트 스토어를 겸하는 PR 호스트(YunXiao Codeup) 연동 포트.
/// diff 조회의 폴백(호스트 API → 로컬 git)은 구현체 내부에서 처리한다.
#[async_trait]
pub trait PullRequestGateway: Send + Sync {
    async fn find_pull_request_by_branches(
        &self,
        source: &str,
        target: &str,
    ) -> Result<Option<PullRequestRef>>;
    async fn get_pull_request(&self, local_id: u64) -> Result<PullRequestRef>;
    /// 리뷰 대상 소스 브랜치 탐지(설정 주입값이 없을 때의 로컬 폴백).
    async fn current_branch(&self) -> Result<String>;
    /// 타깃↔소스 브랜치 전체 diff.
    async fn fetch_branch_diff(&self, target: &str, source: &str) -> Result<String>;
    /// 두 patch set 사이의 증분 diff.
    async fn fetch_patch_set_diff(
        &self,
        local_id: u64,
        from_patch_set_id: &str,
        to_patch_set_id: &str,
    ) -> Result<String>;
    async fn list_comments(&self, local_id: u64) -> Result<Vec<CommentRecord>>;
    /// 글로벌 코멘트를 생성하고 생성된 코멘트 id를 돌려준다.
    async fn create_global_comment(
        &self,
        local_id: u64,
        content: &str,
        patch_set_id: &str,
    ) -> Result<String>;
    /// 파일/라인에 앵커된 인라인 코멘트를 생성한다.
    async fn create_inline_comment(
        &self,
        local_id: u64,
        content: &str,
        file_path: &str,
        line_number: u32,
        from_patch_set_id: &str,
        to_patch_set_id: &str,
    ) -> Result<String>;
    async fn update_comment(&self, local_id: u64, comment_id: &str, content: &str) -> Result<()>;
    async fn update_description(
        &self,
        local_id: u64,
        title: &str,
        description: &str,
    ) -> Result<bool>;
}

/// 설정에 맞는 게이트웨이를 생성하는 팩토리 포트.
pub trait GatewayFactory: Send + Sync {
    fn build(&self, config: &Config) -> Result<Box<dyn PullRequestGateway>>;
}

/// 모델 호출 실패 분류.
/// 토큰 한도 초과는 전송 전 선행조건 거부이고, 나머지는 호출 자체의 실패다.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("combined prompt exceeds token budget: estimated {estimated} > limit {limit}")]
    TokenBudgetExceeded { estimated: usize, limit: usize },
    #[error("model invocation failed: {0}")]
    Invocation(String),
}

/// 언어 모델 실행 포트. 한 번의 system+user 프롬프트 요청을 수행한다.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_turns: u32,
    ) -> Result<String, ModelError>;
}

/// 설정에서 활성 모델 러너를 구성하는 팩토리 포트.
pub trait ModelRunnerFactory: Send + Sync {
    fn build(&self, config: &Config) -> Result<Box<dyn ModelRunner>>;
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("system prompt not found for phase '{0}'")]
    NotFound(String),
    #[error("invalid prompt file for phase '{phase}': {reason}")]
    Invalid { phase: String, reason: String },
}

/// 단계별 시스템 프롬프트 저장소 포트.
pub trait PromptStore: Send + Sync {
    fn read_system_prompt(&self, mode: ReviewMode) -> Result<String, PromptError>;
    /// 필수 단계 프롬프트 존재 여부를 기동 시점에 검증한다.
    fn validate(&self, modes: &[ReviewMode]) -> Result<(), PromptError>;
}

/// 리뷰 결과 스냅샷(쓰기 전용, 다시 읽지 않음) 포트.
pub trait SnapshotWriter: Send + Sync {
    fn persist(&self, filename: &str, result: &ReviewResult) -> Result<PathBuf>;
}

/// 코멘트/설명 본문 렌더링 포트.
pub trait CommentRenderer: Send + Sync {
    /// "단계 시작" 진행 코멘트 본문.
    fn render_progress(&self, mode: ReviewMode) -> String;
    /// 완료 마커 + 결과 + 경과 시간 푸터를 포함한 결과 코멘트 본문.
    fn render_phase_result(&self, mode: ReviewMode, result: &str, elapsed_secs: f64) -> String;
    /// 단계 실패 안내 코멘트 본문.
    fn render_phase_error(&self, mode: ReviewMode, error: &str) -> String;
    /// 인라인 게시 진행 카운터 본문(5개 단위 갱신용).
    fn render_posting_progress(&self, posted: usize, total: usize) -> String;
    /// 인라인 게시 완주 후 comments 단계 코멘트 최종 본문.
    fn render_comments_done(
        &self,
        result: &str,
        posted: usize,
        attempted: usize,
        elapsed_secs: f64,
    ) -> String;
    fn render_inline_suggestion(&self, suggestion: &Suggestion) -> String;
    fn render_global_suggestion(&self, suggestion: &Suggestion) -> String;
    /// summary를 PR 설명에 삽입한 본문. 반복 호출해도 결과가 같아야 한다(멱등).
    fn render_description(&self, original: &str, summary: &str) -> String;
}

/// 콘솔/로그 출력 추상화 포트.
pub trait Reporter: Send + Sync {
    fn section(&self, name: &str);
    fn kv(&self, key: &str, value: &str);
    fn status(&self, scope: &str, message: &str);
    fn phase_status(&self, phase: &str, status: &str, extra: Option<&str>);
    fn raw(&self, line: &str);
}
