//! PR 리뷰 실행의 전체 오케스트레이션 유스케이스.
//! summary → analysis → comments를 엄격한 순차 단계로 수행한다.

mod context;
mod phases;
mod scope;
mod publish;

use anyhow::Result;
use tracing::warn;

use crate::application::ports::{
    CommentRenderer, ConfigRepository, GatewayFactory, ModelRunnerFactory, PromptStore, Reporter,
    SnapshotWriter,
};
use crate::domain::parse::parse_suggestions;
use crate::domain::policy::{DISABLED_CONTEXT_PLACEHOLDER, cached_phase_result};
use crate::domain::review::{
    PostedComment, ReviewMetadata, ReviewMode, ReviewResult, ReviewStatus, RunOptions,
};

use context::load_execution_context;
use phases::{PhaseOutcome, PhaseSource, run_phase};
use publish::{finalize_phase_comment, post_suggestions, report_result, update_pr_description};
use scope::resolve_scope;

const SNAPSHOT_BASENAME: &str = "pr_review_result";

/// PR 탐색부터 모델 호출, 코멘트 게시, 스냅샷 기록까지 전체 흐름을 조율한다.
pub struct ReviewPrUseCase<'a> {
    pub config_repo: &'a dyn ConfigRepository,
    pub gateway_factory: &'a dyn GatewayFactory,
    pub runner_factory: &'a dyn ModelRunnerFactory,
    pub prompt_store: &'a dyn PromptStore,
    pub snapshot_writer: &'a dyn SnapshotWriter,
    pub renderer: &'a dyn CommentRenderer,
    pub reporter: &'a dyn Reporter,
}

impl<'a> ReviewPrUseCase<'a> {
    /// 리뷰 본 실행 진입점.
    pub async fn execute(&self, options: RunOptions) -> Result<ReviewResult> {
        self.reporter.section("Session");
        self.reporter.kv("Target", &options.target_branch);
        self.reporter.kv("Modes", &options.modes.labels().join(", "));
        self.reporter.kv(
            "Mode",
            if options.dry_run {
                "dry-run"
            } else {
                "post-comment"
            },
        );
        if options.force_regenerate {
            self.reporter.kv("Force", "enabled");
        }

        let mut ctx = load_execution_context(self, &options).await?;
        resolve_scope(self, &mut ctx, &options).await?;

        if ctx.scope.diff.trim().is_empty() {
            // 변경 없음 단락: 모델 호출도 코멘트 쓰기도 하지 않는다.
            self.reporter
                .status("scope", "no changes detected between revisions");
            let result = ReviewResult::no_changes(&ctx.pr);
            self.persist_snapshot(&result);
            report_result(self, &result);
            return Ok(result);
        }

        // 1단계: summary. 결과 코멘트는 새로 생성된 경우에만 확정하지만,
        // PR 설명 재작성은 캐시 적중에도 반복한다(멱등이므로 이전 실패/수동 되돌림을 복구).
        let summary = run_phase(self, &mut ctx, &options, ReviewMode::Summary, "").await?;
        if let PhaseSource::Generated = summary.source {
            finalize_phase_comment(self, &mut ctx, &options, ReviewMode::Summary, &summary).await;
        }
        if !matches!(summary.source, PhaseSource::Skipped) && !summary.text.trim().is_empty() {
            update_pr_description(self, &mut ctx, &options, &summary.text).await;
        }

        // 2단계: analysis. summary 결과(증분 실행에서 제외된 경우 이전 실행의 캐시)를 주입한다.
        let analysis_context = upstream_context(&summary, &ctx, ReviewMode::Summary);
        let analysis = run_phase(
            self,
            &mut ctx,
            &options,
            ReviewMode::Analysis,
            &analysis_context,
        )
        .await?;
        if let PhaseSource::Generated = analysis.source {
            finalize_phase_comment(self, &mut ctx, &options, ReviewMode::Analysis, &analysis).await;
        }

        // 3단계: comments. 캐시 적중 시 인라인 재게시는 하지 않는다.
        let comments_context = upstream_context(&analysis, &ctx, ReviewMode::Analysis);
        let comments = run_phase(
            self,
            &mut ctx,
            &options,
            ReviewMode::Comments,
            &comments_context,
        )
        .await?;
        let posted: Vec<PostedComment> = if let PhaseSource::Generated = comments.source {
            let suggestions = parse_suggestions(&comments.text);
            post_suggestions(self, &mut ctx, &options, &comments, &suggestions).await
        } else {
            Vec::new()
        };

        let comments_posted = posted.iter().filter(|c| c.comment_id.is_some()).count();
        let word_count = [&summary.text, &analysis.text, &comments.text]
            .iter()
            .map(|t| t.split_whitespace().count())
            .sum();

        let result = ReviewResult {
            status: ReviewStatus::Completed,
            pr_id: ctx.pr.local_id,
            pr_title: ctx.pr.title.clone(),
            modes: ctx.scope.modes.labels(),
            summary: summary.text,
            analysis: analysis.text,
            comments: posted,
            metadata: ReviewMetadata {
                elapsed_secs: ctx.started.elapsed().as_secs_f64(),
                comments_posted,
                word_count,
            },
        };

        self.persist_snapshot(&result);
        report_result(self, &result);
        Ok(result)
    }

    fn persist_snapshot(&self, result: &ReviewResult) {
        // 스냅샷은 진단용 기록일 뿐이므로 실패가 실행을 깨뜨리지 않는다.
        match self.snapshot_writer.persist(SNAPSHOT_BASENAME, result) {
            Ok(path) => self
                .reporter
                .status("snapshot", &format!("saved to {}", path.display())),
            Err(err) => warn!(error = %format!("{err:#}"), "failed to persist review snapshot"),
        }
    }
}

/// 다음 단계에 주입할 상류 컨텍스트를 고른다.
/// 단계가 이번 실행에서 제외되어도 이전 실행의 캐시 결과가 있으면 그것을 쓴다.
fn upstream_context(
    outcome: &PhaseOutcome,
    ctx: &context::ExecutionContext,
    mode: ReviewMode,
) -> String {
    if !outcome.text.trim().is_empty() {
        return outcome.text.clone();
    }
    cached_phase_result(&ctx.existing_comments, mode)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DISABLED_CONTEXT_PLACEHOLDER.to_string())
}
