//! 단계 상태 기계: 건너뜀/캐시 적중/실행/실패를 명시적 결과로 구분한다.

use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::application::ports::ModelError;
use crate::application::usecases::review_pr::ReviewPrUseCase;
use crate::application::usecases::review_pr::context::ExecutionContext;
use crate::application::usecases::review_pr::publish::notify_comment;
use crate::domain::policy::{
    build_analysis_prompt, build_comments_prompt, build_summary_prompt, cached_phase_result,
    completion_marker, find_comment_with_marker, progress_marker,
};
use crate::domain::review::{ReviewMode, RunOptions};

/// 단계 결과의 출처.
pub(super) enum PhaseSource {
    /// 모드 비활성(또는 증분 제외)으로 실행하지 않음.
    Skipped,
    /// 기존 완료 코멘트에서 복원함. 모델 호출 없음.
    Cached,
    /// 이번 실행에서 모델을 호출해 생성함.
    Generated,
}

pub(super) struct PhaseOutcome {
    pub text: String,
    pub source: PhaseSource,
    /// 이 단계가 소유한 진행/완료 코멘트 id. 이후 갱신에 재사용한다.
    pub comment_id: Option<String>,
    pub elapsed_secs: f64,
}

/// 한 단계를 끝까지 수행한다. 모델 오류는 오류 코멘트 게시 후 전파된다.
pub(super) async fn run_phase(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
    mode: ReviewMode,
    upstream_context: &str,
) -> Result<PhaseOutcome> {
    let phase = mode.as_str();

    if !ctx.scope.modes.contains(mode) {
        use_case.reporter.phase_status(phase, "skipped", None);
        return Ok(PhaseOutcome {
            text: String::new(),
            source: PhaseSource::Skipped,
            comment_id: None,
            elapsed_secs: 0.0,
        });
    }

    // 캐시 탐색은 부수효과가 없다. 발견된 코멘트 id는 강제 재생성에서도 재사용해
    // 같은 코멘트를 갱신하게 한다(중복 게시 방지).
    let cached = cached_phase_result(&ctx.existing_comments, mode);
    let reused_comment_id = find_comment_with_marker(&ctx.existing_comments, &completion_marker(mode))
        .or_else(|| find_comment_with_marker(&ctx.existing_comments, &progress_marker(mode)))
        .map(|c| c.id.clone());

    if !options.force_regenerate && let Some(text) = cached {
        info!(phase, "phase result recovered from existing comment");
        use_case.reporter.phase_status(phase, "cached", None);
        return Ok(PhaseOutcome {
            text,
            source: PhaseSource::Cached,
            comment_id: reused_comment_id,
            elapsed_secs: 0.0,
        });
    }

    use_case.reporter.phase_status(phase, "running", None);
    let started = Instant::now();

    // 진행 코멘트는 알림일 뿐이므로 게시 실패가 단계를 멈추지 않는다.
    let progress_body = use_case.renderer.render_progress(mode);
    let comment_id = notify_comment(
        use_case,
        ctx,
        options,
        reused_comment_id.clone(),
        &progress_body,
    )
    .await;

    let system_prompt = use_case.prompt_store.read_system_prompt(mode)?;
    let user_prompt = match mode {
        ReviewMode::Summary => build_summary_prompt(&ctx.pr, &ctx.scope.diff),
        ReviewMode::Analysis => build_analysis_prompt(&ctx.pr, &ctx.scope.diff, upstream_context),
        ReviewMode::Comments => build_comments_prompt(&ctx.pr, &ctx.scope.diff, upstream_context),
    };

    let text = match ctx
        .runner
        .generate(&system_prompt, &user_prompt, ctx.config.max_turns())
        .await
    {
        Ok(text) => text,
        Err(err) => {
            // 실패 사실을 PR에 남기되 실행 자체는 실패로 끝낸다. 부분 실패를 숨기지 않는다.
            report_phase_failure(use_case, ctx, options, mode, &err).await;
            use_case.reporter.phase_status(phase, "error", Some(&err.to_string()));
            return Err(err.into());
        }
    };

    let elapsed_secs = started.elapsed().as_secs_f64();
    use_case
        .reporter
        .phase_status(phase, "done", Some(&format!("{elapsed_secs:.1}s")));

    Ok(PhaseOutcome {
        text,
        source: PhaseSource::Generated,
        comment_id,
        elapsed_secs,
    })
}

async fn report_phase_failure(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
    mode: ReviewMode,
    err: &ModelError,
) {
    warn!(phase = mode.as_str(), error = %err, "phase model invocation failed");
    let error_body = use_case.renderer.render_phase_error(mode, &err.to_string());
    // 오류 안내는 별도 코멘트로 남긴다(완료 마커 없음, 캐시로 오인 불가).
    notify_comment(use_case, ctx, options, None, &error_body).await;
}
