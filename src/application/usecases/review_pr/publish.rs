//! 코멘트/PR 설명 게시 단계. 게시 실패는 격리하고 실행을 계속한다.

use tracing::warn;

use crate::application::usecases::review_pr::ReviewPrUseCase;
use crate::application::usecases::review_pr::context::ExecutionContext;
use crate::application::usecases::review_pr::phases::PhaseOutcome;
use crate::domain::policy::upsert_comment_cache;
use crate::domain::review::{
    CommentRecord, PostedComment, PostedCommentKind, ReviewMode, ReviewResult, ReviewStatus,
    RunOptions, Suggestion,
};

const POSTING_PROGRESS_INTERVAL: usize = 5;

/// 글로벌 코멘트를 갱신 또는 생성하는 공용 best-effort 헬퍼.
/// 실패는 경고 로그로만 남기고 id 없음으로 돌려준다.
pub(super) async fn notify_comment(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
    existing_id: Option<String>,
    body: &str,
) -> Option<String> {
    if options.dry_run {
        use_case.reporter.raw("--- comment (dry-run) ---");
        use_case.reporter.raw(body);
        return existing_id;
    }

    if let Some(id) = existing_id {
        match ctx
            .gateway
            .update_comment(ctx.pr.local_id, &id, body)
            .await
        {
            Ok(()) => {
                upsert_comment_cache(
                    &mut ctx.existing_comments,
                    CommentRecord {
                        id: id.clone(),
                        content: body.to_string(),
                        related_patchset: None,
                    },
                );
                return Some(id);
            }
            Err(err) => {
                warn!(
                    comment_id = %id,
                    error = %format!("{err:#}"),
                    "comment update failed; creating a new comment instead"
                );
            }
        }
    }

    match ctx
        .gateway
        .create_global_comment(ctx.pr.local_id, body, &ctx.pr.to_patch_set_id)
        .await
    {
        Ok(id) => {
            upsert_comment_cache(
                &mut ctx.existing_comments,
                CommentRecord {
                    id: id.clone(),
                    content: body.to_string(),
                    related_patchset: None,
                },
            );
            Some(id)
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "comment creation failed");
            None
        }
    }
}

/// summary/analysis 단계의 결과 코멘트를 확정한다(완료 마커 포함 본문으로 갱신).
pub(super) async fn finalize_phase_comment(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
    mode: ReviewMode,
    outcome: &PhaseOutcome,
) -> Option<String> {
    let body = use_case
        .renderer
        .render_phase_result(mode, &outcome.text, outcome.elapsed_secs);
    notify_comment(use_case, ctx, options, outcome.comment_id.clone(), &body).await
}

/// PR 설명에 summary를 삽입한다. 반복 실행에도 중복 블록이 생기지 않는다.
pub(super) async fn update_pr_description(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
    summary: &str,
) {
    let description = use_case
        .renderer
        .render_description(&ctx.pr.description, summary);

    if options.dry_run {
        use_case.reporter.raw("--- description (dry-run) ---");
        use_case.reporter.raw(&description);
        return;
    }

    match ctx
        .gateway
        .update_description(ctx.pr.local_id, &ctx.pr.title, &description)
        .await
    {
        Ok(true) => {
            ctx.pr.description = description;
            use_case.reporter.status("publish", "PR description updated");
        }
        Ok(false) => {
            use_case
                .reporter
                .status("publish", "PR description unchanged");
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "PR description update failed");
        }
    }
}

/// 제안을 게시한다: 파일+라인이 있는 제안은 인라인, 나머지는 글로벌로 강등.
/// 인라인은 순서대로 하나씩 게시하며 5건마다(또는 마지막에) 진행 카운터를 갱신한다.
pub(super) async fn post_suggestions(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
    outcome: &PhaseOutcome,
    suggestions: &[Suggestion],
) -> Vec<PostedComment> {
    let mut posted = Vec::with_capacity(suggestions.len());
    let mut phase_comment_id = outcome.comment_id.clone();

    let (inline, global): (Vec<&Suggestion>, Vec<&Suggestion>) =
        suggestions.iter().partition(|s| s.is_inline());
    let total = inline.len();

    for (index, suggestion) in inline.iter().enumerate() {
        let body = use_case.renderer.render_inline_suggestion(suggestion);
        let comment_id = post_inline(use_case, ctx, options, suggestion, &body).await;
        posted.push(to_posted(suggestion, PostedCommentKind::Inline, comment_id));

        let attempted = index + 1;
        if attempted % POSTING_PROGRESS_INTERVAL == 0 || attempted == total {
            let progress = use_case.renderer.render_posting_progress(attempted, total);
            phase_comment_id =
                notify_comment(use_case, ctx, options, phase_comment_id, &progress).await;
        }
    }

    for suggestion in global {
        let body = use_case.renderer.render_global_suggestion(suggestion);
        let comment_id = if options.dry_run {
            use_case.reporter.raw("--- global comment (dry-run) ---");
            use_case.reporter.raw(&body);
            None
        } else {
            match ctx
                .gateway
                .create_global_comment(ctx.pr.local_id, &body, &ctx.pr.to_patch_set_id)
                .await
            {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "global suggestion post failed");
                    None
                }
            }
        };
        posted.push(to_posted(suggestion, PostedCommentKind::Global, comment_id));
    }

    let posted_inline = posted
        .iter()
        .filter(|p| matches!(p.kind, PostedCommentKind::Inline) && p.comment_id.is_some())
        .count();
    let done = use_case.renderer.render_comments_done(
        &outcome.text,
        posted_inline,
        total,
        outcome.elapsed_secs,
    );
    notify_comment(use_case, ctx, options, phase_comment_id, &done).await;

    posted
}

async fn post_inline(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
    suggestion: &Suggestion,
    body: &str,
) -> Option<String> {
    // is_inline() 검사를 통과한 제안만 들어온다.
    let file = suggestion.file.as_deref()?;
    let line = suggestion.line?;

    if options.dry_run {
        use_case
            .reporter
            .raw(&format!("--- inline comment {file}:{line} (dry-run) ---"));
        use_case.reporter.raw(body);
        return None;
    }

    match ctx
        .gateway
        .create_inline_comment(
            ctx.pr.local_id,
            body,
            file,
            line,
            &ctx.pr.from_patch_set_id,
            &ctx.pr.to_patch_set_id,
        )
        .await
    {
        Ok(id) => Some(id),
        Err(err) => {
            // 한 건의 실패가 나머지 게시를 막지 않는다.
            warn!(
                file,
                line,
                error = %format!("{err:#}"),
                "inline suggestion post failed"
            );
            None
        }
    }
}

fn to_posted(
    suggestion: &Suggestion,
    kind: PostedCommentKind,
    comment_id: Option<String>,
) -> PostedComment {
    PostedComment {
        kind,
        file: suggestion.file.clone(),
        line: suggestion.line,
        category: suggestion.category.clone(),
        content: suggestion.content.clone(),
        comment_id,
    }
}

/// 최종 결과를 콘솔로 요약 출력한다.
pub(super) fn report_result(use_case: &ReviewPrUseCase<'_>, result: &ReviewResult) {
    use_case.reporter.section("Result");
    use_case.reporter.kv(
        "Status",
        match result.status {
            ReviewStatus::Completed => "completed",
            ReviewStatus::NoChanges => "no changes",
        },
    );
    use_case.reporter.kv("PR", &format!("!{}", result.pr_id));
    use_case.reporter.kv("Title", &result.pr_title);
    if !result.modes.is_empty() {
        use_case.reporter.kv("Modes", &result.modes.join(", "));
    }
    use_case.reporter.kv(
        "Comments",
        &format!(
            "{} posted / {} parsed",
            result.metadata.comments_posted,
            result.comments.len()
        ),
    );
    use_case.reporter.kv(
        "Elapsed",
        &format!("{:.1}s", result.metadata.elapsed_secs),
    );

    if !result.summary.trim().is_empty() {
        use_case.reporter.raw("");
        use_case.reporter.raw("--- Summary ---");
        use_case.reporter.raw(result.summary.trim());
    }
    if !result.analysis.trim().is_empty() {
        use_case.reporter.raw("");
        use_case.reporter.raw("--- Analysis ---");
        use_case.reporter.raw(result.analysis.trim());
    }
}
