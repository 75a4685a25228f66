//! 리뷰 범위(전체 vs 증분) 해석 단계.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::application::usecases::review_pr::ReviewPrUseCase;
use crate::application::usecases::review_pr::context::ExecutionContext;
use crate::domain::policy::last_reviewed_patch_set;
use crate::domain::review::{ResolvedScope, RunOptions, ScopeKind};

/// 기존 코멘트의 patch set 주석으로 마지막 리뷰 지점을 찾고 diff 범위를 결정한다.
/// 증분 실행에서는 summary 단계를 강제 제외한다.
pub(super) async fn resolve_scope(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &mut ExecutionContext,
    options: &RunOptions,
) -> Result<()> {
    use_case.reporter.section("Resolve Scope");

    let last_reviewed = last_reviewed_patch_set(&ctx.existing_comments)
        .filter(|ps| !ps.patch_set_id.is_empty())
        .cloned();

    let scope = match last_reviewed {
        Some(ps) if ps.patch_set_id != ctx.pr.to_patch_set_id => {
            info!(
                from = %ps.patch_set_id,
                to = %ctx.pr.to_patch_set_id,
                version = ps.version_no,
                "incremental review scope"
            );
            use_case.reporter.kv("Scope", "incremental");
            use_case.reporter.kv(
                "Revisions",
                &format!("{} -> {}", ps.patch_set_id, ctx.pr.to_patch_set_id),
            );

            let diff = fetch_incremental_diff(use_case, ctx, &ps.patch_set_id).await?;
            ResolvedScope {
                kind: ScopeKind::Incremental {
                    last_reviewed: ps.patch_set_id,
                },
                diff,
                modes: options.modes.without_summary(),
            }
        }
        _ => {
            use_case.reporter.kv("Scope", "full");
            let diff = fetch_full_diff(use_case, ctx).await?;
            ResolvedScope {
                kind: ScopeKind::Full,
                diff,
                modes: options.modes,
            }
        }
    };

    ctx.scope = scope;
    Ok(())
}

/// 증분 diff: patch set 간 비교를 API로 시도하고, 실패하면 브랜치 전체 diff로 내려간다.
async fn fetch_incremental_diff(
    use_case: &ReviewPrUseCase<'_>,
    ctx: &ExecutionContext,
    last_reviewed: &str,
) -> Result<String> {
    match ctx
        .gateway
        .fetch_patch_set_diff(ctx.pr.local_id, last_reviewed, &ctx.pr.to_patch_set_id)
        .await
    {
        Ok(diff) => Ok(diff),
        Err(err) => {
            warn!(
                error = %format!("{err:#}"),
                "incremental diff fetch failed; falling back to branch diff"
            );
            use_case
                .reporter
                .status("scope", "patch set diff unavailable; using branch diff");
            fetch_branch_diff(ctx).await
        }
    }
}

/// 전체 diff: 호스트 API(patch set 비교)를 먼저, 로컬 git을 폴백으로 쓴다.
async fn fetch_full_diff(use_case: &ReviewPrUseCase<'_>, ctx: &ExecutionContext) -> Result<String> {
    if !ctx.pr.from_patch_set_id.is_empty() && !ctx.pr.to_patch_set_id.is_empty() {
        match ctx
            .gateway
            .fetch_patch_set_diff(
                ctx.pr.local_id,
                &ctx.pr.from_patch_set_id,
                &ctx.pr.to_patch_set_id,
            )
            .await
        {
            Ok(diff) if !diff.trim().is_empty() => return Ok(diff),
            Ok(_) => {}
            Err(err) => {
                warn!(
                    error = %format!("{err:#}"),
                    "host diff fetch failed; falling back to local git"
                );
                use_case
                    .reporter
                    .status("scope", "host diff unavailable; using local git diff");
            }
        }
    }

    fetch_branch_diff(ctx).await
}

async fn fetch_branch_diff(ctx: &ExecutionContext) -> Result<String> {
    ctx.gateway
        .fetch_branch_diff(&ctx.pr.target_branch, &ctx.pr.source_branch)
        .await
        .context("all diff providers failed")
}
