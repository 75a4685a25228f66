//! 리뷰 실행 컨텍스트(설정/PR/게이트웨이/러너) 준비 단계.

use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::application::ports::{ModelRunner, PullRequestGateway};
use crate::application::usecases::review_pr::ReviewPrUseCase;
use crate::domain::review::{
    CommentRecord, PrSelector, PullRequestRef, ResolvedScope, ReviewModeSet, RunOptions, ScopeKind,
};
use crate::infrastructure::config::Config;

/// 리뷰 유스케이스 전 구간에서 공유되는 실행 상태.
pub(super) struct ExecutionContext {
    pub config: Config,
    pub pr: PullRequestRef,
    pub gateway: Box<dyn PullRequestGateway>,
    pub runner: Box<dyn ModelRunner>,
    pub existing_comments: Vec<CommentRecord>,
    pub scope: ResolvedScope,
    pub started: Instant,
}

/// 설정 로딩, 프롬프트 검증, PR 탐색, 기존 코멘트 조회까지 선행한다.
pub(super) async fn load_execution_context(
    use_case: &ReviewPrUseCase<'_>,
    options: &RunOptions,
) -> Result<ExecutionContext> {
    use_case.reporter.section("Load Config");
    let config = use_case
        .config_repo
        .load()
        .context("failed to load yunpilot config")?;

    // 프롬프트 누락은 기동 시점에 치명 오류로 끊는다.
    use_case
        .prompt_store
        .validate(&options.modes.enabled())
        .context("missing or invalid system prompt files")?;

    let gateway = use_case.gateway_factory.build(&config)?;
    let runner = use_case.runner_factory.build(&config)?;

    use_case.reporter.section("Find Pull Request");
    let pr = find_pull_request(use_case, gateway.as_ref(), options).await?;
    use_case.reporter.kv("PR", &format!("!{}", pr.local_id));
    use_case.reporter.kv("Title", &pr.title);
    use_case.reporter.kv(
        "Branches",
        &format!("{} -> {}", pr.source_branch, pr.target_branch),
    );

    // 코멘트 조회 실패는 복구 가능: 캐시/증분 판단 없이 전체 리뷰로 진행한다.
    let existing_comments = match gateway.list_comments(pr.local_id).await {
        Ok(comments) => comments,
        Err(err) => {
            warn!(
                error = %format!("{err:#}"),
                "failed to list existing comments; degrading to full review"
            );
            Vec::new()
        }
    };

    Ok(ExecutionContext {
        config,
        pr,
        gateway,
        runner,
        existing_comments,
        scope: ResolvedScope {
            kind: ScopeKind::Full,
            diff: String::new(),
            modes: ReviewModeSet::empty(),
        },
        started: Instant::now(),
    })
}

async fn find_pull_request(
    use_case: &ReviewPrUseCase<'_>,
    gateway: &dyn PullRequestGateway,
    options: &RunOptions,
) -> Result<PullRequestRef> {
    match &options.selector {
        PrSelector::LocalId(local_id) => gateway.get_pull_request(*local_id).await,
        PrSelector::Branches { source } => {
            let source = if source.trim().is_empty() {
                // 설정/CI에서 소스 브랜치를 얻지 못했으면 로컬 git에서 읽는다.
                let detected = gateway
                    .current_branch()
                    .await
                    .context("failed to detect current branch")?;
                use_case.reporter.kv("Source", &detected);
                detected
            } else {
                source.clone()
            };

            let Some(pr) = gateway
                .find_pull_request_by_branches(&source, &options.target_branch)
                .await?
            else {
                bail!(
                    "no open change request found for branch {} -> {}",
                    source,
                    options.target_branch
                );
            };
            Ok(pr)
        }
    }
}
