//! 모의 포트로 리뷰 유스케이스를 끝까지 돌리는 통합 테스트.
//!
//! 실제 YunXiao API나 모델 호출 없이 캐시 재생, 강제 재생성, 증분 범위,
//! 게시 실패 격리 같은 오케스트레이션 규칙을 검증한다.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::json;

use yunpilot::application::ports::{
    CommentRenderer, ConfigRepository, GatewayFactory, ModelError, ModelRunner,
    ModelRunnerFactory, PromptError, PromptStore, PullRequestGateway, Reporter, SnapshotWriter,
};
use yunpilot::application::usecases::review_pr::ReviewPrUseCase;
use yunpilot::domain::policy::completion_marker;
use yunpilot::domain::review::{
    CommentRecord, PostedCommentKind, PrSelector, PullRequestRef, RelatedPatchSet, ReviewMode,
    ReviewModeSet, ReviewResult, ReviewStatus, RunOptions,
};
use yunpilot::infrastructure::config::Config;
use yunpilot::infrastructure::render::MarkdownRenderer;

/// 게이트웨이 호출 기록과 캔드 응답. 팩토리가 게이트웨이를 소유하므로
/// 테스트에서 관찰할 상태는 Arc로 공유한다.
#[derive(Default)]
struct GatewayState {
    pr: Mutex<Option<PullRequestRef>>,
    comments: Mutex<Vec<CommentRecord>>,
    branch_diff: Mutex<String>,
    /// None이면 patch set diff API가 실패하는 상황을 흉내낸다.
    patch_set_diff: Mutex<Option<String>>,
    patch_set_requests: Mutex<Vec<(String, String)>>,
    created_globals: Mutex<Vec<(String, String)>>,
    created_inline: Mutex<Vec<(String, String, u32)>>,
    updates: Mutex<Vec<(String, String)>>,
    descriptions: Mutex<Vec<String>>,
    /// 1부터 세는 인라인 시도 번호 중 실패시킬 것들.
    fail_inline_attempts: Mutex<HashSet<usize>>,
    /// true면 코멘트 목록 조회가 실패하는 상황을 흉내낸다.
    fail_list_comments: AtomicBool,
    inline_attempts: AtomicUsize,
    next_id: AtomicUsize,
}

impl GatewayState {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

struct MockGateway {
    state: Arc<GatewayState>,
}

#[async_trait]
impl PullRequestGateway for MockGateway {
    async fn find_pull_request_by_branches(
        &self,
        _source: &str,
        _target: &str,
    ) -> Result<Option<PullRequestRef>> {
        Ok(self.state.pr.lock().unwrap().clone())
    }

    async fn get_pull_request(&self, local_id: u64) -> Result<PullRequestRef> {
        match self.state.pr.lock().unwrap().clone() {
            Some(pr) => Ok(pr),
            None => bail!("no change request with local id {local_id}"),
        }
    }

    async fn current_branch(&self) -> Result<String> {
        Ok("feature/retry".to_string())
    }

    async fn fetch_branch_diff(&self, _target: &str, _source: &str) -> Result<String> {
        Ok(self.state.branch_diff.lock().unwrap().clone())
    }

    async fn fetch_patch_set_diff(
        &self,
        _local_id: u64,
        from_patch_set_id: &str,
        to_patch_set_id: &str,
    ) -> Result<String> {
        self.state
            .patch_set_requests
            .lock()
            .unwrap()
            .push((from_patch_set_id.to_string(), to_patch_set_id.to_string()));
        match self.state.patch_set_diff.lock().unwrap().clone() {
            Some(diff) => Ok(diff),
            None => bail!("change tree unavailable"),
        }
    }

    async fn list_comments(&self, _local_id: u64) -> Result<Vec<CommentRecord>> {
        if self.state.fail_list_comments.load(Ordering::SeqCst) {
            bail!("comment listing unavailable");
        }
        Ok(self.state.comments.lock().unwrap().clone())
    }

    async fn create_global_comment(
        &self,
        _local_id: u64,
        content: &str,
        _patch_set_id: &str,
    ) -> Result<String> {
        let id = self.state.next_id("g");
        self.state
            .created_globals
            .lock()
            .unwrap()
            .push((id.clone(), content.to_string()));
        Ok(id)
    }

    async fn create_inline_comment(
        &self,
        _local_id: u64,
        _content: &str,
        file_path: &str,
        line_number: u32,
        _from_patch_set_id: &str,
        _to_patch_set_id: &str,
    ) -> Result<String> {
        let attempt = self.state.inline_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .state
            .fail_inline_attempts
            .lock()
            .unwrap()
            .contains(&attempt)
        {
            bail!("line {line_number} is outside the diff range");
        }
        let id = self.state.next_id("i");
        self.state.created_inline.lock().unwrap().push((
            id.clone(),
            file_path.to_string(),
            line_number,
        ));
        Ok(id)
    }

    async fn update_comment(&self, _local_id: u64, comment_id: &str, content: &str) -> Result<()> {
        self.state
            .updates
            .lock()
            .unwrap()
            .push((comment_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn update_description(
        &self,
        _local_id: u64,
        _title: &str,
        description: &str,
    ) -> Result<bool> {
        self.state
            .descriptions
            .lock()
            .unwrap()
            .push(description.to_string());
        Ok(true)
    }
}

struct MockGatewayFactory {
    state: Arc<GatewayState>,
}

impl GatewayFactory for MockGatewayFactory {
    fn build(&self, _config: &Config) -> Result<Box<dyn PullRequestGateway>> {
        Ok(Box::new(MockGateway {
            state: Arc::clone(&self.state),
        }))
    }
}

/// 호출 순서대로 캔드 응답을 돌려주는 모델 러너.
#[derive(Default)]
struct RunnerState {
    responses: Mutex<VecDeque<String>>,
    /// (system, user) 프롬프트 기록.
    calls: Mutex<Vec<(String, String)>>,
}

impl RunnerState {
    fn with_responses(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

struct MockRunner {
    state: Arc<RunnerState>,
}

#[async_trait]
impl ModelRunner for MockRunner {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _max_turns: u32,
    ) -> Result<String, ModelError> {
        self.state
            .calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        self.state
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::Invocation("no canned response left".to_string()))
    }
}

struct MockRunnerFactory {
    state: Arc<RunnerState>,
}

impl ModelRunnerFactory for MockRunnerFactory {
    fn build(&self, _config: &Config) -> Result<Box<dyn ModelRunner>> {
        Ok(Box::new(MockRunner {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConfigRepository;

impl ConfigRepository for MockConfigRepository {
    fn load(&self) -> Result<Config> {
        Ok(Config::default())
    }

    fn inspect_pretty_json(&self) -> Result<String> {
        Ok("{}".to_string())
    }
}

struct MockPromptStore;

impl PromptStore for MockPromptStore {
    fn read_system_prompt(&self, mode: ReviewMode) -> Result<String, PromptError> {
        Ok(format!("You are the {} reviewer.", mode.as_str()))
    }

    fn validate(&self, _modes: &[ReviewMode]) -> Result<(), PromptError> {
        Ok(())
    }
}

#[derive(Default)]
struct MockSnapshotWriter {
    persisted: AtomicUsize,
}

impl SnapshotWriter for MockSnapshotWriter {
    fn persist(&self, filename: &str, _result: &ReviewResult) -> Result<PathBuf> {
        self.persisted.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from(format!("/tmp/{filename}.json")))
    }
}

struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _name: &str) {}
    fn kv(&self, _key: &str, _value: &str) {}
    fn status(&self, _scope: &str, _message: &str) {}
    fn phase_status(&self, _phase: &str, _status: &str, _extra: Option<&str>) {}
    fn raw(&self, _line: &str) {}
}

fn sample_pr() -> PullRequestRef {
    PullRequestRef {
        local_id: 42,
        title: "Add retry logic to the uploader".to_string(),
        description: "Initial description.".to_string(),
        source_branch: "feature/retry".to_string(),
        target_branch: "master".to_string(),
        from_patch_set_id: "ps-1".to_string(),
        to_patch_set_id: "ps-2".to_string(),
    }
}

fn gateway_with_diff(diff: &str) -> Arc<GatewayState> {
    let state = GatewayState::default();
    *state.pr.lock().unwrap() = Some(sample_pr());
    *state.branch_diff.lock().unwrap() = diff.to_string();
    *state.patch_set_diff.lock().unwrap() = Some(diff.to_string());
    Arc::new(state)
}

/// 완료 마커를 포함한 결과 코멘트를 실제 렌더러로 만들어 심는다.
/// 캐시 복원이 렌더 형식과 라운드트립하는지도 함께 검증된다.
fn completed_comment(id: &str, mode: ReviewMode, text: &str) -> CommentRecord {
    CommentRecord {
        id: id.to_string(),
        content: MarkdownRenderer::new().render_phase_result(mode, text, 3.0),
        related_patchset: None,
    }
}

fn run_options(modes: ReviewModeSet) -> RunOptions {
    RunOptions {
        selector: PrSelector::LocalId(42),
        target_branch: "master".to_string(),
        modes,
        force_regenerate: false,
        dry_run: false,
    }
}

async fn run_review(
    gateway: &Arc<GatewayState>,
    runner: &Arc<RunnerState>,
    options: RunOptions,
) -> Result<ReviewResult> {
    let config_repo = MockConfigRepository;
    let gateway_factory = MockGatewayFactory {
        state: Arc::clone(gateway),
    };
    let runner_factory = MockRunnerFactory {
        state: Arc::clone(runner),
    };
    let prompt_store = MockPromptStore;
    let snapshot_writer = MockSnapshotWriter::default();
    let renderer = MarkdownRenderer::new();
    let reporter = NullReporter;

    let use_case = ReviewPrUseCase {
        config_repo: &config_repo,
        gateway_factory: &gateway_factory,
        runner_factory: &runner_factory,
        prompt_store: &prompt_store,
        snapshot_writer: &snapshot_writer,
        renderer: &renderer,
        reporter: &reporter,
    };
    use_case.execute(options).await
}

const SAMPLE_DIFF: &str = "--- a/src/app.py\n+++ b/src/app.py\n@@ +3,-1 @@\n+retry()\n";

#[tokio::test]
async fn cached_phases_replay_without_model_calls() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    *gateway.comments.lock().unwrap() = vec![
        completed_comment("c-sum", ReviewMode::Summary, "Cached summary text."),
        completed_comment("c-ana", ReviewMode::Analysis, "Cached analysis text."),
        completed_comment("c-com", ReviewMode::Comments, "Cached comments text."),
    ];
    let runner = RunnerState::with_responses(&[]);

    let result = run_review(&gateway, &runner, run_options(ReviewModeSet::all()))
        .await
        .unwrap();

    // 전 단계 캐시 적중: 모델 호출도 코멘트 쓰기도 전혀 일어나지 않는다.
    assert_eq!(runner.call_count(), 0);
    assert_eq!(result.summary, "Cached summary text.");
    assert_eq!(result.analysis, "Cached analysis text.");
    assert!(gateway.created_globals.lock().unwrap().is_empty());
    assert!(gateway.created_inline.lock().unwrap().is_empty());
    assert!(gateway.updates.lock().unwrap().is_empty());
    // 캐시된 comments 단계는 인라인 재게시도 하지 않는다.
    assert!(result.comments.is_empty());
    assert_eq!(result.metadata.comments_posted, 0);
    assert!(matches!(result.status, ReviewStatus::Completed));

    // 설명 재작성은 코멘트 쓰기가 아니므로 캐시 적중에도 반복된다(멱등).
    let descriptions = gateway.descriptions.lock().unwrap();
    assert_eq!(descriptions.len(), 1);
    assert!(descriptions[0].contains("Cached summary text."));
}

#[tokio::test]
async fn cached_summary_still_rewrites_description() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    *gateway.comments.lock().unwrap() = vec![completed_comment(
        "c-sum",
        ReviewMode::Summary,
        "Cached summary text.",
    )];
    let runner = RunnerState::with_responses(&[]);

    let result = run_review(
        &gateway,
        &runner,
        run_options(ReviewModeSet::from_labels("summary").unwrap()),
    )
    .await
    .unwrap();

    // 첫 실행의 설명 갱신이 실패했거나 되돌려졌어도 캐시 재실행이 복구한다.
    assert_eq!(runner.call_count(), 0);
    assert_eq!(result.summary, "Cached summary text.");
    let descriptions = gateway.descriptions.lock().unwrap();
    assert!(!descriptions.is_empty());
    assert!(descriptions[0].contains("Cached summary text."));
    // 결과 코멘트 자체는 손대지 않는다.
    assert!(gateway.created_globals.lock().unwrap().is_empty());
    assert!(gateway.updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn force_regenerate_updates_the_same_comment() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    *gateway.comments.lock().unwrap() = vec![completed_comment(
        "c-sum",
        ReviewMode::Summary,
        "Stale summary.",
    )];
    let runner = RunnerState::with_responses(&["Fresh summary of the change."]);

    let mut options = run_options(ReviewModeSet::from_labels("summary").unwrap());
    options.force_regenerate = true;
    let result = run_review(&gateway, &runner, options).await.unwrap();

    assert_eq!(runner.call_count(), 1);
    assert_eq!(result.summary, "Fresh summary of the change.");

    // 발견한 기존 코멘트 id를 재사용해 갱신한다. 새 글로벌 코멘트는 없다.
    assert!(gateway.created_globals.lock().unwrap().is_empty());
    let updates = gateway.updates.lock().unwrap();
    assert!(!updates.is_empty());
    assert!(updates.iter().all(|(id, _)| id == "c-sum"));
    let final_body = &updates.last().unwrap().1;
    assert!(final_body.contains(&completion_marker(ReviewMode::Summary)));
    assert!(final_body.contains("Fresh summary of the change."));

    // 새로 생성된 summary는 PR 설명에도 반영된다.
    let descriptions = gateway.descriptions.lock().unwrap();
    assert_eq!(descriptions.len(), 1);
    assert!(descriptions[0].contains("Fresh summary of the change."));
    assert!(descriptions[0].contains("Initial description."));
}

#[tokio::test]
async fn incremental_scope_skips_summary_and_spans_reviewed_range() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    // 이전 실행이 ps-old 리비전에 남긴 인라인 코멘트 흔적.
    *gateway.comments.lock().unwrap() = vec![CommentRecord {
        id: "old-inline".to_string(),
        content: "**[style]** prefer a context manager".to_string(),
        related_patchset: Some(RelatedPatchSet {
            version_no: 3,
            patch_set_id: "ps-old".to_string(),
        }),
    }];
    let runner = RunnerState::with_responses(&["Deep analysis.", r#"{"comments": []}"#]);

    let result = run_review(&gateway, &runner, run_options(ReviewModeSet::all()))
        .await
        .unwrap();

    // summary는 증분 실행에서 강제 제외되어 모델 호출은 2회뿐이다.
    assert_eq!(runner.call_count(), 2);
    assert_eq!(result.summary, "");
    assert_eq!(result.analysis, "Deep analysis.");
    assert_eq!(result.modes, vec!["analysis", "comments"]);

    // diff는 마지막 리뷰 리비전부터 현재 리비전까지를 요청한다.
    let requests = gateway.patch_set_requests.lock().unwrap();
    assert_eq!(requests[0], ("ps-old".to_string(), "ps-2".to_string()));

    // 증분 diff가 프롬프트에 그대로 들어간다.
    let calls = runner.calls.lock().unwrap();
    assert!(calls[0].1.contains(SAMPLE_DIFF.trim()));
}

#[tokio::test]
async fn empty_diff_short_circuits_without_side_effects() {
    let gateway = gateway_with_diff("");
    let runner = RunnerState::with_responses(&[]);

    let result = run_review(&gateway, &runner, run_options(ReviewModeSet::all()))
        .await
        .unwrap();

    assert!(matches!(result.status, ReviewStatus::NoChanges));
    assert_eq!(result.pr_id, 42);
    assert_eq!(runner.call_count(), 0);
    assert!(gateway.created_globals.lock().unwrap().is_empty());
    assert!(gateway.created_inline.lock().unwrap().is_empty());
    assert!(gateway.updates.lock().unwrap().is_empty());
    assert!(gateway.descriptions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn model_failure_posts_error_comment_and_fails_the_run() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    // 캔드 응답이 없으므로 첫 모델 호출이 실패한다.
    let runner = RunnerState::with_responses(&[]);

    let err = run_review(
        &gateway,
        &runner,
        run_options(ReviewModeSet::from_labels("summary").unwrap()),
    )
    .await
    .unwrap_err();
    assert!(format!("{err:#}").contains("model invocation failed"));

    // 실패 사실은 별도 코멘트로 남되, 완료 마커가 없어야
    // 다음 실행에서 캐시로 오인되지 않는다.
    let globals = gateway.created_globals.lock().unwrap();
    let error_body = globals
        .iter()
        .map(|(_, body)| body)
        .find(|body| body.contains("Summary phase failed"))
        .expect("an error comment should be posted");
    assert!(!error_body.contains(&completion_marker(ReviewMode::Summary)));
}

#[tokio::test]
async fn comment_listing_failure_degrades_to_full_review() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    gateway.fail_list_comments.store(true, Ordering::SeqCst);
    let runner =
        RunnerState::with_responses(&["Summary.", "Analysis.", r#"{"comments": []}"#]);

    let result = run_review(&gateway, &runner, run_options(ReviewModeSet::all()))
        .await
        .unwrap();

    // 증분/캐시 판단 근거가 없으니 전체 리뷰로 진행한다. summary도 유지된다.
    assert!(matches!(result.status, ReviewStatus::Completed));
    assert_eq!(runner.call_count(), 3);
    assert_eq!(result.modes, vec!["summary", "analysis", "comments"]);
    let requests = gateway.patch_set_requests.lock().unwrap();
    assert_eq!(requests[0], ("ps-1".to_string(), "ps-2".to_string()));
}

#[tokio::test]
async fn prose_output_still_yields_a_global_comment() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    let runner = RunnerState::with_responses(&[
        "Sure, here's my review: check error handling around the retry loop in app.py",
    ]);

    let result = run_review(
        &gateway,
        &runner,
        run_options(ReviewModeSet::from_labels("comments").unwrap()),
    )
    .await
    .unwrap();

    // JSON도 라인 규약도 아닌 산문이라도 내용은 글로벌 코멘트로 살아남는다.
    assert_eq!(result.comments.len(), 1);
    assert!(matches!(result.comments[0].kind, PostedCommentKind::Global));
    assert!(result.comments[0].comment_id.is_some());
    assert_eq!(result.metadata.comments_posted, 1);

    let globals = gateway.created_globals.lock().unwrap();
    assert!(
        globals
            .iter()
            .any(|(_, body)| body.contains("check error handling around the retry loop"))
    );
}

#[tokio::test]
async fn suggestions_without_line_anchor_demote_to_global() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    let response = json!({
        "comments": [
            {
                "file": "src/app.py",
                "line": 5,
                "category": "style",
                "summary": "use with-statement",
                "content": "Open the file with a context manager."
            },
            {
                "file": "src/app.py",
                "line": null,
                "category": "correctness",
                "content": "The retry count is never decremented."
            }
        ]
    })
    .to_string();
    let runner = RunnerState::with_responses(&[response.as_str()]);

    let result = run_review(
        &gateway,
        &runner,
        run_options(ReviewModeSet::from_labels("comments").unwrap()),
    )
    .await
    .unwrap();

    let inline = gateway.created_inline.lock().unwrap();
    assert_eq!(inline.len(), 1);
    assert_eq!(inline[0].1, "src/app.py");
    assert_eq!(inline[0].2, 5);

    assert_eq!(result.comments.len(), 2);
    let kinds: Vec<bool> = result
        .comments
        .iter()
        .map(|c| matches!(c.kind, PostedCommentKind::Inline))
        .collect();
    assert_eq!(kinds.iter().filter(|k| **k).count(), 1);

    // 라인 미상 제안은 인라인 API로 절대 가지 않는다.
    let globals = gateway.created_globals.lock().unwrap();
    assert!(
        globals
            .iter()
            .any(|(_, body)| body.contains("The retry count is never decremented."))
    );
}

#[tokio::test]
async fn analysis_prompt_embeds_summary_text() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    let runner = RunnerState::with_responses(&["SUMMARY-SENTINEL-91", "Analysis text."]);

    let result = run_review(
        &gateway,
        &runner,
        run_options(ReviewModeSet::from_labels("summary,analysis").unwrap()),
    )
    .await
    .unwrap();

    assert_eq!(runner.call_count(), 2);
    assert_eq!(result.summary, "SUMMARY-SENTINEL-91");

    // analysis 프롬프트는 summary의 결과 원문을 컨텍스트로 포함한다.
    let calls = runner.calls.lock().unwrap();
    assert!(calls[1].1.contains("SUMMARY-SENTINEL-91"));
    // 시스템 프롬프트는 단계별로 다르게 주입된다.
    assert!(calls[0].0.contains("summary"));
    assert!(calls[1].0.contains("analysis"));
}

#[tokio::test]
async fn inline_posting_failure_does_not_abort_the_batch() {
    let gateway = gateway_with_diff(SAMPLE_DIFF);
    gateway.fail_inline_attempts.lock().unwrap().insert(4);

    let items: Vec<_> = (1..=10)
        .map(|i| {
            json!({
                "file": format!("src/file_{i}.py"),
                "line": i * 10,
                "category": "style",
                "content": format!("Issue number {i}.")
            })
        })
        .collect();
    let response = json!({ "comments": items }).to_string();
    let runner = RunnerState::with_responses(&[response.as_str()]);

    let result = run_review(
        &gateway,
        &runner,
        run_options(ReviewModeSet::from_labels("comments").unwrap()),
    )
    .await
    .unwrap();

    // 4번째 실패는 격리되고 나머지 9건은 모두 게시된다.
    assert_eq!(gateway.inline_attempts.load(Ordering::SeqCst), 10);
    assert_eq!(gateway.created_inline.lock().unwrap().len(), 9);
    assert_eq!(result.comments.len(), 10);
    assert_eq!(result.metadata.comments_posted, 9);

    // 최종 comments 코멘트는 게시/시도 수를 정직하게 보고한다.
    let updates = gateway.updates.lock().unwrap();
    let final_body = &updates.last().unwrap().1;
    assert!(final_body.contains("9/10"));
}
