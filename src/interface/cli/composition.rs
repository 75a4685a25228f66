//! 애플리케이션 조립(composition root) 모듈.

use anyhow::Result;

use crate::application::ports::ConfigRepository;
use crate::application::usecases::review_pr::ReviewPrUseCase;
use crate::infrastructure::adapters::{
    CodeupGatewayFactory, ConsoleReporter, JsonConfigRepository, ProviderRunnerFactory,
};
use crate::infrastructure::config::{Config, DEFAULT_MAX_GUIDE_TOKENS};
use crate::infrastructure::prompts::TomlPromptStore;
use crate::infrastructure::render::MarkdownRenderer;
use crate::infrastructure::snapshot::JsonSnapshotWriter;

/// 실행 시점 의존성을 한 곳에서 조립하는 컨테이너.
pub struct AppComposition {
    config: Config,
    config_repo: JsonConfigRepository,
    gateway_factory: CodeupGatewayFactory,
    runner_factory: ProviderRunnerFactory,
    prompt_store: TomlPromptStore,
    snapshot_writer: JsonSnapshotWriter,
    renderer: MarkdownRenderer,
    reporter: ConsoleReporter,
}

impl AppComposition {
    /// 병합 설정을 읽어 경로 의존 어댑터까지 조립한다.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        let prompt_store = TomlPromptStore::new(config.prompts_dir(), DEFAULT_MAX_GUIDE_TOKENS);
        let snapshot_writer = JsonSnapshotWriter::new(config.snapshot_dir());

        Ok(Self {
            config,
            config_repo: JsonConfigRepository,
            gateway_factory: CodeupGatewayFactory,
            runner_factory: ProviderRunnerFactory,
            prompt_store,
            snapshot_writer,
            renderer: MarkdownRenderer::new(),
            reporter: ConsoleReporter::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `config` 서브커맨드 출력: 적용 중인 병합 설정의 점검 JSON.
    pub fn inspect_config_json(&self) -> Result<String> {
        self.config_repo.inspect_pretty_json()
    }

    /// 리뷰 실행 유스케이스를 생성한다.
    pub fn review_usecase(&self) -> ReviewPrUseCase<'_> {
        ReviewPrUseCase {
            config_repo: &self.config_repo,
            gateway_factory: &self.gateway_factory,
            runner_factory: &self.runner_factory,
            prompt_store: &self.prompt_store,
            snapshot_writer: &self.snapshot_writer,
            renderer: &self.renderer,
            reporter: &self.reporter,
        }
    }
}
