//! CLI 명령 파싱 모듈.

use clap::{Parser, Subcommand};

use crate::domain::review::{PrSelector, ReviewModeSet, RunOptions};
use crate::infrastructure::config::{Config, resolve_source_branch};

#[derive(Debug, Parser)]
#[command(name = "yunpilot")]
#[command(about = "Multi-phase AI review for YunXiao Codeup change requests")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Review a specific change request by its local id
    #[arg(long)]
    pr_id: Option<u64>,

    /// Source branch (defaults to config/CI, then the current git branch)
    #[arg(long)]
    source_branch: Option<String>,

    /// Target branch (defaults to config, then master)
    #[arg(long)]
    target_branch: Option<String>,

    /// Comma-separated phases to run: summary,analysis,comments (default all)
    #[arg(long)]
    modes: Option<String>,

    /// Re-run phases even when a completed result comment exists
    #[arg(long)]
    force: bool,

    /// Print comment bodies to stdout, do not post
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show effective merged config and provider availability
    Config,
}

pub enum CliAction {
    InspectConfig,
    Review(ReviewArgs),
}

/// 설정 기본값과 합쳐지기 전의 CLI 리뷰 인자.
#[derive(Debug)]
pub struct ReviewArgs {
    pr_id: Option<u64>,
    source_branch: Option<String>,
    target_branch: Option<String>,
    modes: Option<String>,
    force: bool,
    dry_run: bool,
}

impl Cli {
    pub fn parse_action() -> CliAction {
        let cli = Cli::parse();

        match cli.command {
            Some(Commands::Config) => CliAction::InspectConfig,
            None => CliAction::Review(ReviewArgs {
                pr_id: cli.pr_id,
                source_branch: cli.source_branch,
                target_branch: cli.target_branch,
                modes: cli.modes,
                force: cli.force,
                dry_run: cli.dry_run,
            }),
        }
    }
}

impl ReviewArgs {
    /// CLI 인자 > 설정 > 기본값 순으로 실행 옵션을 확정한다.
    pub fn into_run_options(self, config: &Config) -> Result<RunOptions, String> {
        let modes = match self.modes.as_deref() {
            Some(labels) => ReviewModeSet::from_labels(labels)?,
            None => ReviewModeSet::all(),
        };

        let selector = match self.pr_id {
            Some(local_id) => PrSelector::LocalId(local_id),
            None => PrSelector::Branches {
                // 빈 문자열이면 게이트웨이가 로컬 git에서 현재 브랜치를 읽는다.
                source: self
                    .source_branch
                    .or_else(|| resolve_source_branch(&config.defaults))
                    .unwrap_or_default(),
            },
        };

        Ok(RunOptions {
            selector,
            target_branch: self
                .target_branch
                .unwrap_or_else(|| config.target_branch().to_string()),
            modes,
            force_regenerate: self.force,
            dry_run: self.dry_run,
        })
    }
}
