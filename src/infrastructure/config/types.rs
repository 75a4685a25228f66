//! 설정 스키마와 병합 규칙.
//!
//! 주의: 환경변수/파일 접근은 loader/resolve에서만 수행하고,
//! 코어 로직은 이미 해석된 값을 주입받는다.

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST_DOMAIN: &str = "openapi-rdc.aliyuncs.com";
pub const DEFAULT_TARGET_BRANCH: &str = "master";
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_SNAPSHOT_DIR: &str = "./tmp";
pub const DEFAULT_MAX_PROMPT_TOKENS: usize = 50_000;
pub const DEFAULT_MAX_TURNS: u32 = 2;
/// REVIEW.md 지침 파일에 허용하는 추정 토큰 상한.
pub const DEFAULT_MAX_GUIDE_TOKENS: usize = 10_000;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// 전역 기본값
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// YunXiao Codeup 호스트 설정
    #[serde(default)]
    pub host: HostConfig,
    /// 모델 provider 실행 설정
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DefaultsConfig {
    /// 리뷰 타깃 브랜치(기본 master)
    pub target_branch: Option<String>,
    /// 리뷰 소스 브랜치 고정값(미지정 시 env/git에서 해석)
    pub source_branch: Option<String>,
    /// 소스 브랜치를 읽을 CI 환경변수 이름(예: CI_COMMIT_REF_NAME)
    pub source_branch_env: Option<String>,
    /// 단계 프롬프트 TOML 디렉터리
    pub prompts_dir: Option<String>,
    /// 결과 스냅샷 저장 디렉터리
    pub snapshot_dir: Option<String>,
    /// system+user 프롬프트 합산 토큰 한도(추정치 기준)
    pub max_prompt_tokens: Option<usize>,
    /// 모델 호출 최대 턴 수
    pub max_turns: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct HostConfig {
    /// API 도메인(기본 openapi-rdc.aliyuncs.com)
    pub domain: Option<String>,
    pub organization_id: Option<String>,
    pub repository_id: Option<String>,
    /// 고정 토큰(민감정보: 권장하지 않음)
    pub token: Option<String>,
    /// 토큰을 읽을 환경변수 이름(예: ALI_YUNXIAO_TOKEN)
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProvidersConfig {
    pub claude: Option<ProviderConfig>,
    pub openai: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProviderConfig {
    /// provider 활성화 여부(기본 true)
    pub enabled: Option<bool>,
    /// CLI 모드: 실행할 로컬 명령
    pub command: Option<String>,
    /// CLI 모드: 명령 인자
    pub args: Option<Vec<String>>,
    /// CLI 모드: 프롬프트를 stdin으로 전달할지 여부(기본 true)
    pub use_stdin: Option<bool>,

    /// API 모드: 모델 식별자
    pub model: Option<String>,
    /// API 모드: 베이스 URL
    pub api_base: Option<String>,
    /// API 모드: 인증 키(직접값)
    pub api_key: Option<String>,
    /// API 모드: 인증 키를 읽을 환경변수 이름
    pub api_key_env: Option<String>,
    /// API 모드: 샘플링 온도
    pub temperature: Option<f32>,
}

/// provider CLI 실행 사양.
#[derive(Debug, Clone)]
pub struct ProviderCommandSpec {
    pub command: String,
    pub args: Vec<String>,
    pub use_stdin: bool,
}

impl Config {
    pub fn target_branch(&self) -> &str {
        self.defaults
            .target_branch
            .as_deref()
            .unwrap_or(DEFAULT_TARGET_BRANCH)
    }

    pub fn prompts_dir(&self) -> &str {
        self.defaults
            .prompts_dir
            .as_deref()
            .unwrap_or(DEFAULT_PROMPTS_DIR)
    }

    pub fn snapshot_dir(&self) -> &str {
        self.defaults
            .snapshot_dir
            .as_deref()
            .unwrap_or(DEFAULT_SNAPSHOT_DIR)
    }

    pub fn max_prompt_tokens(&self) -> usize {
        self.defaults
            .max_prompt_tokens
            .unwrap_or(DEFAULT_MAX_PROMPT_TOKENS)
    }

    pub fn max_turns(&self) -> u32 {
        self.defaults.max_turns.unwrap_or(DEFAULT_MAX_TURNS)
    }

    /// 후순위(나중 파일) 값으로 덮어쓰는 병합 규칙.
    pub(crate) fn merge_from(&mut self, other: Config) {
        self.defaults.merge_from(other.defaults);
        self.host.merge_from(other.host);
        self.providers.merge_from(other.providers);
    }
}

impl DefaultsConfig {
    pub(crate) fn merge_from(&mut self, other: DefaultsConfig) {
        if other.target_branch.is_some() {
            self.target_branch = other.target_branch;
        }
        if other.source_branch.is_some() {
            self.source_branch = other.source_branch;
        }
        if other.source_branch_env.is_some() {
            self.source_branch_env = other.source_branch_env;
        }
        if other.prompts_dir.is_some() {
            self.prompts_dir = other.prompts_dir;
        }
        if other.snapshot_dir.is_some() {
            self.snapshot_dir = other.snapshot_dir;
        }
        if other.max_prompt_tokens.is_some() {
            self.max_prompt_tokens = other.max_prompt_tokens;
        }
        if other.max_turns.is_some() {
            self.max_turns = other.max_turns;
        }
    }
}

impl HostConfig {
    pub fn domain(&self) -> &str {
        self.domain.as_deref().unwrap_or(DEFAULT_HOST_DOMAIN)
    }

    pub(crate) fn merge_from(&mut self, other: HostConfig) {
        if other.domain.is_some() {
            self.domain = other.domain;
        }
        if other.organization_id.is_some() {
            self.organization_id = other.organization_id;
        }
        if other.repository_id.is_some() {
            self.repository_id = other.repository_id;
        }
        if other.token.is_some() {
            self.token = other.token;
        }
        if other.token_env.is_some() {
            self.token_env = other.token_env;
        }
    }
}

impl ProviderConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// provider 실행 사양(명령/인자/stdin)을 정규화한다.
    pub fn command_spec(&self, default_command: &str) -> Option<ProviderCommandSpec> {
        if !self.is_enabled() {
            return None;
        }

        Some(ProviderCommandSpec {
            command: self
                .command
                .clone()
                .unwrap_or_else(|| default_command.to_string()),
            args: self.args.clone().unwrap_or_default(),
            use_stdin: self.use_stdin.unwrap_or(true),
        })
    }

    pub(crate) fn merge_from(&mut self, other: ProviderConfig) {
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if other.command.is_some() {
            self.command = other.command;
        }
        if other.args.is_some() {
            self.args = other.args;
        }
        if other.use_stdin.is_some() {
            self.use_stdin = other.use_stdin;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.api_base.is_some() {
            self.api_base = other.api_base;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.api_key_env.is_some() {
            self.api_key_env = other.api_key_env;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
    }
}

impl ProvidersConfig {
    pub(crate) fn merge_from(&mut self, other: ProvidersConfig) {
        merge_provider_config(&mut self.claude, other.claude);
        merge_provider_config(&mut self.openai, other.openai);
    }
}

fn merge_provider_config(target: &mut Option<ProviderConfig>, incoming: Option<ProviderConfig>) {
    match (target.as_mut(), incoming) {
        (Some(existing), Some(next)) => existing.merge_from(next),
        (None, Some(next)) => *target = Some(next),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_later_values() {
        let mut base = Config::default();
        base.defaults.target_branch = Some("master".into());
        base.host.organization_id = Some("org-a".into());

        let mut overlay = Config::default();
        overlay.defaults.target_branch = Some("main".into());
        overlay.host.token_env = Some("ALI_YUNXIAO_TOKEN".into());

        base.merge_from(overlay);
        assert_eq!(base.target_branch(), "main");
        assert_eq!(base.host.organization_id.as_deref(), Some("org-a"));
        assert_eq!(base.host.token_env.as_deref(), Some("ALI_YUNXIAO_TOKEN"));
    }

    #[test]
    fn effective_defaults_fall_back() {
        let config = Config::default();
        assert_eq!(config.target_branch(), DEFAULT_TARGET_BRANCH);
        assert_eq!(config.max_prompt_tokens(), DEFAULT_MAX_PROMPT_TOKENS);
        assert_eq!(config.max_turns(), DEFAULT_MAX_TURNS);
        assert_eq!(config.host.domain(), DEFAULT_HOST_DOMAIN);
    }
}
