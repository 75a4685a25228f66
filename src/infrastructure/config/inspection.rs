//! 적용 설정 진단(inspection) 뷰 모델.

use serde::Serialize;

use super::loader::LoadedConfig;
use super::resolve::{resolve_host_token, resolve_provider_api_key, resolve_source_branch};
use super::types::{DefaultsConfig, ProviderConfig};
use super::utils::command_exists;

#[derive(Debug, Clone, Serialize)]
pub struct ConfigInspection {
    pub searched_paths: Vec<String>,
    pub loaded_paths: Vec<String>,
    pub defaults: DefaultsConfig,
    pub effective_defaults: EffectiveDefaults,
    pub host: HostInspection,
    pub providers: ProvidersInspection,
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveDefaults {
    pub target_branch: String,
    pub source_branch: Option<String>,
    pub prompts_dir: String,
    pub snapshot_dir: String,
    pub max_prompt_tokens: usize,
    pub max_turns: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostInspection {
    pub domain: String,
    pub organization_id: Option<String>,
    pub repository_id: Option<String>,
    pub token_source: Option<String>,
    pub token_resolved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvidersInspection {
    pub claude: Option<ProviderInspection>,
    pub openai: Option<ProviderInspection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderInspection {
    pub enabled: bool,
    pub resolved_mode: String,
    pub runnable: bool,
    pub command: Option<String>,
    pub command_available: bool,
    pub api_key_source: Option<String>,
    pub api_key_resolved: bool,
}

impl ConfigInspection {
    pub(crate) fn from_loaded(loaded: LoadedConfig) -> Self {
        let config = &loaded.config;
        let token = resolve_host_token(&config.host);

        Self {
            searched_paths: loaded
                .searched_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            loaded_paths: loaded
                .loaded_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            defaults: config.defaults.clone(),
            effective_defaults: EffectiveDefaults {
                target_branch: config.target_branch().to_string(),
                source_branch: resolve_source_branch(&config.defaults),
                prompts_dir: config.prompts_dir().to_string(),
                snapshot_dir: config.snapshot_dir().to_string(),
                max_prompt_tokens: config.max_prompt_tokens(),
                max_turns: config.max_turns(),
            },
            host: HostInspection {
                domain: config.host.domain().to_string(),
                organization_id: config.host.organization_id.clone(),
                repository_id: config.host.repository_id.clone(),
                token_source: token.source,
                token_resolved: token.credential.is_some(),
            },
            providers: ProvidersInspection {
                claude: config
                    .providers
                    .claude
                    .as_ref()
                    .map(|cfg| ProviderInspection::from_config(cfg, "claude")),
                openai: config
                    .providers
                    .openai
                    .as_ref()
                    .map(|cfg| ProviderInspection::from_config(cfg, "openai")),
            },
        }
    }
}

impl ProviderInspection {
    fn from_config(cfg: &ProviderConfig, default_command: &str) -> Self {
        let enabled = cfg.is_enabled();
        let api_resolution = resolve_provider_api_key(cfg);
        let api_ready = api_resolution.credential.is_some();
        let command_spec = cfg.command_spec(default_command);
        let command = command_spec.as_ref().map(|s| s.command.clone());
        let command_available = command
            .as_ref()
            .map(|c| command_exists(c))
            .unwrap_or(false);

        let resolved_mode = if !enabled {
            "disabled"
        } else if api_ready {
            "api"
        } else {
            "cli"
        };

        Self {
            enabled,
            resolved_mode: resolved_mode.to_string(),
            runnable: enabled && (api_ready || command_available),
            command,
            command_available,
            api_key_source: api_resolution.source,
            api_key_resolved: api_ready,
        }
    }
}
