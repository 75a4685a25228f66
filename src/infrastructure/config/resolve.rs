//! 설정 값(token/env)을 실제 런타임 값으로 해석하는 유틸리티.
//!
//! 환경변수 접근은 이 모듈에만 둔다. 코어 로직은 해석된 값을 주입받는다.

use std::env;

use super::types::{DefaultsConfig, HostConfig, ProviderConfig};

/// 토큰/키 해석 결과. 진단 출력용 source 라벨을 함께 담는다.
#[derive(Debug, Clone)]
pub struct CredentialResolution {
    pub credential: Option<String>,
    pub source: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn resolve_inline_or_env(inline: Option<&str>, env_name: Option<&str>) -> CredentialResolution {
    if let Some(value) = non_empty(inline) {
        return CredentialResolution {
            credential: Some(value.to_string()),
            source: Some("inline".to_string()),
        };
    }

    let Some(env_name) = non_empty(env_name) else {
        return CredentialResolution {
            credential: None,
            source: None,
        };
    };

    match env::var(env_name).ok().map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => CredentialResolution {
            credential: Some(v),
            source: Some(format!("env:{env_name}")),
        },
        _ => CredentialResolution {
            credential: None,
            source: Some(format!("env:{env_name} (missing)")),
        },
    }
}

/// 호스트 API 토큰을 해석한다.
pub fn resolve_host_token(cfg: &HostConfig) -> CredentialResolution {
    resolve_inline_or_env(cfg.token.as_deref(), cfg.token_env.as_deref())
}

/// provider API key를 해석한다.
pub fn resolve_provider_api_key(cfg: &ProviderConfig) -> CredentialResolution {
    resolve_inline_or_env(cfg.api_key.as_deref(), cfg.api_key_env.as_deref())
}

/// 리뷰 소스 브랜치를 설정 고정값 → CI 환경변수 순으로 해석한다.
/// 둘 다 없으면 None이며, 호출 측은 로컬 git 폴백을 쓴다.
pub fn resolve_source_branch(defaults: &DefaultsConfig) -> Option<String> {
    if let Some(branch) = non_empty(defaults.source_branch.as_deref()) {
        return Some(branch.to_string());
    }
    let env_name = non_empty(defaults.source_branch_env.as_deref())?;
    env::var(env_name).ok().filter(|v| !v.trim().is_empty())
}
