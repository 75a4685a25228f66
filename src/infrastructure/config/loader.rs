//! 설정 파일 탐색/병합 로더.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;

use super::types::{
    Config, DEFAULT_MAX_PROMPT_TOKENS, DEFAULT_MAX_TURNS, DEFAULT_TARGET_BRANCH,
};

#[derive(Debug, Clone)]
pub(crate) struct LoadedConfig {
    pub config: Config,
    pub searched_paths: Vec<PathBuf>,
    pub loaded_paths: Vec<PathBuf>,
}

/// 우선순위 경로를 순회해 JSON 설정을 병합한다.
pub(crate) fn load_merged_config() -> Result<LoadedConfig> {
    // 낮은 우선순위에서 높은 우선순위 순서로 병합한다.
    let mut merged = Config::default();
    let mut loaded_paths = Vec::new();
    let paths = config_paths();

    if let Ok(path) = env::var("YUNPILOT_CONFIG")
        && !Path::new(&path).exists()
    {
        bootstrap_template_bundle(Path::new(&path))?;
    }

    for path in &paths {
        if !path.exists() {
            continue;
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let parsed: Config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse JSON in {}", path.display()))?;
        merged.merge_from(parsed);
        loaded_paths.push(path.to_path_buf());
    }

    if loaded_paths.is_empty() {
        // 최초 실행 경험을 위해 로컬 기본 설정 템플릿을 자동 생성한다.
        let bootstrap_target = default_bootstrap_config_path();
        bootstrap_template_bundle(&bootstrap_target)?;

        let raw = fs::read_to_string(&bootstrap_target).with_context(|| {
            format!(
                "failed to read bootstrapped config at {}",
                bootstrap_target.display()
            )
        })?;
        let parsed: Config = serde_json::from_str(&raw).with_context(|| {
            format!(
                "failed to parse bootstrapped JSON in {}",
                bootstrap_target.display()
            )
        })?;
        merged.merge_from(parsed);
        loaded_paths.push(bootstrap_target);
    }

    Ok(LoadedConfig {
        config: merged,
        searched_paths: paths,
        loaded_paths,
    })
}

/// 기본 + 사용자 + 프로젝트 + 명시 경로 순으로 병합 경로를 구성한다.
pub fn config_paths() -> Vec<PathBuf> {
    // 낮은 우선순위 -> 높은 우선순위 순서로 병합됨.
    let mut paths = vec![PathBuf::from("/etc/yunpilot/config.json")];

    if let Some(base) = dirs::config_dir() {
        paths.push(base.join("yunpilot").join("config.json"));
    }

    paths.push(PathBuf::from(".yunpilot/config.json"));

    if let Ok(path) = env::var("YUNPILOT_CONFIG") {
        paths.push(Path::new(&path).to_path_buf());
    }

    dedup_paths(paths)
}

fn default_bootstrap_config_path() -> PathBuf {
    if let Ok(path) = env::var("YUNPILOT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(".yunpilot/config.json")
}

fn bootstrap_template_bundle(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        return Ok(());
    }

    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let prompts_dir = default_prompts_dir(config_path);
    bootstrap_prompt_templates(&prompts_dir)?;

    let template = json!({
        "defaults": {
            "target_branch": DEFAULT_TARGET_BRANCH,
            "source_branch_env": "CI_COMMIT_REF_NAME",
            "prompts_dir": prompts_dir.display().to_string(),
            "snapshot_dir": "./tmp",
            "max_prompt_tokens": DEFAULT_MAX_PROMPT_TOKENS,
            "max_turns": DEFAULT_MAX_TURNS
        },
        "host": {
            "domain": "openapi-rdc.aliyuncs.com",
            "organization_id": "",
            "repository_id": "",
            "token_env": "ALI_YUNXIAO_TOKEN"
        },
        "providers": {
            "claude": {
                "enabled": true,
                "command": "claude",
                "args": [],
                "use_stdin": true
            },
            "openai": {
                "enabled": true,
                "api_key_env": "OPENAI_API_KEY",
                "model": "gpt-4o",
                "temperature": 0.8
            }
        }
    });

    let rendered = serde_json::to_string_pretty(&template)?;
    fs::write(config_path, format!("{rendered}\n"))
        .with_context(|| format!("failed to create config template at {}", config_path.display()))
}

fn default_prompts_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join("prompts"),
        _ => PathBuf::from("prompts"),
    }
}

/// 단계별 시스템 프롬프트 TOML 템플릿을 생성한다. 기존 파일은 보존한다.
fn bootstrap_prompt_templates(prompts_dir: &Path) -> Result<()> {
    fs::create_dir_all(prompts_dir)
        .with_context(|| format!("failed to create directory {}", prompts_dir.display()))?;

    for (stage, body) in [
        ("summary", SUMMARY_PROMPT_TEMPLATE),
        ("analysis", ANALYSIS_PROMPT_TEMPLATE),
        ("comments", COMMENTS_PROMPT_TEMPLATE),
    ] {
        let path = prompts_dir.join(format!("{stage}.toml"));
        if path.exists() {
            continue;
        }
        fs::write(&path, body)
            .with_context(|| format!("failed to create prompt template at {}", path.display()))?;
    }

    Ok(())
}

const SUMMARY_PROMPT_TEMPLATE: &str = r#"[prompt]
system_prompt = """
You are an experienced reviewer. Generate a concise, accurate summary of the
pull request: its intent, scope, and the nature of the changes. Use Markdown
bullet points. Do not speculate beyond the diff.
"""
"#;

const ANALYSIS_PROMPT_TEMPLATE: &str = r#"[prompt]
system_prompt = """
You are a strict senior code reviewer. Using the provided summary and diff,
identify potential issues, risky areas, and improvement suggestions. Structure
the output with sections: Risks, Findings, Suggestions.
"""
"#;

const COMMENTS_PROMPT_TEMPLATE: &str = r#"[prompt]
system_prompt = """
You propose inline review comments for a pull request. Return STRICT JSON with
a top-level "comments" array. Each item: "file", "line", "category",
"summary", "content", optional "improved_code". JSON only, no extra prose.
"""
"#;

fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for p in paths {
        if !out.contains(&p) {
            out.push(p);
        }
    }
    out
}
