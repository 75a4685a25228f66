//! 단계별 시스템 프롬프트 저장소(TOML) 구현.
//! `<phase>.toml`의 `[prompt] system_prompt`를 읽고,
//! analysis/comments 단계에는 저장소 리뷰 지침(REVIEW.md)을 덧붙인다.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::application::ports::{PromptError, PromptStore};
use crate::domain::policy::estimate_tokens;
use crate::domain::review::ReviewMode;

const GUIDE_FILENAME: &str = "REVIEW.md";
const GUIDE_TRUNCATION_MARKER: &str = "\n\n[... content truncated due to token limit ...]";

#[derive(Debug, Deserialize)]
struct PromptFile {
    prompt: PromptSection,
}

#[derive(Debug, Deserialize)]
struct PromptSection {
    system_prompt: String,
}

pub struct TomlPromptStore {
    prompts_dir: PathBuf,
    max_guide_tokens: usize,
    // REVIEW.md는 단계마다 다시 읽지 않도록 1회 탐색 결과를 캐싱한다.
    guide_cache: OnceLock<Option<String>>,
}

impl TomlPromptStore {
    pub fn new(prompts_dir: impl Into<PathBuf>, max_guide_tokens: usize) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            max_guide_tokens,
            guide_cache: OnceLock::new(),
        }
    }

    fn prompt_path(&self, mode: ReviewMode) -> PathBuf {
        self.prompts_dir.join(format!("{}.toml", mode.as_str()))
    }

    fn read_prompt_file(&self, mode: ReviewMode) -> Result<String, PromptError> {
        let path = self.prompt_path(mode);
        if !path.is_file() {
            return Err(PromptError::NotFound(mode.as_str().to_string()));
        }

        let raw = fs::read_to_string(&path).map_err(|err| PromptError::Invalid {
            phase: mode.as_str().to_string(),
            reason: format!("failed to read {}: {err}", path.display()),
        })?;

        let file: PromptFile = toml::from_str(&raw).map_err(|err| PromptError::Invalid {
            phase: mode.as_str().to_string(),
            reason: format!("missing or malformed [prompt] system_prompt: {err}"),
        })?;

        Ok(file.prompt.system_prompt.trim().to_string())
    }

    fn repository_guide(&self) -> Option<&str> {
        self.guide_cache
            .get_or_init(|| load_repository_guide(self.max_guide_tokens))
            .as_deref()
    }
}

impl PromptStore for TomlPromptStore {
    fn read_system_prompt(&self, mode: ReviewMode) -> Result<String, PromptError> {
        let mut system_prompt = self.read_prompt_file(mode)?;

        // summary 단계는 저장소 지침의 영향을 받지 않는다.
        if matches!(mode, ReviewMode::Analysis | ReviewMode::Comments)
            && let Some(guide) = self.repository_guide()
        {
            system_prompt.push_str("\n\n## Additional Review Guidelines (from REVIEW.md)\n\n");
            system_prompt.push_str(guide);
            debug!(phase = mode.as_str(), "appended repository review guide");
        }

        Ok(system_prompt)
    }

    fn validate(&self, modes: &[ReviewMode]) -> Result<(), PromptError> {
        for mode in modes {
            if !self.prompt_path(*mode).is_file() {
                return Err(PromptError::NotFound(mode.as_str().to_string()));
            }
        }
        Ok(())
    }
}

/// cwd → home 순서로 REVIEW.md를 찾아 토큰 한도 내로 자른다.
fn load_repository_guide(max_tokens: usize) -> Option<String> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(GUIDE_FILENAME));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(GUIDE_FILENAME));
    }

    for path in candidates {
        if !path.is_file() {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) => {
                let truncated = truncate_to_tokens(&content, max_tokens, &path);
                return Some(truncated);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read review guide");
            }
        }
    }

    debug!("no {GUIDE_FILENAME} found in current or home directory");
    None
}

fn truncate_to_tokens(content: &str, max_tokens: usize, path: &Path) -> String {
    let token_count = estimate_tokens(content);
    if token_count <= max_tokens {
        info!(
            path = %path.display(),
            tokens = token_count,
            "found repository review guide"
        );
        return content.to_string();
    }

    warn!(
        path = %path.display(),
        tokens = token_count,
        limit = max_tokens,
        "review guide exceeds token limit; truncating"
    );

    // 실제 토큰 밀도 기반으로 자른 뒤, 한도에 들 때까지 비례 축소한다.
    let chars_per_token = (content.len() as f64 / token_count as f64).max(1.0);
    let mut main_len = ((max_tokens as f64) * chars_per_token) as usize;
    let mut truncated = compose_truncated(content, main_len);

    for _ in 0..5 {
        let current = estimate_tokens(&truncated);
        if current <= max_tokens {
            break;
        }
        main_len = (main_len as f64 * max_tokens as f64 / current as f64) as usize;
        truncated = compose_truncated(content, main_len);
    }

    truncated
}

fn compose_truncated(content: &str, mut main_len: usize) -> String {
    main_len = main_len.min(content.len());
    while main_len > 0 && !content.is_char_boundary(main_len) {
        main_len -= 1;
    }
    format!("{}{}", &content[..main_len], GUIDE_TRUNCATION_MARKER)
}
