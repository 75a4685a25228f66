//! 모델 provider 실행 모듈.
//! Claude CLI와 OpenAI 호환 API를 공통 러너 인터페이스로 묶는다.

pub mod claude;
pub mod openai;
mod command_runner;

use anyhow::{Result, bail};

use crate::application::ports::{ModelError, ModelRunner};
use crate::domain::policy::estimate_tokens;
use crate::infrastructure::config::{Config, command_exists};

pub use command_runner::run_model_command;

/// 설정에서 활성 러너를 고른다. claude 우선, openai 차선.
pub fn build_model_runner(config: &Config) -> Result<Box<dyn ModelRunner>> {
    if let Some(runner) = claude::ClaudeCliRunner::from_config(config) {
        return Ok(Box::new(runner));
    }
    if let Some(runner) = openai::OpenAiApiRunner::from_config(config) {
        return Ok(Box::new(runner));
    }
    bail!(
        "no usable model provider: enable providers.claude (CLI in PATH) \
         or providers.openai (model + api key) in the config"
    );
}

/// 전송 전 선행조건: system+user 합산 추정 토큰이 한도를 넘으면 거부한다.
pub(crate) fn check_token_budget(
    system_prompt: &str,
    user_prompt: &str,
    limit: usize,
) -> Result<(), ModelError> {
    let estimated = estimate_tokens(system_prompt) + estimate_tokens(user_prompt);
    if estimated > limit {
        return Err(ModelError::TokenBudgetExceeded { estimated, limit });
    }
    Ok(())
}

pub fn command_available(command: &str) -> bool {
    command_exists(command)
}
