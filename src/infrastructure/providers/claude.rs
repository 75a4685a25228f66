//! Claude CLI provider 어댑터.

use async_trait::async_trait;

use crate::application::ports::{ModelError, ModelRunner};
use crate::infrastructure::config::{Config, ProviderCommandSpec};

use super::{check_token_budget, command_available, run_model_command};

pub struct ClaudeCliRunner {
    spec: ProviderCommandSpec,
    max_prompt_tokens: usize,
}

impl ClaudeCliRunner {
    /// 설정에서 실행 스펙을 읽고, 명령이 존재할 때만 러너를 활성화한다.
    pub fn from_config(config: &Config) -> Option<Self> {
        let provider = config.providers.claude.as_ref()?;
        let mut spec = provider.command_spec("claude")?;
        if spec.args.is_empty() {
            // 비대화형 단발 실행: 읽기 전용 plan 모드로 프롬프트를 처리한다.
            spec.args = vec![
                "-p".to_string(),
                "--permission-mode".to_string(),
                "plan".to_string(),
            ];
        }
        if !command_available(&spec.command) {
            return None;
        }
        Some(Self {
            spec,
            max_prompt_tokens: config.max_prompt_tokens(),
        })
    }
}

#[async_trait]
impl ModelRunner for ClaudeCliRunner {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_turns: u32,
    ) -> Result<String, ModelError> {
        check_token_budget(system_prompt, user_prompt, self.max_prompt_tokens)?;

        let extra_args = vec![
            "--system-prompt".to_string(),
            system_prompt.to_string(),
            "--max-turns".to_string(),
            max_turns.to_string(),
        ];

        run_model_command("Claude CLI", &self.spec, &extra_args, user_prompt)
            .await
            .map_err(|err| ModelError::Invocation(format!("{err:#}")))
    }
}
