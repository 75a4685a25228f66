//! 모델 러너 팩토리 어댑터.

use anyhow::Result;

use crate::application::ports::{ModelRunner, ModelRunnerFactory};
use crate::infrastructure::{config, providers};

/// 설정에서 활성 provider 러너를 구성한다.
pub struct ProviderRunnerFactory;

impl ModelRunnerFactory for ProviderRunnerFactory {
    fn build(&self, config: &config::Config) -> Result<Box<dyn ModelRunner>> {
        providers::build_model_runner(config)
    }
}
