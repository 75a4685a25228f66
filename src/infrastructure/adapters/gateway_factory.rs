//! PR 게이트웨이 팩토리 어댑터.

use anyhow::{Context, Result};
use tracing::warn;

use crate::application::ports::{GatewayFactory, PullRequestGateway};
use crate::infrastructure::config::{self, resolve_host_token};
use crate::infrastructure::vcs::{CodeupGateway, yunxiao::YunXiaoClient};

/// 설정에서 Codeup 게이트웨이를 조립한다.
pub struct CodeupGatewayFactory;

impl GatewayFactory for CodeupGatewayFactory {
    fn build(&self, config: &config::Config) -> Result<Box<dyn PullRequestGateway>> {
        let organization_id = config
            .host
            .organization_id
            .clone()
            .context("host.organization_id is not configured")?;
        let repository_id = config
            .host
            .repository_id
            .clone()
            .context("host.repository_id is not configured")?;

        let resolution = resolve_host_token(&config.host);
        if resolution.credential.is_none() {
            // 토큰 없이도 로컬 git 폴백 경로는 동작하므로 기동 자체는 막지 않는다.
            warn!(
                source = resolution.source.as_deref().unwrap_or("unset"),
                "no YunXiao API token resolved; host API calls will fail"
            );
        }

        let client = YunXiaoClient::new(
            config.host.domain().to_string(),
            organization_id,
            repository_id,
            resolution.credential,
        );
        Ok(Box::new(CodeupGateway::new(client)))
    }
}
