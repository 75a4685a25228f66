//! 애플리케이션 포트를 실제 인프라 구현체로 연결하는 어댑터 계층.

mod config_repository;
mod gateway_factory;
mod model_runner_factory;
mod reporter;

pub use config_repository::JsonConfigRepository;
pub use gateway_factory::CodeupGatewayFactory;
pub use model_runner_factory::ProviderRunnerFactory;
pub use reporter::ConsoleReporter;
