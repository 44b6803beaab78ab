// # ipchange-core
//
// Core library for detecting a change of the host's public IPv4 address and
// propagating it to DNS records and firewall rules.
//
// ## Architecture Overview
//
// - **ExternalIpSource**: Trait for discovering the current public IP
// - **DnsApi / SecurityGroupApi / MailSender**: Traits for the remote backends
// - **IpLogStore**: Trait for the authoritative record of the last propagated IP
// - **SharedStateStore**: Document of all instances' IP claims, kept in a DNS TXT record
// - **IpChangeEngine**: Orchestrates detect → claim → DNS → firewall → notify → record
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from backend implementations
// 2. **Explicit Dependencies**: Collaborators are built once and handed to the engine
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Remote writes are upserts; the IP log is written last

pub mod appliers;
pub mod config;
pub mod detector;
pub mod dry_run;
pub mod engine;
pub mod error;
pub mod ip_log;
pub mod ip_state;
pub mod notifier;
pub mod run_log;
pub mod shared_state;
pub mod traits;

// Re-export core types for convenience
pub use traits::{ConfigProvider, DnsApi, ExternalIpSource, IpLogStore, MailSender, SecurityGroupApi};
pub use engine::{Collaborators, EngineEvent, IpChangeEngine, PipelineState, RunOutcome, RunReport};
pub use config::{IpChangeConfig, JsonFileConfigProvider};
pub use error::{Error, Result, Stage};
pub use ip_log::{FileIpLog, MemoryIpLog};
pub use ip_state::IpState;
pub use run_log::RunLog;
pub use shared_state::{MultiClientEntry, SharedStateStore};
