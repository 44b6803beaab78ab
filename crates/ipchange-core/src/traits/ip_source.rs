// # External IP Source Trait
//
// Defines the interface for discovering the host's current public IPv4
// address.
//
// ## Implementations
//
// - HTTP "what is my IP" endpoint: `ipchange-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ipchange_core::ExternalIpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* ExternalIpSource implementation */;
//
//     let current_ip = source.current().await?;
//     println!("External IP: {current_ip}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for external IP discovery
///
/// Implementations return the address as the string they observed. The
/// engine validates it as IPv4 when it builds the run's
/// [`IpState`](crate::IpState); sources do not canonicalize.
///
/// Sources are observers, not decision-makers: they must not compare
/// against previous values, retry, or cache across runs.
#[async_trait]
pub trait ExternalIpSource: Send + Sync {
    /// Get the current external IP address
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The observed address (e.g. `"203.0.113.7"`)
    /// - `Err(Error)`: If the address could not be determined
    async fn current(&self) -> Result<String, crate::Error>;

    /// Source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
