mod gateway;
mod mock;
mod types;

pub use gateway::{Gateway, ResponseStream};
pub use mock::{EchoGateway, ScriptedGateway};
pub use types::*;

use anyhow::bail;
use relay_config::ModelConfig;

/// Construct a boxed [`Gateway`] from configuration.
///
/// Only the built-in mock gateway is selectable here; real transports
/// implement [`Gateway`] in the embedding application and are wired in
/// directly.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn Gateway>> {
    match cfg.provider.as_str() {
        "mock" => Ok(Box::new(EchoGateway)),
        other => bail!("unknown gateway provider: {other}"),
    }
}
