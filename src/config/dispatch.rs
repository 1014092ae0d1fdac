use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DispatchConfig {
    /// Upper bound on concurrently running handler tasks.
    /// 0 means unbounded.
    #[serde(default)]
    pub max_in_flight_handlers: usize,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}
