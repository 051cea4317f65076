use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One engine's trace from a single dispatch (spec §3, §4.8). Emitted
/// whether the engine succeeded or failed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineTraceRecord {
    pub engine_name: String,
    pub engine_version: String,
    pub input_fingerprint: String,
    pub duration_ms: u64,
    pub parameters_used: Value,
    pub success: bool,
    pub error: Option<String>,
}
