//! Engine dispatcher (C8, spec §4.8): invoker registry, parameter
//! resolution, timed/fingerprinted invocation, trace capture.

#![deny(unsafe_code)]

use kernel_clock::Clock;
use kernel_types::{AccountingPolicy, EngineTraceRecord};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// An engine callable registered under `engine_name`. Invokers are
/// declared pure (spec §5): no I/O, no clock access of their own.
pub trait EngineInvoker: Send + Sync {
    fn engine_name(&self) -> &str;
    fn engine_version(&self) -> &str;
    /// Payload fields the fingerprint is computed over (spec §4.3/§4.8).
    fn fingerprint_fields(&self) -> &[&str];
    fn invoke(&self, payload: &Value, frozen_params: &Value) -> Result<Value, String>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invoker engine_name '{actual}' does not match registration key '{key}'")]
    NameMismatch { key: String, actual: String },
}

/// Outcome of dispatching one policy's `required_engines` (spec §4.8 step 6).
#[derive(Clone, Debug)]
pub struct DispatchResult {
    pub outputs: HashMap<String, Value>,
    pub traces: Vec<EngineTraceRecord>,
    pub all_succeeded: bool,
    pub errors: Vec<(String, String)>,
}

impl DispatchResult {
    fn empty_success() -> Self {
        Self {
            outputs: HashMap::new(),
            traces: Vec::new(),
            all_succeeded: true,
            errors: Vec::new(),
        }
    }

    /// Strict invariant enforced by the coordinator (spec §4.15 step 8):
    /// `all_succeeded` is trustworthy only when the number of successful
    /// traces equals the number of engines that were required.
    pub fn success_count_matches(&self, required_engines: &[String]) -> bool {
        let successes = self.traces.iter().filter(|t| t.success).count();
        self.all_succeeded && successes == required_engines.len()
    }
}

#[derive(Default)]
pub struct EngineRegistry {
    invokers: HashMap<String, Box<dyn EngineInvoker>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        invoker: Box<dyn EngineInvoker>,
    ) -> Result<(), EngineError> {
        let key = key.into();
        if invoker.engine_name() != key {
            return Err(EngineError::NameMismatch {
                key,
                actual: invoker.engine_name().to_string(),
            });
        }
        self.invokers.insert(key, invoker);
        Ok(())
    }

    /// Contracts declared in the pack (name -> version) that have no
    /// registered invoker, used by startup health checks (spec §4.8).
    pub fn validate_registration(&self, engine_contracts: &HashMap<String, String>) -> Vec<String> {
        engine_contracts
            .keys()
            .filter(|name| !self.invokers.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Dispatch every engine named in `policy.required_engines` (spec
    /// §4.8). Engines run sequentially and independently: one failure
    /// never prevents the others from running.
    pub fn dispatch(
        &self,
        policy: &AccountingPolicy,
        engine_parameters: &HashMap<String, Value>,
        payload: &Value,
        clock: &dyn Clock,
    ) -> DispatchResult {
        if policy.required_engines.is_empty() {
            return DispatchResult::empty_success();
        }

        let mut outputs = HashMap::new();
        let mut traces = Vec::new();
        let mut errors = Vec::new();
        let mut all_succeeded = true;

        for engine_name in &policy.required_engines {
            let Some(invoker) = self.invokers.get(engine_name) else {
                warn!(engine_name, "engine dispatch requested unregistered invoker");
                all_succeeded = false;
                errors.push((engine_name.clone(), "engine not registered".to_string()));
                traces.push(EngineTraceRecord {
                    engine_name: engine_name.clone(),
                    engine_version: "unknown".to_string(),
                    input_fingerprint: String::new(),
                    duration_ms: 0,
                    parameters_used: Value::Null,
                    success: false,
                    error: Some("engine not registered".to_string()),
                });
                continue;
            };

            let params = resolve_parameters(policy, engine_name, engine_parameters);
            let fingerprint =
                kernel_canon::fingerprint(invoker.fingerprint_fields(), payload);

            let started = clock.now_utc();
            let outcome = invoker.invoke(payload, &params);
            let elapsed_ms = (clock.now_utc() - started)
                .num_milliseconds()
                .max(0) as u64;

            let success = outcome.is_ok();
            if success {
                info!(
                    event = "FINANCE_ENGINE_DISPATCH",
                    engine_name,
                    engine_version = invoker.engine_version(),
                    input_fingerprint = %fingerprint,
                    duration_ms = elapsed_ms,
                    "engine invocation succeeded"
                );
            } else {
                warn!(
                    event = "FINANCE_ENGINE_DISPATCH",
                    engine_name,
                    engine_version = invoker.engine_version(),
                    input_fingerprint = %fingerprint,
                    duration_ms = elapsed_ms,
                    "engine invocation failed"
                );
                all_succeeded = false;
            }

            let error_message = outcome.as_ref().err().cloned();
            if let Some(message) = &error_message {
                errors.push((engine_name.clone(), message.clone()));
            }
            if let Ok(output) = outcome {
                outputs.insert(engine_name.clone(), output);
            }

            traces.push(EngineTraceRecord {
                engine_name: engine_name.clone(),
                engine_version: invoker.engine_version().to_string(),
                input_fingerprint: fingerprint,
                duration_ms: elapsed_ms,
                parameters_used: params,
                success,
                error: error_message,
            });
        }

        DispatchResult {
            outputs,
            traces,
            all_succeeded,
            errors,
        }
    }
}

/// Parameter lookup chain (spec §4.8 step 2-3): by `engine_parameters_ref`,
/// else by engine name, else an empty object; then project the policy's
/// `variance_disposition` / `valuation_model` into the matching engine's
/// parameters. These are the only engine-specific projections performed.
fn resolve_parameters(
    policy: &AccountingPolicy,
    engine_name: &str,
    engine_parameters: &HashMap<String, Value>,
) -> Value {
    let mut params = policy
        .engine_parameters_ref
        .as_ref()
        .and_then(|key| engine_parameters.get(key))
        .or_else(|| engine_parameters.get(engine_name))
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    if let Value::Object(map) = &mut params {
        if engine_name.contains("variance") {
            if let Some(disposition) = &policy.variance_disposition {
                map.insert(
                    "variance_disposition".to_string(),
                    Value::String(disposition.clone()),
                );
            }
        }
        if engine_name.contains("valuation") {
            if let Some(model) = &policy.valuation_model {
                map.insert("valuation_model".to_string(), Value::String(model.clone()));
            }
        }
    }

    params
}
