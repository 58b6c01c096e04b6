//! Device method handlers and registration.

pub mod camera;
pub mod navigation;
pub mod system;

use serde_json::Value;

use crate::errors::RpcError;
use crate::registry::MethodRegistry;

/// Register the device method table with the registry.
pub fn register_all(registry: &mut MethodRegistry) {
    // System
    registry.register("getSystemInfo", system::GetSystemInfoHandler);
    registry.register("reboot", system::RebootHandler);

    // Camera
    registry.register("takeSnapshot", camera::TakeSnapshotHandler);

    // Navigation
    registry.register("setDestination", navigation::SetDestinationHandler);
}

/// Borrow the params object, treating absent params as empty.
///
/// Fails if params are present but not a JSON object.
pub(crate) fn params_object(
    params: Option<&Value>,
) -> Result<Option<&serde_json::Map<String, Value>>, RpcError> {
    match params {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(RpcError::InvalidParams {
            message: "params must be an object".into(),
        }),
    }
}

/// Extract an optional numeric parameter.
///
/// Missing or `null` yields `Value::Null`; any other non-number is rejected.
pub(crate) fn optional_number_param(
    params: Option<&Value>,
    key: &str,
) -> Result<Value, RpcError> {
    let Some(map) = params_object(params)? else {
        return Ok(Value::Null);
    };
    match map.get(key) {
        None | Some(Value::Null) => Ok(Value::Null),
        Some(v @ Value::Number(_)) => Ok(v.clone()),
        Some(_) => Err(RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a number"),
        }),
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use athena_core::DeviceId;
    use chrono::{TimeZone, Utc};

    use crate::context::RpcContext;

    /// Device id used by every handler test.
    pub const TEST_DEVICE: &str = "a2a0ccea32023010";

    /// Build an `RpcContext` with a fixed device and receive time.
    pub fn make_test_context() -> RpcContext {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .unwrap();
        RpcContext::at(DeviceId::from(TEST_DEVICE), at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::INVALID_PARAMS;
    use serde_json::json;

    #[test]
    fn register_all_populates_table() {
        let mut reg = MethodRegistry::new();
        register_all(&mut reg);
        assert_eq!(
            reg.methods(),
            vec!["getSystemInfo", "reboot", "setDestination", "takeSnapshot"]
        );
    }

    #[test]
    fn builtins_are_not_in_table() {
        let mut reg = MethodRegistry::new();
        register_all(&mut reg);
        assert!(!reg.has_method("heartbeat"));
        assert!(!reg.has_method("telemetry"));
    }

    #[test]
    fn number_param_present() {
        let params = Some(json!({"lat": 37.7}));
        assert_eq!(optional_number_param(params.as_ref(), "lat").unwrap(), json!(37.7));
    }

    #[test]
    fn number_param_missing_is_null() {
        let params = Some(json!({"other": 1}));
        assert!(optional_number_param(params.as_ref(), "lat").unwrap().is_null());
        assert!(optional_number_param(None, "lat").unwrap().is_null());
    }

    #[test]
    fn number_param_wrong_type() {
        let params = Some(json!({"lat": "north"}));
        let err = optional_number_param(params.as_ref(), "lat").unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
        assert!(err.to_string().contains("lat"));
    }

    #[test]
    fn params_must_be_object() {
        let params = Some(json!([1, 2]));
        let err = params_object(params.as_ref()).unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
    }
}
