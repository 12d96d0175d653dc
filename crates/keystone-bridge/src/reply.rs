use serde_json::{Value, json};

use crate::error::BridgeError;

/// Outcome delivered to the host callback.
pub type Reply = Result<Value, BridgeError>;

/// Response callback; invoked exactly once per call.
pub type Callback = Box<dyn FnOnce(Reply) + Send + 'static>;

/// Render a reply as the error-first argument list the host runtime
/// passes to its JS callback: `[null, result]` or `["message", null]`.
pub fn to_callback_args(reply: &Reply) -> Value {
    match reply {
        Ok(result) => json!([null, result]),
        Err(err) => json!([err.to_string(), null]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_null_first() {
        let reply: Reply = Ok(json!({"width": 2}));
        assert_eq!(to_callback_args(&reply), json!([null, {"width": 2}]));
    }

    #[test]
    fn failure_carries_message() {
        let reply: Reply = Err(BridgeError::InvalidHeatmap);
        assert_eq!(to_callback_args(&reply), json!(["Invalid heatmap", null]));
    }
}
