use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HandlerError;

/// Positional arguments of an inbound call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Deserialize the argument at `index`; missing arguments are an error.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, HandlerError> {
        let value = self
            .0
            .get(index)
            .ok_or_else(|| HandlerError::InvalidParams(format!("missing argument {index}")))?;
        serde_json::from_value(value.clone())
            .map_err(|err| HandlerError::InvalidParams(format!("argument {index}: {err}")))
    }

    /// Like [`Params::arg`], but a missing or `null` argument yields `None`.
    pub fn opt_arg<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, HandlerError> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.arg(index).map(Some),
        }
    }

    /// The single value a reply carries; `null` when the reply was empty.
    pub fn into_reply_value(self) -> Value {
        self.0.into_iter().next().unwrap_or(Value::Null)
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn typed_positional_access() {
        let params = Params::new(vec![json!("home"), json!({"gid": "GA1"})]);
        let page: String = params.arg(0).unwrap();
        let prefs: BTreeMap<String, String> = params.arg(1).unwrap();
        assert_eq!(page, "home");
        assert_eq!(prefs["gid"], "GA1");
    }

    #[test]
    fn missing_and_mistyped_arguments_are_invalid_params() {
        let params = Params::new(vec![json!(3)]);
        assert!(matches!(
            params.arg::<String>(0),
            Err(HandlerError::InvalidParams(_))
        ));
        assert!(matches!(
            params.arg::<u32>(1),
            Err(HandlerError::InvalidParams(_))
        ));
    }

    #[test]
    fn optional_arguments_accept_null_and_absence() {
        let params = Params::new(vec![Value::Null]);
        assert_eq!(params.opt_arg::<String>(0).unwrap(), None);
        assert_eq!(params.opt_arg::<String>(5).unwrap(), None);
    }

    #[test]
    fn reply_value_defaults_to_null() {
        assert_eq!(Params::default().into_reply_value(), Value::Null);
        assert_eq!(
            Params::new(vec![json!(1), json!(2)]).into_reply_value(),
            json!(1)
        );
    }
}
