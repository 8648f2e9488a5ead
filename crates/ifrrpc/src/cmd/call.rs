use std::cell::RefCell;
use std::rc::Rc;

use ifrrpc_channel::{CallOutcome, Channel, ChannelConfig, MethodTable};
use ifrrpc_transport::connect;
use serde_json::Value;
use tracing::debug;

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{
    channel_error, transport_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT,
};
use crate::output::{print_event, Event, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let params = parse_params(args.params.as_deref())?;
    let config = ChannelConfig {
        call_timeout: parse_duration(&args.timeout)?,
        ..ChannelConfig::default()
    };

    let (conduit, mut inbox) =
        connect(&args.path).map_err(|err| transport_error("connect failed", err))?;
    let mut channel = Channel::new(conduit, MethodTable::new(), config);

    if !args.wait {
        channel
            .notify(&args.method, params)
            .map_err(|err| channel_error("send failed", err))?;
        channel.close();
        return Ok(SUCCESS);
    }

    let slot: Rc<RefCell<Option<CallOutcome>>> = Rc::default();
    let sink = Rc::clone(&slot);
    let id = channel
        .call(&args.method, params, move |outcome| {
            *sink.borrow_mut() = Some(outcome);
        })
        .map_err(|err| channel_error("send failed", err))?;

    let exit = channel
        .run_while(&mut inbox, |_| slot.borrow().is_none())
        .map_err(|err| channel_error("receive failed", err))?;
    debug!(?exit, "call loop finished");
    channel.close();

    let outcome = slot.borrow_mut().take().unwrap_or(CallOutcome::Cancelled);
    let code = match outcome {
        CallOutcome::Replied(_) => SUCCESS,
        CallOutcome::TimedOut => TIMEOUT,
        CallOutcome::Cancelled => FAILURE,
    };
    print_event(&Event::outcome(&args.method, id.as_str(), outcome), format);
    Ok(code)
}

/// `--params` as positional params: an array is taken as-is, `null` means
/// none, anything else is the single param.
fn parse_params(raw: Option<&str>) -> CliResult<Vec<Value>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| CliError::usage(format!("--params is not valid JSON: {err}")))?;
    Ok(match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn params_array_is_positional() {
        assert_eq!(
            parse_params(Some(r#"["home", 2]"#)).unwrap(),
            vec![json!("home"), json!(2)]
        );
    }

    #[test]
    fn params_scalar_is_single_param() {
        assert_eq!(parse_params(Some(r#"{"a":1}"#)).unwrap(), vec![json!({"a": 1})]);
        assert!(parse_params(Some("null")).unwrap().is_empty());
        assert!(parse_params(None).unwrap().is_empty());
    }

    #[test]
    fn invalid_params_are_usage_error() {
        let err = parse_params(Some("[1,")).unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
