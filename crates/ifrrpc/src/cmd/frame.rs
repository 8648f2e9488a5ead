use std::sync::atomic::Ordering;

use ifrrpc_channel::methods::{HISTORY, PING, PREFS, QUIT, SUGGESTIONS};
use ifrrpc_channel::{Caller, Channel, MethodTable, Params, RegistryError};
use ifrrpc_transport::UnixConduitListener;
use serde_json::Value;
use tracing::info;

use crate::cmd::{interrupt_flag, FrameArgs};
use crate::exit::{channel_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

pub fn run(args: FrameArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.channel.to_config()?;
    let methods = frame_methods(args.suggestions, format)
        .map_err(|err| CliError::new(INTERNAL, format!("method setup failed: {err}")))?;
    let running = interrupt_flag()?;

    let listener =
        UnixConduitListener::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    info!(path = %listener.path().display(), "frame listening");

    let (conduit, mut inbox) = listener
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    info!("page connected");

    let mut channel = Channel::new(conduit, methods, config);
    channel
        .announce_ready()
        .map_err(|err| channel_error("ready failed", err))?;

    let exit = channel
        .run_while(&mut inbox, |_| running.load(Ordering::SeqCst))
        .map_err(|err| channel_error("receive failed", err))?;
    info!(?exit, "frame finished");
    channel.close();

    Ok(SUCCESS)
}

/// The frame side: record what the page pushes, answer pings, and reply to
/// every `history` with suggestions.
fn frame_methods(
    suggestions: Vec<String>,
    format: OutputFormat,
) -> Result<MethodTable, RegistryError> {
    let mut methods = MethodTable::new();

    methods.register(PREFS, move |params: Params, _: &mut dyn Caller| {
        print_event(&Event::new("prefs", PREFS, params.into_reply_value()), format);
        Ok(None)
    })?;

    methods.register(HISTORY, move |params: Params, caller: &mut dyn Caller| {
        let page_id: String = params.arg(0)?;
        print_event(&Event::new("history", HISTORY, Value::from(page_id.as_str())), format);

        let items = suggestions_for(&page_id, &suggestions);
        caller.notify(SUGGESTIONS, vec![Value::from(items)])?;
        Ok(None)
    })?;

    methods.register(PING, |_: Params, _: &mut dyn Caller| {
        Ok(Some(Value::from("pong")))
    })?;

    methods.on_quit(move |_: Params, _: &mut dyn Caller| {
        print_event(&Event::new("quit", QUIT, Value::Null), format);
        Ok(None)
    });

    Ok(methods)
}

fn suggestions_for(page_id: &str, configured: &[String]) -> Vec<String> {
    if configured.is_empty() {
        vec![format!("related:{page_id}")]
    } else {
        configured.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use ifrrpc_channel::{CorrelationId, IdGenerator, ReplyCallback};

    use super::*;

    #[derive(Default)]
    struct Sent(Vec<(String, Vec<Value>)>);

    impl Caller for Sent {
        fn call(
            &mut self,
            method: &str,
            params: Vec<Value>,
            _on_reply: ReplyCallback,
        ) -> ifrrpc_channel::Result<CorrelationId> {
            self.0.push((method.to_string(), params));
            Ok(IdGenerator::with_seed(0).next_id())
        }

        fn notify(&mut self, method: &str, params: Vec<Value>) -> ifrrpc_channel::Result<()> {
            self.0.push((method.to_string(), params));
            Ok(())
        }
    }

    #[test]
    fn default_suggestion_names_the_page() {
        assert_eq!(suggestions_for("home", &[]), vec!["related:home"]);
        let configured = vec!["a".to_string(), "b".to_string()];
        assert_eq!(suggestions_for("home", &configured), configured);
    }

    #[test]
    fn history_answers_with_suggestions() {
        let mut methods = frame_methods(vec!["x".to_string()], OutputFormat::Json).unwrap();
        let mut sent = Sent::default();
        methods.invoke(HISTORY, Params::new(vec![Value::from("home")]), &mut sent);
        assert_eq!(
            sent.0,
            vec![(SUGGESTIONS.to_string(), vec![serde_json::json!(["x"])])]
        );
    }

    #[test]
    fn ping_returns_pong() {
        let mut methods = frame_methods(Vec::new(), OutputFormat::Json).unwrap();
        let mut sent = Sent::default();
        match methods.invoke(PING, Params::default(), &mut sent) {
            ifrrpc_channel::Invocation::Returned(Some(value)) => assert_eq!(value, "pong"),
            other => panic!("unexpected invocation: {other:?}"),
        }
    }
}
