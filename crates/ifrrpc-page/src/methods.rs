use std::rc::Rc;

use ifrrpc_channel::methods::{DEFAULT_PREFS, HISTORY, PREFS, SUGGESTIONS};
use ifrrpc_channel::{Caller, HandlerError, MethodTable, Params};
use serde_json::Value;
use tracing::{debug, info};

use crate::environment::PageEnvironment;
use crate::error::Result;
use crate::prefs::PrefsExtractor;

/// Receives the payload of each `suggestions` call.
pub type SuggestionSink = Box<dyn FnMut(Value)>;

/// The methods the page side exposes to the frame.
///
/// - `backendReady`: push harvested preferences, then tell the frame which
///   page is showing (`history`).
/// - `defaultPrefs`: push harvested preferences on demand.
/// - `suggestions`: log the frame's suggestions and pass them to the sink.
pub struct PageMethods<E> {
    env: Rc<E>,
    extractor: Rc<PrefsExtractor>,
    sink: Option<SuggestionSink>,
}

impl<E: PageEnvironment + 'static> PageMethods<E> {
    pub fn new(env: E) -> Result<Self> {
        Ok(Self {
            env: Rc::new(env),
            extractor: Rc::new(PrefsExtractor::new()?),
            sink: None,
        })
    }

    pub fn with_extractor(mut self, extractor: PrefsExtractor) -> Self {
        self.extractor = Rc::new(extractor);
        self
    }

    pub fn with_sink(mut self, sink: impl FnMut(Value) + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Register the page methods into `table`.
    pub fn install(self, table: &mut MethodTable) -> Result<()> {
        let Self {
            env,
            extractor,
            mut sink,
        } = self;

        {
            let env = Rc::clone(&env);
            let extractor = Rc::clone(&extractor);
            table.on_ready(move |_: Params, caller: &mut dyn Caller| {
                push_prefs(&*env, &extractor, caller)?;
                let page_id = env.page_identity().resolve().to_string();
                info!(%page_id, "frame ready, sending page id");
                caller.notify(HISTORY, vec![Value::String(page_id)])?;
                Ok(None)
            });
        }

        table.register(DEFAULT_PREFS, move |_: Params, caller: &mut dyn Caller| {
            push_prefs(&*env, &extractor, caller)?;
            Ok(None)
        })?;

        table.register(SUGGESTIONS, move |params: Params, _: &mut dyn Caller| {
            let suggestions = params.into_reply_value();
            info!(%suggestions, "received suggestions");
            if let Some(sink) = sink.as_mut() {
                sink(suggestions);
            }
            Ok(None)
        })?;

        Ok(())
    }
}

/// Send `prefs` if anything was harvested. Returns whether it was sent.
fn push_prefs<E: PageEnvironment>(
    env: &E,
    extractor: &PrefsExtractor,
    caller: &mut dyn Caller,
) -> std::result::Result<bool, HandlerError> {
    let prefs = extractor.extract(&env.prefs_source());
    if prefs.is_empty() {
        debug!("no preferences found, nothing sent");
        return Ok(false);
    }
    let prefs = serde_json::to_value(&prefs).map_err(|err| HandlerError::failed(err.to_string()))?;
    caller.notify(PREFS, vec![prefs])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use ifrrpc_channel::methods::READY;
    use ifrrpc_channel::{CorrelationId, ReplyCallback};
    use serde_json::json;

    use super::*;
    use crate::environment::StaticPage;
    use crate::identity::PageIdentity;
    use crate::prefs::PrefsSource;

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
            Ok(ifrrpc_channel::IdGenerator::with_seed(0).next_id())
        }

        fn notify(&mut self, method: &str, params: Vec<Value>) -> ifrrpc_channel::Result<()> {
            self.0.push((method.to_string(), params));
            Ok(())
        }
    }

    fn page(cookie: &str) -> StaticPage {
        StaticPage::new(
            PageIdentity::new("example.com").with_canonical("https://example.com/story"),
            PrefsSource {
                cookie: cookie.to_string(),
                ..PrefsSource::default()
            },
        )
    }

    fn table(env: StaticPage) -> MethodTable {
        let mut table = MethodTable::new();
        PageMethods::new(env).unwrap().install(&mut table).unwrap();
        table
    }

    #[test]
    fn installs_page_methods() {
        let table = table(page(""));
        for name in ifrrpc_channel::methods::PAGE_METHODS {
            assert!(table.contains(name), "{name} missing");
        }
    }

    #[test]
    fn ready_pushes_prefs_then_history() {
        let mut table = table(page("_gid=GA1.2.3"));
        let mut sent = Sent::default();
        table.invoke(READY, Params::default(), &mut sent);

        assert_eq!(
            sent.0,
            vec![
                (PREFS.to_string(), vec![json!({"gid": "GA1.2.3"})]),
                (
                    HISTORY.to_string(),
                    vec![json!("https://example.com/story")]
                ),
            ]
        );
    }

    #[test]
    fn ready_without_prefs_sends_only_history() {
        let mut table = table(page("theme=dark"));
        let mut sent = Sent::default();
        table.invoke(READY, Params::default(), &mut sent);
        assert_eq!(sent.0.len(), 1);
        assert_eq!(sent.0[0].0, HISTORY);
    }

    #[test]
    fn default_prefs_on_demand() {
        let mut table = table(page("_gid=abc"));
        let mut sent = Sent::default();
        table.invoke(DEFAULT_PREFS, Params::default(), &mut sent);
        assert_eq!(sent.0, vec![(PREFS.to_string(), vec![json!({"gid": "abc"})])]);
    }

    #[test]
    fn suggestions_reach_sink() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut table = MethodTable::new();
        PageMethods::new(page(""))
            .unwrap()
            .with_sink(move |value| sink.borrow_mut().push(value))
            .install(&mut table)
            .unwrap();

        let mut sent = Sent::default();
        table.invoke(
            SUGGESTIONS,
            Params::new(vec![json!(["a", "b"])]),
            &mut sent,
        );
        assert_eq!(*seen.borrow(), vec![json!(["a", "b"])]);
        assert!(sent.0.is_empty());
    }

    #[test]
    fn install_twice_is_rejected() {
        let mut table = table(page(""));
        assert!(PageMethods::new(page("")).unwrap().install(&mut table).is_err());
    }
}
