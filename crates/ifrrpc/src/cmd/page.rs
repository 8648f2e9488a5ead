use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::Instant;

use ifrrpc_channel::methods::SUGGESTIONS;
use ifrrpc_channel::{Channel, MethodTable};
use ifrrpc_page::{PageIdentity, PageMethods, PrefsSource, StaticPage};
use ifrrpc_transport::connect;
use tracing::info;

use crate::cmd::{interrupt_flag, parse_duration, PageArgs};
use crate::exit::{channel_error, page_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

pub fn run(args: PageArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.channel.to_config()?;
    let linger = args.linger.as_deref().map(parse_duration).transpose()?;
    let page = load_page(&args)?;
    info!(page_id = page.identity.resolve(), "page loaded");

    let mut methods = MethodTable::new();
    PageMethods::new(page)
        .map_err(|err| page_error("page setup failed", err))?
        .with_sink(move |suggestions| {
            print_event(&Event::new("suggestions", SUGGESTIONS, suggestions), format);
        })
        .install(&mut methods)
        .map_err(|err| page_error("page setup failed", err))?;

    let running = interrupt_flag()?;
    let (conduit, mut inbox) =
        connect(&args.path).map_err(|err| transport_error("connect failed", err))?;

    let mut channel = Channel::new(conduit, methods, config);
    let deadline = linger.map(|linger| Instant::now() + linger);
    let exit = channel
        .run_while(&mut inbox, |_| {
            running.load(Ordering::SeqCst) && deadline.is_none_or(|at| Instant::now() < at)
        })
        .map_err(|err| channel_error("receive failed", err))?;
    info!(?exit, "page finished");

    // Page unload: tell the frame we are gone.
    channel.close();
    Ok(SUCCESS)
}

fn load_page(args: &PageArgs) -> CliResult<StaticPage> {
    if let Some(path) = &args.page_env {
        return StaticPage::from_json_file(path)
            .map_err(|err| page_error(&format!("failed loading {}", path.display()), err));
    }

    let mut identity = PageIdentity::new(args.hostname.as_deref().unwrap_or("localhost"));
    identity.audience_media_id = args.media_id.clone();
    identity.canonical_href = args.canonical.clone();

    let prefs = PrefsSource {
        cookie: args.cookie.clone().unwrap_or_default(),
        session_storage: parse_session(&args.session)?,
    };
    Ok(StaticPage::new(identity, prefs))
}

fn parse_session(entries: &[String]) -> CliResult<BTreeMap<String, String>> {
    entries
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| {
                    CliError::usage(format!("--session expects KEY=VALUE, got '{entry}'"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_entries_split_on_first_equals() {
        let parsed = parse_session(&["geo={\"a\":\"b=c\"}".to_string()]).unwrap();
        assert_eq!(parsed["geo"], "{\"a\":\"b=c\"}");
    }

    #[test]
    fn session_entry_without_equals_is_usage_error() {
        let err = parse_session(&["nope".to_string()]).unwrap_err();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
