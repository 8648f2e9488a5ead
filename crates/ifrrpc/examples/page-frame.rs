//! Page and frame in one process over an in-memory conduit pair.
//!
//! Run with:
//!   cargo run --example page-frame
//!
//! The frame announces ready, the page answers with its preferences and page
//! id, the frame pushes suggestions back, and the page leaves with `quit`.

use std::time::Duration;

use ifrrpc::channel::methods::{HISTORY, PING, PREFS, SUGGESTIONS};
use ifrrpc::channel::{Caller, Channel, ChannelConfig, MethodTable, Params};
use ifrrpc::page::{PageIdentity, PageMethods, PrefsSource, StaticPage};
use ifrrpc::transport::memory;
use serde_json::{json, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (page_end, frame_end) = memory::pair(Duration::from_millis(10));
    let (page_tx, mut page_inbox) = page_end.split();
    let (frame_tx, mut frame_inbox) = frame_end.split();

    let page = StaticPage::new(
        PageIdentity::new("example.com").with_canonical("https://example.com/story"),
        PrefsSource {
            cookie: "theme=dark; _gid=GA1.2.42".to_string(),
            ..PrefsSource::default()
        },
    );
    let mut page_methods = MethodTable::new();
    PageMethods::new(page)?
        .with_sink(|suggestions| eprintln!("page: suggestions {suggestions}"))
        .install(&mut page_methods)?;

    let mut frame_methods = MethodTable::new();
    frame_methods.register(PREFS, |params: Params, _: &mut dyn Caller| {
        eprintln!("frame: prefs {}", params.into_reply_value());
        Ok(None)
    })?;
    frame_methods.register(HISTORY, |params: Params, caller: &mut dyn Caller| {
        let page_id: String = params.arg(0)?;
        eprintln!("frame: history {page_id}");
        caller.notify(SUGGESTIONS, vec![json!([format!("related:{page_id}")])])?;
        Ok(None)
    })?;
    frame_methods.register(PING, |_: Params, _: &mut dyn Caller| {
        Ok(Some(Value::from("pong")))
    })?;

    let mut page = Channel::new(page_tx, page_methods, ChannelConfig::default());
    let mut frame = Channel::new(frame_tx, frame_methods, ChannelConfig::default());

    frame.announce_ready()?;
    page.call(PING, Vec::new(), |outcome| {
        eprintln!("page: ping -> {}", outcome.as_str());
    })?;

    // Pump both sides until each inbox runs dry.
    loop {
        let page_step = page.poll(&mut page_inbox)?;
        let frame_step = frame.poll(&mut frame_inbox)?;
        if page_step.is_none() && frame_step.is_none() {
            break;
        }
    }

    page.close();
    frame.run(&mut frame_inbox)?;
    eprintln!("frame: page quit, pending calls {}", frame.pending_len());
    Ok(())
}
