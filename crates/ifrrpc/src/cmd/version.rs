use ifrrpc_channel::{CORRELATION_ID_LEN, JSONRPC_VERSION};
use ifrrpc_transport::DEFAULT_MAX_PAYLOAD;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("ifrrpc {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "target: {}",
        option_env!("IFRRPC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("protocol: jsonrpc {JSONRPC_VERSION}");
    println!("correlation_id_len: {CORRELATION_ID_LEN}");
    println!("max_frame_payload: {DEFAULT_MAX_PAYLOAD}");
    println!("features: page={}, cli=true", cfg!(feature = "page"));

    Ok(SUCCESS)
}
