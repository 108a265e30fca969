use xethsb_frame::{HEADER_SIZE, JUMBO_FRAME_SIZE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("xethsb {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: xethsb");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("XETHSB_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("XETHSB_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("header_size: {HEADER_SIZE}");
    println!("jumbo_frame_size: {JUMBO_FRAME_SIZE}");

    Ok(SUCCESS)
}
