//! exec-relay - 隧道后的远程命令执行器
//!
//! Usage:
//! - Executor (default): `exec-relay`
//! - With custom port: `exec-relay --port 9090`
//! - Sender: `exec-relay send`

use std::process::ExitCode;

use exec_relay::{Mode, RuntimeConfig};

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "executor" => {
                config.mode = Mode::Executor;
                i += 1;
            }
            "send" => {
                config.mode = Mode::Sender;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("exec-relay - tunnelled remote command executor");
    println!();
    println!("USAGE:");
    println!("    exec-relay [OPTIONS] [COMMAND]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the executor listening port (RELAY_PORT)");
    println!("    -h, --help       Print help information");
    println!();
    println!("COMMANDS:");
    println!("    executor         Start the tunnel, publish config, serve /execute (default)");
    println!("    send             Fetch the published config and send the example instruction");
}

fn main() -> ExitCode {
    let config = parse_args();

    exec_relay::init_tracing();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(exec_relay::run_with_config(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "exec-relay failed");
            ExitCode::FAILURE
        }
    }
}
