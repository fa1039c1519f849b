/// FuncScript CLI
///
/// Declares the functions of a TOML host file and runs call expressions against
/// them, pumping delayed calls on a fixed tick.

use funcscript_core::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
