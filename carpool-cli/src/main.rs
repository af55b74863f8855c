//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use carpool_cli::run;

#[expect(
    clippy::print_stderr,
    reason = "The binary reports fatal errors on stderr before exiting"
)]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();
    if let Err(err) = run() {
        eprintln!("carpool: {err}");
        std::process::exit(1);
    }
}
