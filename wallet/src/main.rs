// Dirac wallet command-line front end

use clap::Parser;
use dirac_wallet::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

fn init_logging(default_level: &str) {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_logging(&args.log_level);

    if let Err(e) = cli::run_cli(args).await {
        eprintln!("Error: {:#}", e);
        let code = match cli::error_kind(&e) {
            Some(kind) => {
                eprintln!("Hint: {}", kind.guidance());
                kind.exit_code()
            }
            None => 1,
        };
        std::process::exit(code);
    }
}
