mod cli;

use clap::Parser;

fn init_tracing(args: &cli::Args) {
    // --quiet wins over --verbose; RUST_LOG only applies when neither is set.
    let filter = if args.quiet {
        tracing_subscriber::EnvFilter::new("error")
    } else if args.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_tracing(&args);
    cli::run(args)
}
