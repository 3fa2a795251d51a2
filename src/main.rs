use clap::Parser;

mod cli;
use cli::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("RTDBG_LOG", "warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli::commands::run(cli) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}
