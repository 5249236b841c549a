use clap::Parser;
use trackbook::cli::{handle_command, handle_init, Cli, Commands};
use trackbook::logging::{init_logging, LogConfig};

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose));

    let result = match cli.command {
        Commands::Init => handle_init(cli.app.as_deref()),
        command => handle_command(cli.app.as_deref(), command),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
