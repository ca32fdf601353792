use analytics_gateway::cli::{
    handle_call, handle_config_init, handle_services, serve::run_serve, Cli, Commands,
    ConfigCommands,
};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Call(args) => handle_call(&args).await.map(|output| println!("{}", output)),
        Commands::Services(args) => handle_services(&args)
            .await
            .map(|output| println!("{}", output)),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
