use dotenvy::dotenv;
use log::info;
use musd_matching_service::{
    cli::handle_command_line_args, config::ServiceConfig, service::run_service,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = match ServiceConfig::try_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return;
        },
    };

    info!("🚀️ Starting matching service against {}", config.rpc_url);
    match run_service(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
