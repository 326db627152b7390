use antenna_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("{}", e);

        // No subscriber is installed when logging setup failed
        if matches!(e, antenna_cli::CliError::Logging { .. }) {
            eprintln!("antenna: {}", e);
        }

        std::process::exit(e.exit_code());
    }
}
