use clap::Parser;
use log::info;
use server::Server;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Quiz file to load at startup
    #[arg(short, long, default_value = "quiz_qa.txt")]
    questions: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    // A malformed quiz file is fatal.
    let mut server =
        Server::new(format!("{}:{}", args.host, args.port)).load_question_file(&args.questions)?;
    server.start().await?;

    info!("Press Ctrl+C to stop the server");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    server.stop().await;
    Ok(())
}
