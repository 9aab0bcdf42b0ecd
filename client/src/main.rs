use clap::Parser;
use client::{ClientError, QuizClient};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Display name to join with
    #[arg(short = 'n', long)]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let mut client = QuizClient::connect(args.server.as_str()).await?;

    match client.join(&args.name).await {
        Ok(name) => println!("Welcome, {name}"),
        Err(ClientError::Rejected(reason)) => {
            error!("Join error: {}", reason);
            return Err(ClientError::Rejected(reason).into());
        }
        Err(e) => return Err(e.into()),
    }

    println!("Enter messages to send ('quit' to leave)");
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = stdin.next_line() => match line? {
                Some(text) if text.trim().eq_ignore_ascii_case("quit") => break,
                Some(text) => client.send(&text).await?,
                None => break,
            },

            message = client.recv() => match message {
                Ok(Some(message)) => info!("Server: {:?}", message),
                Ok(None) => {
                    warn!("Server closed the connection");
                    return Ok(());
                }
                Err(ClientError::UnexpectedResponse(line)) => {
                    warn!("Ignoring unexpected server message: {}", line)
                }
                Err(e) => {
                    error!("Connection lost: {}", e);
                    return Err(e.into());
                }
            },
        }
    }

    client.close().await?;
    Ok(())
}
