// ABOUTME: Command line tool that logs in to a CMPP gateway and submits one message
// ABOUTME: Prints the gateway's result code and the session's activity summary

use argh::FromArgs;
use sms_gateway::client::{ClientBuilder, GatewayConfig, KeepAliveConfig};
use sms_gateway::cmpp::{Cmpp, CmppCredentials};
use std::error::Error;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Send an SMS through a CMPP 2.0 gateway
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the SP enterprise code used to log in
    #[argh(option)]
    source_addr: String,

    /// the shared secret used to sign the login
    #[argh(option)]
    secret: String,

    /// the service id stamped on each submit (default: empty)
    #[argh(option)]
    service_id: Option<String>,

    /// the number the message will be from
    #[argh(option, short = 'f')]
    from: String,

    /// the hostname or IP address of the gateway (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port to use when connecting to the gateway (default: 7890)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// a recipient telephone number; repeat for several recipients
    #[argh(option, short = 't')]
    to: Vec<String>,

    /// the message to send
    #[argh(option, short = 'm')]
    message: String,

    /// seconds to wait for each reply (default: 60)
    #[argh(option)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if cli_args.to.is_empty() {
        return Err("at least one --to recipient is required".into());
    }

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(7890);
    let credentials = CmppCredentials::new(
        cli_args.source_addr,
        cli_args.secret,
        cli_args.service_id.unwrap_or_default(),
        cli_args.from,
    );
    let config = GatewayConfig::default()
        .with_reply_timeout(Duration::from_secs(cli_args.timeout.unwrap_or(60)));

    info!("Connecting to {host}:{port}");
    let session = ClientBuilder::new(Cmpp::new())
        .config(config)
        .keep_alive(KeepAliveConfig::disabled())
        .connect(&host, port, credentials)
        .await
        .map_err(|e| {
            error!("Connection failed: {e}");
            e
        })?;

    let outcome = match session.login().await {
        Ok(()) => {
            info!("Logged in");
            session.submit(&cli_args.to, &cli_args.message).await
        }
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(0) => info!("Message accepted for {} recipient(s)", cli_args.to.len()),
        Ok(result) => error!("Gateway rejected the message with result {result}"),
        Err(e) if e.is_transport() => error!("Link to {host}:{port} failed: {e}"),
        Err(e) => error!("Send failed: {e}"),
    }
    println!("{}", session.status());

    session.dispose().await;
    outcome?;
    Ok(())
}
