// ABOUTME: Minimal CMPP gateway for local testing that answers every request after a short random delay
// ABOUTME: Replies carry the response bit of the request's command id and echo its sequence id

use argh::FromArgs;
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use sms_gateway::codec::{Encodable, PduHeader, peek_command_id, peek_sequence_id};
use sms_gateway::connection::FrameReader;
use sms_gateway::datatypes::{
    ActiveTestResponse, CommandId, ConnectResponse, SubmitResponse, TerminateResponse,
};
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Mock CMPP gateway answering connect, submit, active test and terminate
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the address to listen on (default: 127.0.0.1)
    #[argh(option)]
    host: Option<String>,

    /// the port to listen on (default: 7890)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// status returned to every login (default: 0)
    #[argh(option)]
    login_status: Option<u8>,

    /// result returned to every submit (default: 0)
    #[argh(option)]
    submit_result: Option<u8>,

    /// largest reply delay in milliseconds (default: 50)
    #[argh(option)]
    max_delay: Option<u64>,
}

#[derive(Debug)]
struct Behaviour {
    login_status: u8,
    submit_result: u8,
    max_delay: u64,
    msg_ids: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let host = cli_args.host.unwrap_or_else(|| "127.0.0.1".to_owned());
    let port = cli_args.port.unwrap_or(7890);
    let behaviour = Arc::new(Behaviour {
        login_status: cli_args.login_status.unwrap_or(0),
        submit_result: cli_args.submit_result.unwrap_or(0),
        max_delay: cli_args.max_delay.unwrap_or(50),
        msg_ids: AtomicU64::new(1),
    });

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!("Mock gateway listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "client connected");

        let behaviour = Arc::clone(&behaviour);
        tokio::spawn(async move {
            if let Err(e) = serve(stream, behaviour).await {
                warn!(%peer, "connection ended with error: {}", e);
            } else {
                info!(%peer, "client disconnected");
            }
        });
    }
}

async fn serve(stream: TcpStream, behaviour: Arc<Behaviour>) -> sms_gateway::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let writer = Arc::new(Mutex::new(write_half));
    let mut reader = FrameReader::new(read_half);

    while let Some(frame) = reader.read_frame().await? {
        let sequence = peek_sequence_id(&frame);
        let Some(reply) = reply_to(&frame, &behaviour)? else {
            continue;
        };

        let delay = rand::thread_rng().gen_range(0..=behaviour.max_delay);
        let writer = Arc::clone(&writer);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if let Err(e) = write(&writer, &reply).await {
                warn!(sequence, "reply failed: {}", e);
            }
        });
    }
    Ok(())
}

async fn write(writer: &Mutex<OwnedWriteHalf>, frame: &[u8]) -> std::io::Result<()> {
    writer.lock().await.write_all(frame).await
}

/// Build the answer to one request; responses from the client get none
fn reply_to(frame: &[u8], behaviour: &Behaviour) -> sms_gateway::Result<Option<Bytes>> {
    let sequence = peek_sequence_id(frame);
    let Some(command) = peek_command_id(frame) else {
        debug!(sequence, "unknown command, echoing response header");
        return Ok(Some(bare_response(frame)));
    };
    if command.is_response() {
        debug!(?command, sequence, "client response");
        return Ok(None);
    }
    debug!(?command, sequence, "request");

    let reply = match command {
        CommandId::Connect => ConnectResponse::new(sequence, behaviour.login_status).to_bytes()?,
        CommandId::Submit => {
            let msg_id = behaviour.msg_ids.fetch_add(1, Ordering::Relaxed);
            SubmitResponse::new(sequence, msg_id, behaviour.submit_result).to_bytes()?
        }
        CommandId::ActiveTest => ActiveTestResponse::new(sequence).to_bytes()?,
        CommandId::Terminate => TerminateResponse::new(sequence).to_bytes()?,
        _ => bare_response(frame),
    };
    Ok(Some(reply))
}

/// A header-only frame with the response bit set and the same sequence id
fn bare_response(frame: &[u8]) -> Bytes {
    let command = frame
        .get(4..8)
        .map(|raw| u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
        .unwrap_or_default();

    let mut buf = BytesMut::with_capacity(PduHeader::SIZE);
    buf.put_u32(PduHeader::SIZE as u32);
    buf.put_u32(0x8000_0000 | command);
    buf.put_u32(peek_sequence_id(frame));
    buf.freeze()
}
