//! Asynchronous client for operator SMS gateway protocols.
//!
//! The [`client`] module holds the protocol-independent connection engine;
//! [`cmpp`] binds it to CMPP 2.0. The codec layer ([`codec`], [`datatypes`])
//! encodes and decodes the CMPP messages, and [`connection`] splits a byte
//! stream into whole frames.

pub mod client;
pub mod cmpp;
pub mod codec;
pub mod connection;
pub mod datatypes;
pub mod frame;

mod macros;


// Re-export codec types for direct access
pub use codec::{CodecError, Decodable, Encodable, Frame, PduHeader, PduRegistry, Sequenced};

// Re-export the main client API for easy access
pub use client::{
    ClientBuilder, Gateway, GatewayConfig, GatewayStatus, KeepAliveConfig, Protocol, Session,
    SmsError, SmsResult, TransportError,
};
pub use cmpp::{Cmpp, CmppCredentials};

/// Error returned by the frame reader and the binaries.
///
/// The client API has its own error types ([`SmsError`], [`TransportError`]);
/// this boxed error is only used at the edges, where a partial frame or a
/// failed socket read is handled by whoever owns the stream.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for frame reading and the binaries.
///
/// # Examples
///
/// ```rust,no_run
/// use sms_gateway::{ClientBuilder, Cmpp, CmppCredentials};
///
/// #[tokio::main]
/// async fn main() -> sms_gateway::Result<()> {
///     let credentials = CmppCredentials::new("901234", "secret", "NEWS", "10657000");
///     let session = ClientBuilder::new(Cmpp::new())
///         .connect("localhost", 7890, credentials)
///         .await?;
///
///     session.login().await?;
///     let result = session
///         .submit(&["13800000000".to_string()], "Hello, World!")
///         .await?;
///     println!("gateway result: {result}");
///
///     session.dispose().await;
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;
