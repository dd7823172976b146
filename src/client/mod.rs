// ABOUTME: Gateway client module: connection engine, sessions and the protocol extension point
// ABOUTME: Exports all client components including the engine, sessions, configuration and error types

//! Gateway Client Module
//!
//! This module provides the connection engine shared by every protocol
//! binding:
//!
//! * **Correlation** - replies are matched to requests by sequence id, in any order
//! * **Admission window** - a bounded number of outstanding requests per socket
//! * **Shared sockets** - sessions to the same `host:port` reuse one link
//! * **Keepalive** - periodic link checks, restarted by the next login after a failure
//! * **Segmentation** - long content split with a concatenation header
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sms_gateway::client::{ClientBuilder, GatewayConfig};
//! use sms_gateway::cmpp::{Cmpp, CmppCredentials};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = CmppCredentials::new("901234", "secret", "NEWS", "10657000");
//! let session = ClientBuilder::new(Cmpp::new())
//!     .config(GatewayConfig::default().with_reply_timeout(Duration::from_secs(30)))
//!     .connect("gateway.example.com", 7890, credentials)
//!     .await?;
//!
//! session.login().await?;
//! let result = session
//!     .submit(&["13800000000".to_string()], "Hello!")
//!     .await?;
//! println!("{}", session.status());
//!
//! session.dispose().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! * `Protocol` - message building and reply interpretation for one binding
//! * `Gateway` - sequence allocator, pending-reply table, buffer pool, socket registry
//! * `Session` - login, submit and disposal for one identity on one endpoint
//! * `SocketManager` / `SmsSocket` - shared links with their reader and keepalive tasks

pub mod buffer_pool;
pub mod builder;
pub mod engine;
pub mod error;
pub mod flow_control;
pub mod keepalive;
pub mod pending;
pub mod sequence;
pub mod session;
pub mod socket;
pub mod traits;
pub mod types;
pub mod udhi;

// Re-export the main types for easy access
pub use buffer_pool::BufferPool;
pub use builder::{ClientBuilder, GatewayConfig};
pub use engine::Gateway;
pub use error::{SmsError, SmsResult, TransportError};
pub use flow_control::AdmissionWindow;
pub use keepalive::KeepAliveConfig;
pub use pending::PendingTable;
pub use sequence::SequenceAllocator;
pub use session::Session;
pub use socket::{FrameHandler, SmsSocket, SocketManager};
pub use traits::Protocol;
pub use types::{GatewayStatus, LinkState, Segment};
