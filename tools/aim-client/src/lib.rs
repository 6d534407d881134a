//! AIM client: signs calls with a wallet key and sends them to a node.
//!
//! ```text
//! aim-client ──(signed headers)──→ http://<node>/aim/<slot><uri>
//!      │
//!      ├──(sender)──→ http://<node>/nonce
//!      └──→ http://<seed>/nodes, http://<node>/info, http://<node>/balance
//! ```

pub mod client;
pub mod config;

pub use client::{discover_nodes, parse_header_json, AimClient, ClientError, NodeResponse};
pub use config::ClientConfig;
