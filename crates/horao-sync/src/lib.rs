//! Peer synchronizer for HORAO: threshold-triggered delta push over
//! HMAC-signed bearer auth.

mod error;
mod server;
mod store;
mod sync;

pub use error::SyncError;
pub use server::{router, ReceiverState};
pub use store::{MemoryStore, Store};
pub use sync::PeerSynchronizer;
