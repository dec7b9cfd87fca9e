// Shared memory transport
// Publishes the resolved state to external consumer processes and polls
// their command mailbox, over a fixed 100-byte segment

pub mod layout;
pub mod shm;

pub use layout::{event_from_code, event_to_code, CommandType, PROTOCOL_VERSION, SEGMENT_SIZE};
pub use shm::{SharedTransport, Snapshot, TransportClient, TransportCommand, TransportError};
