// Shared memory channel
// The publisher maps a named 100-byte segment, overwrites the data slots
// every tick and polls the command mailbox; consumer processes attach with
// TransportClient. Field groups are published timestamp-last so readers
// can detect torn multi-field reads and retry.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use memmap2::MmapMut;
use thiserror::Error;

use crate::decision::Decision;
use crate::signal::{EegSample, EventKind};
use crate::transport::layout::{self, CommandType, PROTOCOL_VERSION, SEGMENT_SIZE};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("shared memory unavailable: {0}")]
    Unavailable(String),

    #[error("segment version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A command drained from the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCommand {
    pub command_type: CommandType,

    /// Event the consumer asked to record; None when the code slot held 0
    pub event: Option<EventKind>,

    /// Consumer-side timestamp, opaque to the publisher
    pub timestamp: i32,
}

/// Coherent multi-field read of the publisher-owned slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: i32,
    pub attention: i32,
    pub meditation: i32,
    pub signal: i32,
    pub bands: [i32; 8],
    pub event: Option<EventKind>,
    pub gyro: (i32, i32, i32),
}

/// Where segment files live: /dev/shm when the platform has it, so the
/// mapping is backed by memory rather than disk
fn segment_path(name: &str) -> PathBuf {
    let shm_dir = Path::new("/dev/shm");
    if shm_dir.is_dir() {
        shm_dir.join(name)
    } else {
        std::env::temp_dir().join(name)
    }
}

/// A mapped segment; both endpoints go through per-slot atomics
struct Segment {
    map: MmapMut,
    _file: File,
}

impl Segment {
    fn map_file(file: File) -> Result<Self, std::io::Error> {
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Segment { map, _file: file })
    }

    /// The slot as an atomic. The mapping is page-aligned and slots are
    /// 4-byte aligned within it, so the cast is sound.
    fn slot(&self, index: usize) -> &AtomicI32 {
        debug_assert!(index < layout::SLOT_COUNT);
        unsafe { &*(self.map.as_ptr().add(index * 4) as *const AtomicI32) }
    }
}

/// Publisher endpoint. Creating it maps the named segment and writes the
/// protocol version; dropping it unlinks the segment, discarding any
/// pending unread command.
pub struct SharedTransport {
    segment: Segment,
    path: PathBuf,
    name: String,

    /// Scopes each multi-slot write group; held only for the duration of
    /// the slot stores
    write_lock: Mutex<()>,

    started: Instant,
}

impl SharedTransport {
    /// Default segment name existing consumers look for
    pub const DEFAULT_NAME: &'static str = "brainlink_data";

    /// Create the named segment. Any stale segment left over from a crash
    /// is removed first. Failure is surfaced here, at enable time; the
    /// pipeline continues without publishing.
    pub fn create(name: &str) -> Result<Self, TransportError> {
        let path = segment_path(name);

        // Stale file from a previous run
        match std::fs::remove_file(&path) {
            Ok(()) => log::info!("Removed stale segment {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(TransportError::Unavailable(e.to_string())),
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        file.set_len(SEGMENT_SIZE as u64)
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let segment =
            Segment::map_file(file).map_err(|e| TransportError::Unavailable(e.to_string()))?;

        // Fresh file content is zeroed; only the version needs writing
        segment
            .slot(layout::SLOT_VERSION)
            .store(PROTOCOL_VERSION, Ordering::Release);

        log::info!(
            "Shared transport started: {} ({} bytes)",
            path.display(),
            SEGMENT_SIZE
        );

        Ok(SharedTransport {
            segment,
            path,
            name: name.to_string(),
            write_lock: Mutex::new(()),
            started: Instant::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write the current sample and resolved decision into slots 2-13,
    /// then the timestamp slot, inside one narrow critical section. The
    /// timestamp is written last so consumers can use it for staleness
    /// detection across the field group.
    pub fn publish(&self, sample: &EegSample, decision: &Decision) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let s = &self.segment;

        s.slot(layout::SLOT_ATTENTION)
            .store(sample.attention, Ordering::Relaxed);
        s.slot(layout::SLOT_MEDITATION)
            .store(sample.meditation, Ordering::Relaxed);
        s.slot(layout::SLOT_SIGNAL)
            .store(sample.signal, Ordering::Relaxed);
        s.slot(layout::SLOT_DELTA)
            .store(sample.delta, Ordering::Relaxed);
        s.slot(layout::SLOT_THETA)
            .store(sample.theta, Ordering::Relaxed);
        s.slot(layout::SLOT_LOW_ALPHA)
            .store(sample.low_alpha, Ordering::Relaxed);
        s.slot(layout::SLOT_HIGH_ALPHA)
            .store(sample.high_alpha, Ordering::Relaxed);
        s.slot(layout::SLOT_LOW_BETA)
            .store(sample.low_beta, Ordering::Relaxed);
        s.slot(layout::SLOT_HIGH_BETA)
            .store(sample.high_beta, Ordering::Relaxed);
        s.slot(layout::SLOT_LOW_GAMMA)
            .store(sample.low_gamma, Ordering::Relaxed);
        s.slot(layout::SLOT_HIGH_GAMMA)
            .store(sample.high_gamma, Ordering::Relaxed);
        s.slot(layout::SLOT_EVENT_CODE)
            .store(layout::event_to_code(decision.event), Ordering::Relaxed);

        s.slot(layout::SLOT_TIMESTAMP)
            .store(self.elapsed_ms(), Ordering::Release);
    }

    /// Update the gyro slots (fed by the head tracker, off the EEG path)
    pub fn set_gyro(&self, x: i32, y: i32, z: i32) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.segment.slot(layout::SLOT_GYRO_X).store(x, Ordering::Relaxed);
        self.segment.slot(layout::SLOT_GYRO_Y).store(y, Ordering::Relaxed);
        self.segment
            .slot(layout::SLOT_GYRO_Z)
            .store(z, Ordering::Release);
    }

    /// Update the extended device slots
    pub fn set_extended(&self, ap: i32, electric: i32, temp: i32, heart: i32) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.segment.slot(layout::SLOT_AP).store(ap, Ordering::Relaxed);
        self.segment
            .slot(layout::SLOT_ELECTRIC)
            .store(electric, Ordering::Relaxed);
        self.segment.slot(layout::SLOT_TEMP).store(temp, Ordering::Relaxed);
        self.segment
            .slot(layout::SLOT_HEART)
            .store(heart, Ordering::Release);
    }

    /// Poll the command mailbox. If a command is pending its fields are
    /// read and the pending flag is cleared, acknowledging the write
    /// exactly once. Unknown command types are dropped with a warning and
    /// the mailbox is still cleared. `pending == 0` is a no-op.
    pub fn drain(&self) -> Option<TransportCommand> {
        let s = &self.segment;

        if s.slot(layout::SLOT_COMMAND_PENDING).load(Ordering::Acquire) != 1 {
            return None;
        }

        let type_code = s.slot(layout::SLOT_COMMAND_TYPE).load(Ordering::Relaxed);
        let event_code = s
            .slot(layout::SLOT_COMMAND_EVENT_CODE)
            .load(Ordering::Relaxed);
        let timestamp = s
            .slot(layout::SLOT_COMMAND_TIMESTAMP)
            .load(Ordering::Relaxed);

        s.slot(layout::SLOT_COMMAND_PENDING)
            .store(0, Ordering::Release);

        let Some(command_type) = CommandType::from_code(type_code) else {
            log::warn!("Malformed command dropped: unknown type {}", type_code);
            return None;
        };

        let command = TransportCommand {
            command_type,
            event: layout::event_from_code(event_code),
            timestamp,
        };
        log::info!(
            "Command received: type={:?} event={}",
            command.command_type,
            command.event.map_or("none", |e| e.as_str())
        );
        Some(command)
    }

    fn elapsed_ms(&self) -> i32 {
        self.started.elapsed().as_millis() as i32
    }
}

impl Drop for SharedTransport {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to unlink segment {}: {}", self.path.display(), e);
            }
        }
        log::info!("Shared transport stopped: {}", self.name);
    }
}

/// Consumer endpoint: attaches to an existing segment, verifies the
/// protocol version, reads snapshots and writes commands.
pub struct TransportClient {
    segment: Segment,
}

impl TransportClient {
    /// How many times a snapshot read retries when the publisher updates
    /// the segment mid-read
    const SNAPSHOT_RETRIES: usize = 64;

    pub fn open(name: &str) -> Result<Self, TransportError> {
        let path = segment_path(name);
        if !path.exists() {
            return Err(TransportError::Unavailable(format!(
                "segment {} does not exist",
                path.display()
            )));
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        if file.metadata()?.len() < SEGMENT_SIZE as u64 {
            return Err(TransportError::Unavailable(format!(
                "segment {} is smaller than {} bytes",
                path.display(),
                SEGMENT_SIZE
            )));
        }

        let segment = Segment::map_file(file)?;

        let found = segment.slot(layout::SLOT_VERSION).load(Ordering::Acquire);
        if found != PROTOCOL_VERSION {
            return Err(TransportError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found,
            });
        }

        Ok(TransportClient { segment })
    }

    /// Read the publisher-owned slots as one coherent group, using the
    /// timestamp-retry pattern: the read is repeated while the timestamp
    /// changes underneath it. Individual slot reads are atomic either way;
    /// only cross-field consistency needs the retry.
    pub fn read_snapshot(&self) -> Snapshot {
        let s = &self.segment;
        let mut snapshot;
        let mut retries = Self::SNAPSHOT_RETRIES;

        loop {
            let before = s.slot(layout::SLOT_TIMESTAMP).load(Ordering::Acquire);

            snapshot = Snapshot {
                timestamp: before,
                attention: s.slot(layout::SLOT_ATTENTION).load(Ordering::Relaxed),
                meditation: s.slot(layout::SLOT_MEDITATION).load(Ordering::Relaxed),
                signal: s.slot(layout::SLOT_SIGNAL).load(Ordering::Relaxed),
                bands: [
                    s.slot(layout::SLOT_DELTA).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_THETA).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_LOW_ALPHA).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_HIGH_ALPHA).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_LOW_BETA).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_HIGH_BETA).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_LOW_GAMMA).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_HIGH_GAMMA).load(Ordering::Relaxed),
                ],
                event: layout::event_from_code(
                    s.slot(layout::SLOT_EVENT_CODE).load(Ordering::Relaxed),
                ),
                gyro: (
                    s.slot(layout::SLOT_GYRO_X).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_GYRO_Y).load(Ordering::Relaxed),
                    s.slot(layout::SLOT_GYRO_Z).load(Ordering::Relaxed),
                ),
            };

            let after = s.slot(layout::SLOT_TIMESTAMP).load(Ordering::Acquire);
            if before == after || retries == 0 {
                return snapshot;
            }
            retries -= 1;
        }
    }

    /// Send a command to the publisher. The data slots are written first
    /// and the pending flag last; that ordering is mandatory so the
    /// publisher's drain never observes a half-written command.
    pub fn write_command(
        &self,
        command_type: CommandType,
        event: Option<EventKind>,
        timestamp: i32,
    ) {
        let s = &self.segment;
        s.slot(layout::SLOT_COMMAND_TYPE)
            .store(command_type.code(), Ordering::Relaxed);
        s.slot(layout::SLOT_COMMAND_EVENT_CODE)
            .store(layout::event_to_code(event), Ordering::Relaxed);
        s.slot(layout::SLOT_COMMAND_TIMESTAMP)
            .store(timestamp, Ordering::Relaxed);
        s.slot(layout::SLOT_COMMAND_PENDING)
            .store(1, Ordering::Release);
    }

    /// Whether the previously written command is still unacknowledged
    pub fn command_pending(&self) -> bool {
        self.segment
            .slot(layout::SLOT_COMMAND_PENDING)
            .load(Ordering::Acquire)
            == 1
    }
}
