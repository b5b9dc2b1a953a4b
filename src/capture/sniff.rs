//! Capture format sniffing.
//!
//! A [`FormatSniffer`] holds a priority-ordered list of [`OpenRoutine`]s.
//! Sniffing reads one head buffer from the source, hands it to each routine
//! in turn, and rewinds the source to offset 0 before returning, so the
//! winning format's decoder always starts from a clean position regardless
//! of how many probes ran first.
//!
//! A routine answers [`Probe::Mine`] only after cross-checking enough of
//! the header to rule out a coincidental magic match. [`Probe::NotMine`] is
//! an ordinary negative answer; an `io::Error` aborts the whole sequence,
//! since later probes would see the same broken source.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::SniffError;

/// Bytes read from the head of the source for probing.
pub const SNIFF_HEAD_LEN: usize = 4096;

/// A routine's answer for one candidate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The routine recognizes the format and can decode the source.
    Mine,
    /// Not this routine's format. The sniffer moves on.
    NotMine,
}

/// One format's detection logic.
pub trait OpenRoutine: Send + Sync {
    /// Stable identifier for the format, returned by a successful sniff.
    fn name(&self) -> &'static str;

    /// Inspect the head of the source. `head` holds up to
    /// [`SNIFF_HEAD_LEN`] bytes starting at offset 0; `total_size` is the
    /// full source length in bytes.
    fn probe(&self, head: &[u8], total_size: u64) -> io::Result<Probe>;
}

struct Registration {
    priority: i32,
    order: usize,
    routine: Arc<dyn OpenRoutine>,
}

/// Priority-ordered capture format detector.
///
/// Routines with a higher priority probe first; routines sharing a
/// priority probe in registration order. Magic-number formats should
/// register above heuristic ones so a cheap exact match wins.
pub struct FormatSniffer {
    routines: Vec<Registration>,
    next_order: usize,
}

impl FormatSniffer {
    /// An empty sniffer with no routines.
    pub fn new() -> Self {
        Self {
            routines: Vec::new(),
            next_order: 0,
        }
    }

    /// A sniffer preloaded with the built-in pcapng and legacy pcap
    /// routines.
    pub fn with_builtin() -> Self {
        let mut sniffer = Self::new();
        sniffer.register(100, Arc::new(PcapNgRoutine));
        sniffer.register(90, Arc::new(LegacyPcapRoutine));
        sniffer
    }

    /// Register a routine at the given priority.
    pub fn register(&mut self, priority: i32, routine: Arc<dyn OpenRoutine>) {
        let order = self.next_order;
        self.next_order += 1;
        self.routines.push(Registration {
            priority,
            order,
            routine,
        });
        // Highest priority first; registration order breaks ties.
        self.routines
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.order.cmp(&b.order)));
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Identify the source's format.
    ///
    /// Reads the head once, probes each routine in priority order, and
    /// seeks the source back to offset 0 before returning in every case.
    /// Returns the winning routine's name, or
    /// [`SniffError::UnrecognizedFormat`] when every routine declines.
    pub fn sniff<R: Read + Seek>(&self, source: &mut R) -> Result<&'static str, SniffError> {
        let total_size = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let mut head = vec![0u8; SNIFF_HEAD_LEN.min(total_size as usize)];
        source.read_exact(&mut head)?;
        source.seek(SeekFrom::Start(0))?;

        for reg in &self.routines {
            match reg.routine.probe(&head, total_size)? {
                Probe::Mine => {
                    debug!(format = reg.routine.name(), "capture format recognized");
                    return Ok(reg.routine.name());
                }
                Probe::NotMine => {
                    trace!(format = reg.routine.name(), "probe declined");
                }
            }
        }
        Err(SniffError::UnrecognizedFormat)
    }
}

impl Default for FormatSniffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Legacy pcap magic numbers: microsecond and nanosecond resolution, in
/// both byte orders as stored on disk.
const LEGACY_MAGICS: [[u8; 4]; 4] = [
    [0xd4, 0xc3, 0xb2, 0xa1], // 0xa1b2c3d4 little-endian, micro
    [0xa1, 0xb2, 0xc3, 0xd4], // big-endian, micro
    [0x4d, 0x3c, 0xb2, 0xa1], // 0xa1b23c4d little-endian, nano
    [0xa1, 0xb2, 0x3c, 0x4d], // big-endian, nano
];

/// Built-in legacy pcap detector.
///
/// Matching the magic alone is not enough: the version field is
/// cross-checked so random data starting with a magic-like prefix is
/// demoted to `NotMine` instead of being claimed and failing later.
pub struct LegacyPcapRoutine;

impl OpenRoutine for LegacyPcapRoutine {
    fn name(&self) -> &'static str {
        "pcap"
    }

    fn probe(&self, head: &[u8], _total_size: u64) -> io::Result<Probe> {
        if head.len() < 8 {
            return Ok(Probe::NotMine);
        }
        let magic: [u8; 4] = [head[0], head[1], head[2], head[3]];
        if !LEGACY_MAGICS.contains(&magic) {
            return Ok(Probe::NotMine);
        }
        // Byte-swapped magics mean the writer's byte order differs from
        // the on-disk reading order.
        let big_endian = magic[0] == 0xa1;
        let version_major = if big_endian {
            u16::from_be_bytes([head[4], head[5]])
        } else {
            u16::from_le_bytes([head[4], head[5]])
        };
        if version_major != 2 {
            return Ok(Probe::NotMine);
        }
        Ok(Probe::Mine)
    }
}

/// Built-in pcapng detector.
///
/// The section header block type 0x0A0D0D0A is palindromic and could occur
/// in other data, so the byte-order magic at offset 8 is cross-checked
/// before claiming the source.
pub struct PcapNgRoutine;

impl OpenRoutine for PcapNgRoutine {
    fn name(&self) -> &'static str {
        "pcapng"
    }

    fn probe(&self, head: &[u8], _total_size: u64) -> io::Result<Probe> {
        if head.len() < 12 {
            return Ok(Probe::NotMine);
        }
        if head[0..4] != [0x0a, 0x0d, 0x0d, 0x0a] {
            return Ok(Probe::NotMine);
        }
        let bom = u32::from_le_bytes([head[8], head[9], head[10], head[11]]);
        if bom != 0x1a2b_3c4d && bom != 0x4d3c_2b1a {
            return Ok(Probe::NotMine);
        }
        Ok(Probe::Mine)
    }
}
