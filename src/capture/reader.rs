//! Frame extraction from pcap and pcapng streams.
//!
//! [`CaptureReader`] wraps `pcap_parser` with enum dispatch over the two
//! built-in formats and yields one [`Frame`] per captured packet, carrying
//! the capture's link type and the caplen/origlen pair into the frame's
//! [`ByteView`]. Gzip-compressed captures are inflated transparently
//! before sniffing.

use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};

use bytes::Bytes;
use flate2::read::GzDecoder;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapNGReader};
use tracing::debug;

use crate::buffer::ByteView;
use crate::capture::{Compression, FormatSniffer, Frame};
use crate::error::{CaptureError, Error};

/// Buffer size for pcap_parser readers.
const BUFFER_SIZE: usize = 262144;

/// Capture file format, as reported by the built-in sniffer routines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureFormat {
    /// Classic pcap, any byte order or timestamp resolution
    Legacy,
    /// pcapng
    PcapNg,
}

impl CaptureFormat {
    /// Map a sniffed format name to a decodable format.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pcap" => Some(CaptureFormat::Legacy),
            "pcapng" => Some(CaptureFormat::PcapNg),
            _ => None,
        }
    }
}

/// Source feeding a [`CaptureReader`]: either the caller's stream, or an
/// in-memory copy inflated from a compressed capture.
pub enum CaptureSource<R: Read> {
    Plain(R),
    Inflated(Cursor<Vec<u8>>),
}

impl<R: Read> Read for CaptureSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            CaptureSource::Plain(r) => r.read(buf),
            CaptureSource::Inflated(r) => r.read(buf),
        }
    }
}

impl<R: Read + Seek> Seek for CaptureSource<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            CaptureSource::Plain(r) => r.seek(pos),
            CaptureSource::Inflated(r) => r.seek(pos),
        }
    }
}

/// Frame stream over a pcap or pcapng source.
pub struct CaptureReader<R: Read> {
    inner: ReaderInner<R>,
    format: CaptureFormat,
    frame_number: u64,
    link_type: u32,
}

enum ReaderInner<R: Read> {
    Legacy(LegacyPcapReader<BufReader<R>>),
    Ng(PcapNGReader<BufReader<R>>),
}

impl<R: Read + Seek> CaptureReader<CaptureSource<R>> {
    /// Sniff and open a capture from any seekable source.
    ///
    /// Gzip-compressed captures are inflated into memory first; the
    /// sniffer then identifies the inner format.
    pub fn open(mut source: R) -> Result<Self, Error> {
        let mut magic = [0u8; 2];
        let got = source.read(&mut magic).map_err(CaptureError::Io)?;
        source
            .seek(SeekFrom::Start(0))
            .map_err(CaptureError::Io)?;

        let mut src = if Compression::detect(&magic[..got]).is_compressed() {
            debug!("gzip capture, inflating before sniff");
            let mut inflated = Vec::new();
            GzDecoder::new(source)
                .read_to_end(&mut inflated)
                .map_err(CaptureError::Io)?;
            CaptureSource::Inflated(Cursor::new(inflated))
        } else {
            CaptureSource::Plain(source)
        };

        let name = FormatSniffer::with_builtin().sniff(&mut src)?;
        let format = CaptureFormat::from_name(name).ok_or_else(|| CaptureError::Malformed {
            reason: format!("sniffer reported undecodable format: {name}"),
        })?;
        Self::with_format(src, format)
    }
}

impl<R: Read> CaptureReader<R> {
    /// Open a capture whose format is already known.
    ///
    /// The source must be positioned at offset 0.
    pub fn with_format(source: R, format: CaptureFormat) -> Result<Self, Error> {
        let buf_reader = BufReader::with_capacity(BUFFER_SIZE, source);

        let inner = match format {
            CaptureFormat::PcapNg => {
                let reader = PcapNGReader::new(BUFFER_SIZE, buf_reader).map_err(|e| {
                    CaptureError::Malformed {
                        reason: format!("failed to parse pcapng: {e}"),
                    }
                })?;
                ReaderInner::Ng(reader)
            }
            CaptureFormat::Legacy => {
                let reader = LegacyPcapReader::new(BUFFER_SIZE, buf_reader).map_err(|e| {
                    CaptureError::Malformed {
                        reason: format!("failed to parse pcap: {e}"),
                    }
                })?;
                ReaderInner::Legacy(reader)
            }
        };

        Ok(CaptureReader {
            inner,
            format,
            frame_number: 0,
            link_type: 1, // default to Ethernet until a header block says otherwise
        })
    }

    /// Read the next frame. Returns `Ok(None)` at end of capture.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        match &mut self.inner {
            ReaderInner::Legacy(reader) => {
                read_legacy_frame(reader, &mut self.frame_number, &mut self.link_type)
            }
            ReaderInner::Ng(reader) => {
                read_pcapng_frame(reader, &mut self.frame_number, &mut self.link_type)
            }
        }
    }

    /// The format this reader is decoding.
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Link-layer type from the capture headers (e.g. 1 = Ethernet).
    pub fn link_type(&self) -> u32 {
        self.link_type
    }

    /// Frames read so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_number
    }
}

fn make_frame(
    frame_number: u64,
    timestamp_micros: i64,
    link_type: u32,
    caplen: u32,
    origlen: u32,
    data: &[u8],
) -> Frame {
    // pcap_parser hands us caplen bytes; honor a smaller declared caplen
    // anyway rather than trusting the block framing over the header.
    let cap = (caplen as usize).min(data.len());
    let reported = (origlen as usize).max(cap);
    Frame {
        frame_number,
        timestamp_micros,
        link_type: link_type as u16,
        data: ByteView::with_reported(Bytes::copy_from_slice(&data[..cap]), reported),
    }
}

fn read_legacy_frame<S: Read>(
    reader: &mut LegacyPcapReader<S>,
    frame_number: &mut u64,
    link_type: &mut u32,
) -> Result<Option<Frame>, Error> {
    use pcap_parser::PcapError as PcapParserError;

    loop {
        match reader.next() {
            Ok((offset, block)) => match block {
                PcapBlockOwned::Legacy(packet) => {
                    *frame_number += 1;
                    let timestamp_micros =
                        (packet.ts_sec as i64) * 1_000_000 + (packet.ts_usec as i64);
                    let frame = make_frame(
                        *frame_number,
                        timestamp_micros,
                        *link_type,
                        packet.caplen,
                        packet.origlen,
                        packet.data,
                    );
                    reader.consume(offset);
                    return Ok(Some(frame));
                }
                PcapBlockOwned::LegacyHeader(header) => {
                    *link_type = header.network.0 as u32;
                    reader.consume(offset);
                    continue;
                }
                _ => {
                    reader.consume(offset);
                    continue;
                }
            },
            Err(PcapParserError::Eof) => return Ok(None),
            Err(PcapParserError::Incomplete(_)) => {
                reader.refill().map_err(|e| CaptureError::Malformed {
                    reason: format!("pcap refill error: {e}"),
                })?;
                continue;
            }
            Err(e) => {
                return Err(CaptureError::Malformed {
                    reason: format!("pcap parse error: {e}"),
                }
                .into());
            }
        }
    }
}

fn read_pcapng_frame<S: Read>(
    reader: &mut PcapNGReader<S>,
    frame_number: &mut u64,
    link_type: &mut u32,
) -> Result<Option<Frame>, Error> {
    use pcap_parser::PcapError as PcapParserError;

    loop {
        match reader.next() {
            Ok((offset, block)) => match block {
                PcapBlockOwned::NG(ng_block) => {
                    use pcap_parser::pcapng::Block;

                    match ng_block {
                        Block::InterfaceDescription(idb) => {
                            *link_type = idb.linktype.0 as u32;
                            reader.consume(offset);
                            continue;
                        }
                        Block::EnhancedPacket(epb) => {
                            *frame_number += 1;
                            let timestamp_micros =
                                ((epb.ts_high as i64) << 32) | (epb.ts_low as i64);
                            let frame = make_frame(
                                *frame_number,
                                timestamp_micros,
                                *link_type,
                                epb.caplen,
                                epb.origlen,
                                epb.data,
                            );
                            reader.consume(offset);
                            return Ok(Some(frame));
                        }
                        Block::SimplePacket(spb) => {
                            *frame_number += 1;
                            let frame = make_frame(
                                *frame_number,
                                0,
                                *link_type,
                                spb.data.len() as u32,
                                spb.origlen,
                                spb.data,
                            );
                            reader.consume(offset);
                            return Ok(Some(frame));
                        }
                        _ => {
                            reader.consume(offset);
                            continue;
                        }
                    }
                }
                _ => {
                    reader.consume(offset);
                    continue;
                }
            },
            Err(PcapParserError::Eof) => return Ok(None),
            Err(PcapParserError::Incomplete(_)) => {
                reader.refill().map_err(|e| CaptureError::Malformed {
                    reason: format!("pcapng refill error: {e}"),
                })?;
                continue;
            }
            Err(e) => {
                return Err(CaptureError::Malformed {
                    reason: format!("pcapng parse error: {e}"),
                }
                .into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SniffError;
    use std::io::Write;

    /// Minimal legacy pcap: global header plus one 14-byte Ethernet frame.
    fn minimal_pcap() -> Vec<u8> {
        let mut data = Vec::new();

        data.extend_from_slice(&[0xd4, 0xc3, 0xb2, 0xa1]); // magic (LE micro)
        data.extend_from_slice(&[0x02, 0x00]); // version major
        data.extend_from_slice(&[0x04, 0x00]); // version minor
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // thiszone
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // sigfigs
        data.extend_from_slice(&[0xff, 0xff, 0x00, 0x00]); // snaplen
        data.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]); // network (Ethernet)

        let packet_data = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // dst MAC
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src MAC
            0x08, 0x00, // EtherType (IPv4)
        ];
        data.extend_from_slice(&1_000_000_000u32.to_le_bytes()); // ts_sec
        data.extend_from_slice(&500_000u32.to_le_bytes()); // ts_usec
        data.extend_from_slice(&(packet_data.len() as u32).to_le_bytes()); // caplen
        data.extend_from_slice(&60u32.to_le_bytes()); // origlen (padded on wire)
        data.extend_from_slice(&packet_data);

        data
    }

    /// Minimal pcapng: SHB + IDB + one EPB with a 4-byte payload.
    fn minimal_pcapng() -> Vec<u8> {
        let mut data = Vec::new();

        // Section Header Block
        data.extend_from_slice(&[0x0a, 0x0d, 0x0d, 0x0a]);
        data.extend_from_slice(&28u32.to_le_bytes());
        data.extend_from_slice(&0x1a2b_3c4du32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // version major
        data.extend_from_slice(&0u16.to_le_bytes()); // version minor
        data.extend_from_slice(&u64::MAX.to_le_bytes()); // section length unknown
        data.extend_from_slice(&28u32.to_le_bytes());

        // Interface Description Block (linktype 1, snaplen 65535)
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&20u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&65535u32.to_le_bytes());
        data.extend_from_slice(&20u32.to_le_bytes());

        // Enhanced Packet Block with payload [1,2,3,4]
        data.extend_from_slice(&6u32.to_le_bytes());
        data.extend_from_slice(&36u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // interface id
        data.extend_from_slice(&0u32.to_le_bytes()); // ts_high
        data.extend_from_slice(&0u32.to_le_bytes()); // ts_low
        data.extend_from_slice(&4u32.to_le_bytes()); // caplen
        data.extend_from_slice(&4u32.to_le_bytes()); // origlen
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.extend_from_slice(&36u32.to_le_bytes());

        data
    }

    // Test 1: legacy pcap frame carries timestamp, link type and lengths
    #[test]
    fn test_read_legacy_pcap() {
        let mut reader = CaptureReader::open(Cursor::new(minimal_pcap())).unwrap();
        assert_eq!(reader.format(), CaptureFormat::Legacy);

        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.frame_number, 1);
        assert_eq!(frame.timestamp_micros, 1_000_000_000_500_000i64);
        assert_eq!(frame.link_type, 1);
        assert_eq!(frame.captured_len(), 14);
        assert_eq!(frame.reported_len(), 60); // snaplen-truncated on the wire
        assert!(frame.data.is_truncated());

        assert!(reader.next_frame().unwrap().is_none());
        assert_eq!(reader.frame_count(), 1);
    }

    // Test 2: pcapng frame extraction
    #[test]
    fn test_read_pcapng() {
        let mut reader = CaptureReader::open(Cursor::new(minimal_pcapng())).unwrap();
        assert_eq!(reader.format(), CaptureFormat::PcapNg);

        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.frame_number, 1);
        assert_eq!(frame.link_type, 1);
        assert_eq!(frame.captured_len(), 4);
        assert_eq!(&frame.data.get_bytes(0, 4).unwrap()[..], &[1, 2, 3, 4]);

        assert!(reader.next_frame().unwrap().is_none());
    }

    // Test 3: gzip-compressed capture is inflated transparently
    #[test]
    fn test_read_gzip_pcap() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&minimal_pcap()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut reader = CaptureReader::open(Cursor::new(compressed)).unwrap();
        assert_eq!(reader.format(), CaptureFormat::Legacy);
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.captured_len(), 14);
    }

    // Test 4: unrecognized bytes fail with a sniff error, not a parse error
    #[test]
    fn test_open_unrecognized() {
        let garbage = vec![0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0, 0, 0, 0, 0];
        match CaptureReader::open(Cursor::new(garbage)) {
            Err(Error::Sniff(SniffError::UnrecognizedFormat)) => {}
            Err(other) => panic!("expected a sniff error, got {other}"),
            Ok(_) => panic!("expected a sniff error, got a reader"),
        }
    }
}
