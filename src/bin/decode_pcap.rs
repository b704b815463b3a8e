//! Decode F1 telemetry datagrams found in an offline pcap / pcapng capture.
//!
//! Usage:
//!   decode_pcap [--port=N] [--schema=FILE] [--dump[=PATH]] [--verbose] CAPTURE
//!
//! UDP payloads sent to `--port` (default 20777) are dispatched through the registry; a summary of
//! packet ids is printed to stderr at the end. `--dump` writes every decoded record.

use anyhow::Context;
use f1wire::dump::{hex_string, write_entry};
use f1wire::{decode_packet, Dispatch, Registry};
use pcap_parser::pcapng::Block as PcapNgBlock;
use pcap_parser::traits::{PcapNGPacketBlock, PcapReaderIterator};
use pcap_parser::{Linktype, PcapBlockOwned, PcapError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 20777;

#[derive(Default)]
struct Stats {
    frames: u64,
    datagrams: u64,
    decoded: BTreeMap<u8, u64>,
    unrecognized: BTreeMap<u8, u64>,
    failed: u64,
    first_error: Option<String>,
}

struct Session<'a> {
    registry: &'a Registry,
    port: u16,
    verbose: bool,
    dump: Option<Box<dyn Write>>,
    stats: Stats,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "f1wire=info,decode_pcap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = take_flag(&mut raw_args, &["--verbose", "-v"]);
    let port = match take_value(&mut raw_args, "--port=") {
        Some(p) => p.parse().map_err(|_| anyhow::anyhow!("invalid --port value: {}", p))?,
        None => DEFAULT_PORT,
    };
    let schema_path = take_value(&mut raw_args, "--schema=").map(PathBuf::from);
    let dump_path: Option<PathBuf> = raw_args.iter().position(|a| a.starts_with("--dump")).and_then(|pos| {
        let arg = raw_args.remove(pos);
        if arg == "--dump" {
            Some(PathBuf::from("-"))
        } else {
            arg.strip_prefix("--dump=").map(PathBuf::from)
        }
    });
    let capture_path: PathBuf = raw_args
        .into_iter()
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: decode_pcap [--port=N] [--schema=FILE] [--dump[=PATH]] [-v] CAPTURE"))?;

    let custom;
    let registry: &Registry = match &schema_path {
        Some(p) => {
            let src = std::fs::read_to_string(p)?;
            custom = Registry::from_source(&src)?;
            &custom
        }
        None => f1wire::f1_2019()?,
    };

    let dump: Option<Box<dyn Write>> = match &dump_path {
        Some(p) if p.as_os_str() == "-" => Some(Box::new(std::io::stdout())),
        Some(p) => Some(Box::new(File::create(p)?)),
        None => None,
    };

    let mut session = Session {
        registry,
        port,
        verbose,
        dump,
        stats: Stats::default(),
    };

    // pcapng files start with the section header block magic.
    let mut probe = [0u8; 4];
    {
        let mut f = File::open(&capture_path)?;
        f.read_exact(&mut probe)?;
    }
    let file = File::open(&capture_path)?;
    if probe == [0x0a, 0x0d, 0x0d, 0x0a] {
        run_pcapng(file, &mut session)?;
    } else {
        run_legacy_pcap(file, &mut session)?;
    }

    let stats = &session.stats;
    info!(capture = %capture_path.display(), port, "capture processed");
    eprintln!("frames: {}", stats.frames);
    eprintln!("udp datagrams on port {}: {}", port, stats.datagrams);
    for (id, n) in &stats.decoded {
        let name = registry.packet(*id).map(|p| p.name.as_str()).unwrap_or("?");
        eprintln!("  id {} {}: {}", id, name, n);
    }
    for (id, n) in &stats.unrecognized {
        eprintln!("  id {} (unrecognized, skipped): {}", id, n);
    }
    eprintln!("failed: {}", stats.failed);
    if let Some(e) = &stats.first_error {
        eprintln!("  first error: {}", e);
    }
    Ok(())
}

fn take_flag(args: &mut Vec<String>, names: &[&str]) -> bool {
    match args.iter().position(|a| names.contains(&a.as_str())) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn take_value(args: &mut Vec<String>, prefix: &str) -> Option<String> {
    let pos = args.iter().position(|a| a.starts_with(prefix))?;
    let arg = args.remove(pos);
    arg.strip_prefix(prefix).map(str::to_string)
}

fn run_legacy_pcap<R: Read>(file: R, session: &mut Session) -> anyhow::Result<()> {
    let mut reader = pcap_parser::pcap::LegacyPcapReader::new(1 << 20, file)?;
    let mut linktype: Option<Linktype> = None;
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(h) => linktype = Some(h.network),
                    PcapBlockOwned::Legacy(b) => {
                        let lt = linktype.unwrap_or(Linktype(1));
                        session.process_frame(lt, b.data)?;
                    }
                    PcapBlockOwned::NG(_) => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow::anyhow!("pcap refill error: {:?}", e))?;
            }
            Err(e) => return Err(anyhow::anyhow!("pcap read error: {:?}", e)),
        }
    }
    Ok(())
}

fn run_pcapng<R: Read>(file: R, session: &mut Session) -> anyhow::Result<()> {
    let mut reader = pcap_parser::pcapng::PcapNGReader::new(1 << 20, file)?;
    let mut if_linktypes: Vec<Linktype> = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                if let PcapBlockOwned::NG(b) = block {
                    match &b {
                        PcapNgBlock::InterfaceDescription(idb) => if_linktypes.push(idb.linktype),
                        PcapNgBlock::EnhancedPacket(epb) => {
                            let lt = if_linktypes.get(epb.if_id as usize).copied().unwrap_or(Linktype(1));
                            session.process_frame(lt, epb.packet_data())?;
                        }
                        PcapNgBlock::SimplePacket(spb) => {
                            let lt = if_linktypes.first().copied().unwrap_or(Linktype(1));
                            session.process_frame(lt, spb.packet_data())?;
                        }
                        _ => {}
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow::anyhow!("pcapng refill error: {:?}", e))?;
            }
            Err(e) => return Err(anyhow::anyhow!("pcapng read error: {:?}", e)),
        }
    }
    Ok(())
}

impl Session<'_> {
    /// Fails only when the dump output cannot be written.
    fn process_frame(&mut self, linktype: Linktype, frame: &[u8]) -> anyhow::Result<()> {
        self.stats.frames += 1;
        let Some(payload) = udp_payload_from_linktype(linktype, frame, self.port) else {
            return Ok(());
        };
        self.stats.datagrams += 1;
        let index = self.stats.frames;
        match decode_packet(self.registry, payload) {
            Ok(Dispatch::Packet(p)) => {
                *self.stats.decoded.entry(p.id).or_insert(0) += 1;
                if let Some(w) = self.dump.as_mut() {
                    let title = format!("frame {}  id {} {}  len {}", index, p.id, p.name, payload.len());
                    write_entry(w.as_mut(), &title, Some(&p.record))
                        .with_context(|| format!("writing dump for frame {}", index))?;
                }
            }
            Ok(Dispatch::Unrecognized { id, .. }) => {
                *self.stats.unrecognized.entry(id).or_insert(0) += 1;
                debug!(frame = index, id, "skipping unrecognized packet");
            }
            Err(e) => {
                self.stats.failed += 1;
                self.stats.first_error.get_or_insert_with(|| e.to_string());
                if self.verbose {
                    let show = payload.len().min(32);
                    warn!(frame = index, error = %e, head = %hex_string(&payload[..show]), "datagram decode failed");
                }
                if let Some(w) = self.dump.as_mut() {
                    let title = format!("frame {}  len {}  decode error: {}", index, payload.len(), e);
                    write_entry(w.as_mut(), &title, None)
                        .with_context(|| format!("writing dump for frame {}", index))?;
                }
            }
        }
        Ok(())
    }
}

/// Extract the UDP payload addressed to `port`, using the link type and IPv4/UDP length fields
/// so Ethernet padding in short frames is not included.
fn udp_payload_from_linktype(linktype: Linktype, frame: &[u8], port: u16) -> Option<&[u8]> {
    let l3 = match linktype.0 {
        1 => ethernet_l3(frame)?,    // DLT_EN10MB
        101 => frame,                // DLT_RAW
        113 => linux_sll_l3(frame)?, // DLT_LINUX_SLL
        _ => return None,
    };
    ipv4_udp_payload(l3, port)
}

fn ethernet_l3(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 14 {
        return None;
    }
    let mut off = 12usize;
    let mut ethertype = u16::from_be_bytes([frame[off], frame[off + 1]]);
    off += 2;
    // 802.1Q / 802.1ad tags
    while ethertype == 0x8100 || ethertype == 0x88a8 {
        if frame.len() < off + 4 + 2 {
            return None;
        }
        off += 4;
        ethertype = u16::from_be_bytes([frame[off - 2], frame[off - 1]]);
    }
    match ethertype {
        0x0800 => Some(&frame[off..]),
        _ => None,
    }
}

fn linux_sll_l3(frame: &[u8]) -> Option<&[u8]> {
    // SLL v1: 16-byte header, protocol at 14..16
    if frame.len() < 16 {
        return None;
    }
    match u16::from_be_bytes([frame[14], frame[15]]) {
        0x0800 => Some(&frame[16..]),
        _ => None,
    }
}

fn ipv4_udp_payload(l3: &[u8], port: u16) -> Option<&[u8]> {
    if l3.len() < 20 || l3[0] >> 4 != 4 {
        return None;
    }
    let ihl = (l3[0] & 0x0f) as usize * 4;
    if ihl < 20 || l3.len() < ihl {
        return None;
    }
    let total_len = u16::from_be_bytes([l3[2], l3[3]]) as usize;
    if total_len < ihl {
        return None;
    }
    let l3 = if total_len <= l3.len() { &l3[..total_len] } else { l3 };
    if l3.len() < ihl + 8 || l3[9] != 17 {
        return None;
    }
    let udp = &l3[ihl..];
    let dst_port = u16::from_be_bytes([udp[2], udp[3]]);
    let udp_len = u16::from_be_bytes([udp[4], udp[5]]) as usize;
    if dst_port != port || udp_len < 8 || udp.len() < udp_len {
        return None;
    }
    Some(&udp[8..udp_len])
}
