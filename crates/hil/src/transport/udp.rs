//! MAVLink over UDP.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use log::{debug, info, warn};

use super::{HilLink, Inbound, MAX_DATAGRAMS_PER_POLL};
use crate::config::UdpConfig;
use crate::control;
use crate::error::TransportError;
use crate::mavlink::{
    FrameEncoder, FrameParser, GpsSample, HilControls, MavPayload, MessageKind, ParserStats,
    SensorSample,
};
use crate::types::ActuatorCommand;

/// Well-known port the bridge listens on.
pub const DEFAULT_UDP_PORT: u16 = 14560;

const RECV_BUF_LEN: usize = 2048;

/// Non-blocking datagram socket with peer discovery.
///
/// Unless a remote address is configured, the source address of the first
/// received datagram becomes the destination for all sends.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    peer: Option<SocketAddr>,
    recv_buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind `bind_addr` in non-blocking mode.
    pub fn bind(
        bind_addr: SocketAddr,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        info!(
            "UDP transport listening on {}",
            socket.local_addr().unwrap_or(bind_addr)
        );
        Ok(Self {
            socket: Some(socket),
            peer: remote_addr,
            recv_buf: vec![0u8; RECV_BUF_LEN],
        })
    }

    /// Read at most one datagram without blocking.
    ///
    /// Returns an empty vector when nothing is pending, the socket is closed,
    /// or the read failed.
    pub fn poll_and_read(&mut self) -> Vec<u8> {
        let Some(socket) = self.socket.as_ref() else {
            return Vec::new();
        };
        match socket.recv_from(&mut self.recv_buf) {
            Ok((len, addr)) => {
                if self.peer.is_none() {
                    info!("Autopilot discovered at {addr}");
                    self.peer = Some(addr);
                }
                self.recv_buf[..len].to_vec()
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Vec::new(),
            Err(e) => {
                // ICMP port-unreachable from an earlier send shows up here.
                debug!("UDP receive failed: {e}");
                Vec::new()
            }
        }
    }

    /// Send one complete frame to the peer.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket closed",
            )));
        };
        let addr = self.peer.ok_or(TransportError::PeerUnknown)?;
        let sent = socket.send_to(frame, addr)?;
        if sent != frame.len() {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram: {sent} of {} bytes", frame.len()),
            )));
        }
        Ok(())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    pub fn close(&mut self) {
        self.socket = None;
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.local_addr())
            .field("peer", &self.peer)
            .finish()
    }
}

/// [`HilLink`] speaking MAVLink v1 frames over [`UdpTransport`].
#[derive(Debug)]
pub struct MavlinkUdpLink {
    transport: UdpTransport,
    parser: FrameParser,
    encoder: FrameEncoder,
    component_id: u8,
}

impl MavlinkUdpLink {
    pub fn new(transport: UdpTransport, system_id: u8, component_id: u8) -> Self {
        Self {
            transport,
            parser: FrameParser::new(),
            encoder: FrameEncoder::new(system_id),
            component_id,
        }
    }

    pub fn bind(
        config: &UdpConfig,
        system_id: u8,
        component_id: u8,
    ) -> Result<Self, TransportError> {
        let transport = UdpTransport::bind(config.bind_addr, config.remote_addr)?;
        Ok(Self::new(transport, system_id, component_id))
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.transport.peer()
    }

    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    fn send_message<P: MavPayload>(&mut self, message: &P) -> Result<(), TransportError> {
        let frame = self.encoder.encode_message(message, self.component_id)?;
        self.transport.send(&frame)
    }
}

impl HilLink for MavlinkUdpLink {
    fn kind(&self) -> &'static str {
        "mavlink_udp"
    }

    fn poll_inbound(&mut self) -> Vec<Inbound> {
        let mut inbound = Vec::new();
        for _ in 0..MAX_DATAGRAMS_PER_POLL {
            let bytes = self.transport.poll_and_read();
            if bytes.is_empty() {
                break;
            }
            for frame in self.parser.feed(&bytes) {
                match frame.kind() {
                    Some(MessageKind::HilControls) => match frame.decode::<HilControls>() {
                        Ok(controls) => inbound.push(Inbound::Controls(control::decode(&controls))),
                        Err(e) => warn!("Dropping HIL_CONTROLS frame: {e}"),
                    },
                    Some(kind) => debug!("Ignoring inbound {} frame", kind.name()),
                    None => {}
                }
            }
        }
        inbound
    }

    fn send_sensor(&mut self, sample: &SensorSample) -> Result<(), TransportError> {
        self.send_message(sample)
    }

    fn send_gps(&mut self, sample: &GpsSample) -> Result<(), TransportError> {
        self.send_message(sample)
    }

    fn publish_motor_speeds(&mut self, _command: &ActuatorCommand) -> Result<(), TransportError> {
        // Motor speeds go straight to the engine; nothing travels over UDP.
        Ok(())
    }

    fn close(&mut self) {
        self.transport.close();
        self.parser.reset();
    }
}
