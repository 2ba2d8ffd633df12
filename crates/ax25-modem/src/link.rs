//! KISS link plumbing shared by the bidirectional backends
//!
//! A backend owns an [`Outbound`] queue and hands the receiving end to one
//! background task, which runs [`run_kiss_session`] over whatever byte
//! stream the backend opened (TCP socket, serial port, child process stdio
//! or the process's own stdin/stdout).

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use ax25_protocol::kiss::{self, KissCodec, KissCommand};
use ax25_protocol::Packet;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::ModemError;
use crate::PacketListener;

/// Outbound frames buffered per backend before `send` reports `QueueFull`
pub const QUEUE_CAPACITY: usize = 64;

/// Bounded transmit queue with start-once semantics
#[derive(Debug, Default)]
pub(crate) struct Outbound {
    started: AtomicBool,
    tx: OnceLock<mpsc::Sender<Vec<u8>>>,
}

impl Outbound {
    /// Mark the backend started and create the queue
    pub fn open(&self) -> Result<mpsc::Receiver<Vec<u8>>, ModemError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ModemError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let _ = self.tx.set(tx);
        Ok(rx)
    }

    /// Encode a packet and queue it without waiting
    pub fn queue(&self, packet: &Packet) -> Result<(), ModemError> {
        let tx = self.tx.get().ok_or(ModemError::NotStarted)?;
        let frame = packet.encode()?;
        tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ModemError::QueueFull,
            TrySendError::Closed(_) => ModemError::Stopped,
        })
    }
}

/// Why a KISS session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The byte stream closed or failed
    Disconnected,
    /// The backend was dropped, nothing more to send
    QueueClosed,
}

/// Pump one KISS byte stream until it closes
///
/// Inbound data frames on port 0 are decoded, classified and handed to the
/// listener in arrival order. Queued outbound frames are KISS-encoded and
/// written as they arrive.
pub(crate) async fn run_kiss_session<R, W>(
    name: &str,
    mut reader: R,
    mut writer: W,
    outbound: &mut mpsc::Receiver<Vec<u8>>,
    listener: &dyn PacketListener,
) -> SessionEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut codec = KissCodec::new();
    let mut buffer = vec![0u8; 1024];

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return SessionEnd::QueueClosed;
                };
                let data = kiss::encode_data_frame(0, &frame);
                let result = async {
                    writer.write_all(&data).await?;
                    writer.flush().await
                }
                .await;
                if let Err(e) = result {
                    warn!("Write error on {}: {}", name, e);
                    return SessionEnd::Disconnected;
                }
                debug!("Sent {} byte frame on {}", frame.len(), name);
            }

            result = reader.read(&mut buffer) => {
                match result {
                    Ok(0) => {
                        info!("{} closed", name);
                        return SessionEnd::Disconnected;
                    }
                    Ok(n) => {
                        debug!("Read {} bytes from {}: {:02X?}", n, name, &buffer[..n]);
                        codec.push_bytes(&buffer[..n]);
                        deliver_frames(name, &mut codec, listener);
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                    Err(e) => {
                        warn!("Read error on {}: {}", name, e);
                        return SessionEnd::Disconnected;
                    }
                }
            }
        }
    }
}

fn deliver_frames(name: &str, codec: &mut KissCodec, listener: &dyn PacketListener) {
    while let Some(frame) = codec.next_frame() {
        if frame.command != KissCommand::Data || frame.port != 0 {
            debug!(
                "Ignoring KISS {:?} frame on port {} from {}",
                frame.command, frame.port, name
            );
            continue;
        }
        match Packet::decode(&frame.data) {
            Ok(packet) => listener.on_packet(packet),
            Err(e) => debug!("Dropping undecodable frame from {}: {}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax25_protocol::{Frame, PacketKind};
    use std::sync::{Arc, Mutex};

    fn ui_bytes(tnc2: &str) -> Vec<u8> {
        Frame::from_tnc2(tnc2).unwrap().encode().unwrap()
    }

    async fn wait_for(received: &Mutex<Vec<Packet>>, count: usize) {
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while received.lock().unwrap().len() < count {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("packets not delivered in time");
    }

    #[tokio::test]
    async fn test_session_delivers_and_transmits() {
        let (local, mut remote) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(local);
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let listener = move |packet: Packet| sink.lock().unwrap().push(packet);

        let session = tokio::spawn(async move {
            run_kiss_session("test", reader, writer, &mut rx, &listener).await
        });

        // Inbound: a chat frame, a parameter frame and line noise
        let mut inbound = kiss::encode_data_frame(0, &ui_bytes("N0CALL>CQ:hello"));
        inbound.extend_from_slice(&[kiss::FEND, 0x01, 0x20, kiss::FEND]);
        inbound.extend_from_slice(&kiss::encode_data_frame(0, &[0x01, 0x02]));
        remote.write_all(&inbound).await.unwrap();
        wait_for(&received, 1).await;

        // Outbound
        let outgoing = ui_bytes("N0CALL>APRS:>status");
        tx.send(outgoing.clone()).await.unwrap();

        let mut buf = vec![0u8; 256];
        let n = remote.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], kiss::encode_data_frame(0, &outgoing).as_slice());

        drop(tx);
        assert_eq!(session.await.unwrap(), SessionEnd::QueueClosed);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind(), PacketKind::Chat);
    }

    #[tokio::test]
    async fn test_session_ends_on_eof() {
        let (local, remote) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(local);
        let (_tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        drop(remote);

        let listener = |_packet: Packet| {};
        let end = run_kiss_session("test", reader, writer, &mut rx, &listener).await;
        assert_eq!(end, SessionEnd::Disconnected);
    }

    #[test]
    fn test_outbound_start_once() {
        let outbound = Outbound::default();
        let packet = Packet::from_frame(Frame::from_tnc2("N0CALL>CQ:hi").unwrap());
        assert!(matches!(outbound.queue(&packet), Err(ModemError::NotStarted)));

        let _rx = outbound.open().unwrap();
        assert!(matches!(outbound.open(), Err(ModemError::AlreadyStarted)));
        assert!(outbound.queue(&packet).is_ok());
    }

    #[test]
    fn test_outbound_queue_full() {
        let outbound = Outbound::default();
        let _rx = outbound.open().unwrap();
        let packet = Packet::from_frame(Frame::from_tnc2("N0CALL>CQ:hi").unwrap());
        for _ in 0..QUEUE_CAPACITY {
            outbound.queue(&packet).unwrap();
        }
        assert!(matches!(outbound.queue(&packet), Err(ModemError::QueueFull)));
    }

    #[test]
    fn test_outbound_stopped_after_receiver_dropped() {
        let outbound = Outbound::default();
        drop(outbound.open().unwrap());
        let packet = Packet::from_frame(Frame::from_tnc2("N0CALL>CQ:hi").unwrap());
        assert!(matches!(outbound.queue(&packet), Err(ModemError::Stopped)));
    }
}
