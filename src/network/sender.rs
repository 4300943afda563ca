//! Capture-send loop
//!
//! Blocks on the capture frame channel (the device cadence is the pacing
//! mechanism; no extra sleeps) and ships each frame as exactly one outbound
//! datagram, fire-and-forget. A failed send drops that one frame and keeps
//! capturing: stalling the microphone would lose more audio than the
//! datagram did.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::constants::RECV_POLL_TIMEOUT;
use crate::error::{DeviceError, Error};
use crate::session::SessionStats;

pub(crate) fn send_loop(
    socket: &UdpSocket,
    remote: SocketAddr,
    frames: &Receiver<Bytes>,
    device_errors: &Receiver<DeviceError>,
    cancel: &AtomicBool,
    stats: &SessionStats,
) -> Result<(), Error> {
    while !cancel.load(Ordering::SeqCst) {
        match frames.recv_timeout(RECV_POLL_TIMEOUT) {
            Ok(frame) => match socket.send_to(&frame, remote) {
                Ok(_) => {
                    stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    // transient: one frame lost, capture goes on
                    stats.send_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("datagram send to {remote} failed: {e}");
                }
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(DeviceError::Stream("capture stream stopped".into()).into());
            }
        }

        if let Ok(err) = device_errors.try_recv() {
            return Err(err.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::udp;
    use crossbeam_channel::bounded;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn frames_become_datagrams_in_order() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        let remote = peer.local_addr().unwrap();

        let socket = udp::send_socket().unwrap();
        let (frame_tx, frame_rx) = bounded(8);
        let (_error_tx, error_rx) = bounded::<DeviceError>(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(SessionStats::default());

        let worker = {
            let cancel = cancel.clone();
            let stats = stats.clone();
            thread::spawn(move || send_loop(&socket, remote, &frame_rx, &error_rx, &cancel, &stats))
        };

        for tag in 1u8..=3 {
            frame_tx.send(Bytes::from(vec![tag; 256])).unwrap();
        }

        let mut buf = [0u8; 512];
        for tag in 1u8..=3 {
            let (len, _) = peer.recv_from(&mut buf).unwrap();
            assert_eq!(len, 256);
            assert!(buf[..len].iter().all(|&b| b == tag));
        }

        cancel.store(true, Ordering::SeqCst);
        worker.join().unwrap().unwrap();
        assert_eq!(stats.frames_sent.load(Ordering::Relaxed), 3);
        assert_eq!(stats.send_failures.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn capture_fault_ends_the_loop() {
        let socket = udp::send_socket().unwrap();
        let remote: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let (_frame_tx, frame_rx) = bounded::<Bytes>(1);
        let (error_tx, error_rx) = bounded(1);
        let cancel = AtomicBool::new(false);
        let stats = SessionStats::default();

        error_tx
            .send(DeviceError::Stream("capture device unplugged".into()))
            .unwrap();

        let result = send_loop(&socket, remote, &frame_rx, &error_rx, &cancel, &stats);
        assert!(matches!(result, Err(Error::Device(_))));
    }
}
