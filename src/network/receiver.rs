//! Datagram listener loop
//!
//! Runs on its own thread at its own cadence so a slow or blocked playback
//! device can never back up into the socket and cause uncontrolled
//! kernel-buffer loss. Every arriving datagram is offered to the jitter
//! buffer with a short timeout; when the buffer stays full the datagram is
//! discarded without surfacing an error (UDP has no flow control to push
//! back on), only a counter records it.

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use crate::audio::buffer::JitterBuffer;
use crate::constants::{ENQUEUE_TIMEOUT, MAX_DATAGRAM_SIZE};
use crate::error::{Error, SocketError};
use crate::session::SessionStats;

pub(crate) fn listen_loop(
    socket: &UdpSocket,
    buffer: &JitterBuffer,
    cancel: &AtomicBool,
    stats: &SessionStats,
) -> Result<(), Error> {
    let mut scratch = vec![0u8; MAX_DATAGRAM_SIZE];

    while !cancel.load(Ordering::SeqCst) {
        let (len, _peer) = match socket.recv_from(&mut scratch) {
            Ok(received) => received,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                // the socket itself is gone; reported once, session stops
                return Err(SocketError::Receive(e.to_string()).into());
            }
        };

        stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
        let frame = Bytes::copy_from_slice(&scratch[..len]);
        if !buffer.push(frame, ENQUEUE_TIMEOUT) {
            stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("jitter buffer full, datagram discarded");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::udp;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn spawn_listener(
        socket: UdpSocket,
        buffer: Arc<JitterBuffer>,
        cancel: Arc<AtomicBool>,
        stats: Arc<SessionStats>,
    ) -> thread::JoinHandle<Result<(), Error>> {
        thread::spawn(move || listen_loop(&socket, &buffer, &cancel, &stats))
    }

    /// 1000 frames at 256 bytes with one in twenty lost in transit, jitter
    /// capacity 100: the consumer sees 1000 cycles, 950 real frames and 50
    /// underruns, and the buffer never exceeds its capacity.
    #[test]
    fn loopback_with_loss_and_silence_substitution() {
        let socket = udp::listen_socket(0).unwrap();
        let port = socket.local_addr().unwrap().port();
        let buffer = Arc::new(JitterBuffer::new(100));
        let cancel = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(SessionStats::default());

        let listener = spawn_listener(socket, buffer.clone(), cancel.clone(), stats.clone());

        let sender = thread::spawn(move || {
            let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
            let frame = [0x5au8; 256];
            for i in 0..1000u32 {
                if i % 20 == 19 {
                    continue; // modeled network loss
                }
                tx.send_to(&frame, ("127.0.0.1", port)).unwrap();
                thread::sleep(Duration::from_micros(100));
            }
        });

        let mut real = 0u32;
        let mut silence = 0u32;
        for _ in 0..1000 {
            assert!(buffer.len() <= buffer.capacity());
            match buffer.pop(Duration::from_millis(200)) {
                Some(frame) => {
                    assert_eq!(frame.len(), 256);
                    real += 1;
                }
                None => silence += 1,
            }
        }
        sender.join().unwrap();

        assert_eq!(real, 950);
        assert_eq!(silence, 50);
        assert_eq!(stats.datagrams_received.load(Ordering::Relaxed), 950);
        assert_eq!(buffer.dropped(), 0);

        cancel.store(true, Ordering::SeqCst);
        listener.join().unwrap().unwrap();
    }

    #[test]
    fn oversized_datagrams_are_not_truncated_to_frame_size() {
        let socket = udp::listen_socket(0).unwrap();
        let port = socket.local_addr().unwrap().port();
        let buffer = Arc::new(JitterBuffer::new(4));
        let cancel = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(SessionStats::default());

        let listener = spawn_listener(socket, buffer.clone(), cancel.clone(), stats.clone());

        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
        // a peer configured with a larger frame size
        tx.send_to(&[7u8; 512], ("127.0.0.1", port)).unwrap();

        let frame = buffer.pop(Duration::from_secs(1)).unwrap();
        assert_eq!(frame.len(), 512);

        cancel.store(true, Ordering::SeqCst);
        listener.join().unwrap().unwrap();
    }

    #[test]
    fn listener_stops_within_one_poll_interval() {
        let socket = udp::listen_socket(0).unwrap();
        let buffer = Arc::new(JitterBuffer::new(4));
        let cancel = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(SessionStats::default());

        let listener = spawn_listener(socket, buffer, cancel.clone(), stats);

        thread::sleep(Duration::from_millis(50));
        cancel.store(true, Ordering::SeqCst);

        let started = Instant::now();
        listener.join().unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
