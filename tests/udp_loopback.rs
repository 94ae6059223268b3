//! End-to-end exchanges between a session and a slave over UDP on 127.0.0.1.

use std::net::{SocketAddr, UdpSocket};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fins_core::event::channel_observer;
use fins_core::{
    build_read, build_response, CancelToken, DenseMemory, FinsError, FrameDirection, MemoryArea, MemoryStore,
    NodeAddress, Session, SessionConfig, Slave, Transport, UdpTransport,
};

struct Harness {
    addr: SocketAddr,
    cancel: CancelToken,
    handle: Option<JoinHandle<Slave<DenseMemory>>>,
}

impl Harness {
    fn start() -> Self {
        let mut transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = transport.local_endpoint().unwrap();
        let cancel = CancelToken::new();
        let token = cancel.clone();

        let handle = thread::spawn(move || {
            let mut slave = Slave::new(DenseMemory::with_pattern(5000, |area, i| match area {
                MemoryArea::DM => i as u16,
                _ => 0,
            }));
            slave.run(&mut transport, &token).unwrap();
            slave
        });

        Self {
            addr,
            cancel,
            handle: Some(handle),
        }
    }

    fn session(&self, config: SessionConfig) -> Session<UdpTransport> {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        Session::new(transport, self.addr, config.with_timeout(Duration::from_secs(1)))
    }

    fn stop(mut self) -> Slave<DenseMemory> {
        self.cancel.cancel();
        self.handle.take().unwrap().join().unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[test]
fn test_read_prefilled_dm() {
    let harness = Harness::start();
    let session = harness.session(SessionConfig::default());

    assert_eq!(session.read_words("D0", 5).unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(session.read_words("d4998", 4).unwrap(), vec![4998, 4999, 0, 0]);
    assert_eq!(session.read_words("C0", 2).unwrap(), vec![0, 0]);
}

#[test]
fn test_write_and_read_back() {
    let harness = Harness::start();
    let session = harness.session(SessionConfig::default());

    session.write_words("D100", &[1000, 1001, 1002]).unwrap();
    session.write_value("H10", 123456i32).unwrap();
    session.write_value("W20", -1.25f64).unwrap();
    session.write_string("A30", "PRODUCT-001").unwrap();
    session.write_bit("C5.7", true).unwrap();

    assert_eq!(session.read_words("D100", 3).unwrap(), vec![1000, 1001, 1002]);
    assert_eq!(session.read_value::<i32>("H10").unwrap(), 123456);
    assert_eq!(session.read_value::<f64>("W20").unwrap(), -1.25);
    assert_eq!(session.read_string("A30", 6).unwrap(), "PRODUCT-001");
    assert!(session.read_bit("C5.7").unwrap());

    let slave = harness.stop();
    let store = slave.store();
    assert_eq!(store.read_words(MemoryArea::HR, 10, 2), vec![0xE240, 0x0001]);
    assert_eq!(store.get_word(MemoryArea::CIO, 5), 0x0080);
}

#[test]
fn test_word_order_is_per_session() {
    let harness = Harness::start();
    let low = harness.session(SessionConfig::default());
    let high = harness.session(SessionConfig::default().with_high_word_first(true));

    low.write_value("D400", 0x0001_0002u32).unwrap();
    assert_eq!(low.read_words("D400", 2).unwrap(), vec![0x0002, 0x0001]);
    assert_eq!(high.read_value::<u32>("D400").unwrap(), 0x0002_0001);
}

#[test]
fn test_unsupported_command_end_code() {
    let harness = Harness::start();
    let session = harness.session(SessionConfig::default());

    let mut request = build_read(
        NodeAddress::node(1),
        NodeAddress::node(0x0C),
        0x23,
        "D0".parse().unwrap(),
        1,
    );
    request[11] = 0x03;

    let err = session.exchange(&request).unwrap_err();
    assert!(matches!(err, FinsError::RemoteDeviceError { end_code: 0x0401 }));
}

#[test]
fn test_events_for_each_exchange() {
    let harness = Harness::start();
    let (tx, rx) = mpsc::channel();
    let session = harness
        .session(SessionConfig::default())
        .with_observer(channel_observer(tx));

    session.read_words("D0", 1).unwrap();
    session.write_words("D0", &[5]).unwrap();

    let directions: Vec<FrameDirection> = rx.try_iter().map(|e| e.direction).collect();
    assert_eq!(
        directions,
        vec![
            FrameDirection::Sent,
            FrameDirection::Received,
            FrameDirection::Sent,
            FrameDirection::Received
        ]
    );
}

#[test]
fn test_timeout_without_slave() {
    let silent = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let session = Session::new(
        transport,
        silent.local_endpoint().unwrap(),
        SessionConfig::default().with_timeout(Duration::from_millis(100)),
    );

    let err = session.read_words("D0", 1).unwrap_err();
    assert!(matches!(err.root(), FinsError::Timeout));
}

#[test]
fn test_concurrent_callers_serialize() {
    let harness = Harness::start();
    let session = Arc::new(harness.session(SessionConfig::default()));

    let workers: Vec<_> = (0..4u16)
        .map(|n| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let address = format!("D{}", 1000 + n * 10);
                for i in 0..10u16 {
                    session.write_words(&address, &[n * 100 + i]).unwrap();
                    assert_eq!(session.read_words(&address, 1).unwrap(), vec![n * 100 + i]);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_peer_setting_only_bit7_in_icf() {
    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let addr = peer.local_addr().unwrap();

    let responder = thread::spawn(move || {
        let mut buf = [0u8; 2048];
        let (len, from) = peer.recv_from(&mut buf).unwrap();
        let mut reply = build_response(&buf[..len], 0x0000, &[0x00, 0x2A]).unwrap();
        // ICF 0x81: response marked in bit 7 only
        reply[0] = buf[0] | 0x01;
        peer.send_to(&reply, from).unwrap();
    });

    let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let session = Session::new(
        transport,
        addr,
        SessionConfig::default().with_timeout(Duration::from_secs(1)),
    );
    assert_eq!(session.read_words("D0", 1).unwrap(), vec![42]);
    responder.join().unwrap();
}
