//! 루프백 UDP 위에서 송신자 전체 동작 확인

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use srmp::{
    BlockSource, Config, Frame, FrameKind, MulticastSender, MulticastTransport, SenderEvent,
    SequenceId,
};

/// 데이터 프레임을 받으면 응답하는 가짜 수신자
///
/// 받은 페이로드를 시퀀스 ID별로 모아 반환한다.
async fn spawn_receiver<F>(mut reply: F) -> (std::net::SocketAddr, JoinHandle<HashMap<SequenceId, Bytes>>)
where
    F: FnMut(SequenceId, u32) -> Option<Frame> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut received = HashMap::new();
        let mut seen: HashMap<SequenceId, u32> = HashMap::new();
        let mut buf = vec![0u8; 4096];

        loop {
            let recv = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await;
            let (len, from) = match recv {
                Ok(Ok(result)) => result,
                _ => break,
            };

            let frame = Frame::from_bytes(&buf[..len]).unwrap();
            assert_eq!(frame.kind(), FrameKind::Data);

            let id = frame.sequence_id();
            let count = seen.entry(id).or_insert(0);
            *count += 1;
            received.entry(id).or_insert_with(|| frame.payload.clone());

            if let Some(response) = reply(id, *count) {
                socket.send_to(&response.to_bytes(), from).await.unwrap();
            }
        }

        received
    });

    (addr, handle)
}

async fn loopback_transport(destination: std::net::SocketAddr) -> MulticastTransport {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    MulticastTransport::from_socket(socket, destination)
}

#[tokio::test]
async fn test_transfers_file_contents_with_one_nak() {
    let (receiver_addr, receiver) = spawn_receiver(|id, count| {
        if id == 3 && count == 1 {
            Some(Frame::nak(id))
        } else {
            Some(Frame::ack(id))
        }
    })
    .await;

    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let source = BlockSource::from_bytes(&data, 1000).unwrap();
    let transport = loopback_transport(receiver_addr).await;

    let (sender, mut events) = MulticastSender::new(Config::default(), source, transport).unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(10), sender.run())
        .await
        .expect("transfer timed out")
        .unwrap();

    assert_eq!(stats.completed_blocks, 10);
    assert_eq!(stats.naks_received, 1);
    assert!(stats.nak_retransmissions >= 1);
    assert_eq!(stats.abandoned_blocks, 0);
    assert!(matches!(events.recv().await, Some(SenderEvent::Completed(_))));

    let received = receiver.await.unwrap();
    let mut reassembled = Vec::new();
    for id in 0..10 {
        reassembled.extend_from_slice(&received[&id]);
    }
    assert_eq!(reassembled, data);
}

#[tokio::test]
async fn test_recovers_from_lost_block_by_timeout() {
    // 블록 0의 첫 사본은 응답 없음 (유실)
    let (receiver_addr, _receiver) = spawn_receiver(|id, count| {
        if id == 0 && count == 1 {
            None
        } else {
            Some(Frame::ack(id))
        }
    })
    .await;

    let config = Config {
        retransmit_timeout_ms: 50,
        ..Config::default()
    };
    let source = BlockSource::synthetic(6, 500).unwrap();
    let transport = loopback_transport(receiver_addr).await;

    let (sender, _events) = MulticastSender::new(config, source, transport).unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(10), sender.run())
        .await
        .expect("transfer timed out")
        .unwrap();

    assert_eq!(stats.completed_blocks, 6);
    assert!(stats.timeout_retransmissions >= 1);
}

#[tokio::test]
async fn test_ignores_garbage_feedback() {
    let (receiver_addr, _receiver) = spawn_receiver(|id, _| Some(Frame::ack(id))).await;

    let source = BlockSource::synthetic(4, 100).unwrap();
    let transport = loopback_transport(receiver_addr).await;
    let sender_addr = transport.local_addr().unwrap();
    let (sender, _events) = MulticastSender::new(Config::default(), source, transport).unwrap();

    // 잘린 헤더와 루프백된 데이터 프레임
    let noise = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    noise.send_to(&[0x00, 0x01, 0x02], sender_addr).await.unwrap();
    noise
        .send_to(&Frame::data(0, Bytes::from_static(b"echo")).to_bytes(), sender_addr)
        .await
        .unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(10), sender.run())
        .await
        .expect("transfer timed out")
        .unwrap();

    assert_eq!(stats.completed_blocks, 4);
    assert_eq!(stats.malformed_frames, 1);
    assert_eq!(stats.ignored_frames, 1);
}
