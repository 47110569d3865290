//! End-to-end transfers between two links joined by an in-memory duplex pipe.

use arq_lab_abstract::consts::{HEADER_LEN, MAX_REQUEST_LEN};
use arq_lab_abstract::{Command, EnvelopeError, FaultConfig, Message, ProtocolConfig};
use arq_lab_core::{Link, LinkError, Request, TransferStats};
use tokio::io::{DuplexStream, duplex};

const FRAME_SIZE: usize = 64;
const CAPACITY: usize = FRAME_SIZE - HEADER_LEN;

fn small_frames() -> ProtocolConfig {
    ProtocolConfig {
        frame_size: FRAME_SIZE,
        window_size: 4,
        ack_timeout_ms: 20,
        ..Default::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn pair(responder: ProtocolConfig, initiator: ProtocolConfig) -> (Link<DuplexStream>, Link<DuplexStream>) {
    let (a, b) = duplex(64 * 1024);
    (Link::new(a, responder), Link::new(b, initiator))
}

/// Chat message whose envelope needs exactly `frames` frames.
fn message_of_frames(frames: usize) -> Message {
    let data: String = "0123456789".chars().cycle().take(CAPACITY * frames - 4).collect();
    Message::new(Command::Chat, data)
}

#[tokio::test]
async fn single_frame_chat() {
    let (mut responder, mut initiator) = pair(small_frames(), small_frames());
    let message = Message::new(Command::Chat, "hi");

    let (sent, received) = tokio::join!(responder.send_message(&message), initiator.recv_message());

    assert_eq!(received.unwrap(), message);
    assert_eq!(
        sent.unwrap(),
        TransferStats {
            frames: 1,
            rounds: 1,
            frames_sent: 1,
            acks_observed: 1,
            timeouts: 0,
        }
    );
}

#[tokio::test]
async fn six_frames_window_four_takes_two_rounds() {
    let (mut responder, mut initiator) = pair(small_frames(), small_frames());
    let message = message_of_frames(6);

    let (sent, received) = tokio::join!(responder.send_message(&message), initiator.recv_message());

    assert_eq!(received.unwrap(), message);
    let stats = sent.unwrap();
    assert_eq!(stats.frames, 6);
    assert_eq!(stats.rounds, 2);
    assert_eq!(stats.frames_sent, 6);
    assert_eq!(stats.acks_observed, 6);
}

#[tokio::test]
async fn exact_multiple_of_capacity_with_default_frames() {
    let config = ProtocolConfig::default();
    let capacity = config.payload_capacity();
    let (mut responder, mut initiator) = pair(config.clone(), config);
    let data = "z".repeat(capacity * 3 - 4);
    let message = Message::new(Command::File, data);

    let (sent, received) = tokio::join!(responder.send_message(&message), initiator.recv_message());

    assert_eq!(received.unwrap(), message);
    assert_eq!(sent.unwrap().frames, 3);
}

#[tokio::test]
async fn corrupted_frame_is_resent_from_last_good() {
    init_tracing();
    let (mut responder, mut initiator) = pair(small_frames(), small_frames());
    responder.faults_mut().schedule_corruption(2);
    let message = message_of_frames(6);

    let (sent, received) = tokio::join!(responder.send_message(&message), initiator.recv_message());

    assert_eq!(received.unwrap(), message);
    let stats = sent.unwrap();
    // 1-4 (2 corrupt, base -> 1), 2-5 (base -> 5), 6
    assert_eq!(stats.rounds, 3);
    assert_eq!(stats.frames_sent, 9);
    assert_eq!(stats.timeouts, 0);
}

#[tokio::test]
async fn lost_ack_is_covered_by_a_later_cumulative_ack() {
    init_tracing();
    let (mut responder, mut initiator) = pair(small_frames(), small_frames());
    initiator.faults_mut().schedule_ack_drop(3);
    let message = message_of_frames(6);

    let (sent, received) = tokio::join!(responder.send_message(&message), initiator.recv_message());

    assert_eq!(received.unwrap(), message);
    let stats = sent.unwrap();
    assert_eq!(stats.rounds, 2);
    assert_eq!(stats.frames_sent, 6);
    assert_eq!(stats.acks_observed, 5);
    assert_eq!(stats.timeouts, 1);
}

#[tokio::test]
async fn random_corruption_still_delivers_in_order() {
    init_tracing();
    let mut noisy = small_frames();
    noisy.faults = FaultConfig {
        checksum_error_rate: 30,
        ack_loss_rate: 0,
        seed: Some(7),
    };
    let (mut responder, mut initiator) = pair(noisy, small_frames());
    let message = message_of_frames(20);

    let (sent, received) = tokio::join!(responder.send_message(&message), initiator.recv_message());

    assert_eq!(received.unwrap(), message);
    let stats = sent.unwrap();
    assert_eq!(stats.frames, 20);
    assert!(stats.frames_sent >= 20);
    assert!(stats.rounds >= 5);
}

#[tokio::test]
async fn total_ack_loss_exhausts_bounded_retries() {
    init_tracing();
    let mut responder_config = small_frames();
    responder_config.ack_timeout_ms = 10;
    responder_config.max_rounds = Some(3);
    let mut initiator_config = small_frames();
    initiator_config.faults.ack_loss_rate = 100;
    let (mut responder, mut initiator) = pair(responder_config, initiator_config);
    let message = Message::new(Command::Chat, "anyone there?");

    let (sent, received) = tokio::join!(responder.send_message(&message), initiator.recv_message());

    // the receiver got everything; only the return path is broken
    assert_eq!(received.unwrap(), message);
    match sent {
        Err(LinkError::RetriesExhausted {
            rounds,
            acked,
            total,
        }) => assert_eq!((rounds, acked, total), (3, 0, 1)),
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn requests_travel_unframed() {
    let (mut responder, mut initiator) = pair(small_frames(), small_frames());

    initiator
        .send_request(&Message::new(Command::File, "cat.jpg"))
        .await
        .unwrap();
    match responder.read_request().await.unwrap() {
        Request::Message(message) => assert_eq!(message, Message::new(Command::File, "cat.jpg")),
        other => panic!("unexpected {other:?}"),
    }

    tokio::io::AsyncWriteExt::write_all(initiator.get_mut(), b"LISTall")
        .await
        .unwrap();
    assert!(matches!(
        responder.read_request().await.unwrap(),
        Request::Invalid(EnvelopeError::UnknownCommand(tag)) if tag == "LIST"
    ));

    drop(initiator);
    assert!(matches!(responder.read_request().await.unwrap(), Request::Closed));
}

#[tokio::test]
async fn peer_hangup_during_receive() {
    let (responder, mut initiator) = pair(small_frames(), small_frames());
    drop(responder);
    assert!(matches!(initiator.recv_message().await, Err(LinkError::Closed)));
}

#[tokio::test]
async fn oversized_request_is_refused_before_writing() {
    let (_responder, mut initiator) = pair(small_frames(), small_frames());
    let err = initiator
        .send_request(&Message::new(Command::Chat, "x".repeat(MAX_REQUEST_LEN)))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::RequestTooLarge { max, .. } if max == MAX_REQUEST_LEN));
}

#[tokio::test]
async fn request_larger_than_a_window_fits_in_one_read() {
    let (mut responder, mut initiator) = pair(small_frames(), small_frames());
    let text = "y".repeat(small_frames().receive_buffer_size() * 3);
    initiator
        .send_request(&Message::new(Command::Chat, text.clone()))
        .await
        .unwrap();
    match responder.read_request().await.unwrap() {
        Request::Message(message) => assert_eq!(message.data, text),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn new_request_stands_in_for_a_lost_final_ack() {
    init_tracing();
    let slow_timeout = ProtocolConfig {
        ack_timeout_ms: 2_000,
        ..small_frames()
    };
    let (mut responder, mut initiator) = pair(slow_timeout, small_frames());
    let reply = message_of_frames(6);
    initiator.faults_mut().schedule_ack_drop(6);

    let send = async {
        let stats = responder.send_message(&reply).await.unwrap();
        let next = responder.read_request().await.unwrap();
        (stats, next)
    };
    let recv = async {
        let got = initiator.recv_message().await.unwrap();
        initiator
            .send_request(&Message::new(Command::Chat, "next"))
            .await
            .unwrap();
        got
    };
    let ((stats, next), got) = tokio::join!(send, recv);

    assert_eq!(got, reply);
    assert_eq!(stats.rounds, 2);
    assert_eq!(stats.timeouts, 0);
    match next {
        Request::Message(message) => assert_eq!(message, Message::new(Command::Chat, "next")),
        other => panic!("unexpected {other:?}"),
    }
}
