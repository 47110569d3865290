//! Client and server talking over loopback TCP or an in-memory pipe.

use std::time::Duration;

use arq_lab_abstract::{Command, Message, ProtocolConfig};
use arq_lab_session::{Client, ConnectionCounter, FileStore, Responder, run_server, save_download};
use tokio::io::{DuplexStream, duplex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

async fn start_server(files: FileStore) -> (std::net::SocketAddr, ConnectionCounter) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    let counter = ConnectionCounter::default();
    let responder = Responder::new(ProtocolConfig::default(), files);
    tokio::spawn(run_server(listener, responder, counter.clone()));
    (addr, counter)
}

/// Server task on one end of an in-memory pipe, client on the other.
fn over_duplex(
    server: ProtocolConfig,
    client: ProtocolConfig,
) -> (Client<DuplexStream>, JoinHandle<Result<u32, arq_lab_session::SessionError>>) {
    let (server_end, client_end) = duplex(256 * 1024);
    let responder = Responder::new(server, FileStore::new(scratch_dir("none")));
    let task = tokio::spawn(async move { responder.serve(server_end, "duplex").await });
    (Client::new(client_end, client), task)
}

fn scratch_dir(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("arq-lab-{tag}-{}", std::process::id()))
}

#[tokio::test]
async fn chat_error_and_exit() {
    let (addr, _) = start_server(FileStore::new(scratch_dir("none"))).await;
    let mut client = Client::connect(addr, ProtocolConfig::default()).await.unwrap();

    let reply = client.request(Command::Chat, "hi").await.unwrap();
    assert_eq!(reply, Some(Message::new(Command::Chat, "hi")));

    let reply = client.request(Command::File, "../etc/passwd").await.unwrap().unwrap();
    assert_eq!(reply.command, Command::Error);

    client.exit().await.unwrap();
}

#[tokio::test]
async fn large_file_crosses_many_windows() {
    let dir = scratch_dir("files");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let image: Vec<u8> = (0..40_000u32).map(|i| (i * 7 % 251) as u8).collect();
    tokio::fs::write(dir.join("photo.jpg"), &image).await.unwrap();

    let (addr, _) = start_server(FileStore::new(&dir)).await;
    let mut client = Client::connect(addr, ProtocolConfig::default()).await.unwrap();

    let reply = client.request(Command::File, "photo.jpg").await.unwrap().unwrap();
    assert_eq!(reply.command, Command::File);
    let saved = save_download(&dir.join("downloads"), "photo.jpg", &reply.data)
        .await
        .unwrap();
    assert_eq!(tokio::fs::read(saved).await.unwrap(), image);

    // the connection is still usable afterwards
    let reply = client.request(Command::Chat, "thanks").await.unwrap();
    assert_eq!(reply, Some(Message::new(Command::Chat, "thanks")));

    client.exit().await.unwrap();
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn concurrent_clients_are_independent() {
    let (addr, counter) = start_server(FileStore::new(scratch_dir("none"))).await;

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            tokio::spawn(async move {
                let mut client = Client::connect(addr, ProtocolConfig::default()).await.unwrap();
                let text = format!("client {i} says {}", "x".repeat(1000 * i));
                let reply = client.request(Command::Chat, text.clone()).await.unwrap();
                assert_eq!(reply, Some(Message::new(Command::Chat, text)));
                client.exit().await.unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    // server tasks notice the hangups shortly after
    for _ in 0..50 {
        if counter.current() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(counter.current(), 0);
}

#[tokio::test]
async fn lost_final_ack_does_not_shift_later_replies() {
    let server = ProtocolConfig {
        ack_timeout_ms: 2_000,
        ..ProtocolConfig::default()
    };
    let (mut client, task) = over_duplex(server, ProtocolConfig::default());
    client.link_mut().faults_mut().schedule_ack_drop(1);

    for text in ["first", "second", "third"] {
        let reply = client.request(Command::Chat, text).await.unwrap();
        assert_eq!(reply, Some(Message::new(Command::Chat, text)));
    }

    client.exit().await.unwrap();
    assert_eq!(task.await.unwrap().unwrap(), 3);
}

#[tokio::test]
async fn client_window_larger_than_server_window() {
    let client = ProtocolConfig {
        window_size: 8,
        ..ProtocolConfig::default()
    };
    let (mut client, task) = over_duplex(ProtocolConfig::default(), client);

    let long = "w".repeat(7000);
    let reply = client.request(Command::Chat, long.clone()).await.unwrap();
    assert_eq!(reply, Some(Message::new(Command::Chat, long)));

    let reply = client.request(Command::Chat, "still in step").await.unwrap();
    assert_eq!(reply, Some(Message::new(Command::Chat, "still in step")));

    client.exit().await.unwrap();
    assert_eq!(task.await.unwrap().unwrap(), 2);
}
