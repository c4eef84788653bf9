//! End-to-end scenarios driving real loopback sockets through the
//! public `run_session` entry point, rather than the `tx_loop`/`rx_loop`
//! internals those unit tests already cover.

use std::time::Duration;

use net_tester::config::parse_session_line;
use net_tester::error::Error;
use net_tester::session::run_session;

fn local_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn tcp_client_server_transfer_completes_with_matching_bytes() {
    let rt = local_runtime();
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // free the port; the server session below rebinds it

        let server_config = parse_session_line(&format!(
            "--listen {} --size 64KiB --mode rx --verify all --shutdown-policy wait_for_peer",
            addr
        ))
        .unwrap();
        let client_config = parse_session_line(&format!(
            "--connect {} --size 64KiB --mode tx --verify all",
            addr
        ))
        .unwrap();

        let server = tokio::task::spawn_local(run_session(server_config));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let client = tokio::task::spawn_local(run_session(client_config));

        let (server_outcome, client_outcome) = tokio::join!(server, client);
        let server_outcome = server_outcome.unwrap();
        let client_outcome = client_outcome.unwrap();

        assert!(client_outcome.failure.is_none(), "{:?}", client_outcome.failure);
        assert!(server_outcome.failure.is_none(), "{:?}", server_outcome.failure);
        assert_eq!(server_outcome.stats.bytes_received, 64 * 1024);
        assert_eq!(client_outcome.stats.bytes_sent, 64 * 1024);
    });
}

#[test]
fn checksum_mismatch_is_detected_at_the_first_bad_byte() {
    let rt = local_runtime();
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let corruptor = tokio::task::spawn_local(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            use tokio::io::AsyncWriteExt;
            let garbage = vec![0xAAu8; 1024];
            stream.write_all(&garbage).await.unwrap();
        });

        let rx_config = parse_session_line(&format!(
            "--connect {} --size 1KiB --mode rx --verify all --shutdown-policy wait_for_peer",
            addr
        ))
        .unwrap();
        let outcome = run_session(rx_config).await;
        corruptor.await.unwrap();

        match outcome.failure {
            Some(Error::ChecksumFailed { offset, .. }) => assert_eq!(offset, 0),
            other => panic!("expected a checksum failure, got {:?}", other),
        }
    });
}

#[test]
fn rx_times_out_when_peer_never_sends() {
    let rt = local_runtime();
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let silent_peer = tokio::task::spawn_local(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let rx_config = parse_session_line(&format!(
            "--connect {} --size 1KiB --mode rx --duration-margin 50ms --shutdown-policy wait_for_peer",
            addr
        ))
        .unwrap();
        let outcome = run_session(rx_config).await;
        silent_peer.abort();

        assert!(matches!(outcome.failure, Some(Error::TestTimeout)));
    });
}

#[test]
fn udp_transfer_delivers_expected_byte_count() {
    let rt = local_runtime();
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, async {
        let rx_probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let rx_port = rx_probe.local_addr().unwrap().port();
        drop(rx_probe);
        let tx_probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let tx_port = tx_probe.local_addr().unwrap().port();
        drop(tx_probe);

        let rx_config = parse_session_line(&format!(
            "--connect 127.0.0.1:{}:127.0.0.1:{} --size 8KiB --mode rx --protocol udp --verify all \
             --shutdown-policy wait_for_peer",
            rx_port, tx_port
        ))
        .unwrap();
        let tx_config = parse_session_line(&format!(
            "--connect 127.0.0.1:{}:127.0.0.1:{} --size 8KiB --mode tx --protocol udp --verify all",
            tx_port, rx_port
        ))
        .unwrap();

        let rx = tokio::task::spawn_local(run_session(rx_config));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let tx = tokio::task::spawn_local(run_session(tx_config));

        let (rx_outcome, tx_outcome) = tokio::join!(rx, tx);
        let rx_outcome = rx_outcome.unwrap();
        let tx_outcome = tx_outcome.unwrap();

        assert!(rx_outcome.failure.is_none(), "{:?}", rx_outcome.failure);
        assert!(tx_outcome.failure.is_none(), "{:?}", tx_outcome.failure);
        assert_eq!(rx_outcome.stats.bytes_received, 8 * 1024);
    });
}
