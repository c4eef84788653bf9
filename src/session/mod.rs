//! The per-session state machine: one TX loop and one RX loop racing
//! the test-duration timer and the signal watcher, ported from
//! `Session::on_init`/`on_receive`/`on_send`/`on_finish` in
//! `Session.cpp`.
//!
//! A session never leaves the reactor thread that created it, so
//! shared state is `Rc<RefCell<_>>` rather than `Arc<Mutex<_>>`, and
//! cancellation is a `tokio::sync::watch::Sender<bool>` checked at
//! every suspension point instead of an `io_service::post`-based
//! cancel.

pub mod tcp;
pub mod udp;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::{Protocol, SessionConfig, ShutdownPolicy};
use crate::error::Error;
use crate::pattern::{self, make_pattern_buffer, BUFFER_SIZE};
use crate::signals;
use crate::stats::Statistics;
use crate::throttle::BandwidthThrottle;

struct SessionState {
    config: SessionConfig,
    bytes_sent: u64,
    bytes_received: u64,
    is_send_complete: bool,
    is_receive_complete: bool,
    stats: Statistics,
    first_failure: Option<Error>,
}

impl SessionState {
    fn new(config: SessionConfig) -> Self {
        let is_send_complete = !config.direction.sends();
        let is_receive_complete = !config.direction.receives();
        SessionState {
            config,
            bytes_sent: 0,
            bytes_received: 0,
            is_send_complete,
            is_receive_complete,
            stats: Statistics::default(),
            first_failure: None,
        }
    }

    fn is_finished(&self) -> bool {
        self.is_send_complete && self.is_receive_complete
    }
}

/// A completed session, handed back to the orchestrator for `finalize`.
pub struct SessionOutcome {
    pub config: SessionConfig,
    pub stats: Statistics,
    pub failure: Option<Error>,
}

#[derive(Clone)]
enum Transport {
    Tcp(tcp::TcpTransport),
    Udp(Rc<udp::UdpTransport>),
}

impl Transport {
    async fn open(config: &SessionConfig) -> Result<Self, Error> {
        match config.protocol {
            Protocol::Tcp => tcp::open(config).await.map(Transport::Tcp).map_err(Error::from),
            Protocol::Udp => udp::open(config)
                .await
                .map(|t| Transport::Udp(Rc::new(t)))
                .map_err(Error::from),
        }
    }

    async fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Tcp(t) => t.send(buf).await,
            Transport::Udp(u) => u.send(buf).await,
        }
    }

    async fn receive(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Tcp(t) => t.receive(buf).await,
            Transport::Udp(u) => u.receive(buf).await,
        }
    }

    fn prepare_receive(&self) {
        if let Transport::Tcp(t) = self {
            t.prepare_receive();
        }
    }

    async fn shutdown_send(&self) -> std::io::Result<()> {
        match self {
            Transport::Tcp(t) => t.shutdown_send().await,
            Transport::Udp(_) => Ok(()),
        }
    }

    async fn wait_for_peer_close(&self) -> std::io::Result<bool> {
        match self {
            Transport::Tcp(t) => t.wait_for_peer_close().await,
            Transport::Udp(_) => Ok(true),
        }
    }

    /// How many bytes this slice is allowed to attempt to send: for
    /// TCP, just the quota/remaining/buffer cap; for UDP, also a
    /// random datagram-size sample.
    fn cap_send_len(&self, quota: u64, remaining: u64) -> usize {
        match self {
            Transport::Tcp(_) => quota.min(remaining).min(BUFFER_SIZE as u64) as usize,
            Transport::Udp(u) => u.sample_datagram_len(quota, remaining),
        }
    }

    /// How large a buffer to hand to `receive`. UDP always reads a
    /// full datagram regardless of quota, since a short buffer would
    /// silently truncate it; TCP streams can be read in arbitrarily
    /// small chunks.
    fn cap_receive_len(&self, quota: u64, remaining: u64) -> usize {
        match self {
            Transport::Tcp(_) => quota.min(remaining).min(BUFFER_SIZE as u64) as usize,
            Transport::Udp(_) => BUFFER_SIZE,
        }
    }
}

/// Drive one session to completion and report its outcome.
pub async fn run_session(config: SessionConfig) -> SessionOutcome {
    let transport = match Transport::open(&config).await {
        Ok(t) => t,
        Err(e) => {
            return SessionOutcome {
                config,
                stats: Statistics::default(),
                failure: Some(e),
            }
        }
    };

    let timeout = config.test_duration_budget();
    let send_throttle =
        BandwidthThrottle::new(config.send_bandwidth, config.bandwidth_sampling_frequency);
    let receive_throttle =
        BandwidthThrottle::new(config.receive_bandwidth, config.bandwidth_sampling_frequency);

    let state = Rc::new(RefCell::new(SessionState::new(config)));
    state.borrow_mut().stats.start();

    let (stop_tx, _keep_alive_rx) = watch::channel(false);

    tokio::join!(
        tx_loop(
            state.clone(),
            transport.clone(),
            send_throttle,
            stop_tx.clone(),
            stop_tx.subscribe(),
        ),
        rx_loop(
            state.clone(),
            transport.clone(),
            receive_throttle,
            stop_tx.clone(),
            stop_tx.subscribe(),
        ),
        timeout_task(state.clone(), timeout, stop_tx.clone(), stop_tx.subscribe()),
        signal_task(state.clone(), stop_tx.clone(), stop_tx.subscribe()),
    );

    drop(transport);
    let mut state = Rc::try_unwrap(state)
        .unwrap_or_else(|_| panic!("session state outlived its tasks"))
        .into_inner();
    // A session aborted mid-transfer never reaches `mark_send_complete`/
    // `mark_receive_complete`; make sure the reported byte counts still
    // reflect what was actually moved.
    state.stats.bytes_sent = state.bytes_sent;
    state.stats.bytes_received = state.bytes_received;
    SessionOutcome {
        config: state.config,
        stats: state.stats,
        failure: state.first_failure,
    }
}

fn abort(state: &Rc<RefCell<SessionState>>, stop_tx: &watch::Sender<bool>, err: Error) {
    let mut st = state.borrow_mut();
    if st.first_failure.is_none() {
        st.first_failure = Some(err);
    }
    drop(st);
    let _ = stop_tx.send(true);
}

async fn tx_loop(
    state: Rc<RefCell<SessionState>>,
    transport: Transport,
    mut throttle: BandwidthThrottle,
    stop_tx: watch::Sender<bool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    if state.borrow().is_send_complete {
        return;
    }
    throttle.reset();
    let send_buf = make_pattern_buffer();

    loop {
        let quota = match throttle.next_slice(&mut stop_rx).await {
            Some(q) => q,
            None => return,
        };
        let remaining = {
            let st = state.borrow();
            st.config.size.saturating_sub(st.bytes_sent)
        };
        if remaining == 0 {
            break;
        }
        let offset = (state.borrow().bytes_sent % BUFFER_SIZE as u64) as usize;
        // never let a single write wrap past the end of the pattern buffer
        let len = transport
            .cap_send_len(quota, remaining)
            .min(BUFFER_SIZE - offset);
        if len == 0 {
            continue;
        }
        match transport.send(&send_buf[offset..offset + len]).await {
            Ok(n) => state.borrow_mut().bytes_sent += n as u64,
            Err(e) => {
                abort(&state, &stop_tx, e.into());
                return;
            }
        }
    }

    if let Err(e) = finish_send(&state, &transport).await {
        abort(&state, &stop_tx, e.into());
        return;
    }
    let now_finished = {
        let mut st = state.borrow_mut();
        st.is_send_complete = true;
        let bytes_sent = st.bytes_sent;
        st.stats.mark_send_complete(bytes_sent);
        st.is_finished()
    };
    if now_finished {
        on_finish(&state, &stop_tx).await;
    }
}

async fn rx_loop(
    state: Rc<RefCell<SessionState>>,
    transport: Transport,
    mut throttle: BandwidthThrottle,
    stop_tx: watch::Sender<bool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    if state.borrow().is_receive_complete {
        return;
    }
    throttle.reset();
    let mut recv_buf = vec![0u8; BUFFER_SIZE];

    loop {
        let quota = match throttle.next_slice(&mut stop_rx).await {
            Some(q) => q,
            None => return,
        };
        let remaining = {
            let st = state.borrow();
            st.config.size.saturating_sub(st.bytes_received)
        };
        if remaining == 0 {
            break;
        }
        let len = transport.cap_receive_len(quota, remaining);
        if len == 0 {
            continue;
        }
        transport.prepare_receive();
        match transport.receive(&mut recv_buf[..len]).await {
            Ok(0) => {
                abort(&state, &stop_tx, Error::UnexpectedEof);
                return;
            }
            Ok(n) => {
                let (received_before, verify_mode) = {
                    let st = state.borrow();
                    (st.bytes_received, st.config.verify.into())
                };
                if let Err((offset, expected, actual)) =
                    pattern::verify(verify_mode, received_before, &recv_buf[..n])
                {
                    abort(
                        &state,
                        &stop_tx,
                        Error::ChecksumFailed {
                            offset,
                            expected,
                            actual,
                        },
                    );
                    return;
                }
                state.borrow_mut().bytes_received += n as u64;
            }
            Err(e) => {
                abort(&state, &stop_tx, e.into());
                return;
            }
        }
    }

    match finish_receive(&state, &transport).await {
        Ok(None) => {}
        Ok(Some(err)) => {
            abort(&state, &stop_tx, err);
            return;
        }
        Err(e) => {
            abort(&state, &stop_tx, e.into());
            return;
        }
    }
    let now_finished = {
        let mut st = state.borrow_mut();
        st.is_receive_complete = true;
        let bytes_received = st.bytes_received;
        st.stats.mark_receive_complete(bytes_received);
        st.is_finished()
    };
    if now_finished {
        on_finish(&state, &stop_tx).await;
    }
}

async fn finish_send(
    state: &Rc<RefCell<SessionState>>,
    transport: &Transport,
) -> std::io::Result<()> {
    let policy = state.borrow().config.shutdown_policy;
    if policy == ShutdownPolicy::SendComplete {
        transport.shutdown_send().await?;
    }
    Ok(())
}

/// Once the RX byte budget is reached: shut down our write side first
/// if `RECEIVE_COMPLETE` calls for it, then unconditionally probe for
/// EOF on TCP — any bytes read back mean the peer sent more than it
/// should have, regardless of shutdown policy (ported from
/// `TcpSession::finish_receive`/`on_eof`). UDP has no peer-close
/// notion, so it's always a clean completion.
async fn finish_receive(
    state: &Rc<RefCell<SessionState>>,
    transport: &Transport,
) -> std::io::Result<Option<Error>> {
    let (policy, protocol) = {
        let st = state.borrow();
        (st.config.shutdown_policy, st.config.protocol)
    };
    if policy == ShutdownPolicy::ReceiveComplete {
        transport.shutdown_send().await?;
    }
    if protocol != Protocol::Tcp {
        return Ok(None);
    }
    match transport.wait_for_peer_close().await? {
        true => Ok(None),
        false => Ok(Some(Error::UnexpectedData)),
    }
}

/// Both halves have reached their byte budget: finalize statistics and
/// release the timeout/signal watchers (ported from
/// `Session::on_finish`).
async fn on_finish(state: &Rc<RefCell<SessionState>>, stop_tx: &watch::Sender<bool>) {
    state.borrow_mut().stats.mark_finished();
    let _ = stop_tx.send(true);
}

async fn timeout_task(
    state: Rc<RefCell<SessionState>>,
    budget: Duration,
    stop_tx: watch::Sender<bool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    if *stop_rx.borrow() {
        return;
    }
    tokio::select! {
        _ = stop_rx.changed() => {}
        _ = tokio::time::sleep(budget) => abort(&state, &stop_tx, Error::TestTimeout),
    }
}

async fn signal_task(
    state: Rc<RefCell<SessionState>>,
    stop_tx: watch::Sender<bool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    if *stop_rx.borrow() {
        return;
    }
    tokio::select! {
        _ = stop_rx.changed() => {}
        signal = signals::wait_for_signal() => {
            if let Some(sig) = signal {
                abort(&state, &stop_tx, sig.into());
            }
        }
    }
}
