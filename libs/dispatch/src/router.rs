use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchboard_fabric::frame::{CallResponse, ErrorFrame, Frame};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::message::{RawRequest, RawResponse};
use crate::response::ResponseFuture;

struct PendingCall {
    reply: oneshot::Sender<Result<RawResponse>>,
    timeout: Duration,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct RouterState {
    calls: HashMap<u32, PendingCall>,
    /// Set once the connection is torn down; later calls fail with it
    closed: Option<Arc<Error>>,
}

/// Correlates outbound calls with inbound responses on one connection
///
/// Every pending call leaves the table exactly once: by response, by error
/// frame, by deadline, or by connection teardown. Whoever removes the entry
/// under the lock is the only one allowed to complete it.
pub struct ResponseRouter {
    remote: SocketAddr,
    next_id: AtomicU32,
    state: Mutex<RouterState>,
    outbound: mpsc::UnboundedSender<Frame>,
    default_timeout: Duration,
}

impl ResponseRouter {
    pub fn new(
        remote: SocketAddr,
        outbound: mpsc::UnboundedSender<Frame>,
        default_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            remote,
            next_id: AtomicU32::new(1),
            state: Mutex::new(RouterState::default()),
            outbound,
            default_timeout,
        })
    }

    /// Register `request` and queue its call frame
    ///
    /// Returns immediately; the handle resolves when the response, an error
    /// frame, the deadline or a teardown arrives. Must be called from within a
    /// tokio runtime, which drives the deadline timer.
    pub fn expect(self: &Arc<Self>, request: RawRequest) -> ResponseFuture<RawResponse> {
        let timeout = request.timeout().unwrap_or(self.default_timeout);
        let (reply, slot) = oneshot::channel();

        let id = {
            let mut state = self.state.lock();
            if let Some(cause) = &state.closed {
                return ResponseFuture::failed(Error::Network(cause.clone()));
            }
            let id = self.allocate_id(&state.calls);
            state.calls.insert(
                id,
                PendingCall {
                    reply,
                    timeout,
                    timer: None,
                },
            );
            id
        };

        trace!(remote = %self.remote, id, ?timeout, "call registered");

        let frame = Frame::CallRequest(request.into_frame(id, timeout));
        if self.outbound.send(frame).is_err() {
            let cause = Arc::new(Error::from(switchboard_fabric::Error::ConnectionClosed));
            self.complete(id, Err(Error::Network(cause)));
        } else {
            self.arm_timer(id, timeout);
        }

        ResponseFuture::pending(slot)
    }

    /// Deliver an inbound response; false when no call is waiting for it
    pub fn handle_response(&self, frame: CallResponse) -> bool {
        let id = frame.id;
        let delivered = self.complete(id, Ok(frame.into()));
        if !delivered {
            debug!(remote = %self.remote, id, "dropping response for unknown call");
        }
        delivered
    }

    /// Fail the call named by an inbound error frame
    pub fn handle_error(&self, frame: ErrorFrame) -> bool {
        let id = frame.id;
        let delivered = self.complete(
            id,
            Err(Error::Remote {
                kind: frame.kind,
                message: frame.message,
            }),
        );
        if !delivered {
            debug!(remote = %self.remote, id, kind = %frame.kind, "dropping error for unknown call");
        }
        delivered
    }

    /// Fail every pending call with a network error caused by `cause`
    ///
    /// Calls registered afterwards fail immediately with the same cause.
    pub fn fail_all(&self, cause: Arc<Error>) -> usize {
        let drained: Vec<PendingCall> = {
            let mut state = self.state.lock();
            if state.closed.is_none() {
                state.closed = Some(cause.clone());
            }
            state.calls.drain().map(|(_, call)| call).collect()
        };

        let count = drained.len();
        if count > 0 {
            debug!(remote = %self.remote, count, %cause, "failing pending calls");
        }
        for call in drained {
            if let Some(timer) = call.timer {
                timer.abort();
            }
            let _ = call.reply.send(Err(Error::Network(cause.clone())));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed.is_some()
    }

    fn expire(&self, id: u32) -> bool {
        let Some(call) = self.take(id) else {
            return false;
        };
        debug!(remote = %self.remote, id, timeout = ?call.timeout, "call timed out");
        let _ = call.reply.send(Err(Error::RequestTimeout {
            id,
            timeout: call.timeout,
        }));
        true
    }

    fn complete(&self, id: u32, outcome: Result<RawResponse>) -> bool {
        let Some(call) = self.take(id) else {
            return false;
        };
        if let Some(timer) = call.timer {
            timer.abort();
        }
        // The caller may have dropped its handle
        let _ = call.reply.send(outcome);
        true
    }

    fn take(&self, id: u32) -> Option<PendingCall> {
        self.state.lock().calls.remove(&id)
    }

    fn allocate_id(&self, calls: &HashMap<u32, PendingCall>) -> u32 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if !calls.contains_key(&id) {
                return id;
            }
        }
    }

    fn arm_timer(self: &Arc<Self>, id: u32, timeout: Duration) {
        let router = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(router) = router.upgrade() {
                router.expire(id);
            }
        });

        let mut state = self.state.lock();
        match state.calls.get_mut(&id) {
            Some(call) => call.timer = Some(timer.abort_handle()),
            // Already completed before the timer was attached
            None => timer.abort(),
        }
    }
}
