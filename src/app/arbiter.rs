//! Single command queue shared by the front panel and the web server.
//!
//! Uses `embassy-sync` bounded channels to bridge the HTTP server thread
//! with the synchronous control loop.  The control loop is the only
//! consumer, so every state change happens on one thread in arrival
//! order.
//!
//! ```text
//! ┌──────────────┐  Envelope   ┌──────────────┐
//! │ HTTP handler │────────────▶│              │
//! │  (blocking)  │◀────────────│ Control Loop │
//! └──────────────┘ ReplyEnvelope│   (sync)     │
//! ┌──────────────┐  Envelope   │              │
//! │ Panel inputs │────────────▶│              │
//! └──────────────┘ (no reply)  └──────────────┘
//! ```
//!
//! Remote requests are serialised by an async mutex so each waiter only
//! ever sees its own reply. A remote command whose waiter timed out while
//! it was still queued is dropped unexecuted; one the loop had already
//! taken still runs, and its reply is discarded by id.

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use log::warn;

use super::commands::{ControlSurface, Reply, Request};
use super::ports::{BridgeError, CommandPort};

/// Channel depth for inbound commands.
pub const COMMAND_DEPTH: usize = 8;

/// Channel depth for replies.
const REPLY_DEPTH: usize = 2;

/// How long a web request waits for the control loop.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Id carried by local commands, whose replies are dropped.
const NO_REPLY: u32 = 0;

/// Inbound command tagged with its origin.
pub struct Envelope {
    pub id: u32,
    pub source: ControlSurface,
    pub request: Request,
}

struct ReplyEnvelope {
    id: u32,
    reply: Reply,
}

pub struct CommandQueue {
    inbound: Channel<CriticalSectionRawMutex, Envelope, COMMAND_DEPTH>,
    replies: Channel<CriticalSectionRawMutex, ReplyEnvelope, REPLY_DEPTH>,
    next_id: AtomicU32,
    /// Id of the remote request whose caller is still waiting.
    waiting: AtomicU32,
    remote_gate: Mutex<CriticalSectionRawMutex, ()>,
}

/// The device-wide queue.
pub static COMMAND_QUEUE: CommandQueue = CommandQueue::new();

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            inbound: Channel::new(),
            replies: Channel::new(),
            next_id: AtomicU32::new(1),
            waiting: AtomicU32::new(NO_REPLY),
            remote_gate: Mutex::new(()),
        }
    }

    /// Queue a front-panel command. Returns `false` if the queue is full.
    pub fn submit_local(&self, request: Request) -> bool {
        let envelope = Envelope {
            id: NO_REPLY,
            source: ControlSurface::Local,
            request,
        };
        if self.inbound.try_send(envelope).is_err() {
            warn!("Command queue full, dropping local input");
            return false;
        }
        true
    }

    /// Next pending command, for the control loop. Remote commands nobody
    /// is waiting for any more are skipped.
    pub fn try_next(&self) -> Option<Envelope> {
        loop {
            let envelope = self.inbound.try_receive().ok()?;
            if envelope.id == NO_REPLY || envelope.id == self.waiting.load(Ordering::Acquire) {
                return Some(envelope);
            }
            warn!("Dropping remote command {}: caller gave up", envelope.id);
        }
    }

    /// Deliver the reply for `id`. Local commands have no waiter.
    pub fn respond(&self, id: u32, reply: Reply) {
        if id == NO_REPLY {
            return;
        }
        if self.replies.try_send(ReplyEnvelope { id, reply }).is_err() {
            warn!("Reply channel full, dropping reply {}", id);
        }
    }

    /// Queue a remote command and wait for its reply.
    pub async fn request(&self, request: Request, timeout: Duration) -> Result<Reply, BridgeError> {
        let _gate = self.remote_gate.lock().await;

        // Replies for earlier requests that gave up waiting.
        while self.replies.try_receive().is_ok() {}

        let id = self.allocate_id();
        self.waiting.store(id, Ordering::Release);
        let result = self.send_and_wait(id, request, timeout).await;
        self.waiting.store(NO_REPLY, Ordering::Release);
        result
    }

    async fn send_and_wait(
        &self,
        id: u32,
        request: Request,
        timeout: Duration,
    ) -> Result<Reply, BridgeError> {
        self.inbound
            .try_send(Envelope {
                id,
                source: ControlSurface::Remote,
                request,
            })
            .map_err(|_| BridgeError::QueueFull)?;

        let wait = async {
            loop {
                let r = self.replies.receive().await;
                if r.id == id {
                    return Ok(r.reply);
                }
            }
        };
        let expire = async {
            async_io_mini::Timer::after(timeout).await;
            Err(BridgeError::Timeout)
        };
        futures_lite::future::or(wait, expire).await
    }

    fn allocate_id(&self) -> u32 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != NO_REPLY {
                return id;
            }
        }
    }
}

/// Blocking [`CommandPort`] over a [`CommandQueue`], for the HTTP server
/// thread.
pub struct RemoteClient<'a> {
    queue: &'a CommandQueue,
    timeout: Duration,
}

impl<'a> RemoteClient<'a> {
    pub fn new(queue: &'a CommandQueue, timeout: Duration) -> Self {
        Self { queue, timeout }
    }
}

impl CommandPort for RemoteClient<'_> {
    fn request(&self, request: Request) -> Result<Reply, BridgeError> {
        futures_lite::future::block_on(self.queue.request(request, self.timeout))
    }
}
