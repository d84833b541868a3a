//! Per-port request serialization.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use mfc_core::{NodeAddress, PortName};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ArbiterConfig;
use crate::error::{BusResult, TransportError, TransportFault};
use crate::protocol::{BusRequest, BusResponse, Operation, Parameter, Priority};
use crate::transport::{PortLink, Transport};

struct Job {
    request: BusRequest,
    reply: oneshot::Sender<Result<BusResponse, TransportFault>>,
}

/// Handle to the actor that owns one open port.
struct PortSession {
    normal: mpsc::UnboundedSender<Job>,
    safety: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
    closing: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Per-port cell. Locked only by requests for that port, so a slow open
/// or close never stalls another port.
type Slot = Arc<Mutex<Option<PortSession>>>;

/// Serializes all access to shared ports.
///
/// Sessions open lazily on first use and stay open until [`BusArbiter::close`]
/// or [`BusArbiter::close_all`]. Neither the controller nor the safety
/// monitor touch a [`PortLink`] directly.
pub struct BusArbiter {
    transport: Arc<dyn Transport>,
    config: ArbiterConfig,
    slots: parking_lot::Mutex<HashMap<PortName, Slot>>,
}

impl BusArbiter {
    pub fn new(transport: Arc<dyn Transport>, config: ArbiterConfig) -> Self {
        Self {
            transport,
            config,
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Open `port` if it has no session yet.
    pub async fn open(&self, port: &PortName) -> BusResult<()> {
        let slot = self.slot(port);
        let mut session = slot.lock().await;
        if session.is_none() {
            *session = Some(self.connect(port).await?);
            info!(%port, "port session opened");
        }
        Ok(())
    }

    pub async fn is_open(&self, port: &PortName) -> bool {
        let slot = self.slots.lock().get(port).cloned();
        match slot {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    pub async fn open_ports(&self) -> Vec<PortName> {
        let mut ports = Vec::new();
        for (port, slot) in self.all_slots() {
            if slot.lock().await.is_some() {
                ports.push(port);
            }
        }
        ports.sort();
        ports
    }

    /// Close the session for `port`. The request in flight finishes; requests
    /// still queued fail with [`TransportFault::SessionClosed`]. Closing an
    /// unknown port is a no-op.
    pub async fn close(&self, port: &PortName) {
        let slot = self.slots.lock().get(port).cloned();
        if let Some(slot) = slot {
            close_slot(port, &slot).await;
        }
    }

    pub async fn close_all(&self) {
        for (port, slot) in self.all_slots() {
            close_slot(&port, &slot).await;
        }
    }

    /// Run one request on `port`, opening the session if needed.
    pub async fn execute(&self, port: &PortName, request: BusRequest, priority: Priority) -> BusResult<BusResponse> {
        let node = request.node;
        let err = |cause| TransportError::new(port.clone(), Some(node), cause);

        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            request,
            reply: reply_tx,
        };

        {
            let slot = self.slot(port);
            let mut guard = slot.lock().await;
            if guard.is_none() {
                *guard = Some(self.connect(port).await?);
                info!(%port, "port session opened on first use");
            }
            let session = guard
                .as_ref()
                .ok_or_else(|| err(TransportFault::SessionClosed))?;

            let depth = session.pending.fetch_add(1, Ordering::SeqCst) + 1;
            if depth > self.config.queue_depth_warn {
                warn!(%port, depth, "port queue is backing up");
            }
            let lane = match priority {
                Priority::Normal => &session.normal,
                Priority::Safety => &session.safety,
            };
            if lane.send(job).is_err() {
                session.pending.fetch_sub(1, Ordering::SeqCst);
                return Err(err(TransportFault::SessionClosed));
            }
        }

        match reply_rx.await {
            Ok(result) => result.map_err(err),
            Err(_) => Err(err(TransportFault::SessionClosed)),
        }
    }

    pub async fn read(&self, port: &PortName, node: NodeAddress, parameter: Parameter, priority: Priority) -> BusResult<f64> {
        let response = self
            .execute(port, BusRequest::read(node, parameter), priority)
            .await?;
        response.value().ok_or_else(|| {
            TransportError::new(
                port.clone(),
                Some(node),
                TransportFault::Malformed {
                    detail: "read answered with an acknowledgement".to_string(),
                },
            )
        })
    }

    pub async fn write(
        &self,
        port: &PortName,
        node: NodeAddress,
        parameter: Parameter,
        value: f64,
        priority: Priority,
    ) -> BusResult<()> {
        self.execute(port, BusRequest::write(node, parameter, value), priority)
            .await
            .map(|_| ())
    }

    fn slot(&self, port: &PortName) -> Slot {
        Arc::clone(self.slots.lock().entry(port.clone()).or_default())
    }

    fn all_slots(&self) -> Vec<(PortName, Slot)> {
        self.slots
            .lock()
            .iter()
            .map(|(port, slot)| (port.clone(), Arc::clone(slot)))
            .collect()
    }

    /// Open the link, bounded by the response timeout, and start its actor.
    async fn connect(&self, port: &PortName) -> BusResult<PortSession> {
        let after = self.config.response_timeout;
        let link = tokio::time::timeout(after, self.transport.open(port))
            .await
            .map_err(|_| TransportFault::Timeout { after })
            .and_then(|opened| opened)
            .map_err(|cause| TransportError::new(port.clone(), None, cause))?;
        Ok(self.spawn_session(port.clone(), link))
    }

    fn spawn_session(&self, port: PortName, link: Box<dyn PortLink>) -> PortSession {
        let (normal_tx, normal_rx) = mpsc::unbounded_channel();
        let (safety_tx, safety_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let closing = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_port(
            port,
            link,
            normal_rx,
            safety_rx,
            Arc::clone(&pending),
            Arc::clone(&closing),
            self.config.clone(),
        ));
        PortSession {
            normal: normal_tx,
            safety: safety_tx,
            pending,
            closing,
            task,
        }
    }
}

async fn close_slot(port: &PortName, slot: &Mutex<Option<PortSession>>) {
    let mut guard = slot.lock().await;
    if let Some(session) = guard.take() {
        shutdown(port, session).await;
    }
}

async fn shutdown(port: &PortName, session: PortSession) {
    let PortSession {
        normal,
        safety,
        closing,
        task,
        ..
    } = session;
    closing.store(true, Ordering::SeqCst);
    drop(normal);
    drop(safety);
    if let Err(e) = task.await {
        warn!(%port, error = %e, "port task ended abnormally");
    }
    info!(%port, "port session closed");
}

/// Port actor: the only owner of the link. Safety lane first, FIFO per lane.
async fn run_port(
    port: PortName,
    mut link: Box<dyn PortLink>,
    mut normal: mpsc::UnboundedReceiver<Job>,
    mut safety: mpsc::UnboundedReceiver<Job>,
    pending: Arc<AtomicUsize>,
    closing: Arc<AtomicBool>,
    config: ArbiterConfig,
) {
    loop {
        let job = tokio::select! {
            biased;
            Some(job) = safety.recv() => job,
            Some(job) = normal.recv() => job,
            else => break,
        };
        pending.fetch_sub(1, Ordering::SeqCst);

        if closing.load(Ordering::SeqCst) {
            if job.reply.send(Err(TransportFault::SessionClosed)).is_err() {
                debug!(%port, node = %job.request.node, "caller went away before reply");
            }
            continue;
        }

        let result = round_trip(link.as_mut(), job.request, &config).await;
        if let Err(fault) = &result {
            debug!(%port, node = %job.request.node, %fault, "bus request failed");
        }
        if job.reply.send(result).is_err() {
            debug!(%port, node = %job.request.node, "caller went away before reply");
        }
    }
    link.close().await;
}

async fn round_trip(
    link: &mut dyn PortLink,
    request: BusRequest,
    config: &ArbiterConfig,
) -> Result<BusResponse, TransportFault> {
    let fut = async {
        match request.op {
            Operation::Read(parameter) => link
                .read_parameter(request.node, parameter)
                .await
                .map(BusResponse::Value),
            Operation::Write(parameter, value) => link
                .write_parameter(request.node, parameter, value)
                .await
                .map(|()| BusResponse::Ack),
        }
    };

    let response = tokio::time::timeout(config.response_timeout, fut)
        .await
        .map_err(|_| TransportFault::Timeout {
            after: config.response_timeout,
        })??;

    match response {
        BusResponse::Value(v) if !v.is_finite() => Err(TransportFault::Malformed {
            detail: format!("non-finite value {v}"),
        }),
        other => Ok(other),
    }
}
