//! Per-page session loop
//!
//! One [`Session`] task owns one page's [`AttachmentManager`] and serializes
//! everything that touches it: page change notifications, background worker
//! announcements, and control-surface requests. All mutation happens on this
//! single task, so the manager itself needs no locking.

use crate::domain::graph::AttachmentManager;
use crate::domain::media::{PageEvent, PageView};
use crate::domain::protocol::{
    control_channel, ControlEndpoint, ControlPort, Request, Responder, Response,
};
use crate::domain::store::SettingsStore;
use crate::domain::worker::{EnhancerWorker, WorkerEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Event-driven loop tying one page to storage and control surfaces
pub struct Session<S> {
    domain: String,
    manager: AttachmentManager,
    worker: Arc<EnhancerWorker<S>>,
    endpoint: ControlEndpoint,
    page_events: broadcast::Receiver<PageEvent>,
    worker_events: broadcast::Receiver<WorkerEvent>,
}

impl<S: SettingsStore> Session<S> {
    /// Wire a session to a page and worker. The returned [`ControlPort`] is
    /// the caller's handle for requests; it can be cloned freely.
    pub fn new(
        page: Arc<dyn PageView>,
        worker: Arc<EnhancerWorker<S>>,
        domain: String,
        sample_rate: u32,
    ) -> (Self, ControlPort) {
        let (port, endpoint) = control_channel();
        let page_events = page.subscribe();
        let worker_events = worker.subscribe();
        let manager = AttachmentManager::new(page, sample_rate);
        (
            Self {
                domain,
                manager,
                worker,
                endpoint,
                page_events,
                worker_events,
            },
            port,
        )
    }

    /// Resolve persisted settings, attach everything already in the page,
    /// then serve events and requests until the page goes away
    pub async fn run(mut self) {
        self.reload_settings().await;
        info!("Session started for domain {}", self.domain);

        let mut ports_open = true;
        let mut worker_open = true;
        loop {
            tokio::select! {
                // Control-surface requests
                request = self.endpoint.recv(), if ports_open => {
                    match request {
                        Some((request, responder)) => self.handle_request(request, responder),
                        None => {
                            debug!("All control ports closed");
                            ports_open = false;
                        }
                    }
                }

                // Page change notifications
                event = self.page_events.recv() => {
                    match event {
                        Ok(event) => self.manager.handle_event(event),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("Dropped {} page events, rescanning", missed);
                            if let Err(e) = self.manager.scan() {
                                warn!("Rescan failed: {}", e);
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Page went away, ending session for {}", self.domain);
                            break;
                        }
                    }
                }

                // Background worker announcements
                event = self.worker_events.recv(), if worker_open => {
                    match event {
                        Ok(event) => {
                            if self.concerns_us(&event) {
                                self.reload_settings().await;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            self.reload_settings().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Worker went away");
                            worker_open = false;
                        }
                    }
                }
            }
        }
    }

    fn concerns_us(&self, event: &WorkerEvent) -> bool {
        let domain = match event {
            WorkerEvent::EnabledChanged { domain, .. } => domain,
            WorkerEvent::SettingsChanged { domain } => domain,
            WorkerEvent::PresetApplied { domain, .. } => domain,
        };
        domain == &self.domain
    }

    /// Re-resolve persisted settings and project them over the page.
    /// Failures keep the previous settings live; never fatal.
    async fn reload_settings(&mut self) {
        match self.worker.service().resolve(Some(&self.domain), None).await {
            Ok(settings) => {
                if let Err(e) = self.manager.set_settings(settings) {
                    warn!("Settings propagation failed: {}", e);
                }
            }
            Err(e) => {
                warn!("Could not resolve settings for {}: {}", self.domain, e);
            }
        }
    }

    fn handle_request(&mut self, request: Request, responder: Responder) {
        let response = match request {
            Request::UpdateSettings(patch) => Response::Ack {
                success: self.manager.apply_patch(&patch).is_ok(),
            },
            Request::GetStatus => Response::Status {
                enabled: self.manager.enabled(),
            },
            Request::GetAudioInfo => Response::AudioInfo {
                audio_info: self.manager.audio_info(),
            },
            Request::GetSpectrumData => Response::Spectrum {
                data: self.manager.spectrum(),
            },
        };
        responder.respond(response);
    }
}
