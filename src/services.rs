//! Background service lifecycle management.
//!
//! `BackgroundServices` owns every background thread the engine spawns once
//! `start()` is called, starting them in dependency order and providing
//! clean shutdown. One thread per concern: a capture backend and a metrics
//! ticker, and nothing else — the audit writer already owns its own thread
//! inside `AuditLogger::start`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::defaults;
use crate::interceptor::InterceptorMetrics;
use crate::metrics::{self, FailureEscalation};
use crate::DlpEngine;

pub struct BackgroundServices {
    shutdown: Arc<AtomicBool>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl BackgroundServices {
    /// Starts the capture backend (if `interceptor.network.enabled`) and
    /// the metrics ticker, in that order — the ticker reads counters the
    /// capture thread and workers only begin incrementing once it's live.
    pub fn start(engine: Arc<DlpEngine>, interceptor_metrics: Arc<InterceptorMetrics>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();

        if engine.config().interceptor.network.enabled {
            handles.push(Self::start_capture(Arc::clone(&engine), Arc::clone(&shutdown)));
        }

        handles.push(Self::start_metrics_ticker(engine, interceptor_metrics, Arc::clone(&shutdown)));

        BackgroundServices { shutdown, handles }
    }

    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.join();
        }
    }

    #[cfg(target_os = "linux")]
    fn start_capture(engine: Arc<DlpEngine>, shutdown: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
        use crate::interceptor::capture_linux;

        std::thread::Builder::new()
        .name("dlp-capture".into())
        .spawn(move || {
            let Some(interface_name) = engine.config().interceptor.network.interface.clone() else {
                tracing::warn!("no capture interface configured, capture thread idling");
                return;
            };
            let interface = match capture_linux::open(&interface_name) {
                Ok(i) => i,
                Err(e) => {
                    tracing::error!("failed to open capture interface {interface_name}: {e}");
                    return;
                }
            };
            if let Err(e) = capture_linux::run_capture_loop(&interface, &shutdown, |packet| {
                engine.enqueue_packet(packet);
            }) {
                tracing::error!("capture loop ended: {e}");
            }
        })
        .expect("failed to spawn dlp capture thread")
    }

    #[cfg(target_os = "windows")]
    fn start_capture(engine: Arc<DlpEngine>, shutdown: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
        use crate::interceptor::capture_windows;

        std::thread::Builder::new()
        .name("dlp-capture".into())
        .spawn(move || {
            let filter = engine.config().interceptor.network.filter.clone();
            let mut wd = match capture_windows::open(&filter) {
                Ok(wd) => wd,
                Err(e) => {
                    tracing::error!("failed to open WinDivert handle: {e}");
                    return;
                }
            };
            capture_windows::run_capture_loop(&mut wd, &shutdown, |packet| {
                engine.enqueue_packet(packet);
                true
            });
        })
        .expect("failed to spawn dlp capture thread")
    }

    #[cfg(target_os = "macos")]
    fn start_capture(engine: Arc<DlpEngine>, shutdown: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
        use crate::interceptor::capture_macos;

        std::thread::Builder::new()
        .name("dlp-capture".into())
        .spawn(move || match capture_macos::RawCapture::open() {
            Ok(capture) => {
                capture_macos::run_capture_loop(&capture, &shutdown, |packet| {
                    engine.enqueue_packet(packet);
                });
            }
            Err(e) => {
                tracing::warn!("raw capture unavailable ({e}), falling back to attribution-only mode");
            }
        })
        .expect("failed to spawn dlp capture thread")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    fn start_capture(_engine: Arc<DlpEngine>, _shutdown: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
        std::thread::Builder::new()
        .name("dlp-capture".into())
        .spawn(|| tracing::warn!("no capture backend for this platform"))
        .expect("failed to spawn dlp capture thread")
    }

    fn start_metrics_ticker(
        engine: Arc<DlpEngine>,
        interceptor_metrics: Arc<InterceptorMetrics>,
        shutdown: Arc<AtomicBool>,
    ) -> std::thread::JoinHandle<()> {
        std::thread::Builder::new()
        .name("dlp-metrics".into())
        .spawn(move || {
            let mut escalation = FailureEscalation::new(
                defaults::AUDIT_FAILURE_ESCALATION_COUNT,
                Duration::from_secs(defaults::AUDIT_FAILURE_ESCALATION_WINDOW_SECS),
            );
            let audit_metrics = engine.pipeline().audit.metrics();
            let engine_metrics = engine.engine_metrics();
            loop {
                std::thread::sleep(Duration::from_secs(defaults::DROP_LOG_INTERVAL_SECS));
                if shutdown.load(Ordering::Relaxed) {
                    return;
                }
                let snap = metrics::snapshot(&interceptor_metrics, &audit_metrics, &engine_metrics);
                tracing::debug!(
                    packets_total = snap.packets_total,
                    packets_dropped = snap.packets_dropped_queue_full,
                    audit_dropped = snap.audit_dropped,
                    "engine metrics tick"
                );
                if escalation.observe(snap.audit_write_failures) {
                    tracing::error!(
                        failures = snap.audit_write_failures,
                        "sustained audit write failures, escalating health degradation"
                    );
                }
            }
        })
        .expect("failed to spawn dlp metrics thread")
    }
}
