//! Remote service availability probe.
//!
//! The probe issues `GET {service}/` and records Online on a 2xx reply,
//! Offline on anything else (including transport failure). It never sits on
//! the detection path: the loop only reads the shared flag.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use url::Url;

use crate::detect::{service_url, BackendError};
use crate::ServiceAvailability;

/// Shared, lock-free view of the last probe result.
#[derive(Clone, Debug, Default)]
pub struct AvailabilityFlag(Arc<AtomicU8>);

impl AvailabilityFlag {
    pub fn new(initial: ServiceAvailability) -> Self {
        Self(Arc::new(AtomicU8::new(initial.to_u8())))
    }

    pub fn get(&self) -> ServiceAvailability {
        ServiceAvailability::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Store a new value and return the previous one.
    pub fn set(&self, value: ServiceAvailability) -> ServiceAvailability {
        ServiceAvailability::from_u8(self.0.swap(value.to_u8(), Ordering::SeqCst))
    }
}

#[derive(Clone)]
pub struct AvailabilityProbe {
    root: Url,
    agent: ureq::Agent,
    flag: AvailabilityFlag,
    in_flight: Arc<AtomicBool>,
}

impl AvailabilityProbe {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            root: service_url(base_url, "")?,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            flag: AvailabilityFlag::default(),
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Publish results into an existing flag instead of a private one.
    pub fn with_flag(mut self, flag: AvailabilityFlag) -> Self {
        self.flag = flag;
        self
    }

    pub fn flag(&self) -> AvailabilityFlag {
        self.flag.clone()
    }

    pub fn availability(&self) -> ServiceAvailability {
        self.flag.get()
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Probe the service root now and record the result.
    pub fn check(&self) -> ServiceAvailability {
        let availability = match self.agent.get(self.root.as_str()).call() {
            Ok(response) if (200..300).contains(&response.status()) => ServiceAvailability::Online,
            Ok(response) => {
                log::debug!("probe {} returned status {}", self.root, response.status());
                ServiceAvailability::Offline
            }
            Err(err) => {
                log::debug!("probe {} failed: {}", self.root, err);
                ServiceAvailability::Offline
            }
        };

        let previous = self.flag.set(availability);
        if previous != availability {
            match availability {
                ServiceAvailability::Online => {
                    log::info!("detection service {}: online", self.root)
                }
                _ => log::warn!(
                    "detection service {}: offline; remote detection unavailable",
                    self.root
                ),
            }
        }
        availability
    }

    /// Run `check` on a side thread. Returns `None` when a background check is
    /// already in flight.
    pub fn check_in_background(&self) -> Option<JoinHandle<ServiceAvailability>> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return None;
        }
        let probe = self.clone();
        Some(std::thread::spawn(move || {
            let availability = probe.check();
            probe.in_flight.store(false, Ordering::SeqCst);
            availability
        }))
    }

    pub fn is_checking(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}
