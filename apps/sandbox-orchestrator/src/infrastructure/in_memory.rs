//! In-memory sandbox platform for testing.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, stream};
use parking_lot::Mutex;

use crate::application::ports::{LogOptions, LogStream, PlatformError, SandboxPlatform};
use crate::domain::{EgressPolicy, ObservedState, SandboxId, SandboxSpec};

#[derive(Debug, Clone)]
struct Instance {
    spec: SandboxSpec,
    state: ObservedState,
    output: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    instances: HashMap<SandboxId, Instance>,
    networks: HashMap<String, BTreeSet<String>>,
    failing_launches: HashSet<SandboxId>,
    launches: usize,
    removals: usize,
}

/// In-memory implementation of [`SandboxPlatform`].
///
/// Records every launch and removal, and lets tests kill instances or make
/// launches fail. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    inner: Mutex<Inner>,
}

impl InMemoryPlatform {
    /// Create an empty platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the instance's process dying outside the orchestrator.
    ///
    /// Returns `false` if no such instance exists.
    pub fn kill(&self, id: &SandboxId) -> bool {
        let mut inner = self.inner.lock();
        inner.instances.get_mut(id).is_some_and(|instance| {
            instance.state = ObservedState::Stopped {
                detail: "exited".to_string(),
            };
            true
        })
    }

    /// Make every future launch of `id` fail after registering the instance.
    pub fn fail_launches_of(&self, id: SandboxId) {
        self.inner.lock().failing_launches.insert(id);
    }

    /// Append an output line to a running instance.
    pub fn emit(&self, id: &SandboxId, line: impl Into<String>) {
        if let Some(instance) = self.inner.lock().instances.get_mut(id) {
            instance.output.push(line.into());
        }
    }

    /// Spec the instance was launched with.
    #[must_use]
    pub fn spec(&self, id: &SandboxId) -> Option<SandboxSpec> {
        self.inner.lock().instances.get(id).map(|i| i.spec.clone())
    }

    /// Number of instances currently running.
    #[must_use]
    pub fn running(&self) -> usize {
        self.inner
            .lock()
            .instances
            .values()
            .filter(|i| matches!(i.state, ObservedState::Running { .. }))
            .count()
    }

    /// Number of instances registered, running or not.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.inner.lock().instances.len()
    }

    /// Total launch attempts.
    #[must_use]
    pub fn launches(&self) -> usize {
        self.inner.lock().launches
    }

    /// Total removals of an existing instance.
    #[must_use]
    pub fn removals(&self) -> usize {
        self.inner.lock().removals
    }

    /// Whether the network has been created.
    #[must_use]
    pub fn has_network(&self, name: &str) -> bool {
        self.inner.lock().networks.contains_key(name)
    }

    /// Non-sandbox members of a network, sorted.
    #[must_use]
    pub fn network_peers(&self, name: &str) -> Vec<String> {
        self.inner
            .lock()
            .networks
            .get(name)
            .map(|peers| peers.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SandboxPlatform for InMemoryPlatform {
    async fn observe(&self, id: &SandboxId) -> Result<ObservedState, PlatformError> {
        Ok(self
            .inner
            .lock()
            .instances
            .get(id)
            .map_or(ObservedState::Absent, |i| i.state.clone()))
    }

    async fn ensure_network(&self, egress: &EgressPolicy) -> Result<(), PlatformError> {
        self.inner
            .lock()
            .networks
            .entry(egress.network.clone())
            .or_default()
            .insert(egress.gateway_container.clone());
        Ok(())
    }

    async fn launch(&self, spec: &SandboxSpec) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        inner.launches += 1;
        if inner.instances.contains_key(&spec.id) {
            return Err(PlatformError::CommandFailed {
                command: "run".to_string(),
                code: Some(125),
                stderr: format!("name {} is already in use", spec.id),
            });
        }

        let failing = inner.failing_launches.contains(&spec.id);
        let state = if failing {
            ObservedState::Stopped {
                detail: "created".to_string(),
            }
        } else {
            ObservedState::Running {
                started_at: Some(Utc::now()),
            }
        };
        inner.instances.insert(
            spec.id.clone(),
            Instance {
                spec: spec.clone(),
                state,
                output: Vec::new(),
            },
        );

        if failing {
            return Err(PlatformError::Unavailable(format!(
                "cannot start {}",
                spec.id
            )));
        }
        Ok(())
    }

    async fn remove(&self, id: &SandboxId) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        if inner.instances.remove(id).is_some() {
            inner.removals += 1;
        }
        Ok(())
    }

    async fn logs(&self, id: &SandboxId, options: LogOptions) -> Result<LogStream, PlatformError> {
        let output = self
            .inner
            .lock()
            .instances
            .get(id)
            .map(|i| i.output.clone())
            .unwrap_or_default();
        let skip = output.len().saturating_sub(options.tail);
        Ok(stream::iter(output.into_iter().skip(skip).map(Ok)).boxed())
    }
}
