//! Finite state machine for one site's pipeline

use serde::{Deserialize, Serialize};

/// Site pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteState {
    /// Remote lookup not done yet
    Unresolved,

    /// The site already exists on the server
    Found,

    /// The site is being created
    Creating,

    /// Php, repository, env, script, aliases, nginx
    Configuring,

    /// Waiting for a certificate to be issued
    CertificatePending,

    /// Deployment triggered
    Deploying,

    Succeeded,

    Failed,
}

impl SiteState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SiteState::Succeeded | SiteState::Failed)
    }
}

/// Site pipeline event
#[derive(Debug, Clone)]
pub enum SiteEvent {
    /// Remote lookup found the site
    Found,

    /// Remote lookup did not find the site
    Create,

    /// Site is available, start configuring it
    Configure,

    /// Certificate issuance requested
    RequestCertificate,

    /// Configuration applied, deploy
    Deploy,

    /// Deployment finished
    Succeed,

    /// A step failed
    Fail(String),
}

/// Site pipeline FSM
#[derive(Debug, Clone)]
pub struct SiteFsm {
    state: SiteState,
    error: Option<String>,
}

impl SiteFsm {
    /// Create a new FSM in unresolved state
    pub fn new() -> Self {
        Self {
            state: SiteState::Unresolved,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> SiteState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: SiteEvent) -> Result<SiteState, String> {
        let new_state = match (&self.state, &event) {
            (SiteState::Unresolved, SiteEvent::Found) => SiteState::Found,
            (SiteState::Unresolved, SiteEvent::Create) => SiteState::Creating,

            (SiteState::Found | SiteState::Creating, SiteEvent::Configure) => SiteState::Configuring,

            (SiteState::Configuring, SiteEvent::RequestCertificate) => SiteState::CertificatePending,

            (SiteState::Configuring | SiteState::CertificatePending, SiteEvent::Deploy) => {
                SiteState::Deploying
            }

            (SiteState::Deploying, SiteEvent::Succeed) => SiteState::Succeeded,

            // Any step may fail until the pipeline is over
            (state, SiteEvent::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                SiteState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for SiteFsm {
    fn default() -> Self {
        Self::new()
    }
}
