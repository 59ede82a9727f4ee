//! Connectivity controller.
//!
//! Decides on boot, and after every accepted portal submission, whether the
//! device joins the stored network or serves the configuration portal.
//!
//! # States
//!
//! ```text
//!            forced flag / no ssid
//!   Boot ─────────────────────────────▶ Portal ◀──────────┐
//!     │ ssid on record                    │ submission    │ timeout
//!     ▼                                   ▼               │
//!   Connecting ◀──────────────────── (pending connect) ───┤
//!     │ joined                                            │
//!     ▼                                                   │
//!   Connected                          Connecting ────────┘
//! ```
//!
//! Everything runs on the caller's thread. [`Controller::tick`] is the body
//! of the device main loop; the only blocking step in it is a connect
//! attempt, bounded by the connection timeout.

use std::net::Ipv4Addr;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{ManagerConfig, NotFoundPolicy};
use crate::error::{ControllerError, StorageError, SubmissionError};
use crate::platform::{Clock, DnsResponder, LinkStatus, Radio, RadioMode, WebPortal};
use crate::portal::{parse_submission, PortalRequest, PortalResponse, PortalView, MISSING_PARAMETERS};
use crate::record::{ApplyOutcome, ConfigRecord, ConfigUpdate};
use crate::schema::{self, FIELDS};
use crate::store::{FieldStore, StorageMedium};

/// Connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// Before [`Controller::begin`] has run.
    Boot,
    /// Access point, captive DNS and web portal are up.
    Portal,
    /// A blocking connect attempt is in progress.
    Connecting,
    /// Joined to the stored network.
    Connected,
}

type Hook = Box<dyn FnMut()>;

/// The device's configuration manager.
pub struct Controller<M, R, D, W, C> {
    config: ManagerConfig,
    store: FieldStore<M>,
    record: ConfigRecord,
    radio: R,
    dns: D,
    web: W,
    clock: C,
    state: ConnectivityState,
    connection_timeout: Duration,
    pending_connect: bool,
    access_point_up: bool,
    on_connected: Option<Hook>,
    on_portal_entered: Option<Hook>,
}

impl<M, R, D, W, C> Controller<M, R, D, W, C>
where
    M: StorageMedium,
    R: Radio,
    D: DnsResponder,
    W: WebPortal,
    C: Clock,
{
    /// Validate the field layout, open the store and load the record.
    pub fn new(
        config: ManagerConfig,
        medium: M,
        radio: R,
        dns: D,
        web: W,
        clock: C,
    ) -> Result<Self, ControllerError> {
        schema::validate(&FIELDS, config.region_size)?;
        let store = FieldStore::open(medium, config.region_size, config.commit_interval())?;
        let record = ConfigRecord::load(&store);
        info!(
            "Configuration loaded (network: {})",
            if record.has_credentials() {
                record.ssid.as_str()
            } else {
                "<none>"
            }
        );

        Ok(Self {
            connection_timeout: config.connection_timeout(),
            config,
            store,
            record,
            radio,
            dns,
            web,
            clock,
            state: ConnectivityState::Boot,
            pending_connect: false,
            access_point_up: false,
            on_connected: None,
            on_portal_entered: None,
        })
    }

    /// Called synchronously each time the device joins the network.
    pub fn on_connected(&mut self, hook: impl FnMut() + 'static) {
        self.on_connected = Some(Box::new(hook));
    }

    /// Called synchronously each time the portal is (re)entered.
    pub fn on_portal_entered(&mut self, hook: impl FnMut() + 'static) {
        self.on_portal_entered = Some(Box::new(hook));
    }

    pub fn set_connection_timeout(&mut self, timeout: Duration) {
        self.connection_timeout = timeout;
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Leave `Boot`: honor the forced-portal flag, otherwise try the stored
    /// network and fall back to the portal.
    pub fn begin(&mut self) {
        if self.store.read_byte(&schema::FORCED_PORTAL) == 1 {
            info!("Forced into configuration portal");
            self.clear_forced_portal();
            self.enter_portal();
            return;
        }

        if !self.record.has_credentials() {
            info!("No saved network credentials");
            self.enter_portal();
            return;
        }

        self.attempt_connection();
    }

    /// One iteration of the cooperative main loop.
    pub fn tick(&mut self) {
        if self.state == ConnectivityState::Portal {
            self.dns.process_next();
        }

        let not_found = self.config.not_found;
        let record = &mut self.record;
        let store = &mut self.store;
        let pending_connect = &mut self.pending_connect;
        self.web.handle_client(&mut |request| {
            handle_portal_request(request, record, store, pending_connect, not_found)
        });
        self.store.stamp(self.clock.now());

        if self.pending_connect {
            self.pending_connect = false;
            if self.record.has_credentials() {
                self.attempt_connection();
            } else {
                warn!("Submitted network name is empty, staying in portal");
                self.enter_portal();
            }
        }

        if let Err(e) = self.store.tick(self.clock.now()) {
            warn!("Deferred commit failed: {}", e);
        }
    }

    /// Answer a portal request directly, outside of [`Controller::tick`].
    pub fn handle_request(&mut self, request: PortalRequest) -> PortalResponse {
        let response = handle_portal_request(
            request,
            &mut self.record,
            &mut self.store,
            &mut self.pending_connect,
            self.config.not_found,
        );
        self.store.stamp(self.clock.now());
        response
    }

    /// Store new credentials, commit them and connect on the next tick.
    ///
    /// Returns `Ok(false)` without touching anything if `ssid` is empty.
    pub fn set_wifi_credentials(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> Result<bool, ControllerError> {
        if ssid.is_empty() {
            return Ok(false);
        }
        self.record
            .apply_and_persist(&ConfigUpdate::credentials(ssid, password), &mut self.store)?;
        self.store.commit_now()?;
        self.pending_connect = true;
        Ok(true)
    }

    /// Forget the stored network and commit.
    pub fn clear_wifi_credentials(&mut self) -> Result<(), ControllerError> {
        self.record
            .apply_and_persist(&ConfigUpdate::cleared_credentials(), &mut self.store)?;
        self.store.commit_now()?;
        info!("Saved network credentials cleared");
        Ok(())
    }

    /// Apply a programmatic change with the same commit policy as a portal
    /// submission. Does not trigger a reconnect.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Result<ApplyOutcome, ControllerError> {
        let outcome = persist(&mut self.record, &mut self.store, update)?;
        self.store.stamp(self.clock.now());
        Ok(outcome)
    }

    /// Set the forced-portal flag and commit it.
    ///
    /// Returns `true` when the flag was newly set; the caller then restarts
    /// the device so the next boot enters the portal. An already-set flag is
    /// left untouched.
    pub fn request_forced_portal(&mut self) -> Result<bool, StorageError> {
        if self.store.read_byte(&schema::FORCED_PORTAL) == 1 {
            return Ok(false);
        }
        info!("Resetting to configuration portal on next boot");
        self.store.write_byte(&schema::FORCED_PORTAL, 1)?;
        self.store.commit_now()?;
        self.record.forced_portal = true;
        Ok(true)
    }

    /// Flush staged writes now, e.g. before an intentional restart.
    pub fn commit_now(&mut self) -> Result<bool, StorageError> {
        self.store.commit_now()
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.radio.status() == LinkStatus::Joined
    }

    /// Client address when connected, access point address otherwise.
    pub fn ip_address(&self) -> Option<Ipv4Addr> {
        if self.state == ConnectivityState::Connected {
            self.radio.local_address()
        } else {
            self.radio.access_point_address()
        }
    }

    /// Whether a submission is waiting for the next tick to connect.
    pub fn connect_pending(&self) -> bool {
        self.pending_connect
    }

    pub fn record(&self) -> &ConfigRecord {
        &self.record
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn store(&self) -> &FieldStore<M> {
        &self.store
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn dns(&self) -> &D {
        &self.dns
    }

    pub fn web(&self) -> &W {
        &self.web
    }

    pub fn web_mut(&mut self) -> &mut W {
        &mut self.web
    }

    /// Tear down into the storage medium, as a power cycle would.
    pub fn into_medium(self) -> M {
        self.store.into_medium()
    }

    fn clear_forced_portal(&mut self) {
        self.record.forced_portal = false;
        if let Err(e) = self.store.write_byte(&schema::FORCED_PORTAL, 0) {
            error!("Failed to clear forced-portal flag: {}", e);
            return;
        }
        if let Err(e) = self.store.commit_now() {
            error!("Failed to commit cleared forced-portal flag: {}", e);
        }
    }

    fn attempt_connection(&mut self) {
        if self.connect() {
            if self.access_point_up {
                self.dns.stop();
                if let Err(e) = self.radio.stop_access_point() {
                    warn!("Failed to stop access point: {}", e);
                }
                self.access_point_up = false;
                info!("Access point disabled after successful connection");
            }
            self.state = ConnectivityState::Connected;
            match self.radio.local_address() {
                Some(ip) => info!("Connected to '{}', address {}", self.record.ssid, ip),
                None => info!("Connected to '{}'", self.record.ssid),
            }
            if let Some(hook) = self.on_connected.as_mut() {
                hook();
            }
        } else {
            warn!(
                "Could not join '{}' within {:?}, opening configuration portal",
                self.record.ssid, self.connection_timeout
            );
            self.enter_portal();
        }
    }

    /// Start a join and poll the link until it is up or the timeout passes.
    fn connect(&mut self) -> bool {
        self.state = ConnectivityState::Connecting;
        info!("Connecting to '{}'", self.record.ssid);

        if let Err(e) = self.radio.set_mode(RadioMode::Client) {
            warn!("Failed to switch radio to client mode: {}", e);
            return false;
        }
        if let Err(e) = self.radio.join(&self.record.ssid, &self.record.password) {
            warn!("Failed to start join: {}", e);
            return false;
        }

        let poll_interval = self.config.poll_interval();
        let deadline = self.clock.now().saturating_add(self.connection_timeout);
        while self.radio.status() != LinkStatus::Joined && self.clock.now() < deadline {
            self.clock.sleep(poll_interval);
            debug!("Waiting for link...");
        }

        self.radio.status() == LinkStatus::Joined
    }

    fn enter_portal(&mut self) {
        self.state = ConnectivityState::Portal;
        info!("Setting up configuration portal '{}'", self.config.ap_ssid);

        if let Err(e) = self.radio.set_mode(RadioMode::AccessPoint) {
            error!("Failed to switch radio to access point mode: {}", e);
        }
        match self
            .radio
            .start_access_point(&self.config.ap_ssid, &self.config.ap_password)
        {
            Ok(address) => {
                self.access_point_up = true;
                info!("Access point address: {}", address);
                match self.dns.start(address, &self.config.dns) {
                    Ok(()) => debug!("Captive DNS started for {}", self.config.ap_domain),
                    Err(e) => warn!("Captive DNS unavailable: {}", e),
                }
            }
            Err(e) => error!("Failed to start access point: {}", e),
        }

        if self.web.is_serving() {
            debug!("Web portal already serving");
        } else if let Err(e) = self.web.begin() {
            error!("Failed to start web portal: {}", e);
        } else {
            info!("Web portal started");
        }

        if let Some(hook) = self.on_portal_entered.as_mut() {
            hook();
        }
    }
}

/// Stage `update`, committing at once if the credentials changed.
fn persist<M: StorageMedium>(
    record: &mut ConfigRecord,
    store: &mut FieldStore<M>,
    update: &ConfigUpdate,
) -> Result<ApplyOutcome, StorageError> {
    let outcome = record.apply_and_persist(update, store)?;
    if outcome.credentials_changed {
        if let Err(e) = store.commit_now() {
            warn!("Immediate commit of new credentials failed, deferring: {}", e);
        }
    }
    Ok(outcome)
}

fn handle_portal_request<M: StorageMedium>(
    request: PortalRequest,
    record: &mut ConfigRecord,
    store: &mut FieldStore<M>,
    pending_connect: &mut bool,
    not_found: NotFoundPolicy,
) -> PortalResponse {
    match request {
        PortalRequest::Root => PortalResponse::Form(PortalView::from(&*record)),
        PortalRequest::Save(form) => {
            let update = match parse_submission(&form) {
                Ok(update) => update,
                Err(SubmissionError::MissingField(name)) => {
                    warn!("Rejected submission without '{}'", name);
                    return PortalResponse::text(400, MISSING_PARAMETERS);
                }
            };
            match persist(record, store, &update) {
                Ok(outcome) => {
                    info!(
                        "Configuration saved for network '{}' (changed: {})",
                        record.ssid, outcome.changed
                    );
                    *pending_connect = true;
                    PortalResponse::Saved
                }
                Err(e) => {
                    error!("Failed to store submission: {}", e);
                    PortalResponse::text(500, "Failed to save configuration")
                }
            }
        }
        PortalRequest::Other { path } => {
            debug!("No portal route for {}", path);
            PortalResponse::not_found(not_found)
        }
    }
}
