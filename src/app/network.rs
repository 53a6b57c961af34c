//! Network supervisor: owns the persisted [`NetworkSettings`] and drives
//! the station link through the [`ConnectivityPort`]. It also keeps the
//! broker settings that live in the same store.
//!
//! The soft AP that serves the web UI stays up regardless; this only
//! manages the optional upstream station connection used by the cloud
//! relay.

use log::{info, warn};

use crate::config::{BrokerSettings, NetworkSettings};
use crate::error::CommandError;

use super::commands::{NetworkCommand, Outcome};
use super::ports::{ConfigError, ConnectivityPort, SettingsPort};
use super::status::NetworkStatus;

pub struct NetworkSupervisor {
    settings: NetworkSettings,
    broker: BrokerSettings,
}

impl NetworkSupervisor {
    pub fn new(settings: NetworkSettings) -> Self {
        Self {
            settings,
            broker: BrokerSettings::default(),
        }
    }

    /// Load persisted settings, falling back to defaults on any error.
    pub fn load(store: &impl SettingsPort) -> Self {
        let settings = store.load_settings().unwrap_or_else(|e| {
            warn!("Network settings unavailable ({}), using defaults", e);
            NetworkSettings::default()
        });
        let broker = store.load_broker().unwrap_or_else(|e| {
            warn!("Broker settings unavailable ({}), using defaults", e);
            BrokerSettings::default()
        });
        info!("Network: broker {}:{} topic '{}'", broker.host, broker.port, broker.topic);
        Self { settings, broker }
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    pub fn broker(&self) -> &BrokerSettings {
        &self.broker
    }

    /// Hand the stored credentials to the station and start association.
    pub fn begin(&mut self, now_ms: u64, wifi: &mut impl ConnectivityPort) {
        if !self.settings.has_station() {
            info!("Network: no station configured, AP only");
            return;
        }
        if let Err(e) = wifi.set_credentials(&self.settings.ssid, &self.settings.password) {
            warn!("Network: stored credentials rejected: {}", e);
            return;
        }
        if let Err(e) = wifi.connect(now_ms) {
            warn!("Network: association not started: {}", e);
        }
    }

    pub fn handle(
        &mut self,
        cmd: NetworkCommand,
        now_ms: u64,
        wifi: &mut impl ConnectivityPort,
        store: &mut impl SettingsPort,
    ) -> Result<Outcome, CommandError> {
        match cmd {
            NetworkCommand::Update(settings) => {
                if !settings.has_station() {
                    return Err(CommandError::InvalidParameter("SSID is required"));
                }
                settings.validate().map_err(config_to_command)?;
                // Staged only: the running link keeps its old configuration
                // until the reconnect below.
                wifi.set_credentials(&settings.ssid, &settings.password)
                    .map_err(|_| CommandError::InvalidParameter("WiFi credentials rejected"))?;
                if let Err(e) = store.save_settings(&settings) {
                    warn!("Network: save failed: {}", e);
                    self.restage(wifi);
                    return Err(CommandError::StorageFailed);
                }
                self.settings = settings;
                info!("Network: settings saved (SSID='{}')", self.settings.ssid);

                wifi.disconnect();
                if let Err(e) = wifi.connect(now_ms) {
                    warn!("Network: association not started: {}", e);
                }
                Ok(Outcome::NetworkSaved)
            }
            NetworkCommand::SetBroker(broker) => {
                broker.validate().map_err(config_to_command)?;
                store.save_broker(&broker).map_err(|e| {
                    warn!("Network: broker save failed: {}", e);
                    config_to_command(e)
                })?;
                info!(
                    "Network: broker set to {}:{} (client '{}', topic '{}')",
                    broker.host, broker.port, broker.client_id, broker.topic
                );
                self.broker = broker;
                Ok(Outcome::BrokerSaved)
            }
            NetworkCommand::Reset => {
                store.factory_reset().map_err(|e| {
                    warn!("Network: factory reset failed: {}", e);
                    CommandError::StorageFailed
                })?;
                self.settings = NetworkSettings::default();
                self.broker = BrokerSettings::default();
                wifi.clear_credentials();
                info!("Network: settings reset to defaults");
                Ok(Outcome::NetworkReset)
            }
        }
    }

    /// Put the persisted credentials back on the station after a staged
    /// update was abandoned.
    fn restage(&self, wifi: &mut impl ConnectivityPort) {
        if !self.settings.has_station() {
            wifi.clear_credentials();
        } else if let Err(e) = wifi.set_credentials(&self.settings.ssid, &self.settings.password) {
            warn!("Network: previous credentials not restored: {}", e);
        }
    }

    /// Advance association and report the link.
    pub fn poll(&mut self, now_ms: u64, wifi: &mut impl ConnectivityPort) -> NetworkStatus {
        wifi.poll(now_ms);
        self.status(wifi)
    }

    pub fn status(&self, wifi: &impl ConnectivityPort) -> NetworkStatus {
        let mut ssid = heapless::String::new();
        let _ = ssid.push_str(wifi.ssid());
        NetworkStatus {
            connected: wifi.is_connected(),
            ssid,
            rssi: wifi.rssi(),
            local_ip: wifi.local_ip(),
            cloud_url: self.settings.cloud_url.clone(),
        }
    }
}

fn config_to_command(e: ConfigError) -> CommandError {
    match e {
        ConfigError::ValidationFailed(msg) => CommandError::InvalidParameter(msg),
        _ => CommandError::StorageFailed,
    }
}
