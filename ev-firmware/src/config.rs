//! Persistent configuration, loaded from and saved to NVS as a single
//! JSON blob (the same `serde_json`-over-`EspNvs` pattern the reference
//! firmware uses for its own settings).

use anyhow::{anyhow, Result};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use log::{debug, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const NVS_NAMESPACE: &str = "ev_telemetry";
const NVS_CONFIG_KEY: &str = "config";

static NVS: Mutex<Option<EspNvs<NvsDefault>>> = Mutex::new(None);

pub fn init_nvs(nvs_partition: EspNvsPartition<NvsDefault>) -> Result<()> {
    debug!("initializing NVS namespace: {NVS_NAMESPACE}");
    let nvs = EspNvs::new(nvs_partition, NVS_NAMESPACE, true)?;
    *NVS.lock().unwrap() = Some(nvs);
    info!("NVS initialized");
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

/// Which `Transport` back-end to bring up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TransportSelection {
    /// On-chip TWAI controller.
    OnChipCan,
    /// ELM327-compatible adapter reached over TCP.
    ElmStreamTcp,
}

impl Default for TransportSelection {
    fn default() -> Self {
        Self::OnChipCan
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElmTcpConfig {
    pub address: String,
}

impl Default for ElmTcpConfig {
    fn default() -> Self {
        Self {
            address: "192.168.0.10:35000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Compiled-in decoder name: `leaf`, `meb-rwd`, or `meb-awd`.
    #[serde(default = "default_vehicle_name")]
    pub vehicle_name: String,
    #[serde(default)]
    pub transport: TransportSelection,
    #[serde(default)]
    pub elm_tcp: ElmTcpConfig,
    /// Average each published sample with the previous one.
    #[serde(default)]
    pub fast_average: bool,
    #[serde(default)]
    pub log_level: LogLevel,
    /// Observer loop cadence.
    #[serde(default = "default_observer_interval_ms")]
    pub observer_interval_ms: u64,
}

fn default_vehicle_name() -> String {
    "leaf".to_string()
}

const fn default_observer_interval_ms() -> u64 {
    200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vehicle_name: default_vehicle_name(),
            transport: TransportSelection::default(),
            elm_tcp: ElmTcpConfig::default(),
            fast_average: false,
            log_level: LogLevel::default(),
            observer_interval_ms: default_observer_interval_ms(),
        }
    }
}

impl Config {
    /// Clamp values to valid ranges and fix invalid values.
    pub fn validate(&mut self) {
        if self.vehicle_name.is_empty() {
            warn!("vehicle name is empty, resetting to default");
            self.vehicle_name = default_vehicle_name();
        }
        if self.elm_tcp.address.is_empty() {
            warn!("ELM327 TCP address is empty, resetting to default");
            self.elm_tcp = ElmTcpConfig::default();
        }
        if self.observer_interval_ms == 0 {
            warn!("observer interval cannot be zero, resetting to default");
            self.observer_interval_ms = default_observer_interval_ms();
        }
    }

    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(mut config) => {
                info!("loaded config from NVS");
                config.validate();
                config
            }
            Err(e) => {
                warn!("failed to load config from NVS: {e}, using defaults");
                Self::default()
            }
        }
    }

    pub fn load() -> Result<Self> {
        debug!("loading config from NVS");
        let nvs_guard = NVS.lock().unwrap();
        let nvs = nvs_guard.as_ref().ok_or_else(|| anyhow!("NVS not initialized"))?;

        let len = nvs.blob_len(NVS_CONFIG_KEY)?;
        if let Some(len) = len {
            debug!("config blob size: {len} bytes");
            let mut buf = vec![0u8; len];
            nvs.get_blob(NVS_CONFIG_KEY, &mut buf)?;
            let config: Config = serde_json::from_slice(&buf)?;
            Ok(config)
        } else {
            Err(anyhow!("no config found in NVS"))
        }
    }

    pub fn save(&self) -> Result<()> {
        debug!("saving config to NVS");
        let mut nvs_guard = NVS.lock().unwrap();
        let nvs = nvs_guard.as_mut().ok_or_else(|| anyhow!("NVS not initialized"))?;

        let json = serde_json::to_vec(self)?;
        nvs.set_blob(NVS_CONFIG_KEY, &json)?;
        info!("config saved to NVS");
        Ok(())
    }
}
