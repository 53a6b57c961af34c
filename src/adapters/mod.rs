//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                |
//! |----------------|--------------------|----------------------------|
//! | `cloud`        | CloudPort          | ESP-IDF HTTP client        |
//! | `device_id`    | —                  | eFuse MAC                  |
//! | `display`      | DisplayPort        | Panel rows / serial log    |
//! | `hardware`     | SensorPort         | JSY1050 over UART          |
//! |                | ActuatorPort       | DAC, LEDs, relay           |
//! | `http_server`  | —                  | ESP-IDF HTTP server → web  |
//! | `log_sink`     | EventSink          | Serial log output          |
//! | `nvs`          | ConfigPort         | NVS / in-memory store      |
//! |                | SettingsPort       |                            |
//! | `time`         | —                  | ESP32 system timer         |
//! | `wifi`         | ConnectivityPort   | ESP-IDF WiFi AP + STA      |

pub mod cloud;
pub mod device_id;
pub mod display;
pub mod hardware;
#[cfg(target_os = "espidf")]
pub mod http_server;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
