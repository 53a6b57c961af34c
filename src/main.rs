//! CORE Test Firmware — Main Entry Point
//!
//! Hexagonal architecture around one cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   LogDisplay      │
//! │  (Sensor+Actuator) (EventSink)    (Config+Set) (DisplayPort)   │
//! │  WifiAdapter       CloudAdapter   HTTP server ──▶ WebApi       │
//! │  (Connectivity)    (CloudPort)    (server task)                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Regulator · Countdown · Arbiter                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  COMMAND_QUEUE: front panel + web → control loop (one consumer)│
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::IOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::EspWifi;
use log::{error, info};

use coretest::adapters::cloud::{CloudAdapter, REQUEST_TIMEOUT};
use coretest::adapters::display::LogDisplay;
use coretest::adapters::hardware::HardwareAdapter;
use coretest::adapters::log_sink::LogEventSink;
use coretest::adapters::nvs::NvsAdapter;
use coretest::adapters::time::Esp32TimeAdapter;
use coretest::adapters::wifi::{AssociationPolicy, WifiAdapter};
use coretest::adapters::{device_id, http_server};
use coretest::app::arbiter::{COMMAND_QUEUE, DEFAULT_REPLY_TIMEOUT, RemoteClient};
use coretest::app::commands::{AppCommand, ControlSurface, Request};
use coretest::app::display::DisplayFrame;
use coretest::app::network::NetworkSupervisor;
use coretest::app::ports::DisplayPort;
use coretest::app::service::AppService;
use coretest::error::{CommsError, Error};
use coretest::drivers::dac::InjectorDac;
use coretest::drivers::indicators::Indicators;
use coretest::drivers::input::{FrontPanel, GpioInput, ModeSwitch};
use coretest::drivers::uart_link::UartLink;
use coretest::pins;
use coretest::sensors::power_meter::PowerMeter;
use coretest::timing::Interval;
use coretest::web::WebApi;

/// Control loop period. Every gate inside the loop is time-based, so this
/// only bounds input latency.
const LOOP_PERIOD_MS: u32 = 5;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  CORE Test v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. GPIO, DAC ──────────────────────────────────────────
    coretest::drivers::hw_init::init_peripherals().map_err(|e| {
        error!("HAL init failed: {}", e);
        Error::from(e)
    })?;

    // ── 3. Config and settings from NVS (or defaults) ─────────
    let mut store = NvsAdapter::new().map_err(|e| {
        error!("NVS init failed: {}", e);
        Error::from(e)
    })?;
    let config = AppService::load_config(&store);

    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    info!("Device ID: {}", dev_id);

    // ── 4. Meter link and outputs ─────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let link = UartLink::new(
        peripherals.uart2,
        peripherals.pins.gpio17.downgrade(),
        peripherals.pins.gpio16.downgrade(),
        config.meter_timeout_ms,
    )
    .map_err(|e| {
        error!("meter UART init failed: {}", e);
        Error::from(e)
    })?;
    let mut hw = HardwareAdapter::new(
        PowerMeter::from_config(link, &config),
        InjectorDac::new(),
        Indicators::new(),
    );

    // ── 5. Front panel ────────────────────────────────────────
    let mut panel = FrontPanel::new(
        GpioInput(pins::MENU_BUTTON_GPIO),
        GpioInput(pins::ENCODER_CLK_GPIO),
        GpioInput(pins::ENCODER_DT_GPIO),
        GpioInput(pins::ENCODER_SW_GPIO),
        config.debounce_ms,
    );
    let mut mode_switch = ModeSwitch::new(GpioInput(pins::WEB_MODE_SWITCH_GPIO), config.debounce_ms);

    // ── 6. WiFi: soft AP always, station when configured ──────
    let clock = Esp32TimeAdapter::new();
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop, None)?;
    let mut wifi = WifiAdapter::new(esp_wifi, AssociationPolicy::from_config(&config))
        .map_err(|e| {
            error!("WiFi init failed: {}", e);
            Error::from(e)
        })?;
    let mut supervisor = NetworkSupervisor::load(&store);
    supervisor.begin(clock.uptime_ms(), &mut wifi);

    // ── 7. Web API ────────────────────────────────────────────
    let api = WebApi::new(
        RemoteClient::new(&COMMAND_QUEUE, DEFAULT_REPLY_TIMEOUT),
        CloudAdapter::new(REQUEST_TIMEOUT),
        &dev_id,
    );
    let _server = http_server::start(api).map_err(|e| {
        error!("HTTP server failed to start: {}", e);
        Error::Comms(CommsError::HttpServerFailed)
    })?;

    // ── 8. App service ────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut display = LogDisplay::new();
    let mut display_interval = Interval::new(config.display_refresh_ms);

    let mut app = AppService::new(config);
    app.set_surface(mode_switch.surface(), &mut sink);
    app.start(clock.uptime_ms(), &mut hw, &mut sink);

    info!("System ready. Entering control loop.");

    // ── 9. Control loop ───────────────────────────────────────
    loop {
        let now = clock.uptime_ms();

        // Panel switch first so this pass already uses the new surface.
        if let Some(surface) = mode_switch.poll(now) {
            app.set_surface(surface, &mut sink);
        }

        // Sampled every pass to keep debounce state current; only queued
        // while the panel is in control.
        let events = panel.poll(now);
        if app.surface() == ControlSurface::Local {
            for event in events {
                COMMAND_QUEUE.submit_local(AppCommand::from(event).into());
            }
        }

        while let Some(envelope) = COMMAND_QUEUE.try_next() {
            let reply = match envelope.request {
                Request::Control(cmd) => {
                    app.handle_command(envelope.source, cmd, now, &mut hw, &mut sink)
                }
                Request::Network(cmd) => app.handle_network(
                    envelope.source,
                    cmd,
                    now,
                    &mut supervisor,
                    &mut wifi,
                    &mut store,
                    &mut sink,
                ),
            };
            COMMAND_QUEUE.respond(envelope.id, reply);
        }

        app.tick(now, &mut hw, &mut sink);

        let link = supervisor.poll(now, &mut wifi);
        app.set_network_status(link, &mut sink);

        if display_interval.due(now) {
            display.render(&DisplayFrame::from_status(&app.status()));
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
