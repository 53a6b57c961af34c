//! Integration tests for the AppService → FSM → actuators pipeline.
//!
//! These run on the host and drive the service through [`Bench`], which
//! executes commands and ticks exactly as the firmware's control loop does.

use coretest::app::commands::{
    AppCommand, AutoInjectionAction, ControlSurface, NetworkCommand, Outcome,
};
use coretest::app::events::AppEvent;
use coretest::app::ports::{ConfigPort, SettingsPort};
use coretest::app::service::AppService;
use coretest::config::{NetworkSettings, SystemConfig, DEFAULT_CLOUD_URL};
use coretest::error::CommandError;
use coretest::fsm::{MenuSelection, StateId};

use crate::mock_hw::{lockstep_config, Bench};

const REMOTE: ControlSurface = ControlSurface::Remote;
const LOCAL: ControlSurface = ControlSurface::Local;

fn inject() -> AppCommand {
    AppCommand::AutoInjection(AutoInjectionAction::Inject)
}

fn record() -> AppCommand {
    AppCommand::AutoInjection(AutoInjectionAction::Record)
}

/// Remote bench with a 400 mA full-scale load, ramped until locked.
fn locked_bench() -> Bench {
    let mut b = Bench::with_config(lockstep_config());
    b.app.set_surface(REMOTE, &mut b.sink);
    b.hw.attach_load(400.0);
    b.execute(REMOTE, inject().into()).unwrap();
    assert!(
        b.run_while(60_000, 100, |app| app.state() == StateId::Holding),
        "regulator never locked, amplitude {:.3}",
        b.app.amplitude().value()
    );
    b
}

// ── Auto-injection end to end ─────────────────────────────────

#[test]
fn inject_ramps_to_target_then_records_until_expiry() {
    let mut b = locked_bench();

    let current = b.app.measurement().current_ma();
    assert!((current - 200.0).abs() <= 5.0, "locked at {current} mA");
    assert!(b.app.target_reached());
    assert_eq!(
        b.sink.count(|e| matches!(e, AppEvent::TargetReached { .. })),
        1
    );
    // Ramp is monotonic from zero for a resistive load.
    assert!(b.hw.dac.windows(2).all(|w| w[0] <= w[1]));

    let ack = b.execute(REMOTE, record().into()).unwrap();
    assert_eq!(ack.outcome, Outcome::RecordingStarted { duration_secs: 120 });
    let started = b.now_ms;
    assert_eq!(b.app.state(), StateId::Recording);

    b.run_until(started + 119_900, 100);
    assert_eq!(b.app.state(), StateId::Recording);
    let remaining = b.app.status().countdown.unwrap().remaining_ms;
    assert_eq!(remaining, 100);

    b.run_until(started + 120_000, 100);
    assert_eq!(b.app.state(), StateId::Stopped);
    assert!(b.app.amplitude().is_zero());
    assert_eq!(b.hw.last_dac(), Some(0));
    assert!(!b.hw.relay_energized());
    assert!(b.app.status().countdown.is_none());
    assert!(!b.app.target_reached());

    b.run_until(started + 130_000, 100);
    assert_eq!(
        b.sink.count(|e| matches!(e, AppEvent::CountdownExpired { from: StateId::Recording })),
        1
    );
}

#[test]
fn record_rejected_before_lock() {
    let mut b = Bench::remote();
    assert_eq!(
        b.execute(REMOTE, record().into()),
        Err(CommandError::CannotRecord)
    );
    b.execute(REMOTE, inject().into()).unwrap();
    assert_eq!(
        b.execute(REMOTE, record().into()),
        Err(CommandError::CannotRecord)
    );
    assert_eq!(
        b.execute(REMOTE, inject().into()),
        Err(CommandError::AlreadyInjecting)
    );
    assert_eq!(b.app.state(), StateId::Ramping);
}

#[test]
fn manual_amplitude_locked_out_while_injecting() {
    let mut b = Bench::remote();
    b.execute(REMOTE, inject().into()).unwrap();
    for cmd in [
        AppCommand::SetAmplitudePercent(40.0),
        AppCommand::ZeroAmplitude,
        AppCommand::AdjustAmplitude(2),
    ] {
        assert_eq!(
            b.execute(REMOTE, cmd.into()),
            Err(CommandError::InjectionInProgress)
        );
    }
}

// ── Stop ──────────────────────────────────────────────────────

#[test]
fn stop_resets_every_injection_state() {
    for (label, setup) in [
        ("ramping", 0usize),
        ("holding", 1),
        ("recording", 2),
    ] {
        let mut b = locked_bench();
        match setup {
            0 => {
                b.execute(REMOTE, AppCommand::Stop.into()).unwrap();
                b.execute(REMOTE, inject().into()).unwrap();
                b.tick_at(b.now_ms + 100);
                assert_eq!(b.app.state(), StateId::Ramping, "{label}");
            }
            1 => assert_eq!(b.app.state(), StateId::Holding),
            _ => {
                b.execute(REMOTE, record().into()).unwrap();
            }
        }

        let ack = b.execute(REMOTE, AppCommand::Stop.into()).unwrap();
        assert_eq!(ack.outcome, Outcome::Stopped, "{label}");
        assert_eq!(ack.status.state, StateId::Stopped, "{label}");
        assert!(ack.status.amplitude.is_zero(), "{label}");
        assert!(ack.status.countdown.is_none(), "{label}");
        assert!(!ack.status.target_reached, "{label}");
        assert_eq!(b.hw.last_dac(), Some(0), "{label}");

        // Nothing left to expire.
        b.run_until(b.now_ms + 200_000, 1_000);
        assert_eq!(
            b.sink.count(|e| matches!(e, AppEvent::CountdownExpired { .. })),
            0,
            "{label}"
        );
    }
}

#[test]
fn auto_injection_stop_action_matches_stop() {
    let mut b = Bench::remote();
    b.execute(REMOTE, inject().into()).unwrap();
    let ack = b
        .execute(
            REMOTE,
            AppCommand::AutoInjection(AutoInjectionAction::Stop).into(),
        )
        .unwrap();
    assert_eq!(ack.outcome, Outcome::Stopped);
    assert_eq!(b.app.state(), StateId::Stopped);
}

// ── Menu and RUNTIME countdown ────────────────────────────────

#[test]
fn runtime_countdown_stops_output_once() {
    let mut b = Bench::new();
    b.hw.set_current_ma(10.0);
    b.execute(LOCAL, AppCommand::CycleMenu.into()).unwrap(); // RUN
    b.execute(LOCAL, AppCommand::AdjustAmplitude(25).into()).unwrap();
    b.execute(LOCAL, AppCommand::CycleMenu.into()).unwrap(); // RUNTIME
    assert_eq!(b.app.state(), StateId::TimedRun);
    assert!(b.hw.relay_energized());
    assert!((b.app.amplitude().value() - 0.25).abs() < 1e-4);

    b.run_until(119_000, 500);
    assert_eq!(b.app.state(), StateId::TimedRun);
    b.run_until(120_000, 500);
    assert_eq!(b.app.state(), StateId::Stopped);
    assert!(b.app.amplitude().is_zero());
    b.run_until(300_000, 500);
    assert_eq!(
        b.sink.count(|e| matches!(e, AppEvent::CountdownExpired { from: StateId::TimedRun })),
        1
    );
}

#[test]
fn reselecting_runtime_restarts_countdown() {
    let mut b = Bench::new();
    let runtime = AppCommand::SelectMenu(MenuSelection::Runtime);
    b.execute(LOCAL, runtime.clone().into()).unwrap();
    b.run_until(100_000, 1_000);
    b.execute(LOCAL, runtime.into()).unwrap();
    let view = b.app.status().countdown.unwrap();
    assert_eq!(view.remaining_ms, 120_000);
    assert_eq!(view.end_ms, 220_000);

    b.run_until(219_000, 1_000);
    assert_eq!(b.app.state(), StateId::TimedRun);
    b.run_until(220_000, 1_000);
    assert_eq!(b.app.state(), StateId::Stopped);
}

#[test]
fn encoder_push_zeroes_running_output() {
    let mut b = Bench::new();
    b.execute(LOCAL, AppCommand::SelectMenu(MenuSelection::Run).into())
        .unwrap();
    b.execute(LOCAL, AppCommand::AdjustAmplitude(10).into()).unwrap();
    assert_eq!(b.hw.last_dac(), Some(25));
    b.execute(LOCAL, AppCommand::ZeroAmplitude.into()).unwrap();
    assert_eq!(b.hw.last_dac(), Some(0));
    assert_eq!(b.app.state(), StateId::Running);
}

// ── Quick / special inject ────────────────────────────────────

#[test]
fn quick_inject_runs_at_fixed_amplitude() {
    let mut b = locked_bench();
    let ack = b
        .execute(REMOTE, AppCommand::QuickInject { percent: 150.0 }.into())
        .unwrap();
    assert_eq!(ack.outcome, Outcome::QuickApplied { percent: 100.0 });
    assert_eq!(b.app.state(), StateId::Running);
    assert!(!b.app.target_reached());
    assert_eq!(b.hw.last_dac(), Some(255));

    // No regulator in RUN: the amplitude holds whatever the meter says.
    b.run_until(b.now_ms + 5_000, 100);
    assert_eq!(b.hw.last_dac(), Some(255));
    assert!(b.app.status().countdown.is_none());
}

#[test]
fn special_inject_uses_custom_recording_window() {
    let mut b = Bench::with_config(lockstep_config());
    b.app.set_surface(REMOTE, &mut b.sink);
    b.hw.attach_load(400.0);
    let ack = b
        .execute(REMOTE, AppCommand::SpecialInject { window_secs: Some(30) }.into())
        .unwrap();
    assert_eq!(
        ack.outcome,
        Outcome::SpecialArmed {
            window_secs: 30,
            target_ma: 200.0
        }
    );
    assert!(b.run_while(60_000, 100, |app| app.state() == StateId::Holding));

    let ack = b.execute(REMOTE, record().into()).unwrap();
    assert_eq!(ack.outcome, Outcome::RecordingStarted { duration_secs: 30 });
    let started = b.now_ms;
    b.run_until(started + 30_000, 100);
    assert_eq!(b.app.state(), StateId::Stopped);
}

#[test]
fn special_inject_rejects_out_of_range_window() {
    let mut b = Bench::remote();
    for secs in [0, 3601] {
        let r = b.execute(
            REMOTE,
            AppCommand::SpecialInject { window_secs: Some(secs) }.into(),
        );
        assert!(matches!(r, Err(CommandError::InvalidParameter(_))), "{secs}");
    }
    assert_eq!(b.app.state(), StateId::Stopped);
}

// ── Surface exclusivity ───────────────────────────────────────

#[test]
fn only_the_active_surface_is_obeyed() {
    let mut b = Bench::new();
    assert_eq!(
        b.execute(REMOTE, inject().into()),
        Err(CommandError::SurfaceDisabled)
    );
    b.execute(LOCAL, AppCommand::CycleMenu.into()).unwrap();
    assert_eq!(b.app.state(), StateId::Running);

    // Switching hands control over without touching the state.
    b.app.set_surface(REMOTE, &mut b.sink);
    assert_eq!(b.app.state(), StateId::Running);
    assert_eq!(
        b.execute(LOCAL, AppCommand::CycleMenu.into()),
        Err(CommandError::SurfaceDisabled)
    );
    assert!(b.execute(LOCAL, AppCommand::GetStatus.into()).is_ok());
    b.execute(REMOTE, AppCommand::Stop.into()).unwrap();

    assert_eq!(
        b.sink.count(|e| matches!(
            e,
            AppEvent::CommandRejected {
                error: CommandError::SurfaceDisabled,
                ..
            }
        )),
        2
    );
    assert_eq!(
        b.sink.count(|e| matches!(e, AppEvent::SurfaceChanged(ControlSurface::Remote))),
        1
    );
}

// ── Meter ─────────────────────────────────────────────────────

#[test]
fn meter_timeouts_keep_last_reading() {
    let mut b = Bench::new();
    b.hw.set_current_ma(120.0);
    b.run_until(1_000, 100);
    let good = b.app.measurement();
    b.hw.reading = None;
    b.run_until(3_000, 100);
    assert_eq!(b.app.measurement(), good);
    assert!(b.app.stale_reads() >= 3);
    b.hw.set_current_ma(80.0);
    b.run_until(4_000, 100);
    assert_eq!(b.app.stale_reads(), 0);
    assert!((b.app.measurement().current_ma() - 80.0).abs() < 1e-3);
}

// ── Network settings ──────────────────────────────────────────

#[test]
fn network_update_persists_and_connects() {
    let mut b = Bench::remote();
    let settings = NetworkSettings::new("lab-ap", "secret-pass", DEFAULT_CLOUD_URL).unwrap();
    let ack = b
        .execute(REMOTE, NetworkCommand::Update(settings.clone()).into())
        .unwrap();
    assert_eq!(ack.outcome, Outcome::NetworkSaved);
    assert_eq!(b.store.load_settings().unwrap(), settings);
    assert_eq!(b.wifi.sim_connect_calls(), 1);

    b.tick_at(b.now_ms + 100);
    let net = b.app.status().network;
    assert!(net.connected);
    assert_eq!(net.ssid.as_str(), "lab-ap");
    assert!(net.local_ip.is_some());
    assert_eq!(
        b.sink.count(|e| matches!(e, AppEvent::NetworkChanged { connected: true })),
        1
    );
}

#[test]
fn network_update_rejects_bad_settings() {
    let mut b = Bench::remote();
    let empty = NetworkSettings::default();
    assert!(matches!(
        b.execute(REMOTE, NetworkCommand::Update(empty).into()),
        Err(CommandError::InvalidParameter(_))
    ));
    assert_eq!(b.store.load_settings().unwrap(), NetworkSettings::default());
    assert_eq!(b.wifi.sim_connect_calls(), 0);
}

#[test]
fn network_reset_restores_defaults_and_keeps_tuning() {
    let mut b = Bench::remote();
    let tuned = SystemConfig {
        target_current_ma: 150.0,
        ..SystemConfig::default()
    };
    b.store.save(&tuned).unwrap();
    let settings = NetworkSettings::new("lab-ap", "", "http://10.0.0.2/api").unwrap();
    b.execute(REMOTE, NetworkCommand::Update(settings).into()).unwrap();
    b.tick_at(100);

    let ack = b.execute(REMOTE, NetworkCommand::Reset.into()).unwrap();
    assert_eq!(ack.outcome, Outcome::NetworkReset);
    assert!(!ack.status.network.connected);
    assert_eq!(ack.status.network.ssid.as_str(), "");
    assert_eq!(ack.status.network.cloud_url.as_str(), DEFAULT_CLOUD_URL);
    assert_eq!(b.store.load_settings().unwrap(), NetworkSettings::default());
    assert_eq!(b.store.load().unwrap(), tuned);
}

#[test]
fn network_commands_follow_surface() {
    let mut b = Bench::new();
    assert_eq!(
        b.execute(REMOTE, NetworkCommand::Reset.into()),
        Err(CommandError::SurfaceDisabled)
    );
}

// ── Config ────────────────────────────────────────────────────

#[test]
fn stored_tuning_drives_the_regulator_target() {
    let store = coretest::adapters::nvs::NvsAdapter::new().unwrap();
    let cfg = SystemConfig {
        target_current_ma: 250.0,
        ..SystemConfig::default()
    };
    store.save(&cfg).unwrap();

    let mut b = Bench::with_config(AppService::load_config(&store));
    b.app.set_surface(REMOTE, &mut b.sink);
    let ack = b.execute(REMOTE, inject().into()).unwrap();
    assert_eq!(ack.outcome, Outcome::InjectionStarted { target_ma: 250.0 });
}
