//! Command queue between the web server thread and the control loop.
//!
//! Each test owns a static [`CommandQueue`]; the "server" side runs on a
//! spawned thread through [`RemoteClient`] while the test thread plays the
//! control loop with a [`Bench`].

use std::thread;
use std::time::Duration;

use coretest::app::arbiter::{CommandQueue, RemoteClient};
use coretest::app::commands::{AppCommand, ControlSurface, Outcome, Reply};
use coretest::app::ports::{BridgeError, CommandPort};
use coretest::drivers::input::PanelEvent;
use coretest::error::CommandError;
use coretest::fsm::StateId;

use crate::mock_hw::Bench;

const WAIT: Duration = Duration::from_secs(2);

/// Issue `cmd` from a server thread and service the queue until it is
/// answered.
fn serve_one(queue: &'static CommandQueue, bench: &mut Bench, cmd: AppCommand) -> Reply {
    let client = thread::spawn(move || RemoteClient::new(queue, WAIT).request(cmd.into()));
    while !client.is_finished() {
        bench.drain(queue);
        thread::sleep(Duration::from_millis(1));
    }
    client
        .join()
        .expect("client thread")
        .expect("control loop answered")
}

#[test]
fn remote_request_gets_its_reply() {
    static QUEUE: CommandQueue = CommandQueue::new();
    let mut bench = Bench::remote();

    let ack = serve_one(&QUEUE, &mut bench, AppCommand::SetAmplitudePercent(30.0)).unwrap();
    assert_eq!(ack.outcome, Outcome::Applied);
    assert!((ack.status.amplitude.percent() - 30.0).abs() < 1e-3);
    assert_eq!(bench.hw.last_dac(), Some(76));
}

#[test]
fn rejection_travels_back_to_the_caller() {
    static QUEUE: CommandQueue = CommandQueue::new();
    let mut bench = Bench::new();

    let reply = serve_one(&QUEUE, &mut bench, AppCommand::Stop);
    assert_eq!(reply, Err(CommandError::SurfaceDisabled));

    // Status is readable from the disabled surface.
    let ack = serve_one(&QUEUE, &mut bench, AppCommand::GetStatus).unwrap();
    assert_eq!(ack.outcome, Outcome::Snapshot);
    assert_eq!(ack.status.surface, ControlSurface::Local);
}

#[test]
fn panel_events_apply_in_arrival_order() {
    static QUEUE: CommandQueue = CommandQueue::new();
    let mut bench = Bench::new();

    for event in [
        PanelEvent::MenuPressed,
        PanelEvent::EncoderStep(5),
        PanelEvent::EncoderStep(-2),
        PanelEvent::MenuPressed,
    ] {
        assert!(QUEUE.submit_local(AppCommand::from(event).into()));
    }
    bench.pass(&QUEUE, 10);

    assert_eq!(bench.app.state(), StateId::TimedRun);
    assert!((bench.app.amplitude().value() - 0.03).abs() < 1e-4);
    assert!(QUEUE.try_next().is_none());
}

#[test]
fn local_and_remote_share_one_fifo() {
    static QUEUE: CommandQueue = CommandQueue::new();
    let mut bench = Bench::new();

    // A panel press queued ahead of the web request is applied first, and
    // the web request is still refused because the panel is in control.
    assert!(QUEUE.submit_local(AppCommand::from(PanelEvent::MenuPressed).into()));
    let reply = serve_one(&QUEUE, &mut bench, AppCommand::Stop);
    assert_eq!(reply, Err(CommandError::SurfaceDisabled));
    assert_eq!(bench.app.state(), StateId::Running);
}

#[test]
fn timed_out_request_never_executes() {
    static QUEUE: CommandQueue = CommandQueue::new();
    let mut bench = Bench::remote();
    let dac_before = bench.hw.last_dac();

    // Nobody services the queue: the request gives up, and the caller is
    // told it failed.
    let impatient = RemoteClient::new(&QUEUE, Duration::from_millis(20));
    assert_eq!(
        impatient.request(AppCommand::SetAmplitudePercent(40.0).into()),
        Err(BridgeError::Timeout)
    );
    // When the loop catches up the abandoned command is dropped.
    assert_eq!(bench.drain(&QUEUE), 0);
    assert_eq!(bench.app.state(), StateId::Stopped);
    assert_eq!(bench.hw.last_dac(), dac_before);

    let ack = serve_one(&QUEUE, &mut bench, AppCommand::GetStatus).unwrap();
    assert_eq!(ack.outcome, Outcome::Snapshot);
    assert!(ack.status.amplitude.is_zero());
}

#[test]
fn full_queue_refuses_remote_request() {
    static QUEUE: CommandQueue = CommandQueue::new();
    while QUEUE.submit_local(AppCommand::GetStatus.into()) {}

    let client = RemoteClient::new(&QUEUE, Duration::from_millis(20));
    assert_eq!(
        client.request(AppCommand::GetStatus.into()),
        Err(BridgeError::QueueFull)
    );
}
