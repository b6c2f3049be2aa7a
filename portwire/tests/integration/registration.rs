//! Auto-wiring of registered components and runtime shutdown.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use portwire::component::{Component, Handle};
use portwire::connect::{ConnectError, ConnectOptions};
use portwire::ports::{EventPort, PortDeclarations, QueueSink, RequestPort, Signature};
use portwire::runtime::{AsyncConfig, HandlerFailure, Runtime, RuntimeInit, SyncLevel};

#[derive(Default)]
struct Sensor {
    readings: EventPort<f64>,
    calibration: RequestPort<(), f64>,
}
impl Component for Sensor {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .event_out("readings", &self.readings)
            .request_out("calibration", &self.calibration);
    }
}

#[derive(Default)]
struct Controller {
    readings: Mutex<Vec<f64>>,
}
impl Controller {
    fn on_reading(&self, value: f64) {
        if value < 0.0 {
            panic!("negative reading");
        }
        self.readings.lock().unwrap().push(value);
    }
    fn calibration(&self) -> f64 {
        0.5
    }
}
impl Component for Controller {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .input("reading", Self::on_reading)
            .replier("calibration", Self::calibration);
    }
}

#[derive(Default)]
struct Supervisor {
    failures: QueueSink<HandlerFailure>,
}
impl Component for Supervisor {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.queue_sink("failures", &self.failures);
    }
}

/// Has two in-ports accepting readings, one of each kind.
#[derive(Default)]
struct Undecided {
    buffer: QueueSink<f64>,
}
impl Undecided {
    fn on_reading(&self, _value: f64) {}
}
impl Component for Undecided {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .queue_sink("buffer", &self.buffer)
            .input("reading", Self::on_reading);
    }
}

/// Records the name of the worker thread handling each reading.
#[derive(Default)]
struct Logger {
    threads: Mutex<Vec<String>>,
}
impl Logger {
    fn on_reading(&self, _value: f64) {
        let name = thread::current().name().unwrap_or_default().to_owned();
        self.threads.lock().unwrap().push(name);
    }
}
impl Component for Logger {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.input("reading", Self::on_reading);
    }

    fn async_config() -> Option<AsyncConfig> {
        Some(AsyncConfig::new(1, SyncLevel::PerPort))
    }
}

#[test]
fn registered_components_are_wired_together() {
    let runtime = Runtime::new();
    let sensor = Handle::new(Sensor::default());
    let controller = Handle::new(Controller::default());

    runtime.register_component(&sensor).unwrap();
    runtime.register_component(&controller).unwrap();
    // Registration is idempotent.
    runtime.register_component(&controller).unwrap();
    assert!(runtime.is_registered(&sensor));
    runtime.verify(&[&sensor]).unwrap();

    sensor.readings.trigger(1.5);
    assert_eq!(*controller.readings.lock().unwrap(), vec![1.5]);
    assert_eq!(sensor.calibration.call(()), Ok(0.5));

    assert!(runtime.unregister_component(&controller));
    assert!(!runtime.unregister_component(&controller));
    assert!(!runtime.is_registered(&controller));
    assert!(!sensor.readings.is_connected());
    assert!(!sensor.calibration.is_connected());
}

#[test]
fn failed_registration_leaves_no_trace() {
    let runtime = Runtime::new();
    let sensor = Handle::new(Sensor::default());
    let controller = Handle::new(Controller::default());
    let undecided = Handle::new(Undecided::default());

    runtime.register_component(&controller).unwrap();
    runtime.register_component(&undecided).unwrap();

    // The sensor would connect to the controller but is ambiguous with the
    // other registered component.
    assert_eq!(
        runtime.register_component(&sensor),
        Err(ConnectError::AmbiguousPorts {
            from: sensor.info(),
            to: undecided.info(),
            signature: Signature::event::<f64>(),
        })
    );
    assert!(!runtime.is_registered(&sensor));
    assert!(!sensor.readings.is_connected());
    assert!(!sensor.calibration.is_connected());
}

#[test]
fn registered_failure_handlers_receive_failures() {
    let runtime = Runtime::new();
    let sensor = Handle::new(Sensor::default());
    let controller = Handle::new(Controller::default());
    let supervisor = Handle::new(Supervisor::default());

    runtime.register_component(&supervisor).unwrap();
    runtime.register_component(&sensor).unwrap();
    runtime.register_component(&controller).unwrap();

    sensor.readings.trigger(-1.0);
    sensor.readings.trigger(2.0);

    let failure = supervisor.failures.pop().unwrap();
    assert_eq!(failure.component(), controller.info());
    assert_eq!(failure.port(), "reading");
    assert_eq!(failure.reason(), "negative reading");
    assert!(supervisor.failures.is_empty());
    assert_eq!(*controller.readings.lock().unwrap(), vec![2.0]);

    assert!(runtime.unregister_component(&supervisor));
    sensor.readings.trigger(-2.0);
    assert!(supervisor.failures.is_empty());
}

#[test]
fn shutdown_releases_bindings_and_refuses_wiring() {
    let runtime = Runtime::new();
    let sensor = Handle::new(Sensor::default());
    let controller = Handle::new(Controller::default());
    runtime
        .connect(&sensor, &controller, ConnectOptions::NONE)
        .unwrap();
    let _sent = runtime.interceptor().expect_sent::<f64>(|_| true);

    runtime.shutdown();

    assert!(runtime.is_shut_down());
    assert!(!sensor.readings.is_connected());
    assert!(!sensor.calibration.is_connected());
    assert_eq!(runtime.interceptor().rule_count(), 0);
    assert_eq!(
        runtime.connect(&sensor, &controller, ConnectOptions::NONE),
        Err(ConnectError::RuntimeShutDown)
    );
    assert_eq!(
        runtime.register_component(&sensor),
        Err(ConnectError::RuntimeShutDown)
    );
    assert!(!runtime.unregister_component(&sensor));

    // Triggering a released port does nothing.
    sensor.readings.trigger(3.0);
    assert!(controller.readings.lock().unwrap().is_empty());
}

#[test]
fn components_move_to_a_new_runtime_once_the_previous_one_is_gone() {
    let sensor = Handle::new(Sensor::default());
    let first = Runtime::new();
    assert!(first.verify(&[&sensor]).is_err());
    first.shutdown();
    drop(first);

    let second = RuntimeInit::new().with_thread_name("second").init();
    let logger = Handle::new(Logger::default());
    second
        .connect(&sensor, &logger, ConnectOptions::NONE)
        .unwrap();
    let sent = second.interceptor().expect_sent::<f64>(|_| true);
    let handled = second.interceptor().expect_received::<f64>(|_| true);

    sensor.readings.trigger(1.0);

    assert_eq!(sent.count(), 1);
    assert!(handled.wait(1, Duration::from_secs(5)));
    let threads = logger.threads.lock().unwrap().clone();
    assert_eq!(threads.len(), 1);
    assert!(threads[0].starts_with("second-Logger #"), "{}", threads[0]);
    second.shutdown();
}

#[test]
fn components_of_a_live_runtime_cannot_be_wired_elsewhere() {
    let sensor = Handle::new(Sensor::default());
    let controller = Handle::new(Controller::default());
    let first = Runtime::new();
    first
        .connect(&sensor, &controller, ConnectOptions::NONE)
        .unwrap();

    let second = Runtime::new();
    let other = Handle::new(Controller::default());
    assert!(matches!(
        second.connect(&sensor, &other, ConnectOptions::NONE),
        Err(ConnectError::AttachedElsewhere(_))
    ));
    assert!(sensor.readings.is_connected());

    sensor.readings.trigger(4.0);
    assert_eq!(*controller.readings.lock().unwrap(), vec![4.0]);
    assert!(other.readings.lock().unwrap().is_empty());
}
