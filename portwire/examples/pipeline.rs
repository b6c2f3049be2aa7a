//! Example: temperature regulation pipeline.
//!
//! This example demonstrates in particular:
//!
//! * auto-wiring of registered components,
//! * asynchronous components with per-instance exclusion,
//! * serialized domains,
//! * handler failure supervision,
//! * waiting for asynchronous deliveries with expectations.
//!
//! ```text
//!                 ┌─────────────┐  reading   ┌────────────┐  smoothed
//!                 │             ├───────────►│            ├──────────┐
//!                 │ Thermometer │   (f64)    │  Smoother  │          │
//!                 │             │            │   (async)  │          │
//!                 └──────┬──────┘            └────────────┘          │
//!                        │ setpoint                                  ▼
//!                        │  (req)                             ┌────────────┐
//!                        └───────────────────────────────────►│            │
//!                                                             │ Regulator  │
//!                 ┌─────────────┐      heater command         │            │
//!                 │   Display   │◄────────────────────────────┤            │
//!                 └─────────────┘        (on|off)             └────────────┘
//! ```
//!
//! Run with `RUST_LOG=portwire=debug` to see wiring and dispatch events.

use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use portwire::component::{Component, Handle};
use portwire::domain::{DispatchPolicy, SyncPolicy};
use portwire::ports::{EventPort, PortDeclarations, QueueSink, RequestPort};
use portwire::runtime::{AsyncConfig, HandlerFailure, RuntimeInit, SyncLevel};
use tracing_subscriber::{fmt, EnvFilter};

/// Thermometer.
#[derive(Default)]
pub struct Thermometer {
    /// Raw temperature [°C] -- output port.
    pub reading: EventPort<f64>,
    /// Temperature setpoint [°C] -- requestor port.
    pub setpoint: RequestPort<(), f64>,
}

impl Component for Thermometer {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .event_out("reading", &self.reading)
            .request_out("setpoint", &self.setpoint);
    }
}

/// Smoothed temperature [°C].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Smoothed(pub f64);

/// Exponential moving average of the raw temperature.
pub struct Smoother {
    /// Smoothed temperature -- output port.
    pub smoothed: EventPort<Smoothed>,
    /// Bits of the last average, if any -- internal state.
    average: AtomicU64,
    /// Smoothing factor in ]0, 1] -- constant.
    alpha: f64,
}

impl Smoother {
    /// Creates a smoother with the specified smoothing factor.
    pub fn new(alpha: f64) -> Self {
        Self {
            smoothed: EventPort::new(),
            average: AtomicU64::new(f64::NAN.to_bits()),
            alpha,
        }
    }

    /// Raw temperature -- input port.
    pub fn reading(&self, value: f64) {
        let previous = f64::from_bits(self.average.load(Ordering::Relaxed));
        let average = if previous.is_nan() {
            value
        } else {
            self.alpha * value + (1.0 - self.alpha) * previous
        };
        self.average.store(average.to_bits(), Ordering::Relaxed);

        self.smoothed.trigger(Smoothed(average));
    }
}

impl Component for Smoother {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .event_out("smoothed", &self.smoothed)
            .input("reading", Self::reading);
    }

    fn async_config() -> Option<AsyncConfig> {
        Some(AsyncConfig::new(1, SyncLevel::PerInstance))
    }
}

/// Heater command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaterCommand {
    On,
    Off,
}

/// On/off regulator.
pub struct Regulator {
    /// Heater command -- output port.
    pub command: EventPort<HeaterCommand>,
    /// Temperature setpoint [°C] -- constant.
    setpoint: f64,
}

impl Regulator {
    /// Creates a regulator with the specified setpoint.
    pub fn new(setpoint: f64) -> Self {
        Self {
            command: EventPort::new(),
            setpoint,
        }
    }

    /// Smoothed temperature -- input port.
    pub fn smoothed(&self, Smoothed(temperature): Smoothed) {
        if !temperature.is_finite() {
            panic!("invalid temperature: {}", temperature);
        }
        let command = if temperature < self.setpoint {
            HeaterCommand::On
        } else {
            HeaterCommand::Off
        };

        self.command.trigger(command);
    }

    /// Temperature setpoint -- replier port.
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }
}

impl Component for Regulator {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .event_out("command", &self.command)
            .input("smoothed", Self::smoothed)
            .replier("setpoint", Self::setpoint);
    }
}

/// Heater display.
#[derive(Default)]
pub struct Display {
    /// Heater commands -- sink port.
    pub commands: QueueSink<HeaterCommand>,
}

impl Component for Display {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.queue_sink("commands", &self.commands);
    }
}

/// Handler failure monitor.
#[derive(Default)]
pub struct Supervisor {
    /// Handler failures -- sink port.
    pub failures: QueueSink<HandlerFailure>,
}

impl Component for Supervisor {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.queue_sink("failures", &self.failures);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ---------------
    // Bench assembly.
    // ---------------

    let runtime = RuntimeInit::new().with_thread_name("pipeline").init();

    let thermometer = Handle::new(Thermometer::default());
    let smoother = Handle::new(Smoother::new(0.5));
    let regulator = Handle::new(Regulator::new(20.0));
    let display = Handle::new(Display::default());
    let supervisor = Handle::new(Supervisor::default());

    // The regulator and the display share a serialized domain.
    runtime
        .create_domain("control", SyncPolicy::Serialized, DispatchPolicy::Sequential)?
        .add_components(&[&regulator, &display]);

    for component in [
        thermometer.component_ref(),
        smoother.component_ref(),
        regulator.component_ref(),
        display.component_ref(),
        supervisor.component_ref(),
    ] {
        runtime.register_component(&component)?;
    }
    runtime.verify(&[&thermometer, &smoother, &regulator])?;

    // ----------
    // Execution.
    // ----------

    let commands = runtime
        .interceptor()
        .expect_received::<HeaterCommand>(|_| true);
    let failures = runtime
        .interceptor()
        .expect_received::<HandlerFailure>(|_| true);

    println!("setpoint: {:.1}°C", thermometer.setpoint.call(())?);

    for reading in [17.0, 19.0, 23.0, 24.0] {
        thermometer.reading.trigger(reading);
    }
    assert!(commands.wait(4, Duration::from_secs(1)));
    println!("heater commands: {:?}", display.commands.drain());

    // A malformed reading makes the regulator fail; the failure is reported
    // to the supervisor and the pipeline keeps running.
    thermometer.reading.trigger(f64::INFINITY);
    assert!(failures.wait(1, Duration::from_secs(1)));
    for failure in supervisor.failures.drain() {
        println!("failure: {}", failure);
    }

    runtime.shutdown();

    Ok(())
}
