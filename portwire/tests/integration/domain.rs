//! Domain policies layered on top of component execution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use portwire::component::{Component, Handle};
use portwire::connect::{ConnectOption, ConnectOptions};
use portwire::domain::{DispatchPolicy, DomainError, SyncPolicy};
use portwire::ports::{EventPort, PortDeclarations, RequestPort};
use portwire::runtime::{AsyncConfig, Runtime, RuntimeInit, SyncLevel};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Tracks the number of concurrent executions across components.
#[derive(Default)]
struct Gauge {
    active: AtomicUsize,
    max_active: AtomicUsize,
}
impl Gauge {
    fn run(&self, work: impl FnOnce()) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        work();
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
    fn max(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Emitter {
    numbers: EventPort<u32>,
    words: EventPort<String>,
}
impl Component for Emitter {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .event_out("numbers", &self.numbers)
            .event_out("words", &self.words);
    }
}

/// An asynchronous component whose ports may run concurrently.
struct Busy {
    gauge: Arc<Gauge>,
}
impl Busy {
    fn on_number(&self, _value: u32) {
        self.gauge.run(|| thread::sleep(Duration::from_millis(2)));
    }
    fn on_word(&self, _value: String) {
        self.gauge.run(|| thread::sleep(Duration::from_millis(2)));
    }
}
impl Component for Busy {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .input("number", Self::on_number)
            .input("word", Self::on_word);
    }

    fn async_config() -> Option<AsyncConfig> {
        Some(AsyncConfig::new(4, SyncLevel::PerPort))
    }
}

/// Forwards numbers as words.
#[derive(Default)]
struct Relay {
    out: EventPort<String>,
}
impl Relay {
    fn relay(&self, value: u32) {
        self.out.trigger(value.to_string());
    }
}
impl Component for Relay {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.event_out("out", &self.out).input("relay", Self::relay);
    }
}

#[derive(Default)]
struct ThreadRecorder {
    threads: Mutex<Vec<(ThreadId, String)>>,
}
impl ThreadRecorder {
    fn record(&self, _word: String) {
        let current = thread::current();
        self.threads.lock().unwrap().push((
            current.id(),
            current.name().unwrap_or_default().to_owned(),
        ));
    }
}
impl Component for ThreadRecorder {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.input("record", Self::record);
    }
}

struct Query(u32);

/// An asynchronous component asking for advice on each number.
#[derive(Default)]
struct Inquirer {
    query: RequestPort<Query, String>,
    answers: Mutex<Vec<String>>,
}
impl Inquirer {
    fn ask(&self, value: u32) {
        let answer = self.query.call(Query(value)).unwrap();
        self.answers.lock().unwrap().push(answer);
    }
}
impl Component for Inquirer {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .request_out("query", &self.query)
            .input("ask", Self::ask);
    }

    fn async_config() -> Option<AsyncConfig> {
        Some(AsyncConfig::new(1, SyncLevel::PerInstance))
    }
}

struct Advisor;
impl Advisor {
    fn advise(&self, Query(value): Query) -> String {
        format!("advice {}", value)
    }
}
impl Component for Advisor {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.replier("advise", Self::advise);
    }

    fn async_config() -> Option<AsyncConfig> {
        Some(AsyncConfig::new(1, SyncLevel::PerPort))
    }
}

#[test]
fn domain_names_are_unique() {
    let runtime = Runtime::new();
    let domain = runtime
        .create_domain("control", SyncPolicy::Serialized, DispatchPolicy::Sequential)
        .unwrap();
    assert_eq!(domain.sync_policy(), SyncPolicy::Serialized);
    assert_eq!(domain.dispatch_policy(), DispatchPolicy::Sequential);

    assert_eq!(
        runtime.create_domain("control", SyncPolicy::NoSync, DispatchPolicy::Parallel),
        Err(DomainError::DuplicateName("control".to_owned()))
    );

    runtime.shutdown();
    assert_eq!(
        runtime.create_domain("other", SyncPolicy::NoSync, DispatchPolicy::Sequential),
        Err(DomainError::RuntimeShutDown)
    );
}

#[test]
fn components_belong_to_one_domain() {
    let runtime = Runtime::new();
    let first = runtime
        .create_domain("first", SyncPolicy::NoSync, DispatchPolicy::Sequential)
        .unwrap();
    let second = runtime
        .create_domain("second", SyncPolicy::NoSync, DispatchPolicy::Parallel)
        .unwrap();
    let relay = Handle::new(Relay::default());
    let recorder = Handle::new(ThreadRecorder::default());

    first.add_components(&[&relay, &recorder]);
    assert_eq!(first.members(), vec![relay.info(), recorder.info()]);
    assert_eq!(runtime.domain_of(&relay), Some(first.clone()));

    second.add_components(&[&relay]);
    assert!(!first.contains(&relay));
    assert!(second.contains(&relay));
    assert_eq!(runtime.domain_of(&relay), Some(second.clone()));
    assert!(!first.remove_component(&relay));

    assert!(second.remove_component(&relay));
    assert_eq!(runtime.domain_of(&relay), None);
    assert_eq!(first.members(), vec![recorder.info()]);
}

#[test]
fn unregistration_keeps_domain_membership() {
    let runtime = Runtime::new();
    let domain = runtime
        .create_domain("kept", SyncPolicy::NoSync, DispatchPolicy::Sequential)
        .unwrap();
    let relay = Handle::new(Relay::default());
    domain.add_components(&[&relay]);

    runtime.register_component(&relay).unwrap();
    assert!(runtime.unregister_component(&relay));

    assert_eq!(runtime.domain_of(&relay), Some(domain.clone()));
    assert!(domain.remove_component(&relay));
}

#[test]
fn serialized_domain_excludes_concurrent_ports() {
    let runtime = Runtime::new();
    let domain = runtime
        .create_domain("serial", SyncPolicy::Serialized, DispatchPolicy::Sequential)
        .unwrap();
    let gauge = Arc::new(Gauge::default());
    let emitter = Handle::new(Emitter::default());
    let a = Handle::new(Busy {
        gauge: gauge.clone(),
    });
    let b = Handle::new(Busy {
        gauge: gauge.clone(),
    });
    domain.add_components(&[&a, &b]);

    runtime.connect(&emitter, &a, ConnectOptions::NONE).unwrap();
    runtime
        .connect(&emitter, &b, ConnectOption::ForceConnectEventPorts)
        .unwrap();
    let numbers = runtime.interceptor().expect_received::<u32>(|_| true);
    let words = runtime.interceptor().expect_received::<String>(|_| true);

    for v in 0..5u32 {
        emitter.numbers.trigger(v);
        emitter.words.trigger(v.to_string());
    }

    assert!(numbers.wait(10, TIMEOUT));
    assert!(words.wait(10, TIMEOUT));
    assert_eq!(gauge.max(), 1);
    runtime.shutdown();
}

#[test]
fn serialized_domain_allows_reentrant_cascades() {
    let runtime = Runtime::new();
    let domain = runtime
        .create_domain("serial", SyncPolicy::Serialized, DispatchPolicy::Sequential)
        .unwrap();
    let emitter = Handle::new(Emitter::default());
    let relay = Handle::new(Relay::default());
    let recorder = Handle::new(ThreadRecorder::default());
    domain.add_components(&[&relay, &recorder]);

    runtime
        .connect_directed(&emitter, &relay, ConnectOptions::NONE)
        .unwrap();
    runtime
        .connect(&relay, &recorder, ConnectOptions::NONE)
        .unwrap();

    emitter.numbers.trigger(1);

    assert_eq!(recorder.threads.lock().unwrap().len(), 1);
}

#[test]
fn serialized_domain_allows_requests_between_asynchronous_members() {
    let runtime = Runtime::new();
    let domain = runtime
        .create_domain("serial", SyncPolicy::Serialized, DispatchPolicy::Sequential)
        .unwrap();
    let emitter = Handle::new(Emitter::default());
    let inquirer = Handle::new(Inquirer::default());
    let advisor = Handle::new(Advisor);
    domain.add_components(&[&inquirer, &advisor]);

    runtime
        .connect_directed(&emitter, &inquirer, ConnectOptions::NONE)
        .unwrap();
    runtime
        .connect(&inquirer, &advisor, ConnectOptions::NONE)
        .unwrap();
    let asked = runtime.interceptor().expect_received::<u32>(|_| true);

    emitter.numbers.trigger(1);
    emitter.numbers.trigger(2);

    assert!(asked.wait(2, TIMEOUT));
    assert_eq!(
        *inquirer.answers.lock().unwrap(),
        vec!["advice 1".to_owned(), "advice 2".to_owned()]
    );
    runtime.shutdown();
}

#[test]
fn parallel_domain_offloads_member_events() {
    let runtime = RuntimeInit::new()
        .with_thread_name("grid")
        .with_num_threads(2)
        .init();
    let domain = runtime
        .create_domain("parallel", SyncPolicy::NoSync, DispatchPolicy::Parallel)
        .unwrap();
    let emitter = Handle::new(Emitter::default());
    let relay = Handle::new(Relay::default());
    let recorder = Handle::new(ThreadRecorder::default());
    domain.add_components(&[&relay, &recorder]);

    runtime
        .connect_directed(&emitter, &relay, ConnectOptions::NONE)
        .unwrap();
    runtime
        .connect(&relay, &recorder, ConnectOptions::NONE)
        .unwrap();
    let words = runtime.interceptor().expect_received::<String>(|_| true);

    emitter.numbers.trigger(7);

    assert!(words.wait(1, TIMEOUT));
    let threads = recorder.threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0].0, thread::current().id());
    assert!(threads[0].1.starts_with("grid-domains #"), "{}", threads[0].1);
    drop(threads);
    runtime.shutdown();
}

#[test]
fn sequential_domain_runs_on_the_triggering_thread() {
    let runtime = Runtime::new();
    let domain = runtime
        .create_domain("sequential", SyncPolicy::NoSync, DispatchPolicy::Sequential)
        .unwrap();
    let emitter = Handle::new(Emitter::default());
    let relay = Handle::new(Relay::default());
    let recorder = Handle::new(ThreadRecorder::default());
    domain.add_components(&[&relay, &recorder]);

    runtime
        .connect_directed(&emitter, &relay, ConnectOptions::NONE)
        .unwrap();
    runtime
        .connect(&relay, &recorder, ConnectOptions::NONE)
        .unwrap();

    emitter.numbers.trigger(7);

    let threads = recorder.threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].0, thread::current().id());
}
