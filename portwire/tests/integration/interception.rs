//! Observation of in-flight messages and substitution of replies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use portwire::component::{Component, ComponentInfo, Handle};
use portwire::connect::{ConnectOption, ConnectOptions};
use portwire::ports::{CallError, EventPort, PortDeclarations, QueueSink, RequestPort};
use portwire::runtime::Runtime;

#[derive(Default)]
struct Emitter {
    out: EventPort<u32>,
}
impl Component for Emitter {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.event_out("out", &self.out);
    }
}

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<u32>>,
}
impl Recorder {
    fn record(&self, value: u32) {
        self.log.lock().unwrap().push(value);
    }
    fn recorded(&self) -> Vec<u32> {
        self.log.lock().unwrap().clone()
    }
}
impl Component for Recorder {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.input("record", Self::record);
    }
}

#[derive(Default)]
struct Collector {
    values: QueueSink<u32>,
}
impl Component for Collector {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.queue_sink("values", &self.values);
    }
}

#[derive(Default)]
struct Client {
    query: RequestPort<u32, String>,
}
impl Component for Client {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.request_out("query", &self.query);
    }
}

#[derive(Default)]
struct Server {
    calls: AtomicUsize,
}
impl Server {
    fn answer(&self, query: u32) -> String {
        self.calls.fetch_add(1, Ordering::Relaxed);
        format!("server {}", query)
    }
}
impl Component for Server {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.replier("answer", Self::answer);
    }
}

type Routes = Arc<Mutex<Vec<(u32, Option<ComponentInfo>, Option<ComponentInfo>)>>>;

#[test]
fn sent_messages_are_observed_with_their_origin() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let recorder = Handle::new(Recorder::default());
    runtime
        .connect(&emitter, &recorder, ConnectOptions::NONE)
        .unwrap();

    let routes: Routes = Default::default();
    {
        let routes = routes.clone();
        runtime
            .interceptor()
            .when_sent::<u32>(|v| *v >= 10)
            .then(move |msg| {
                routes
                    .lock()
                    .unwrap()
                    .push((*msg.message(), msg.origin(), msg.target()))
            });
    }

    emitter.out.trigger(5);
    emitter.out.trigger(10);

    assert_eq!(
        *routes.lock().unwrap(),
        vec![(10, Some(emitter.info()), None)]
    );
    // Normal delivery is unaffected.
    assert_eq!(recorder.recorded(), vec![5, 10]);
}

#[test]
fn received_messages_are_observed_after_handling() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let recorder = Handle::new(Recorder::default());
    let collector = Handle::new(Collector::default());
    runtime
        .connect(&emitter, &recorder, ConnectOptions::NONE)
        .unwrap();
    runtime
        .connect(&emitter, &collector, ConnectOption::ForceConnectEventPorts)
        .unwrap();

    let routes: Routes = Default::default();
    let handled_first = Arc::new(AtomicUsize::new(0));
    {
        let routes = routes.clone();
        let handled_first = handled_first.clone();
        let recorder = recorder.clone();
        runtime
            .interceptor()
            .when_received::<u32>(|_| true)
            .then(move |msg| {
                if recorder.recorded().contains(msg.message()) {
                    handled_first.fetch_add(1, Ordering::Relaxed);
                }
                routes
                    .lock()
                    .unwrap()
                    .push((*msg.message(), msg.origin(), msg.target()))
            });
    }

    emitter.out.trigger(3);

    assert_eq!(
        *routes.lock().unwrap(),
        vec![
            (3, Some(emitter.info()), Some(recorder.info())),
            (3, Some(emitter.info()), Some(collector.info())),
        ]
    );
    assert_eq!(handled_first.load(Ordering::Relaxed), 2);
    assert_eq!(collector.values.pop(), Some(3));
}

#[test]
fn stashed_replies_short_circuit_requests() {
    let runtime = Runtime::new();
    let client = Handle::new(Client::default());
    let server = Handle::new(Server::default());
    runtime
        .connect(&client, &server, ConnectOptions::NONE)
        .unwrap();

    runtime
        .interceptor()
        .respond_with::<u32, String>("stubbed".to_owned());
    // A reply of another response type is never used.
    runtime.interceptor().respond_with::<u32, u64>(0);

    assert_eq!(client.query.call(1).as_deref(), Ok("stubbed"));
    assert_eq!(server.calls.load(Ordering::Relaxed), 0);
    assert_eq!(client.query.call(2).as_deref(), Ok("server 2"));
    assert_eq!(server.calls.load(Ordering::Relaxed), 1);
}

#[test]
fn replies_stashed_for_a_sender_take_precedence() {
    let runtime = Runtime::new();
    let c1 = Handle::new(Client::default());
    let c2 = Handle::new(Client::default());
    let server = Handle::new(Server::default());
    runtime.connect(&c1, &server, ConnectOptions::NONE).unwrap();
    runtime.connect(&c2, &server, ConnectOptions::NONE).unwrap();

    let interceptor = runtime.interceptor();
    interceptor.respond_with::<u32, String>("anyone".to_owned());
    interceptor.respond_with_from::<u32, String>(&c2, "c2 only".to_owned());

    assert_eq!(c2.query.call(1).as_deref(), Ok("c2 only"));
    assert_eq!(c1.query.call(1).as_deref(), Ok("anyone"));
    assert_eq!(c2.query.call(1).as_deref(), Ok("server 1"));
}

#[test]
fn stashed_replies_answer_unconnected_ports() {
    let runtime = Runtime::new();
    let client = Handle::new(Client::default());
    // Verification attaches the ports of the client to the runtime.
    assert!(runtime.verify(&[&client]).is_err());

    runtime
        .interceptor()
        .respond_with_from::<u32, String>(&client, "mocked".to_owned());

    assert_eq!(client.query.call(1).as_deref(), Ok("mocked"));
    assert!(matches!(
        client.query.call(1),
        Err(CallError::NotConnected(_))
    ));
}

#[test]
fn sent_rules_may_answer_the_observed_request() {
    let runtime = Runtime::new();
    let client = Handle::new(Client::default());
    let server = Handle::new(Server::default());
    runtime
        .connect(&client, &server, ConnectOptions::NONE)
        .unwrap();

    runtime
        .interceptor()
        .when_sent::<u32>(|v| *v > 100)
        .then(|msg| msg.respond_with(format!("too big: {}", msg.message())));

    assert_eq!(client.query.call(101).as_deref(), Ok("too big: 101"));
    assert_eq!(client.query.call(7).as_deref(), Ok("server 7"));
    assert_eq!(server.calls.load(Ordering::Relaxed), 1);
}

#[test]
fn clearing_removes_rules_and_replies() {
    let runtime = Runtime::new();
    let client = Handle::new(Client::default());
    let server = Handle::new(Server::default());
    runtime
        .connect(&client, &server, ConnectOptions::NONE)
        .unwrap();
    let interceptor = runtime.interceptor();

    let sent = interceptor.expect_sent::<u32>(|_| true);
    interceptor.when_received::<u32>(|_| true).then(|_| {});
    interceptor.respond_with::<u32, String>("stale".to_owned());
    assert_eq!(interceptor.rule_count(), 2);

    interceptor.clear();
    assert_eq!(interceptor.rule_count(), 0);
    assert_eq!(client.query.call(4).as_deref(), Ok("server 4"));
    assert_eq!(sent.count(), 0);

    let sent = interceptor.expect_sent::<u32>(|_| true);
    client.query.call(5).unwrap();
    assert_eq!(sent.count(), 1);
    assert!(interceptor.remove(sent.rule()));
}
