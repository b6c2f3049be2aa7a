//! Signature matching and binding rules of the connection engine.

use std::sync::{Arc, Mutex};

use portwire::component::{Component, Handle};
use portwire::connect::{ConnectError, ConnectOption, ConnectOptions};
use portwire::ports::{
    CallError, Direction, EventPort, PortDeclarations, PortKind, QueueSink, RequestPort,
    Signature, StackSink,
};
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

/// Records events in a log shared with other taggers.
struct Tagger {
    tag: &'static str,
    log: Arc<Mutex<Vec<(&'static str, u32)>>>,
}
impl Tagger {
    fn record(&self, value: u32) {
        self.log.lock().unwrap().push((self.tag, value));
    }
}
impl Component for Tagger {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.input("record", Self::record);
    }
}

#[derive(Default)]
struct TwinEmitter {
    a: EventPort<u32>,
    b: EventPort<u32>,
    text: QueueSink<String>,
}
impl Component for TwinEmitter {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .event_out("a", &self.a)
            .event_out("b", &self.b)
            .queue_sink("text", &self.text);
    }
}

#[derive(Default)]
struct Echo {
    text: EventPort<String>,
}
impl Echo {
    fn echo(&self, value: u32) {
        self.text.trigger(value.to_string());
    }
}
impl Component for Echo {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.event_out("text", &self.text).input("echo", Self::echo);
    }
}

#[derive(Default)]
struct TextRecorder {
    lengths: EventPort<usize>,
    texts: QueueSink<String>,
}
impl Component for TextRecorder {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports
            .event_out("lengths", &self.lengths)
            .queue_sink("texts", &self.texts);
    }
}

#[derive(Default)]
struct Conflicted {
    sink: QueueSink<u32>,
}
impl Conflicted {
    fn handle(&self, _value: u32) {}
}
impl Component for Conflicted {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.queue_sink("sink", &self.sink).input("handle", Self::handle);
    }
}

struct Doubled;
impl Doubled {
    fn first(&self, _value: u32) {}
    fn second(&self, _value: u32) {}
}
impl Component for Doubled {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.input("first", Self::first).input("second", Self::second);
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

struct Server {
    prefix: &'static str,
}
impl Server {
    fn answer(&self, query: u32) -> String {
        format!("{}{}", self.prefix, query)
    }
}
impl Component for Server {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.replier("answer", Self::answer);
    }
}

#[derive(Default)]
struct Buffers {
    queue: QueueSink<u32>,
}
impl Component for Buffers {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.queue_sink("queue", &self.queue);
    }
}

#[derive(Default)]
struct Stack {
    stack: StackSink<u32>,
}
impl Component for Stack {
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
        ports.stack_sink("stack", &self.stack);
    }
}

#[test]
fn connection_symmetry() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let recorder = Handle::new(Recorder::default());

    assert!(runtime
        .connect(&emitter, &recorder, ConnectOptions::NONE)
        .unwrap());
    assert!(!runtime
        .connect(&recorder, &emitter, ConnectOptions::NONE)
        .unwrap());
    // Forcing never duplicates a subscriber bound to the same in-port.
    assert!(!runtime
        .connect(&emitter, &recorder, ConnectOption::ForceConnectEventPorts)
        .unwrap());
    assert_eq!(emitter.out.subscriber_count(), 1);

    emitter.out.trigger(7);
    assert_eq!(recorder.recorded(), vec![7]);
}

#[test]
fn source_ambiguity_leaves_ports_untouched() {
    let runtime = Runtime::new();
    let twin = Handle::new(TwinEmitter::default());
    let echo = Handle::new(Echo::default());

    assert_eq!(
        runtime.connect(&twin, &echo, ConnectOptions::NONE),
        Err(ConnectError::AmbiguousPorts {
            from: twin.info(),
            to: echo.info(),
            signature: Signature::event::<u32>(),
        })
    );

    // The reverse direction would have succeeded on its own.
    assert!(!echo.text.is_connected());
    assert!(!twin.text.is_materialized());
    assert!(!twin.a.is_connected());
    assert!(!twin.b.is_connected());
}

#[test]
fn target_ambiguity() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let conflicted = Handle::new(Conflicted::default());

    assert_eq!(
        runtime.connect_directed(&emitter, &conflicted, ConnectOptions::NONE),
        Err(ConnectError::AmbiguousPorts {
            from: emitter.info(),
            to: conflicted.info(),
            signature: Signature::event::<u32>(),
        })
    );
    assert!(!emitter.out.is_connected());
    assert!(!conflicted.sink.is_materialized());
}

#[test]
fn duplicate_in_port_signatures() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let doubled = Handle::new(Doubled);

    assert_eq!(
        runtime.connect(&emitter, &doubled, ConnectOptions::NONE),
        Err(ConnectError::DuplicateSignature {
            component: doubled.info(),
            signature: Signature::event::<u32>(),
        })
    );
    // Discovery is cached, and so is its error.
    assert!(matches!(
        runtime.verify(&[&doubled]),
        Err(ConnectError::DuplicateSignature { .. })
    ));
}

#[test]
fn missing_in_port_under_strict_option() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let client = Handle::new(Client::default());

    // Unmatched ports are skipped by default.
    assert!(!runtime
        .connect(&emitter, &client, ConnectOptions::NONE)
        .unwrap());
    assert_eq!(
        runtime.connect_directed(&emitter, &client, ConnectOption::RequireAllPortsConnected),
        Err(ConnectError::PortNotFound {
            to: client.info(),
            signature: Signature::event::<u32>(),
        })
    );
}

#[test]
fn verify_completeness() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let client = Handle::new(Client::default());
    let recorder = Handle::new(Recorder::default());

    match runtime.verify(&[&emitter, &client]) {
        Err(ConnectError::PortsNotConnected(ports)) => {
            assert_eq!(ports.len(), 2);
            assert_eq!(ports[0].owner(), Some(emitter.info()));
            assert_eq!(ports[0].name(), "out");
            assert_eq!(ports[0].kind(), PortKind::Event);
            assert_eq!(ports[0].direction(), Direction::Out);
            assert_eq!(ports[1].owner(), Some(client.info()));
            assert_eq!(ports[1].signature(), Signature::request::<u32, String>());
        }
        other => panic!("unexpected verification result: {:?}", other),
    }
    match runtime.verify_requests_only(&[&emitter, &client]) {
        Err(ConnectError::PortsNotConnected(ports)) => {
            assert_eq!(ports.len(), 1);
            assert_eq!(ports[0].kind(), PortKind::Request);
        }
        other => panic!("unexpected verification result: {:?}", other),
    }

    runtime
        .connect(&emitter, &recorder, ConnectOptions::NONE)
        .unwrap();
    runtime.verify(&[&emitter, &recorder]).unwrap();
    runtime.verify_requests_only(&[&emitter]).unwrap();
}

#[test]
fn disconnect_reversibility() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let recorder = Handle::new(Recorder::default());

    runtime
        .connect(&emitter, &recorder, ConnectOptions::NONE)
        .unwrap();
    assert!(runtime
        .disconnect(&recorder, &emitter, ConnectOptions::NONE)
        .unwrap());
    assert!(!emitter.out.is_connected());

    match runtime.verify(&[&emitter]) {
        Err(ConnectError::PortsNotConnected(ports)) => {
            assert_eq!(ports, vec![emitter.out.descriptor()]);
        }
        other => panic!("unexpected verification result: {:?}", other),
    }

    // Removing a non-existent binding is a no-op.
    assert!(!runtime
        .disconnect_directed(&emitter, &recorder, ConnectOptions::NONE)
        .unwrap());

    // Triggering an unconnected port does nothing.
    emitter.out.trigger(1);
    assert!(recorder.recorded().is_empty());
}

#[test]
fn disconnect_removes_one_subscriber() {
    let runtime = Runtime::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let emitter = Handle::new(Emitter::default());
    let c1 = Handle::new(Tagger {
        tag: "c1",
        log: log.clone(),
    });
    let c2 = Handle::new(Tagger {
        tag: "c2",
        log: log.clone(),
    });

    runtime
        .connect(&emitter, &c1, ConnectOptions::NONE)
        .unwrap();
    runtime
        .connect(&emitter, &c2, ConnectOption::ForceConnectEventPorts)
        .unwrap();
    runtime
        .disconnect(&emitter, &c1, ConnectOptions::NONE)
        .unwrap();

    assert!(emitter.out.is_connected());
    emitter.out.trigger(5);
    assert_eq!(*log.lock().unwrap(), vec![("c2", 5)]);
}

#[test]
fn event_multicast_override() {
    let runtime = Runtime::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let emitter = Handle::new(Emitter::default());
    let c1 = Handle::new(Tagger {
        tag: "c1",
        log: log.clone(),
    });
    let c2 = Handle::new(Tagger {
        tag: "c2",
        log: log.clone(),
    });

    assert!(runtime
        .connect(&emitter, &c1, ConnectOptions::NONE)
        .unwrap());
    assert!(!runtime
        .connect(&emitter, &c2, ConnectOptions::NONE)
        .unwrap());
    emitter.out.trigger(1);
    assert_eq!(*log.lock().unwrap(), vec![("c1", 1)]);

    assert!(runtime
        .connect(&emitter, &c2, ConnectOption::ForceConnectEventPorts)
        .unwrap());
    emitter.out.trigger(2);
    assert_eq!(
        *log.lock().unwrap(),
        vec![("c1", 1), ("c1", 2), ("c2", 2)]
    );
}

#[test]
fn request_call_semantics() {
    let runtime = Runtime::new();
    let client = Handle::new(Client::default());
    let a = Handle::new(Server { prefix: "a" });
    let b = Handle::new(Server { prefix: "b" });

    assert!(matches!(
        client.query.call(0),
        Err(CallError::NotConnected(_))
    ));

    assert!(runtime.connect(&client, &a, ConnectOptions::NONE).unwrap());
    assert_eq!(client.query.call(1).as_deref(), Ok("a1"));

    // Neither a bare reconnection nor an event-only override rebinds.
    assert!(!runtime.connect(&client, &b, ConnectOptions::NONE).unwrap());
    assert!(!runtime
        .connect(&client, &b, ConnectOption::ForceConnectEventPorts)
        .unwrap());
    assert_eq!(client.query.call(2).as_deref(), Ok("a2"));

    assert!(runtime
        .connect(&client, &b, ConnectOption::ForceConnectAll)
        .unwrap());
    assert_eq!(client.query.call(3).as_deref(), Ok("b3"));

    // The replaced handler is no longer bound.
    assert!(!runtime
        .disconnect(&client, &a, ConnectOptions::NONE)
        .unwrap());
    assert!(runtime
        .disconnect(&client, &b, ConnectOptions::NONE)
        .unwrap());
    match client.query.call(4) {
        Err(CallError::NotConnected(port)) => {
            assert_eq!(port.owner(), Some(client.info()));
            assert_eq!(port.name(), "query");
        }
        other => panic!("unexpected call result: {:?}", other),
    }
}

#[test]
fn sinks_are_materialized_on_connection() {
    let runtime = Runtime::new();
    let emitter = Handle::new(Emitter::default());
    let buffers = Handle::new(Buffers::default());
    let stack = Handle::new(Stack::default());

    assert!(!buffers.queue.is_materialized());
    runtime
        .connect(&emitter, &buffers, ConnectOptions::NONE)
        .unwrap();
    assert!(buffers.queue.is_materialized());

    runtime
        .connect(&emitter, &stack, ConnectOption::ForceConnectEventPorts)
        .unwrap();
    for v in 1..=3 {
        emitter.out.trigger(v);
    }

    assert_eq!(buffers.queue.pop(), Some(1));
    assert_eq!(buffers.queue.drain(), vec![2, 3]);
    assert_eq!(stack.stack.pop(), Some(3));
    assert_eq!(stack.stack.len(), 2);

    // Reconnection keeps the buffered events.
    runtime
        .disconnect(&emitter, &stack, ConnectOptions::NONE)
        .unwrap();
    runtime
        .connect(&emitter, &stack, ConnectOption::ForceConnectEventPorts)
        .unwrap();
    emitter.out.trigger(4);
    assert_eq!(stack.stack.drain(), vec![4, 2, 1]);
}

#[test]
fn directed_connection() {
    let runtime = Runtime::new();
    let echo = Handle::new(Echo::default());
    let texts = Handle::new(TextRecorder::default());
    let emitter = Handle::new(Emitter::default());

    assert!(runtime
        .connect_directed(&echo, &texts, ConnectOptions::NONE)
        .unwrap());
    assert!(runtime
        .connect_directed(&emitter, &echo, ConnectOptions::NONE)
        .unwrap());
    assert!(!texts.lengths.is_connected());

    emitter.out.trigger(12);
    assert_eq!(texts.texts.pop().as_deref(), Some("12"));
}
