use anyhow::Result;
use eventbus::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// A request entering the system.
#[derive(Debug)]
struct RequestReceived {
    path: String,
    propagation: Propagation,
}

/// A request on an admin route. Satisfies `RequestReceived` as well.
#[derive(Debug)]
struct AdminRequestReceived {
    inner: RequestReceived,
    user: String,
}

impl Event for RequestReceived {
    fn event_type(&self) -> EventType {
        EventType::from_static("request.received")
    }

    fn is_propagation_stopped(&self) -> bool {
        self.propagation.is_stopped()
    }
}

impl Event for AdminRequestReceived {
    fn event_type(&self) -> EventType {
        EventType::from_static("request.admin")
    }

    fn ancestors(&self) -> Vec<EventType> {
        vec![EventType::from_static("request.received")]
    }

    fn is_propagation_stopped(&self) -> bool {
        self.inner.propagation.is_stopped()
    }
}

fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    // 2. Load the configuration. The first argument may name a TOML file.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = EventBusConfig::load(config_path.as_deref())?;

    // 3. Create the bus, preloading declared listeners as loggers.
    let bus = EventBus::from_config(config, |decl| {
        let label = decl.label.clone().unwrap_or_else(|| "declared".to_string());
        Listener::new(move |event| info!("[{}] <= {}", label, event.event_type()))
    })?;

    // 4. Register listeners to exercise priorities, pivots and inheritance.
    register_demo_listeners(&bus)?;

    // 5. Dispatch a plain and an inherited event.
    let plain = bus.dispatch(RequestReceived {
        path: "/index".to_string(),
        propagation: Propagation::default(),
    })?;
    info!("Plain request to {} delivered.", plain.path);

    let admin = bus.dispatch(AdminRequestReceived {
        inner: RequestReceived {
            path: "/admin".to_string(),
            propagation: Propagation::default(),
        },
        user: "root".to_string(),
    })?;
    if admin.is_propagation_stopped() {
        warn!("Admin request by '{}' was rejected.", admin.user);
    }

    // 6. Show the cycle detector at work.
    bus.on("demo.cycle", |_| {}, ListenerOptions::new().with_id("x").before("y"))?;
    bus.on("demo.cycle", |_| {}, ListenerOptions::new().with_id("y").after("x"))?;
    if let Err(err) = bus.dispatch(DynamicEvent::new("demo.cycle")) {
        warn!("{}", err);
    }

    Ok(())
}

/// Registers demo listeners with the bus to show the resolution rules.
fn register_demo_listeners(bus: &EventBus) -> Result<()> {
    let counter = Arc::new(AtomicU32::new(0));

    // --- Plain listeners, ordered by priority ---
    let seen = counter.clone();
    bus.on(
        "request.received",
        move |_| {
            let n = seen.fetch_add(1, Ordering::Relaxed) + 1;
            info!("[METRICS] Requests seen: {}", n);
        },
        ListenerOptions::new().with_id("metrics").with_priority(-100),
    )?;
    bus.add_listener(
        "request.received",
        Listener::typed(|event: &mut RequestReceived| info!("[ROUTER] Routing {}", event.path)),
        ListenerOptions::new().with_id("router"),
    )?;

    // --- Pivots: run right before the router, whatever its priority ---
    bus.on(
        "request.received",
        |event| info!("[TRACE] Start of {}", event.event_type()),
        ListenerOptions::new().with_id("trace").before("router"),
    )?;

    // --- Inherited: admin listeners interleave with the supertype's ---
    bus.add_listener(
        "request.admin",
        Listener::typed(|event: &mut AdminRequestReceived| {
            if event.user != "admin" {
                info!("[AUTH] '{}' is not an admin, stopping.", event.user);
                event.inner.propagation.stop();
            }
        }),
        ListenerOptions::new().with_id("auth").after("trace"),
    )?;

    // --- Lazy subscription: the handler object is built per delivery ---
    bus.lazy_subscription(|| AuditLog {
        sink: "stdout".to_string(),
    })
    .subscribe(
        ["request.received", "request.admin"],
        AuditLog::record,
        ListenerOptions::new().with_priority(100),
    )?;

    Ok(())
}

struct AuditLog {
    sink: String,
}

impl AuditLog {
    fn record(&self, event: &mut dyn Event) {
        info!("[AUDIT:{}] {}", self.sink, event.event_type());
    }
}
