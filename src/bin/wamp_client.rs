//! WAMP remote-control client of the PLC runtime
//!
//! Joins the configured realm, exposes the PLC procedures backed by an
//! in-memory demo runtime and publishes status changes.
//!
//! Usage:
//!   cargo run --bin wamp-client
//!
//! Environment variables:
//!   WAMP_CONFIG_PATH - configuration file (default: wampconf.json)
//!   WAMP_SECRET_PATH - wampcra secret (default: wamp.secret)
//!   RUST_LOG         - log filter (default: info)

use anyhow::Result;
use parking_lot::RwLock;
use plc_wamp::{CallError, CapabilityRegistry, Catalog, Payload, Registry, WampController};
use plc_wamp_runtime::bin_common::{
    init_tracing_with_level, load_wamp_config, parse_args, BinaryRunner, ConfigType, RunConfig,
    ShutdownManager,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// In-memory stand-in for the PLC runtime
#[derive(Default)]
struct DemoRuntime {
    status: RwLock<&'static str>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    trace_variables: RwLock<Vec<Value>>,
    logs: RwLock<Vec<String>>,
}

impl DemoRuntime {
    fn new() -> Arc<Self> {
        let runtime = Self::default();
        *runtime.status.write() = "Stopped";
        Arc::new(runtime)
    }

    fn status(&self) -> &'static str {
        *self.status.read()
    }

    fn set_status(&self, status: &'static str) -> bool {
        let mut current = self.status.write();
        if *current == status {
            return false;
        }
        *current = status;
        self.logs.write().push(format!("PLC {}", status));
        true
    }

    fn seed_blob(&self, payload: &Payload) -> String {
        let mut blobs = self.blobs.write();
        let id = format!("blob{}", blobs.len());
        let seed = payload.first().and_then(Value::as_str).unwrap_or_default();
        blobs.insert(id.clone(), seed.as_bytes().to_vec());
        id
    }

    fn append_chunk(&self, payload: &Payload) -> Result<String, CallError> {
        let chunk = payload.args.first().and_then(Value::as_str).unwrap_or_default();
        let id = payload
            .args
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| CallError::runtime("missing blob id"))?;
        let mut blobs = self.blobs.write();
        let blob = blobs
            .get_mut(id)
            .ok_or_else(|| CallError::runtime(format!("unknown blob {}", id)))?;
        blob.extend_from_slice(chunk.as_bytes());
        Ok(id.to_string())
    }
}

/// Register every PLC procedure against `runtime`
fn demo_capabilities(runtime: &Arc<DemoRuntime>, id: &str) -> CapabilityRegistry {
    let mut capabilities = CapabilityRegistry::new();

    let rt = Arc::clone(runtime);
    capabilities.register_fn("StartPLC", move |_payload| {
        let rt = Arc::clone(&rt);
        async move { Ok(Payload::from(json!(rt.set_status("Started")))) }
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("StopPLC", move |_payload| {
        let rt = Arc::clone(&rt);
        async move { Ok(Payload::from(json!(rt.set_status("Stopped")))) }
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("GetPLCstatus", move |_payload| {
        let rt = Arc::clone(&rt);
        async move {
            let count = rt.logs.read().len();
            Ok(Payload::new(vec![json!(rt.status()), json!([count, 0, 0, 0])], Default::default()))
        }
    });
    let plc_id = id.to_string();
    capabilities.register_fn("GetPLCID", move |_payload| {
        let plc_id = plc_id.clone();
        async move { Ok(Payload::new(vec![json!(plc_id), json!("")], Default::default())) }
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("SeedBlob", move |payload| {
        let rt = Arc::clone(&rt);
        async move { Ok(Payload::from(json!(rt.seed_blob(&payload)))) }
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("AppendChunkToBlob", move |payload| {
        let rt = Arc::clone(&rt);
        async move { rt.append_chunk(&payload).map(|id| Payload::from(json!(id))) }
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("PurgeBlobs", move |_payload| {
        let rt = Arc::clone(&rt);
        async move {
            rt.blobs.write().clear();
            Ok(Payload::empty())
        }
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("NewPLC", move |_payload| {
        let rt = Arc::clone(&rt);
        async move {
            rt.set_status("Stopped");
            rt.logs.write().push("New PLC transferred".to_string());
            Ok(Payload::from(json!(true)))
        }
    });
    capabilities.register_fn("RepairPLC", |_payload| async { Ok(Payload::from(json!(true))) });
    capabilities.register_fn("MatchMD5", |_payload| async { Ok(Payload::from(json!(false))) });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("SetTraceVariablesList", move |payload| {
        let rt = Arc::clone(&rt);
        async move {
            let variables = match payload.first() {
                Some(Value::Array(variables)) => variables.clone(),
                _ => Vec::new(),
            };
            *rt.trace_variables.write() = variables;
            Ok(Payload::empty())
        }
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("GetTraceVariables", move |_payload| {
        let rt = Arc::clone(&rt);
        async move { Ok(Payload::new(vec![json!(rt.status()), json!([])], Default::default())) }
    });
    capabilities.register_fn("RemoteExec", |_payload| async {
        Err(CallError::new("plc.error.not_supported", "remote execution is disabled"))
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("GetLogMessage", move |payload| {
        let rt = Arc::clone(&rt);
        async move {
            let index = payload.first().and_then(Value::as_u64).unwrap_or_default() as usize;
            Ok(Payload::from(json!(rt.logs.read().get(index))))
        }
    });
    let rt = Arc::clone(runtime);
    capabilities.register_fn("ResetLogCount", move |_payload| {
        let rt = Arc::clone(&rt);
        async move {
            rt.logs.write().clear();
            Ok(Payload::empty())
        }
    });

    capabilities
}

struct WampClientApp {
    config: RunConfig,
    controller: Arc<WampController>,
    runtime: Arc<DemoRuntime>,
    shutdown: ShutdownManager,
    wamp_config: Option<plc_wamp::WampConfig>,
}

impl BinaryRunner for WampClientApp {
    async fn run(&mut self) -> Result<()> {
        let Some(wamp_config) = self.wamp_config.take() else {
            return Ok(());
        };
        if !self.controller.start(wamp_config)? {
            warn!("WAMP client not started, nothing to do");
            return Ok(());
        }

        let mut published_status = "";
        while self.shutdown.is_running() {
            self.shutdown
                .interruptible_sleep(self.config.heartbeat_interval())
                .await;

            let status = self.runtime.status();
            if status != published_status
                && self.controller.publish_with_own_id("Updated", json!(status))
            {
                published_status = status;
            }
            info!("WAMP status: {}", self.controller.status());
        }

        self.controller.shutdown().await;
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv::dotenv().ok();

    let args = parse_args();
    let level = args.first().map(String::as_str).unwrap_or("info");
    init_tracing_with_level(level);

    let wamp_config = load_wamp_config(ConfigType::WampConfig, ConfigType::WampSecret)?;
    let validated = wamp_config.validate()?;
    validated.log();

    let runtime = DemoRuntime::new();
    let mut catalog = Catalog::plc_runtime();
    catalog.on_join(|session| {
        info!("Exposing PLC procedures as {}.*", session.id());
        Ok(())
    });
    let registry = Registry::new(catalog, demo_capabilities(&runtime, &validated.id));

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let mut app = WampClientApp {
        config: RunConfig::new("wamp-client").with_heartbeat(10),
        controller: Arc::new(WampController::new(registry)),
        runtime,
        shutdown,
        wamp_config: Some(wamp_config),
    };
    app.execute().await
}
