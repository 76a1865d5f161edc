//! 仪器中继服务：装配存储、会话与输出，并提供运维 HTTP API。

mod handlers;
mod routes;
mod utils;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use domain::SystemClock;
use relay_config::AppConfig;
use relay_output::{OutputError, OutputManager, PluginRegistry};
use relay_protocol::{PortConnector, TransportConnector};
use relay_session::{PortSession, SessionRegistry};
use relay_storage::{
    InMemoryInstrumentStore, InMemoryOutputStore, InstrumentStore, OutputStore,
    PgInstrumentStore, PgOutputStore, StorageError, connect_pool, load_seed,
};
use relay_telemetry::{init_tracing, new_request_ids};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub instruments: Arc<dyn InstrumentStore>,
    pub sessions: Arc<SessionRegistry>,
    pub outputs: OutputManager,
    /// 打开端口时是否同时启用输出
    pub outputs_enabled: bool,
}

impl AppState {
    pub fn new(
        instruments: Arc<dyn InstrumentStore>,
        output_store: Arc<dyn OutputStore>,
        connector: Arc<dyn TransportConnector>,
        plugins: PluginRegistry,
        outputs_enabled: bool,
    ) -> Self {
        let outputs = OutputManager::new(output_store, plugins, Arc::new(SystemClock));
        let sessions = Arc::new(SessionRegistry::new(Arc::clone(&instruments), connector));
        Self {
            instruments,
            sessions,
            outputs,
            outputs_enabled,
        }
    }

    /// 按配置为会话启用输出，返回绑定数量。
    pub async fn enable_outputs(&self, session: &Arc<PortSession>) -> Result<usize, OutputError> {
        if !self.outputs_enabled {
            return Ok(0);
        }
        self.outputs.enable_outputs(session.clone()).await
    }

    /// 启动时打开全部仪器；单台失败只记录日志。
    pub async fn open_all(&self) -> Result<(), StorageError> {
        for instrument in self.instruments.list_instruments().await? {
            let session = self.sessions.session(&instrument.instrument_id);
            if let Err(err) = session.open().await {
                warn!(
                    target: "relay.api",
                    instrument_id = %instrument.instrument_id,
                    error = %err,
                    "auto_open_failed"
                );
                continue;
            }
            if let Err(err) = self.enable_outputs(&session).await {
                warn!(
                    target: "relay.api",
                    instrument_id = %instrument.instrument_id,
                    error = %err,
                    "auto_enable_outputs_failed"
                );
            }
        }
        Ok(())
    }

    /// 摘除全部输出并关闭全部会话
    pub fn shutdown(&self) {
        for session in self.sessions.sessions() {
            self.outputs.disable_outputs(session.instrument_id());
            session.close();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let (instruments, output_store) = build_stores(&config).await?;
    let state = AppState::new(
        instruments,
        output_store,
        Arc::new(PortConnector),
        PluginRegistry::with_defaults(),
        config.outputs_enabled,
    );

    if config.auto_open {
        state.open_all().await?;
    }

    let app = build_app(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "relay.api", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown();
    info!(target: "relay.api", "relay_stopped");
    Ok(())
}

/// 配置了数据库时使用 Postgres，否则使用内存存储（可选种子文件）。
async fn build_stores(
    config: &AppConfig,
) -> Result<(Arc<dyn InstrumentStore>, Arc<dyn OutputStore>), StorageError> {
    if let Some(database_url) = &config.database_url {
        let pool = connect_pool(database_url).await?;
        info!(target: "relay.api", "storage_postgres");
        return Ok((
            Arc::new(PgInstrumentStore::new(pool.clone())),
            Arc::new(PgOutputStore::new(pool)),
        ));
    }

    let (instruments, outputs) = match &config.seed_file {
        Some(path) => {
            info!(target: "relay.api", seed_file = %path, "storage_in_memory_seeded");
            load_seed(path)?.into_stores()?
        }
        None => {
            warn!(target: "relay.api", "storage_in_memory_empty");
            (InMemoryInstrumentStore::new(), InMemoryOutputStore::new())
        }
    };
    Ok((Arc::new(instruments), Arc::new(outputs)))
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_api_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target: "relay.api", error = %err, "shutdown_signal_failed");
    }
    info!(target: "relay.api", "shutdown_requested");
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    // 生成 request_id 与 trace_id，并注入请求扩展与日志
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::AppState;
    use relay_output::{OutputError, OutputPlugin, PluginRegistry};
    use relay_protocol::MemoryConnector;
    use relay_storage::{
        InMemoryInstrumentStore, InMemoryOutputStore, InstrumentRecord, OutputRecord,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// 记录发送内容的测试插件
    #[derive(Default)]
    pub struct Captured {
        pub records: Mutex<Vec<domain::Record>>,
    }

    struct CapturePlugin(Arc<Captured>);

    #[async_trait::async_trait]
    impl OutputPlugin for CapturePlugin {
        async fn send_data(&self, record: &domain::Record) -> Result<(), OutputError> {
            self.0.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    pub struct Harness {
        pub state: AppState,
        pub connector: Arc<MemoryConnector>,
        pub captured: Arc<Captured>,
    }

    pub fn harness() -> Harness {
        let instruments = InMemoryInstrumentStore::new();
        instruments
            .insert_instrument(InstrumentRecord {
                instrument_id: "geiger-1".to_string(),
                name: "Lab counter".to_string(),
                instrument_type: "usb_geiger".to_string(),
                port_config: json!({ "type": "serial", "path": "/dev/ttyUSB0" }),
            })
            .expect("insert instrument");
        let outputs = InMemoryOutputStore::new();
        outputs
            .insert_output(OutputRecord {
                output_id: "out-1".to_string(),
                instrument_id: "geiger-1".to_string(),
                enabled: true,
                output_type: "capture".to_string(),
                config: json!({
                    "alarm1": { "field": "cpm.value", "comparator": "moreeq", "level": 100 },
                    "alarm2": { "field": "_unused" },
                    "alrmbool": "or",
                    "alrmfrequency": 60,
                    "frequency": 0
                }),
            })
            .expect("insert output");

        let captured = Arc::new(Captured::default());
        let mut plugins = PluginRegistry::new();
        let sink = captured.clone();
        plugins.register("capture", move |_record: &OutputRecord| {
            let plugin: Arc<dyn OutputPlugin> = Arc::new(CapturePlugin(sink.clone()));
            Ok(plugin)
        });

        let connector = Arc::new(MemoryConnector::new());
        let state = AppState::new(
            Arc::new(instruments),
            Arc::new(outputs),
            connector.clone(),
            plugins,
            true,
        );
        Harness {
            state,
            connector,
            captured,
        }
    }

    pub async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}
