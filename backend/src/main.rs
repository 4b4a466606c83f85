use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::future::join_all;
use hanger_core::config::SupportConfig;
use hanger_core::coordinator::{
    apply_placement, BatchReport, CoordinatorSettings, PipeRun, PlacementCoordinator, RecordedSupport,
    RecordingSink, SinkOutcome,
};
use hanger_core::element::ElementId;
use hanger_core::geometry::Aabb;
use hanger_core::scene::Scene;
use hanger_core::spec_table::SpecTable;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod protocol;
use protocol::{format_error, Command, PlaceCmd};

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Everything a placement run needs. Shared pieces are behind `Arc` so a run
/// can snapshot them without holding the lock.
#[derive(Default)]
struct Session {
    config: Option<SupportConfig>,
    table: Arc<SpecTable>,
    scene: Arc<Scene>,
}

// Application State
struct AppState {
    session: RwLock<Session>,
}

impl AppState {
    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Serialize)]
struct PipeSupports {
    pipe: ElementId,
    outcome: SinkOutcome,
    supports: Vec<RecordedSupport>,
}

#[derive(Serialize)]
struct PlacementUpdate {
    report: BatchReport,
    applied: Vec<PipeSupports>,
}

fn initial_session() -> Session {
    let mut session = Session::default();
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HANGER_CONFIG").ok());
    let Some(path) = path else {
        info!("No configuration given, waiting for LOAD_CONFIG");
        return session;
    };

    match SupportConfig::load(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path);
            if config.spec_file.is_some() {
                match config.load_spec_table() {
                    Ok(table) => session.table = Arc::new(table),
                    Err(e) => warn!("Spec table not loaded: {}", e),
                }
            }
            session.config = Some(config);
        }
        Err(e) => warn!("Configuration {} not loaded: {}", path, e),
    }
    session
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let shared_state = Arc::new(AppState {
        session: RwLock::new(initial_session()),
    });

    let app = Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let addr = std::env::var("HANGER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let addr: SocketAddr = match addr.parse() {
        Ok(a) => a,
        Err(e) => {
            warn!("Invalid HANGER_ADDR '{}' ({}), using {}", addr, e, DEFAULT_ADDR);
            SocketAddr::from(([127, 0, 0, 1], 3000))
        }
    };
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn root() -> String {
    format!("Hanger placement backend {}", hanger_core::version())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

fn scene_update(scene: &Scene) -> String {
    let json = serde_json::to_string(scene.elements()).unwrap_or("[]".into());
    format!("SCENE_UPDATE:{}", json)
}

fn config_update(config: &SupportConfig) -> String {
    let json = serde_json::to_string(config).unwrap_or("{}".into());
    format!("CONFIG_UPDATE:{}", json)
}

fn spec_update(table: &SpecTable) -> String {
    let json = serde_json::to_string(table.rules()).unwrap_or("[]".into());
    format!("SPEC_UPDATE:{}", json)
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("Client connected");

    // Send current session state
    let greeting = {
        let session = state.read();
        let mut frames = vec![spec_update(&session.table), scene_update(&session.scene)];
        if let Some(config) = &session.config {
            frames.push(config_update(config));
        }
        frames
    };
    for frame in greeting {
        if socket.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }

    while let Some(msg) = socket.recv().await {
        let msg = if let Ok(msg) = msg {
            msg
        } else {
            return;
        };

        let Message::Text(text) = msg else {
            continue;
        };
        info!("Received message: {}", text.lines().next().unwrap_or_default());

        let reply = match Command::parse(&text) {
            Ok(cmd) => execute(cmd, &state).await,
            Err(e) => {
                warn!("Rejected message: {}", e);
                format_error(e.code(), &e.to_string(), "warning")
            }
        };
        if socket.send(Message::Text(reply)).await.is_err() {
            return;
        }
    }
}

async fn execute(cmd: Command, state: &Arc<AppState>) -> String {
    match cmd {
        Command::Place(place) => place_batch(place, state).await,
        other => update_session(other, state),
    }
}

fn update_session(cmd: Command, state: &AppState) -> String {
    match cmd {
        Command::LoadConfig(text) => match SupportConfig::parse(&text) {
            Ok(config) => {
                info!("Configuration loaded: offset {} mm, min spacing {} mm", config.offset, config.min_spacing);
                let reply = config_update(&config);
                state.write().config = Some(config);
                reply
            }
            Err(e) => {
                warn!("Configuration rejected: {}", e);
                format_error("CONFIG_INVALID", &e.to_string(), "error")
            }
        },
        Command::LoadSpec(text) => match SpecTable::parse(&text) {
            Ok(table) => {
                info!("Spec table loaded with {} rules", table.len());
                let reply = spec_update(&table);
                state.write().table = Arc::new(table);
                reply
            }
            Err(e) => {
                warn!("Spec table rejected: {}", e);
                format_error("SPEC_INVALID", &e.to_string(), "error")
            }
        },
        Command::SceneAdd(s) => {
            let mut session = state.write();
            let id = Arc::make_mut(&mut session.scene).add_structure(&s.name, Aabb::new(s.min, s.max));
            info!("Added structure '{}' ({})", s.name, id);
            scene_update(&session.scene)
        }
        Command::SceneRemove(id) => {
            let mut session = state.write();
            if Arc::make_mut(&mut session.scene).remove(id).is_some() {
                info!("Removed scene element {}", id);
                scene_update(&session.scene)
            } else {
                warn!("Scene element {} not found", id);
                format_error("NOT_FOUND", &format!("Scene element {} not found", id), "warning")
            }
        }
        Command::SceneClear => {
            let mut session = state.write();
            Arc::make_mut(&mut session.scene).clear();
            info!("Scene cleared");
            scene_update(&session.scene)
        }
        Command::Place(_) => format_error("UNSUPPORTED", "PLACE runs asynchronously", "error"),
    }
}

/// Copy of the session scene with the batch's pipe bodies registered. The
/// session scene itself is left untouched.
fn batch_scene(scene: &Arc<Scene>, pipes: &[PipeRun]) -> Arc<Scene> {
    let mut batch = Scene::clone(scene);
    for pipe in pipes {
        batch.add_pipe_run(pipe.id, &pipe.centerline, pipe.diameter / 2.0);
    }
    Arc::new(batch)
}

/// Place each pipe on the blocking pool. Pipes are independent and share
/// only read-only snapshots of the session.
async fn place_batch(place: PlaceCmd, state: &Arc<AppState>) -> String {
    let (config, table, scene) = {
        let session = state.read();
        let Some(config) = session.config.clone() else {
            return format_error("NO_CONFIG", "Load a configuration before placing", "error");
        };
        (config, session.table.clone(), session.scene.clone())
    };
    let scene = if place.register_pipes {
        batch_scene(&scene, &place.pipes)
    } else {
        scene
    };

    let settings = CoordinatorSettings::from_config(&config);
    let budget = config.query_budget();
    info!("Placing supports on {} pipes", place.pipes.len());

    let tasks = place.pipes.into_iter().map(|pipe: PipeRun| {
        let table = table.clone();
        let scene = scene.clone();
        let budget = budget.clone();
        tokio::task::spawn_blocking(move || {
            let coordinator = PlacementCoordinator::new(&*table, &*scene, settings);
            let result = coordinator.place(&pipe, &budget);
            let applied = result.as_ref().ok().map(|placement| {
                let mut sink = RecordingSink::new();
                let outcome = apply_placement(&mut sink, placement);
                PipeSupports {
                    pipe: pipe.id,
                    outcome,
                    supports: sink.supports,
                }
            });
            (result, applied)
        })
    });

    let mut update = PlacementUpdate {
        report: BatchReport::default(),
        applied: Vec::new(),
    };
    for joined in join_all(tasks).await {
        match joined {
            Ok((result, applied)) => {
                update.report.push(result);
                update.applied.extend(applied);
            }
            Err(e) => warn!("Placement task aborted: {}", e),
        }
    }
    info!(
        "Placement done: {} placed, {} failed, {} supports",
        update.report.placed.len(),
        update.report.failed.len(),
        update.report.support_count()
    );

    match serde_json::to_string(&update) {
        Ok(json) => format!("PLACEMENT_UPDATE:{}", json),
        Err(e) => format_error("SERIALIZE_FAILED", &e.to_string(), "error"),
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let session = state.read();
    Json(json!({
        "configured": session.config.is_some(),
        "rules": session.table.len(),
        "scene": session.scene.len(),
    }))
}
