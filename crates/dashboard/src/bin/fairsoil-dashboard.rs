#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use fairsoil_dashboard::{
    ActionOutcome, AppiStatsView, CovenantRow, DashboardRuntime, RuntimeError, StatusView,
    TrailEntryView, UserIntent, help_text, init_logging, parse_dashboard_config, redact_rpc_url,
    world_id_proxy,
};
use fairsoil_gateway::GatewayError;
use fairsoil_trail::{AuditFilter, TrailQuery, csv_file_name};
use fairsoil_types::{ResourceView, TemplateView};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::time::interval;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    runtime: Arc<DashboardRuntime>,
}

#[derive(Debug, Default, Deserialize)]
struct TrailParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    filter: String,
}

impl TrailParams {
    fn query(&self) -> Result<TrailQuery, (StatusCode, String)> {
        let filter = self
            .filter
            .parse::<AuditFilter>()
            .map_err(|error| (StatusCode::BAD_REQUEST, error))?;
        Ok(TrailQuery::new(filter, self.q.clone()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct AppiParams {
    #[serde(default)]
    day: String,
    #[serde(default)]
    categories: String,
}

#[derive(Debug, Deserialize)]
struct TagsBody {
    #[serde(default)]
    tags: String,
}

#[derive(Debug, Serialize)]
struct TagsPayload {
    covenant_id: u64,
    tags: Option<String>,
}

#[derive(Debug, Serialize)]
struct TrailPayload {
    filter: AuditFilter,
    items: Vec<TrailEntryView>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = match parse_dashboard_config() {
        Ok(config) => config,
        Err(message) if message == help_text() => {
            println!("{message}");
            return Ok(());
        }
        Err(message) => return Err(message),
    };
    init_logging(config.log_format)?;

    let runtime = Arc::new(DashboardRuntime::new(&config).map_err(|error| error.to_string())?);

    let app = Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/status", get(status))
        .route("/api/trail", get(trail))
        .route("/api/trail.csv", get(trail_csv))
        .route("/api/covenants", get(covenants))
        .route("/api/templates", get(templates))
        .route("/api/resources/{name}", get(resource))
        .route("/api/appi/stats", get(appi_stats))
        .route("/api/actions", post(submit_action))
        .route("/api/tags/{covenant_id}", post(set_tags))
        .route("/api/banner/dismiss", post(dismiss_banner))
        .route("/api/worldid/verify", post(world_id_verify))
        .with_state(AppState {
            runtime: Arc::clone(&runtime),
        });

    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(|error| format!("failed to bind dashboard endpoint {}: {error}", config.bind))?;

    println!("fairsoil dashboard starting");
    println!("dashboard: http://{}", config.bind);
    println!("rpc_url: {}", redact_rpc_url(&config.rpc_url));
    match config.account {
        Some(account) => println!("account: {account}"),
        None => println!("account: none (read-only)"),
    }
    println!("poll_ms: {}", config.poll_ms);
    if let Some(path) = &config.tags_path {
        println!("tags_path: {}", path.display());
    }

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .map_err(|error| format!("dashboard server failed: {error}"))
    });

    if let Err(error) = runtime.refresh_snapshot().await {
        warn!(%error, "initial snapshot refresh failed");
    }
    match runtime.reload_trail().await {
        Ok(items) => info!(items, "initial trail loaded"),
        Err(error) => warn!(%error, "initial trail load failed"),
    }

    let mut poll_ticker = interval(config.poll_interval());
    let mut snapshot_ticker = interval(config.snapshot_refresh_interval());
    poll_ticker.tick().await;
    snapshot_ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("received shutdown signal");
                break;
            }
            _ = poll_ticker.tick() => {
                if let Err(error) = runtime.poll_trail().await {
                    warn!(%error, "live trail poll failed");
                }
            }
            _ = snapshot_ticker.tick() => {
                if let Err(error) = runtime.refresh_snapshot().await {
                    warn!(%error, "snapshot refresh failed");
                }
            }
        }
    }

    server.abort();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => eprintln!("warning: dashboard server exited with error: {error}"),
        Err(error) if error.is_cancelled() => {}
        Err(error) => eprintln!("warning: dashboard server task join error: {error}"),
    }
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn status(State(state): State<AppState>) -> Json<StatusView> {
    Json(state.runtime.status(Instant::now()))
}

async fn trail(
    State(state): State<AppState>,
    Query(params): Query<TrailParams>,
) -> Result<Json<TrailPayload>, (StatusCode, String)> {
    let query = params.query()?;
    Ok(Json(TrailPayload {
        filter: query.filter,
        items: state.runtime.trail(&query, unix_now()),
    }))
}

async fn trail_csv(
    State(state): State<AppState>,
    Query(params): Query<TrailParams>,
) -> Result<Response, (StatusCode, String)> {
    let query = params.query()?;
    let body = state.runtime.trail_csv(&query);
    let disposition = format!("attachment; filename=\"{}\"", csv_file_name(unix_now_millis()));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv;charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn covenants(
    State(state): State<AppState>,
) -> Result<Json<Vec<CovenantRow>>, (StatusCode, String)> {
    state.runtime.covenants().await.map(Json).map_err(gateway_error)
}

async fn templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<TemplateView>>, (StatusCode, String)> {
    state.runtime.templates().await.map(Json).map_err(gateway_error)
}

async fn resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ResourceView>, (StatusCode, String)> {
    state.runtime.resource(&name).await.map(Json).map_err(runtime_error)
}

async fn appi_stats(
    State(state): State<AppState>,
    Query(params): Query<AppiParams>,
) -> Result<Json<AppiStatsView>, (StatusCode, String)> {
    state
        .runtime
        .appi_stats(&params.day, &params.categories)
        .await
        .map(Json)
        .map_err(runtime_error)
}

async fn submit_action(
    State(state): State<AppState>,
    Json(intent): Json<UserIntent>,
) -> Json<ActionOutcome> {
    Json(state.runtime.submit(intent).await)
}

async fn set_tags(
    State(state): State<AppState>,
    Path(covenant_id): Path<u64>,
    Json(body): Json<TagsBody>,
) -> Result<Json<TagsPayload>, (StatusCode, String)> {
    let tags = state
        .runtime
        .set_tags(covenant_id, &body.tags)
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;
    Ok(Json(TagsPayload { covenant_id, tags }))
}

async fn dismiss_banner(State(state): State<AppState>) -> impl IntoResponse {
    state.runtime.dismiss_banner();
    StatusCode::NO_CONTENT
}

async fn world_id_verify(body: Bytes) -> Response {
    let (status, payload) = world_id_proxy(&body);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(payload)).into_response()
}

fn gateway_error(error: GatewayError) -> (StatusCode, String) {
    let status = match error {
        GatewayError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, error.to_string())
}

fn runtime_error(error: RuntimeError) -> (StatusCode, String) {
    match error {
        RuntimeError::Validation(error) => (StatusCode::BAD_REQUEST, error.to_string()),
        RuntimeError::Gateway(error) => gateway_error(error),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

fn unix_now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>FairSoil Dashboard</title>
  <style>
    :root {
      --bg: #f7f5ef;
      --panel: #ffffff;
      --ink: #111827;
      --muted: #6b7280;
      --accent: #0f766e;
      --warn: #b45309;
      --danger: #b91c1c;
      --border: #d1d5db;
      --mono: ui-monospace, SFMono-Regular, Menlo, Monaco, Consolas, monospace;
      --sans: "IBM Plex Sans", "Avenir Next", "Segoe UI", sans-serif;
    }
    body {
      margin: 0;
      background: radial-gradient(1200px 500px at 85% -20%, #bbf7d0 0%, transparent 55%), var(--bg);
      color: var(--ink);
      font-family: var(--sans);
    }
    .wrap { max-width: 1080px; margin: 0 auto; padding: 24px; }
    .title { margin: 0 0 8px 0; font-size: 32px; }
    .subtitle { margin: 0 0 20px 0; color: var(--muted); }
    .banner { display: none; border-radius: 10px; padding: 10px 14px; margin-bottom: 12px; }
    .banner.error { display: block; background: #fee2e2; color: var(--danger); }
    .banner.notice, .banner.warning { display: block; background: #fef3c7; color: var(--warn); }
    .banner.success { display: block; background: #ccfbf1; color: var(--accent); }
    .banner button { float: right; border: 0; background: transparent; cursor: pointer; }
    .grid {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
      gap: 12px;
      margin-bottom: 16px;
    }
    .card {
      background: var(--panel);
      border: 1px solid var(--border);
      border-radius: 12px;
      padding: 14px 16px;
      box-shadow: 0 4px 10px rgba(17, 24, 39, 0.05);
    }
    .card h3 {
      margin: 0 0 8px 0;
      font-size: 12px;
      color: var(--muted);
      text-transform: uppercase;
      letter-spacing: 0.08em;
    }
    .value { font-size: 22px; font-weight: 650; }
    section { margin-bottom: 16px; }
    .toolbar { display: flex; gap: 8px; margin-bottom: 12px; flex-wrap: wrap; }
    .toolbar input, .toolbar select, .toolbar button, .toolbar a {
      font: inherit; padding: 6px 10px; border: 1px solid var(--border); border-radius: 8px;
      background: var(--panel); color: var(--ink); text-decoration: none;
    }
    .list { list-style: none; margin: 0; padding: 0; display: grid; gap: 8px; }
    .item {
      border: 1px solid #e5e7eb; border-radius: 10px; padding: 10px 12px;
      background: #fafafa; font-size: 14px;
    }
    .item .meta { color: var(--muted); font-family: var(--mono); font-size: 12px; }
    .tx { font-family: var(--mono); font-size: 12px; color: var(--muted); }
  </style>
</head>
<body>
  <div class="wrap">
    <h1 class="title">FairSoil</h1>
    <p class="subtitle">Balances, work agreements and the on-chain audit trail.</p>

    <div class="banner" id="warning"></div>
    <div class="banner" id="banner"><button onclick="dismiss()">x</button><span id="bannerText"></span></div>

    <div class="grid">
      <div class="card"><h3>Token A</h3><div class="value" id="token_a_balance">--</div></div>
      <div class="card"><h3>Token B</h3><div class="value" id="token_b_balance">--</div></div>
      <div class="card"><h3>Token B unlocked</h3><div class="value" id="token_b_unlocked">--</div></div>
      <div class="card"><h3>Integrity</h3><div class="value" id="integrity_score">--</div></div>
      <div class="card"><h3>Daily bonus</h3><div class="value" id="daily_ubi_amount">--</div></div>
      <div class="card"><h3>Saved bonus</h3><div class="value" id="unclaimed_total">--</div></div>
      <div class="card"><h3>Reserves B</h3><div class="value" id="reserves_b">--</div></div>
      <div class="card"><h3>Block</h3><div class="value" id="block_number">--</div></div>
    </div>

    <section class="card">
      <h3>Actions</h3>
      <div class="toolbar">
        <button onclick="act({action:'claim_ubi'})">Claim bonus</button>
        <button onclick="act({action:'accrue_ubi'})">Accrue bonus</button>
        <button onclick="act({action:'verify_world_id'})">Verify World ID</button>
        <button onclick="act({action:'verify_zk_nfc'})">Verify ZK-NFC</button>
      </div>
      <div class="toolbar">
        <select id="preset">
          <option value="general">General</option><option value="micro">Micro</option>
          <option value="delivery">Delivery</option><option value="audit">Audit</option>
          <option value="urgent">Urgent</option><option value="education">Education</option>
        </select>
        <input id="worker" placeholder="worker 0x..." size="44" />
        <input id="reward" placeholder="reward" size="8" />
        <input id="tags" placeholder="tags" size="16" />
        <button onclick="createCovenant()">Create agreement</button>
      </div>
      <div class="tx" id="tx"></div>
    </section>

    <section class="card">
      <h3>Work agreements</h3>
      <ul class="list" id="covenants"></ul>
    </section>

    <section class="card">
      <h3>Audit trail</h3>
      <div class="toolbar">
        <input id="q" placeholder="search title, body or tags" oninput="loadTrail()" />
        <select id="filter" onchange="loadTrail()">
          <option value="all">All</option><option value="treasury">Treasury</option>
          <option value="covenant">Agreements</option><option value="dispute">Support</option>
          <option value="ubi">Bonus</option>
        </select>
        <a id="csv" href="/api/trail.csv">Export CSV</a>
      </div>
      <ul class="list" id="trail"></ul>
    </section>
  </div>

  <script>
    function text(id, value) {
      const el = document.getElementById(id);
      if (el) el.textContent = value;
    }

    function item(title, meta) {
      const li = document.createElement('li');
      li.className = 'item';
      li.textContent = title;
      if (meta) {
        const div = document.createElement('div');
        div.className = 'meta';
        div.textContent = meta;
        li.appendChild(div);
      }
      return li;
    }

    async function loadStatus() {
      const res = await fetch('/api/status');
      if (!res.ok) return;
      const status = await res.json();
      for (const [key, value] of Object.entries(status.display)) text(key, value);
      const warning = document.getElementById('warning');
      warning.className = status.warning ? 'banner warning' : 'banner';
      warning.textContent = status.warning || '';
      const banner = document.getElementById('banner');
      banner.className = status.banner ? 'banner ' + status.banner.kind : 'banner';
      text('bannerText', status.banner ? status.banner.message : '');
      text('tx', status.tx.status === 'idle' ? '' : status.tx.status + ': ' + status.tx.action);
    }

    async function loadTrail() {
      const params = new URLSearchParams({
        q: document.getElementById('q').value,
        filter: document.getElementById('filter').value,
      });
      document.getElementById('csv').href = '/api/trail.csv?' + params;
      const res = await fetch('/api/trail?' + params);
      if (!res.ok) return;
      const payload = await res.json();
      const list = document.getElementById('trail');
      list.innerHTML = '';
      if (!payload.items.length) list.appendChild(item('No activity yet.'));
      for (const entry of payload.items) {
        const meta = [entry.relative_time, entry.category, entry.tags].filter(Boolean).join(' · ');
        list.appendChild(item(entry.title + (entry.body ? ' - ' + entry.body : ''), meta));
      }
    }

    async function loadCovenants() {
      const res = await fetch('/api/covenants');
      if (!res.ok) return;
      const rows = await res.json();
      const list = document.getElementById('covenants');
      list.innerHTML = '';
      for (const row of rows) {
        const meta = [row.status_label, row.reward_display, row.integrity_display, row.tags]
          .filter(Boolean).join(' · ');
        list.appendChild(item('#' + row.id + (row.involves_account ? ' (yours)' : ''), meta));
      }
    }

    async function act(intent) {
      const res = await fetch('/api/actions', {
        method: 'POST',
        headers: {'content-type': 'application/json'},
        body: JSON.stringify(intent),
      });
      await res.json().catch(() => null);
      refresh();
    }

    function createCovenant() {
      act({
        action: 'create_covenant',
        preset: document.getElementById('preset').value,
        worker: document.getElementById('worker').value,
        reward: document.getElementById('reward').value,
        tags: document.getElementById('tags').value,
      });
    }

    async function dismiss() {
      await fetch('/api/banner/dismiss', {method: 'POST'});
      loadStatus();
    }

    function refresh() {
      loadStatus();
      loadTrail();
      loadCovenants();
    }

    refresh();
    setInterval(refresh, 4000);
  </script>
</body>
</html>
"#;
