//! ZK Answer Verification Oracle Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Game Backend / Frontend                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /health  /api/zk/create-commitment  /api/zk/verify-*   ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Services Layer                        ││
//! │  │  VerificationOracle: ZKProver  IpfsArchive  Ledger       ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL (commitments, attempts, verification_logs)  ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │           ProofRegistry (EVM)          IPFS (proof JSON)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zk_answer_oracle::{
    routes,
    services::{BlockchainService, IpfsArchive, NoirBackend, VerificationOracle, ZKProver},
    AppState, Config, Database,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zk_answer_oracle=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting ZK Answer Verification Oracle");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!(environment = ?config.environment, "📋 Configuration loaded");

    // 데이터베이스 연결
    let db = Arc::new(Database::connect(&config.database_url).await?);
    tracing::info!("🗄️  Database connected");

    // 마이그레이션 실행
    db.run_migrations().await?;
    tracing::info!("📦 Migrations completed");

    // 서비스 초기화
    let backend = NoirBackend::new(config.prover.clone());
    let prover = ZKProver::new(Arc::new(backend), config.prover.max_concurrent_proofs);
    tracing::info!(backend = prover.backend_name(), "🔐 ZK Prover initialized");

    let archive = IpfsArchive::new(config.archive.clone())?;
    tracing::info!(api = %config.archive.api_url, "📦 IPFS archive configured");

    let ledger = Arc::new(BlockchainService::connect(config.ledger.clone()).await?);
    tracing::info!(chain_id = config.ledger.chain_id, "⛓️  Ledger connected");

    let oracle = VerificationOracle::new(
        Arc::new(prover),
        Arc::new(archive),
        ledger.clone(),
        db.clone(),
        db.clone(),
        db.clone(),
    );

    // 앱 상태 구성
    let state = AppState {
        db,
        oracle: Arc::new(oracle),
        ledger,
        config: Arc::new(config.clone()),
    };

    // 라우터 구성
    let app = create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET  /health                      - 서버 / DB / ledger 상태
///
/// POST /api/zk/create-commitment    - 정답 commitment 생성 + anchor
/// POST /api/zk/verify-response      - 사용자 답변 검증 + anchor
/// GET  /api/zk/proof/:cid           - 저장된 proof package 조회
/// ```
fn create_router(state: AppState) -> Router {
    // CORS 설정
    // 프로덕션에서는 ALLOWED_ORIGINS만 허용
    // 개발 환경에서는 localhost 허용
    let cors = if state.config.is_production() {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:5173"), // Vite dev server
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:5173"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // ZK workflows
        .route("/api/zk/create-commitment", post(routes::zk::create_commitment))
        .route("/api/zk/verify-response", post(routes::zk::verify_response))
        .route("/api/zk/proof/:cid", get(routes::zk::get_proof))

        // 미들웨어 (위에서부터 바깥쪽: CORS → Trace)
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}
