use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::http::{header, Method};
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::TokenService;
use crate::cache::ReadCache;
use crate::configuration::Settings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::AuthMiddleware;
use crate::pool::PoolConfig;
use crate::routes::{
    create_task, current_user, delete_task, health_check, list_tasks, login, logout, refresh,
    register, update_task,
};
use crate::store::{bootstrap_schema, tasks::Task, StoreManager, StorePool};

/// Unfiltered task list per subject
pub type TaskCache = ReadCache<i64, Arc<Vec<Task>>>;

/// Explicitly constructed services shared by all workers
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub store: Arc<StorePool>,
    pub task_cache: Arc<TaskCache>,
}

impl AppState {
    /// Build every service from `settings` and bootstrap the schema through
    /// the first pooled handle.
    pub async fn init(settings: &Settings) -> Result<Self, AppError> {
        settings.validate()?;

        let tokens = TokenService::new(settings.jwt.clone(), &settings.revocation);
        let store = StorePool::new(
            StoreManager::new(&settings.database.url)?,
            PoolConfig::from(&settings.pool),
        );

        {
            let lease = store.acquire().await?;
            let mut conn = lease.lock().await;
            bootstrap_schema(&mut conn).await?;
        }

        tracing::info!(
            pool_size = settings.pool.size,
            cache_ttl_ms = settings.cache.ttl_ms,
            revocation_hash_functions = settings.revocation.hash_functions,
            "Application state initialized"
        );

        Ok(Self {
            tokens: Arc::new(tokens),
            store: Arc::new(store),
            task_cache: Arc::new(ReadCache::new(settings.cache.ttl())),
        })
    }

    /// Close the pool and drop cached reads. Revocations are kept in memory
    /// only and are forgotten with the process.
    pub fn shutdown(&self) {
        self.store.shutdown();
        self.task_cache.clear();
        tracing::info!("Application state shut down");
    }
}

pub struct Application {
    port: u16,
    server: Server,
    state: AppState,
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self, std::io::Error> {
        let state = AppState::init(&settings).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize application state");
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;

        let address = format!("{}:{}", settings.application.host, settings.application.port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();
        tracing::info!(address = %address, port = port, "Server listening");

        let server = run(listener, state.clone())?;

        Ok(Self {
            port,
            server,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        let result = self.server.await;
        self.state.shutdown();
        result
    }
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let tokens = web::Data::from(Arc::clone(&state.tokens));
    let store = web::Data::from(Arc::clone(&state.store));
    let task_cache = web::Data::from(Arc::clone(&state.task_cache));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(LoggerMiddleware)
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .app_data(tokens.clone())
            .app_data(store.clone())
            .app_data(task_cache.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/logout", web::post().to(logout))
            .route("/auth/refresh", web::post().to(refresh))
            // Protected routes
            .service(
                web::resource("/auth/me")
                    .wrap(AuthMiddleware::new(Arc::clone(&state.tokens)))
                    .route(web::get().to(current_user)),
            )
            .service(
                web::scope("/api/tasks")
                    .wrap(AuthMiddleware::new(Arc::clone(&state.tokens)))
                    .route("", web::get().to(list_tasks))
                    .route("", web::post().to(create_task))
                    .route("/{id}", web::put().to(update_task))
                    .route("/{id}", web::delete().to(delete_task)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// The browser UI is served from another origin and sends bearer tokens.
fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .send_wildcard()
        .allowed_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers(vec![header::LOCATION])
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(ValidationError::Malformed(err.to_string())).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|_err, _req| {
        AppError::Validation(ValidationError::InvalidFormat("id".to_string())).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::Validation(ValidationError::Malformed(err.to_string())).into()
    })
}
