use axum::{
    extract::FromRef,
    routing::{get, post, put},
    Router,
};
use dotenv::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

mod auth;
mod comments;
mod config;
mod error;
mod follows;
mod likes;
mod pagination;
mod patch;
mod posts;
mod reports;
mod storage;
mod upload;
mod users;

use config::settings::Settings;
use storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    storage: Storage,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> PgPool {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for Storage {
    fn from_ref(app_state: &AppState) -> Storage {
        app_state.storage.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("database connected");

    let storage = Storage::connect(&settings).await;

    let app_state = AppState { pool, storage };

    let post_router = Router::new()
        .route(
            "/",
            post(posts::handler::create_post).get(posts::handler::get_posts),
        )
        .route(
            "/:id",
            get(posts::handler::get_post)
                .put(posts::handler::update_post)
                .delete(posts::handler::delete_post),
        );

    let comment_router = Router::new()
        .route(
            "/posts/:post_id",
            post(comments::handler::create_comment).get(comments::handler::get_post_comments),
        )
        .route(
            "/:id",
            put(comments::handler::update_comment).delete(comments::handler::delete_comment),
        );

    let like_router = Router::new()
        .route("/posts/:post_id", post(likes::handler::toggle_post_like))
        .route(
            "/comments/:comment_id",
            post(likes::handler::toggle_comment_like),
        );

    let follow_router = Router::new()
        .route(
            "/:user_id",
            post(follows::handler::follow_user).delete(follows::handler::unfollow_user),
        )
        .route("/:user_id/followers", get(follows::handler::get_followers))
        .route("/:user_id/following", get(follows::handler::get_following))
        .route("/:user_id/check", get(follows::handler::check_follow));

    let user_router = Router::new()
        .route(
            "/me",
            get(users::handler::get_me).put(users::handler::update_me),
        )
        .route("/:id", get(users::handler::get_user))
        .route("/:id/posts", get(users::handler::get_user_posts));

    let report_router = Router::new()
        .route(
            "/",
            post(reports::handler::create_report).get(reports::handler::get_reports),
        )
        .route("/:id", put(reports::handler::update_report_status));

    let upload_router = Router::new()
        .route("/presigned-url", post(upload::handler::get_presigned_url))
        .route("/direct", post(upload::handler::direct_upload));

    let app = Router::new()
        .route("/", get(|| async { "OK" }))
        .nest("/api/posts", post_router)
        .nest("/api/comments", comment_router)
        .nest("/api/likes", like_router)
        .nest("/api/follows", follow_router)
        .nest("/api/users", user_router)
        .nest("/api/reports", report_router)
        .nest("/api/upload", upload_router)
        .with_state(app_state);

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
