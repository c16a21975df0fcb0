use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::oauth2::RedirectGuard;
use crate::auth::provider::OAuth2Client;
use crate::auth::token::TokenProvider;
use crate::config::Config;
use crate::posts::{PostMutationService, PostQueryService};
use crate::storage::ImageStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Everything a handler needs, built once at start-up.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: TokenProvider,
    pub redirect_guard: RedirectGuard,
    pub oauth2: OAuth2Client,
    pub posts: PostQueryService,
    pub post_mutations: PostMutationService,
}

impl AppState {
    pub fn new(
        db: DbPool,
        config: Config,
        images: Arc<dyn ImageStore>,
        http: reqwest::Client,
    ) -> Self {
        let tokens = TokenProvider::new(&config.auth.token_secret, config.auth.token_ttl_secs);
        let redirect_guard = RedirectGuard::new(tokens.clone(), &config);
        let oauth2 = OAuth2Client::new(http, &config.oauth2);
        let posts = PostQueryService::new(db.clone());
        let post_mutations =
            PostMutationService::new(db.clone(), images, config.storage.namespace.clone());

        Self {
            db,
            config,
            tokens,
            redirect_guard,
            oauth2,
            posts,
            post_mutations,
        }
    }
}
