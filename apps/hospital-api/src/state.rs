//! Estado compartilhado entre os handlers

use hospital_auth::TokenService;
use hospital_db::Store;
use std::sync::Arc;

use crate::config::CookieConfig;
use crate::images::ImageHost;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: Arc<TokenService>,
    pub images: Arc<dyn ImageHost>,
    pub cookies: CookieConfig,
}

impl AppState {
    pub fn new(
        store: Store,
        tokens: TokenService,
        images: Arc<dyn ImageHost>,
        cookies: CookieConfig,
    ) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
            images,
            cookies,
        }
    }
}
