pub mod dev;
pub mod sharing;
pub mod sync;

use crate::state::AppState;

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .merge(sync::router())
        .merge(dev::router())
        .merge(sharing::router())
}
