use crate::app::dispatch::{Dispatcher, Methods, RouteError};
use crate::app::AppState;

pub mod data;
pub mod enqueue;
pub mod hello;
pub mod items;
pub mod system;
pub mod users;

/// All HTTP functions, mounted under `prefix`.
pub fn dispatcher(state: AppState, prefix: &str) -> Result<Dispatcher<AppState>, RouteError> {
    Dispatcher::new(state)
        .with_prefix(prefix)
        .route("hello", Methods::default().get(hello::hello))?
        .route("data", Methods::default().post(data::receive))?
        .route(
            "items/{id?}",
            Methods::default()
                .get(items::get)
                .post(items::create)
                .put(items::update)
                .delete(items::delete),
        )?
        .route(
            "users/{id?}",
            Methods::default()
                .get(users::get)
                .post(users::create)
                .put(users::update)
                .delete(users::delete),
        )?
        .route("enqueue", Methods::default().post(enqueue::enqueue))
}
