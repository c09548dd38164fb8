use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use super::api::{
    auth, calendar, household, meta, pantry, plans, recipes, scans, settings, shopping, sync,
    templates,
};
use crate::AppState;

pub(crate) fn make_router() -> Router<AppState> {
    Router::new()
        .route("/_", get(meta::versions))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        .route("/api/household", get(household::show))
        .route("/api/household/join", post(household::join))
        .merge(recipe_routes())
        .merge(plan_routes())
        .route("/api/templates", get(templates::list).post(templates::create))
        .route(
            "/api/templates/{id}",
            put(templates::update).delete(templates::destroy),
        )
        .route("/api/templates/{id}/apply", post(templates::apply))
        .merge(pantry_routes())
        .route("/api/settings", get(settings::show).put(settings::update))
        .route("/api/settings/export", get(settings::export))
        .route("/api/settings/import", post(settings::import))
        .route("/api/calendar/google/connect", get(calendar::connect))
        .route("/api/calendar/google/callback", get(calendar::callback))
        .route("/api/calendar/google", delete(calendar::disconnect))
        .route("/api/sync/{key}", get(sync::show).put(sync::update))
        .fallback(meta::not_found)
}

fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/api/recipes", get(recipes::list).post(recipes::create))
        .route(
            "/api/recipes/{id}",
            get(recipes::show)
                .put(recipes::update)
                .delete(recipes::destroy),
        )
        .route("/api/recipes/{id}/scaled", get(recipes::scaled))
        .route("/api/recipes/{id}/markdown", get(recipes::markdown))
}

fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/plans/sent", get(plans::sent))
        .route("/api/plans/repetitions", get(plans::repetitions))
        .route("/api/plans/{week}", get(plans::show).delete(plans::clear))
        .route("/api/plans/{week}/assignments", post(plans::assign))
        .route("/api/plans/{week}/copy", post(plans::copy_week))
        .route("/api/plans/{week}/days/{day}", delete(plans::clear_day))
        .route("/api/plans/{week}/sent", post(plans::mark_sent))
        .route(
            "/api/assignments/{id}",
            patch(plans::update_assignment).delete(plans::remove_assignment),
        )
        .route("/api/plans/{week}/shopping-list", get(shopping::show))
        .route(
            "/api/plans/{week}/shopping-list/items/{key}",
            put(shopping::check_item),
        )
        .route(
            "/api/plans/{week}/shopping-list/extras",
            post(shopping::add_extra),
        )
        .route(
            "/api/plans/{week}/shopping-list/extras/{id}",
            delete(shopping::remove_extra),
        )
        .route(
            "/api/plans/{week}/shopping-list/checked",
            delete(shopping::clear_checked),
        )
        .route("/api/plans/{week}/shopping-list/send", post(shopping::send))
        .route("/api/plans/{week}/calendar", post(calendar::create_events))
}

fn pantry_routes() -> Router<AppState> {
    Router::new()
        .route("/api/pantry", get(pantry::list).post(pantry::add))
        .route("/api/pantry/bulk", post(pantry::bulk_add))
        .route("/api/pantry/suggestions", get(pantry::suggestions))
        .route("/api/pantry/barcode", post(pantry::barcode))
        .route("/api/pantry/scan", post(scans::scan))
        .route("/api/pantry/scans", get(scans::list))
        .route(
            "/api/pantry/scans/{id}",
            get(scans::show).delete(scans::destroy),
        )
        .route("/api/pantry/scans/{id}/confirm", post(scans::confirm))
        .route("/api/pantry/{id}", delete(pantry::remove))
}
