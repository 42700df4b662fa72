use rocket::Route;

mod admin;
mod auth;
mod candidacy;
mod public;
mod sync;
mod voter;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(candidacy::routes());
    routes.extend(public::routes());
    routes.extend(sync::routes());
    routes.extend(voter::routes());
    routes.extend(voting::routes());
    routes
}
