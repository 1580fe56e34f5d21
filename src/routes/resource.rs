//! Resource routes built from each service's schema.
//!
//! Per resource named `/<t>` (kebab-case table):
//! `POST /<t>`, `PUT /<t>`, `PATCH /<t>`, `GET /<t>?field=v`, `GET|HEAD /<t>/:id`, `DELETE /<t>/:id`
//! and `GET /<related>/:id/<t>` for every belongs-to association. Omitted routes answer 404.

use crate::case::to_kebab_case;
use crate::handlers::resource;
use crate::service::CrudService;
use crate::state::{BelongsToState, ResourceState};
use axum::routing::{get, MethodRouter};
use axum::Router;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Request body cap applied by [`resource_routes`].
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

pub fn resource_routes(services: &[Arc<CrudService>]) -> Router {
    resource_routes_with_body_limit(services, DEFAULT_BODY_LIMIT)
}

pub fn resource_routes_with_body_limit(services: &[Arc<CrudService>], limit: usize) -> Router {
    services
        .iter()
        .fold(Router::new(), |router, service| router.merge(resource_router(service.clone())))
        .layer(RequestBodyLimitLayer::new(limit))
}

fn resource_router(service: Arc<CrudService>) -> Router {
    let schema = service.schema();
    let omit = schema.omissions();
    let base = format!("/{}", schema.route_name());

    let mut collection: MethodRouter<ResourceState> = MethodRouter::new().fallback(resource::not_found);
    if !omit.create {
        collection = collection.post(resource::create);
    }
    if !omit.update {
        collection = collection.put(resource::replace).patch(resource::patch);
    }
    if !omit.search {
        collection = collection.get(resource::search);
    }

    let mut item: MethodRouter<ResourceState> = MethodRouter::new().fallback(resource::not_found);
    if !omit.retrieve {
        item = item.get(resource::retrieve);
    }
    if !omit.delete {
        item = item.delete(resource::delete);
    }

    let router: Router<ResourceState> = Router::new()
        .route(&base, collection)
        .route(&format!("{}/:id", base), item);
    let mut router: Router = router.with_state(service.clone());

    if !omit.belongs_to {
        for association in schema.belongs_to() {
            let path = format!("/{}/:id/{}", to_kebab_case(&association.table), schema.route_name());
            let state = BelongsToState {
                service: service.clone(),
                related_table: association.table.clone(),
            };
            router = router.route(&path, get(resource::belongs_to).with_state(state));
        }
    }
    router
}
