//! Router state. Each resource router carries its own service; nothing is looked up per request.

use crate::service::CrudService;
use std::sync::Arc;

pub type ResourceState = Arc<CrudService>;

/// State of a `/<related>/:id/<resource>` route: the serving resource and the related table.
#[derive(Clone)]
pub struct BelongsToState {
    pub service: Arc<CrudService>,
    pub related_table: String,
}
