use std::sync::Arc;

use crate::application::commands::TaskCommandService;
use crate::application::queries::TaskQueryService;

#[derive(Clone)]
pub struct HttpState {
    pub commands: Arc<TaskCommandService>,
    pub queries: Arc<TaskQueryService>,
}
