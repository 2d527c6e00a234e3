use crate::kv::KvClient;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedKv = Arc<dyn KvClient>;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Session<SharedKv>>>,
}

impl AppState {
    pub fn new(session: Session<SharedKv>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }
}
