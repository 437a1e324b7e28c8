use crate::types::{ClientSession, PurgeRequest};

/// Builds the body of a purge submission from the session defaults.
pub fn build_purge_request(urls: &[String], session: &ClientSession) -> PurgeRequest {
    PurgeRequest {
        objects: urls.to_vec(),
        action: session.action,
        domain: session.domain,
        object_type: session.object_type,
    }
}

/// Path, relative to the API base, of the queue a session submits to.
pub fn queue_path(session: &ClientSession) -> String {
    format!("queues/{}", session.queue)
}

pub fn purge_status_path(purge_id: &str) -> String {
    format!("purges/{purge_id}")
}
