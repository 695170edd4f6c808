//! Request-scoped values set by middleware and read by handlers

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Server-assigned id, echoed as `x-request-id`
    pub request_id: String,
}
