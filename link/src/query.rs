//! Generic request execution seam.
//!
//! Everything above the connection (rooms, the client, auth helpers) talks
//! to the server through [`QueryDispatcher`]. The realtime connection is the
//! production implementation; tests plug in scripted ones.

use crate::{
    error::Result,
    models::{QueryOptions, QueryRequest, QueryResponse},
};
use futures_util::future::BoxFuture;

/// Future resolving to the response of an issued request.
pub type ResponseFuture = BoxFuture<'static, Result<QueryResponse>>;

/// Issues requests to the server.
///
/// `query` issues the request *when called*: by the time it returns, the
/// request has been written to the transport, buffered in the offline queue
/// or rejected. Only waiting for the answer happens in the returned future.
/// Callers rely on this to keep the wire order equal to the call order.
pub trait QueryDispatcher: Send + Sync + 'static {
    fn query(&self, request: QueryRequest, options: QueryOptions) -> ResponseFuture;
}
