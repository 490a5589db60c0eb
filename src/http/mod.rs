//! HTTP plumbing: endpoint templates, request description and the transport.

mod endpoints;
mod network;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use endpoints::{Endpoint, EndpointParams};
pub use network::NetworkConfig;
pub use transport::{
    BasicAuth, HttpRequest, HttpResponse, HttpVerb, ReqwestTransport, TokenHeader, Transport,
};
