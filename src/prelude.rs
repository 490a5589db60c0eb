//! Prelude module for convenient imports.
//!
//! ```rust
//! use conjur_api::prelude::*;
//! ```

// Core types
pub use crate::Error;
pub use crate::Result;

// Client
pub use crate::{BlockingClient, Client, ClientBuilder};

// Configuration
pub use crate::{AuthnType, ConnectionInfo, SslVerificationMode};

// Authentication
pub use crate::{
    ApiToken, AuthenticationStrategy, CredentialsData, CredentialsProvider, OidcCodeBundle,
    SimpleCredentialsProvider,
};

// Models
pub use crate::{
    CreateHostData, CreateTokenData, ListMembersQuery, ListResourcesQuery, Resource,
};
