use serde::{Deserialize, Serialize};

/// Bearer token claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject id
    pub exp: usize,  // Expiration time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
}
