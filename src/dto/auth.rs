use serde::{Deserialize, Serialize};

// Token issuance lives in a separate credential service; this API only
// verifies bearer tokens carrying these claims.
#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
