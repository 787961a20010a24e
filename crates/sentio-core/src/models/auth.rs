use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TokenResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_response() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token": "tok123", "token_type": "bearer"}"#)
                .expect("Failed to parse token response");
        assert_eq!(resp.access_token, "tok123");

        let resp: TokenResponse = serde_json::from_str(r#"{"token": "tok456"}"#)
            .expect("Failed to parse token alias");
        assert_eq!(resp.access_token, "tok456");
        assert_eq!(resp.token_type, "bearer");
    }
}
