use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use uuid::Uuid;

use super::CacheError;

/// Resolves bearer tokens to user ids. Sessions are written by the auth
/// service under `session:<token>`; this service only reads them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, CacheError>;
}

pub fn session_key(token: &str) -> String {
    format!("session:{token}")
}

#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
}

impl RedisSessionStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn resolve(&self, token: &str) -> Result<Option<Uuid>, CacheError> {
        let key = session_key(token);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|value| parse_user_id(&key, &value)).transpose()
    }
}

fn parse_user_id(key: &str, value: &str) -> Result<Uuid, CacheError> {
    Uuid::parse_str(value.trim()).map_err(|_| CacheError::CorruptSession(key.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_format() {
        assert_eq!(session_key("abc"), "session:abc");
    }

    #[test]
    fn test_parse_user_id_trims_whitespace() {
        let id = Uuid::new_v4();
        let parsed = parse_user_id("session:t", &format!(" {id}\n")).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_user_id_rejects_garbage() {
        let err = parse_user_id("session:t", "not-a-uuid").unwrap_err();
        assert!(matches!(err, CacheError::CorruptSession(key) if key == "session:t"));
    }
}
