use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Coarse client classification derived from a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientInfo {
    pub browser: String,
    pub os: String,
    pub device: String,
}

/// Append-only access record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct VisitorLog {
    pub id: Uuid,
    pub ip: String,
    pub user_agent: String,
    pub browser: String,
    pub os: String,
    pub device: String,
    pub url: Option<String>,
    pub referer: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVisitorLog {
    pub ip: String,
    pub user_agent: String,
    pub client: ClientInfo,
    pub url: Option<String>,
    pub referer: Option<String>,
    pub user_id: Option<Uuid>,
}

impl VisitorLog {
    pub fn from_new(new: NewVisitorLog) -> Self {
        Self {
            id: Uuid::new_v4(),
            ip: new.ip,
            user_agent: new.user_agent,
            browser: new.client.browser,
            os: new.client.os,
            device: new.client.device,
            url: new.url,
            referer: new.referer,
            user_id: new.user_id,
            created_at: Utc::now(),
        }
    }
}
