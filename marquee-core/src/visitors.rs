//! Visitor log helpers: user-agent classification and the retention sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use marquee_model::ClientInfo;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::database::ports::VisitorLogRepository;
use crate::error::Result;

const UNKNOWN: &str = "Unknown";

fn classify_browser(ua: &str) -> &'static str {
    // Order matters: Edge and Opera also advertise Chrome, Chrome also
    // advertises Safari.
    const RULES: &[(&str, &str)] = &[
        ("edg/", "Edge"),
        ("opr/", "Opera"),
        ("opera", "Opera"),
        ("samsungbrowser", "Samsung Internet"),
        ("firefox/", "Firefox"),
        ("fxios", "Firefox"),
        ("crios", "Chrome"),
        ("chrome/", "Chrome"),
        ("safari/", "Safari"),
    ];
    RULES
        .iter()
        .find(|(needle, _)| ua.contains(needle))
        .map_or(UNKNOWN, |(_, name)| *name)
}

fn classify_os(ua: &str) -> &'static str {
    const RULES: &[(&str, &str)] = &[
        ("iphone", "iOS"),
        ("ipad", "iOS"),
        ("android", "Android"),
        ("windows", "Windows"),
        ("mac os x", "macOS"),
        ("cros ", "ChromeOS"),
        ("linux", "Linux"),
    ];
    RULES
        .iter()
        .find(|(needle, _)| ua.contains(needle))
        .map_or(UNKNOWN, |(_, name)| *name)
}

fn classify_device(ua: &str) -> &'static str {
    if ["bot", "crawler", "spider", "curl/", "wget/"]
        .iter()
        .any(|needle| ua.contains(needle))
    {
        "Bot"
    } else if ua.contains("ipad")
        || ua.contains("tablet")
        || (ua.contains("android") && !ua.contains("mobile"))
    {
        "Tablet"
    } else if ua.contains("mobi") || ua.contains("iphone") {
        "Mobile"
    } else {
        "Desktop"
    }
}

/// Coarse browser / OS / device classification of a user-agent string.
pub fn parse_user_agent(user_agent: &str) -> ClientInfo {
    let ua = user_agent.to_ascii_lowercase();
    if ua.trim().is_empty() {
        return ClientInfo {
            browser: UNKNOWN.into(),
            os: UNKNOWN.into(),
            device: UNKNOWN.into(),
        };
    }
    ClientInfo {
        browser: classify_browser(&ua).into(),
        os: classify_os(&ua).into(),
        device: classify_device(&ua).into(),
    }
}

/// Delete visitor logs older than `retention`. Returns how many were removed.
pub async fn sweep_expired(
    repo: &dyn VisitorLogRepository,
    retention: Duration,
) -> Result<u64> {
    let retention = chrono::Duration::from_std(retention)
        .unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(retention)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    repo.delete_before(cutoff).await
}

/// Run [`sweep_expired`] every `interval` until the handle is aborted.
pub fn spawn_retention_sweep(
    repo: Arc<dyn VisitorLogRepository>,
    retention: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_expired(repo.as_ref(), retention).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "expired visitor logs removed"),
                Err(err) => warn!(error = %err, "visitor log sweep failed"),
            }
        }
    })
}
