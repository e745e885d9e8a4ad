//! Webhook notification of the run outcome.
//!
//! Best effort: nothing in here can fail a backup run.

use crate::config::NotifyConfig;
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Timestamp layout of the `date` field
pub const PAYLOAD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    BackupSuccessful,
    BackupFailed,
}

/// JSON body posted to the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub project: String,
    pub date: String,
    pub status: RunStatus,
    /// Bundle file name, null when no bundle was produced
    pub filename: Option<String>,
}

impl NotificationPayload {
    pub fn new(
        project: &str,
        at: NaiveDateTime,
        status: RunStatus,
        filename: Option<String>,
    ) -> Self {
        Self {
            project: project.to_string(),
            date: at.format(PAYLOAD_DATE_FORMAT).to_string(),
            status,
            filename,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Notifications are turned off
    Disabled,
    /// Webhook answered 200
    Delivered,
    /// Webhook answered with another status
    Rejected(u16),
    /// Request never got a response
    Failed(String),
}

/// POST `payload` to the configured webhook, if enabled.
pub async fn send_notification(
    config: &NotifyConfig,
    payload: &NotificationPayload,
) -> NotifyOutcome {
    if !config.enabled {
        return NotifyOutcome::Disabled;
    }

    let Some(url) = config.url.as_deref() else {
        warn!("Notification error: NOTIFY_URL is not set");
        return NotifyOutcome::Failed("NOTIFY_URL is not set".to_string());
    };

    let client = reqwest::Client::new();

    match client.post(url).json(payload).send().await {
        Ok(resp) if resp.status() == StatusCode::OK => {
            info!("Notification sent to webhook");
            NotifyOutcome::Delivered
        }
        Ok(resp) => {
            let status = resp.status().as_u16();
            warn!("Webhook failed with status code {}", status);
            NotifyOutcome::Rejected(status)
        }
        Err(e) => {
            warn!("Notification error: {}", e);
            NotifyOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> NotificationPayload {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap();
        NotificationPayload::new(
            "Website",
            at,
            RunStatus::BackupSuccessful,
            Some("website_20240307_090501.zip".to_string()),
        )
    }

    fn enabled(url: String) -> NotifyConfig {
        NotifyConfig {
            enabled: true,
            url: Some(url),
        }
    }

    #[test]
    fn test_payload_wire_format() {
        let json = serde_json::to_value(payload()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "project": "Website",
                "date": "2024-03-07 09:05:01",
                "status": "BackupSuccessful",
                "filename": "website_20240307_090501.zip",
            })
        );

        let mut failed = payload();
        failed.status = RunStatus::BackupFailed;
        failed.filename = None;
        let json = serde_json::to_value(failed).unwrap();
        assert_eq!(json["status"], "BackupFailed");
        assert!(json["filename"].is_null());
    }

    #[tokio::test]
    async fn test_delivered_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(payload()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = send_notification(&enabled(format!("{}/hook", server.uri())), &payload()).await;
        assert_eq!(outcome, NotifyOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_only_200_counts_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let outcome = send_notification(&enabled(server.uri()), &payload()).await;
        assert_eq!(outcome, NotifyOutcome::Rejected(204));
    }

    #[tokio::test]
    async fn test_server_error_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let outcome = send_notification(&enabled(server.uri()), &payload()).await;
        assert_eq!(outcome, NotifyOutcome::Rejected(500));
    }

    #[tokio::test]
    async fn test_unreachable_webhook() {
        let outcome =
            send_notification(&enabled("http://127.0.0.1:1/hook".to_string()), &payload()).await;
        assert!(matches!(outcome, NotifyOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = NotifyConfig {
            enabled: false,
            url: Some(server.uri()),
        };
        assert_eq!(send_notification(&config, &payload()).await, NotifyOutcome::Disabled);
    }
}
