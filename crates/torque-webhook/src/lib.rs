//! Webhook client for the shop's bill channel.
//!
//! One message per sale: POST creates it, PATCH keeps it in sync with
//! edits, DELETE removes it when the sale goes away. All calls are
//! best-effort from the caller's point of view; the coordinator treats
//! every error here as a soft warning.

pub mod embed;

use reqwest::multipart::{Form, Part};
use serde_json::json;
use tracing::warn;

use torque_core::notifier::{BillMessage, BillNotifier, NotifyError, VerificationImages};

use crate::embed::{
    CAR_IMAGE_NAME, Embed, ImageRefs, MECHANIC_SHEET_NAME, create_embed, edit_embed,
};

/// Display name the webhook posts under, and the footer branding.
pub const DEFAULT_SHOP_NAME: &str = "Torque Auto Works";

pub struct WebhookClient {
    http: reqwest::Client,
    url: Option<String>,
    shop_name: String,
}

impl WebhookClient {
    /// `url` is the full webhook endpoint. `None` (or empty) leaves the
    /// client in a disabled state where every call reports
    /// `NotifyError::NotConfigured`.
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.filter(|u| !u.trim().is_empty()),
            shop_name: DEFAULT_SHOP_NAME.to_string(),
        }
    }

    pub fn with_shop_name(mut self, shop_name: impl Into<String>) -> Self {
        self.shop_name = shop_name.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    fn endpoint(&self) -> Result<&str, NotifyError> {
        self.url.as_deref().ok_or(NotifyError::NotConfigured)
    }

    /// Fetch the existing message so an edit without fresh uploads can
    /// carry the verification images forward. Any failure degrades to
    /// "no images"; the edit itself still goes out.
    async fn existing_image_refs(&self, url: &str, message_id: &str) -> ImageRefs {
        let response = match self.http.get(format!("{url}/messages/{message_id}")).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to fetch webhook message {}: {}", message_id, e);
                return ImageRefs::None;
            }
        };
        if !response.status().is_success() {
            return ImageRefs::None;
        }
        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!("Unreadable webhook message {}: {}", message_id, e);
                return ImageRefs::None;
            }
        };

        let embed = &body["embeds"][0];
        match (
            embed["image"]["url"].as_str(),
            embed["thumbnail"]["url"].as_str(),
        ) {
            (Some(image_url), Some(thumbnail_url)) => ImageRefs::Existing {
                image_url: image_url.to_string(),
                thumbnail_url: thumbnail_url.to_string(),
            },
            _ => ImageRefs::None,
        }
    }

    fn image_form(images: &VerificationImages, payload: serde_json::Value) -> Form {
        Form::new()
            .part(
                "files[0]",
                Part::bytes(images.car_image.clone()).file_name(CAR_IMAGE_NAME),
            )
            .part(
                "files[1]",
                Part::bytes(images.mechanic_sheet.clone()).file_name(MECHANIC_SHEET_NAME),
            )
            .text("payload_json", payload.to_string())
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), NotifyError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(NotifyError::Status(response.status().as_u16()))
    }
}

impl BillNotifier for WebhookClient {
    async fn post_bill(
        &self,
        bill: &BillMessage,
        images: Option<&VerificationImages>,
    ) -> Result<String, NotifyError> {
        let url = self.endpoint()?;
        let embed: Embed = create_embed(bill, &self.shop_name, images.is_some());
        let payload = json!({ "username": self.shop_name, "embeds": [embed] });

        // ?wait=true makes the webhook return the created message so we
        // can capture its id.
        let request = self.http.post(format!("{url}?wait=true"));
        let response = match images {
            Some(images) => request.multipart(Self::image_form(images, payload)).send().await,
            None => request.json(&payload).send().await,
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        check_status(&response)?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NotifyError::Payload(e.to_string()))?;
        body["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| NotifyError::Payload("response carried no message id".into()))
    }

    async fn edit_bill(
        &self,
        message_id: &str,
        bill: &BillMessage,
        images: Option<&VerificationImages>,
    ) -> Result<(), NotifyError> {
        let url = self.endpoint()?;

        let refs = match images {
            Some(_) => ImageRefs::Attachments,
            None => self.existing_image_refs(url, message_id).await,
        };
        let embed = edit_embed(bill, &self.shop_name, &refs);
        let payload = json!({ "embeds": [embed] });

        let request = self.http.patch(format!("{url}/messages/{message_id}"));
        let response = match images {
            Some(images) => request.multipart(Self::image_form(images, payload)).send().await,
            None => request.json(&payload).send().await,
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        check_status(&response)
    }

    async fn delete_bill(&self, message_id: &str) -> Result<(), NotifyError> {
        let url = self.endpoint()?;
        let response = self
            .http
            .delete(format!("{url}/messages/{message_id}"))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        check_status(&response)
    }
}
