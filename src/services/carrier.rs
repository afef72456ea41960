//! Parcel carrier client (PostNL shipment API).

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::config::CarrierConfig;

/// Standard domestic parcel.
pub const PRODUCT_CODE_DELIVERY: &str = "3085";
const PRINTER_TYPE: &str = "GraphicFile|PDF";
const SENDER_ADDRESS_TYPE: &str = "02";
const RECIPIENT_ADDRESS_TYPE: &str = "01";
const COUNTRY_CODE: &str = "NL";

#[derive(Debug, Error)]
pub enum CarrierError {
    #[error("PostNL API error: {0}")]
    Api(String),

    #[error("PostNL API key niet ingesteld")]
    NotConfigured,

    #[error("PostNL request failed: {0}")]
    Transport(String),

    #[error("Geen zending ontvangen van PostNL: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CarrierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CarrierError::InvalidResponse(err.to_string())
        } else {
            CarrierError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub name: String,
    pub street: String,
    pub house_number: String,
    pub postcode: String,
    pub city: String,
}

impl Recipient {
    /// First word is the first name; the rest (or the whole name) is the surname.
    fn split_name(&self) -> (String, String) {
        let mut words = self.name.split_whitespace();
        let first = words.next().unwrap_or_default().to_string();
        let rest: Vec<&str> = words.collect();
        let last = if rest.is_empty() {
            self.name.trim().to_string()
        } else {
            rest.join(" ")
        };
        (first, last)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentLabel {
    pub tracking_code: String,
    pub tracking_url: String,
    /// Base64 encoded PDF
    pub label_pdf: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub status: String,
    pub timestamp: String,
    pub description: String,
}

#[async_trait]
pub trait CarrierClient: Send + Sync {
    async fn create_shipment(
        &self,
        recipient: &Recipient,
        order_number: &str,
        weight_grams: u32,
    ) -> Result<ShipmentLabel, CarrierError>;

    async fn tracking_status(
        &self,
        tracking_code: &str,
        postcode: &str,
    ) -> Result<TrackingStatus, CarrierError>;
}

pub fn tracking_url(tracking_code: &str, postcode: &str) -> String {
    format!(
        "https://postnl.nl/tracktrace/?B={}&P={}&D=NL&T=C",
        tracking_code,
        postcode.replace(' ', "")
    )
}

#[derive(Clone)]
pub struct PostNlClient {
    client: reqwest::Client,
    config: CarrierConfig,
    base_url: String,
}

impl PostNlClient {
    pub fn new(config: CarrierConfig) -> Result<Self, CarrierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = config.base_url();
        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn api_key(&self) -> Result<&str, CarrierError> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CarrierError::NotConfigured)
    }

    fn shipment_body(&self, recipient: &Recipient, order_number: &str, weight: u32) -> Value {
        let sender = &self.config.sender;
        let (first_name, name) = recipient.split_name();
        json!({
            "Customer": {
                "CustomerNumber": self.config.customer_number,
                "CustomerCode": self.config.customer_code,
                "CollectionLocation": self.config.collection_location,
                "Address": {
                    "AddressType": SENDER_ADDRESS_TYPE,
                    "CompanyName": sender.company_name,
                    "Street": sender.street,
                    "HouseNr": sender.house_number,
                    "Zipcode": sender.zipcode,
                    "City": sender.city,
                    "Countrycode": COUNTRY_CODE,
                }
            },
            "Message": {
                "MessageID": order_number,
                "MessageTimeStamp": Utc::now().to_rfc3339(),
                "Printertype": PRINTER_TYPE,
            },
            "Shipments": [{
                "Addresses": [{
                    "AddressType": RECIPIENT_ADDRESS_TYPE,
                    "FirstName": first_name,
                    "Name": name,
                    "Street": recipient.street,
                    "HouseNr": recipient.house_number,
                    "Zipcode": recipient.postcode,
                    "City": recipient.city,
                    "Countrycode": COUNTRY_CODE,
                }],
                "ProductCodeDelivery": PRODUCT_CODE_DELIVERY,
                "Dimension": { "Weight": weight },
                "Reference": order_number,
            }]
        })
    }

    async fn api_failure(response: reqwest::Response) -> CarrierError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), body = %body, "PostNL API error");
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/Errors/0/Description")
                    .or_else(|| v.pointer("/fault/faultstring"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("status {}", status.as_u16()));
        CarrierError::Api(detail)
    }
}

#[derive(Debug, Deserialize)]
struct LabelPayload {
    #[serde(rename = "Content", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ResponseShipment {
    #[serde(rename = "Barcode", default)]
    barcode: String,
    #[serde(rename = "Labels", default)]
    labels: Vec<LabelPayload>,
}

#[derive(Debug, Deserialize)]
struct ShipmentResponse {
    #[serde(rename = "ResponseShipments", default)]
    response_shipments: Vec<ResponseShipment>,
}

#[async_trait]
impl CarrierClient for PostNlClient {
    #[instrument(skip(self, recipient), fields(postcode = %recipient.postcode))]
    async fn create_shipment(
        &self,
        recipient: &Recipient,
        order_number: &str,
        weight_grams: u32,
    ) -> Result<ShipmentLabel, CarrierError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .post(format!("{}/v1/shipment", self.base_url))
            .header("apikey", api_key)
            .header("Accept", "application/json")
            .json(&self.shipment_body(recipient, order_number, weight_grams))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_failure(response).await);
        }

        let parsed: ShipmentResponse = response.json().await?;
        let shipment = parsed
            .response_shipments
            .into_iter()
            .next()
            .ok_or_else(|| CarrierError::InvalidResponse("lege ResponseShipments".into()))?;
        if shipment.barcode.is_empty() {
            return Err(CarrierError::InvalidResponse("geen barcode".into()));
        }

        let label_pdf = shipment
            .labels
            .into_iter()
            .next()
            .map(|label| label.content)
            .unwrap_or_default();

        info!(barcode = %shipment.barcode, "shipment created");
        Ok(ShipmentLabel {
            tracking_url: tracking_url(&shipment.barcode, &recipient.postcode),
            tracking_code: shipment.barcode,
            label_pdf,
        })
    }

    #[instrument(skip(self))]
    async fn tracking_status(
        &self,
        tracking_code: &str,
        postcode: &str,
    ) -> Result<TrackingStatus, CarrierError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(format!("{}/v1/shipment", self.base_url))
            .query(&[("trackingcode", tracking_code), ("postalcode", postcode)])
            .header("apikey", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_failure(response).await);
        }

        let body: Value = response.json().await?;
        let status = body.pointer("/CompleteStatus/Shipment/0/Status");
        let field = |name: &str| {
            status
                .and_then(|s| s.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Ok(TrackingStatus {
            status: field("StatusCode").unwrap_or_else(|| "unknown".to_string()),
            timestamp: field("TimeStamp").unwrap_or_default(),
            description: field("StatusDescription")
                .unwrap_or_else(|| "Status onbekend".to_string()),
        })
    }
}
