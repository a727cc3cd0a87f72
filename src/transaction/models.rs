//! Defines the payment notification record and its render-ready projection.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One payment notification as stored by the data platform.
///
/// Field names on the wire follow the platform's `transacciones` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The ID of the transaction, absent only before the platform assigns one.
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    /// The viewer (administrator) that owns the notification.
    #[serde(rename = "id_usuario", deserialize_with = "deserialize_id")]
    pub owner_id: String,
    /// The wallet catalog entry the notification was matched against.
    #[serde(
        rename = "id_billetera_catalogo",
        default,
        deserialize_with = "deserialize_optional_id"
    )]
    pub wallet_catalog_id: Option<String>,
    /// The wallet provider the notification came from, e.g. "Yape" or "Plin".
    #[serde(rename = "origen", default)]
    pub origin: String,
    /// The raw notification text captured on the device.
    #[serde(rename = "mensaje_original", default)]
    pub original_message: Option<String>,
    /// The amount of money received.
    #[serde(rename = "monto", deserialize_with = "deserialize_amount")]
    pub amount: f64,
    /// The currency label as written in the notification, e.g. "S/" or "PEN".
    #[serde(rename = "moneda_texto", default)]
    pub currency: String,
    /// The name of the person who sent the money.
    #[serde(rename = "nombre_remitente", default)]
    pub sender_name: Option<String>,
    /// The security code shown to the payer.
    #[serde(rename = "codigo_seguridad", default)]
    pub security_code: Option<String>,
    /// When the notification was received, as an ISO-8601 date-time.
    #[serde(rename = "fecha_notificacion")]
    pub notified_at: String,
    /// Free-form data attached by the capturing device.
    #[serde(rename = "datos_adicionales", default)]
    pub extra: Option<Value>,
}

/// A transaction formatted for display in the monitor table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayItem {
    /// The source ID, or a locally generated one when the source has none.
    pub id: String,
    /// The sender name, or a placeholder when unknown.
    pub sender: String,
    /// The amount with exactly two decimal places.
    pub amount: String,
    /// The localized notification date-time, or a placeholder when it cannot be parsed.
    pub date: String,
    /// The currency label.
    pub currency: String,
    /// The security code, empty when absent.
    pub payment_code: String,
    /// The wallet provider.
    pub origin: Option<String>,
}

impl DisplayItem {
    /// Whether the notification came from Yape, which has its own logo.
    pub fn is_yape(&self) -> bool {
        self.origin
            .as_deref()
            .is_some_and(|origin| origin.to_lowercase().contains("yape"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(value: RawId) -> Self {
        match value {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

/// Numeric columns may arrive as JSON numbers or as strings.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
        Missing(()),
    }

    Ok(match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(number) => number,
        RawAmount::Text(text) => text.trim().parse().unwrap_or(0.0),
        RawAmount::Missing(()) => 0.0,
    })
}
