//! Stripe webhook handler

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;

use crate::AppState;
use reelsmith_common::{
    billing,
    errors::{AppError, Result},
};

/// Receive a Stripe webhook. The signature is verified over the raw body
/// before any of it is parsed or trusted; unhandled event types are
/// acknowledged so Stripe stops retrying them.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let secret = state
        .config
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or(AppError::VendorUnconfigured { vendor: "stripe" })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::SignatureVerification {
            message: "Missing Stripe-Signature header".to_string(),
        })?;

    billing::verify_signature(
        &body,
        signature,
        secret,
        state.config.stripe.signature_tolerance_secs,
        Utc::now().timestamp(),
    )?;

    let event = billing::parse_event(&body)?;
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let object = event.data.object;
            match object.customer {
                Some(customer_id) => {
                    // Prefer the checkout's own session reference; a payload
                    // without one can still resolve through a previously
                    // linked customer.
                    let session_id = match object.client_reference_id {
                        Some(session_id) => {
                            state.customers.link(&customer_id, &session_id).await;
                            Some(session_id)
                        }
                        None => state.customers.session_for(&customer_id).await,
                    };
                    match session_id {
                        Some(session_id) => {
                            state.usage.set_payment_status(&session_id, &customer_id).await;
                        }
                        None => {
                            tracing::warn!(
                                customer_id = %customer_id,
                                "No session resolvable for completed checkout"
                            );
                        }
                    }
                }
                None => {
                    tracing::warn!("checkout.session.completed without a customer id");
                }
            }
        }
        "customer.subscription.deleted" => {
            if let Some(customer_id) = event.data.object.customer {
                match state.customers.session_for(&customer_id).await {
                    Some(session_id) => {
                        // The current month's record stays unlimited; the
                        // flag is simply absent from next month's record.
                        tracing::info!(
                            customer_id = %customer_id,
                            session_id = %session_id,
                            "Subscription canceled"
                        );
                    }
                    None => {
                        tracing::warn!(customer_id = %customer_id, "Unknown customer in webhook");
                    }
                }
            }
        }
        other => {
            tracing::debug!(event_type = other, "Unhandled webhook event acknowledged");
        }
    }

    Ok(Json(serde_json::json!({ "received": true })))
}
