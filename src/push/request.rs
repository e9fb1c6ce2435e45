use crate::error::Error;
use crate::keyring::VapidKey;
use crate::subscriptions::Subscription;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL;
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignature, VapidSignatureBuilder,
    WebPushMessageBuilder,
};

/// Message payload. Structured values are serialized to JSON text before
/// encryption; raw bytes pass through untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Seconds the push service should retain an undelivered message.
    /// Defaults to [`super::DEFAULT_PUSH_MESSAGE_TTL`].
    pub ttl: Option<u32>,
    pub payload: Option<Payload>,
}

/// A fully built push-service request: target URL, headers carrying the TTL
/// and the VAPID authorization, and the (encrypted) body if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushRequest {
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl PushRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Builds the push-service request for one subscription: payload encryption
/// per RFC 8291 and a VAPID assertion whose subject is
/// `mailto:{contact_email}`. Pure apart from the signature's timestamp; the
/// signer bounds the assertion's expiry well under the protocol's 24-hour
/// limit.
///
/// A subscription whose push token carries no encryption keys cannot
/// receive a body, so any caller payload is dropped and the message goes
/// out empty. This mirrors the upstream behavior; it is a silent downgrade,
/// not an error.
pub fn build_push_request(
    subscription: &Subscription,
    key: &VapidKey,
    contact_email: &str,
    options: &MessageOptions,
) -> Result<PushRequest, Error> {
    let private_key = key
        .private_key
        .as_deref()
        .ok_or_else(|| Error::Request(format!("VAPID key {} has no private part", key.id)))?;

    let payload = match (&subscription.push_token.keys, &options.payload) {
        (None, _) | (Some(_), None) => None,
        (Some(_), Some(Payload::Json(value))) => Some(
            serde_json::to_vec(value)
                .map_err(|err| Error::Request(format!("serialize payload: {err}")))?,
        ),
        (Some(_), Some(Payload::Raw(bytes))) => Some(bytes.clone()),
    };

    let (p256dh, auth) = match &subscription.push_token.keys {
        Some(keys) => (keys.p256dh.as_str(), keys.auth.as_str()),
        None => ("", ""),
    };
    let info = SubscriptionInfo::new(subscription.push_token.endpoint.as_str(), p256dh, auth);

    let mut signer = VapidSignatureBuilder::from_base64(private_key, &info)
        .map_err(|err| Error::Request(format!("load VAPID key: {err}")))?;
    signer.add_claim("sub", format!("mailto:{contact_email}"));
    let signature = signer
        .build()
        .map_err(|err| Error::Request(format!("sign VAPID assertion: {err}")))?;

    let mut builder = WebPushMessageBuilder::new(&info);
    builder.set_ttl(options.ttl.unwrap_or(super::DEFAULT_PUSH_MESSAGE_TTL));
    match &payload {
        Some(bytes) => {
            builder.set_payload(ContentEncoding::Aes128Gcm, bytes);
            builder.set_vapid_signature(signature);
            let message = builder
                .build()
                .map_err(|err| Error::Request(format!("encrypt payload: {err}")))?;

            let mut headers = vec![("TTL".to_string(), message.ttl.to_string())];
            let encrypted = message
                .payload
                .ok_or_else(|| Error::Request("encrypted message lost its payload".to_string()))?;
            headers.push((
                "Content-Encoding".to_string(),
                encrypted.content_encoding.to_str().to_string(),
            ));
            headers.push((
                "Content-Type".to_string(),
                "application/octet-stream".to_string(),
            ));
            for (name, value) in encrypted.crypto_headers {
                headers.push((name.to_string(), value));
            }
            Ok(PushRequest {
                endpoint: message.endpoint.to_string(),
                headers,
                body: Some(encrypted.content),
            })
        }
        None => {
            // No payload means no crypto headers, so the VAPID authorization
            // is attached directly instead of through the encryption step.
            let message = builder
                .build()
                .map_err(|err| Error::Request(format!("build message: {err}")))?;
            let headers = vec![
                ("TTL".to_string(), message.ttl.to_string()),
                ("Authorization".to_string(), vapid_authorization(&signature)),
            ];
            Ok(PushRequest {
                endpoint: message.endpoint.to_string(),
                headers,
                body: None,
            })
        }
    }
}

fn vapid_authorization(signature: &VapidSignature) -> String {
    format!(
        "vapid t={}, k={}",
        signature.auth_t,
        BASE64URL.encode(&signature.auth_k)
    )
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::keyring::generate_credentials_with_rng;
    use crate::subscriptions::{PushKeys, PushToken};

    use p256::ecdsa::SigningKey;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    pub(crate) fn sample_key(id: &str) -> VapidKey {
        let credentials = generate_credentials_with_rng(&mut StdRng::from_seed([3u8; 32]));
        VapidKey {
            id: id.to_string(),
            public_key: credentials.public_key,
            private_key: Some(credentials.private_key),
        }
    }

    /// Browser-side key material a push service would hand out.
    pub(crate) fn sample_push_keys() -> PushKeys {
        let browser_key = SigningKey::random(&mut StdRng::from_seed([5u8; 32]));
        let point = browser_key.verifying_key().to_encoded_point(false);
        PushKeys {
            p256dh: BASE64URL.encode(point.as_bytes()),
            auth: BASE64URL.encode([11u8; 16]),
        }
    }

    fn subscription(keys: Option<PushKeys>) -> Subscription {
        Subscription {
            id: "https://push.test/web-push/subscriptions/s1".to_string(),
            owner: "alice".to_string(),
            vapid_key: "https://push.test/web-push/vapid-keys/alerts".to_string(),
            push_token: PushToken {
                endpoint: "https://push.example/targets/1".to_string(),
                keys,
            },
            label: None,
            device: None,
        }
    }

    #[test]
    fn build_push_request__should_default_the_ttl_to_one_week() {
        // When
        let request = build_push_request(
            &subscription(None),
            &sample_key("k"),
            "a@b.com",
            &MessageOptions::default(),
        )
        .expect("build");

        // Then
        assert_eq!(request.header("TTL"), Some("604800"));
    }

    #[test]
    fn build_push_request__should_honor_an_explicit_ttl() {
        // Given
        let options = MessageOptions {
            ttl: Some(60),
            payload: None,
        };

        // When
        let request =
            build_push_request(&subscription(None), &sample_key("k"), "a@b.com", &options)
                .expect("build");

        // Then
        assert_eq!(request.header("TTL"), Some("60"));
    }

    #[test]
    fn build_push_request__should_drop_the_payload_for_keyless_tokens() {
        // Given: a push token without encryption keys and a structured payload
        let options = MessageOptions {
            ttl: None,
            payload: Some(Payload::Json(serde_json::json!({"x": 1}))),
        };

        // When
        let request =
            build_push_request(&subscription(None), &sample_key("k"), "a@b.com", &options)
                .expect("the downgrade must not be an error");

        // Then: empty body, VAPID authorization still attached
        assert_eq!(request.body, None);
        let authorization = request.header("Authorization").expect("authorization");
        assert!(authorization.starts_with("vapid t="));
        assert!(authorization.contains(", k="));
        assert_eq!(request.header("Content-Encoding"), None);
    }

    #[test]
    fn build_push_request__should_encrypt_structured_payloads() {
        // Given
        let options = MessageOptions {
            ttl: None,
            payload: Some(Payload::Json(serde_json::json!({"x": 1}))),
        };

        // When
        let request = build_push_request(
            &subscription(Some(sample_push_keys())),
            &sample_key("k"),
            "a@b.com",
            &options,
        )
        .expect("build");

        // Then
        assert_eq!(request.endpoint, "https://push.example/targets/1");
        assert_eq!(request.header("Content-Encoding"), Some("aes128gcm"));
        let body = request.body.expect("encrypted body");
        assert!(!body.is_empty());
        // The ciphertext must not contain the plaintext JSON
        assert!(!body.windows(4).any(|window| window == b"\"x\":"));
    }

    #[test]
    fn build_push_request__should_require_a_private_key() {
        // Given
        let mut key = sample_key("k");
        key.private_key = None;

        // When
        let result = build_push_request(
            &subscription(None),
            &key,
            "a@b.com",
            &MessageOptions::default(),
        );

        // Then
        assert!(matches!(result, Err(Error::Request(_))));
    }
}
