use std::time::Duration;

use anyhow::Context;
use super::attack::is_blocking_status;
use super::{FnProbe, ProbeBuilder, ProbeCheck, ProbeDetail, SecurityControl};

pub const REQUIRED_SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
];

const CERTIFICATE_ERROR_MARKERS: &[&str] = &[
    "certificate",
    "UnknownIssuer",
    "NotValidForName",
    "Expired",
    "self signed",
    "self-signed",
];

/// Flattens an error and its sources into one line.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

/// Plain-HTTP requests must be redirected to HTTPS.
pub fn https_redirect(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("https-redirect")
        .control(SecurityControl::HttpsEnforcement)
        .timeout(timeout)
        .run(|ctx| async move {
            let mut url = ctx.target.clone();
            if url.scheme() == "https" {
                url.set_scheme("http")
                    .map_err(|_| anyhow::anyhow!("cannot derive plain-HTTP URL from {}", ctx.target))?;
                url.set_port(None)
                    .map_err(|_| anyhow::anyhow!("cannot reset port on {}", url))?;
            }

            let response = ctx.get(url.clone()).await.with_context(|| format!("GET {}", url))?;
            let status = response.status();
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let enforced = status.is_redirection()
                && location.as_deref().is_some_and(|l| l.starts_with("https://"));

            Ok(ProbeCheck::new(enforced, ProbeDetail::HttpsRedirect {
                status: Some(status.as_u16()),
                location,
                enforced,
            }))
        })
}

/// The HTTPS endpoint must present a certificate the platform trust store accepts.
pub fn tls_certificate(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("tls-certificate")
        .control(SecurityControl::Certificate)
        .timeout(timeout)
        .run(|ctx| async move {
            if ctx.target.scheme() != "https" {
                return Ok(ProbeCheck::new(false, ProbeDetail::Certificate {
                    valid: false,
                    reason: Some("target is not served over TLS".into()),
                }));
            }

            match ctx.get(ctx.target.clone()).await {
                Ok(_) => Ok(ProbeCheck::new(true, ProbeDetail::Certificate { valid: true, reason: None })),
                Err(e) => {
                    let chain = error_chain(&e);
                    if CERTIFICATE_ERROR_MARKERS.iter().any(|m| chain.contains(m)) {
                        Ok(ProbeCheck::new(false, ProbeDetail::Certificate {
                            valid: false,
                            reason: Some(chain),
                        }))
                    } else {
                        Err(anyhow::anyhow!("TLS handshake could not be evaluated: {}", chain))
                    }
                }
            }
        })
}

/// Responses must carry the baseline hardening headers.
pub fn security_headers(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("security-headers")
        .control(SecurityControl::SecurityHeaders)
        .timeout(timeout)
        .run(|ctx| async move {
            let response = ctx.get(ctx.target.clone()).await.context("GET target")?;
            let headers = response.headers();

            let (present, missing): (Vec<&str>, Vec<&str>) = REQUIRED_SECURITY_HEADERS
                .iter()
                .copied()
                .partition(|name| headers.contains_key(*name));

            Ok(ProbeCheck::new(missing.is_empty(), ProbeDetail::SecurityHeaders {
                present: present.into_iter().map(str::to_string).collect(),
                missing: missing.into_iter().map(str::to_string).collect(),
            }))
        })
}

/// A request carrying an obvious attack signature must be rejected upstream.
pub fn waf_detection(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("waf-detection")
        .control(SecurityControl::Waf)
        .timeout(timeout)
        .run(|ctx| async move {
            let mut url = ctx.target.clone();
            url.query_pairs_mut()
                .append_pair("id", "1' OR '1'='1")
                .append_pair("q", "<script>alert(document.domain)</script>");

            let response = ctx.get(url).await.context("GET target with attack signature")?;
            let status = response.status();
            let active = is_blocking_status(status)
                || response.headers().contains_key("x-amzn-waf-action");

            let check = ProbeCheck::new(active, ProbeDetail::Waf {
                active,
                status: Some(status.as_u16()),
            });
            Ok(if active { check.with_blocked_attacks(1) } else { check })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "error sending request")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = Outer(std::io::Error::other("invalid peer certificate: Expired"));
        let chain = error_chain(&err);
        assert_eq!(chain, "error sending request: invalid peer certificate: Expired");
        assert!(CERTIFICATE_ERROR_MARKERS.iter().any(|m| chain.contains(m)));
    }

    #[test]
    fn test_required_headers_are_lowercase() {
        for header in REQUIRED_SECURITY_HEADERS {
            assert_eq!(*header, header.to_lowercase());
        }
    }
}
