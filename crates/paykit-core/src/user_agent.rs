//! SDK identification sent in the User-Agent header

/// SDK id used in the User-Agent header
pub const SDK_ID: &str = env!("CARGO_PKG_NAME");
/// SDK version used in the User-Agent header
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the product/version identification string for outbound requests.
pub fn header_value() -> String {
    format!(
        "PayPalSDK/{} {} (lang=rust; os={}; arch={})",
        SDK_ID,
        SDK_VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
