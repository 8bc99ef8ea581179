//! User-agent gate for the in-browser engine.

use std::fmt;

use shared::domain::CapabilityReport;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

impl fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chrome => "Chrome",
            Self::Firefox => "Firefox",
            Self::Safari => "Safari",
            Self::Edge => "Edge",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Supported(BrowserFamily),
    Unsupported {
        family: BrowserFamily,
        version: u32,
        minimum: u32,
    },
    /// The host has no WebAssembly runtime at all.
    MissingWebAssembly,
    /// Unknown browsers are let through.
    Unrecognized,
}

impl Compatibility {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Unsupported { .. } | Self::MissingWebAssembly)
    }
}

pub const UNSUPPORTED_BROWSER_MESSAGE: &str = "Your browser doesn't support the required features. Please use Chrome 68+, Firefox 79+, Safari 15.2+, or Edge 79+.";

// Edge carries a Chrome token too, so it is matched first.
const VERSIONED_FAMILIES: [(BrowserFamily, &str, u32); 3] = [
    (BrowserFamily::Edge, "Edg/", 79),
    (BrowserFamily::Chrome, "Chrome/", 68),
    (BrowserFamily::Firefox, "Firefox/", 79),
];

/// Full gate: a reported missing WebAssembly runtime fails before the user
/// agent is looked at. Missing shared memory is only logged.
pub fn check_host(
    user_agent: Option<&str>,
    capabilities: Option<&CapabilityReport>,
) -> Compatibility {
    if let Some(report) = capabilities {
        if !report.webassembly {
            return Compatibility::MissingWebAssembly;
        }
        if !report.shared_memory {
            warn!("shared memory unavailable; engine threading disabled");
        }
    }
    user_agent.map_or(Compatibility::Unrecognized, check_user_agent)
}

pub fn check_user_agent(user_agent: &str) -> Compatibility {
    for (family, token, minimum) in VERSIONED_FAMILIES {
        if let Some(version) = major_version(user_agent, token) {
            return if version >= minimum {
                Compatibility::Supported(family)
            } else {
                Compatibility::Unsupported {
                    family,
                    version,
                    minimum,
                }
            };
        }
    }

    if user_agent.contains("Safari/") && !user_agent.contains("Chrome") {
        return Compatibility::Supported(BrowserFamily::Safari);
    }

    Compatibility::Unrecognized
}

fn major_version(user_agent: &str, token: &str) -> Option<u32> {
    let start = user_agent.find(token)? + token.len();
    let digits: String = user_agent[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_120: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const CHROME_60: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/60.0.3112.90 Safari/537.36";
    const FIREFOX_78: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:78.0) Gecko/20100101 Firefox/78.0";
    const FIREFOX_121: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.1 Safari/605.1.15";
    const EDGE_18: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.102 Safari/537.36 Edg/18.17763";
    const EDGE_120: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";

    #[test]
    fn applies_minimum_versions() {
        assert_eq!(
            check_user_agent(CHROME_120),
            Compatibility::Supported(BrowserFamily::Chrome)
        );
        assert_eq!(
            check_user_agent(CHROME_60),
            Compatibility::Unsupported {
                family: BrowserFamily::Chrome,
                version: 60,
                minimum: 68
            }
        );
        assert!(!check_user_agent(FIREFOX_78).is_allowed());
        assert!(check_user_agent(FIREFOX_121).is_allowed());
    }

    #[test]
    fn edge_is_judged_by_its_own_version() {
        assert_eq!(
            check_user_agent(EDGE_18),
            Compatibility::Unsupported {
                family: BrowserFamily::Edge,
                version: 18,
                minimum: 79
            }
        );
        assert_eq!(
            check_user_agent(EDGE_120),
            Compatibility::Supported(BrowserFamily::Edge)
        );
    }

    #[test]
    fn safari_and_unknown_browsers_pass() {
        assert_eq!(
            check_user_agent(SAFARI),
            Compatibility::Supported(BrowserFamily::Safari)
        );
        assert_eq!(check_user_agent("curl/8.4.0"), Compatibility::Unrecognized);
        assert!(check_user_agent("").is_allowed());
    }

    #[test]
    fn missing_webassembly_fails_whatever_the_browser() {
        let without_wasm = CapabilityReport {
            webassembly: false,
            shared_memory: true,
            workers: true,
            file_reading: true,
        };
        assert_eq!(
            check_host(Some(CHROME_120), Some(&without_wasm)),
            Compatibility::MissingWebAssembly
        );
        assert!(!check_host(None, Some(&without_wasm)).is_allowed());

        let without_shared_memory = CapabilityReport {
            webassembly: true,
            shared_memory: false,
            ..without_wasm
        };
        assert_eq!(
            check_host(Some(FIREFOX_121), Some(&without_shared_memory)),
            Compatibility::Supported(BrowserFamily::Firefox)
        );
        assert_eq!(check_host(Some(CHROME_60), None), check_user_agent(CHROME_60));
        assert_eq!(check_host(None, None), Compatibility::Unrecognized);
    }
}
