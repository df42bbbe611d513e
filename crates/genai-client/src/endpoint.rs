//! Service endpoints and how they resolve to a dial target and RPC method.

use std::fmt;
use std::str::FromStr;

use genai_protocol::{GenaiError, GenaiResult};
use serde::{Deserialize, Serialize};

pub const GEMINI_API_ADDRESS: &str = "generativelanguage.googleapis.com";
pub const GEMINI_API_METHOD: &str =
    "/google.ai.generativelanguage.v1alpha.EvergreenService/StartSession";
pub const GDM_API_ADDRESS: &str = "dns:///gdmlabs.googleapis.com:443";
pub const EVERGREEN_METHOD: &str = "/evergreen.v2.EvergreenService/StartSession";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    /// The public Gemini API surface.
    #[default]
    GeminiApi,
    GdmApi,
    /// A caller-supplied host speaking `evergreen.v2`.
    Custom,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GeminiApi => "gemini-api",
            Self::GdmApi => "gdm-api",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = GenaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gemini-api" => Ok(Self::GeminiApi),
            "gdm-api" => Ok(Self::GdmApi),
            "custom" => Ok(Self::Custom),
            other => Err(GenaiError::UnknownEndpoint(other.to_owned())),
        }
    }
}

/// Where to dial and which bidirectional method to call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAddress {
    pub address: String,
    pub method: String,
}

/// Resolves `endpoint` to its address and method. `host` is only consulted
/// for [`Endpoint::Custom`], where it is required.
pub fn resolve(endpoint: Endpoint, host: Option<&str>) -> GenaiResult<EndpointAddress> {
    let (address, method) = match endpoint {
        Endpoint::GeminiApi => (GEMINI_API_ADDRESS, GEMINI_API_METHOD),
        Endpoint::GdmApi => (GDM_API_ADDRESS, EVERGREEN_METHOD),
        Endpoint::Custom => match host {
            Some(host) if !host.is_empty() => (host, EVERGREEN_METHOD),
            _ => return Err(GenaiError::MissingHost),
        },
    };
    Ok(EndpointAddress {
        address: address.to_owned(),
        method: method.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_endpoint_resolves_to_its_own_target() {
        let gemini = resolve(Endpoint::GeminiApi, None).unwrap();
        assert_eq!(gemini.address, "generativelanguage.googleapis.com");
        assert_eq!(
            gemini.method,
            "/google.ai.generativelanguage.v1alpha.EvergreenService/StartSession"
        );

        let gdm = resolve(Endpoint::GdmApi, None).unwrap();
        assert_eq!(gdm.address, "dns:///gdmlabs.googleapis.com:443");
        assert_eq!(gdm.method, "/evergreen.v2.EvergreenService/StartSession");
    }

    #[test]
    fn host_is_ignored_outside_custom() {
        let gemini = resolve(Endpoint::GeminiApi, Some("localhost:50051")).unwrap();
        assert_eq!(gemini.address, GEMINI_API_ADDRESS);
    }

    #[test]
    fn custom_requires_a_host() {
        assert!(matches!(
            resolve(Endpoint::Custom, None),
            Err(GenaiError::MissingHost)
        ));
        assert!(matches!(
            resolve(Endpoint::Custom, Some("")),
            Err(GenaiError::MissingHost)
        ));

        let custom = resolve(Endpoint::Custom, Some("localhost:50051")).unwrap();
        assert_eq!(
            custom,
            EndpointAddress {
                address: "localhost:50051".into(),
                method: "/evergreen.v2.EvergreenService/StartSession".into(),
            }
        );
    }

    #[test]
    fn parses_and_displays_names() {
        for endpoint in [Endpoint::GeminiApi, Endpoint::GdmApi, Endpoint::Custom] {
            assert_eq!(endpoint.to_string().parse::<Endpoint>().unwrap(), endpoint);
        }
        assert!(matches!(
            "vertex".parse::<Endpoint>(),
            Err(GenaiError::UnknownEndpoint(name)) if name == "vertex"
        ));
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&Endpoint::GdmApi).unwrap();
        assert_eq!(json, "\"gdm-api\"");
        let back: Endpoint = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(back, Endpoint::Custom);
    }
}
