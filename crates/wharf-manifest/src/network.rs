//! HTTP routing, DNS aliases and task networking.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// HTTP routing rule for a load balanced service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stickiness: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<Alias>,

    /// Container that receives traffic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_container: Option<String>,

    /// Legacy spelling of `target_container`.
    #[serde(default, rename = "targetContainer", skip_serializing_if = "Option::is_none")]
    pub target_container_camel_case: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_source_ips: Vec<IpNet>,
}

impl RoutingRule {
    /// Container receiving traffic, whichever spelling was used.
    pub fn target_container(&self) -> Option<&str> {
        self.target_container
            .as_deref()
            .or(self.target_container_camel_case.as_deref())
    }
}

/// One or more DNS aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Alias {
    One(String),
    Many(Vec<String>),
}

impl Alias {
    /// Whether no alias is configured.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(s) => s.is_empty(),
            Self::Many(v) => v.iter().all(String::is_empty),
        }
    }

    /// Flatten into a list, skipping blank entries.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) if s.is_empty() => Vec::new(),
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.iter().filter(|s| !s.is_empty()).cloned().collect(),
        }
    }
}

/// A CIDR block as written in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpNet(pub String);

impl IpNet {
    /// Parse into an address and prefix length.
    pub fn parse(&self) -> Result<(IpAddr, u8), String> {
        let invalid = || format!("parse IPNet {}: invalid CIDR address: {}", self.0, self.0);

        let (addr, prefix) = self.0.split_once('/').ok_or_else(invalid)?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(invalid());
        }
        Ok((addr, prefix))
    }
}

impl From<&str> for IpNet {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Task networking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<VpcConfig>,
}

impl NetworkConfig {
    pub fn is_empty(&self) -> bool {
        self.vpc.is_none()
    }
}

/// VPC placement for tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpcConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<String>>,
}

impl VpcConfig {
    /// Nothing configured at all.
    pub fn is_empty(&self) -> bool {
        self.placement.is_none() && self.security_groups.is_none()
    }
}

/// Subnet placement for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Public,
    Private,
}

impl Placement {
    /// All valid placements in display order.
    pub const ALL: [Placement; 2] = [Self::Public, Self::Private];

    /// Parse a placement string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
