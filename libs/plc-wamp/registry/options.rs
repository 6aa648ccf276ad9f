//! Typed procedure registration options
//!
//! Built from the small keyword set a catalog entry may carry. Invalid
//! keywords never fail a registration: the procedure is registered with
//! default options and a warning is logged.

use crate::protocol::Dict;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    Exact,
    Prefix,
    Wildcard,
}

impl MatchPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "exact" => Some(MatchPolicy::Exact),
            "prefix" => Some(MatchPolicy::Prefix),
            "wildcard" => Some(MatchPolicy::Wildcard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPolicy::Exact => "exact",
            MatchPolicy::Prefix => "prefix",
            MatchPolicy::Wildcard => "wildcard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokePolicy {
    Single,
    First,
    Last,
    RoundRobin,
    Random,
}

impl InvokePolicy {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "single" => Some(InvokePolicy::Single),
            "first" => Some(InvokePolicy::First),
            "last" => Some(InvokePolicy::Last),
            "roundrobin" => Some(InvokePolicy::RoundRobin),
            "random" => Some(InvokePolicy::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvokePolicy::Single => "single",
            InvokePolicy::First => "first",
            InvokePolicy::Last => "last",
            InvokePolicy::RoundRobin => "roundrobin",
            InvokePolicy::Random => "random",
        }
    }
}

/// REGISTER options; all `None` means broker defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    pub match_policy: Option<MatchPolicy>,
    pub invoke: Option<InvokePolicy>,
    /// Maximum concurrent invocations, at least 1
    pub concurrency: Option<u32>,
    pub force_reregister: Option<bool>,
}

impl RegisterOptions {
    /// Strictly parse the keyword set
    pub fn from_keywords(keywords: &Dict) -> Result<Self, String> {
        let mut options = Self::default();

        for (key, value) in keywords {
            match key.as_str() {
                "match" => {
                    options.match_policy = Some(
                        value
                            .as_str()
                            .and_then(MatchPolicy::parse)
                            .ok_or_else(|| invalid(key, value))?,
                    );
                }
                "invoke" => {
                    options.invoke = Some(
                        value
                            .as_str()
                            .and_then(InvokePolicy::parse)
                            .ok_or_else(|| invalid(key, value))?,
                    );
                }
                "concurrency" => {
                    let concurrency = value
                        .as_u64()
                        .filter(|c| *c >= 1)
                        .and_then(|c| u32::try_from(c).ok())
                        .ok_or_else(|| invalid(key, value))?;
                    options.concurrency = Some(concurrency);
                }
                "force_reregister" => {
                    options.force_reregister =
                        Some(value.as_bool().ok_or_else(|| invalid(key, value))?);
                }
                other => return Err(format!("unexpected keyword argument '{}'", other)),
            }
        }

        Ok(options)
    }

    /// Parse the keyword set, degrading to defaults on error
    pub fn resolve(procedure: &str, keywords: &Dict) -> Self {
        match Self::from_keywords(keywords) {
            Ok(options) => options,
            Err(reason) => {
                warn!(
                    "Invalid register options for {} ({}), using defaults",
                    procedure, reason
                );
                Self::default()
            }
        }
    }

    /// REGISTER.Options dictionary
    pub fn to_details(&self) -> Dict {
        let mut details = Dict::new();
        if let Some(policy) = self.match_policy {
            details.insert("match".into(), json!(policy.as_str()));
        }
        if let Some(policy) = self.invoke {
            details.insert("invoke".into(), json!(policy.as_str()));
        }
        if let Some(concurrency) = self.concurrency {
            details.insert("concurrency".into(), json!(concurrency));
        }
        if let Some(force) = self.force_reregister {
            details.insert("force_reregister".into(), json!(force));
        }
        details
    }
}

fn invalid(key: &str, value: &Value) -> String {
    format!("invalid value {} for '{}'", value, key)
}
