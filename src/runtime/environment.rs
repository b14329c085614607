// src/runtime/environment.rs
//! Environment metadata sent alongside submitted events

use serde::{Deserialize, Serialize};

/// Language, platform and user agent of the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// BCP 47 language tag (e.g. `en-US`)
    pub language: String,

    /// Platform identifier (e.g. `Linux x86_64`)
    pub platform: String,

    /// User agent string
    pub user_agent: String,
}

/// Source of environment metadata
pub trait HostEnvironment: Send + Sync {
    fn user_info(&self) -> UserInfo;
}

/// Fixed metadata, for embedders that already know their environment
#[derive(Debug, Clone)]
pub struct StaticEnvironment(pub UserInfo);

impl HostEnvironment for StaticEnvironment {
    fn user_info(&self) -> UserInfo {
        self.0.clone()
    }
}

/// Metadata derived from the running process (locale variables, target OS)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl HostEnvironment for SystemEnvironment {
    fn user_info(&self) -> UserInfo {
        let platform = platform();
        UserInfo {
            language: language_from_env(|name| std::env::var(name).ok()),
            user_agent: format!("telemetry-buffer/{} ({})", crate::VERSION, platform),
            platform,
        }
    }
}

/// Used when no usable locale variable is set
pub const UNDETERMINED_LANGUAGE: &str = "und";

fn platform() -> String {
    let os = match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "MacOS",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        other => other,
    };
    format!("{} {}", os, std::env::consts::ARCH)
}

/// Resolve the language tag from POSIX locale variables, in precedence order
fn language_from_env(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| lookup(name))
        .find_map(|value| locale_to_tag(&value))
        .unwrap_or_else(|| UNDETERMINED_LANGUAGE.to_string())
}

/// `en_US.UTF-8@euro` → `en-US`; `C` and `POSIX` carry no language
fn locale_to_tag(locale: &str) -> Option<String> {
    let base = locale
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }

    Some(base.replace('_', "-"))
}
