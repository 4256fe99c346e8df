//! Package install facade.
//!
//! Validates input identifiers, waits for package-version replication,
//! collects user consent for risky operations, submits a
//! `PackageInstallRequest`, and polls it to a terminal status.

pub mod profiles;
pub mod replication;
pub mod request;

use std::str::FromStr;

use serde_json::Value;

use crate::client::PlatformApi;
use crate::client::types::{InstallState, InstallStatusRecord, SubscriberPackageVersionRecord};
use crate::context::AppContext;
use crate::error::{CanopyError, Result};
use crate::poll::{DEFAULT_POLL_INTERVAL, REPLICATION_POLL_INTERVAL, RetryBudget, Sleeper};
use crate::query::SoqlQuery;
use self::request::{PackageInstallRequest, read_install_errors};

const SPV_ID_PREFIX: &str = "04t";
const MIN_API_VERSION: u32 = 36;

const PROMPT_UPGRADE_TYPE: &str = "The package being installed uses an upgrade type of Delete, \
     which permanently removes metadata that is not part of the new version. Proceed?";

/// How user consent is collected; the CLI wires this to a terminal
/// prompt, tests script it.
pub trait ConsentPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpgradeType {
    Delete,
    DeprecateOnly,
    #[default]
    Mixed,
}

impl UpgradeType {
    /// Value the server expects on the install request.
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Delete => "delete-only",
            Self::DeprecateOnly => "deprecate-only",
            Self::Mixed => "mixed-mode",
        }
    }
}

impl FromStr for UpgradeType {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Delete" => Ok(Self::Delete),
            "DeprecateOnly" => Ok(Self::DeprecateOnly),
            "Mixed" => Ok(Self::Mixed),
            other => Err(CanopyError::Config(format!(
                "unknown upgrade type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApexCompile {
    #[default]
    All,
    Package,
}

impl ApexCompile {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Package => "package",
        }
    }
}

impl FromStr for ApexCompile {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "package" => Ok(Self::Package),
            other => Err(CanopyError::Config(format!(
                "unknown apex compile option '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityType {
    AllUsers,
    #[default]
    AdminsOnly,
}

impl SecurityType {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::AllUsers => "full",
            Self::AdminsOnly => "none",
        }
    }
}

impl FromStr for SecurityType {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AllUsers" => Ok(Self::AllUsers),
            "AdminsOnly" => Ok(Self::AdminsOnly),
            other => Err(CanopyError::Config(format!(
                "unknown security type '{other}'"
            ))),
        }
    }
}

/// Whether the subscriber package is an unlocked package. Upgrade-type
/// and apex-compile overrides only apply to unlocked packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    Unlocked,
    Locked,
}

impl PackageType {
    fn from_container_options(container: Option<&str>) -> Self {
        if container == Some("Unlocked") {
            Self::Unlocked
        } else {
            Self::Locked
        }
    }
}

/// Everything an install invocation can configure.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Explicit subscriber package version id (starts with `04t`).
    pub id: Option<String>,
    /// Package alias from config, or a literal id.
    pub package: Option<String>,
    pub installation_key: Option<String>,
    /// Minutes to wait for the install request to finish.
    pub wait: Option<u64>,
    /// Minutes to wait for the package version to replicate.
    pub publish_wait: Option<u64>,
    pub upgrade_type: UpgradeType,
    pub apex_compile: ApexCompile,
    pub security_type: SecurityType,
    pub auto_map_profiles: bool,
    /// Answer yes to every confirmation prompt.
    pub no_prompt: bool,
}

/// Install command over an [`AppContext`] and a platform client.
pub struct PackageInstall<'a> {
    ctx: &'a AppContext,
    client: &'a dyn PlatformApi,
    sleeper: &'a dyn Sleeper,
    prompt: &'a dyn ConsentPrompt,
}

impl<'a> PackageInstall<'a> {
    pub fn new(
        ctx: &'a AppContext,
        client: &'a dyn PlatformApi,
        sleeper: &'a dyn Sleeper,
        prompt: &'a dyn ConsentPrompt,
    ) -> Self {
        Self {
            ctx,
            client,
            sleeper,
            prompt,
        }
    }

    /// Install a package version into the target org.
    pub async fn execute(&self, options: &InstallOptions) -> Result<InstallStatusRecord> {
        // Exactly one of --id / --package, before any network call.
        let apv_id = match (&options.id, &options.package) {
            (Some(id), None) => id.clone(),
            (None, Some(package)) => self.resolve_alias(package),
            _ => return Err(CanopyError::RequiredFlags),
        };
        // Validate whatever the alias resolved to, even a bunk one.
        validate_package_version_id(&apv_id)?;

        let major = self.ctx.org().api_version_major().ok_or_else(|| {
            CanopyError::Config(format!(
                "invalid api_version '{}' for org {}",
                self.ctx.org().api_version,
                self.ctx.org().username
            ))
        })?;
        if major < MIN_API_VERSION {
            return Err(CanopyError::UnsupportedApiVersion {
                version: self.ctx.org().api_version.clone(),
                minimum: MIN_API_VERSION,
            });
        }

        let key = options.installation_key.as_deref();
        let poll_budget =
            RetryBudget::from_wait_minutes(options.wait.unwrap_or(0) as i64, DEFAULT_POLL_INTERVAL);
        let publish_budget = RetryBudget::covering_minutes(
            options.publish_wait.unwrap_or(0),
            REPLICATION_POLL_INTERVAL,
        );

        replication::wait_for_replication(self.client, self.sleeper, &apv_id, key, publish_budget)
            .await?;

        let package_type = self.package_type(&apv_id, key).await?;
        let unlocked = package_type == Some(PackageType::Unlocked);

        // A Delete upgrade removes metadata for good; make the user say so.
        if options.upgrade_type == UpgradeType::Delete && unlocked {
            let accepted = options.no_prompt || self.prompt.confirm(PROMPT_UPGRADE_TYPE)?;
            if !accepted {
                return Err(CanopyError::PromptDenied);
            }
        }

        // Unlocked packages can bundle external RSS/CSP endpoints; surface
        // them for acknowledgement before granting access.
        let trusted_sites = self.external_sites(&apv_id, key).await?;
        let mut enable_rss = false;
        if !trusted_sites.is_empty() {
            let message = format!(
                "This package may send or receive data from these third-party websites:\n{}\nGrant access?",
                trusted_sites.join("\n")
            );
            enable_rss = options.no_prompt || self.prompt.confirm(&message)?;
        }

        let mut install_request = PackageInstallRequest::new(&apv_id, key);
        if options.upgrade_type != UpgradeType::Mixed {
            if unlocked {
                install_request.upgrade_type = Some(options.upgrade_type.wire_value().to_string());
            } else {
                tracing::warn!("--upgrade-type is only honored for unlocked packages");
            }
        }
        if options.apex_compile != ApexCompile::All {
            if unlocked {
                install_request.apex_compile_type =
                    Some(options.apex_compile.wire_value().to_string());
            } else {
                tracing::warn!("--apex-compile is only honored for unlocked packages");
            }
        }
        install_request.security_type = options.security_type.wire_value().to_string();
        install_request.enable_rss = enable_rss;
        if options.auto_map_profiles {
            install_request.profile_mappings =
                Some(profiles::resolve_profile_mappings(self.client, &apv_id, key).await?);
        }

        let created = self
            .client
            .tooling_create(
                "PackageInstallRequest",
                &serde_json::to_value(&install_request)?,
            )
            .await?;
        let request_id = created.id.ok_or_else(|| CanopyError::InstallFailed {
            message: format!("failed to create the install request for {apv_id}"),
        })?;

        self.poll(&request_id, poll_budget).await
    }

    /// Poll the install request until SUCCESS, ERROR, or budget
    /// exhaustion; exhaustion returns the last-seen non-terminal record.
    async fn poll(&self, request_id: &str, mut budget: RetryBudget) -> Result<InstallStatusRecord> {
        loop {
            let value = self
                .client
                .tooling_retrieve("PackageInstallRequest", request_id)
                .await?;
            let record: InstallStatusRecord = serde_json::from_value(value)?;
            match record.status {
                InstallState::Success => return Ok(record),
                InstallState::Error => {
                    let message = read_install_errors(&record);
                    tracing::error!("encountered errors installing the package: {message}");
                    return Err(CanopyError::InstallFailed { message });
                }
                _ => {
                    if !budget.try_consume() {
                        return Ok(record);
                    }
                    tracing::info!(status = %record.status, "install request in progress");
                    self.sleeper.sleep(DEFAULT_POLL_INTERVAL).await;
                }
            }
        }
    }

    fn resolve_alias(&self, package: &str) -> String {
        // Only look up the alias when the value is not already an id.
        if package.starts_with(SPV_ID_PREFIX) {
            return package.to_string();
        }
        self.ctx
            .config()
            .package_aliases
            .get(package)
            .cloned()
            .unwrap_or_else(|| package.to_string())
    }

    async fn package_type(
        &self,
        apv_id: &str,
        installation_key: Option<&str>,
    ) -> Result<Option<PackageType>> {
        let Some(value) = spv_query(
            self.client,
            &["Package2ContainerOptions"],
            apv_id,
            installation_key,
            false,
        )
        .await?
        else {
            return Ok(None);
        };
        let record: SubscriberPackageVersionRecord = serde_json::from_value(value)?;
        Ok(Some(PackageType::from_container_options(
            record.container_options.as_deref(),
        )))
    }

    /// All RSS/CSP third-party endpoints bundled with the package.
    async fn external_sites(
        &self,
        apv_id: &str,
        installation_key: Option<&str>,
    ) -> Result<Vec<String>> {
        let Some(value) = spv_query(
            self.client,
            &["RemoteSiteSettings", "CspTrustedSites"],
            apv_id,
            installation_key,
            false,
        )
        .await?
        else {
            return Ok(Vec::new());
        };
        let record: SubscriberPackageVersionRecord = serde_json::from_value(value)?;

        let mut sites: Vec<String> = record
            .remote_site_settings
            .map(|rss| rss.settings.into_iter().map(|site| site.url).collect())
            .unwrap_or_default();
        if let Some(csp) = record.csp_trusted_sites {
            sites.extend(csp.settings.into_iter().map(|site| site.endpoint_url));
        }
        Ok(sites)
    }
}

fn validate_package_version_id(id: &str) -> Result<()> {
    let valid = id.starts_with(SPV_ID_PREFIX)
        && (id.len() == 15 || id.len() == 18)
        && id.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(CanopyError::InvalidPackageId { id: id.to_string() })
    }
}

/// Query one `SubscriberPackageVersion` row, preferring the
/// installation-key-filtered variant.
///
/// Platform versions before 214 reject key-filtered queries against this
/// view, so that restriction falls back to the unfiltered query. When
/// `tolerate_unavailable` is set, a package-unavailable error yields
/// `None` instead of failing, and the caller proceeds without the
/// optional data.
pub(crate) async fn spv_query(
    client: &dyn PlatformApi,
    fields: &'static [&'static str],
    apv_id: &str,
    installation_key: Option<&str>,
    tolerate_unavailable: bool,
) -> Result<Option<Value>> {
    let base = || {
        SoqlQuery::new("SubscriberPackageVersion")
            .fields(fields)
            .filter("Id", apv_id)
    };
    let soql = match installation_key {
        Some(key) => base().filter("InstallationKey", key).build(),
        None => base().build(),
    };

    let result = match client.tooling_query(&soql).await {
        Ok(result) => Some(result),
        Err(CanopyError::Platform(err))
            if installation_key.is_some() && err.is_spv_query_restriction() =>
        {
            Some(client.tooling_query(&base().build()).await?)
        }
        Err(CanopyError::Platform(err)) if tolerate_unavailable && err.is_package_unavailable() => {
            tracing::warn!("package version {apv_id} is not yet available: {err}");
            None
        }
        Err(err) => return Err(err),
    };

    Ok(result.and_then(|result| result.records.into_iter().next()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_version_ids_need_prefix_and_length() {
        assert!(validate_package_version_id("04t000000000001AAA").is_ok());
        assert!(validate_package_version_id("04t000000000001").is_ok());
        assert!(validate_package_version_id("04t00000000001").is_err());
        assert!(validate_package_version_id("0Ho000000000001AAA").is_err());
        assert!(validate_package_version_id("04t0000000000-1AAA").is_err());
    }

    #[test]
    fn wire_values_match_the_server_enumeration() {
        assert_eq!(UpgradeType::Delete.wire_value(), "delete-only");
        assert_eq!(UpgradeType::DeprecateOnly.wire_value(), "deprecate-only");
        assert_eq!(UpgradeType::Mixed.wire_value(), "mixed-mode");
        assert_eq!(ApexCompile::All.wire_value(), "all");
        assert_eq!(ApexCompile::Package.wire_value(), "package");
        assert_eq!(SecurityType::AllUsers.wire_value(), "full");
        assert_eq!(SecurityType::AdminsOnly.wire_value(), "none");
    }

    #[test]
    fn container_options_decide_package_type() {
        assert_eq!(
            PackageType::from_container_options(Some("Unlocked")),
            PackageType::Unlocked
        );
        assert_eq!(
            PackageType::from_container_options(Some("Managed")),
            PackageType::Locked
        );
        assert_eq!(PackageType::from_container_options(None), PackageType::Locked);
    }
}
