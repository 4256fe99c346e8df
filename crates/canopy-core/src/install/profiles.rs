//! Profile-mapping reconciliation between a package and the target org.

use crate::client::PlatformApi;
use crate::client::types::{ProfileBag, SubscriberPackageVersionRecord};
use crate::error::Result;

use super::request::{ProfileMapping, ProfileMappings};
use super::spv_query;

/// Names like `__Standard__` are platform-reserved placeholders, never
/// mappable profiles.
fn is_reserved_profile_name(name: &str) -> bool {
    name.len() >= 4 && name.starts_with("__") && name.ends_with("__")
}

/// Match the package's source profiles to destination org profiles by
/// name; source profiles absent from the destination are unmapped.
fn map_profiles(bag: &ProfileBag) -> (Vec<ProfileMapping>, Vec<String>) {
    let mut mappings = Vec::new();
    let mut unmapped = Vec::new();

    for source in bag
        .source_profiles
        .iter()
        .map(|profile| profile.value.as_str())
        .filter(|name| !is_reserved_profile_name(name))
    {
        let destination = bag
            .destination_profiles
            .iter()
            .find(|profile| profile.name == source)
            .and_then(|profile| profile.profile_id.as_deref());
        match destination {
            Some(profile_id) => mappings.push(ProfileMapping {
                source: source.to_string(),
                target: profile_id.to_string(),
            }),
            None => unmapped.push(source.to_string()),
        }
    }

    (mappings, unmapped)
}

/// Resolve the profile mappings to submit with an install request.
///
/// Unmapped source profiles are logged as warnings and left out; a
/// package version that is not yet queryable yields an empty mapping.
pub async fn resolve_profile_mappings(
    client: &dyn PlatformApi,
    apv_id: &str,
    installation_key: Option<&str>,
) -> Result<ProfileMappings> {
    let Some(value) = spv_query(client, &["Profiles"], apv_id, installation_key, true).await?
    else {
        return Ok(ProfileMappings::default());
    };
    let record: SubscriberPackageVersionRecord = serde_json::from_value(value)?;
    let Some(bag) = record.profiles else {
        return Ok(ProfileMappings::default());
    };

    let (mappings, unmapped) = map_profiles(&bag);
    tracing::info!("mapped {} of {} profiles", mappings.len(), mappings.len() + unmapped.len());
    if !unmapped.is_empty() {
        tracing::warn!("could not find these profiles in the target org: {unmapped:?}");
    }

    Ok(ProfileMappings {
        profile_mappings: mappings,
    })
}
