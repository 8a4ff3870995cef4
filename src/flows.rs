//! Resolution of human-readable flow identifiers to canonical IDs.
//!
//! Profiles may name their flow by canonical ID, by endpoint alias, or by bare
//! flow name. The backend only accepts canonical IDs, so before any profile is
//! used the [`FlowIdentifierResolver`] fetches the bulk flow listing once and
//! rewrites each profile's `flow_id` in place.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::observability::{FLOW_RESOLUTION_FAILURES, FLOW_RESOLUTIONS};
use crate::transport::Transport;
use crate::types::{FlowDescriptor, FlowListing};
use crate::{Error, Result};

/// Deadline for fetching the flow listing.
const DEFAULT_LISTING_TIMEOUT: Duration = Duration::from_secs(60);

/// A named consumer of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile name, used in logs and reports.
    pub name: String,
    /// Canonical ID, endpoint alias, or bare flow name.
    pub flow_id: String,
}

impl Profile {
    /// Creates a profile.
    pub fn new(name: impl Into<String>, flow_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flow_id: flow_id.into(),
        }
    }
}

/// Returns true if `id` is a canonical flow ID (a hyphenated UUID).
pub fn is_canonical_id(id: &str) -> bool {
    id.len() == 36 && Uuid::parse_str(id).is_ok()
}

/// Lookup from endpoint alias or bare name to canonical ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowNameMap {
    entries: HashMap<String, String>,
}

impl FlowNameMap {
    /// Builds the map from descriptors in listing order.
    ///
    /// Descriptors without a usable ID are skipped. An endpoint alias always
    /// maps, overwriting earlier entries; a bare name maps only when no earlier
    /// entry claimed it.
    pub fn build(descriptors: &[FlowDescriptor]) -> Self {
        let mut entries = HashMap::new();
        for descriptor in descriptors {
            let Some(id) = descriptor.canonical_id() else {
                debug!(descriptor = ?descriptor, "skipping flow without a usable id");
                continue;
            };
            if let Some(alias) = descriptor.endpoint_alias() {
                entries.insert(alias.to_string(), id.to_string());
            } else if let Some(name) = descriptor.bare_name() {
                entries
                    .entry(name.to_string())
                    .or_insert_with(|| id.to_string());
            }
        }
        Self { entries }
    }

    /// Looks up the canonical ID for an alias or name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves an identifier: canonical IDs pass through, anything else is
    /// looked up.
    pub fn resolve<'a>(&'a self, identifier: &'a str) -> Option<&'a str> {
        let identifier = identifier.trim();
        if is_canonical_id(identifier) {
            Some(identifier)
        } else {
            self.get(identifier)
        }
    }
}

/// What one resolver run did to the profiles it was given.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    /// Profiles whose `flow_id` was rewritten to a canonical ID.
    pub resolved: Vec<String>,
    /// Profiles that already carried a canonical ID.
    pub unchanged: Vec<String>,
    /// Profiles whose identifier matched nothing in the listing.
    pub failed: Vec<String>,
    /// Why the listing could not be fetched, if it could not.
    pub error: Option<Error>,
    /// True when the resolver had already run and did nothing.
    pub skipped: bool,
}

impl ResolutionReport {
    /// Returns true if every profile ended up with a canonical ID.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.failed.is_empty()
    }
}

/// Rewrites each profile's `flow_id` to its canonical ID using `map`.
///
/// Unresolvable profiles are left untouched and reported as failed.
pub fn resolve_profiles(map: &FlowNameMap, profiles: &mut [Profile]) -> ResolutionReport {
    let mut report = ResolutionReport::default();
    for profile in profiles.iter_mut() {
        let identifier = profile.flow_id.trim();
        if is_canonical_id(identifier) {
            report.unchanged.push(profile.name.clone());
            continue;
        }
        match map.get(identifier) {
            Some(id) => {
                FLOW_RESOLUTIONS.click();
                info!(profile = %profile.name, alias = identifier, flow_id = id, "resolved flow");
                profile.flow_id = id.to_string();
                report.resolved.push(profile.name.clone());
            }
            None => {
                FLOW_RESOLUTION_FAILURES.click();
                let err = Error::configuration(
                    format!("flow {identifier:?} matches no canonical ID, endpoint alias, or name"),
                    Some(profile.name.clone()),
                );
                error!(profile = %profile.name, error = %err, "could not resolve flow");
                report.failed.push(profile.name.clone());
            }
        }
    }
    report
}

/// Resolves profile flow identifiers once per process.
#[derive(Debug, Default)]
pub struct FlowIdentifierResolver {
    map: FlowNameMap,
    initialized: bool,
    failed_profiles: Vec<String>,
    timeout: Option<Duration>,
}

impl FlowIdentifierResolver {
    /// Creates an uninitialized resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline for fetching the flow listing.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fetches the flow listing and resolves `profiles` in place.
    ///
    /// Runs at most once successfully; later calls return a skipped report. A
    /// listing failure is logged and reported, and leaves the resolver ready
    /// to try again.
    pub async fn initialize<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        profiles: &mut [Profile],
    ) -> ResolutionReport {
        if self.initialized {
            debug!("flow identifiers already resolved");
            return ResolutionReport {
                skipped: true,
                ..ResolutionReport::default()
            };
        }
        let timeout = self.timeout.unwrap_or(DEFAULT_LISTING_TIMEOUT);
        let listing = match tokio::time::timeout(timeout, transport.list_flows()).await {
            Ok(listing) => listing,
            Err(_) => Err(Error::timeout(
                "flow listing timed out",
                Some(timeout.as_secs_f64()),
            )),
        };
        match listing {
            Ok(listing) => self.initialize_from_listing(listing, profiles),
            Err(err) => {
                warn!(error = %err, "could not fetch the flow listing; flow ids left unresolved");
                ResolutionReport {
                    error: Some(err),
                    ..ResolutionReport::default()
                }
            }
        }
    }

    /// Resolves `profiles` against an already-fetched listing.
    pub fn initialize_from_listing(
        &mut self,
        listing: FlowListing,
        profiles: &mut [Profile],
    ) -> ResolutionReport {
        if self.initialized {
            debug!("flow identifiers already resolved");
            return ResolutionReport {
                skipped: true,
                ..ResolutionReport::default()
            };
        }
        let descriptors = listing.into_descriptors();
        self.map = FlowNameMap::build(&descriptors);
        debug!(
            flows = descriptors.len(),
            keys = self.map.len(),
            "built flow name map"
        );
        let report = resolve_profiles(&self.map, profiles);
        self.failed_profiles = report.failed.clone();
        self.initialized = true;
        report
    }

    /// Returns true once a listing has been fetched and applied.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The alias and name map built from the listing.
    pub fn map(&self) -> &FlowNameMap {
        &self.map
    }

    /// Profiles that could not be resolved.
    pub fn failed_profiles(&self) -> &[String] {
        &self.failed_profiles
    }

    /// Resolves a single identifier against the map built by
    /// [`initialize`](Self::initialize).
    pub fn resolve(&self, identifier: &str) -> Result<String> {
        self.map
            .resolve(identifier)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::configuration(
                    format!(
                        "flow {:?} matches no canonical ID, endpoint alias, or name",
                        identifier.trim()
                    ),
                    None,
                )
            })
    }
}
