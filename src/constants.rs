//! Global constants used throughout the soldeploy codebase.
//!
//! This module holds the identifier shape, placeholder grammar, special token
//! names, and default tuning values shared by the codec, the extractors, and
//! the orchestrators. Defining them centrally keeps the textual substitution
//! rules discoverable in one place.

/// Length of a platform item identifier.
///
/// Item ids are 32 ASCII hex digits. The token codec and [`ExtendedId`]
/// parsing rely on this fixed width to split a base id from its selector.
///
/// [`ExtendedId`]: crate::core::ExtendedId
pub const ITEM_ID_LEN: usize = 32;

/// Regex matching maximal runs of hex digits.
///
/// A run is treated as an item id candidate only when it is exactly
/// [`ITEM_ID_LEN`] characters long, so 40-character commit hashes and other
/// longer hex values are never split into an id plus a tail.
pub const HEX_RUN_PATTERN: &str = r"[0-9A-Fa-f]{32,}";

/// Regex matching a `{{path}}` placeholder and capturing the path.
pub const PLACEHOLDER_PATTERN: &str = r"\{\{([^{}\s]+)\}\}";

/// Placeholder field holding the newly created item id.
pub const FIELD_ITEM_ID: &str = "itemId";

/// Placeholder field holding the newly created item url.
pub const FIELD_URL: &str = "url";

/// Placeholder field holding the folder the item was created in.
pub const FIELD_FOLDER_ID: &str = "folderId";

/// Run-wide token resolving to the destination portal base url.
pub const TOKEN_PORTAL_BASE_URL: &str = "portalBaseUrl";

/// Run-wide token resolving to the destination organization id.
pub const TOKEN_USER_ORG_ID: &str = "user.orgId";

/// Run-wide token resolving to the acting user name.
pub const TOKEN_USER_USERNAME: &str = "user.username";

/// Host of the workflow automation service whose webhook urls embed an org id.
pub const DEFAULT_AUTOMATION_HOST: &str = "workflow.arcgis.com";

/// Type keyword marking a feature view created for location tracking.
pub const TRACKING_VIEW_KEYWORD: &str = "Location Tracking View";

/// Default relative creation cost when an extractor does not specify one.
pub const DEFAULT_COST_WEIGHT: u32 = 3;

/// Default number of concurrent creation or deletion calls.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Schema version written into every solution bundle.
pub const BUNDLE_SCHEMA_VERSION: &str = "1.0.0";

/// Environment variable disabling progress bars.
pub const NO_PROGRESS_ENV: &str = "SOLDEPLOY_NO_PROGRESS";

/// Environment variable overriding the global config path.
pub const CONFIG_ENV: &str = "SOLDEPLOY_CONFIG";
