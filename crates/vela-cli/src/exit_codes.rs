//! Exit codes of the vela binary
//!
//! These follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Input error - invalid files, arguments or local configuration
pub const INPUT_ERROR: i32 = 2;

/// Render error - a definition or template could not be rendered
pub const RENDER_ERROR: i32 = 3;

/// Cluster error - the Kubernetes API or the control plane failed
pub const CLUSTER_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
