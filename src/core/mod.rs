//! Core types and functionality for soldeploy
//!
//! This module forms the foundation of the engine's type system: the error
//! taxonomy every component reports through, and the resource data model the
//! graph builder consumes.
//!
//! ## `error` - Error Handling
//! - [`SolutionError`] - Enumerated failure modes (input, structural, per-token, internal)
//! - [`ErrorContext`] - User-friendly wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to user-friendly format
//!
//! ## `resource` - Resource Model
//! - [`Resource`] - A live platform item
//! - [`ResourceType`] - Case-insensitive resource kind
//! - [`ExtendedId`] - Base id plus optional sub-part selector
//! - [`ResourceData`], [`Attachment`], [`AttachmentContent`] - Payload shapes

pub mod error;
pub mod resource;

pub use error::{ErrorContext, Result, SolutionError, user_friendly_error};
pub use resource::{Attachment, AttachmentContent, ExtendedId, Resource, ResourceData, ResourceType};
