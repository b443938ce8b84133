//! WGSL validation ahead of module creation
//!
//! wgpu reports shader problems through its uncaptured-error handler, which
//! panics by default. Running naga's front end and validator first turns a
//! broken shader into an ordinary [`BackendError`] with a readable diagnostic.

use crate::backend::traits::{BackendError, BackendResult};
use naga::valid::{Capabilities, ValidationFlags, Validator};

/// Entry point names every render shader must provide
pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Parse and validate a WGSL module, checking that the expected entry points exist.
pub fn validate_wgsl(label: &str, source: &str, needs_fragment: bool) -> BackendResult<()> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        BackendError::ShaderCreationFailed(format!("{}: {}", label, e.emit_to_string(source)))
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| {
            BackendError::ShaderCreationFailed(format!("{}: {}", label, e.emit_to_string(source)))
        })?;

    let has_entry = |stage: naga::ShaderStage, name: &str| {
        module
            .entry_points
            .iter()
            .any(|ep| ep.stage == stage && ep.name == name)
    };

    if !has_entry(naga::ShaderStage::Vertex, VERTEX_ENTRY) {
        return Err(BackendError::ShaderCreationFailed(format!(
            "{}: missing vertex entry point `{}`",
            label, VERTEX_ENTRY
        )));
    }
    if needs_fragment && !has_entry(naga::ShaderStage::Fragment, FRAGMENT_ENTRY) {
        return Err(BackendError::ShaderCreationFailed(format!(
            "{}: missing fragment entry point `{}`",
            label, FRAGMENT_ENTRY
        )));
    }

    Ok(())
}
