//! Machine Profiles
//!
//! This module handles:
//! - Loading machine profiles from TOML files
//! - Loading priority: explicit path > user-global > built-in
//! - Validation of queue depth, overrides, tools and work offsets
//! - Seeding the parameter store with profile tools and offsets

pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::WORK_SYSTEMS;
use crate::parameters::{
    FIRST_WCS, ParameterError, ParameterStore, TOOL_DIAMETER_BASE, TOOL_LENGTH_BASE,
    TOOL_TYPE_BASE, WCS_STRIDE,
};
use crate::tools::TOOL_COUNT;

pub use schema::{DEFAULT_QUEUE_DEPTH, MachineProfile, MachineSettings, ProfileFile};

/// Smallest and largest lookahead depth a profile may ask for
pub const QUEUE_DEPTH_RANGE: std::ops::RangeInclusive<usize> = 2..=255;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("queue depth {0} outside 2..=255")]
    QueueDepth(usize),
    #[error("{name} override {value} outside (0, 2]")]
    Override { name: &'static str, value: f64 },
    #[error("tool index {0} outside 1..=99")]
    ToolIndex(usize),
    #[error("tool {0} has invalid diameter or length")]
    ToolGeometry(usize),
    #[error("work offset system {0} outside 1..=6")]
    WorkSystem(u8),
}

impl MachineProfile {
    /// Check every value the interpreter relies on
    pub fn validate(&self) -> Result<(), ProfileError> {
        let settings = &self.settings;
        if !QUEUE_DEPTH_RANGE.contains(&settings.queue_depth) {
            return Err(ProfileError::QueueDepth(settings.queue_depth));
        }
        for (name, value) in [
            ("feed", settings.feed_override),
            ("speed", settings.speed_override),
        ] {
            if !(value > 0.0 && value <= 2.0) {
                return Err(ProfileError::Override { name, value });
            }
        }
        for tool in &self.tools {
            if tool.index == 0 || tool.index > TOOL_COUNT {
                return Err(ProfileError::ToolIndex(tool.index));
            }
            if !tool.diameter.is_finite() || tool.diameter < 0.0 || !tool.length.is_finite() {
                return Err(ProfileError::ToolGeometry(tool.index));
            }
        }
        for (system, _) in &self.work_offsets {
            if *system == 0 || *system > WORK_SYSTEMS {
                return Err(ProfileError::WorkSystem(*system));
            }
        }
        Ok(())
    }

    /// Parse and validate profile TOML
    pub fn from_toml_str(content: &str, source_path: Option<&Path>) -> Result<Self> {
        let file: ProfileFile = toml::from_str(content).with_context(|| match source_path {
            Some(path) => format!("Failed to parse machine profile TOML: {}", path.display()),
            None => "Failed to parse built-in machine profile TOML".to_string(),
        })?;
        let profile = MachineProfile::from(file);
        profile.validate().with_context(|| match source_path {
            Some(path) => format!("Invalid machine profile: {}", path.display()),
            None => "Invalid built-in machine profile".to_string(),
        })?;
        Ok(profile)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read machine profile: {}", path.display()))?;
        Self::from_toml_str(&content, Some(path))
    }

    /// Profile embedded in the binary
    pub fn builtin() -> Self {
        let content = include_str!("../../resources/machines/default.machine.toml");
        match Self::from_toml_str(content, None) {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("{:#}. Using minimal fallback.", e);
                MachineProfile::default()
            }
        }
    }

    /// User global profile: ~/.config/gcode-canon/machine.toml
    pub fn user_profile_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gcode-canon").join("machine.toml"))
    }

    /// Resolve the effective profile. An explicit path must load; a broken
    /// user-global profile is reported and skipped.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let profile = Self::load_file(path)?;
            log::info!("Using machine profile '{}' from {}", profile.name, path.display());
            return Ok(profile);
        }

        if let Some(path) = Self::user_profile_path().filter(|p| p.exists()) {
            match Self::load_file(&path) {
                Ok(profile) => {
                    log::info!("Using machine profile '{}' from {}", profile.name, path.display());
                    return Ok(profile);
                }
                Err(e) => log::warn!("Skipping user machine profile: {:#}", e),
            }
        }

        let profile = Self::builtin();
        log::info!("Using built-in machine profile '{}'", profile.name);
        Ok(profile)
    }

    /// Write profile tools and work offsets into the store
    pub fn seed(&self, store: &mut ParameterStore) -> Result<(), ParameterError> {
        for tool in &self.tools {
            store.set_immediate(TOOL_TYPE_BASE + tool.index, tool.kind.code())?;
            store.set_immediate(TOOL_DIAMETER_BASE + tool.index, tool.diameter)?;
            store.set_immediate(TOOL_LENGTH_BASE + tool.index, tool.length)?;
        }
        for (system, offset) in &self.work_offsets {
            let base = FIRST_WCS + (usize::from(*system) - 1) * WCS_STRIDE;
            store.set_immediate(base, offset.x)?;
            store.set_immediate(base + 1, offset.y)?;
            store.set_immediate(base + 2, offset.z)?;
        }
        log::debug!(
            "Seeded {} tools and {} work offsets from profile '{}'",
            self.tools.len(),
            self.work_offsets.len(),
            self.name
        );
        Ok(())
    }
}
