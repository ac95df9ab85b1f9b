//! Resolution of `\i` and `\p` paths into preloaded resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Root folder every atlas image path lives under.
pub const ATLAS_ROOT: &str = "Atlas";

/// A preloaded atlas frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageHandle {
    /// Bundle the frame belongs to, e.g. `Atlas/Game`.
    pub bundle: Arc<str>,
    /// Frame name inside the bundle.
    pub frame: Arc<str>,
    /// Native width in px.
    pub width: f32,
    /// Native height in px.
    pub height: f32,
}

/// A preloaded instantiable object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectHandle {
    pub name: Arc<str>,
    pub width: f32,
    pub height: f32,
    /// Anchor of the object's root node, y-down, in `0.0..=1.0`.
    pub anchor_x: f32,
    pub anchor_y: f32,
}

/// Resource attached to a resolved overlay element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResourceHandle {
    Image(ImageHandle),
    Object(ObjectHandle),
}

impl ResourceHandle {
    /// Native size in px.
    pub fn native_size(&self) -> (f32, f32) {
        match self {
            Self::Image(image) => (image.width, image.height),
            Self::Object(object) => (object.width, object.height),
        }
    }

    /// Anchor of the resource's own node, y-down.
    ///
    /// Atlas frames are placed from their bottom-left corner.
    pub fn anchor(&self) -> (f32, f32) {
        match self {
            Self::Image(_) => (0.0, 1.0),
            Self::Object(object) => (object.anchor_x, object.anchor_y),
        }
    }
}

/// Lookup of markup paths into preloaded resources.
pub trait AssetResolver: Send + Sync {
    /// Resolve an image path such as `Game/Coin` or `Atlas/Game/Coin`.
    fn resolve_image(&self, path: &str) -> Option<ImageHandle>;

    /// Resolve an object name.
    fn resolve_object(&self, name: &str) -> Option<ObjectHandle>;
}

/// Split an image path into `(bundle, frame)`, adding the atlas root when
/// missing. The bundle is everything before the last `/`.
pub fn split_atlas_path(path: &str) -> Option<(String, &str)> {
    let path = path.trim_matches('/');
    let (bundle, frame) = path.rsplit_once('/')?;
    if bundle.is_empty() || frame.is_empty() {
        return None;
    }
    let bundle = if bundle == ATLAS_ROOT || bundle.starts_with("Atlas/") {
        bundle.to_string()
    } else {
        format!("{ATLAS_ROOT}/{bundle}")
    };
    Some((bundle, frame))
}

/// Errors from registering resources in an [`AssetCache`].
#[derive(Clone, Debug, PartialEq)]
pub enum AssetError {
    /// Name or path missing, or an image path without a bundle segment.
    EmptyName(String),
    /// Width or height not finite and positive.
    InvalidDimensions { name: String, width: f32, height: f32 },
    /// Object anchor outside `0.0..=1.0`.
    InvalidAnchor { name: String, x: f32, y: f32 },
}

impl core::fmt::Display for AssetError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EmptyName(path) => write!(f, "invalid resource path '{}'", path),
            Self::InvalidDimensions {
                name,
                width,
                height,
            } => write!(
                f,
                "resource '{}' has invalid size {}x{}",
                name, width, height
            ),
            Self::InvalidAnchor { name, x, y } => {
                write!(f, "object '{}' has invalid anchor ({}, {})", name, x, y)
            }
        }
    }
}

impl std::error::Error for AssetError {}

/// In-memory cache of preloaded atlas frames and objects.
#[derive(Clone, Debug, Default)]
pub struct AssetCache {
    frames: BTreeMap<(String, String), (f32, f32)>,
    objects: BTreeMap<String, ObjectHandle>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an atlas frame under `path` (`Game/Coin` or `Atlas/Game/Coin`).
    pub fn insert_atlas_frame(
        &mut self,
        path: &str,
        width: f32,
        height: f32,
    ) -> Result<(), AssetError> {
        let (bundle, frame) =
            split_atlas_path(path).ok_or_else(|| AssetError::EmptyName(path.to_string()))?;
        check_size(path, width, height)?;
        self.frames
            .insert((bundle, frame.to_string()), (width, height));
        Ok(())
    }

    /// Register an instantiable object.
    pub fn insert_object(
        &mut self,
        name: &str,
        width: f32,
        height: f32,
        anchor: (f32, f32),
    ) -> Result<(), AssetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AssetError::EmptyName(name.to_string()));
        }
        check_size(name, width, height)?;
        let (anchor_x, anchor_y) = anchor;
        if !(0.0..=1.0).contains(&anchor_x) || !(0.0..=1.0).contains(&anchor_y) {
            return Err(AssetError::InvalidAnchor {
                name: name.to_string(),
                x: anchor_x,
                y: anchor_y,
            });
        }
        self.objects.insert(
            name.to_string(),
            ObjectHandle {
                name: Arc::from(name),
                width,
                height,
                anchor_x,
                anchor_y,
            },
        );
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.objects.is_empty()
    }
}

fn check_size(name: &str, width: f32, height: f32) -> Result<(), AssetError> {
    let valid = |v: f32| v.is_finite() && v > 0.0;
    if valid(width) && valid(height) {
        Ok(())
    } else {
        Err(AssetError::InvalidDimensions {
            name: name.to_string(),
            width,
            height,
        })
    }
}

impl AssetResolver for AssetCache {
    fn resolve_image(&self, path: &str) -> Option<ImageHandle> {
        let (bundle, frame) = split_atlas_path(path)?;
        let key = (bundle, frame.to_string());
        let &(width, height) = self.frames.get(&key)?;
        let (bundle, frame) = key;
        Some(ImageHandle {
            bundle: Arc::from(bundle),
            frame: Arc::from(frame),
            width,
            height,
        })
    }

    fn resolve_object(&self, name: &str) -> Option<ObjectHandle> {
        self.objects.get(name.trim()).cloned()
    }
}
