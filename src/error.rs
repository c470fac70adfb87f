use std::fmt;

/// Scene-level failures.
///
/// None of these halt the render loop: failed loads leave the dependent feature
/// un-ready, and rejected requests are no-ops that are logged by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    /// A mesh, texture or audio file could not be fetched or decoded.
    AssetLoad { url: String, reason: String },
    /// A request arrived before the resource it depends on was ready.
    MissingDependency { feature: String },
    UnknownClip { avatar: usize, clip: usize },
    UnknownAvatar(usize),
    /// A panel value that is not a finite number.
    InvalidPan(f32),
}

impl SceneError {
    pub fn asset_load(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::AssetLoad {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing(feature: impl Into<String>) -> Self {
        Self::MissingDependency {
            feature: feature.into(),
        }
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssetLoad { url, reason } => write!(f, "could not load {url}: {reason}"),
            Self::MissingDependency { feature } => write!(f, "{feature} is not ready yet"),
            Self::UnknownClip { avatar, clip } => {
                write!(f, "avatar {avatar} has no clip with index {clip}")
            }
            Self::UnknownAvatar(avatar) => write!(f, "no avatar with index {avatar}"),
            Self::InvalidPan(x) => write!(f, "pan {x} is not a finite number"),
        }
    }
}

impl std::error::Error for SceneError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_errors_name_the_url() {
        let err = SceneError::asset_load("cubemap/px.png", "404");
        assert_eq!(err.to_string(), "could not load cubemap/px.png: 404");
    }
}
